pub mod accounts;
pub mod books;
pub mod openapi;
pub mod requests;
pub mod search;

use std::sync::Arc;

use serde::Serialize;
use shelf_kernel::ModuleRegistry;
use utoipa::ToSchema;

use crate::state::AppState;

/// Register all feature modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, state: &AppState) -> anyhow::Result<()> {
    registry.register(Arc::new(accounts::AccountsModule::new(state.clone())))?;
    registry.register(Arc::new(books::BooksModule::new(state.clone())))?;
    registry.register(Arc::new(search::SearchModule::new(state.clone())))?;
    registry.register(Arc::new(requests::RequestsModule::new(state.clone())))?;
    Ok(())
}

/// What a client needs to render one of the service's forms.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FormDescriptor {
    pub form: &'static str,
    pub action: String,
    pub method: &'static str,
    pub fields: Vec<&'static str>,
}

impl FormDescriptor {
    pub fn new(
        form: &'static str,
        action: impl Into<String>,
        method: &'static str,
        fields: &[&'static str],
    ) -> Self {
        Self {
            form,
            action: action.into(),
            method,
            fields: fields.to_vec(),
        }
    }
}
