//! Helpers for the per-module OpenAPI fragments.

use serde_json::{json, Map, Value};
use utoipa::ToSchema;

/// Register `T` and every schema it references.
pub fn add_schema<T: ToSchema>(schemas: &mut Map<String, Value>) {
    let mut collected = Vec::new();
    T::schemas(&mut collected);
    collected.push((T::name().into_owned(), T::schema()));

    for (name, schema) in collected {
        match serde_json::to_value(schema) {
            Ok(value) => {
                schemas.insert(name, value);
            }
            Err(e) => tracing::warn!(schema = %name, error = %e, "failed to render schema"),
        }
    }
}

pub fn schema_ref(name: &str) -> Value {
    json!({ "$ref": format!("#/components/schemas/{name}") })
}

pub fn json_response(description: &str, schema: Value) -> Value {
    json!({
        "description": description,
        "content": { "application/json": { "schema": schema } }
    })
}

pub fn error_response(description: &str) -> Value {
    json_response(description, schema_ref("ErrorResponse"))
}

pub fn redirect_response(description: &str) -> Value {
    json!({
        "description": description,
        "headers": { "Location": { "schema": { "type": "string" } } }
    })
}

/// A body accepted as JSON or as an url-encoded form.
pub fn form_body(schema: &str) -> Value {
    json!({
        "required": true,
        "content": {
            "application/json": { "schema": schema_ref(schema) },
            "application/x-www-form-urlencoded": { "schema": schema_ref(schema) }
        }
    })
}

pub fn path_param(name: &str, description: &str) -> Value {
    json!({
        "name": name,
        "in": "path",
        "required": true,
        "description": description,
        "schema": { "type": "string" }
    })
}

pub fn query_param(name: &str, description: &str) -> Value {
    json!({
        "name": name,
        "in": "query",
        "required": false,
        "description": description,
        "schema": { "type": "string" }
    })
}

/// Response describing a form the client should render.
pub fn form_descriptor_response() -> Value {
    json_response("Form descriptor", schema_ref("FormDescriptor"))
}
