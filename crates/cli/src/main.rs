use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use shelf_kernel::settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "shelf", version, about = "SHELF library catalog")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve,
    /// Print an Argon2 hash for an administrator seed
    HashPassword { password: String },
    /// Print the effective settings as JSON
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => serve(),
        Command::HashPassword { password } => {
            let hash = shelf_app::modules::accounts::password::hash_password(&password)?;
            println!("{hash}");
            Ok(())
        }
        Command::Config => {
            let settings = load_settings()?;
            println!("{}", serde_json::to_string_pretty(&describe(&settings))?);
            Ok(())
        }
    }
}

fn load_settings() -> anyhow::Result<Settings> {
    Settings::load().with_context(|| "failed to load SHELF settings")
}

fn serve() -> anyhow::Result<()> {
    let settings = load_settings()?;
    shelf_telemetry::init(&settings.telemetry)?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(shelf_app::run(settings))
}

/// Password hashes are left out.
fn describe(settings: &Settings) -> serde_json::Value {
    let admins: Vec<&str> = settings
        .auth
        .admins
        .iter()
        .map(|admin| admin.username.as_str())
        .collect();

    json!({
        "environment": format!("{:?}", settings.environment).to_lowercase(),
        "server": {
            "host": settings.server.host,
            "port": settings.server.port,
            "request_timeout_ms": settings.server.request_timeout_ms,
        },
        "storage": {
            "asset_dir": settings.storage.asset_dir.display().to_string(),
            "max_upload_bytes": settings.storage.max_upload_bytes,
        },
        "telemetry": {
            "log_format": format!("{:?}", settings.telemetry.log_format).to_lowercase(),
            "filter": settings.telemetry.filter,
        },
        "auth": {
            "session_ttl_secs": settings.auth.session_ttl_secs,
            "cookie_name": settings.auth.cookie_name,
            "secure_cookie": settings.auth.secure_cookie,
            "generic_login_errors": settings.auth.generic_login_errors,
            "admins": admins,
        }
    })
}
