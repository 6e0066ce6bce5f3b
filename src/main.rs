use kyc_backend::api;
use kyc_backend::config::AppConfig;
use kyc_backend::errors::{AppError, Result};
use kyc_backend::models::auth::Role;
use kyc_backend::services::auth::AuthService;
use tracing::error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().json().flatten_event(true))
        .init();
}

fn print_help() {
    println!("Usage:");
    println!("  kyc-backend                                  start the HTTP API");
    println!("  kyc-backend token <user_id> <org_id> [role]  issue a bearer token (role: admin | basic_member)");
    println!("  kyc-backend help                             show this message");
}

/// Issues a token for an organization member, for operators wiring up a
/// dashboard without the hosted identity provider.
fn issue_token(config: &AppConfig, args: &[String]) -> Result<()> {
    let (user_id, org_id) = match args {
        [user_id, org_id, ..] => (user_id, org_id),
        _ => return Err(AppError::ValidationError("token needs <user_id> <org_id>".to_string())),
    };
    let role = match args.get(2) {
        Some(raw) => raw.parse()?,
        None => Role::Admin,
    };

    let token = AuthService::new(config.jwt_secret.clone()).issue_token(user_id, org_id, role)?;
    println!("{}", token);
    Ok(())
}

async fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        None | Some("serve") => api::start_http_server(AppConfig::from_env()?).await,
        Some("token") => issue_token(&AppConfig::from_env()?, &args[2..]),
        Some("help") => {
            print_help();
            Ok(())
        }
        Some(other) => {
            print_help();
            Err(AppError::ValidationError(format!("Unknown command: {}", other)))
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    init_tracing();

    if let Err(e) = run().await {
        error!(action = "application_error", error = %e);
        std::process::exit(1);
    }
}
