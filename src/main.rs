use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api_rest::state::DEFAULT_SESSION_IDLE_SECS;
use api_rest::{ApiDoc, AppState, IdentityClients};
use api_shared::HealthService;
use portal_core::config::{
    flag_from_env_value, login_domain_from_env_value, min_password_len_from_env_value,
    seconds_from_env_value,
};
use portal_core::{
    AdminProvisioning, AdminSeed, CoreConfig, DocumentStore, IdentityProvider,
    MemoryDocumentStore, MemoryIdentityDirectory, ensure_admin,
};

/// Main entry point for the MedPortal application
///
/// Resolves configuration, provisions the administrator account and serves the REST API
/// with Swagger UI.
///
/// # Environment Variables
/// - `MEDPORTAL_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `MEDPORTAL_LOGIN_DOMAIN`: domain used to build identity provider login ids
/// - `MEDPORTAL_MIN_PASSWORD_LEN`: minimum accepted password length (default: 6)
/// - `MEDPORTAL_VALIDATE_SELECTIONS`: re-check diagnosis selections on submit (default: true)
/// - `MEDPORTAL_SESSION_IDLE_SECS`: seconds a bearer token may go unused (default: 1800)
/// - `MEDPORTAL_ADMIN_INSURANCE_NUMBER`, `MEDPORTAL_ADMIN_PASSWORD`, `MEDPORTAL_ADMIN_NAME`:
///   administrator account created at startup
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, provisioning or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("medportal_run=info".parse()?)
                .add_directive("portal_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Arc::new(CoreConfig::new(
        login_domain_from_env_value(std::env::var("MEDPORTAL_LOGIN_DOMAIN").ok()),
        min_password_len_from_env_value(std::env::var("MEDPORTAL_MIN_PASSWORD_LEN").ok())?,
        flag_from_env_value(std::env::var("MEDPORTAL_VALIDATE_SELECTIONS").ok(), true)?,
    )?);
    let session_idle = seconds_from_env_value(
        std::env::var("MEDPORTAL_SESSION_IDLE_SECS").ok(),
        DEFAULT_SESSION_IDLE_SECS,
    )?;
    let rest_addr =
        std::env::var("MEDPORTAL_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let directory = MemoryIdentityDirectory::new(cfg.min_password_len());
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());

    let seed = AdminSeed::from_env_values(
        std::env::var("MEDPORTAL_ADMIN_INSURANCE_NUMBER").ok(),
        std::env::var("MEDPORTAL_ADMIN_PASSWORD").ok(),
        std::env::var("MEDPORTAL_ADMIN_NAME").ok(),
    )?;
    match seed {
        Some(seed) => {
            let outcome =
                ensure_admin(cfg.clone(), Arc::new(directory.client()), store.clone(), seed)
                    .await?;
            if let AdminProvisioning::Created(account) = outcome {
                tracing::info!("++ Administrator {} provisioned", account.id);
            }
        }
        None => tracing::warn!("no administrator configured; the admin panel is unreachable"),
    }

    let clients: IdentityClients = Arc::new(move || -> Arc<dyn IdentityProvider> {
        Arc::new(directory.client())
    });
    let state =
        AppState::new(cfg, store, clients).with_idle_timeout(Duration::from_secs(session_idle));

    let rest_app = api_rest::router(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive());

    tracing::info!("++ Starting MedPortal REST on {}", rest_addr);
    tracing::info!("-- {}", HealthService::check_health().message);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, rest_app).await?;

    Ok(())
}
