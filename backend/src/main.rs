mod auth;
mod config;
mod endpoints;
mod error;
mod formatter;
mod geotag;
mod relay;
mod routes;
mod upload;

use actix_cors::Cors;
use actix_web::middleware::DefaultHeaders;
use actix_web::{App, HttpServer, web};
use auth::middleware::BasicAuthMiddleware;
use auth::models::BasicAuthUsers;
use auth::wagri_service::{CredentialProvider, WagriTokenService};
use config::{AppConfig, ConfigError, read_secret};
use endpoints::{AuthMode, EndpointRegistry};
use relay::DiagnosisRelay;
use relay::client::{HttpClassifierClient, VendorIdentity};
use routes::{DiagnosisState, configure_routes};
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use url::Url;

fn startup_error(e: impl std::fmt::Display) -> std::io::Error {
    log::error!("Startup failed: {}", e);
    std::io::Error::other(e.to_string())
}

#[derive(Clone)]
struct WagriAccess {
    credentials: Arc<dyn CredentialProvider>,
    vendor: VendorIdentity,
}

fn load_wagri_access(config: &AppConfig, http_client: &reqwest::Client) -> Result<WagriAccess, Box<dyn Error>> {
    let wagri = &config.wagri;
    let token_url = Url::parse(&wagri.token_url)
        .map_err(|e| ConfigError::Invalid("wagri.token_url", e.to_string()))?;
    let credentials = WagriTokenService::new(
        http_client.clone(),
        token_url,
        read_secret(&wagri.client_id_file)?,
        read_secret(&wagri.client_secret_file)?,
    );
    Ok(WagriAccess {
        credentials: Arc::new(credentials),
        vendor: VendorIdentity {
            vendor_id: read_secret(&wagri.vendor_id_file)?,
            user_id: wagri.header_user_id.clone(),
        },
    })
}

fn build_relays(
    config: &AppConfig,
    registry: &EndpointRegistry,
    http_client: &reqwest::Client,
) -> Result<HashMap<String, DiagnosisRelay>, Box<dyn Error>> {
    let mut wagri_access: Option<WagriAccess> = None;
    let mut relays = HashMap::with_capacity(config.relays.len());

    for (route, relay_config) in &config.relays {
        let endpoint = registry.resolve(&relay_config.classifier)?;
        let policy = config.retry_policy(relay_config);
        let identity = config.wagri.asset_identity();

        let relay = match endpoint.auth_mode {
            AuthMode::None => {
                let client = HttpClassifierClient::new(http_client.clone(), None);
                DiagnosisRelay::new(endpoint, Arc::new(client), policy)
            }
            AuthMode::WagriBearer => {
                let access = match wagri_access.clone() {
                    Some(access) => access,
                    None => {
                        let access = load_wagri_access(config, http_client)?;
                        wagri_access = Some(access.clone());
                        access
                    }
                };
                let client = HttpClassifierClient::new(http_client.clone(), Some(access.vendor));
                DiagnosisRelay::new(endpoint, Arc::new(client), policy)
                    .with_credentials(access.credentials)
            }
        }
        .with_identity(identity);

        log::info!(
            "POST /api/diagnose/{} -> {} ({})",
            route,
            relay.endpoint().kind,
            relay.endpoint().url
        );
        relays.insert(route.clone(), relay);
    }
    Ok(relays)
}

fn load_users(config: &AppConfig) -> Result<BasicAuthUsers, ConfigError> {
    let path = &config.server.users_file;
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.clone(), e))?;
    Ok(BasicAuthUsers::from_json(&raw)?)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::load().map_err(startup_error)?;
    let registry = config
        .url_overrides()
        .map_err(startup_error)
        .and_then(|overrides| EndpointRegistry::new(&overrides).map_err(startup_error))?;

    let http_client = reqwest::Client::new();
    let relays = build_relays(&config, &registry, &http_client).map_err(startup_error)?;
    let state = web::Data::new(DiagnosisState::new(relays, config.server.upload_dir.clone()));

    let users = load_users(&config).map_err(startup_error)?;
    if users.is_empty() {
        log::warn!("No users configured; every request will be rejected");
    }
    let auth_middleware = BasicAuthMiddleware::new(users);

    let static_dir = Some(config.server.static_dir.clone()).filter(|dir| dir.is_dir());
    match &static_dir {
        Some(dir) => log::info!("Serving client assets from {}", dir.display()),
        None => log::warn!(
            "Static directory {} not found, client assets are not served",
            config.server.static_dir.display()
        ),
    }

    let allowed_origin = config.server.allowed_origin.clone();
    let bind_address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Frame-Options", "SAMEORIGIN"))
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("Referrer-Policy", "no-referrer")),
            )
            .wrap(
                Cors::default()
                    .allowed_origin(&allowed_origin)
                    .allowed_methods(vec!["GET", "POST"])
                    .max_age(3600),
            )
            .wrap(auth_middleware.clone())
            .app_data(state.clone())
            .configure(|cfg| configure_routes(cfg, static_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
