use actix_web::{
    HttpResponse, web::{self, Data},
    middleware, App, HttpRequest, HttpServer, Result
};
use actix_cors::Cors;
use actix_governor::{Governor, GovernorConfigBuilder};
use std::io::{Error as IoError, ErrorKind};
use std::sync::Arc;
use std::time;

use crate::shared::util::config::{self, LimitsConfig};
use crate::shared::util::handler::UserStore;
use crate::resource::util::handler::ResourceStore;

use crate::shared::handlers::debug_handler::DebugHandler;
use crate::shared::handlers::postgres_handler::PostgresHandler as SharedPostgresHandler;
use crate::resource::handlers::postgres_handler::PostgresHandler as ResourcePostgresHandler;

use crate::auth::identity::{CredentialVerifier, IdentityResolver};
use crate::auth::jwks::JwksVerifier;
use crate::auth::webhook::SignatureValidator;
use crate::resource::service::ResourceService;
use crate::shared::service::UserService;

use crate::shared::app as shared_app;
use crate::resource::app as resource_app;

use crate::shared::types::app::{ApiError, ValidationErrors};


pub async fn not_found() -> Result<HttpResponse, ApiError> {
    Err(ApiError::NotFound("Route not found".to_string()))
}

fn routes(app: &mut web::ServiceConfig) {
    app
        // Users
        .service(shared_app::get_me)
        .service(shared_app::get_users)
        .service(shared_app::bulk_create_users)
        .service(shared_app::change_user_role)
        .service(shared_app::approve_user)
        .service(shared_app::delete_user)
        .service(shared_app::identity_webhook)

        // Resources, fixed paths ahead of `{id}`
        .service(resource_app::get_resources)
        .service(resource_app::create_resource)
        .service(resource_app::get_my_resources)
        .service(resource_app::get_pending_resources)
        .service(resource_app::bulk_create_resources)
        .service(resource_app::bulk_update_resources)
        .service(resource_app::bulk_delete_resources)
        .service(resource_app::get_resource)
        .service(resource_app::update_resource)
        .service(resource_app::delete_resource)
        .service(resource_app::approve_resource)
        .service(resource_app::reject_resource);
}

// Extractor failures answer with the same error body as everything else
fn extractor_errors(app: &mut web::ServiceConfig) {
    app
        .app_data(web::JsonConfig::default().error_handler(|err, _req| {
            ApiError::Validation(ValidationErrors::single("body", err.to_string())).into()
        }))
        .app_data(web::QueryConfig::default().error_handler(|err, _req| {
            ApiError::Validation(ValidationErrors::single("query", err.to_string())).into()
        }))
        .app_data(web::PathConfig::default().error_handler(|_err, req: &HttpRequest| {
            ApiError::NotFound(format!("No record at {}", req.path())).into()
        }));
}

/// Everything a worker needs, built once and cloned into each worker
#[derive(Clone)]
pub struct AppData {
    pub resources: Data<ResourceService>,
    pub users: Data<UserService>,
    pub identity: Data<IdentityResolver>,
    pub webhook: Data<SignatureValidator>
}

impl AppData {
    pub fn new(user_store: Arc<dyn UserStore>, resource_store: Arc<dyn ResourceStore>,
            verifier: Arc<dyn CredentialVerifier>, webhook_secret: &str, limits: LimitsConfig) -> AppData {
        AppData {
            resources: Data::new(ResourceService::new(resource_store, limits.clone())),
            users: Data::new(UserService::new(user_store.clone(), limits)),
            identity: Data::new(IdentityResolver::new(verifier, user_store)),
            webhook: Data::new(SignatureValidator::new(webhook_secret))
        }
    }

    /// Registers state, extractor config and every route
    pub fn configure(&self, app: &mut web::ServiceConfig) {
        app
            .app_data(self.resources.clone())
            .app_data(self.users.clone())
            .app_data(self.identity.clone())
            .app_data(self.webhook.clone());
        extractor_errors(app);
        routes(app);
    }
}

fn io_error(context: &str, err: impl std::fmt::Display) -> IoError {
    IoError::new(ErrorKind::Other, format!("{context}: {err}"))
}

async fn build_stores(in_memory: bool) -> std::io::Result<(Arc<dyn UserStore>, Arc<dyn ResourceStore>)> {
    if in_memory {
        log::warn!("server.in_memory is set, nothing will be persisted");
        let handler = Arc::new(DebugHandler::new());
        let users: Arc<dyn UserStore> = handler.clone();
        let resources: Arc<dyn ResourceStore> = handler;
        return Ok((users, resources));
    }

    let users = SharedPostgresHandler::new().await.map_err(|e| io_error("connecting to postgres", e))?;
    let resources = ResourcePostgresHandler::new().await.map_err(|e| io_error("connecting to postgres", e))?;

    // Resources reference users, so users go first
    users.init().await.map_err(|e| io_error("creating users table", e))?;
    resources.init().await.map_err(|e| io_error("creating resources table", e))?;
    let users: Arc<dyn UserStore> = Arc::new(users);
    let resources: Arc<dyn ResourceStore> = Arc::new(resources);
    Ok((users, resources))
}

pub async fn start() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    let config = config::get_config();
    if config.server.log {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let (user_store, resource_store) = build_stores(config.server.in_memory).await?;
    let verifier = JwksVerifier::from_config(&config.auth)
        .map_err(|e| IoError::new(ErrorKind::InvalidInput, e))?;
    let data = AppData::new(user_store, resource_store, Arc::new(verifier),
        &config.auth.webhook_secret, config.limits.clone());

    let governor_conf = GovernorConfigBuilder::default()
        .per_millisecond(config.server.request_quota_replenish_ms)
        .burst_size(config.server.request_quota)
        .finish()
        .ok_or_else(|| IoError::new(ErrorKind::InvalidInput, "request_quota and request_quota_replenish_ms must be non-zero"))?;

    log::info!("starting HTTP server at http://{}:{}", config.server.host, config.server.port);

    HttpServer::new(move || {
        let data = data.clone();
        App::new()
            .configure(|app| data.configure(app))
            .wrap(Governor::new(&governor_conf))
            .wrap(Cors::permissive())
            .wrap(middleware::NormalizePath::trim())
            .wrap(middleware::Logger::default())
            .default_service(web::route().to(not_found))
    })
        .keep_alive(time::Duration::from_secs(30))
        .bind((config.server.host.as_str(), config.server.port))?
        .run().await
}
