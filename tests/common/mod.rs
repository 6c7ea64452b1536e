// Shared fixtures for the integration tests
#![allow(dead_code)]

use eduresource_server::auth::identity::CredentialVerifier;
use eduresource_server::resource::service::ResourceService;
use eduresource_server::resource::types::resource::ResourceInput;
use eduresource_server::shared::handlers::debug_handler::DebugHandler;
use eduresource_server::shared::service::UserService;
use eduresource_server::shared::types::account::{NewUser, Role, User};
use eduresource_server::shared::types::app::ApiError;
use eduresource_server::shared::util::config::LimitsConfig;
use eduresource_server::shared::util::handler::UserStore;

use async_trait::async_trait;
use std::sync::Arc;

pub const WEBHOOK_SECRET: &str = "whsec_test";

/// Accepts `token-<external id>` and nothing else
pub struct StaticVerifier;

#[async_trait]
impl CredentialVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<String, ApiError> {
        token.strip_prefix("token-")
            .map(str::to_string)
            .ok_or_else(|| ApiError::Unauthenticated("Missing or invalid credentials".to_string()))
    }
}

pub struct Fixture {
    pub store: Arc<DebugHandler>,
    pub resources: ResourceService,
    pub users: UserService
}

impl Fixture {
    pub fn new() -> Fixture {
        Fixture::with_limits(LimitsConfig::default())
    }

    pub fn with_limits(limits: LimitsConfig) -> Fixture {
        let store = Arc::new(DebugHandler::new());
        Fixture {
            resources: ResourceService::new(store.clone(), limits.clone()),
            users: UserService::new(store.clone(), limits),
            store
        }
    }

    pub async fn user(&self, name: &str, role: Role, approved: bool) -> User {
        self.store.create_user(&NewUser {
            external_id: name.to_string(),
            email: format!("{name}@example.com"),
            first_name: None,
            last_name: None,
            role,
            is_approved: approved
        }).await.unwrap()
    }
}

pub fn bearer(user: &User) -> (&'static str, String) {
    ("Authorization", format!("Bearer token-{}", user.external_id))
}

pub fn sample_input(title: &str) -> ResourceInput {
    ResourceInput {
        title: Some(title.to_string()),
        resource_type: Some("Activity".to_string()),
        subject: Some("Math".to_string()),
        age_group: Some("3-4".to_string()),
        rating: Some(3),
        description: Some("d".to_string()),
        event_date: Some("2025-01-01".to_string()),
        image_url: None
    }
}
