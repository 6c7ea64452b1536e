//! Maps an inbound bearer credential to a local `User`

use crate::shared::types::account::User;
use crate::shared::types::app::ApiError;
use crate::shared::util::handler::UserStore;

use actix_web::{dev::Payload, http::header, web::Data, FromRequest, HttpRequest};
use async_trait::async_trait;
use futures::future::LocalBoxFuture;
use std::sync::Arc;

/// Checks a raw credential and returns the provider's subject id
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<String, ApiError>;
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthenticated("Missing or invalid credentials".to_string())
}

pub struct IdentityResolver {
    verifier: Arc<dyn CredentialVerifier>,
    users: Arc<dyn UserStore>
}

impl IdentityResolver {
    pub fn new(verifier: Arc<dyn CredentialVerifier>, users: Arc<dyn UserStore>) -> IdentityResolver {
        IdentityResolver { verifier, users }
    }

    /// Token part of an `Authorization: Bearer <token>` value
    pub fn bearer_token(header_value: &str) -> Option<&str> {
        let (scheme, token) = header_value.trim().split_once(' ')?;
        let token = token.trim();
        if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
            Some(token)
        } else {
            None
        }
    }

    pub async fn resolve(&self, authorization: Option<&str>) -> Result<User, ApiError> {
        let token = authorization
            .and_then(Self::bearer_token)
            .ok_or_else(invalid_credentials)?;
        let external_id = self.verifier.verify(token).await?;

        match self.users.get_user_by_external_id(&external_id).await? {
            Some(user) => Ok(user),
            None => {
                log::info!("verified subject {external_id} has no local account");
                Err(ApiError::Unauthenticated("Account is not registered".to_string()))
            }
        }
    }
}

/// The authenticated caller. Use `Option<Actor>` on routes that are open
/// to anonymous callers.
#[derive(Clone, Debug)]
pub struct Actor(pub User);

impl FromRequest for Actor {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let resolver = req.app_data::<Data<IdentityResolver>>().cloned();
        let authorization = req.headers().get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Box::pin(async move {
            let resolver = resolver
                .ok_or_else(|| ApiError::Store("identity resolver is not registered".to_string()))?;
            resolver.resolve(authorization.as_deref()).await.map(Actor)
        })
    }
}
