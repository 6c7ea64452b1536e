//! An abstraction layer interface for account storage
use crate::shared::types::account::{NewUser, ProviderProfile, Role, User, UserFilter, UserId};
use crate::shared::types::app::{ApiError, ValidationErrors};

use async_trait::async_trait;
use thiserror::Error;

/// Failures reported by any store implementation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    /// A field broke a constraint the store enforces itself
    #[error("constraint violated on `{field}`: {message}")]
    Constraint { field: String, message: String },

    #[error(transparent)]
    Database(#[from] sqlx::Error)
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound("Record not found".to_string()),
            StoreError::Conflict(msg) => ApiError::InvalidState(msg),
            StoreError::Constraint { field, message } =>
                ApiError::Validation(ValidationErrors::single(&field, message)),
            StoreError::Database(e) => ApiError::Store(e.to_string())
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;
    async fn get_user_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError>;
    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>, StoreError>;

    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError>;
    /// Insert or refresh profile fields keyed by external id. New rows start
    /// as unapproved `user`s; role and approval of existing rows are kept.
    async fn upsert_provider_user(&self, profile: &ProviderProfile) -> Result<User, StoreError>;

    async fn set_role(&self, id: UserId, role: Role) -> Result<User, StoreError>;
    async fn set_approved(&self, id: UserId, approved: bool) -> Result<User, StoreError>;

    async fn delete_user(&self, id: UserId) -> Result<(), StoreError>;
    /// Returns whether a row was removed
    async fn delete_user_by_external_id(&self, external_id: &str) -> Result<bool, StoreError>;
}
