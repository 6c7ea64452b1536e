use crate::shared::types::account::User;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Serialize)]
pub struct Response {
    pub msg: String
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, Vec<String>>>
}

/// Field name -> messages for every rule a payload broke
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ValidationErrors {
    pub fields: BTreeMap<String, Vec<String>>
}

impl ValidationErrors {
    pub fn new() -> Self { Self::default() }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool { self.fields.is_empty() }

    pub fn has(&self, field: &str) -> bool { self.fields.contains_key(field) }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let parts: Vec<String> = self.fields.iter()
            .flat_map(|(field, msgs)| msgs.iter().map(move |m| format!("{field}: {m}")))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("Account is awaiting approval")]
    Unapproved,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("{0}")]
    InvalidState(String),

    /// Carries the internal cause for logs only, see `public_message`
    #[error("Store error: {0}")]
    Store(String)
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::Unapproved => "unapproved",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "notFound",
            ApiError::Validation(_) => "validationError",
            ApiError::InvalidState(_) => "invalidState",
            ApiError::Store(_) => "storeError"
        }
    }

    pub fn public_message(&self) -> String {
        match self {
            ApiError::Store(_) => "Internal server error".to_string(),
            ApiError::Validation(_) => "Validation failed".to_string(),
            other => other.to_string()
        }
    }

    pub fn to_body(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.public_message(),
            kind: self.kind(),
            fields: match self {
                ApiError::Validation(errors) => Some(errors.fields.clone()),
                _ => None
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Unapproved | ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidState(_) => StatusCode::CONFLICT,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.to_body())
    }
}

/// Log a failed operation with who attempted it, then hand the error back
pub fn audit_failure(actor: Option<&User>, action: &str, err: ApiError) -> ApiError {
    let actor_id = actor.map_or("anonymous".to_string(), |a| a.id.to_string());
    match &err {
        ApiError::Store(cause) => log::error!("actor={actor_id} action={action} store failure: {cause}"),
        other => log::warn!("actor={actor_id} action={action} denied: {}", other.kind())
    }
    err
}

/// One entry of a bulk response: the item index in the request plus either
/// the produced value or the reason it failed.
#[derive(Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ItemOutcome<T: Serialize> {
    Success { index: usize, item: T },
    Failure { index: usize, error: ErrorResponse }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResponse<T: Serialize> {
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<ItemOutcome<T>>
}

impl<T: Serialize> BulkResponse<T> {
    pub fn from_results(results: Vec<Result<T, ApiError>>) -> Self {
        let mut succeeded = 0;
        let mut failed = 0;
        let results = results.into_iter().enumerate().map(|(index, r)| match r {
            Ok(item) => { succeeded += 1; ItemOutcome::Success { index, item } },
            Err(err) => { failed += 1; ItemOutcome::Failure { index, error: err.to_body() } }
        }).collect();
        BulkResponse { succeeded, failed, results }
    }
}

/// Decode each element of a bulk body on its own so one malformed item
/// fails alone instead of rejecting the request.
pub fn decode_items<T: DeserializeOwned>(items: Vec<Value>) -> Vec<Result<T, ApiError>> {
    items.into_iter()
        .map(|item| serde_json::from_value(item)
            .map_err(|e| ApiError::Validation(ValidationErrors::single("item", e.to_string()))))
        .collect()
}
