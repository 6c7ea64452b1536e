use crate::auth::identity::Actor;
use crate::auth::webhook::{SignatureValidator, SIGNATURE_HEADER};
use crate::shared::service::{SyncOutcome, UserService};
use crate::shared::types::account::{Role, User, UserFilter, UserId};
use crate::shared::types::app::{decode_items, ApiError, BulkResponse, Response, ValidationErrors};
use crate::shared::types::provider::ProviderEvent;

use actix_web::{
    get, post, patch, delete, HttpResponse, web::{self, Data}, HttpRequest
};

use serde::{Serialize, Deserialize};
use serde_json::Value;


#[get("/v1/users/me")]
async fn get_me(actor: Actor) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(actor.0))
}

#[derive(Serialize)]
struct UsersReturn {
    users: Vec<User>
}

#[get("/v1/users")]
async fn get_users(service: Data<UserService>, actor: Actor, params: web::Query<UserFilter>) -> Result<HttpResponse, ApiError> {
    let users = service.list(params.into_inner(), &actor.0).await?;
    Ok(HttpResponse::Ok().json(UsersReturn { users }))
}

#[derive(Deserialize)]
struct RoleForm {
    role: Role
}

#[patch("/v1/users/{id}/role")]
async fn change_user_role(service: Data<UserService>, actor: Actor, path: web::Path<UserId>,
        params: web::Json<RoleForm>) -> Result<HttpResponse, ApiError> {
    let user = service.change_role(path.into_inner(), params.role, &actor.0).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApproveForm {
    #[serde(default = "approve_by_default")]
    is_approved: bool
}

fn approve_by_default() -> bool { true }

// The body is optional; a bare PATCH approves
#[patch("/v1/users/{id}/approve")]
async fn approve_user(service: Data<UserService>, actor: Actor, path: web::Path<UserId>, body: web::Bytes)
        -> Result<HttpResponse, ApiError> {
    let params: ApproveForm = if body.iter().all(u8::is_ascii_whitespace) {
        ApproveForm { is_approved: true }
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::Validation(ValidationErrors::single("body", e.to_string())))?
    };
    let user = service.set_approval(path.into_inner(), params.is_approved, &actor.0).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[post("/v1/users/bulk")]
async fn bulk_create_users(service: Data<UserService>, actor: Actor, params: web::Json<Vec<Value>>)
        -> Result<HttpResponse, ApiError> {
    let results = service.bulk_create(decode_items(params.into_inner()), &actor.0).await?;
    Ok(HttpResponse::Ok().json(BulkResponse::from_results(results)))
}

#[delete("/v1/users/{id}")]
async fn delete_user(service: Data<UserService>, actor: Actor, path: web::Path<UserId>) -> Result<HttpResponse, ApiError> {
    service.delete(path.into_inner(), &actor.0).await?;
    Ok(HttpResponse::Ok().json(Response { msg: "Deleted".to_string() }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncReturn {
    msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<User>
}

// Identity provider sync. The signature covers the raw body, so it is
// checked before any parsing.
#[post("/v1/webhooks/identity")]
async fn identity_webhook(service: Data<UserService>, validator: Data<SignatureValidator>, req: HttpRequest,
        body: web::Bytes) -> Result<HttpResponse, ApiError> {
    let signature = req.headers().get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    validator.verify(&body, signature)?;

    let event: ProviderEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(ValidationErrors::single("body", e.to_string())))?;
    let response = match service.sync(event).await? {
        SyncOutcome::Upserted(user) => SyncReturn { msg: "Synced".to_string(), user: Some(user) },
        SyncOutcome::Deleted { existed: true, .. } => SyncReturn { msg: "Deleted".to_string(), user: None },
        SyncOutcome::Deleted { existed: false, .. } => SyncReturn { msg: "Unknown user".to_string(), user: None },
        SyncOutcome::Ignored(event_type) => SyncReturn { msg: format!("Ignored {event_type}"), user: None }
    };
    Ok(HttpResponse::Ok().json(response))
}
