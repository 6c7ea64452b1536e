use crate::auth::identity::Actor;
use crate::resource::service::ResourceService;
use crate::resource::types::resource::{Resource, ResourceId, ResourceInput, ResourcePatch, ResourceQuery};
use crate::shared::types::app::{decode_items, ApiError, BulkResponse, Response};

use actix_web::{
    get, post, put, patch, delete, HttpResponse, web::{self, Data}
};

use serde::{Serialize, Deserialize};
use serde_json::Value;


#[derive(Serialize)]
struct ResourcesReturn {
    resources: Vec<Resource>
}

// List approved resources, open to anyone
#[get("/v1/resources")]
async fn get_resources(service: Data<ResourceService>, params: web::Query<ResourceQuery>) -> Result<HttpResponse, ApiError> {
    let resources = service.get_all(params.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ResourcesReturn { resources }))
}

// The caller's own resources, pending ones included
#[get("/v1/resources/admin/mine")]
async fn get_my_resources(service: Data<ResourceService>, actor: Actor) -> Result<HttpResponse, ApiError> {
    let resources = service.get_mine(&actor.0).await?;
    Ok(HttpResponse::Ok().json(ResourcesReturn { resources }))
}

#[get("/v1/resources/admin/pending")]
async fn get_pending_resources(service: Data<ResourceService>, actor: Actor) -> Result<HttpResponse, ApiError> {
    let resources = service.get_pending(&actor.0).await?;
    Ok(HttpResponse::Ok().json(ResourcesReturn { resources }))
}

// Invalid credentials fall back to the anonymous view
#[get("/v1/resources/{id}")]
async fn get_resource(service: Data<ResourceService>, actor: Option<Actor>, path: web::Path<ResourceId>)
        -> Result<HttpResponse, ApiError> {
    let resource = service.get_by_id(path.into_inner(), actor.as_ref().map(|a| &a.0)).await?;
    Ok(HttpResponse::Ok().json(resource))
}

#[post("/v1/resources")]
async fn create_resource(service: Data<ResourceService>, actor: Actor, params: web::Json<ResourceInput>)
        -> Result<HttpResponse, ApiError> {
    let resource = service.create(params.into_inner(), Some(&actor.0)).await?;
    Ok(HttpResponse::Created().json(resource))
}

#[put("/v1/resources/{id}")]
async fn update_resource(service: Data<ResourceService>, actor: Actor, path: web::Path<ResourceId>,
        params: web::Json<ResourcePatch>) -> Result<HttpResponse, ApiError> {
    let resource = service.update(path.into_inner(), params.into_inner(), &actor.0).await?;
    Ok(HttpResponse::Ok().json(resource))
}

#[delete("/v1/resources/{id}")]
async fn delete_resource(service: Data<ResourceService>, actor: Actor, path: web::Path<ResourceId>)
        -> Result<HttpResponse, ApiError> {
    service.delete(path.into_inner(), &actor.0).await?;
    Ok(HttpResponse::Ok().json(Response { msg: "Deleted".to_string() }))
}

#[patch("/v1/resources/{id}/approve")]
async fn approve_resource(service: Data<ResourceService>, actor: Actor, path: web::Path<ResourceId>)
        -> Result<HttpResponse, ApiError> {
    let resource = service.approve(path.into_inner(), &actor.0).await?;
    Ok(HttpResponse::Ok().json(resource))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RejectReturn {
    msg: String,
    resource: Resource
}

#[put("/v1/resources/{id}/reject")]
async fn reject_resource(service: Data<ResourceService>, actor: Actor, path: web::Path<ResourceId>)
        -> Result<HttpResponse, ApiError> {
    let resource = service.reject(path.into_inner(), &actor.0).await?;
    Ok(HttpResponse::Ok().json(RejectReturn { msg: "Rejected and removed".to_string(), resource }))
}

// Bulk endpoints answer 200 with per-item outcomes even when some items fail
#[post("/v1/resources/bulk")]
async fn bulk_create_resources(service: Data<ResourceService>, actor: Actor, params: web::Json<Vec<Value>>)
        -> Result<HttpResponse, ApiError> {
    let results = service.bulk_create(decode_items(params.into_inner()), &actor.0).await?;
    Ok(HttpResponse::Ok().json(BulkResponse::from_results(results)))
}

#[post("/v1/resources/bulk-update")]
async fn bulk_update_resources(service: Data<ResourceService>, actor: Actor, params: web::Json<Vec<Value>>)
        -> Result<HttpResponse, ApiError> {
    let results = service.bulk_update(decode_items(params.into_inner()), &actor.0).await?;
    Ok(HttpResponse::Ok().json(BulkResponse::from_results(results)))
}

#[derive(Deserialize)]
struct BulkDeleteForm {
    ids: Vec<ResourceId>
}

#[post("/v1/resources/bulk-delete")]
async fn bulk_delete_resources(service: Data<ResourceService>, actor: Actor, params: web::Json<BulkDeleteForm>)
        -> Result<HttpResponse, ApiError> {
    let results = service.bulk_delete(params.into_inner().ids, &actor.0).await?;
    Ok(HttpResponse::Ok().json(BulkResponse::from_results(results)))
}
