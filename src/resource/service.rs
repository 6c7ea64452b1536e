//! Resource operations: authorization, validation and the approval rules
//! applied in front of the store.

use crate::auth::policy::{self, Action};
use crate::resource::approval::{self, ApprovalState, Effect, Transition};
use crate::resource::types::resource::{
    NewResource, Resource, ResourceFilter, ResourceId, ResourceInput, ResourcePatch, ResourceQuery
};
use crate::resource::util::handler::ResourceStore;
use crate::shared::types::account::User;
use crate::shared::types::app::{audit_failure, ApiError, ValidationErrors};
use crate::shared::util::config::LimitsConfig;

use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

/// One entry of a bulk update request
#[derive(Clone, Debug, Deserialize)]
pub struct BulkUpdateItem {
    pub id: ResourceId,
    #[serde(flatten)]
    pub patch: ResourcePatch
}

pub struct ResourceService {
    store: Arc<dyn ResourceStore>,
    limits: LimitsConfig
}

impl ResourceService {
    pub fn new(store: Arc<dyn ResourceStore>, limits: LimitsConfig) -> ResourceService {
        ResourceService { store, limits }
    }

    async fn load(&self, id: ResourceId) -> Result<Resource, ApiError> {
        self.store.get_resource(id).await?
            .ok_or_else(|| ApiError::NotFound(format!("Resource {id} does not exist")))
    }

    /// Role and account checks shared by every operation that needs an actor
    fn gate(actor: &User, action: Action) -> Result<(), ApiError> {
        policy::authorize_role(actor, action)?;
        policy::require_approved(actor)?;
        Ok(())
    }

    fn check_batch_size(&self, len: usize) -> Result<(), ApiError> {
        if len > self.limits.max_bulk_items {
            return Err(ApiError::Validation(ValidationErrors::single("items",
                format!("at most {} items per request", self.limits.max_bulk_items))));
        }
        Ok(())
    }

    fn page(&self, offset: Option<u32>, limit: Option<u32>) -> (u32, Option<u32>) {
        let limit = limit.unwrap_or(self.limits.default_page_size).min(self.limits.max_page_size);
        (offset.unwrap_or(0), Some(limit))
    }

    // ------------------- Writes ---------------------

    /// `actor` is `None` only for system seeding, which bypasses the policy
    /// and always yields approved content.
    pub async fn create(&self, input: ResourceInput, actor: Option<&User>) -> Result<Resource, ApiError> {
        self.try_create(input, actor).await
            .map_err(|e| audit_failure(actor, Action::CreateResource.as_str(), e))
    }

    async fn try_create(&self, input: ResourceInput, actor: Option<&User>) -> Result<Resource, ApiError> {
        if let Some(actor) = actor {
            Self::gate(actor, Action::CreateResource)?;
        }
        let draft = input.validate().map_err(ApiError::Validation)?;

        let new = NewResource {
            draft,
            is_approved: approval::initial_state(actor).is_approved(),
            owner_user_id: actor.map(|a| a.id)
        };
        let created = self.store.create_resource(&new).await?;
        log::info!("actor={} created resource {} (approved: {})",
            actor.map_or("system".to_string(), |a| a.id.to_string()), created.id, created.is_approved);
        Ok(created)
    }

    pub async fn update(&self, id: ResourceId, patch: ResourcePatch, actor: &User) -> Result<Resource, ApiError> {
        self.try_update(id, patch, actor).await
            .map_err(|e| audit_failure(Some(actor), Action::UpdateResource.as_str(), e))
    }

    async fn try_update(&self, id: ResourceId, patch: ResourcePatch, actor: &User) -> Result<Resource, ApiError> {
        Self::gate(actor, Action::UpdateResource)?;
        let changes = patch.validate().map_err(ApiError::Validation)?;

        let mut resource = self.load(id).await?;
        policy::authorize(actor, Action::UpdateResource, Some(&resource))?;

        let state = approval::state_after_edit(ApprovalState::of(&resource), actor);
        resource.apply(changes);
        resource.is_approved = state.is_approved();
        resource.edited = Utc::now();

        let updated = self.store.update_resource(&resource).await?;
        log::info!("actor={} updated resource {id} (approved: {})", actor.id, updated.is_approved);
        Ok(updated)
    }

    pub async fn delete(&self, id: ResourceId, actor: &User) -> Result<(), ApiError> {
        self.try_delete(id, actor).await
            .map_err(|e| audit_failure(Some(actor), Action::DeleteResource.as_str(), e))
    }

    async fn try_delete(&self, id: ResourceId, actor: &User) -> Result<(), ApiError> {
        Self::gate(actor, Action::DeleteResource)?;
        let resource = self.load(id).await?;
        policy::authorize(actor, Action::DeleteResource, Some(&resource))?;
        self.store.delete_resource(id).await?;
        log::info!("actor={} deleted resource {id}", actor.id);
        Ok(())
    }

    /// Idempotent: approving an approved resource returns it unchanged
    pub async fn approve(&self, id: ResourceId, actor: &User) -> Result<Resource, ApiError> {
        self.try_approve(id, actor).await
            .map_err(|e| audit_failure(Some(actor), Action::ApproveResource.as_str(), e))
    }

    async fn try_approve(&self, id: ResourceId, actor: &User) -> Result<Resource, ApiError> {
        Self::gate(actor, Action::ApproveResource)?;
        let resource = self.load(id).await?;
        policy::authorize(actor, Action::ApproveResource, Some(&resource))?;

        match approval::transition(ApprovalState::of(&resource), Transition::Approve)? {
            Effect::MarkApproved => {
                let approved = self.store.set_resource_approval(id, true).await?;
                log::info!("actor={} approved resource {id}", actor.id);
                Ok(approved)
            },
            Effect::Unchanged | Effect::Delete => Ok(resource)
        }
    }

    /// Rejection deletes the resource; the removed record is returned
    pub async fn reject(&self, id: ResourceId, actor: &User) -> Result<Resource, ApiError> {
        self.try_reject(id, actor).await
            .map_err(|e| audit_failure(Some(actor), Action::RejectResource.as_str(), e))
    }

    async fn try_reject(&self, id: ResourceId, actor: &User) -> Result<Resource, ApiError> {
        Self::gate(actor, Action::RejectResource)?;
        let resource = self.load(id).await?;
        policy::authorize(actor, Action::RejectResource, Some(&resource))?;

        match approval::transition(ApprovalState::of(&resource), Transition::Reject)? {
            Effect::Delete => {
                // Guarded delete: an approval landing after the load wins
                if !self.store.delete_pending_resource(id).await? {
                    return Err(ApiError::InvalidState(format!("Resource {id} was approved and cannot be rejected")));
                }
                log::info!("actor={} rejected resource {id}", actor.id);
            },
            Effect::MarkApproved | Effect::Unchanged => ()
        }
        Ok(resource)
    }

    // ------------------- Bulk ---------------------
    // Each item runs through the single item path. A failed item is reported
    // in place and never undoes the items before it. Items the transport
    // could not decode arrive as `Err` and are reported the same way.

    pub async fn bulk_create(&self, items: Vec<Result<ResourceInput, ApiError>>, actor: &User)
            -> Result<Vec<Result<Resource, ApiError>>, ApiError> {
        Self::gate(actor, Action::CreateResource)
            .and_then(|_| self.check_batch_size(items.len()))
            .map_err(|e| audit_failure(Some(actor), "bulk_create_resources", e))?;

        let mut results = Vec::with_capacity(items.len());
        for item in items {
            results.push(match item {
                Ok(input) => self.create(input, Some(actor)).await,
                Err(e) => Err(audit_failure(Some(actor), Action::CreateResource.as_str(), e))
            });
        }
        Ok(results)
    }

    pub async fn bulk_update(&self, items: Vec<Result<BulkUpdateItem, ApiError>>, actor: &User)
            -> Result<Vec<Result<Resource, ApiError>>, ApiError> {
        Self::gate(actor, Action::UpdateResource)
            .and_then(|_| self.check_batch_size(items.len()))
            .map_err(|e| audit_failure(Some(actor), "bulk_update_resources", e))?;

        let mut results = Vec::with_capacity(items.len());
        for item in items {
            results.push(match item {
                Ok(item) => self.update(item.id, item.patch, actor).await,
                Err(e) => Err(audit_failure(Some(actor), Action::UpdateResource.as_str(), e))
            });
        }
        Ok(results)
    }

    pub async fn bulk_delete(&self, ids: Vec<ResourceId>, actor: &User)
            -> Result<Vec<Result<ResourceId, ApiError>>, ApiError> {
        Self::gate(actor, Action::DeleteResource)
            .and_then(|_| self.check_batch_size(ids.len()))
            .map_err(|e| audit_failure(Some(actor), "bulk_delete_resources", e))?;

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            results.push(self.delete(id, actor).await.map(|_| id));
        }
        Ok(results)
    }

    // ------------------- Reads ---------------------

    /// Public listing, approved content only whoever is asking
    pub async fn get_all(&self, query: ResourceQuery) -> Result<Vec<Resource>, ApiError> {
        let (offset, limit) = self.page(query.offset, query.limit);
        let filter = ResourceFilter {
            approved: Some(true),
            resource_type: query.resource_type,
            subject: query.subject,
            age_group: query.age_group,
            event_from: query.from,
            event_to: query.to,
            query: query.q.filter(|q| !q.trim().is_empty()),
            offset,
            limit,
            ..Default::default()
        };
        self.store.find_resources(&filter).await
            .map_err(|e| audit_failure(None, "list_resources", e.into()))
    }

    /// Pending resources are only visible to those who could act on them;
    /// everyone else gets `NotFound`.
    pub async fn get_by_id(&self, id: ResourceId, actor: Option<&User>) -> Result<Resource, ApiError> {
        let resource = self.load(id).await?;
        if ApprovalState::of(&resource).is_approved() {
            return Ok(resource);
        }
        match actor {
            Some(actor) if actor.is_approved
                && policy::can_perform(actor, Action::ViewUnapprovedResource, Some(&resource)) => Ok(resource),
            _ => Err(ApiError::NotFound(format!("Resource {id} does not exist")))
        }
    }

    /// The caller's own resources in any state
    pub async fn get_mine(&self, actor: &User) -> Result<Vec<Resource>, ApiError> {
        Self::gate(actor, Action::ViewOwnResources)
            .map_err(|e| audit_failure(Some(actor), Action::ViewOwnResources.as_str(), e))?;
        let filter = ResourceFilter { owner: Some(actor.id), ..Default::default() };
        Ok(self.store.find_resources(&filter).await?)
    }

    /// The moderation queue
    pub async fn get_pending(&self, actor: &User) -> Result<Vec<Resource>, ApiError> {
        Self::gate(actor, Action::ViewPendingQueue)
            .map_err(|e| audit_failure(Some(actor), Action::ViewPendingQueue.as_str(), e))?;
        let filter = ResourceFilter { approved: Some(false), ..Default::default() };
        Ok(self.store.find_resources(&filter).await?)
    }
}
