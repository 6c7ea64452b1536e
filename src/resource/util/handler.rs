//! An abstraction layer interface for resource storage

use crate::resource::types::resource::{
    NewResource, Resource, ResourceDraft, ResourceFilter, ResourceId,
    MAX_RATING, MIN_RATING
};
use crate::shared::util::handler::StoreError;

use async_trait::async_trait;

/// Store side enforcement of the record invariants, independent of any
/// validation done before the call. Mirrors the CHECK constraints of the
/// postgres schema.
pub fn check_constraints(title: &str, resource_type: &str, subject: &str, age_group: &str,
        description: &str, rating: i16) -> Result<(), StoreError> {
    for (field, value) in [("title", title), ("type", resource_type), ("subject", subject),
            ("ageGroup", age_group), ("description", description)] {
        if value.trim().is_empty() {
            return Err(StoreError::Constraint { field: field.to_string(), message: "is required".to_string() });
        }
    }
    if !(MIN_RATING..=MAX_RATING).contains(&(rating as i64)) {
        return Err(StoreError::Constraint {
            field: "rating".to_string(),
            message: format!("must be between {MIN_RATING} and {MAX_RATING}")
        });
    }
    Ok(())
}

pub fn check_draft(draft: &ResourceDraft) -> Result<(), StoreError> {
    check_constraints(&draft.title, &draft.resource_type, &draft.subject, &draft.age_group,
        &draft.description, draft.rating)
}

pub fn check_resource(r: &Resource) -> Result<(), StoreError> {
    check_constraints(&r.title, &r.resource_type, &r.subject, &r.age_group, &r.description, r.rating)
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get_resource(&self, id: ResourceId) -> Result<Option<Resource>, StoreError>;
    /// Ordered by event date, newest first
    async fn find_resources(&self, filter: &ResourceFilter) -> Result<Vec<Resource>, StoreError>;

    async fn create_resource(&self, resource: &NewResource) -> Result<Resource, StoreError>;
    /// Writes every editable field and the approval flag of `resource`.
    /// The owner column is never written.
    async fn update_resource(&self, resource: &Resource) -> Result<Resource, StoreError>;
    async fn set_resource_approval(&self, id: ResourceId, approved: bool) -> Result<Resource, StoreError>;
    async fn delete_resource(&self, id: ResourceId) -> Result<(), StoreError>;
    /// Deletes `id` only while it is still pending. `Ok(false)` means the
    /// resource exists but is approved and was left in place.
    async fn delete_pending_resource(&self, id: ResourceId) -> Result<bool, StoreError>;
}
