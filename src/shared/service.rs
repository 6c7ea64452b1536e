//! Account operations: role changes, approval, provider sync and the
//! administrative bulk-create path.

use crate::auth::policy::{self, Action};
use crate::shared::types::account::{NewUser, Role, User, UserFilter, UserId};
use crate::shared::types::app::{audit_failure, ApiError, ValidationErrors};
use crate::shared::types::provider::{ProviderChange, ProviderEvent};
use crate::shared::util::config::LimitsConfig;
use crate::shared::util::handler::UserStore;

use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub enum SyncOutcome {
    Upserted(User),
    Deleted { external_id: String, existed: bool },
    Ignored(String)
}

fn validate_new_user(user: &NewUser) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if user.external_id.trim().is_empty() {
        errors.add("externalId", "must not be empty");
    }
    if !user.email.contains('@') {
        errors.add("email", "must be an email address");
    }
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

pub struct UserService {
    store: Arc<dyn UserStore>,
    limits: LimitsConfig
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, limits: LimitsConfig) -> UserService {
        UserService { store, limits }
    }

    async fn load(&self, id: UserId) -> Result<User, ApiError> {
        self.store.get_user(id).await?
            .ok_or_else(|| ApiError::NotFound(format!("User {id} does not exist")))
    }

    fn gate(actor: &User, action: Action) -> Result<(), ApiError> {
        policy::authorize_role(actor, action)?;
        policy::require_approved(actor)?;
        Ok(())
    }

    pub async fn list(&self, filter: UserFilter, actor: &User) -> Result<Vec<User>, ApiError> {
        Self::gate(actor, Action::ListUsers)
            .map_err(|e| audit_failure(Some(actor), Action::ListUsers.as_str(), e))?;
        Ok(self.store.list_users(&filter).await?)
    }

    pub async fn change_role(&self, id: UserId, role: Role, actor: &User) -> Result<User, ApiError> {
        self.try_change_role(id, role, actor).await
            .map_err(|e| audit_failure(Some(actor), Action::ChangeUserRole.as_str(), e))
    }

    async fn try_change_role(&self, id: UserId, role: Role, actor: &User) -> Result<User, ApiError> {
        Self::gate(actor, Action::ChangeUserRole)?;
        let target = self.load(id).await?;
        if !policy::can_assign_role(actor, target.role, role) {
            return Err(ApiError::Forbidden("Only a super admin may grant or revoke super admin".to_string()));
        }
        if target.role == role {
            return Ok(target);
        }
        if target.role == Role::SuperAdmin {
            let filter = UserFilter { role: Some(Role::SuperAdmin), approved: Some(true) };
            let others = self.store.list_users(&filter).await?.into_iter().filter(|u| u.id != id).count();
            if others == 0 {
                return Err(ApiError::InvalidState("Cannot demote the last super admin".to_string()));
            }
        }

        let updated = self.store.set_role(id, role).await?;
        log::info!("actor={} changed role of user {id} from {} to {role}", actor.id, target.role);
        Ok(updated)
    }

    pub async fn set_approval(&self, id: UserId, approved: bool, actor: &User) -> Result<User, ApiError> {
        self.try_set_approval(id, approved, actor).await
            .map_err(|e| audit_failure(Some(actor), Action::ApproveUser.as_str(), e))
    }

    async fn try_set_approval(&self, id: UserId, approved: bool, actor: &User) -> Result<User, ApiError> {
        Self::gate(actor, Action::ApproveUser)?;
        let target = self.load(id).await?;
        // Same rule as role changes: admins do not manage super admins
        if target.role == Role::SuperAdmin && actor.role != Role::SuperAdmin {
            return Err(ApiError::Forbidden("Only a super admin may change a super admin account".to_string()));
        }
        let updated = self.store.set_approved(id, approved).await?;
        log::info!("actor={} set approval of user {id} to {approved}", actor.id);
        Ok(updated)
    }

    /// Per-item outcomes, like resource bulk operations
    pub async fn bulk_create(&self, users: Vec<Result<NewUser, ApiError>>, actor: &User)
            -> Result<Vec<Result<User, ApiError>>, ApiError> {
        Self::gate(actor, Action::BulkCreateUsers)
            .and_then(|_| if users.len() > self.limits.max_bulk_items {
                Err(ApiError::Validation(ValidationErrors::single("items",
                    format!("at most {} items per request", self.limits.max_bulk_items))))
            } else { Ok(()) })
            .map_err(|e| audit_failure(Some(actor), Action::BulkCreateUsers.as_str(), e))?;

        let mut results = Vec::with_capacity(users.len());
        for user in users {
            let result = match user.map(|u| validate_new_user(&u).map(|_| u)) {
                Ok(Ok(user)) => self.store.create_user(&user).await.map_err(ApiError::from),
                Ok(Err(errors)) => Err(ApiError::Validation(errors)),
                Err(e) => Err(e)
            };
            results.push(result.map_err(|e| audit_failure(Some(actor), Action::BulkCreateUsers.as_str(), e)));
        }
        Ok(results)
    }

    pub async fn delete(&self, id: UserId, actor: &User) -> Result<(), ApiError> {
        self.try_delete(id, actor).await
            .map_err(|e| audit_failure(Some(actor), Action::DeleteUser.as_str(), e))
    }

    async fn try_delete(&self, id: UserId, actor: &User) -> Result<(), ApiError> {
        Self::gate(actor, Action::DeleteUser)?;
        if id == actor.id {
            return Err(ApiError::InvalidState("You cannot delete your own account".to_string()));
        }
        self.store.delete_user(id).await?;
        log::info!("actor={} deleted user {id}", actor.id);
        Ok(())
    }

    /// Apply an identity provider event. Callers authenticate the event
    /// (webhook signature) before handing it over.
    pub async fn sync(&self, event: ProviderEvent) -> Result<SyncOutcome, ApiError> {
        let change = event.into_change()
            .map_err(|e| audit_failure(None, "provider_sync", ApiError::Validation(e)))?;
        let outcome = match change {
            ProviderChange::Upsert(profile) => SyncOutcome::Upserted(
                self.store.upsert_provider_user(&profile).await
                    .map_err(|e| audit_failure(None, "provider_sync", e.into()))?),
            ProviderChange::Delete(external_id) => {
                let existed = self.store.delete_user_by_external_id(&external_id).await
                    .map_err(|e| audit_failure(None, "provider_sync", e.into()))?;
                SyncOutcome::Deleted { external_id, existed }
            },
            ProviderChange::Ignore(event_type) => SyncOutcome::Ignored(event_type)
        };
        log::info!("provider sync: {outcome:?}");
        Ok(outcome)
    }
}
