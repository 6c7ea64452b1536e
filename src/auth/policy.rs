//! Authorization decisions.
//!
//! Every check goes through `decide`, a single `role x action x relation`
//! table. Guards wrap it for request handling and turn a denial into the
//! matching `ApiError` so callers can tell 401 from 403.

use crate::resource::types::resource::Resource;
use crate::shared::types::account::{Role, User};
use crate::shared::types::app::ApiError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    CreateResource,
    UpdateResource,
    DeleteResource,
    ApproveResource,
    RejectResource,
    /// Read a resource that is still pending
    ViewUnapprovedResource,
    ViewOwnResources,
    ViewPendingQueue,
    ListUsers,
    ApproveUser,
    /// Change the role of an account; granting `SuperAdmin` is further
    /// gated by `can_assign_role`
    ChangeUserRole,
    BulkCreateUsers,
    DeleteUser
}

impl Action {
    pub const ALL: [Action; 13] = [
        Action::CreateResource, Action::UpdateResource, Action::DeleteResource,
        Action::ApproveResource, Action::RejectResource, Action::ViewUnapprovedResource,
        Action::ViewOwnResources, Action::ViewPendingQueue, Action::ListUsers,
        Action::ApproveUser, Action::ChangeUserRole, Action::BulkCreateUsers, Action::DeleteUser
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreateResource => "create_resource",
            Action::UpdateResource => "update_resource",
            Action::DeleteResource => "delete_resource",
            Action::ApproveResource => "approve_resource",
            Action::RejectResource => "reject_resource",
            Action::ViewUnapprovedResource => "view_unapproved_resource",
            Action::ViewOwnResources => "view_own_resources",
            Action::ViewPendingQueue => "view_pending_queue",
            Action::ListUsers => "list_users",
            Action::ApproveUser => "approve_user",
            Action::ChangeUserRole => "change_user_role",
            Action::BulkCreateUsers => "bulk_create_users",
            Action::DeleteUser => "delete_user"
        }
    }
}

/// How the actor stands with respect to the target of an action
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Relation {
    Owner,
    NotOwner,
    NoTarget
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny
}

pub fn decide(role: Role, action: Action, relation: Relation) -> Decision {
    use Action::*;
    use Decision::*;

    match (role, action) {
        // Plain users never touch catalog content or other accounts
        (Role::User, _) => Deny,

        (Role::SuperAdmin, _) => Allow,

        (Role::Admin, CreateResource | ViewOwnResources | ListUsers | ApproveUser | ChangeUserRole) => Allow,
        (Role::Admin, UpdateResource | DeleteResource | ViewUnapprovedResource) => match relation {
            Relation::Owner => Allow,
            Relation::NotOwner | Relation::NoTarget => Deny
        },
        (Role::Admin, ApproveResource | RejectResource | ViewPendingQueue | BulkCreateUsers | DeleteUser) => Deny
    }
}

pub fn relation_to(actor: &User, target: Option<&Resource>) -> Relation {
    match target {
        None => Relation::NoTarget,
        Some(resource) if resource.owner_user_id == Some(actor.id) => Relation::Owner,
        Some(_) => Relation::NotOwner
    }
}

pub fn can_perform(actor: &User, action: Action, target: Option<&Resource>) -> bool {
    decide(actor.role, action, relation_to(actor, target)) == Decision::Allow
}

/// Whether the role could perform the action on at least some target
pub fn role_may(role: Role, action: Action) -> bool {
    decide(role, action, Relation::Owner) == Decision::Allow
}

/// Role assignment is not derived from the capability ordering: only a
/// super admin may hand out `SuperAdmin` or touch an existing super admin.
pub fn can_assign_role(actor: &User, current: Role, requested: Role) -> bool {
    if !role_may(actor.role, Action::ChangeUserRole) {
        return false;
    }
    if requested == Role::SuperAdmin || current == Role::SuperAdmin {
        return actor.role == Role::SuperAdmin;
    }
    true
}

pub fn require_authenticated(actor: Option<&User>) -> Result<&User, ApiError> {
    actor.ok_or_else(|| ApiError::Unauthenticated("Missing or invalid credentials".to_string()))
}

pub fn require_approved(actor: &User) -> Result<&User, ApiError> {
    if actor.is_approved { Ok(actor) } else { Err(ApiError::Unapproved) }
}

pub fn require_role<'a>(actor: &'a User, roles: &[Role]) -> Result<&'a User, ApiError> {
    if roles.contains(&actor.role) {
        Ok(actor)
    } else {
        Err(ApiError::Forbidden(format!("Role `{}` may not do this", actor.role)))
    }
}

pub fn require_admin_or_super_admin(actor: &User) -> Result<&User, ApiError> {
    require_role(actor, &[Role::Admin, Role::SuperAdmin])
}

pub fn require_super_admin(actor: &User) -> Result<&User, ApiError> {
    require_role(actor, &[Role::SuperAdmin])
}

/// Role level check ahead of any lookup, so a role that can never perform
/// the action learns nothing about the target.
pub fn authorize_role(actor: &User, action: Action) -> Result<(), ApiError> {
    if role_may(actor.role, action) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("Role `{}` may not {}", actor.role, action.as_str())))
    }
}

pub fn authorize(actor: &User, action: Action, target: Option<&Resource>) -> Result<(), ApiError> {
    if can_perform(actor, action, target) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("You do not have permission to modify this resource".to_string()))
    }
}
