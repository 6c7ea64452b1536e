//! Moderation lifecycle of a resource.
//!
//! The lifecycle is stored as the `is_approved` flag alone. `Pending` and
//! `Approved` map onto that flag; there is no stored rejected state because
//! rejecting a resource deletes it.

use crate::resource::types::resource::Resource;
use crate::shared::types::account::{Role, User};
use crate::shared::types::app::ApiError;

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ApprovalState {
    Pending,
    Approved
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Approve,
    Reject
}

/// What the store has to do to carry out a transition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    MarkApproved,
    /// Already in the target state
    Unchanged,
    /// Rejection removes the record
    Delete
}

impl ApprovalState {
    pub fn of(resource: &Resource) -> ApprovalState {
        // Unowned content is system seeded and always public
        if resource.is_approved || resource.owner_user_id.is_none() {
            ApprovalState::Approved
        } else {
            ApprovalState::Pending
        }
    }

    pub fn is_approved(self) -> bool {
        self == ApprovalState::Approved
    }
}

/// Content from a super admin, or with no creator at all, skips moderation
pub fn initial_state(creator: Option<&User>) -> ApprovalState {
    match creator {
        None => ApprovalState::Approved,
        Some(user) if user.role == Role::SuperAdmin => ApprovalState::Approved,
        Some(_) => ApprovalState::Pending
    }
}

/// Any edit sends the resource back to moderation unless a super admin made it
pub fn state_after_edit(_current: ApprovalState, editor: &User) -> ApprovalState {
    if editor.role == Role::SuperAdmin {
        ApprovalState::Approved
    } else {
        ApprovalState::Pending
    }
}

pub fn transition(current: ApprovalState, transition: Transition) -> Result<Effect, ApiError> {
    match (current, transition) {
        (ApprovalState::Pending, Transition::Approve) => Ok(Effect::MarkApproved),
        (ApprovalState::Approved, Transition::Approve) => Ok(Effect::Unchanged),
        (ApprovalState::Pending, Transition::Reject) => Ok(Effect::Delete),
        (ApprovalState::Approved, Transition::Reject) =>
            Err(ApiError::InvalidState("Only pending resources can be rejected".to_string()))
    }
}
