// A handler that just stores data in memory (non-persistent)
// Used for debugging purposes and by the test suite

use crate::resource::types::resource::{NewResource, Resource, ResourceFilter, ResourceId};
use crate::resource::util::handler::{check_draft, check_resource, ResourceStore};
use crate::shared::types::account::{NewUser, ProviderProfile, Role, User, UserFilter, UserId};
use crate::shared::util::clean_html::escape_text;
use crate::shared::util::handler::{StoreError, UserStore};

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    resources: BTreeMap<ResourceId, Resource>,
    last_user_id: UserId,
    last_resource_id: ResourceId
}

impl Tables {
    fn check_unique(&self, external_id: Option<&str>, email: &str, skip: Option<UserId>) -> Result<(), StoreError> {
        for user in self.users.values().filter(|u| Some(u.id) != skip) {
            if Some(user.external_id.as_str()) == external_id {
                return Err(StoreError::Conflict("users_external_id_key already exists".to_string()));
            }
            if user.email == email {
                return Err(StoreError::Conflict("users_email_key already exists".to_string()));
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct DebugHandler {
    tables: Mutex<Tables>
}

impl DebugHandler {
    pub fn new() -> DebugHandler {
        DebugHandler::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // A panic while holding the lock cannot leave a half written record
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn matches(r: &Resource, f: &ResourceFilter) -> bool {
    let contains = |haystack: &str, needle: &str| haystack.to_lowercase().contains(&needle.to_lowercase());
    // Descriptions are stored sanitized, so the needle is escaped the same way
    let in_description = |q: &str| contains(&r.description, &escape_text(q));

    f.approved.map_or(true, |a| r.is_approved == a) &&
    f.owner.map_or(true, |o| r.owner_user_id == Some(o)) &&
    f.resource_type.as_ref().map_or(true, |t| &r.resource_type == t) &&
    f.subject.as_ref().map_or(true, |s| &r.subject == s) &&
    f.age_group.as_ref().map_or(true, |a| &r.age_group == a) &&
    f.event_from.map_or(true, |d| r.event_date >= d) &&
    f.event_to.map_or(true, |d| r.event_date <= d) &&
    f.query.as_ref().map_or(true, |q| contains(&r.title, q) || in_description(q))
}

#[async_trait]
impl UserStore for DebugHandler {
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.tables().users.get(&id).cloned())
    }

    async fn get_user_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.tables().users.values().find(|u| u.external_id == external_id).cloned())
    }

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>, StoreError> {
        Ok(self.tables().users.values()
            .filter(|u| filter.role.map_or(true, |r| u.role == r))
            .filter(|u| filter.approved.map_or(true, |a| u.is_approved == a))
            .cloned().collect())
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables();
        tables.check_unique(Some(&user.external_id), &user.email, None)?;
        tables.last_user_id += 1;
        let created = User {
            id: tables.last_user_id,
            external_id: user.external_id.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            is_approved: user.is_approved
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn upsert_provider_user(&self, profile: &ProviderProfile) -> Result<User, StoreError> {
        let mut tables = self.tables();
        let existing = tables.users.values().find(|u| u.external_id == profile.external_id).map(|u| u.id);
        tables.check_unique(None, &profile.email, existing)?;

        let id = match existing {
            Some(id) => id,
            None => {
                tables.last_user_id += 1;
                tables.last_user_id
            }
        };
        let user = tables.users.entry(id).or_insert_with(|| User {
            id,
            external_id: profile.external_id.clone(),
            email: String::new(),
            first_name: None,
            last_name: None,
            role: Role::User,
            is_approved: false
        });
        user.email = profile.email.clone();
        user.first_name = profile.first_name.clone();
        user.last_name = profile.last_name.clone();
        Ok(user.clone())
    }

    async fn set_role(&self, id: UserId, role: Role) -> Result<User, StoreError> {
        let mut tables = self.tables();
        let user = tables.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.role = role;
        Ok(user.clone())
    }

    async fn set_approved(&self, id: UserId, approved: bool) -> Result<User, StoreError> {
        let mut tables = self.tables();
        let user = tables.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.is_approved = approved;
        Ok(user.clone())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
        let mut tables = self.tables();
        if tables.users.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        tables.resources.retain(|_, r| r.owner_user_id != Some(id) || r.is_approved);
        for resource in tables.resources.values_mut().filter(|r| r.owner_user_id == Some(id)) {
            resource.owner_user_id = None;
        }
        Ok(())
    }

    async fn delete_user_by_external_id(&self, external_id: &str) -> Result<bool, StoreError> {
        let id = match self.get_user_by_external_id(external_id).await? {
            Some(user) => user.id,
            None => return Ok(false)
        };
        self.delete_user(id).await?;
        Ok(true)
    }
}

#[async_trait]
impl ResourceStore for DebugHandler {
    async fn get_resource(&self, id: ResourceId) -> Result<Option<Resource>, StoreError> {
        Ok(self.tables().resources.get(&id).cloned())
    }

    async fn find_resources(&self, filter: &ResourceFilter) -> Result<Vec<Resource>, StoreError> {
        let tables = self.tables();
        let mut found: Vec<Resource> = tables.resources.values()
            .filter(|r| matches(r, filter))
            .cloned().collect();
        found.sort_by(|a, b| b.event_date.cmp(&a.event_date).then(b.id.cmp(&a.id)));

        let limit = filter.limit.map_or(usize::MAX, |l| l as usize);
        Ok(found.into_iter().skip(filter.offset as usize).take(limit).collect())
    }

    async fn create_resource(&self, resource: &NewResource) -> Result<Resource, StoreError> {
        check_draft(&resource.draft)?;
        let mut tables = self.tables();
        if let Some(owner) = resource.owner_user_id {
            if !tables.users.contains_key(&owner) {
                return Err(StoreError::Constraint {
                    field: "ownerUserId".to_string(),
                    message: "referenced record does not exist".to_string()
                });
            }
        }

        tables.last_resource_id += 1;
        let now = Utc::now();
        let d = resource.draft.clone();
        let created = Resource {
            id: tables.last_resource_id,
            title: d.title,
            resource_type: d.resource_type,
            subject: d.subject,
            age_group: d.age_group,
            rating: d.rating,
            description: d.description,
            event_date: d.event_date,
            image_url: d.image_url,
            is_approved: resource.is_approved,
            owner_user_id: resource.owner_user_id,
            created: now,
            edited: now
        };
        tables.resources.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_resource(&self, resource: &Resource) -> Result<Resource, StoreError> {
        check_resource(resource)?;
        let mut tables = self.tables();
        let stored = tables.resources.get_mut(&resource.id).ok_or(StoreError::NotFound)?;
        let owner = stored.owner_user_id;
        let created = stored.created;
        *stored = resource.clone();
        stored.owner_user_id = owner;
        stored.created = created;
        Ok(stored.clone())
    }

    async fn set_resource_approval(&self, id: ResourceId, approved: bool) -> Result<Resource, StoreError> {
        let mut tables = self.tables();
        let stored = tables.resources.get_mut(&id).ok_or(StoreError::NotFound)?;
        stored.is_approved = approved;
        Ok(stored.clone())
    }

    async fn delete_resource(&self, id: ResourceId) -> Result<(), StoreError> {
        match self.tables().resources.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound)
        }
    }

    async fn delete_pending_resource(&self, id: ResourceId) -> Result<bool, StoreError> {
        let mut tables = self.tables();
        match tables.resources.get(&id) {
            None => Err(StoreError::NotFound),
            Some(r) if r.is_approved => Ok(false),
            Some(_) => Ok(tables.resources.remove(&id).is_some())
        }
    }
}
