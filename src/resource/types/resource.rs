//! Resource schema plus validation of inbound payloads

use crate::shared::types::account::UserId;
use crate::shared::types::app::ValidationErrors;
use crate::shared::util::clean_html::clean_description;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Deserialize};

pub type ResourceId = i32;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;
pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_LABEL_LENGTH: usize = 100;
pub const MAX_DESCRIPTION_LENGTH: usize = 10_000;
pub const MAX_IMAGE_URL_LENGTH: usize = 2048;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: ResourceId,
    pub title: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub subject: String,
    pub age_group: String,
    pub rating: i16,
    pub description: String,
    pub event_date: NaiveDate,
    pub image_url: Option<String>,
    pub is_approved: bool,
    /// Creator; `None` marks system seeded content
    pub owner_user_id: Option<UserId>,
    pub created: DateTime<Utc>,
    pub edited: DateTime<Utc>
}

/// Create payload as sent by clients. Every field is optional here so that
/// missing fields surface as field level validation errors.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInput {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub subject: Option<String>,
    pub age_group: Option<String>,
    pub rating: Option<i64>,
    pub description: Option<String>,
    pub event_date: Option<String>,
    pub image_url: Option<String>
}

/// Update payload. Owner and approval are deliberately absent: unknown
/// keys such as `ownerUserId` are dropped during deserialization.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePatch {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub subject: Option<String>,
    pub age_group: Option<String>,
    pub rating: Option<i64>,
    pub description: Option<String>,
    pub event_date: Option<String>,
    /// An empty string clears the image
    pub image_url: Option<String>
}

/// A create payload that passed validation
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceDraft {
    pub title: String,
    pub resource_type: String,
    pub subject: String,
    pub age_group: String,
    pub rating: i16,
    pub description: String,
    pub event_date: NaiveDate,
    pub image_url: Option<String>
}

/// What gets handed to the store on insert
#[derive(Clone, Debug, PartialEq)]
pub struct NewResource {
    pub draft: ResourceDraft,
    pub is_approved: bool,
    pub owner_user_id: Option<UserId>
}

/// An update payload that passed validation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceChanges {
    pub title: Option<String>,
    pub resource_type: Option<String>,
    pub subject: Option<String>,
    pub age_group: Option<String>,
    pub rating: Option<i16>,
    pub description: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub image_url: Option<Option<String>>
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQuery {
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub subject: Option<String>,
    pub age_group: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub q: Option<String>,
    pub offset: Option<u32>,
    pub limit: Option<u32>
}

/// Store level predicate. `None` fields do not constrain the result.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceFilter {
    pub approved: Option<bool>,
    pub owner: Option<UserId>,
    pub resource_type: Option<String>,
    pub subject: Option<String>,
    pub age_group: Option<String>,
    pub event_from: Option<NaiveDate>,
    pub event_to: Option<NaiveDate>,
    pub query: Option<String>,
    pub offset: u32,
    pub limit: Option<u32>
}

fn text(errors: &mut ValidationErrors, field: &str, value: String, max: usize) -> Option<String> {
    let value = value.trim().to_string();
    if value.is_empty() {
        errors.add(field, "must not be empty");
        return None;
    }
    if value.chars().count() > max {
        errors.add(field, format!("must be at most {max} characters"));
        return None;
    }
    Some(value)
}

fn required_text(errors: &mut ValidationErrors, field: &str, value: Option<String>, max: usize) -> Option<String> {
    match value {
        Some(v) => text(errors, field, v, max),
        None => { errors.add(field, "is required"); None }
    }
}

fn rating(errors: &mut ValidationErrors, value: i64) -> Option<i16> {
    if !(MIN_RATING..=MAX_RATING).contains(&value) {
        errors.add("rating", format!("must be between {MIN_RATING} and {MAX_RATING}"));
        return None;
    }
    Some(value as i16)
}

fn description(errors: &mut ValidationErrors, value: String) -> Option<String> {
    let value = text(errors, "description", value, MAX_DESCRIPTION_LENGTH)?;
    match clean_description(&value) {
        Ok(clean) if !clean.trim().is_empty() => Some(clean),
        Ok(_) => { errors.add("description", "must not be empty"); None },
        Err(_) => { errors.add("description", "could not be sanitized"); None }
    }
}

/// Accepts plain `YYYY-MM-DD` dates and full RFC 3339 timestamps
pub fn parse_event_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|d| d.date_naive()))
}

fn event_date(errors: &mut ValidationErrors, value: &str) -> Option<NaiveDate> {
    let date = parse_event_date(value);
    if date.is_none() {
        errors.add("eventDate", "must be a date (YYYY-MM-DD)");
    }
    date
}

fn image_url(errors: &mut ValidationErrors, value: String) -> Option<Option<String>> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Some(None);
    }
    if value.len() > MAX_IMAGE_URL_LENGTH {
        errors.add("imageUrl", format!("must be at most {MAX_IMAGE_URL_LENGTH} characters"));
        return None;
    }
    if !(value.starts_with("https://") || value.starts_with("http://") || value.starts_with('/')) {
        errors.add("imageUrl", "must be an http(s) url or an absolute path");
        return None;
    }
    Some(Some(value))
}

impl ResourceInput {
    pub fn validate(self) -> Result<ResourceDraft, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = required_text(&mut errors, "title", self.title, MAX_TITLE_LENGTH);
        let resource_type = required_text(&mut errors, "type", self.resource_type, MAX_LABEL_LENGTH);
        let subject = required_text(&mut errors, "subject", self.subject, MAX_LABEL_LENGTH);
        let age_group = required_text(&mut errors, "ageGroup", self.age_group, MAX_LABEL_LENGTH);
        let rating = match self.rating {
            Some(r) => rating(&mut errors, r),
            None => { errors.add("rating", "is required"); None }
        };
        let description = match self.description {
            Some(d) => description(&mut errors, d),
            None => { errors.add("description", "is required"); None }
        };
        let event_date = match self.event_date {
            Some(d) => event_date(&mut errors, &d),
            None => { errors.add("eventDate", "is required"); None }
        };
        let image_url = match self.image_url {
            Some(u) => image_url(&mut errors, u),
            None => Some(None)
        };

        match (title, resource_type, subject, age_group, rating, description, event_date, image_url) {
            (Some(title), Some(resource_type), Some(subject), Some(age_group), Some(rating),
             Some(description), Some(event_date), Some(image_url)) if errors.is_empty() => Ok(ResourceDraft {
                title, resource_type, subject, age_group, rating, description, event_date, image_url
            }),
            _ => Err(errors)
        }
    }
}

impl ResourcePatch {
    pub fn validate(self) -> Result<ResourceChanges, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let changes = ResourceChanges {
            title: self.title.and_then(|v| text(&mut errors, "title", v, MAX_TITLE_LENGTH)),
            resource_type: self.resource_type.and_then(|v| text(&mut errors, "type", v, MAX_LABEL_LENGTH)),
            subject: self.subject.and_then(|v| text(&mut errors, "subject", v, MAX_LABEL_LENGTH)),
            age_group: self.age_group.and_then(|v| text(&mut errors, "ageGroup", v, MAX_LABEL_LENGTH)),
            rating: self.rating.and_then(|v| rating(&mut errors, v)),
            description: self.description.and_then(|v| description(&mut errors, v)),
            event_date: self.event_date.and_then(|v| event_date(&mut errors, &v)),
            image_url: self.image_url.and_then(|v| image_url(&mut errors, v))
        };
        if errors.is_empty() { Ok(changes) } else { Err(errors) }
    }
}

macro_rules! update_if_not_none {
    ($base: ident, $changes: ident, $property: ident) => {
        if let Some(value) = $changes.$property {
            $base.$property = value;
        }
    };
}

impl Resource {
    /// Copy changed fields over. Owner and approval are left alone.
    pub fn apply(&mut self, changes: ResourceChanges) {
        update_if_not_none!(self, changes, title);
        update_if_not_none!(self, changes, resource_type);
        update_if_not_none!(self, changes, subject);
        update_if_not_none!(self, changes, age_group);
        update_if_not_none!(self, changes, rating);
        update_if_not_none!(self, changes, description);
        update_if_not_none!(self, changes, event_date);
        update_if_not_none!(self, changes, image_url);
    }
}
