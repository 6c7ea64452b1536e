//! Identity provider webhook payloads

use crate::shared::types::account::ProviderProfile;
use crate::shared::types::app::ValidationErrors;

use serde::Deserialize;
use serde_json::Value;

#[derive(Clone, Debug, Deserialize)]
pub struct ProviderEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Value
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmailAddress {
    pub id: Option<String>,
    pub email_address: String
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProviderUserData {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    pub primary_email_address_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>
}

#[derive(Clone, Debug, Deserialize)]
pub struct DeletedUserData {
    pub id: String
}

/// What a webhook event asks of the user store
#[derive(Clone, Debug)]
pub enum ProviderChange {
    Upsert(ProviderProfile),
    Delete(String),
    Ignore(String)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ProviderUserData {
    pub fn into_profile(self) -> Result<ProviderProfile, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.id.trim().is_empty() {
            errors.add("id", "must not be empty");
        }

        let primary = self.primary_email_address_id.as_deref();
        let email = self.email_addresses.iter()
            .find(|e| primary.is_some() && e.id.as_deref() == primary)
            .or_else(|| self.email_addresses.first())
            .map(|e| e.email_address.trim().to_string());
        let email = match email {
            Some(email) if email.contains('@') => Some(email),
            _ => { errors.add("email_addresses", "a valid email address is required"); None }
        };

        match email {
            Some(email) if errors.is_empty() => Ok(ProviderProfile {
                external_id: self.id.trim().to_string(),
                email,
                first_name: non_empty(self.first_name),
                last_name: non_empty(self.last_name)
            }),
            _ => Err(errors)
        }
    }
}

impl ProviderEvent {
    pub fn into_change(self) -> Result<ProviderChange, ValidationErrors> {
        let invalid = |e: serde_json::Error| ValidationErrors::single("data", e.to_string());
        match self.event_type.as_str() {
            "user.created" | "user.updated" => {
                let data: ProviderUserData = serde_json::from_value(self.data).map_err(invalid)?;
                Ok(ProviderChange::Upsert(data.into_profile()?))
            },
            "user.deleted" => {
                let data: DeletedUserData = serde_json::from_value(self.data).map_err(invalid)?;
                Ok(ProviderChange::Delete(data.id))
            },
            _ => Ok(ProviderChange::Ignore(self.event_type))
        }
    }
}
