use std::fmt;
use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

use crate::channels::adapter::ChannelType;

pub const MAX_MESSAGE_LEN: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Contact {
    Email(String),
    Bitrix(NonZeroU64),
}

impl Contact {
    pub fn channel_type(&self) -> ChannelType {
        match self {
            Contact::Email(_) => ChannelType::Email,
            Contact::Bitrix(_) => ChannelType::Bitrix,
        }
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contact::Email(address) => write!(f, "email:{address}"),
            Contact::Bitrix(id) => write!(f, "bitrix:{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    #[default]
    SendToFirstAvailable,
    SendToAllAvailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
}

/// A notification as it travels through the pipeline. Built once at
/// ingestion and never mutated afterwards; retries carry their attempt
/// count in the broker envelope, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub contacts: Vec<Contact>,
    pub message: String,
    #[serde(default)]
    pub is_immediate: bool,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,
}

/// Inbound payload before an id and timestamp are assigned.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDraft {
    pub contacts: Vec<Contact>,
    pub message: String,
    #[serde(default)]
    pub is_immediate: bool,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub subject: Option<Subject>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("notification has no contacts")]
    NoContacts,
    #[error("notification message is empty")]
    EmptyMessage,
    #[error("notification message exceeds {max} characters")]
    MessageTooLong { max: usize },
    #[error("invalid email contact: {0}")]
    InvalidEmail(String),
}

impl NotificationDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.contacts.is_empty() {
            return Err(ValidationError::NoContacts);
        }
        if self.message.trim().is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        if self.message.chars().count() > MAX_MESSAGE_LEN {
            return Err(ValidationError::MessageTooLong {
                max: MAX_MESSAGE_LEN,
            });
        }
        for contact in &self.contacts {
            if let Contact::Email(address) = contact
                && !looks_like_email(address)
            {
                return Err(ValidationError::InvalidEmail(address.clone()));
            }
        }
        Ok(())
    }

    pub fn into_notification(self) -> Result<Notification, ValidationError> {
        self.validate()?;
        Ok(Notification {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now(),
            contacts: self.contacts,
            message: self.message,
            is_immediate: self.is_immediate,
            strategy: self.strategy,
            subject: self.subject,
        })
    }
}

fn looks_like_email(address: &str) -> bool {
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !address.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::{Contact, Notification, NotificationDraft, Strategy, ValidationError};
    use serde_json::json;

    fn draft(contacts: Vec<Contact>, message: &str) -> NotificationDraft {
        NotificationDraft {
            contacts,
            message: message.to_string(),
            is_immediate: false,
            strategy: Strategy::default(),
            subject: None,
        }
    }

    #[test]
    fn contacts_use_type_value_shape() {
        let contacts: Vec<Contact> = serde_json::from_value(json!([
            {"type": "email", "value": "ops@example.com"},
            {"type": "bitrix", "value": 42}
        ]))
        .unwrap();
        assert_eq!(contacts[0], Contact::Email("ops@example.com".to_string()));
        assert_eq!(contacts[1].to_string(), "bitrix:42");
    }

    #[test]
    fn bitrix_contact_rejects_zero_and_wrong_shape() {
        assert!(serde_json::from_value::<Contact>(json!({"type": "bitrix", "value": 0})).is_err());
        assert!(
            serde_json::from_value::<Contact>(json!({"type": "bitrix", "value": "42"})).is_err()
        );
        assert!(serde_json::from_value::<Contact>(json!({"type": "email", "value": 7})).is_err());
    }

    #[test]
    fn notification_defaults_strategy_and_immediacy() {
        let notification: Notification = serde_json::from_value(json!({
            "id": "n-1",
            "createdAt": "2024-05-01T10:00:00Z",
            "contacts": [{"type": "email", "value": "a@b.io"}],
            "message": "hello"
        }))
        .unwrap();
        assert_eq!(notification.strategy, Strategy::SendToFirstAvailable);
        assert!(!notification.is_immediate);

        let encoded = serde_json::to_value(&notification).unwrap();
        assert_eq!(encoded["strategy"], "sendToFirstAvailable");
        assert_eq!(encoded["isImmediate"], false);
    }

    #[test]
    fn validation_rejects_bad_drafts() {
        assert_eq!(
            draft(vec![], "hi").validate(),
            Err(ValidationError::NoContacts)
        );
        let contact = Contact::Email("a@b.io".to_string());
        assert_eq!(
            draft(vec![contact.clone()], "  ").validate(),
            Err(ValidationError::EmptyMessage)
        );
        assert!(matches!(
            draft(vec![contact], &"x".repeat(5000)).validate(),
            Err(ValidationError::MessageTooLong { .. })
        ));
        assert!(matches!(
            draft(vec![Contact::Email("nobody".to_string())], "hi").validate(),
            Err(ValidationError::InvalidEmail(_))
        ));
    }

    #[test]
    fn into_notification_assigns_identity() {
        let first = draft(vec![Contact::Email("a@b.io".to_string())], "hi")
            .into_notification()
            .unwrap();
        let second = draft(vec![Contact::Email("a@b.io".to_string())], "hi")
            .into_notification()
            .unwrap();
        assert_ne!(first.id, second.id);
    }
}
