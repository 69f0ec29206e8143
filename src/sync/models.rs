//! Records owned by the datastore: mood entries and chat messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SyncError;

/// Which partner authored a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The "boy" partner.
    Boy,
    /// The "girl" partner.
    Girl,
}

impl Role {
    /// The other partner.
    #[must_use]
    pub fn partner(self) -> Self {
        match self {
            Self::Boy => Self::Girl,
            Self::Girl => Self::Boy,
        }
    }

    /// Wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boy => "boy",
            Self::Girl => "girl",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boy" => Ok(Self::Boy),
            "girl" => Ok(Self::Girl),
            other => Err(SyncError::Invalid(format!("unknown role {other:?}"))),
        }
    }
}

/// A logged mood.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodEntry {
    /// Datastore-assigned identifier.
    pub id: String,
    /// Emoji picked for the mood.
    pub emoji: String,
    /// Short label such as "Happy".
    pub mood_label: String,
    /// Optional free-form note.
    #[serde(default)]
    pub notes: Option<String>,
    /// Author.
    pub role: Role,
    /// Creation time, assigned by the datastore.
    pub created_at: DateTime<Utc>,
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Datastore-assigned identifier.
    pub id: String,
    /// Author.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Creation time, assigned by the datastore.
    pub created_at: DateTime<Utc>,
}

/// A mood about to be logged. Id and timestamp come from the datastore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewMoodEntry {
    emoji: String,
    mood_label: String,
    notes: Option<String>,
    role: Role,
}

impl NewMoodEntry {
    /// Validate and build a new mood entry.
    ///
    /// Emoji and label are required; a blank note is stored as no note.
    pub fn new(
        role: Role,
        emoji: &str,
        mood_label: &str,
        notes: Option<&str>,
    ) -> Result<Self, SyncError> {
        let emoji = emoji.trim();
        let mood_label = mood_label.trim();
        if emoji.is_empty() {
            return Err(SyncError::Invalid("mood emoji is required".to_string()));
        }
        if mood_label.is_empty() {
            return Err(SyncError::Invalid("mood label is required".to_string()));
        }

        Ok(Self {
            emoji: emoji.to_string(),
            mood_label: mood_label.to_string(),
            notes: notes
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            role,
        })
    }
}

/// A chat message about to be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewMessage {
    role: Role,
    content: String,
}

impl NewMessage {
    /// Validate and build a new message. Blank content is rejected.
    pub fn new(role: Role, content: &str) -> Result<Self, SyncError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(SyncError::Invalid("message content is empty".to_string()));
        }
        Ok(Self {
            role,
            content: content.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_value(Role::Boy).unwrap(), "boy");
        assert_eq!(serde_json::from_str::<Role>("\"girl\"").unwrap(), Role::Girl);
        assert_eq!("boy".parse::<Role>().unwrap(), Role::Boy);
        assert!("partner".parse::<Role>().is_err());
        assert_eq!(Role::Girl.partner(), Role::Boy);
    }

    #[test]
    fn test_mood_entry_from_datastore_row() {
        let row = serde_json::json!({
            "id": "6f1c",
            "emoji": "😊",
            "mood_label": "Happy",
            "notes": null,
            "role": "girl",
            "created_at": "2026-02-14T09:30:00.123456+00:00",
        });
        let entry: MoodEntry = serde_json::from_value(row).unwrap();
        assert_eq!(entry.role, Role::Girl);
        assert_eq!(entry.notes, None);
        assert_eq!(entry.created_at.to_rfc3339(), "2026-02-14T09:30:00.123456+00:00");
    }

    #[test]
    fn test_new_mood_entry_validation() {
        assert!(NewMoodEntry::new(Role::Boy, " ", "Happy", None).is_err());
        assert!(NewMoodEntry::new(Role::Boy, "😊", "", None).is_err());

        let entry = NewMoodEntry::new(Role::Boy, "😊", " Happy ", Some("   ")).unwrap();
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["mood_label"], "Happy");
        assert!(value["notes"].is_null());
        assert_eq!(value["role"], "boy");
    }

    #[test]
    fn test_new_message_rejects_blank_content() {
        assert!(NewMessage::new(Role::Girl, "  \n ").is_err());
        let message = NewMessage::new(Role::Girl, " hi ").unwrap();
        assert_eq!(serde_json::to_value(&message).unwrap()["content"], "hi");
    }
}
