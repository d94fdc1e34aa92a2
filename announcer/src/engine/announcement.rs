use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Stable identifier of an announcement, used for dismissal tracking.
pub type AnnouncementId = i64;

/// Presentation style an announcement is published for. Decides which
/// channel queue it lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Banner,
    Modal,
    Popup,
    Notification,
}

impl ItemType {
    pub const ALL: [ItemType; 4] = [
        ItemType::Banner,
        ItemType::Modal,
        ItemType::Popup,
        ItemType::Notification,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::Banner => "banner",
            ItemType::Modal => "modal",
            ItemType::Popup => "popup",
            ItemType::Notification => "notification",
        }
    }

    /// Parse a channel name as typed by a user (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "banner" => Some(ItemType::Banner),
            "modal" => Some(ItemType::Modal),
            "popup" => Some(ItemType::Popup),
            "notification" => Some(ItemType::Notification),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published announcement as returned by the backend. Read-only to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub id: AnnouncementId,
    pub item_type: ItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl Announcement {
    /// Priority used for ordering. Missing priority ranks as 0.
    pub fn effective_priority(&self) -> i64 {
        self.priority.unwrap_or(0)
    }

    /// The action button is only offered when there is both a label and a target.
    pub fn action(&self) -> Option<(&str, &str)> {
        match (&self.button_text, &self.link_url) {
            (Some(text), Some(url)) if !text.is_empty() && !url.is_empty() => {
                Some((text.as_str(), url.as_str()))
            }
            _ => None,
        }
    }
}

/// Envelope of the published-announcements endpoint:
/// `{ "success": bool, "data": { "data": [...] } }`.
#[derive(Debug, Deserialize)]
pub struct PublishedEnvelope {
    pub success: bool,
    #[serde(default)]
    pub data: Option<PublishedPage>,
}

/// Items are kept as raw JSON so one malformed entry cannot sink the page.
#[derive(Debug, Deserialize)]
pub struct PublishedPage {
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

impl PublishedEnvelope {
    /// The announcement list, or `None` when the backend reported failure.
    /// Entries that do not decode (unknown `item_type`, missing id, ...) are
    /// skipped.
    pub fn into_announcements(self) -> Option<Vec<Announcement>> {
        if !self.success {
            return None;
        }
        let items = self.data.map(|page| page.data).unwrap_or_default();
        let announcements = items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match serde_json::from_value(item) {
                Ok(announcement) => Some(announcement),
                Err(e) => {
                    warn!(index, error = %e, "skipping undecodable announcement");
                    None
                }
            })
            .collect();
        Some(announcements)
    }
}

#[cfg(test)]
pub(crate) fn sample(id: AnnouncementId, item_type: ItemType, priority: Option<i64>) -> Announcement {
    Announcement {
        id,
        item_type,
        priority,
        title: format!("Announcement {id}"),
        content: String::new(),
        image_url: None,
        link_url: None,
        button_text: None,
        published_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_announcement() {
        let json = r#"{
            "id": 7,
            "item_type": "popup",
            "priority": 40,
            "title": "Enrollment open",
            "content": "Register before Friday",
            "image_url": "https://cdn.example.edu/banner.png",
            "link_url": "https://example.edu/enroll",
            "button_text": "Enroll",
            "published_at": "2026-09-01T08:00:00Z",
            "created_by": 12
        }"#;
        let a: Announcement = serde_json::from_str(json).unwrap();
        assert_eq!(a.id, 7);
        assert_eq!(a.item_type, ItemType::Popup);
        assert_eq!(a.effective_priority(), 40);
        assert_eq!(a.action(), Some(("Enroll", "https://example.edu/enroll")));
        assert!(a.published_at.is_some());
    }

    #[test]
    fn test_missing_priority_defaults_to_zero() {
        let a: Announcement =
            serde_json::from_str(r#"{"id": 1, "item_type": "modal", "title": "t"}"#).unwrap();
        assert_eq!(a.priority, None);
        assert_eq!(a.effective_priority(), 0);
        assert_eq!(a.content, "");
    }

    #[test]
    fn test_action_requires_text_and_link() {
        let mut a = sample(1, ItemType::Modal, None);
        assert!(a.action().is_none());
        a.link_url = Some("https://example.edu".into());
        assert!(a.action().is_none());
        a.button_text = Some(String::new());
        assert!(a.action().is_none());
        a.button_text = Some("Open".into());
        assert_eq!(a.action(), Some(("Open", "https://example.edu")));
    }

    #[test]
    fn test_unknown_item_type_skipped_siblings_kept() {
        let env: PublishedEnvelope = serde_json::from_str(
            r#"{"success": true, "data": {"data": [
                {"id": 1, "item_type": "modal"},
                {"id": 2, "item_type": "toast"},
                {"item_type": "popup", "title": "no id"},
                {"id": 4, "item_type": "notification", "priority": "high"},
                {"id": 5, "item_type": "popup"}
            ]}}"#,
        )
        .unwrap();
        let ids: Vec<_> = env
            .into_announcements()
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![1, 5]);
    }

    #[test]
    fn test_envelope_success() {
        let env: PublishedEnvelope = serde_json::from_str(
            r#"{"success": true, "data": {"data": [{"id": 1, "item_type": "banner"}]}}"#,
        )
        .unwrap();
        let list = env.into_announcements().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].item_type, ItemType::Banner);
    }

    #[test]
    fn test_envelope_failure_flag() {
        let env: PublishedEnvelope =
            serde_json::from_str(r#"{"success": false, "message": "nope"}"#).unwrap();
        assert!(env.into_announcements().is_none());
    }

    #[test]
    fn test_envelope_success_without_data_is_empty() {
        let env: PublishedEnvelope = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert_eq!(env.into_announcements(), Some(vec![]));
    }

    #[test]
    fn test_item_type_parse() {
        assert_eq!(ItemType::parse("Modal"), Some(ItemType::Modal));
        assert_eq!(ItemType::parse(" popup "), Some(ItemType::Popup));
        assert_eq!(ItemType::parse("toast"), None);
        assert_eq!(ItemType::Notification.to_string(), "notification");
    }
}
