use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Platform;

/// Calendar entry for a post planned for (or already sent at) `start`.
///
/// Persisted as one element of a JSON array, so deserialization is lenient
/// about fields older or hand-edited payloads may lack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredEvent")]
pub struct ScheduledEvent {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub platform: Platform,
    pub all_day: bool,
    pub content: String,
    pub promotional_content: String,
    pub background_color: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEvent {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    platform: Option<Platform>,
    all_day: Option<bool>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    promotional_content: String,
}

impl From<StoredEvent> for ScheduledEvent {
    fn from(raw: StoredEvent) -> Self {
        let platform = raw.platform.unwrap_or(Platform::Instagram);
        ScheduledEvent {
            id: raw.id,
            title: raw.title,
            start: raw.start,
            end: raw.end.unwrap_or(raw.start),
            platform,
            all_day: raw.all_day.unwrap_or(true),
            content: raw.content,
            promotional_content: raw.promotional_content,
            background_color: platform.color().to_string(),
        }
    }
}

/// Payload for creating or editing a calendar entry. A missing or unknown id
/// creates a new event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveScheduledEvent {
    pub id: Option<String>,
    pub title: Option<String>,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub platform: Option<Platform>,
    pub all_day: Option<bool>,
    pub content: Option<String>,
    pub promotional_content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_load_fills_defaults() {
        let raw = r#"{"id":"1","title":"Hi","start":"2026-05-01T09:00:00Z","platform":"x"}"#;
        let ev: ScheduledEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(ev.end, ev.start);
        assert!(ev.all_day);
        assert_eq!(ev.background_color, "#000000");
        assert_eq!(ev.content, "");
    }

    #[test]
    fn serializes_camel_case() {
        let raw = r#"{"id":"1","title":"Hi","start":"2026-05-01T09:00:00Z","allDay":false}"#;
        let ev: ScheduledEvent = serde_json::from_str(raw).unwrap();
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["allDay"], false);
        assert_eq!(json["backgroundColor"], "#E1306C");
        assert!(json.get("promotionalContent").is_some());
    }
}
