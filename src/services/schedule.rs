//! Calendar of scheduled and published posts.
//!
//! A user's events are one JSON array stored under a single key through the
//! `KeyValueStore` port. The array is re-sorted newest-first on every write
//! so hand-edited or out-of-order stored state is repaired on the next save.
//! Writes for one user are serialized, since each one rewrites the whole array.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::{Mutex, RwLock};

use crate::db::models::{Platform, SaveScheduledEvent, ScheduledEvent};
use crate::db::KeyValueRepository;
use crate::error::{AppError, AppResult};
use crate::services::titles::strip_ordinal;

pub const EVENTS_KEY: &str = "content_calendar_events";

/// Hours between start and end of an event created from generated content.
const PUBLISH_WINDOW_HOURS: i64 = 12;
const PUBLISH_HOUR: u32 = 9;

/// String documents addressed by (scope, key).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, scope: &str, key: &str) -> AppResult<Option<String>>;
    async fn put(&self, scope: &str, key: &str, value: &str) -> AppResult<()>;
}

pub struct SqliteKeyValueStore {
    pool: SqlitePool,
}

impl SqliteKeyValueStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, scope: &str, key: &str) -> AppResult<Option<String>> {
        KeyValueRepository::get(&self.pool, scope, key).await
    }

    async fn put(&self, scope: &str, key: &str, value: &str) -> AppResult<()> {
        KeyValueRepository::put(&self.pool, scope, key, value).await
    }
}

#[derive(Default)]
pub struct InMemoryKeyValueStore {
    values: RwLock<HashMap<(String, String), String>>,
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, scope: &str, key: &str) -> AppResult<Option<String>> {
        Ok(self
            .values
            .read()
            .await
            .get(&(scope.to_string(), key.to_string()))
            .cloned())
    }

    async fn put(&self, scope: &str, key: &str, value: &str) -> AppResult<()> {
        self.values
            .write()
            .await
            .insert((scope.to_string(), key.to_string()), value.to_string());
        Ok(())
    }
}

/// Events of one local calendar day.
#[derive(Debug, Clone, Serialize)]
pub struct DateBucket {
    pub date: String,
    pub events: Vec<ScheduledEvent>,
}

fn millis_token() -> String {
    Utc::now().timestamp_millis().to_string()
}

/// Millisecond token not yet used by any of `events`.
fn unique_id(events: &[ScheduledEvent]) -> String {
    let mut candidate = Utc::now().timestamp_millis();
    while events.iter().any(|e| e.id == candidate.to_string()) {
        candidate += 1;
    }
    candidate.to_string()
}

fn sort_newest_first(events: &mut [ScheduledEvent]) {
    events.sort_by(|a, b| b.start.cmp(&a.start));
}

impl ScheduledEvent {
    /// Event for a "publish later" of generated content: the first line is the
    /// title (ordinal removed), the rest is the promotional body, and the post
    /// occupies 09:00 to 21:00 local time on `day`.
    pub fn from_generated(
        platform: Platform,
        content: &str,
        day: NaiveDate,
        offset: FixedOffset,
    ) -> AppResult<Self> {
        let mut lines = content.lines();
        let title = strip_ordinal(lines.next().unwrap_or_default()).to_string();
        let promotional_content = lines.collect::<Vec<_>>().join("\n").trim().to_string();

        let start = day
            .and_hms_opt(PUBLISH_HOUR, 0, 0)
            .and_then(|local| local.and_local_timezone(offset).single())
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| AppError::Validation("Invalid publish date".to_string()))?;

        Ok(ScheduledEvent {
            id: millis_token(),
            title,
            start,
            end: start + Duration::hours(PUBLISH_WINDOW_HOURS),
            platform,
            all_day: false,
            content: content.to_string(),
            promotional_content,
            background_color: platform.color().to_string(),
        })
    }
}

pub struct ScheduleStore {
    store: Arc<dyn KeyValueStore>,
    writers: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ScheduleStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            writers: Mutex::new(HashMap::new()),
        }
    }

    async fn writer(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.writers
            .lock()
            .await
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }

    /// Load a user's events, skipping elements that no longer parse.
    async fn load(&self, user_id: &str) -> AppResult<Vec<ScheduledEvent>> {
        let Some(raw) = self.store.get(user_id, EVENTS_KEY).await? else {
            return Ok(Vec::new());
        };

        let values: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!("Stored calendar of user {} is not an array: {}", user_id, e);
                return Ok(Vec::new());
            }
        };

        Ok(values
            .into_iter()
            .filter_map(|v| match serde_json::from_value::<ScheduledEvent>(v) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!("Skipping unreadable calendar event: {}", e);
                    None
                }
            })
            .collect())
    }

    async fn persist(&self, user_id: &str, events: &[ScheduledEvent]) -> AppResult<()> {
        let raw = serde_json::to_string(events)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("serialize calendar: {}", e)))?;
        self.store.put(user_id, EVENTS_KEY, &raw).await
    }

    /// Insert `event` at the head, or replace the stored event with the same
    /// id, then re-sort and persist the whole list.
    pub async fn add_event(&self, user_id: &str, event: ScheduledEvent) -> AppResult<ScheduledEvent> {
        let writer = self.writer(user_id).await;
        let _guard = writer.lock().await;

        let mut events = self.load(user_id).await?;

        let existing = events
            .iter()
            .position(|e| !event.id.is_empty() && e.id == event.id);
        let saved = match existing {
            Some(idx) => {
                events[idx] = event.clone();
                event
            }
            None => {
                let mut event = event;
                if event.id.is_empty() || events.iter().any(|e| e.id == event.id) {
                    event.id = unique_id(&events);
                }
                events.insert(0, event.clone());
                event
            }
        };

        sort_newest_first(&mut events);
        self.persist(user_id, &events).await?;

        tracing::debug!("Saved calendar event {} for user {}", saved.id, user_id);
        Ok(saved)
    }

    /// Create or edit an event from a client payload.
    pub async fn save(&self, user_id: &str, payload: SaveScheduledEvent) -> AppResult<ScheduledEvent> {
        let platform = payload.platform.unwrap_or(Platform::Instagram);
        let end = payload.end.unwrap_or(payload.start);
        if end < payload.start {
            return Err(AppError::Validation("Event ends before it starts".to_string()));
        }

        let event = ScheduledEvent {
            id: payload.id.unwrap_or_default(),
            title: payload.title.unwrap_or_default(),
            start: payload.start,
            end,
            platform,
            all_day: payload.all_day.unwrap_or(true),
            content: payload.content.unwrap_or_default(),
            promotional_content: payload.promotional_content.unwrap_or_default(),
            background_color: platform.color().to_string(),
        };
        self.add_event(user_id, event).await
    }

    /// Events lying entirely within the given bounds (all when unbounded),
    /// newest first.
    pub async fn list_events(
        &self,
        user_id: &str,
        range_start: Option<DateTime<Utc>>,
        range_end: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<ScheduledEvent>> {
        let mut events = self.load(user_id).await?;
        events.retain(|e| {
            range_start.map_or(true, |s| e.start >= s) && range_end.map_or(true, |end| e.end <= end)
        });
        sort_newest_first(&mut events);
        Ok(events)
    }
}

/// Bucket events by the local day of their start, latest day first.
pub fn group_by_date(events: &[ScheduledEvent], offset: FixedOffset) -> Vec<DateBucket> {
    let mut by_day: HashMap<NaiveDate, Vec<ScheduledEvent>> = HashMap::new();
    for event in events {
        let day = event.start.with_timezone(&offset).date_naive();
        by_day.entry(day).or_default().push(event.clone());
    }

    let mut days: Vec<_> = by_day.into_iter().collect();
    days.sort_by(|a, b| b.0.cmp(&a.0));
    days.into_iter()
        .map(|(day, mut events)| {
            sort_newest_first(&mut events);
            DateBucket {
                date: day.format("%Y-%m-%d").to_string(),
                events,
            }
        })
        .collect()
}

/// Offset east of UTC from a browser-style minute count. Out-of-range values
/// fall back to UTC.
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}
