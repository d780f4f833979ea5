//! Per-user content editing sessions: the current title generation, the
//! selected title and platform, and the platform caption cache.
//!
//! Session state lives in memory. A session untouched for longer than the
//! idle TTL is evicted the next time the store is locked. The store
//! lock is released before any generation call and re-taken to record the
//! result, so concurrent calls for the same key are not de-duplicated and the
//! last one to resolve wins. Every top-level generation bumps the cache epoch;
//! a caption that resolves after such a bump is handed back to its caller but
//! not stored, since its title key belongs to a discarded generation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};

use crate::db::models::{Language, Platform};
use crate::error::{AppError, AppResult};
use crate::services::generation::TextGenerator;
use crate::services::prompt::{GenerationRequest, PromptBuilder};
use crate::services::titles::{parse_titles, TitleCandidate};

/// Platform -> title key -> caption.
#[derive(Debug, Clone, Default)]
pub struct PlatformContentCache {
    entries: HashMap<Platform, HashMap<String, String>>,
    epoch: u64,
}

impl PlatformContentCache {
    pub fn get(&self, platform: Platform, title_key: &str) -> Option<&str> {
        self.entries
            .get(&platform)
            .and_then(|by_title| by_title.get(title_key))
            .map(String::as_str)
    }

    /// Store (or overwrite) the caption of a (platform, title) pair.
    pub fn insert(&mut self, platform: Platform, title_key: &str, text: String) {
        self.entries
            .entry(platform)
            .or_default()
            .insert(title_key.to_string(), text);
    }

    /// Drop every entry and start a new epoch.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.epoch += 1;
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn to_map(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        self.entries
            .iter()
            .map(|(platform, by_title)| {
                (
                    platform.as_str().to_string(),
                    by_title
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                )
            })
            .collect()
    }
}

/// Outcome of the last title generation. Replaced wholesale on every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub text: String,
    pub has_error: bool,
}

#[derive(Debug, Clone)]
pub struct ContentSession {
    request: Option<GenerationRequest>,
    model_key: String,
    result: Option<GenerationResult>,
    titles: Vec<TitleCandidate>,
    selected_title: Option<String>,
    selected_platform: Platform,
    cache: PlatformContentCache,
    last_active: Instant,
}

impl Default for ContentSession {
    fn default() -> Self {
        Self {
            request: None,
            model_key: "auto".to_string(),
            result: None,
            titles: Vec::new(),
            selected_title: None,
            selected_platform: Platform::Instagram,
            cache: PlatformContentCache::default(),
            last_active: Instant::now(),
        }
    }
}

impl ContentSession {
    fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    fn ensure_title(&self, title_key: &str) -> AppResult<()> {
        if self.titles.iter().any(|t| t.key == title_key) {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Title not found: {}", title_key)))
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        let request = self.request.as_ref();
        SessionSnapshot {
            prompt: request.map(|r| r.raw_subject_text.clone()).unwrap_or_default(),
            keywords: request.map(|r| r.keywords.clone()).unwrap_or_default(),
            language: request.map(|r| r.language).unwrap_or_default(),
            purpose: request.and_then(|r| r.purpose.clone()),
            images: request.map(|r| r.attached_images.clone()).unwrap_or_default(),
            model: self.model_key.clone(),
            generated_content: self.result.clone(),
            titles: self.titles.clone(),
            selected_title: self.selected_title.clone(),
            selected_platform: self.selected_platform,
            platform_content: self.cache.to_map(),
        }
    }
}

/// Serializable view of a session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub prompt: String,
    pub keywords: Vec<String>,
    pub language: Language,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub images: Vec<String>,
    pub model: String,
    pub generated_content: Option<GenerationResult>,
    pub titles: Vec<TitleCandidate>,
    pub selected_title: Option<String>,
    pub selected_platform: Platform,
    pub platform_content: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOutcome {
    /// False when the key was already selected and nothing happened.
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// In-memory sessions keyed by user id.
#[derive(Debug)]
pub struct ContentSessionStore {
    sessions: Mutex<HashMap<String, ContentSession>>,
    idle_ttl: Duration,
}

impl ContentSessionStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_ttl,
        }
    }

    /// Lock the store, dropping sessions idle for longer than the TTL.
    async fn lock(&self) -> MutexGuard<'_, HashMap<String, ContentSession>> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_active.elapsed() < self.idle_ttl);
        if sessions.len() < before {
            tracing::debug!("Evicted {} idle content sessions", before - sessions.len());
        }
        sessions
    }
}

pub struct ContentService {
    generator: Arc<dyn TextGenerator>,
    store: ContentSessionStore,
}

impl ContentService {
    pub fn new(generator: Arc<dyn TextGenerator>, idle_ttl: Duration) -> Self {
        Self {
            generator,
            store: ContentSessionStore::new(idle_ttl),
        }
    }

    /// Run a new top-level title generation. All cached captions are
    /// discarded before the call is issued.
    pub async fn start_generation(
        &self,
        user_id: &str,
        request: GenerationRequest,
        model_key: &str,
    ) -> AppResult<SessionSnapshot> {
        request.validate()?;
        let prompt = PromptBuilder::titles(&request);

        let epoch = {
            let mut sessions = self.store.lock().await;
            let session = sessions.entry(user_id.to_string()).or_default();
            session.touch();
            session.cache.clear();
            session.request = Some(request);
            session.model_key = model_key.to_string();
            session.result = None;
            session.titles.clear();
            session.selected_title = None;
            session.cache.epoch()
        };

        let outcome = self.generator.generate(&prompt, model_key).await;

        let mut sessions = self.store.lock().await;
        let session = sessions.entry(user_id.to_string()).or_default();
        if session.cache.epoch() != epoch {
            tracing::debug!("Discarding superseded title generation for user {}", user_id);
            return match outcome {
                Ok(text) => {
                    let mut stale = session.clone();
                    stale.titles = parse_titles(&text);
                    stale.result = Some(GenerationResult {
                        text,
                        has_error: false,
                    });
                    Ok(stale.snapshot())
                }
                Err(e) => Err(e),
            };
        }

        match outcome {
            Ok(text) => {
                session.titles = parse_titles(&text);
                session.result = Some(GenerationResult {
                    text,
                    has_error: false,
                });
                Ok(session.snapshot())
            }
            Err(e) => {
                tracing::warn!("Title generation failed for user {}: {}", user_id, e);
                session.result = Some(GenerationResult {
                    text: e.to_string(),
                    has_error: true,
                });
                Err(e)
            }
        }
    }

    /// Select a title and make sure a caption exists for it on the selected
    /// (or given) platform. Re-selecting the current title on the current
    /// platform is a no-op.
    pub async fn select_title(
        &self,
        user_id: &str,
        title_key: &str,
        platform: Option<Platform>,
    ) -> AppResult<SelectOutcome> {
        let platform = {
            let mut sessions = self.store.lock().await;
            let session = sessions
                .get_mut(user_id)
                .ok_or_else(|| AppError::Validation("No active generation".to_string()))?;

            session.touch();

            let platform_changed = platform.is_some_and(|p| p != session.selected_platform);
            if let Some(p) = platform {
                session.selected_platform = p;
            }
            let platform = session.selected_platform;

            if !platform_changed && session.selected_title.as_deref() == Some(title_key) {
                return Ok(SelectOutcome {
                    changed: false,
                    content: session.cache.get(platform, title_key).map(str::to_string),
                });
            }
            session.ensure_title(title_key)?;
            session.selected_title = Some(title_key.to_string());
            platform
        };

        let content = self.get_or_generate(user_id, platform, title_key, false).await?;
        Ok(SelectOutcome {
            changed: true,
            content: Some(content),
        })
    }

    /// Cached caption for (platform, title), generating it when missing or
    /// when `force_refresh` is set.
    pub async fn get_or_generate(
        &self,
        user_id: &str,
        platform: Platform,
        title_key: &str,
        force_refresh: bool,
    ) -> AppResult<String> {
        let (request, model_key, epoch) = {
            let mut sessions = self.store.lock().await;
            let session = sessions
                .get_mut(user_id)
                .ok_or_else(|| AppError::Validation("No active generation".to_string()))?;
            session.touch();
            session.ensure_title(title_key)?;
            let request = session
                .request
                .clone()
                .ok_or_else(|| AppError::Validation("No active generation".to_string()))?;

            if !force_refresh {
                if let Some(cached) = session.cache.get(platform, title_key) {
                    return Ok(cached.to_string());
                }
            }
            (request, session.model_key.clone(), session.cache.epoch())
        };

        let prompt = PromptBuilder::platform_caption(&request, platform, title_key);
        let text = self.generator.generate(&prompt, &model_key).await?;

        let mut sessions = self.store.lock().await;
        match sessions.get_mut(user_id) {
            Some(session) if session.cache.epoch() == epoch => {
                session.cache.insert(platform, title_key, text.clone());
            }
            _ => {
                tracing::debug!(
                    "Caption for {} resolved after invalidation; not cached",
                    platform
                );
            }
        }

        Ok(text)
    }

    pub async fn select_platform(&self, user_id: &str, platform: Platform) -> SessionSnapshot {
        let mut sessions = self.store.lock().await;
        let session = sessions.entry(user_id.to_string()).or_default();
        session.touch();
        session.selected_platform = platform;
        session.snapshot()
    }

    pub async fn snapshot(&self, user_id: &str) -> SessionSnapshot {
        let sessions = self.store.lock().await;
        sessions
            .get(user_id)
            .map(ContentSession::snapshot)
            .unwrap_or_else(|| ContentSession::default().snapshot())
    }

    /// Forget everything about the user's session.
    pub async fn clear(&self, user_id: &str) {
        self.store.lock().await.remove(user_id);
    }
}
