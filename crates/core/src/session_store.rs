//! Session persistence: remote blob store first, local cache as fallback.
//!
//! Sessions are whole-document JSON blobs, overwritten on every save. The remote copy is reached
//! through a [`BlobStore`] (normally the presigned-URL [`BrokerClient`]); the local copy lives in
//! a [`LocalCache`] under two keys per user:
//!
//! - `{user}_grouped_diagnoses`: the last state known to match the remote copy
//! - `{user}_grouped_diagnoses_fallback`: the last state whose upload failed
//!
//! Loading and saving never fail from the caller's point of view. Problems are logged and
//! surfaced as a warning string on the outcome.

use crate::broker::BrokerClient;
use crate::constants::{
    FALLBACK_CACHE_SUFFIX, LAST_USER_ID_KEY, PRIMARY_CACHE_SUFFIX, REMOTE_FILENAME_SUFFIX,
};
use crate::model::SessionState;
use crate::{CoreConfig, StoreError, StoreResult};
use dxg_files::KeyValueStore;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

/// Remote whole-document storage.
pub trait BlobStore: Send + Sync {
    /// Fetches the document stored under `filename`.
    ///
    /// Returns `StoreError::NotFound` when nothing has been stored yet.
    fn fetch(&self, filename: &str) -> impl Future<Output = StoreResult<String>> + Send;

    /// Replaces the document stored under `filename`.
    fn upload(&self, filename: &str, body: String) -> impl Future<Output = StoreResult<()>> + Send;
}

impl BlobStore for BrokerClient {
    async fn fetch(&self, filename: &str) -> StoreResult<String> {
        self.get_object(filename).await
    }

    async fn upload(&self, filename: &str, body: String) -> StoreResult<()> {
        self.put_object(filename, body).await
    }
}

/// Local string storage that survives restarts.
pub trait LocalCache: Send + Sync {
    fn read(&self, key: &str) -> StoreResult<Option<String>>;
    fn write(&self, key: &str, value: &str) -> StoreResult<()>;
    fn delete(&self, key: &str) -> StoreResult<()>;
}

impl LocalCache for KeyValueStore {
    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.get(key)?)
    }

    fn write(&self, key: &str, value: &str) -> StoreResult<()> {
        Ok(self.set(key, value)?)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        Ok(self.remove(key)?)
    }
}

/// Process-lifetime cache, for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LocalCache for MemoryCache {
    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries().remove(key);
        Ok(())
    }
}

/// Where a loaded session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Remote,
    PrimaryCache,
    FallbackCache,
    Empty,
}

#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub state: SessionState,
    pub source: LoadSource,
    /// Set when the remote copy could not be used for a reason other than "never saved".
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Uploaded; the primary cache now mirrors the remote copy.
    Remote,
    /// Upload failed; the state was kept in the fallback cache.
    FallbackCache { warning: String },
    /// Neither the upload nor the fallback write succeeded.
    Failed { warning: String },
}

impl SaveOutcome {
    pub fn is_remote(&self) -> bool {
        matches!(self, SaveOutcome::Remote)
    }

    pub fn warning(&self) -> Option<&str> {
        match self {
            SaveOutcome::Remote => None,
            SaveOutcome::FallbackCache { warning } | SaveOutcome::Failed { warning } => {
                Some(warning)
            }
        }
    }
}

pub fn primary_cache_key(user_id: &str) -> String {
    format!("{}{}", user_id, PRIMARY_CACHE_SUFFIX)
}

pub fn fallback_cache_key(user_id: &str) -> String {
    format!("{}{}", user_id, FALLBACK_CACHE_SUFFIX)
}

pub fn remote_filename(user_id: &str) -> String {
    format!("{}{}", user_id, REMOTE_FILENAME_SUFFIX)
}

/// Session store used by the binaries.
pub type DefaultSessionStore = SessionStore<BrokerClient, KeyValueStore>;

impl DefaultSessionStore {
    /// Builds the store described by `cfg`: the configured broker, if any, and a file cache in
    /// the configured cache directory.
    pub fn from_config(cfg: &CoreConfig) -> StoreResult<Self> {
        let remote = cfg.broker_url().map(BrokerClient::new).transpose()?;
        let cache = KeyValueStore::open(cfg.cache_dir())?;

        match &remote {
            Some(broker) => tracing::info!("session store using broker at {}", broker.base_url()),
            None => tracing::info!("no broker configured, sessions are stored locally only"),
        }

        Ok(Self::new(remote, cache))
    }
}

#[derive(Debug)]
pub struct SessionStore<R, L> {
    remote: Option<R>,
    cache: L,
}

impl<R: BlobStore, L: LocalCache> SessionStore<R, L> {
    /// Creates a store. `remote` of `None` runs in local-only mode.
    pub fn new(remote: Option<R>, cache: L) -> Self {
        Self { remote, cache }
    }

    pub fn is_local_only(&self) -> bool {
        self.remote.is_none()
    }

    /// Loads the session of `user_id`.
    ///
    /// Sources are tried in order: remote, primary cache, fallback cache. If the remote reports
    /// that nothing was ever stored, only the fallback cache is consulted, since it holds the
    /// only data that can be newer than "nothing". With nothing usable the state is empty.
    pub async fn load(&self, user_id: &str) -> LoadOutcome {
        let remote_result = match &self.remote {
            Some(remote) => remote
                .fetch(&remote_filename(user_id))
                .await
                .and_then(|raw| Ok(SessionState::from_json(&raw)?)),
            None => Err(StoreError::Network("no broker configured".into())),
        };

        let warning = match remote_result {
            Ok(state) => {
                if let Err(e) = self.write_state(&primary_cache_key(user_id), &state) {
                    tracing::warn!("failed to refresh local cache for {}: {}", user_id, e);
                }
                tracing::info!("loaded session for {} from remote storage", user_id);
                return LoadOutcome {
                    state,
                    source: LoadSource::Remote,
                    warning: None,
                };
            }
            Err(StoreError::NotFound) => {
                tracing::info!("no remote session for {}", user_id);
                let source = match self.read_state(&fallback_cache_key(user_id)) {
                    Some(state) => (state, LoadSource::FallbackCache),
                    None => (SessionState::default(), LoadSource::Empty),
                };
                return LoadOutcome {
                    state: source.0,
                    source: source.1,
                    warning: None,
                };
            }
            Err(e) if self.is_local_only() => {
                tracing::debug!("remote load skipped for {}: {}", user_id, e);
                None
            }
            Err(e) => {
                tracing::warn!("remote load failed for {}: {}", user_id, e);
                Some(format!("could not load from server ({}); using local data", e))
            }
        };

        if let Some(state) = self.read_state(&primary_cache_key(user_id)) {
            return LoadOutcome {
                state,
                source: LoadSource::PrimaryCache,
                warning,
            };
        }

        if let Some(state) = self.read_state(&fallback_cache_key(user_id)) {
            return LoadOutcome {
                state,
                source: LoadSource::FallbackCache,
                warning,
            };
        }

        LoadOutcome {
            state: SessionState::default(),
            source: LoadSource::Empty,
            warning,
        }
    }

    /// Saves `state` for `user_id`, overwriting the previous copy.
    ///
    /// On a successful upload the primary cache is refreshed and any stale fallback entry is
    /// removed. On failure the state goes to the fallback cache. There is no retry.
    pub async fn save(&self, user_id: &str, state: &SessionState) -> SaveOutcome {
        let body = match state.to_json() {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("failed to serialise session for {}: {}", user_id, e);
                return SaveOutcome::Failed {
                    warning: format!("could not serialise session: {}", e),
                };
            }
        };

        let upload = match &self.remote {
            Some(remote) => remote.upload(&remote_filename(user_id), body.clone()).await,
            None => Err(StoreError::Network("no broker configured".into())),
        };

        let fallback_key = fallback_cache_key(user_id);
        match upload {
            Ok(()) => {
                if let Err(e) = self.cache.write(&primary_cache_key(user_id), &body) {
                    tracing::warn!("failed to refresh local cache for {}: {}", user_id, e);
                }
                if let Err(e) = self.cache.delete(&fallback_key) {
                    tracing::warn!("failed to clear fallback cache for {}: {}", user_id, e);
                }
                tracing::debug!("saved session for {} to remote storage", user_id);
                SaveOutcome::Remote
            }
            Err(upload_error) => {
                if self.is_local_only() {
                    tracing::debug!("saving session for {} locally", user_id);
                } else {
                    tracing::warn!("remote save failed for {}: {}", user_id, upload_error);
                }

                match self.cache.write(&fallback_key, &body) {
                    Ok(()) => SaveOutcome::FallbackCache {
                        warning: format!("saved locally only ({})", upload_error),
                    },
                    Err(e) => {
                        tracing::error!("failed to write fallback cache for {}: {}", user_id, e);
                        SaveOutcome::Failed {
                            warning: format!("save failed ({}; {})", upload_error, e),
                        }
                    }
                }
            }
        }
    }

    /// Removes every cached copy for `user_id` and overwrites the remote copy with an empty
    /// session.
    pub async fn clear(&self, user_id: &str) -> SaveOutcome {
        for key in [primary_cache_key(user_id), fallback_cache_key(user_id)] {
            if let Err(e) = self.cache.delete(&key) {
                tracing::warn!("failed to remove cache entry for {}: {}", user_id, e);
            }
        }
        tracing::info!("cleared stored session for {}", user_id);
        self.save(user_id, &SessionState::default()).await
    }

    pub fn remember_user_id(&self, user_id: &str) -> StoreResult<()> {
        self.cache.write(LAST_USER_ID_KEY, user_id)
    }

    pub fn last_user_id(&self) -> StoreResult<Option<String>> {
        self.cache.read(LAST_USER_ID_KEY)
    }

    fn write_state(&self, key: &str, state: &SessionState) -> StoreResult<()> {
        self.cache.write(key, &state.to_json()?)
    }

    /// Reads a cached state. Unparseable entries are removed so they are not tried again.
    fn read_state(&self, key: &str) -> Option<SessionState> {
        let raw = match self.cache.read(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("failed to read cache entry {}: {}", key, e);
                return None;
            }
        };

        match SessionState::from_json(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!("discarding unreadable cache entry {}: {}", key, e);
                if let Err(e) = self.cache.delete(key) {
                    tracing::warn!("failed to remove cache entry {}: {}", key, e);
                }
                None
            }
        }
    }
}
