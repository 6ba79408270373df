use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::storage::LocalStorage;
use crate::models::{CatchRecord, HotIssue, TideSnapshot, UserProfile};

/// Storage keys. The names are shared with the web client, which reads the
/// same values from `localStorage`.
pub mod keys {
    pub const TOKEN: &str = "token";
    pub const USER: &str = "user";
    pub const TIDE: &str = "mulddae";
    pub const TIDE_DATE: &str = "mulddaeDate";
    pub const TIDE_TIMESTAMP: &str = "mulddaeTimestamp";
    pub const CATCHES: &str = "catches";
    pub const HOT_ISSUES: &str = "hotIssues";

    /// Everything dropped on logout
    pub const SESSION_SCOPED: [&str; 7] = [
        TOKEN,
        USER,
        TIDE,
        TIDE_DATE,
        TIDE_TIMESTAMP,
        CATCHES,
        HOT_ISSUES,
    ];
}

/// Typed mirror of coordinator state on top of [`LocalStorage`].
///
/// Values are JSON except the token, which is stored raw. Nothing read from
/// here is trusted: callers re-check freshness and authenticity themselves.
#[derive(Debug, Clone)]
pub struct CacheManager {
    storage: LocalStorage,
}

impl CacheManager {
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(contents) = self.storage.get(key)? else {
            return Ok(None);
        };

        let value = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cached value: {}", key))?;
        Ok(Some(value))
    }

    fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let contents = serde_json::to_string(value)?;
        self.storage.set(key, &contents)
    }

    /// Load a value, logging and discarding anything unreadable
    pub fn advisory<T>(name: &str, loader: impl FnOnce() -> Result<Option<T>>) -> Option<T> {
        match loader() {
            Ok(value) => value,
            Err(e) => {
                warn!(cache = name, error = %e, "Ignoring unreadable cache entry");
                None
            }
        }
    }

    // ===== Session =====

    pub fn load_token(&self) -> Result<Option<String>> {
        Ok(self
            .storage
            .get(keys::TOKEN)?
            .filter(|token| !token.trim().is_empty()))
    }

    pub fn save_token(&self, token: &str) -> Result<()> {
        self.storage.set(keys::TOKEN, token)
    }

    pub fn has_token(&self) -> bool {
        Self::advisory(keys::TOKEN, || self.load_token()).is_some()
    }

    pub fn load_user(&self) -> Result<Option<UserProfile>> {
        self.load(keys::USER)
    }

    pub fn save_user(&self, user: &UserProfile) -> Result<()> {
        self.save(keys::USER, user)
    }

    /// Drop the persisted credentials
    pub fn clear_session(&self) -> Result<()> {
        self.storage.remove(keys::TOKEN)?;
        self.storage.remove(keys::USER)
    }

    // ===== Tide =====

    /// Reassemble the tide snapshot from its three keys. Any missing piece
    /// means there is no snapshot.
    pub fn load_tide(&self) -> Result<Option<TideSnapshot>> {
        let payload = self.load(keys::TIDE)?;
        let date_key = self.load(keys::TIDE_DATE)?;
        let fetched_at_ms = self.load(keys::TIDE_TIMESTAMP)?;

        match (payload, date_key, fetched_at_ms) {
            (Some(payload), Some(date_key), Some(fetched_at_ms)) => Ok(Some(TideSnapshot {
                payload,
                date_key,
                fetched_at_ms,
            })),
            _ => {
                debug!("Tide snapshot incomplete in storage");
                Ok(None)
            }
        }
    }

    pub fn save_tide(&self, snapshot: &TideSnapshot) -> Result<()> {
        self.save(keys::TIDE, &snapshot.payload)?;
        self.save(keys::TIDE_DATE, &snapshot.date_key)?;
        self.save(keys::TIDE_TIMESTAMP, &snapshot.fetched_at_ms)
    }

    pub fn clear_tide(&self) -> Result<()> {
        self.storage.remove(keys::TIDE)?;
        self.storage.remove(keys::TIDE_DATE)?;
        self.storage.remove(keys::TIDE_TIMESTAMP)
    }

    // ===== Catches =====

    pub fn load_catches(&self) -> Result<Option<Vec<CatchRecord>>> {
        self.load(keys::CATCHES)
    }

    pub fn save_catches(&self, catches: &[CatchRecord]) -> Result<()> {
        self.save(keys::CATCHES, catches)
    }

    // ===== Hot Issues =====

    pub fn load_hot_issues(&self) -> Result<Option<Vec<HotIssue>>> {
        self.load(keys::HOT_ISSUES)
    }

    pub fn save_hot_issues(&self, issues: &[HotIssue]) -> Result<()> {
        self.save(keys::HOT_ISSUES, issues)
    }

    /// Remove every session-scoped key (logout)
    pub fn clear_all(&self) -> Result<()> {
        for key in keys::SESSION_SCOPED {
            self.storage.remove(key)?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
