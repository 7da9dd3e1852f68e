//! Durable bot state: watched wallets, token blacklist, factory toggles.
//!
//! Everything is held in memory behind a mutex and rewritten to a JSON file
//! wholesale on every mutation, so a restart picks up exactly where the
//! operator left off.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BotState {
    #[serde(default)]
    pub watched_wallets: Vec<Address>,
    /// Lowercased token addresses the alert pipeline skips.
    #[serde(default)]
    pub token_blacklist: Vec<String>,
    #[serde(default)]
    pub enabled_factories: Vec<String>,
}

pub struct StateStore {
    path: PathBuf,
    state: Mutex<BotState>,
}

impl StateStore {
    /// Load from disk, falling back to an empty state when the file is
    /// missing or unreadable.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let state = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BotState>(&raw) {
                Ok(state) => {
                    info!(
                        path = %path.display(),
                        wallets = state.watched_wallets.len(),
                        blacklisted = state.token_blacklist.len(),
                        "loaded state"
                    );
                    state
                }
                Err(e) => {
                    warn!(path = %path.display(), ?e, "state file corrupt, starting fresh");
                    BotState::default()
                }
            },
            Err(_) => BotState::default(),
        };
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    pub async fn watched_wallets(&self) -> Vec<Address> {
        self.state.lock().await.watched_wallets.clone()
    }

    pub async fn blacklist(&self) -> Vec<String> {
        self.state.lock().await.token_blacklist.clone()
    }

    pub async fn is_blacklisted(&self, token: Address) -> bool {
        self.is_blacklisted_any(&[format!("{token:?}").as_str()]).await
    }

    /// Blacklist matching accepts either an address or a symbol entry, both
    /// case-insensitive.
    pub async fn is_blacklisted_any(&self, candidates: &[&str]) -> bool {
        let needles: Vec<String> = candidates
            .iter()
            .map(|c| c.trim().to_lowercase())
            .collect();
        self.state
            .lock()
            .await
            .token_blacklist
            .iter()
            .any(|t| needles.iter().any(|n| n == t))
    }

    /// Empty list means every factory is enabled.
    pub async fn factory_enabled(&self, name: &str) -> bool {
        let state = self.state.lock().await;
        state.enabled_factories.is_empty()
            || state
                .enabled_factories
                .iter()
                .any(|f| f.eq_ignore_ascii_case(name))
    }

    /// Returns false when the wallet was already watched.
    pub async fn watch_wallet(&self, wallet: Address) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.watched_wallets.contains(&wallet) {
            return Ok(false);
        }
        state.watched_wallets.push(wallet);
        self.persist(&state)?;
        Ok(true)
    }

    pub async fn unwatch_wallet(&self, wallet: Address) -> Result<bool> {
        let mut state = self.state.lock().await;
        let before = state.watched_wallets.len();
        state.watched_wallets.retain(|w| *w != wallet);
        let removed = state.watched_wallets.len() < before;
        if removed {
            self.persist(&state)?;
        }
        Ok(removed)
    }

    /// Blacklist entries are stored lowercased and trimmed so lookups are
    /// case-insensitive.
    pub async fn blacklist_token(&self, token: &str) -> Result<bool> {
        let entry = token.trim().to_lowercase();
        let mut state = self.state.lock().await;
        if state.token_blacklist.contains(&entry) {
            return Ok(false);
        }
        state.token_blacklist.push(entry);
        self.persist(&state)?;
        Ok(true)
    }

    pub async fn unblacklist_token(&self, token: &str) -> Result<bool> {
        let entry = token.trim().to_lowercase();
        let mut state = self.state.lock().await;
        let before = state.token_blacklist.len();
        state.token_blacklist.retain(|t| *t != entry);
        let removed = state.token_blacklist.len() < before;
        if removed {
            self.persist(&state)?;
        }
        Ok(removed)
    }

    fn persist(&self, state: &BotState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("failed to write state to {}", self.path.display()))
    }
}

/// In-memory dedup of already-processed identifiers with periodic cleanup to
/// bound memory over long runs.
pub struct DedupSet {
    seen: Mutex<HashSet<String>>,
    max_entries: usize,
}

impl DedupSet {
    pub fn new(max_entries: usize) -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
            max_entries,
        }
    }

    /// Insert and report whether the key was new. The whole set is dropped
    /// once it exceeds the cap; occasional duplicate alerts after a flush
    /// are acceptable.
    pub async fn insert(&self, key: impl Into<String>) -> bool {
        let mut seen = self.seen.lock().await;
        if seen.len() >= self.max_entries {
            warn!(entries = seen.len(), "dedup set full, flushing");
            seen.clear();
        }
        seen.insert(key.into())
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.seen.lock().await.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn temp_state_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("base_sniper_state_test_{tag}_{}.json", std::process::id()))
    }

    #[tokio::test]
    async fn watch_and_unwatch_round_trip() {
        let path = temp_state_path("watch");
        let store = StateStore::load(&path);
        let wallet =
            Address::from_str("0x00000000000000000000000000000000000000aa").unwrap();

        assert!(store.watch_wallet(wallet).await.unwrap());
        assert!(!store.watch_wallet(wallet).await.unwrap());
        assert_eq!(store.watched_wallets().await, vec![wallet]);

        // A fresh store picks the wallet up from disk.
        let reloaded = StateStore::load(&path);
        assert_eq!(reloaded.watched_wallets().await, vec![wallet]);

        assert!(store.unwatch_wallet(wallet).await.unwrap());
        assert!(!store.unwatch_wallet(wallet).await.unwrap());

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn blacklist_is_case_insensitive() {
        let path = temp_state_path("blacklist");
        let store = StateStore::load(&path);
        let token =
            Address::from_str("0x00000000000000000000000000000000000000bb").unwrap();

        assert!(store
            .blacklist_token("0x00000000000000000000000000000000000000BB")
            .await
            .unwrap());
        assert!(store.is_blacklisted(token).await);
        assert!(!store
            .blacklist_token("  0x00000000000000000000000000000000000000bb ")
            .await
            .unwrap());

        assert!(store
            .unblacklist_token("0x00000000000000000000000000000000000000Bb")
            .await
            .unwrap());
        assert!(!store.is_blacklisted(token).await);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn blacklist_matches_symbol_entries() {
        let path = temp_state_path("symbol");
        let store = StateStore::load(&path);
        assert!(store.blacklist_token("SCAM").await.unwrap());
        assert!(store.is_blacklisted_any(&["0xdead", "scam"]).await);
        assert!(!store.is_blacklisted_any(&["0xdead", "FINE"]).await);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn empty_factory_list_enables_all() {
        let path = temp_state_path("factories");
        let store = StateStore::load(&path);
        assert!(store.factory_enabled("Aerodrome").await);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn corrupt_state_file_starts_fresh() {
        let path = temp_state_path("corrupt");
        std::fs::write(&path, "{not json").unwrap();
        let store = StateStore::load(&path);
        assert!(store.watched_wallets().await.is_empty());
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn dedup_reports_first_insert_only() {
        let dedup = DedupSet::new(100);
        assert!(dedup.insert("0xabc").await);
        assert!(!dedup.insert("0xabc").await);
        assert!(dedup.contains("0xabc").await);
    }

    #[tokio::test]
    async fn dedup_flushes_at_capacity() {
        let dedup = DedupSet::new(2);
        assert!(dedup.insert("a").await);
        assert!(dedup.insert("b").await);
        // Third insert crosses the cap, flushing the set first.
        assert!(dedup.insert("c").await);
        assert!(!dedup.contains("a").await);
    }
}
