use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::sync::Cache;
use serde::Serialize;

use crate::artifact::Artifact;
use crate::config::CacheSettings;

/// A completed result kept for fingerprint-based deduplication.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub fingerprint: String,
    pub job_id: String,
    pub artifact: Artifact,
    pub stored_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// TTL cache over completed, non-simulated results, keyed by request
/// fingerprint. At most one live entry per fingerprint.
pub struct ResultCache {
    entries: Cache<String, CacheEntry>,
    ttl: chrono::Duration,
}

impl ResultCache {
    pub fn new(settings: &CacheSettings) -> Self {
        let entries = Cache::builder()
            .max_capacity(settings.max_capacity)
            .time_to_live(Duration::from_secs(settings.ttl_secs))
            .build();

        Self {
            entries,
            ttl: chrono::Duration::seconds(settings.ttl_secs as i64),
        }
    }

    /// Stores a completed result. Simulated artifacts are never cached;
    /// returns whether the entry was stored.
    pub fn store(&self, fingerprint: &str, job_id: &str, artifact: &Artifact) -> bool {
        if artifact.simulated {
            log::debug!(
                "Skipping cache store for job {}: artifact is simulated",
                job_id
            );
            return false;
        }

        let now = Utc::now();
        let entry = CacheEntry {
            fingerprint: fingerprint.to_string(),
            job_id: job_id.to_string(),
            artifact: artifact.clone(),
            stored_at: now,
            expires_at: now + self.ttl,
        };

        log::debug!(
            "Caching result of job {} under fingerprint {}",
            job_id,
            fingerprint
        );
        self.entries.insert(fingerprint.to_string(), entry);
        true
    }

    /// Looks up a live entry. The entry's own `expires_at` is re-checked so a
    /// stale entry is never served even if eviction has not run yet.
    pub fn lookup(&self, fingerprint: &str) -> Option<CacheEntry> {
        let entry = self.entries.get(fingerprint)?;
        if entry.expires_at <= Utc::now() {
            self.entries.invalidate(fingerprint);
            return None;
        }
        Some(entry)
    }

    pub fn invalidate(&self, fingerprint: &str) {
        self.entries.invalidate(fingerprint);
    }

    pub fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }
}
