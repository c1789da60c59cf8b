//! Read-through cache of decrypted values
//!
//! Entries live until explicitly invalidated; nothing is written to disk and
//! plaintext is zeroized when an entry is dropped.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

struct CacheEntry {
    plaintext: Zeroizing<String>,
    loaded_at: DateTime<Utc>,
}

/// Shared name → plaintext map
#[derive(Default)]
pub struct SecretCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl SecretCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached plaintext, if any
    pub fn get(&self, name: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(name).map(|e| e.plaintext.as_str().to_owned())
    }

    /// Insert or replace an entry
    pub fn put(&self, name: &str, plaintext: String) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            name.to_string(),
            CacheEntry {
                plaintext: Zeroizing::new(plaintext),
                loaded_at: Utc::now(),
            },
        );
    }

    /// When the entry was loaded
    pub fn loaded_at(&self, name: &str) -> Option<DateTime<Utc>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(name).map(|e| e.loaded_at)
    }

    /// Drop one entry; `true` if it was cached
    pub fn invalidate(&self, name: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(name).is_some()
    }

    /// Drop everything (bulk import, restore)
    pub fn invalidate_all(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_put_get_invalidate() {
        let cache = SecretCache::new();
        assert!(cache.get("JWT_SECRET_KEY").is_none());

        cache.put("JWT_SECRET_KEY", "v1".to_string());
        assert_eq!(cache.get("JWT_SECRET_KEY").as_deref(), Some("v1"));
        assert!(cache.loaded_at("JWT_SECRET_KEY").is_some());

        cache.put("JWT_SECRET_KEY", "v2".to_string());
        assert_eq!(cache.get("JWT_SECRET_KEY").as_deref(), Some("v2"));
        assert_eq!(cache.len(), 1);

        assert!(cache.invalidate("JWT_SECRET_KEY"));
        assert!(!cache.invalidate("JWT_SECRET_KEY"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_all() {
        let cache = SecretCache::new();
        cache.put("A", "1".to_string());
        cache.put("B", "2".to_string());
        cache.invalidate_all();
        assert!(cache.get("A").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(SecretCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    let name = format!("KEY_{}", i);
                    for n in 0..100 {
                        cache.put(&name, n.to_string());
                        assert!(cache.get(&name).is_some());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 8);
        assert_eq!(cache.get("KEY_3").as_deref(), Some("99"));
    }
}
