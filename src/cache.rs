// ABOUTME: Bounded LRU memoization of completed responses keyed by request fingerprint
// ABOUTME: Price is excluded from the fingerprint; errors are never cached
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Macrolens Project

//! Request cache.
//!
//! Identical menu items recur constantly across menus, so completed
//! responses are memoized in a bounded LRU. The fingerprint covers only the
//! fields that influence the estimate (item name, description, modifiers,
//! restaurant); price feeds nothing downstream of feature extraction for
//! cached items and would only fragment the cache.

use crate::models::{NutritionRequest, NutritionResponse};
use lru::LruCache;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::debug;

/// Capacity used when the configured size is zero
const FALLBACK_CAPACITY: usize = 10_000;

/// Thread-safe bounded LRU over completed responses
#[derive(Debug)]
pub struct RequestCache {
    entries: Mutex<LruCache<String, NutritionResponse>>,
}

impl RequestCache {
    /// A cache holding at most `max_entries` responses
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries)
            .or_else(|| NonZeroUsize::new(FALLBACK_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Canonical fingerprint of a request.
    ///
    /// Sha256 over a JSON object with sorted keys; absent modifiers
    /// normalize to an empty list so `None` and `Some(vec![])` collide.
    /// Price is deliberately omitted.
    #[must_use]
    pub fn fingerprint(request: &NutritionRequest) -> String {
        let canonical = json!({
            "description": request.description,
            "item_name": request.item_name,
            "modifiers": request.modifiers.clone().unwrap_or_default(),
            "restaurant": request.restaurant,
        });
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Look up a cached response, marking the entry most recently used
    #[must_use]
    pub fn get(&self, key: &str) -> Option<NutritionResponse> {
        match self.entries.lock() {
            Ok(mut entries) => entries.get(key).cloned(),
            Err(_) => None,
        }
    }

    /// Store a completed response, evicting the least recently used entry
    /// at capacity
    pub fn put(&self, key: String, response: NutritionResponse) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(key, response);
        } else {
            debug!("cache mutex poisoned, dropping entry");
        }
    }

    /// Current entry count
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    /// True when the cache holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::RequestCache;
    use crate::models::{DebugPayload, MacroVector, NutritionRequest, NutritionResponse};

    fn request(item: &str, price: Option<f64>) -> NutritionRequest {
        NutritionRequest {
            item_name: item.into(),
            description: "with fries".into(),
            restaurant: Some("mcdonalds".into()),
            price,
            modifiers: None,
        }
    }

    fn response(calories: f64) -> NutritionResponse {
        NutritionResponse {
            macros: MacroVector {
                calories,
                ..MacroVector::ZERO
            },
            confidence: 0.8,
            debug: DebugPayload::default(),
        }
    }

    #[test]
    fn price_does_not_affect_the_fingerprint() {
        let a = RequestCache::fingerprint(&request("big mac", Some(5.99)));
        let b = RequestCache::fingerprint(&request("big mac", Some(7.49)));
        let c = RequestCache::fingerprint(&request("big mac", None));
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn absent_modifiers_normalize_to_empty() {
        let mut with_empty = request("big mac", None);
        with_empty.modifiers = Some(vec![]);
        assert_eq!(
            RequestCache::fingerprint(&request("big mac", None)),
            RequestCache::fingerprint(&with_empty)
        );

        let mut with_mods = request("big mac", None);
        with_mods.modifiers = Some(vec!["extra cheese".into()]);
        assert_ne!(
            RequestCache::fingerprint(&request("big mac", None)),
            RequestCache::fingerprint(&with_mods)
        );
    }

    #[test]
    fn lru_evicts_the_oldest_entry_at_capacity() {
        let cache = RequestCache::new(2);
        cache.put("a".into(), response(1.0));
        cache.put("b".into(), response(2.0));
        // Touch "a" so "b" becomes the eviction candidate
        assert!(cache.get("a").is_some());
        cache.put("c".into(), response(3.0));

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn zero_capacity_falls_back_to_the_default() {
        let cache = RequestCache::new(0);
        cache.put("a".into(), response(1.0));
        assert!(cache.get("a").is_some());
    }
}
