//! Process-global TTS response cache (spec section 4.4). Writes are
//! serialized behind a single lock; reads clone an `Arc` snapshot of the
//! entry so playback never holds the lock while streaming frames.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

pub const CAPACITY: usize = 50;
pub const TTL: Duration = Duration::from_secs(3600);
pub const MAX_TEXT_LEN: usize = 100;

struct Entry {
    frames: Arc<Vec<u8>>,
    inserted_at: Instant,
}

/// FIFO-eviction cache keyed by normalized synthesis text.
pub struct ResponseCache {
    inner: RwLock<Inner>,
}

struct Inner {
    entries: std::collections::HashMap<String, Entry>,
    order: VecDeque<String>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: std::collections::HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Normalizes raw synthesis text to a cache key: trim, lowercase, strip
    /// punctuation.
    pub fn normalize(text: &str) -> String {
        text.trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn get(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        let inner = self.inner.read();
        let entry = inner.entries.get(key)?;
        if entry.inserted_at.elapsed() > TTL {
            return None;
        }
        Some(entry.frames.clone())
    }

    /// No-ops for text longer than [`MAX_TEXT_LEN`], matching the spec's
    /// "cache only when |text| < 100 characters" rule.
    pub fn put(&self, key: String, frames: Vec<u8>) {
        if key.len() >= MAX_TEXT_LEN {
            return;
        }
        let mut inner = self.inner.write();
        if let Some(pos) = inner.order.iter().position(|k| k == &key) {
            inner.order.remove(pos);
        }
        inner.order.push_back(key.clone());
        inner.entries.insert(
            key,
            Entry {
                frames: Arc::new(frames),
                inserted_at: Instant::now(),
            },
        );
        while inner.order.len() > CAPACITY {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Short acknowledgement phrases common in a sales call, warmed in the
/// background on process start (spec section 4.4).
pub const WARM_PHRASES: &[&str] = &[
    "Could you give me 30 seconds?",
    "I totally understand.",
    "That's a great question.",
    "Let me check on that for you.",
    "Absolutely, happy to help.",
    "No worries at all.",
    "I appreciate your patience.",
    "Does that make sense?",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_lowercases_and_strips_punctuation() {
        assert_eq!(
            ResponseCache::normalize("  Could you give me 30 seconds?! "),
            "could you give me 30 seconds"
        );
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = ResponseCache::new();
        cache.put("hello".into(), vec![1, 2, 3]);
        assert_eq!(*cache.get("hello").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn text_at_or_over_max_len_is_not_cached() {
        let cache = ResponseCache::new();
        let long_key = "a".repeat(MAX_TEXT_LEN);
        cache.put(long_key.clone(), vec![1]);
        assert!(cache.get(&long_key).is_none());
    }

    #[test]
    fn oldest_entry_is_evicted_past_capacity() {
        let cache = ResponseCache::new();
        for i in 0..CAPACITY + 1 {
            cache.put(format!("k{i}"), vec![i as u8]);
        }
        assert_eq!(cache.len(), CAPACITY);
        assert!(cache.get("k0").is_none());
        assert!(cache.get(&format!("k{CAPACITY}")).is_some());
    }

    #[test]
    fn re_putting_a_key_moves_it_to_the_back_of_the_eviction_order() {
        let cache = ResponseCache::new();
        for i in 0..CAPACITY {
            cache.put(format!("k{i}"), vec![i as u8]);
        }
        cache.put("k0".into(), vec![0]);
        cache.put("new".into(), vec![99]);
        assert!(cache.get("k0").is_some(), "re-put entry should not be the next eviction victim");
        assert!(cache.get("k1").is_none(), "k1 is now the oldest entry and should be evicted");
    }
}
