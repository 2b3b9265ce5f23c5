use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use super::tag::CacheTag;

/// One cached response, keyed by `(tag, params)` in the registry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    /// Registry generation at insert time. Entries never outlive their
    /// generation; a sweep drops them all.
    pub generation: u64,
    pub cached_at: DateTime<Utc>,
}

/// Handed out when a fetch starts; redeemed when its response arrives.
/// A sweep between the two invalidates the ticket and the response is
/// discarded instead of cached.
#[derive(Debug, Clone, Copy)]
pub struct FetchTicket {
    generation: u64,
}

/// Per-tag freshness for status displays and sync sweeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagStatus {
    pub fresh: bool,
    pub entries: usize,
    pub last_fetched: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<(CacheTag, String), CacheEntry>,
    /// Tags needing a refetch. Starts full: nothing is fresh until fetched.
    stale: HashSet<CacheTag>,
    generation: u64,
}

/// In-memory response cache for every [`CacheTag`].
///
/// Entries have no TTL. The only eviction is tag invalidation, and the only
/// caller of `invalidate_all` is the session-transition listener, so cache
/// content never crosses an identity change. The generation counter fences
/// in-flight fetches across that same boundary.
pub struct CacheRegistry {
    inner: Mutex<Inner>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                stale: CacheTag::ALL.into_iter().collect(),
                generation: 0,
            }),
        }
    }

    /// Start a fetch under the current generation.
    pub fn begin_fetch(&self) -> FetchTicket {
        let inner = self.inner.lock().unwrap();
        FetchTicket {
            generation: inner.generation,
        }
    }

    /// Redeem a fetch ticket. Returns false and caches nothing when a sweep
    /// happened after the ticket was issued.
    pub fn complete_fetch(
        &self,
        ticket: FetchTicket,
        tag: CacheTag,
        params: &str,
        value: Value,
    ) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if ticket.generation != inner.generation {
            debug!(
                %tag,
                ticket_generation = ticket.generation,
                current_generation = inner.generation,
                "Discarding fetch result from a superseded generation"
            );
            return false;
        }
        let generation = inner.generation;
        inner.entries.insert(
            (tag, params.to_string()),
            CacheEntry {
                value,
                generation,
                cached_at: Utc::now(),
            },
        );
        inner.stale.remove(&tag);
        true
    }

    /// Fence off every in-flight fetch. Tickets issued before this call can
    /// no longer be redeemed.
    pub fn abort_in_flight(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.generation += 1;
    }

    /// Mark the given tags stale and drop their retained entries. The next
    /// read for any of them must refetch.
    pub fn invalidate(&self, tags: &[CacheTag]) {
        let mut inner = self.inner.lock().unwrap();
        for tag in tags {
            inner.stale.insert(*tag);
        }
        inner.entries.retain(|(tag, _), _| !tags.contains(tag));
        debug!(count = tags.len(), "Invalidated cache tags");
    }

    pub fn invalidate_all(&self) {
        self.invalidate(&CacheTag::ALL);
    }

    pub fn lookup(&self, tag: CacheTag, params: &str) -> Option<CacheEntry> {
        let inner = self.inner.lock().unwrap();
        inner.entries.get(&(tag, params.to_string())).cloned()
    }

    pub fn is_fresh(&self, tag: CacheTag) -> bool {
        let inner = self.inner.lock().unwrap();
        !inner.stale.contains(&tag)
    }

    pub fn fresh_tags(&self) -> Vec<CacheTag> {
        let inner = self.inner.lock().unwrap();
        CacheTag::ALL
            .into_iter()
            .filter(|tag| !inner.stale.contains(tag))
            .collect()
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().unwrap().generation
    }

    pub fn tag_status(&self, tag: CacheTag) -> TagStatus {
        let inner = self.inner.lock().unwrap();
        let mut entries = 0;
        let mut last_fetched = None;
        for ((t, _), entry) in inner.entries.iter() {
            if *t == tag {
                entries += 1;
                if last_fetched.map_or(true, |seen| entry.cached_at > seen) {
                    last_fetched = Some(entry.cached_at);
                }
            }
        }
        TagStatus {
            fresh: !inner.stale.contains(&tag),
            entries,
            last_fetched,
        }
    }

    /// Generation stamp of every entry currently held, in no particular order.
    #[cfg(test)]
    pub(crate) fn entry_generations(&self) -> Vec<u64> {
        let inner = self.inner.lock().unwrap();
        inner.entries.values().map(|e| e.generation).collect()
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_fetch_inserts_and_marks_fresh() {
        let registry = CacheRegistry::new();
        assert!(!registry.is_fresh(CacheTag::Order));

        let ticket = registry.begin_fetch();
        assert!(registry.complete_fetch(ticket, CacheTag::Order, "", json!([1, 2])));

        assert!(registry.is_fresh(CacheTag::Order));
        let entry = registry.lookup(CacheTag::Order, "").expect("entry cached");
        assert_eq!(entry.value, json!([1, 2]));
        assert_eq!(entry.generation, registry.generation());
    }

    #[test]
    fn test_superseded_ticket_is_discarded() {
        let registry = CacheRegistry::new();
        let ticket = registry.begin_fetch();
        registry.abort_in_flight();

        assert!(!registry.complete_fetch(ticket, CacheTag::Order, "", json!([1])));
        assert!(registry.lookup(CacheTag::Order, "").is_none());
        assert!(!registry.is_fresh(CacheTag::Order));
    }

    #[test]
    fn test_invalidate_clears_only_named_tags() {
        let registry = CacheRegistry::new();
        let ticket = registry.begin_fetch();
        registry.complete_fetch(ticket, CacheTag::Order, "", json!(1));
        registry.complete_fetch(ticket, CacheTag::Profile, "", json!(2));

        registry.invalidate(&[CacheTag::Order]);

        assert!(registry.lookup(CacheTag::Order, "").is_none());
        assert!(!registry.is_fresh(CacheTag::Order));
        assert!(registry.lookup(CacheTag::Profile, "").is_some());
        assert!(registry.is_fresh(CacheTag::Profile));
    }

    #[test]
    fn test_invalidate_all_sweeps_every_tag() {
        let registry = CacheRegistry::new();
        let ticket = registry.begin_fetch();
        for tag in CacheTag::ALL {
            registry.complete_fetch(ticket, tag, "", json!(1));
        }

        registry.invalidate_all();

        for tag in CacheTag::ALL {
            assert!(registry.lookup(tag, "").is_none());
            assert!(!registry.is_fresh(tag));
        }
        assert!(registry.fresh_tags().is_empty());
    }

    #[test]
    fn test_parameterized_entries_are_independent() {
        let registry = CacheRegistry::new();
        let ticket = registry.begin_fetch();
        registry.complete_fetch(ticket, CacheTag::Comments, "order=7", json!(["a"]));
        registry.complete_fetch(ticket, CacheTag::Comments, "order=8", json!(["b"]));

        assert_eq!(
            registry.lookup(CacheTag::Comments, "order=7").unwrap().value,
            json!(["a"])
        );
        assert_eq!(
            registry.lookup(CacheTag::Comments, "order=8").unwrap().value,
            json!(["b"])
        );
        assert_eq!(registry.tag_status(CacheTag::Comments).entries, 2);
    }

    #[test]
    fn test_generation_counts_sweeps() {
        let registry = CacheRegistry::new();
        assert_eq!(registry.generation(), 0);
        registry.abort_in_flight();
        registry.abort_in_flight();
        assert_eq!(registry.generation(), 2);
    }

    #[test]
    fn test_ticket_survives_plain_invalidation() {
        // Targeted invalidation drops data but does not fence tickets;
        // only abort_in_flight does.
        let registry = CacheRegistry::new();
        let ticket = registry.begin_fetch();
        registry.invalidate(&[CacheTag::Order]);
        assert!(registry.complete_fetch(ticket, CacheTag::Order, "", json!(1)));
    }
}
