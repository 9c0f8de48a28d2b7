//! Rendered-output caching.
//!
//! The [`ActionCache`] stores fully rendered (post-layout) action output.
//! The base key is `mount + "/" + method` - positional arguments are NOT
//! part of the key. Two requests for `/widgets/show/7` and `/widgets/show/8`
//! share one slot unless the action configures a key function, which nests
//! entries under a per-request secondary key:
//!
//! ```text
//! "/widgets/show"            → entry                      (no key function)
//! "/widgets/name"            → { "ada" → entry,
//!                                "grace" → entry }        (key function)
//! ```
//!
//! Entries expire after their TTL and are removed lazily on the next read.
//! There is no other eviction: entries persist until TTL expiry or explicit
//! invalidation, an accepted trade of memory bounding for simplicity.
//!
//! Time is read through the [`Clock`] trait so tests can drive TTL expiry
//! with a [`ManualClock`] instead of sleeping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::CacheOptions;
use crate::request::Request;
use crate::resolve::Action;

/// A source of monotonic time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The real clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock advanced by hand. For tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    content: String,
    created_at: Instant,
    ttl: Option<Duration>,
}

impl CacheEntry {
    fn is_valid(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.duration_since(self.created_at) < ttl,
            None => true,
        }
    }
}

enum Slot {
    Single(CacheEntry),
    Keyed(HashMap<String, CacheEntry>),
}

/// Keyed store of rendered action output.
///
/// Concurrent reads and writes to different base keys never contend;
/// concurrent stores to the same key are last-write-wins.
pub struct ActionCache {
    entries: DashMap<String, Slot>,
    clock: Arc<dyn Clock>,
}

impl ActionCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// The base cache key for an action: mount + method, no arguments.
    pub fn base_key(action: &Action) -> String {
        if action.mount() == "/" {
            format!("/{}", action.method())
        } else {
            format!("{}/{}", action.mount(), action.method())
        }
    }

    /// Returns cached content for the action if present and valid. Expired
    /// entries are removed on the way out.
    pub fn lookup(
        &self,
        action: &Action,
        request: &Request,
        options: &CacheOptions,
    ) -> Option<String> {
        let base = Self::base_key(action);
        let now = self.clock.now();

        match options.key_for(request) {
            None => {
                let mut drop_slot = false;
                let content = {
                    let slot = self.entries.get(&base)?;
                    match &*slot {
                        Slot::Single(entry) if entry.is_valid(now) => {
                            Some(entry.content.clone())
                        }
                        Slot::Single(_) => {
                            drop_slot = true;
                            None
                        }
                        // A leftover keyed slot from an earlier configuration
                        // shape: not a hit for keyless lookup.
                        Slot::Keyed(_) => None,
                    }
                };
                if drop_slot {
                    self.entries.remove(&base);
                }
                content
            }
            Some(secondary) => {
                let mut slot = self.entries.get_mut(&base)?;
                match &mut *slot {
                    Slot::Keyed(map) => match map.get(&secondary) {
                        Some(entry) if entry.is_valid(now) => Some(entry.content.clone()),
                        Some(_) => {
                            map.remove(&secondary);
                            None
                        }
                        None => None,
                    },
                    Slot::Single(_) => None,
                }
            }
        }
    }

    /// Stores rendered content for the action, overwriting any previous
    /// entry under the same key.
    pub fn store(
        &self,
        action: &Action,
        request: &Request,
        options: &CacheOptions,
        content: &str,
    ) {
        let base = Self::base_key(action);
        let entry = CacheEntry {
            content: content.to_string(),
            created_at: self.clock.now(),
            ttl: options.ttl_value(),
        };

        match options.key_for(request) {
            None => {
                self.entries.insert(base, Slot::Single(entry));
            }
            Some(secondary) => {
                let mut slot = self
                    .entries
                    .entry(base)
                    .or_insert_with(|| Slot::Keyed(HashMap::new()));
                match &mut *slot {
                    Slot::Keyed(map) => {
                        map.insert(secondary, entry);
                    }
                    single @ Slot::Single(_) => {
                        // Configuration gained a key function: replace the
                        // flat slot wholesale.
                        let mut map = HashMap::new();
                        map.insert(secondary, entry);
                        *single = Slot::Keyed(map);
                    }
                }
            }
        }
    }

    /// Removes one base key (and all nested entries under it).
    pub fn delete(&self, base_key: &str) -> bool {
        self.entries.remove(base_key).is_some()
    }

    /// Removes one nested entry under a base key, leaving siblings intact.
    pub fn delete_keyed(&self, base_key: &str, secondary: &str) -> bool {
        match self.entries.get_mut(base_key) {
            Some(mut slot) => match &mut *slot {
                Slot::Keyed(map) => map.remove(secondary).is_some(),
                Slot::Single(_) => false,
            },
            None => false,
        }
    }

    /// Removes every base key starting with `pattern`; returns how many
    /// were dropped.
    pub fn invalidate(&self, pattern: &str) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, _| {
            if key.starts_with(pattern) {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    /// Drops everything.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of live base keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ActionCache {
    fn default() -> Self {
        Self::new()
    }
}

/// A plain keyed cache for handler-side values: heavy computations,
/// expensive queries. Same entry semantics as the action cache, without the
/// two-tier keying.
pub struct ValueCache {
    entries: DashMap<String, CacheEntry>,
    clock: Arc<dyn Clock>,
}

impl ValueCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let mut expired = false;
        let content = self.entries.get(key).and_then(|entry| {
            if entry.is_valid(now) {
                Some(entry.content.clone())
            } else {
                expired = true;
                None
            }
        });
        if expired {
            self.entries.remove(key);
        }
        content
    }

    pub fn put(&self, key: impl Into<String>, value: impl Into<String>, ttl: Option<Duration>) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                content: value.into(),
                created_at: self.clock.now(),
                ttl,
            },
        );
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for ValueCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigStore;
    use crate::handler::{Arity, HandlerType};
    use crate::registry::Registry;
    use crate::resolve::Resolver;
    use pergola_inform::Informer;

    fn resolved(path: &str) -> Action {
        let registry = Arc::new(Registry::new(Arc::new(Informer::silent())));
        let config = ConfigStore::new();
        registry.register(
            &config,
            HandlerType::builder("WidgetsController")
                .action("index", Arity::exactly(0), |_| Ok("index".into()))
                .action("show", Arity::at_least(0), |_| Ok("show".into()))
                .action("name", Arity::exactly(0), |_| Ok("name".into()))
                .build(),
        );
        registry.register(
            &config,
            HandlerType::builder("MainController")
                .action("index", Arity::exactly(0), |_| Ok("home".into()))
                .build(),
        );
        Resolver::new(registry).resolve(path).unwrap()
    }

    fn manual_cache() -> (ActionCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (ActionCache::with_clock(clock.clone()), clock)
    }

    #[test]
    fn test_base_key_ignores_args() {
        assert_eq!(
            ActionCache::base_key(&resolved("/widgets/show/7")),
            "/widgets/show"
        );
        assert_eq!(
            ActionCache::base_key(&resolved("/widgets/show/8")),
            "/widgets/show"
        );
    }

    #[test]
    fn test_base_key_at_root_mount() {
        assert_eq!(ActionCache::base_key(&resolved("/")), "/index");
    }

    #[test]
    fn test_round_trip_without_ttl() {
        let cache = ActionCache::new();
        let action = resolved("/widgets/index");
        let req = Request::new();
        let opts = CacheOptions::new();

        assert_eq!(cache.lookup(&action, &req, &opts), None);
        cache.store(&action, &req, &opts, "rendered");
        assert_eq!(
            cache.lookup(&action, &req, &opts),
            Some("rendered".to_string())
        );
    }

    #[test]
    fn test_ttl_expiry_removes_lazily() {
        let (cache, clock) = manual_cache();
        let action = resolved("/widgets/index");
        let req = Request::new();
        let opts = CacheOptions::new().ttl(Duration::from_secs(60));

        cache.store(&action, &req, &opts, "rendered");
        clock.advance(Duration::from_secs(59));
        assert!(cache.lookup(&action, &req, &opts).is_some());

        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.lookup(&action, &req, &opts), None);
        // The expired entry was removed, not just skipped.
        assert!(cache.is_empty());
    }

    #[test]
    fn test_store_overwrites_and_resets_ttl() {
        let (cache, clock) = manual_cache();
        let action = resolved("/widgets/index");
        let req = Request::new();
        let opts = CacheOptions::new().ttl(Duration::from_secs(60));

        cache.store(&action, &req, &opts, "old");
        clock.advance(Duration::from_secs(50));
        cache.store(&action, &req, &opts, "new");
        clock.advance(Duration::from_secs(50));

        assert_eq!(cache.lookup(&action, &req, &opts), Some("new".to_string()));
    }

    #[test]
    fn test_key_fn_nests_independent_entries() {
        let cache = ActionCache::new();
        let action = resolved("/widgets/name");
        let opts = CacheOptions::new()
            .key(|req: &Request| req.param("name").unwrap_or_default().to_string());

        let ada = Request::new().with_param("name", "ada");
        let grace = Request::new().with_param("name", "grace");

        cache.store(&action, &ada, &opts, "hi ada");
        cache.store(&action, &grace, &opts, "hi grace");

        assert_eq!(cache.lookup(&action, &ada, &opts), Some("hi ada".into()));
        assert_eq!(
            cache.lookup(&action, &grace, &opts),
            Some("hi grace".into())
        );

        // Deleting one nested entry leaves the sibling alone.
        assert!(cache.delete_keyed("/widgets/name", "ada"));
        assert_eq!(cache.lookup(&action, &ada, &opts), None);
        assert_eq!(
            cache.lookup(&action, &grace, &opts),
            Some("hi grace".into())
        );
    }

    #[test]
    fn test_delete_removes_whole_slot() {
        let cache = ActionCache::new();
        let action = resolved("/widgets/index");
        let req = Request::new();
        let opts = CacheOptions::new();

        cache.store(&action, &req, &opts, "rendered");
        assert!(cache.delete("/widgets/index"));
        assert!(!cache.delete("/widgets/index"));
        assert_eq!(cache.lookup(&action, &req, &opts), None);
    }

    #[test]
    fn test_invalidate_by_prefix() {
        let cache = ActionCache::new();
        let req = Request::new();
        let opts = CacheOptions::new();
        cache.store(&resolved("/widgets/index"), &req, &opts, "a");
        cache.store(&resolved("/widgets/show/1"), &req, &opts, "b");
        cache.store(&resolved("/"), &req, &opts, "c");

        assert_eq!(cache.invalidate("/widgets"), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.lookup(&resolved("/"), &req, &opts).is_some());
    }

    #[test]
    fn test_clear_forgets_everything() {
        let cache = ActionCache::new();
        let req = Request::new();
        let opts = CacheOptions::new();
        cache.store(&resolved("/widgets/index"), &req, &opts, "a");
        cache.store(&resolved("/widgets/show/1"), &req, &opts, "b");

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.lookup(&resolved("/widgets/index"), &req, &opts), None);
        assert_eq!(cache.lookup(&resolved("/widgets/show/1"), &req, &opts), None);
    }

    #[test]
    fn test_concurrent_stores_same_key_last_write_wins() {
        use std::thread;

        let cache = Arc::new(ActionCache::new());
        let action = resolved("/widgets/index");
        let opts = CacheOptions::new();

        let mut handles = Vec::new();
        for i in 0..8 {
            let cache = cache.clone();
            let action = action.clone();
            let opts = opts.clone();
            handles.push(thread::spawn(move || {
                cache.store(&action, &Request::new(), &opts, &format!("v{}", i));
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        // Some write won; the slot is coherent.
        let content = cache
            .lookup(&action, &Request::new(), &opts)
            .expect("an entry survives");
        assert!(content.starts_with('v'));
    }

    #[test]
    fn test_value_cache_ttl() {
        let clock = Arc::new(ManualClock::new());
        let values = ValueCache::with_clock(clock.clone());

        values.put("answer", "42", Some(Duration::from_secs(10)));
        values.put("pinned", "keep", None);
        assert_eq!(values.get("answer"), Some("42".to_string()));

        clock.advance(Duration::from_secs(11));
        assert_eq!(values.get("answer"), None);
        assert_eq!(values.get("pinned"), Some("keep".to_string()));

        assert!(values.delete("pinned"));
        assert_eq!(values.get("pinned"), None);
    }
}
