//! Bounded, expiring cache of in-flight and completed prefetches.
//!
//! Entries are owned by a slot arena and indexed twice: a hash map from
//! `(isolation key, URL)` to handle, and a doubly linked list threaded through
//! the entries in insertion order. Every entry gets the same lifetime, so the
//! list head is both the oldest entry and the next one to expire; capacity
//! eviction and timed expiry both pop from the head.
//!
//! ```text
//!   map: CacheKey ──► handle ─┐
//!                             ▼
//!   head ─► [A] ◄──► [B] ◄──► [C] ◄── tail      (client_storage owns A, B, C)
//!            │
//!            └── expiry timer armed for A.expiry_time
//! ```
//!
//! Single-sequence: every method, including the timer fire, must run on the
//! sequence that owns the cache.

use crate::arena::SlotArena;
use crate::isolation::NetworkIsolationKey;
use crate::prefetch_client::PrefetchHandle;
use crate::prefetch_client::PrefetchUrlLoaderClient;
use crate::prefetch_config::PrefetchCacheConfig;
use crate::request::ResourceRequest;
use crate::timer::OneShotTimer;
use crate::timer::TimerToken;
use crate::url::Scheme;
use pd_core::BrowserError;
use pd_core::BrowserResult;
use pd_core::Clock;
use pd_core::SystemClock;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::hash::Hasher;
use std::time::Instant;
use url::Url;

/// At most one live entry exists per key.
#[derive(Debug, Clone)]
pub struct CacheKey {
    pub isolation_key: NetworkIsolationKey,
    pub url: Url,
}

/// Borrowed view of a [`CacheKey`], so lookups can query the map with
/// `(&NetworkIsolationKey, &Url)` instead of building an owned key.
pub trait CacheKeyView {
    fn isolation_key(&self) -> &NetworkIsolationKey;
    fn url(&self) -> &Url;
}

impl CacheKeyView for CacheKey {
    fn isolation_key(&self) -> &NetworkIsolationKey {
        &self.isolation_key
    }

    fn url(&self) -> &Url {
        &self.url
    }
}

impl CacheKeyView for (&NetworkIsolationKey, &Url) {
    fn isolation_key(&self) -> &NetworkIsolationKey {
        self.0
    }

    fn url(&self) -> &Url {
        self.1
    }
}

impl<'a> Borrow<dyn CacheKeyView + 'a> for CacheKey {
    fn borrow(&self) -> &(dyn CacheKeyView + 'a) {
        self
    }
}

// Owned and borrowed keys must hash identically; both go through the view.
impl Hash for dyn CacheKeyView + '_ {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.isolation_key().hash(state);
        self.url().hash(state);
    }
}

impl PartialEq for dyn CacheKeyView + '_ {
    fn eq(&self, other: &Self) -> bool {
        self.isolation_key() == other.isolation_key() && self.url() == other.url()
    }
}

impl Eq for dyn CacheKeyView + '_ {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self as &dyn CacheKeyView).hash(state);
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        (self as &dyn CacheKeyView) == (other as &dyn CacheKeyView)
    }
}

impl Eq for CacheKey {}

/// Point-in-time cache telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchCacheStats {
    pub live_entries: usize,
    pub max_size: usize,
    pub next_expiry: Option<Instant>,
}

#[derive(Debug, Default)]
struct LoaderList {
    head: Option<PrefetchHandle>,
    tail: Option<PrefetchHandle>,
    len: usize,
}

impl LoaderList {
    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn append(&mut self, storage: &mut SlotArena<PrefetchUrlLoaderClient>, handle: PrefetchHandle) {
        let old_tail = self.tail;
        match storage.get_mut(handle.0) {
            Some(client) => {
                client.prev = old_tail;
                client.next = None;
            }
            None => panic!("appending a prefetch entry that is not in storage"),
        }

        match old_tail.and_then(|tail| storage.get_mut(tail.0)) {
            Some(tail_client) => tail_client.next = Some(handle),
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);
        self.len += 1;
    }

    fn unlink(&mut self, storage: &mut SlotArena<PrefetchUrlLoaderClient>, handle: PrefetchHandle) {
        let (prev, next) = match storage.get_mut(handle.0) {
            Some(client) => (client.prev.take(), client.next.take()),
            None => panic!("unlinking a prefetch entry that is not in storage"),
        };

        match prev.and_then(|prev| storage.get_mut(prev.0)) {
            Some(prev_client) => prev_client.next = next,
            None => {
                assert_eq!(self.head, Some(handle), "unlinked entry was not in the list");
                self.head = next;
            }
        }

        match next.and_then(|next| storage.get_mut(next.0)) {
            Some(next_client) => next_client.prev = prev,
            None => {
                assert_eq!(self.tail, Some(handle), "unlinked entry was not in the list");
                self.tail = prev;
            }
        }

        self.len -= 1;
    }
}

#[derive(Debug)]
pub struct PrefetchCache<C: Clock = SystemClock> {
    config: PrefetchCacheConfig,
    clock: C,
    client_storage: SlotArena<PrefetchUrlLoaderClient>,
    map: HashMap<CacheKey, PrefetchHandle>,
    list: LoaderList,
    timer: OneShotTimer,
}

impl PrefetchCache {
    /// Cache sized from the process environment, on the system clock.
    pub fn from_env() -> BrowserResult<Self> {
        Self::new(PrefetchCacheConfig::from_env()?, SystemClock)
    }
}

impl<C: Clock> PrefetchCache<C> {
    pub fn new(config: PrefetchCacheConfig, clock: C) -> BrowserResult<Self> {
        config.validate()?;
        Ok(Self {
            client_storage: SlotArena::with_capacity(config.max_size),
            map: HashMap::with_capacity(config.max_size),
            list: LoaderList::default(),
            timer: OneShotTimer::new(),
            config,
            clock,
        })
    }

    pub fn config(&self) -> &PrefetchCacheConfig {
        &self.config
    }

    pub fn max_size(&self) -> usize {
        self.config.max_size
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Inserts a prefetch for `request`, or returns `None` if it is not cacheable.
    ///
    /// Rejections are logged and leave the cache untouched; the caller falls
    /// back to an uncached load.
    pub fn emplace(&mut self, request: &ResourceRequest) -> Option<PrefetchHandle> {
        match self.try_emplace(request) {
            Ok(handle) => Some(handle),
            Err(error) => {
                log::warn!("not caching prefetch of {}: {error}", request.url);
                None
            }
        }
    }

    /// Like `emplace`, but reports why a request was rejected.
    pub fn try_emplace(&mut self, request: &ResourceRequest) -> BrowserResult<PrefetchHandle> {
        let trusted_params = request.trusted_params.as_ref().ok_or_else(|| {
            BrowserError::new(
                "net.prefetch.trusted_params_missing",
                "prefetch request carries no trusted isolation parameters",
            )
        })?;

        let isolation_key = trusted_params.isolation_info.network_isolation_key();
        if isolation_key.is_transient() {
            return Err(BrowserError::new(
                "net.prefetch.transient_isolation_key",
                format!("isolation key `{isolation_key}` is transient"),
            ));
        }

        if Scheme::from_url(&request.url).is_none() {
            return Err(BrowserError::new(
                "net.prefetch.scheme_unsupported",
                format!("unsupported scheme `{}`", request.url.scheme()),
            ));
        }

        let key = CacheKey {
            isolation_key,
            url: request.url.clone(),
        };
        if self.map.contains_key(&key) {
            return Err(BrowserError::new(
                "net.prefetch.duplicate",
                "a prefetch for this isolation key and URL is already cached",
            ));
        }

        while self.map.len() >= self.config.max_size {
            self.erase_oldest();
        }

        let now = self.clock.now();
        let expiry_time = now + self.config.max_age;
        let client = PrefetchUrlLoaderClient::new(key.clone(), request.clone(), expiry_time);
        let handle = PrefetchHandle(self.client_storage.insert(client));
        self.list.append(&mut self.client_storage, handle);
        self.map.insert(key, handle);

        if !self.timer.is_running() {
            self.start_timer(now);
        }

        self.check_invariants();
        log::debug!(
            "cached prefetch of {} {} ({} of {})",
            request.method.as_str(),
            request.url,
            self.map.len(),
            self.config.max_size
        );
        Ok(handle)
    }

    pub fn lookup(&self, isolation_key: &NetworkIsolationKey, url: &Url) -> Option<PrefetchHandle> {
        let view = (isolation_key, url);
        self.map.get(&view as &dyn CacheKeyView).copied()
    }

    pub fn get(&self, handle: PrefetchHandle) -> Option<&PrefetchUrlLoaderClient> {
        self.client_storage.get(handle.0)
    }

    pub fn get_mut(&mut self, handle: PrefetchHandle) -> Option<&mut PrefetchUrlLoaderClient> {
        self.client_storage.get_mut(handle.0)
    }

    pub fn contains(&self, handle: PrefetchHandle) -> bool {
        self.client_storage.contains(handle.0)
    }

    /// Removes a live entry and hands it to the caller; dropping it destroys it.
    ///
    /// Returns `None` for a handle that no longer names a live entry.
    pub fn consume(&mut self, handle: PrefetchHandle) -> Option<PrefetchUrlLoaderClient> {
        if !self.client_storage.contains(handle.0) {
            log::warn!("consume called with a stale prefetch handle");
            return None;
        }

        let was_head = self.list.head == Some(handle);
        self.unindex(handle);
        let client = self.client_storage.remove(handle.0);

        if was_head {
            if self.list.is_empty() {
                self.timer.stop();
            } else {
                let now = self.clock.now();
                self.start_timer(now);
            }
        }

        self.check_invariants();
        if let Some(client) = &client {
            log::debug!("consumed prefetch of {}", client.url());
        }
        client
    }

    /// Destroys a live entry without touching the expiry timer.
    ///
    /// A timer left armed for an erased head fires early and re-arms for the
    /// new head. Returns `false` for a stale handle.
    pub fn erase(&mut self, handle: PrefetchHandle) -> bool {
        if !self.client_storage.contains(handle.0) {
            log::warn!("erase called with a stale prefetch handle");
            return false;
        }

        self.unindex(handle);
        let erased = self.client_storage.remove(handle.0);
        self.check_invariants();
        if let Some(client) = &erased {
            log::debug!("erased prefetch of {}", client.url());
        }
        erased.is_some()
    }

    /// Expires every entry due within the slack window, then re-arms the timer
    /// for the new head, measured from the same `now`.
    pub fn on_timer(&mut self) {
        let now = self.clock.now();
        let horizon = now + self.config.expiry_slack;

        while let Some(head) = self.list.head {
            let expiry_time = match self.client_storage.get(head.0) {
                Some(client) => client.expiry_time(),
                None => panic!("prefetch list head is missing from storage"),
            };
            if expiry_time > horizon {
                break;
            }
            self.erase_oldest();
        }

        if self.list.is_empty() {
            self.timer.stop();
        } else {
            self.start_timer(now);
        }
        self.check_invariants();
    }

    /// Pending timer fire for a host sequence to schedule.
    pub fn scheduled_timer(&self) -> Option<(Instant, TimerToken)> {
        self.timer.deadline().zip(self.timer.token())
    }

    /// Runs the expiry sweep if `token` is still the armed timer.
    ///
    /// Tokens superseded by a restart or stop are ignored.
    pub fn fire_timer(&mut self, token: TimerToken) -> bool {
        if !self.timer.take_if_current(token) {
            return false;
        }
        self.on_timer();
        true
    }

    /// Runs the expiry sweep if the armed deadline has passed on this cache's clock.
    pub fn run_timer_if_due(&mut self) -> bool {
        let now = self.clock.now();
        if !self.timer.take_if_due(now) {
            return false;
        }
        self.on_timer();
        true
    }

    pub fn timer_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    pub fn stats(&self) -> PrefetchCacheStats {
        PrefetchCacheStats {
            live_entries: self.map.len(),
            max_size: self.config.max_size,
            next_expiry: self
                .list
                .head
                .and_then(|head| self.client_storage.get(head.0))
                .map(PrefetchUrlLoaderClient::expiry_time),
        }
    }

    /// Live handles, oldest first.
    pub fn iter_handles(&self) -> impl Iterator<Item = PrefetchHandle> + '_ {
        std::iter::successors(self.list.head, |handle| {
            self.client_storage
                .get(handle.0)
                .and_then(|client| client.next)
        })
    }

    fn erase_oldest(&mut self) {
        let oldest = match self.list.head {
            Some(handle) => handle,
            None => panic!("erase_oldest called on an empty prefetch cache"),
        };

        self.unindex(oldest);
        assert_ne!(
            self.list.head,
            Some(oldest),
            "prefetch list head did not advance after removal"
        );

        if let Some(client) = self.client_storage.remove(oldest.0) {
            log::debug!("evicted prefetch of {}", client.url());
        }
    }

    /// Drops `handle` from the map and the list; storage still owns the entry.
    fn unindex(&mut self, handle: PrefetchHandle) {
        let removed = match self.client_storage.get(handle.0) {
            Some(client) => self.map.remove(client.key()),
            None => panic!("unindexing a prefetch entry that is not in storage"),
        };
        assert_eq!(removed, Some(handle), "prefetch map out of sync with storage");

        self.list.unlink(&mut self.client_storage, handle);
        assert_eq!(self.map.len(), self.list.len, "prefetch map and list diverged");
    }

    fn start_timer(&mut self, now: Instant) {
        let expiry_time = match self.list.head.and_then(|head| self.client_storage.get(head.0)) {
            Some(client) => client.expiry_time(),
            None => panic!("start_timer called on an empty prefetch cache"),
        };
        let delay = expiry_time.saturating_duration_since(now);
        log::trace!("prefetch expiry timer armed for {delay:?}");
        self.timer.start(now, delay);
    }

    fn check_invariants(&self) {
        assert_eq!(self.map.len(), self.list.len, "prefetch map and list diverged");
        assert_eq!(
            self.map.len(),
            self.client_storage.len(),
            "prefetch map and storage diverged"
        );
        assert!(self.map.len() <= self.config.max_size);

        #[cfg(debug_assertions)]
        self.debug_validate_list();
    }

    #[cfg(debug_assertions)]
    fn debug_validate_list(&self) {
        let mut count = 0_usize;
        let mut prev: Option<PrefetchHandle> = None;
        let mut current = self.list.head;
        let mut last_expiry: Option<Instant> = None;

        while let Some(handle) = current {
            let client = match self.client_storage.get(handle.0) {
                Some(client) => client,
                None => panic!("prefetch list links to a freed entry"),
            };
            assert_eq!(client.prev, prev);
            assert_eq!(self.map.get(client.key()), Some(&handle));
            if let Some(last) = last_expiry {
                assert!(last <= client.expiry_time());
            }

            last_expiry = Some(client.expiry_time());
            prev = Some(handle);
            current = client.next;
            count += 1;
            assert!(count <= self.list.len);
        }

        assert_eq!(self.list.tail, prev);
        assert_eq!(count, self.list.len);
    }
}
