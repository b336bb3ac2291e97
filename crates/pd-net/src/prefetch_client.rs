//! A single prefetch held by the cache: its request, deadline and load progress.

use crate::arena::SlotId;
use crate::isolation::NetworkIsolationKey;
use crate::prefetch_cache::CacheKey;
use crate::request::ResourceRequest;
use pd_core::BrowserResult;
use std::time::Instant;
use url::Url;

/// Borrowed reference to a live cache entry.
///
/// Handles are generation-checked: once the entry is consumed, erased or
/// evicted, the handle stops resolving even if its slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrefetchHandle(pub(crate) SlotId);

/// Progress of the underlying load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefetchLoadState {
    Pending,
    ResponseStarted { status: u16 },
    Completed { status: u16 },
    Failed { code: &'static str },
}

#[derive(Debug)]
pub struct PrefetchUrlLoaderClient {
    key: CacheKey,
    request: ResourceRequest,
    expiry_time: Instant,
    state: PrefetchLoadState,
    body: Vec<u8>,
    pub(crate) prev: Option<PrefetchHandle>,
    pub(crate) next: Option<PrefetchHandle>,
}

impl PrefetchUrlLoaderClient {
    pub(crate) fn new(key: CacheKey, request: ResourceRequest, expiry_time: Instant) -> Self {
        Self {
            key,
            request,
            expiry_time,
            state: PrefetchLoadState::Pending,
            body: Vec::new(),
            prev: None,
            next: None,
        }
    }

    pub fn network_isolation_key(&self) -> &NetworkIsolationKey {
        &self.key.isolation_key
    }

    pub fn url(&self) -> &Url {
        &self.key.url
    }

    pub fn expiry_time(&self) -> Instant {
        self.expiry_time
    }

    pub fn request(&self) -> &ResourceRequest {
        &self.request
    }

    pub(crate) fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn load_state(&self) -> &PrefetchLoadState {
        &self.state
    }

    pub fn is_complete(&self) -> bool {
        matches!(
            self.state,
            PrefetchLoadState::Completed { .. } | PrefetchLoadState::Failed { .. }
        )
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn take_body(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.body)
    }

    pub fn on_receive_response(&mut self, status: u16) {
        if self.state != PrefetchLoadState::Pending {
            log::warn!(
                "ignoring response head for {} in state {:?}",
                self.key.url,
                self.state
            );
            return;
        }
        self.state = PrefetchLoadState::ResponseStarted { status };
    }

    pub fn on_receive_data(&mut self, chunk: &[u8]) {
        match self.state {
            PrefetchLoadState::ResponseStarted { .. } => self.body.extend_from_slice(chunk),
            _ => log::warn!(
                "ignoring {} body bytes for {} in state {:?}",
                chunk.len(),
                self.key.url,
                self.state
            ),
        }
    }

    pub fn on_complete(&mut self, result: BrowserResult<()>) {
        if self.is_complete() {
            log::warn!("duplicate completion for {}", self.key.url);
            return;
        }

        let next = match result {
            Ok(()) => match self.state {
                PrefetchLoadState::ResponseStarted { status } => {
                    PrefetchLoadState::Completed { status }
                }
                _ => PrefetchLoadState::Failed {
                    code: "net.prefetch.no_response",
                },
            },
            Err(error) => {
                log::debug!("prefetch of {} failed: {error}", self.key.url);
                self.body.clear();
                PrefetchLoadState::Failed { code: error.code }
            }
        };
        self.state = next;
    }
}
