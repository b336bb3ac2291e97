//! Network isolation: schemeful sites and the keys that partition shared state.

use pd_core::BrowserError;
use pd_core::BrowserResult;
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use url::Url;

static NEXT_OPAQUE_SITE: AtomicU64 = AtomicU64::new(1);

/// Site used to partition network state.
///
/// Tuple sites compare by scheme and lower-cased host; the port is ignored.
/// Every opaque site is distinct from every other site, including other opaque
/// sites built from the same URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemefulSite {
    Tuple { scheme: String, host: String },
    Opaque(u64),
}

impl SchemefulSite {
    pub fn from_url(url: &Url) -> Self {
        let tuple_scheme = matches!(url.scheme(), "http" | "https" | "ws" | "wss");
        match url.host_str() {
            Some(host) if tuple_scheme && !host.is_empty() => Self::Tuple {
                scheme: url.scheme().to_owned(),
                host: host.trim_end_matches('.').to_ascii_lowercase(),
            },
            _ => Self::opaque(),
        }
    }

    pub fn opaque() -> Self {
        Self::Opaque(NEXT_OPAQUE_SITE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::Opaque(_))
    }
}

impl fmt::Display for SchemefulSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tuple { scheme, host } => write!(f, "{scheme}://{host}"),
            Self::Opaque(id) => write!(f, "opaque#{id}"),
        }
    }
}

/// Partition key attached to every cacheable network request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkIsolationKey {
    top_frame_site: Option<SchemefulSite>,
    frame_site: Option<SchemefulSite>,
    nonce: Option<u128>,
}

impl NetworkIsolationKey {
    pub fn new(top_frame_site: SchemefulSite, frame_site: SchemefulSite) -> Self {
        Self {
            top_frame_site: Some(top_frame_site),
            frame_site: Some(frame_site),
            nonce: None,
        }
    }

    /// Key with no sites; never matches anything worth caching.
    pub fn empty() -> Self {
        Self {
            top_frame_site: None,
            frame_site: None,
            nonce: None,
        }
    }

    pub fn with_nonce(mut self, nonce: u128) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn top_frame_site(&self) -> Option<&SchemefulSite> {
        self.top_frame_site.as_ref()
    }

    pub fn frame_site(&self) -> Option<&SchemefulSite> {
        self.frame_site.as_ref()
    }

    pub fn nonce(&self) -> Option<u128> {
        self.nonce
    }

    pub fn is_fully_populated(&self) -> bool {
        self.top_frame_site.is_some() && self.frame_site.is_some()
    }

    /// True when no future request can present an equal key.
    pub fn is_transient(&self) -> bool {
        if !self.is_fully_populated() || self.nonce.is_some() {
            return true;
        }

        self.top_frame_site
            .iter()
            .chain(self.frame_site.iter())
            .any(SchemefulSite::is_opaque)
    }
}

impl fmt::Display for NetworkIsolationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.top_frame_site, &self.frame_site) {
            (Some(top), Some(frame)) => write!(f, "{top} {frame}")?,
            _ => write!(f, "null")?,
        }
        if self.nonce.is_some() {
            write!(f, " (with nonce)")?;
        }
        Ok(())
    }
}

/// Kind of request an `IsolationInfo` was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    MainFrame,
    SubFrame,
    Other,
}

/// Frame context a request is issued from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolationInfo {
    request_type: RequestType,
    top_frame_site: Option<SchemefulSite>,
    frame_site: Option<SchemefulSite>,
    nonce: Option<u128>,
}

impl IsolationInfo {
    pub fn create(
        request_type: RequestType,
        top_frame_origin: &Url,
        frame_origin: &Url,
    ) -> BrowserResult<Self> {
        let top_frame_site = SchemefulSite::from_url(top_frame_origin);
        let frame_site = SchemefulSite::from_url(frame_origin);

        if request_type == RequestType::MainFrame && top_frame_site != frame_site {
            return Err(BrowserError::new(
                "net.isolation.main_frame_mismatch",
                format!(
                    "main frame request must share its top frame site (`{top_frame_site}` vs `{frame_site}`)"
                ),
            ));
        }

        Ok(Self {
            request_type,
            top_frame_site: Some(top_frame_site),
            frame_site: Some(frame_site),
            nonce: None,
        })
    }

    /// One-off context backed by a fresh opaque site.
    pub fn create_transient() -> Self {
        let site = SchemefulSite::opaque();
        Self {
            request_type: RequestType::Other,
            top_frame_site: Some(site.clone()),
            frame_site: Some(site),
            nonce: None,
        }
    }

    pub fn create_empty() -> Self {
        Self {
            request_type: RequestType::Other,
            top_frame_site: None,
            frame_site: None,
            nonce: None,
        }
    }

    pub fn with_nonce(mut self, nonce: u128) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn request_type(&self) -> RequestType {
        self.request_type
    }

    pub fn is_empty(&self) -> bool {
        self.top_frame_site.is_none()
    }

    pub fn network_isolation_key(&self) -> NetworkIsolationKey {
        NetworkIsolationKey {
            top_frame_site: self.top_frame_site.clone(),
            frame_site: self.frame_site.clone(),
            nonce: self.nonce,
        }
    }
}
