//! Networking contracts for the prefetch layer: URL handling, network
//! isolation, request descriptors, and the prefetch cache.

pub mod arena;
pub mod isolation;
pub mod prefetch_cache;
pub mod prefetch_client;
pub mod prefetch_config;
pub mod request;
pub mod timer;
pub mod url;

pub use isolation::IsolationInfo;
pub use isolation::NetworkIsolationKey;
pub use isolation::RequestType;
pub use isolation::SchemefulSite;
pub use prefetch_cache::CacheKey;
pub use prefetch_cache::CacheKeyView;
pub use prefetch_cache::PrefetchCache;
pub use prefetch_cache::PrefetchCacheStats;
pub use prefetch_client::PrefetchHandle;
pub use prefetch_client::PrefetchLoadState;
pub use prefetch_client::PrefetchUrlLoaderClient;
pub use prefetch_config::PrefetchCacheConfig;
pub use request::HttpMethod;
pub use request::ResourceRequest;
pub use request::TrustedParams;
pub use timer::TimerToken;
pub use url::Scheme;
