//! Request descriptors handed to the network service for prefetching.

use crate::isolation::IsolationInfo;
use crate::isolation::NetworkIsolationKey;
use pd_core::BrowserError;
use pd_core::BrowserResult;
use url::Url;

/// Safe methods a prefetch may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
        }
    }
}

/// Request header with a token name and a value free of CR, LF and NUL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: &str, value: &str) -> BrowserResult<Self> {
        if name.is_empty() || !name.bytes().all(is_token_char) {
            return Err(BrowserError::new(
                "net.request.header_name_invalid",
                format!("invalid HTTP header name `{name}`"),
            ));
        }

        if value.bytes().any(|byte| matches!(byte, b'\r' | b'\n' | 0)) {
            return Err(BrowserError::new(
                "net.request.header_value_invalid",
                format!("invalid characters found in HTTP header `{name}`"),
            ));
        }

        Ok(Self {
            name: name.to_owned(),
            value: value.to_owned(),
        })
    }
}

/// Parameters only a trusted (browser-side) caller may attach to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedParams {
    pub isolation_info: IsolationInfo,
}

impl TrustedParams {
    pub fn new(isolation_info: IsolationInfo) -> Self {
        Self { isolation_info }
    }
}

/// Network request as seen by the prefetch layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<Header>,
    pub trusted_params: Option<TrustedParams>,
}

impl ResourceRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: HttpMethod::Get,
            url,
            headers: Vec::new(),
            trusted_params: None,
        }
    }

    pub fn with_trusted_params(mut self, trusted_params: TrustedParams) -> Self {
        self.trusted_params = Some(trusted_params);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> BrowserResult<Self> {
        self.headers.push(Header::new(name, value)?);
        Ok(self)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }

    /// Isolation key from the trusted params, if the caller supplied any.
    pub fn network_isolation_key(&self) -> Option<NetworkIsolationKey> {
        self.trusted_params
            .as_ref()
            .map(|params| params.isolation_info.network_isolation_key())
    }
}

fn is_token_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}
