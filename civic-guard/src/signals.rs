//! Client signals captured from an incoming request
//!
//! The guard, the fingerprint engine and the audit log all work from the same
//! small set of request headers plus the socket address. Extracting them once
//! keeps the transport layer out of this crate.

use std::net::SocketAddr;

use http::HeaderMap;
use serde::{Deserialize, Serialize};

/// Header names read from incoming requests
///
/// Configurable so deployments behind proxies that rename headers keep
/// working.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalHeaders {
    /// Client-supplied user agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Preferred languages
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    /// Accepted content encodings
    #[serde(default = "default_accept_encoding")]
    pub accept_encoding: String,
    /// Proxy chain, client first
    #[serde(default = "default_forwarded_for")]
    pub forwarded_for: String,
    /// Single client address set by the proxy
    #[serde(default = "default_real_ip")]
    pub real_ip: String,
}

impl Default for SignalHeaders {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            accept_encoding: default_accept_encoding(),
            forwarded_for: default_forwarded_for(),
            real_ip: default_real_ip(),
        }
    }
}

fn default_user_agent() -> String {
    "user-agent".to_string()
}

fn default_accept_language() -> String {
    "accept-language".to_string()
}

fn default_accept_encoding() -> String {
    "accept-encoding".to_string()
}

fn default_forwarded_for() -> String {
    "x-forwarded-for".to_string()
}

fn default_real_ip() -> String {
    "x-real-ip".to_string()
}

/// Signals describing the client behind one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSignals {
    /// `User-Agent` header
    pub user_agent: Option<String>,
    /// `Accept-Language` header
    pub accept_language: Option<String>,
    /// `Accept-Encoding` header
    pub accept_encoding: Option<String>,
    /// `X-Forwarded-For` header, unparsed
    pub forwarded_for: Option<String>,
    /// `X-Real-IP` header
    pub real_ip: Option<String>,
    /// Peer address of the connection
    pub remote_addr: Option<SocketAddr>,
}

impl RequestSignals {
    /// Capture signals using the default header names
    pub fn from_headers(headers: &HeaderMap, remote_addr: Option<SocketAddr>) -> Self {
        Self::from_headers_with(headers, remote_addr, &SignalHeaders::default())
    }

    /// Capture signals using custom header names
    pub fn from_headers_with(
        headers: &HeaderMap,
        remote_addr: Option<SocketAddr>,
        names: &SignalHeaders,
    ) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            user_agent: header(&names.user_agent),
            accept_language: header(&names.accept_language),
            accept_encoding: header(&names.accept_encoding),
            forwarded_for: header(&names.forwarded_for),
            real_ip: header(&names.real_ip),
            remote_addr,
        }
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the accepted languages
    pub fn with_accept_language(mut self, accept_language: impl Into<String>) -> Self {
        self.accept_language = Some(accept_language.into());
        self
    }

    /// Set the accepted encodings
    pub fn with_accept_encoding(mut self, accept_encoding: impl Into<String>) -> Self {
        self.accept_encoding = Some(accept_encoding.into());
        self
    }

    /// Set the forwarded-for chain
    pub fn with_forwarded_for(mut self, forwarded_for: impl Into<String>) -> Self {
        self.forwarded_for = Some(forwarded_for.into());
        self
    }

    /// Set the real-ip header value
    pub fn with_real_ip(mut self, real_ip: impl Into<String>) -> Self {
        self.real_ip = Some(real_ip.into());
        self
    }

    /// Set the peer address
    pub fn with_remote_addr(mut self, remote_addr: SocketAddr) -> Self {
        self.remote_addr = Some(remote_addr);
        self
    }

    /// Best guess at the client address
    ///
    /// First `X-Forwarded-For` entry, then `X-Real-IP`, then the socket peer.
    pub fn client_ip(&self) -> Option<String> {
        let forwarded = self
            .forwarded_for
            .as_deref()
            .and_then(|chain| chain.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        forwarded
            .or_else(|| self.real_ip.as_deref().filter(|ip| !ip.is_empty()))
            .map(str::to_string)
            .or_else(|| self.remote_addr.map(|addr| addr.ip().to_string()))
    }

    /// [`client_ip`](Self::client_ip) or `"unknown"`
    pub fn client_ip_or_unknown(&self) -> String {
        self.client_ip().unwrap_or_else(|| "unknown".to_string())
    }
}
