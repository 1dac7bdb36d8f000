use thiserror::Error;

/// Errors produced by the proxy pipeline.
///
/// At the request boundary every variant collapses into an HTTP 502 with a
/// generic plain-text body; the detail stays in the log so upstream hostnames
/// and credentials never reach the client.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// DNS-over-HTTPS lookup failed or returned no usable A record.
    #[error("resolution failed: {0}")]
    Resolve(String),

    /// Malformed address input (bad IPv4 octets, unparseable IPv6 literal).
    #[error("invalid address: {0}")]
    Address(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ProxyError>;
