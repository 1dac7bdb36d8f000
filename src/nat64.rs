//! NAT64 outbound resolution.
//!
//! Hosts without a direct network path are reached through a NAT64 gateway:
//! the host's A record is looked up over DNS-over-HTTPS and the IPv4 address
//! is embedded into a fixed-prefix IPv6 literal. Resolution is a live lookup
//! per call, never memoized; the gateway's view of the record is always
//! current.

use crate::config::{DOH_ENDPOINT, NAT64_PREFIX};
use crate::error::{ProxyError, Result};
use reqwest::header;
use serde::Deserialize;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

/// DNS record type for A records in dns-json answers
const DNS_TYPE_A: u16 = 1;

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Answer", default)]
    answer: Vec<DohRecord>,
}

#[derive(Debug, Deserialize)]
struct DohRecord {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

/// Result of one NAT64 resolution. Computed on demand per outbound call.
#[derive(Debug, Clone)]
pub struct Nat64Mapping {
    pub domain: String,
    pub ipv4: Ipv4Addr,
    /// Bracketed IPv6 literal, e.g. `[2602:fc59:b0:64::c000:0201]`.
    pub literal: String,
}

impl Nat64Mapping {
    /// The synthesized address in `std::net` form, for connection overrides.
    pub fn addr(&self) -> Result<Ipv6Addr> {
        self.literal
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .map_err(|_| ProxyError::Address(format!("invalid IPv6 literal: {}", self.literal)))
    }
}

/// Synthesize the NAT64 IPv6 literal for an IPv4 address.
///
/// The four octets are hex-encoded into two 16-bit groups appended to the
/// fixed 96-bit prefix. Malformed input fails, never clamps.
pub fn convert_to_nat64(ipv4: &str) -> Result<String> {
    let addr: Ipv4Addr = ipv4
        .parse()
        .map_err(|_| ProxyError::Address(format!("invalid IPv4 address: {}", ipv4)))?;
    let [a, b, c, d] = addr.octets();
    Ok(format!(
        "[{}{:02x}{:02x}:{:02x}{:02x}]",
        NAT64_PREFIX, a, b, c, d
    ))
}

/// Resolver combining the DoH A-record lookup with NAT64 synthesis.
pub struct Nat64Resolver {
    client: reqwest::Client,
    doh_endpoint: String,
}

impl Nat64Resolver {
    pub fn new(request_timeout_secs: u64, connect_timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs))
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            doh_endpoint: DOH_ENDPOINT.to_string(),
        })
    }

    /// Resolve a domain to its NAT64 mapping via the first A record.
    pub async fn resolve(&self, domain: &str) -> Result<Nat64Mapping> {
        let query_url = format!("{}?name={}&type=A", self.doh_endpoint, domain);
        let response = self
            .client
            .get(&query_url)
            .header(header::ACCEPT, "application/dns-json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProxyError::Resolve(format!(
                "dns query for {} returned status {}",
                domain,
                response.status()
            )));
        }

        let body = response.bytes().await?;
        let answer: DohResponse = serde_json::from_slice(&body)
            .map_err(|e| ProxyError::Resolve(format!("dns response for {} did not parse: {}", domain, e)))?;
        let record = answer
            .answer
            .iter()
            .find(|r| r.record_type == DNS_TYPE_A)
            .ok_or_else(|| ProxyError::Resolve(format!("no A record for {}", domain)))?;

        let ipv4: Ipv4Addr = record
            .data
            .parse()
            .map_err(|_| ProxyError::Address(format!("invalid A record data: {}", record.data)))?;
        let literal = convert_to_nat64(&record.data)?;

        tracing::debug!(domain, %ipv4, literal = %literal, "resolved NAT64 mapping");
        Ok(Nat64Mapping {
            domain: domain.to_string(),
            ipv4,
            literal,
        })
    }
}
