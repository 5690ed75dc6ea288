//! Address-family selection for outbound connections.
//!
//! The policy is a plain value handed to each request; there is no global
//! switch. `Auto` leaves resolution to libcurl's dual-stack connection racing.
//! `PreferIpv6` restricts resolution to AAAA records first and falls back to
//! IPv4 when no IPv6 connection could be made, unless the caller asks for
//! strict IPv6 (an entry reachable only through an IPv6 raw URL).

mod probe;

use curl::easy::{Easy, IpResolve};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::retry::{ErrorKind, Retryable};

pub use probe::ipv6_route_available;

/// Address-family policy for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressPolicy {
    #[default]
    Auto,
    PreferIpv6,
}

/// Network-layer family a transfer actually used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
    #[default]
    Unknown,
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AddressFamily::Ipv4 => "ipv4",
            AddressFamily::Ipv6 => "ipv6",
            AddressFamily::Unknown => "unknown",
        })
    }
}

impl From<IpAddr> for AddressFamily {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(v6) if v6.to_ipv4_mapped().is_some() => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }
}

/// Resolved family and peer of the last connection a request used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeerInfo {
    pub family: AddressFamily,
    pub addr: Option<SocketAddr>,
}

impl PeerInfo {
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Reads `CURLINFO_PRIMARY_IP` / `CURLINFO_PRIMARY_PORT` after a transfer.
    fn observe(easy: &mut Easy) -> Self {
        let ip = easy
            .primary_ip()
            .ok()
            .flatten()
            .and_then(|s| s.parse::<IpAddr>().ok());
        let Some(ip) = ip else {
            return Self::unknown();
        };
        let port = easy.primary_port().unwrap_or(0);
        Self {
            family: AddressFamily::from(ip),
            addr: Some(SocketAddr::new(ip, port)),
        }
    }
}

/// One connection attempt's resolution restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyChoice {
    Any,
    V6Only,
    V4Only,
}

impl FamilyChoice {
    fn ip_resolve(self) -> IpResolve {
        match self {
            FamilyChoice::Any => IpResolve::Any,
            FamilyChoice::V6Only => IpResolve::V6,
            FamilyChoice::V4Only => IpResolve::V4,
        }
    }
}

/// Binds requests to an address family according to an [`AddressPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressFamilySelector {
    policy: AddressPolicy,
}

impl AddressFamilySelector {
    pub fn new(policy: AddressPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> AddressPolicy {
        self.policy
    }

    /// Families to try, in order.
    pub fn candidates(&self, strict_ipv6: bool) -> &'static [FamilyChoice] {
        match (self.policy, strict_ipv6) {
            (AddressPolicy::Auto, _) => &[FamilyChoice::Any],
            (AddressPolicy::PreferIpv6, true) => &[FamilyChoice::V6Only],
            (AddressPolicy::PreferIpv6, false) => &[FamilyChoice::V6Only, FamilyChoice::V4Only],
        }
    }

    /// Runs `attempt` on a fresh handle bound to each candidate family in turn.
    ///
    /// The next family is only tried when the attempt failed before any HTTP
    /// response arrived (resolution or connect failure). Returns the result of
    /// the last attempt together with the peer it talked to.
    pub fn resolve_connection<T, E, F>(&self, strict_ipv6: bool, mut attempt: F) -> (Result<T, E>, PeerInfo)
    where
        E: Retryable + fmt::Display + From<curl::Error>,
        F: FnMut(&mut Easy) -> Result<T, E>,
    {
        let candidates = self.candidates(strict_ipv6);
        // CURLE_COULDNT_CONNECT until an attempt reports otherwise.
        let mut outcome = (Err(E::from(curl::Error::new(7))), PeerInfo::unknown());
        for (i, choice) in candidates.iter().enumerate() {
            let mut easy = Easy::new();
            if let Err(e) = easy.ip_resolve(choice.ip_resolve()) {
                return (Err(E::from(e)), PeerInfo::unknown());
            }
            let result = attempt(&mut easy);
            let peer = PeerInfo::observe(&mut easy);
            let url = easy.effective_url().ok().flatten().unwrap_or("").to_string();
            tracing::debug!(
                url = %url,
                family = %peer.family,
                peer = ?peer.addr,
                choice = ?choice,
                "request"
            );

            let last = i + 1 == candidates.len();
            match result {
                Err(e) if !last && never_reached(&e, &mut easy) => {
                    tracing::debug!(error = %e, "no usable IPv6 connection, falling back to IPv4");
                    outcome = (Err(e), peer);
                }
                other => return (other, peer),
            }
        }
        outcome
    }
}

/// True when the failure happened before any HTTP response was received.
fn never_reached<E: Retryable>(e: &E, easy: &mut Easy) -> bool {
    let network = matches!(e.retry_kind(), ErrorKind::Connection | ErrorKind::Timeout);
    network && easy.response_code().map(|c| c == 0).unwrap_or(true)
}
