//! Network allow-list for server-to-server notifications.
//!
//! The filter sits in front of signature verification and never replaces it.
//! When the direct peer is one of our reverse proxies the `X-Forwarded-For`
//! chain is consulted instead.

use std::net::IpAddr;

use thiserror::Error;

/// A notification whose sender is not on the allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("untrusted notification origin (remote: {remote}, forwarded for: {forwarded_for})")]
pub struct UntrustedOrigin {
    pub remote: String,
    pub forwarded_for: String,
}

impl UntrustedOrigin {
    fn new(remote_ip: Option<IpAddr>, forwarded_for: Option<&str>) -> Self {
        Self {
            remote: remote_ip.map_or_else(|| "unknown".to_string(), |ip| ip.to_string()),
            forwarded_for: forwarded_for.unwrap_or("-").to_string(),
        }
    }
}

/// Decides whether a notification sender may confirm payments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginTrustFilter {
    reverse_proxies: Vec<IpAddr>,
    allowed_confirmers: Vec<IpAddr>,
}

impl OriginTrustFilter {
    pub fn new(reverse_proxies: Vec<IpAddr>, allowed_confirmers: Vec<IpAddr>) -> Self {
        Self {
            reverse_proxies,
            allowed_confirmers,
        }
    }

    /// Returns the allow-listed address the request is trusted through.
    ///
    /// - remote is a known proxy: the first forwarded hop that is allow-listed,
    ///   scanning left to right; a missing header is untrusted
    /// - otherwise: the remote address itself, if allow-listed
    ///
    /// # Errors
    ///
    /// Returns `UntrustedOrigin` when no trusted address is found.
    pub fn check(
        &self,
        remote_ip: Option<IpAddr>,
        forwarded_for: Option<&str>,
    ) -> Result<IpAddr, UntrustedOrigin> {
        let untrusted = || UntrustedOrigin::new(remote_ip, forwarded_for);
        let remote = remote_ip.ok_or_else(untrusted)?;

        if self.reverse_proxies.contains(&remote) {
            return forwarded_for
                .into_iter()
                .flat_map(|header| header.split(','))
                .filter_map(|hop| hop.trim().parse::<IpAddr>().ok())
                .find(|hop| self.allowed_confirmers.contains(hop))
                .ok_or_else(untrusted);
        }

        if self.allowed_confirmers.contains(&remote) {
            Ok(remote)
        } else {
            Err(untrusted())
        }
    }

    pub fn is_trusted_source(&self, remote_ip: Option<IpAddr>, forwarded_for: Option<&str>) -> bool {
        self.check(remote_ip, forwarded_for).is_ok()
    }
}
