//! SSRF filter for outbound URLs.

use anyhow::{bail, Result};
use reqwest::Url;
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    ip.is_loopback()
        || ip.is_link_local()
        || ip.octets()[0] == 10
        || (ip.octets()[0] == 172 && (16..=31).contains(&ip.octets()[1]))
        || (ip.octets()[0] == 192 && ip.octets()[1] == 168)
}

fn is_unique_local_ipv6(ip: Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}

fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_ipv4(v4),
        IpAddr::V6(v6) => v6.is_loopback() || is_unique_local_ipv6(v6) || (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}

pub struct SsrfFilter {
    allowlisted_hosts: HashSet<String>,
    resolve_dns: bool,
    cache: RwLock<HashMap<String, (Vec<IpAddr>, Instant)>>,
    cache_ttl: Duration,
}

impl SsrfFilter {
    pub fn new(allowlisted_hosts: HashSet<String>, resolve_dns: bool) -> Self {
        Self {
            allowlisted_hosts,
            resolve_dns,
            cache: RwLock::new(HashMap::new()),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    fn is_loopback_hostname(host: &str) -> bool {
        host.eq_ignore_ascii_case("localhost")
    }

    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<IpAddr>> {
        {
            let cache = self.cache.read().await;
            if let Some((ips, at)) = cache.get(host) {
                if at.elapsed() < self.cache_ttl {
                    return Ok(ips.clone());
                }
            }
        }

        let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, port))
            .await?
            .map(|s| s.ip())
            .collect();

        let mut cache = self.cache.write().await;
        cache.insert(host.to_string(), (addrs.clone(), Instant::now()));
        Ok(addrs)
    }

    /// `true` iff the URL is safe to fetch: scheme is `http`/`https`,
    /// `http` only for allowlisted hosts or loopback, and — when DNS
    /// resolution is enabled — every resolved address is public.
    pub async fn is_safe_url(&self, url_str: &str) -> Result<bool> {
        let url = Url::parse(url_str)?;

        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Ok(false);
        }

        let host = match url.host_str() {
            Some(h) => h.to_string(),
            None => return Ok(false),
        };

        if scheme == "http" && !self.allowlisted_hosts.contains(&host) && !Self::is_loopback_hostname(&host) {
            if let Ok(ip) = host.parse::<IpAddr>() {
                if !ip.is_loopback() {
                    return Ok(false);
                }
            } else {
                return Ok(false);
            }
        }

        if Self::is_loopback_hostname(&host) {
            return Ok(self.allowlisted_hosts.contains(&host) || scheme == "http" || scheme == "https");
        }

        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(!is_private_ip(ip));
        }

        if self.resolve_dns {
            let port = url.port_or_known_default().unwrap_or(443);
            let addrs = self.resolve(&host, port).await?;
            if addrs.is_empty() {
                bail!("DNS resolution returned no addresses for '{}'", host);
            }
            return Ok(addrs.iter().all(|ip| !is_private_ip(*ip)));
        }

        Ok(true)
    }
}

impl Default for SsrfFilter {
    fn default() -> Self {
        Self::new(HashSet::new(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_non_http_scheme() {
        let filter = SsrfFilter::default();
        assert!(!filter.is_safe_url("ftp://example.com/file").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_private_ipv4_literal() {
        let filter = SsrfFilter::default();
        assert!(!filter.is_safe_url("https://10.0.0.5/").await.unwrap());
        assert!(!filter.is_safe_url("https://192.168.1.1/").await.unwrap());
        assert!(!filter.is_safe_url("https://172.16.0.1/").await.unwrap());
    }

    #[tokio::test]
    async fn test_accepts_public_ipv4_literal() {
        let filter = SsrfFilter::default();
        assert!(filter.is_safe_url("https://8.8.8.8/").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_plain_http_to_non_allowlisted_host() {
        let filter = SsrfFilter::default();
        assert!(!filter.is_safe_url("http://example.com/").await.unwrap());
    }

    #[tokio::test]
    async fn test_allows_plain_http_to_allowlisted_host() {
        let mut allow = HashSet::new();
        allow.insert("example.com".to_string());
        let filter = SsrfFilter::new(allow, false);
        assert!(filter.is_safe_url("http://example.com/").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_ipv6_unique_local() {
        let filter = SsrfFilter::default();
        assert!(!filter.is_safe_url("https://[fd00::1]/").await.unwrap());
    }
}
