//! Requester IP extraction for click metadata and `created_by_ip`.
//!
//! Forwarding headers are only honoured when the deployment says a proxy
//! sets them (see [`TrustedProxyMode`]); otherwise the socket peer wins.

use axum::http::HeaderMap;
use std::net::IpAddr;
use tracing::warn;

use crate::config::{ClientIpConfig, TrustedProxyMode};

/// Extract the client IP address according to the trust configuration.
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: IpAddr,
    config: &ClientIpConfig,
) -> IpAddr {
    match config.trusted_proxy_mode {
        TrustedProxyMode::Cloudflare => extract_header_ip(headers, "cf-connecting-ip")
            .unwrap_or_else(|| {
                warn!("CF-Connecting-IP header missing in Cloudflare mode, using socket address");
                socket_addr
            }),
        TrustedProxyMode::Standard => extract_from_x_forwarded_for(headers, config)
            .or_else(|| extract_header_ip(headers, "x-real-ip"))
            .unwrap_or(socket_addr),
        TrustedProxyMode::None => socket_addr,
    }
}

fn extract_header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

/// Walk X-Forwarded-For right-to-left, skipping hops added by trusted proxies.
fn extract_from_x_forwarded_for(headers: &HeaderMap, config: &ClientIpConfig) -> Option<IpAddr> {
    let ips: Vec<IpAddr> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|s| s.split(','))
        .filter_map(|s| s.trim().parse::<IpAddr>().ok())
        .collect();

    if ips.is_empty() {
        return None;
    }

    if let Some(num_trusted) = config.num_trusted_proxies {
        return if ips.len() > num_trusted {
            Some(ips[ips.len() - num_trusted - 1])
        } else {
            // Chain shorter than the trusted hop count: leftmost is all we have
            ips.first().copied()
        };
    }

    if !config.trusted_proxies.is_empty() {
        return ips
            .iter()
            .rev()
            .find(|ip| !config.trusted_proxies.iter().any(|net| net.contains(*ip)))
            .or_else(|| ips.first())
            .copied();
    }

    ips.last().copied()
}
