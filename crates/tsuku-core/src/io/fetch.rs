//! HTTP fetcher (C2).
//!
//! Grounded on the teacher's single-stream download path in
//! `io/download.rs::download_and_verify_mp` (the parallel range-chunked
//! fast path is deliberately not carried forward — see `SPEC_FULL.md` §3).
//! SSRF/redirect-IP validation has no teacher equivalent and is built
//! against `reqwest::redirect::Policy::custom`.

use crate::error::CoreError;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

pub const USER_AGENT: &str = concat!("tsuku-core/", env!("CARGO_PKG_VERSION"));

/// Bounds connection establishment only. Applied at the client level so it
/// never caps body-streaming time for large archive downloads, which are
/// deliberately open-ended per spec.md §3.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a completed fetch.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub path: PathBuf,
    pub sha256: String,
    pub size: u64,
}

/// Returns true if `ip` falls in a private/loopback/link-local/multicast/
/// unspecified range, per spec.md §8's SSRF guard.
pub fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_unspecified()
                || v4.octets()[0..2] == [172, 16] // covered by is_private but explicit for 172.16.0.0/12 edge
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                || (v6.segments()[0] & 0xff00) == 0xff00 // ff00::/8
        }
    }
}

fn resolve_host_ips(host: &str) -> Result<Vec<IpAddr>, CoreError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }
    let addrs = format!("{host}:443")
        .to_socket_addrs()
        .map_err(|e| CoreError::BadParam(format!("could not resolve host {host}: {e}")))?;
    Ok(addrs.map(|a: SocketAddr| a.ip()).collect())
}

/// Validates `url` is `https` and that every IP its host resolves to is
/// outside the SSRF blocklist.
///
/// # Errors
///
/// Returns `InsecureScheme` for non-https URLs and `BlockedIp` if any
/// resolved address is disallowed.
pub fn validate_url(url: &reqwest::Url) -> Result<(), CoreError> {
    if url.scheme() != "https" {
        return Err(CoreError::InsecureScheme(url.to_string()));
    }
    let host = url
        .host_str()
        .ok_or_else(|| CoreError::BadParam(format!("url has no host: {url}")))?;
    for ip in resolve_host_ips(host)? {
        if is_blocked_ip(ip) {
            return Err(CoreError::BlockedIp(format!("{host} -> {ip}")));
        }
    }
    Ok(())
}

/// Builds the shared `reqwest::Client` used by every fetch in the engine:
/// HTTPS-only, identity encoding, and a redirect policy that re-validates
/// scheme and destination IP on every hop.
///
/// # Errors
///
/// Returns `reqwest::Error` if the TLS backend fails to initialize.
pub fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::custom(|attempt| {
            match validate_url(attempt.url()) {
                Ok(()) => attempt.follow(),
                Err(e) => attempt.error(e),
            }
        }))
        .build()
}

/// Fetches `url` into `dest`, streaming bytes through a SHA-256 hasher and
/// writing to a sibling `dest.part` before an atomic rename.
///
/// # Errors
///
/// `InsecureScheme`/`BlockedIp` on validation failure, `CompressedResponse`
/// if the server ignored `Accept-Encoding: identity`, `Cancelled` if the
/// token fires mid-stream, or an I/O/HTTP error.
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<FetchResult, CoreError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| CoreError::BadParam(e.to_string()))?;
    validate_url(&parsed)?;

    let response = tokio::select! {
        resp = client
            .get(parsed)
            .header(reqwest::header::ACCEPT_ENCODING, "identity")
            .send() => resp?.error_for_status()?,
        () = cancel.cancelled() => return Err(CoreError::Cancelled),
    };

    if let Some(encoding) = response.headers().get(reqwest::header::CONTENT_ENCODING) {
        let encoding = encoding.to_str().unwrap_or_default();
        if encoding.eq_ignore_ascii_case("gzip")
            || encoding.eq_ignore_ascii_case("deflate")
            || encoding.eq_ignore_ascii_case("br")
        {
            return Err(CoreError::CompressedResponse);
        }
    }

    let part = dest.with_extension("part");
    if let Some(parent) = part.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(&part).await?;
    let mut hasher = Sha256::new();
    let mut size: u64 = 0;

    let mut stream = response.bytes_stream();
    loop {
        tokio::select! {
            chunk = stream.next() => {
                match chunk {
                    Some(chunk) => {
                        let chunk = chunk?;
                        file.write_all(&chunk).await?;
                        hasher.update(&chunk);
                        size += chunk.len() as u64;
                    }
                    None => break,
                }
            }
            () = cancel.cancelled() => {
                drop(file);
                let _ = tokio::fs::remove_file(&part).await;
                return Err(CoreError::Cancelled);
            }
        }
    }

    file.flush().await?;
    drop(file);
    tokio::fs::rename(&part, dest).await?;

    Ok(FetchResult {
        path: dest.to_path_buf(),
        sha256: hex::encode(hasher.finalize()),
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn blocks_loopback_and_private_ranges() {
        assert!(is_blocked_ip(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))));
        assert!(is_blocked_ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        assert!(is_blocked_ip(IpAddr::V4(Ipv4Addr::new(172, 16, 0, 1))));
        assert!(is_blocked_ip(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))));
        assert!(is_blocked_ip(IpAddr::V4(Ipv4Addr::new(169, 254, 0, 1))));
        assert!(is_blocked_ip(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0))));
        assert!(is_blocked_ip("::1".parse().unwrap()));
    }

    #[test]
    fn allows_public_ip() {
        assert!(!is_blocked_ip(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))));
    }

    #[test]
    fn validate_url_rejects_plain_http() {
        let url = reqwest::Url::parse("http://example.com/archive.tar.gz").unwrap();
        assert!(matches!(validate_url(&url), Err(CoreError::InsecureScheme(_))));
    }
}
