//! IO modules — side effects (network, filesystem).

/// Content-addressed download cache (C4).
pub mod cache;
/// Archive extraction with traversal defence (C5).
pub mod extract;
/// HTTPS fetcher with SSRF guard and streamed hashing (C2).
pub mod fetch;
/// Checksum and OpenPGP signature verification (C3).
pub mod verify;
