//! Checksum & signature verifier (C3).
//!
//! Checksum-manifest parsing is grounded on the teacher's hash-comparison
//! idiom in `io/download.rs`. PGP signature verification has no teacher
//! equivalent; it uses the `pgp` crate for detached-signature and
//! fingerprint checks.

use crate::error::CoreError;
use sha2::{Digest, Sha256, Sha512};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Sha256,
    Sha512,
}

/// Hashes `data` with the requested algorithm and returns the lowercase hex
/// digest.
pub fn hash_bytes(data: &[u8], algorithm: ChecksumAlgorithm) -> String {
    match algorithm {
        ChecksumAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
        ChecksumAlgorithm::Sha512 => hex::encode(Sha512::digest(data)),
    }
}

/// Verifies `data` hashes to `expected` under `algorithm`.
///
/// # Errors
///
/// Returns `ChecksumMismatch` if the digests differ.
pub fn verify_checksum(
    data: &[u8],
    expected: &str,
    algorithm: ChecksumAlgorithm,
) -> Result<(), CoreError> {
    let actual = hash_bytes(data, algorithm);
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(CoreError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Selects the digest for `filename` out of a checksum manifest's text,
/// which may be either a single bare hash or a multi-line `hash  filename`
/// listing (the BSD/GNU `sha256sum` convention).
///
/// # Errors
///
/// Returns `CoreError::BadParam` if the manifest contains no line naming
/// `filename` and isn't a single bare hash either.
pub fn select_checksum_for_file<'a>(
    manifest: &'a str,
    filename: &str,
) -> Result<&'a str, CoreError> {
    let trimmed = manifest.trim();
    let lines: Vec<&str> = trimmed.lines().collect();

    if lines.len() == 1 && !lines[0].contains(char::is_whitespace) {
        return Ok(lines[0].trim());
    }

    for line in &lines {
        let mut parts = line.split_whitespace();
        let Some(hash) = parts.next() else { continue };
        let Some(name) = parts.next() else { continue };
        let name = name.trim_start_matches('*');
        if name == filename || name.ends_with(&format!("/{filename}")) {
            return Ok(hash);
        }
    }

    Err(CoreError::BadParam(format!(
        "no checksum entry found for {filename} in manifest"
    )))
}

/// Validates a pinned OpenPGP fingerprint is well-formed (40 uppercase hex
/// characters) per spec.md §4.3.
///
/// # Errors
///
/// Returns `CoreError::BadParam` if the fingerprint is malformed.
pub fn validate_fingerprint(fingerprint: &str) -> Result<(), CoreError> {
    if fingerprint.len() == 40 && fingerprint.chars().all(|c| c.is_ascii_hexdigit() && (c.is_ascii_digit() || c.is_ascii_uppercase()))
    {
        Ok(())
    } else {
        Err(CoreError::BadParam(format!(
            "signature_key_fingerprint must be 40 uppercase hex characters, got {fingerprint}"
        )))
    }
}

/// Verifies a detached ASCII-armored OpenPGP signature over `data`,
/// requiring the signing key's fingerprint to match `expected_fingerprint`
/// exactly before the signature itself is checked.
///
/// # Errors
///
/// Returns `SignatureInvalid` if the fingerprint doesn't match, the
/// armored blocks fail to parse, or the signature doesn't verify.
pub fn verify_detached_signature(
    data: &[u8],
    armored_signature: &str,
    armored_public_key: &str,
    expected_fingerprint: &str,
) -> Result<(), CoreError> {
    use pgp::composed::{Deserializable, SignedPublicKey, StandaloneSignature};

    validate_fingerprint(expected_fingerprint)?;

    let (public_key, _) = SignedPublicKey::from_string(armored_public_key)
        .map_err(|e| CoreError::SignatureInvalid(format!("invalid public key: {e}")))?;

    let actual_fingerprint = hex::encode_upper(public_key.fingerprint().as_bytes());
    if actual_fingerprint != expected_fingerprint {
        return Err(CoreError::SignatureInvalid(format!(
            "key fingerprint mismatch: expected {expected_fingerprint}, got {actual_fingerprint}"
        )));
    }

    let (signature, _) = StandaloneSignature::from_string(armored_signature)
        .map_err(|e| CoreError::SignatureInvalid(format!("invalid signature: {e}")))?;

    signature
        .verify(&public_key, data)
        .map_err(|e| CoreError::SignatureInvalid(format!("signature does not verify: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_bytes_sha256_matches_known_vector() {
        let digest = hash_bytes(b"", ChecksumAlgorithm::Sha256);
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"
        );
    }

    #[test]
    fn select_checksum_handles_bare_hash() {
        let manifest = "abc123\n";
        assert_eq!(select_checksum_for_file(manifest, "whatever").unwrap(), "abc123");
    }

    #[test]
    fn select_checksum_handles_multiline_manifest() {
        let manifest = "deadbeef  kubectl-1.29.3-linux-amd64.tar.gz\ncafef00d  kubectl-1.29.3-darwin-arm64.tar.gz\n";
        assert_eq!(
            select_checksum_for_file(manifest, "kubectl-1.29.3-darwin-arm64.tar.gz").unwrap(),
            "cafef00d"
        );
    }

    #[test]
    fn validate_fingerprint_accepts_40_uppercase_hex() {
        assert!(validate_fingerprint("D53626F8174A9846F6A573CC1253FA47EA19E301").is_ok());
    }

    #[test]
    fn validate_fingerprint_rejects_lowercase() {
        assert!(validate_fingerprint("d53626f8174a9846f6a573cc1253fa47ea19e301").is_err());
    }

    #[test]
    fn validate_fingerprint_rejects_wrong_length() {
        assert!(validate_fingerprint("D53626").is_err());
    }
}
