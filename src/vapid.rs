//! VAPID key generation for Web Push (RFC 8292).
//!
//! Generates P-256 key pairs. The public key is exported as the uncompressed
//! SEC1 point (65 bytes) and the private key as the JWK `d` member (the raw
//! 32-byte scalar), both URL-safe base64 without padding. This is the format
//! browsers expect for `applicationServerKey` and web-push libraries expect
//! for signing VAPID tokens.

// Rust guideline compliant 2026-02

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::elliptic_curve::rand_core::{OsRng, RngCore};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{FieldBytes, PublicKey, SecretKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of an uncompressed P-256 point (0x04 || X || Y).
pub const PUBLIC_KEY_LEN: usize = 65;

/// Length of a P-256 private scalar.
pub const PRIVATE_KEY_LEN: usize = 32;

/// SEC1 tag byte of an uncompressed point.
const UNCOMPRESSED_TAG: u8 = 0x04;

/// Scalars outside `[1, n)` are redrawn; hitting this many in a row means
/// the entropy source is broken.
const MAX_SCALAR_ATTEMPTS: usize = 8;

/// Key generation or export failed.
///
/// The message is surfaced verbatim to HTTP callers, so it is written for
/// humans and never contains key material.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct GenerationFailure {
    message: String,
}

impl GenerationFailure {
    /// Create a failure with a human-readable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Human-readable failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// An externally supplied VAPID key is malformed.
#[derive(Debug, Error)]
pub enum KeyFormatError {
    /// Not valid URL-safe base64 without padding.
    #[error("invalid base64url for VAPID {which} key")]
    Encoding {
        /// Which half of the pair failed to decode.
        which: &'static str,
        /// Underlying decoder error.
        #[source]
        source: base64::DecodeError,
    },
    /// Public key has the wrong length or tag byte.
    #[error("VAPID public key must be a 65-byte uncompressed P-256 point, got {len} bytes")]
    PublicKeyFormat {
        /// Decoded length.
        len: usize,
    },
    /// Public key bytes are not a point on P-256.
    #[error("VAPID public key is not a point on P-256")]
    NotOnCurve,
    /// Private key has the wrong length.
    #[error("VAPID private key must be a 32-byte P-256 scalar, got {len} bytes")]
    PrivateKeyLength {
        /// Decoded length.
        len: usize,
    },
    /// Private scalar is zero or not below the group order.
    #[error("VAPID private key is not a valid P-256 scalar")]
    InvalidScalar,
    /// The public key is not derived from the private scalar.
    #[error("VAPID public key does not belong to the private key")]
    Mismatch,
}

/// VAPID key pair for web push authentication.
///
/// Serializes to exactly `{"publicKey": ..., "privateKey": ...}`, which is
/// also the success body of the key generation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VapidKeys {
    /// Uncompressed public key bytes (base64url, 65 bytes decoded).
    public_key: String,
    /// Raw 32-byte P-256 private key scalar (base64url).
    private_key: String,
}

/// JWK fields we need from the structured private key export.
#[derive(Deserialize)]
struct PrivateJwk {
    d: String,
}

impl VapidKeys {
    /// Generate a fresh VAPID key pair from the operating system RNG.
    pub fn generate() -> Result<Self, GenerationFailure> {
        Self::generate_with(&mut OsRng)
    }

    /// Generate a key pair drawing entropy from `rng`.
    ///
    /// Entropy errors are reported as [`GenerationFailure`] instead of
    /// panicking, so a broken provider turns into an error response.
    pub fn generate_with(rng: &mut impl RngCore) -> Result<Self, GenerationFailure> {
        let secret = random_secret(rng)?;

        // SEC1 uncompressed public key (65 bytes: 0x04 || x || y)
        let point = secret.public_key().to_encoded_point(false);
        let public_key = encode_base64url(point.as_bytes());

        let private_key = export_private_scalar(&secret)?;

        Ok(Self {
            public_key,
            private_key,
        })
    }

    /// Reconstruct from base64url-encoded strings.
    ///
    /// Validates the point encoding, curve membership, the scalar range and
    /// that the public key is derived from the private scalar.
    pub fn from_base64url(public_key: &str, private_key: &str) -> Result<Self, KeyFormatError> {
        let public = decode_public_key(public_key)?;
        let secret = decode_private_key(private_key)?;
        if secret.public_key() != public {
            return Err(KeyFormatError::Mismatch);
        }

        Ok(Self {
            public_key: public_key.to_string(),
            private_key: private_key.to_string(),
        })
    }

    /// Base64url-encoded uncompressed public key (65 bytes decoded).
    ///
    /// This is sent to browsers as the VAPID `applicationServerKey`.
    pub fn public_key_base64url(&self) -> &str {
        &self.public_key
    }

    /// Base64url-encoded raw 32-byte private key scalar.
    pub fn private_key_base64url(&self) -> &str {
        &self.private_key
    }

    /// Uncompressed public key bytes (65 bytes).
    pub fn public_key_bytes(&self) -> Result<Vec<u8>, KeyFormatError> {
        decode(&self.public_key, "public")
    }

    /// Big-endian private scalar bytes (32 bytes).
    pub fn private_key_bytes(&self) -> Result<Vec<u8>, KeyFormatError> {
        decode(&self.private_key, "private")
    }

    /// ECDSA signing key for VAPID JWTs.
    pub fn signing_key(&self) -> Result<SigningKey, KeyFormatError> {
        decode_private_key(&self.private_key).map(SigningKey::from)
    }

    /// ECDSA verifying key matching [`signing_key`](Self::signing_key).
    pub fn verifying_key(&self) -> Result<VerifyingKey, KeyFormatError> {
        decode_public_key(&self.public_key).map(VerifyingKey::from)
    }
}

/// URL-safe base64 without padding.
pub fn encode_base64url(bytes: &[u8]) -> String {
    BASE64URL.encode(bytes)
}

fn decode(encoded: &str, which: &'static str) -> Result<Vec<u8>, KeyFormatError> {
    BASE64URL
        .decode(encoded)
        .map_err(|source| KeyFormatError::Encoding { which, source })
}

fn decode_public_key(encoded: &str) -> Result<PublicKey, KeyFormatError> {
    let bytes = decode(encoded, "public")?;
    if bytes.len() != PUBLIC_KEY_LEN || bytes[0] != UNCOMPRESSED_TAG {
        return Err(KeyFormatError::PublicKeyFormat { len: bytes.len() });
    }
    PublicKey::from_sec1_bytes(&bytes).map_err(|_| KeyFormatError::NotOnCurve)
}

fn decode_private_key(encoded: &str) -> Result<SecretKey, KeyFormatError> {
    let bytes = decode(encoded, "private")?;
    if bytes.len() != PRIVATE_KEY_LEN {
        return Err(KeyFormatError::PrivateKeyLength { len: bytes.len() });
    }
    SecretKey::from_bytes(FieldBytes::from_slice(&bytes)).map_err(|_| KeyFormatError::InvalidScalar)
}

fn random_secret(rng: &mut impl RngCore) -> Result<SecretKey, GenerationFailure> {
    let mut bytes = FieldBytes::default();
    for _ in 0..MAX_SCALAR_ATTEMPTS {
        rng.try_fill_bytes(bytes.as_mut_slice())
            .map_err(|e| GenerationFailure::new(format!("Entropy source unavailable: {e}")))?;
        if let Ok(secret) = SecretKey::from_bytes(&bytes) {
            return Ok(secret);
        }
    }
    Err(GenerationFailure::new(
        "Entropy source produced no valid P-256 scalar",
    ))
}

/// Pull `d` out of the JWK export of `secret`.
fn export_private_scalar(secret: &SecretKey) -> Result<String, GenerationFailure> {
    let jwk = secret.to_jwk_string();
    let parsed: PrivateJwk = serde_json::from_str(&jwk)
        .map_err(|e| GenerationFailure::new(format!("Private key export failed: {e}")))?;
    normalize_scalar(&parsed.d)
}

/// Ensure an exported `d` decodes to exactly 32 bytes.
///
/// JWK exporters are supposed to left-pad `d` to the field size, but a
/// stripped leading zero would silently produce a 31-byte key that web-push
/// libraries reject. Short values are left-padded and re-encoded.
fn normalize_scalar(d: &str) -> Result<String, GenerationFailure> {
    let bytes = BASE64URL
        .decode(d)
        .map_err(|e| GenerationFailure::new(format!("Private key export is not base64url: {e}")))?;

    match bytes.len() {
        PRIVATE_KEY_LEN => Ok(d.to_string()),
        len if len > 0 && len < PRIVATE_KEY_LEN => {
            log::debug!("[VAPID] Left-padding exported scalar from {len} to {PRIVATE_KEY_LEN} bytes");
            let mut padded = vec![0u8; PRIVATE_KEY_LEN - len];
            padded.extend_from_slice(&bytes);
            Ok(encode_base64url(&padded))
        }
        len => Err(GenerationFailure::new(format!(
            "Private key export has {len} bytes, expected {PRIVATE_KEY_LEN}"
        ))),
    }
}
