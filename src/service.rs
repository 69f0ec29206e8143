//! VAPID key pair endpoint logic, independent of the HTTP framework.
//!
//! Every non-preflight request produces one fresh key pair. There is no
//! state between requests: no caching, no counters, no stored keys.
//!
//! ```text
//! OPTIONS ──> Preflight (empty body, CORS headers)
//! other   ──> KeySource::generate ──> Keys { publicKey, privateKey }
//!                                 └─> Failure { error }   (500)
//! ```

// Rust guideline compliant 2026-02

use std::sync::Arc;

use axum::http::Method;
use serde::Serialize;

use crate::vapid::{GenerationFailure, VapidKeys};

/// `Access-Control-Allow-Origin` value attached to every response.
pub const CORS_ALLOW_ORIGIN: &str = "*";

/// `Access-Control-Allow-Headers` value attached to every response.
pub const CORS_ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

/// Source of fresh VAPID key pairs.
///
/// Production uses [`OsKeySource`]; tests inject failing or counting sources.
pub trait KeySource: Send + Sync {
    /// Produce one new, independent key pair.
    fn generate(&self) -> Result<VapidKeys, GenerationFailure>;
}

/// Key source backed by the operating system RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsKeySource;

impl KeySource for OsKeySource {
    fn generate(&self) -> Result<VapidKeys, GenerationFailure> {
        VapidKeys::generate()
    }
}

/// JSON body of a non-preflight response.
///
/// Either both key fields or the single error field, never a mix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum KeyPairReply {
    /// Generation succeeded.
    Keys(VapidKeys),
    /// Generation failed; nothing was produced.
    Failure {
        /// Human-readable failure message.
        error: String,
    },
}

impl KeyPairReply {
    /// Whether this reply carries keys.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Keys(_))
    }
}

impl From<Result<VapidKeys, GenerationFailure>> for KeyPairReply {
    fn from(result: Result<VapidKeys, GenerationFailure>) -> Self {
        match result {
            Ok(keys) => Self::Keys(keys),
            Err(failure) => Self::Failure {
                error: failure.message().to_string(),
            },
        }
    }
}

/// Outcome of handling one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceResponse {
    /// CORS preflight: empty body, no key generation.
    Preflight,
    /// JSON reply with keys or an error.
    Reply(KeyPairReply),
}

/// Stateless VAPID key pair service.
#[derive(Clone)]
pub struct KeyPairService {
    source: Arc<dyn KeySource>,
}

impl std::fmt::Debug for KeyPairService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPairService").finish_non_exhaustive()
    }
}

impl Default for KeyPairService {
    fn default() -> Self {
        Self::new(Arc::new(OsKeySource))
    }
}

impl KeyPairService {
    /// Create a service drawing keys from `source`.
    pub fn new(source: Arc<dyn KeySource>) -> Self {
        Self { source }
    }

    /// Handle one request by method.
    ///
    /// All non-OPTIONS methods are treated alike.
    pub fn handle(&self, method: &Method) -> ServiceResponse {
        if *method == Method::OPTIONS {
            return ServiceResponse::Preflight;
        }
        ServiceResponse::Reply(self.generate())
    }

    /// Generate one key pair and shape it as a reply.
    pub fn generate(&self) -> KeyPairReply {
        let result = self.source.generate();
        if let Err(ref failure) = result {
            log::error!("[VAPID] Key generation failed: {failure}");
        } else {
            log::debug!("[VAPID] Generated key pair");
        }
        KeyPairReply::from(result)
    }
}
