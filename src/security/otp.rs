//! Single-use OTP step-up codes
//!
//! Six-digit numeric codes with a short TTL. A successful validation
//! consumes the code immediately, so it can never authorize two transfers.

use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpError {
    #[error("OTP has expired or was never requested")]
    Expired,

    #[error("OTP code mismatch")]
    Mismatch,
}

#[async_trait]
pub trait OtpVerifier: Send + Sync {
    /// Issue a fresh code for the identity, replacing any outstanding one.
    /// Returns the code so the (external) delivery channel can send it.
    async fn issue(&self, identity: &str) -> String;

    /// Validate and consume. Success invalidates the code immediately.
    async fn validate(&self, identity: &str, code: &str) -> Result<(), OtpError>;
}

struct IssuedOtp {
    code: String,
    expires_at: Instant,
}

/// In-memory issuer/validator with TTL expiry.
pub struct InMemoryOtpVerifier {
    ttl: Duration,
    codes: DashMap<String, IssuedOtp>,
}

impl InMemoryOtpVerifier {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            codes: DashMap::new(),
        }
    }
}

#[async_trait]
impl OtpVerifier for InMemoryOtpVerifier {
    async fn issue(&self, identity: &str) -> String {
        let code = format!("{:06}", rand::thread_rng().gen_range(100_000..1_000_000));
        self.codes.insert(
            identity.to_string(),
            IssuedOtp {
                code: code.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        // Delivery (SMS/email) belongs to the caller; don't log the code.
        info!(identity, "OTP issued");
        code
    }

    async fn validate(&self, identity: &str, code: &str) -> Result<(), OtpError> {
        let now = Instant::now();

        // Consume only on an exact, unexpired match; the removal is the
        // single-use guarantee even under concurrent validations.
        if self
            .codes
            .remove_if(identity, |_, issued| {
                issued.expires_at > now && issued.code == code
            })
            .is_some()
        {
            debug!(identity, "OTP verified");
            return Ok(());
        }

        let expired = match self.codes.get(identity).map(|e| e.value().expires_at) {
            None => true,
            Some(expiry) => expiry <= now,
        };
        if expired {
            self.codes.remove_if(identity, |_, issued| issued.expires_at <= now);
            Err(OtpError::Expired)
        } else {
            Err(OtpError::Mismatch)
        }
    }
}
