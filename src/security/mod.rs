//! Security gate components consumed by the transfer engine
//!
//! - [`pin`] — argon2 PIN hashing/verification
//! - [`rate_limit`] — failed-PIN TTL counters and the temporary lock marker
//! - [`otp`] — single-use step-up codes for high-value transfers
//! - [`risk`] — external risk-scoring call-out

pub mod otp;
pub mod pin;
pub mod rate_limit;
pub mod risk;

pub use otp::{InMemoryOtpVerifier, OtpError, OtpVerifier};
pub use rate_limit::{InMemoryRateTracker, RateTracker};
pub use risk::{HttpRiskEvaluator, RiskAction, RiskError, RiskEvaluator, RiskVerdict, StaticRiskEvaluator};
