use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    #[serde(default = "default_branch_code")]
    pub branch_code: String,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub interest: InterestConfig,
}

/// Security policy for the transfer engine.
///
/// Thresholds and TTLs live here so the lockout/step-up rules are
/// configuration, not magic numbers inside the engine.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SecurityConfig {
    /// Transfers at or above this amount require OTP step-up.
    #[serde(default = "default_high_value_threshold")]
    pub high_value_threshold: Decimal,
    /// Failed-PIN count that engages the temporary lock.
    #[serde(default = "default_temp_lock_threshold")]
    pub temp_lock_threshold: u32,
    /// Failed-PIN count that engages the persistent account lock.
    #[serde(default = "default_hard_lock_threshold")]
    pub hard_lock_threshold: u32,
    /// Rolling window for the failed-PIN counter.
    #[serde(default = "default_attempt_window_hours")]
    pub attempt_window_hours: u64,
    /// Lifetime of the temporary lock marker.
    #[serde(default = "default_temp_lock_minutes")]
    pub temp_lock_minutes: u64,
    /// Lifetime of an issued OTP code.
    #[serde(default = "default_otp_ttl_minutes")]
    pub otp_ttl_minutes: u64,
    /// When the risk engine is unreachable: allow (true) or block (false).
    #[serde(default = "default_risk_fail_open")]
    pub risk_fail_open: bool,
    /// Bounded timeout for the external risk evaluation call.
    #[serde(default = "default_risk_timeout_ms")]
    pub risk_timeout_ms: u64,
    /// Bounded timeout for OTP validation. Timeout always fails the transfer.
    #[serde(default = "default_otp_timeout_ms")]
    pub otp_timeout_ms: u64,
    /// External risk engine endpoint. None means every transfer is allowed.
    #[serde(default)]
    pub risk_endpoint: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            high_value_threshold: default_high_value_threshold(),
            temp_lock_threshold: default_temp_lock_threshold(),
            hard_lock_threshold: default_hard_lock_threshold(),
            attempt_window_hours: default_attempt_window_hours(),
            temp_lock_minutes: default_temp_lock_minutes(),
            otp_ttl_minutes: default_otp_ttl_minutes(),
            risk_fail_open: default_risk_fail_open(),
            risk_timeout_ms: default_risk_timeout_ms(),
            otp_timeout_ms: default_otp_timeout_ms(),
            risk_endpoint: None,
        }
    }
}

/// Interest accrual worker configuration.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InterestConfig {
    pub enabled: bool,
    /// Per-sweep interest rate applied to positive balances.
    pub rate: Decimal,
    pub interval_secs: u64,
}

impl Default for InterestConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rate: Decimal::new(5, 3), // 0.5%
            interval_secs: 3600,
        }
    }
}

fn default_branch_code() -> String {
    "001".to_string()
}

fn default_cache_ttl() -> u64 {
    30
}

fn default_high_value_threshold() -> Decimal {
    Decimal::from(100_000)
}

fn default_temp_lock_threshold() -> u32 {
    5
}

fn default_hard_lock_threshold() -> u32 {
    7
}

fn default_attempt_window_hours() -> u64 {
    24
}

fn default_temp_lock_minutes() -> u64 {
    5
}

fn default_otp_ttl_minutes() -> u64 {
    5
}

fn default_risk_fail_open() -> bool {
    true
}

fn default_risk_timeout_ms() -> u64 {
    1500
}

fn default_otp_timeout_ms() -> u64 {
    1500
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "corebank.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
            branch_code: default_branch_code(),
            cache_ttl_seconds: default_cache_ttl(),
            security: SecurityConfig::default(),
            interest: InterestConfig::default(),
        }
    }
}
