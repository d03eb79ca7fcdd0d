//! Application configuration loaded from environment variables.

use loan_protocol::{pin, LoanTerms};

use crate::errors::{Result, TrackerError};

#[derive(Debug, Clone)]
pub struct Config {
    /// Six-digit PIN checked in-process. Required unless `pin_verify_url` is set.
    pub pin_code: Option<String>,
    /// Remote PIN verification endpoint; takes precedence over `pin_code`.
    pub pin_verify_url: Option<String>,
    /// Path to the SQLite database file
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// Timeout for remote PIN verification requests
    pub verify_timeout_secs: u64,
    pub loan_terms: LoanTerms,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = LoanTerms::default();

        let config = Config {
            pin_code: env_var("PIN_CODE").ok(),
            pin_verify_url: env_var("PIN_VERIFY_URL").ok(),
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./loan_tracker.db".to_string()),
            api_port: parse_or("API_PORT", 3001)?,
            verify_timeout_secs: parse_or("VERIFY_TIMEOUT_SECS", 10)?,
            loan_terms: LoanTerms {
                principal_cents: parse_or("LOAN_PRINCIPAL_CENTS", defaults.principal_cents)?,
                interest_cents: parse_or("LOAN_INTEREST_CENTS", defaults.interest_cents)?,
                installment_count: parse_or("LOAN_INSTALLMENTS", defaults.installment_count)?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        match (&self.pin_code, &self.pin_verify_url) {
            (None, None) => Err(TrackerError::Config(
                "PIN_CODE or PIN_VERIFY_URL environment variable is required".to_string(),
            )),
            (Some(code), _) if !is_valid_pin(code) => Err(TrackerError::Config(format!(
                "PIN_CODE must be exactly {} digits",
                pin::PIN_LENGTH
            ))),
            _ => Ok(()),
        }
    }
}

fn is_valid_pin(code: &str) -> bool {
    code.len() == pin::PIN_LENGTH && code.chars().all(|c| c.is_ascii_digit())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env_var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| TrackerError::Config(format!("Invalid {key}"))),
        Err(_) => Ok(default),
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| TrackerError::Config(format!("Missing env var: {key}")))
}
