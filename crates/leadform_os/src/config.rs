#![forbid(unsafe_code)]

use std::env;

use leadform_engines::identity::{IdentityConfig, DEFAULT_IDENTIFIER_KEY};
use leadform_kernel_contracts::{ContractViolation, Validate};

pub const ENV_IDENTIFIER_KEY: &str = "LEADFORM_IDENTIFIER_KEY";
pub const ENV_MAX_FIELD_LEN: &str = "LEADFORM_MAX_FIELD_LEN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadFormConfig {
    /// Query parameter and cookie name carrying the tracking id.
    pub identifier_key: String,
    pub max_field_len: usize,
    pub max_sinks: usize,
}

impl LeadFormConfig {
    pub fn mvp_v1() -> Self {
        Self {
            identifier_key: DEFAULT_IDENTIFIER_KEY.to_string(),
            max_field_len: 1_024,
            max_sinks: 16,
        }
    }

    pub fn from_env() -> Result<Self, ContractViolation> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// `mvp_v1()` with overrides pulled from `lookup`; unset or blank names keep the default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ContractViolation>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::mvp_v1();
        if let Some(key) = lookup(ENV_IDENTIFIER_KEY).filter(|v| !v.trim().is_empty()) {
            config.identifier_key = key.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_MAX_FIELD_LEN).filter(|v| !v.trim().is_empty()) {
            config.max_field_len = raw.trim().parse::<usize>().map_err(|_| {
                ContractViolation::InvalidValue {
                    field: "lead_form_config.max_field_len",
                    reason: "must be a positive integer",
                }
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn identity_config(&self) -> IdentityConfig {
        IdentityConfig {
            identifier_key: self.identifier_key.clone(),
        }
    }
}

impl Default for LeadFormConfig {
    fn default() -> Self {
        Self::mvp_v1()
    }
}

impl Validate for LeadFormConfig {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.identifier_key.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "lead_form_config.identifier_key",
                reason: "must not be empty",
            });
        }
        if self.max_field_len == 0 || self.max_field_len > 65_536 {
            return Err(ContractViolation::InvalidRange {
                field: "lead_form_config.max_field_len",
                min: 1.0,
                max: 65_536.0,
                got: self.max_field_len as f64,
            });
        }
        if self.max_sinks == 0 || self.max_sinks > 64 {
            return Err(ContractViolation::InvalidRange {
                field: "lead_form_config.max_sinks",
                min: 1.0,
                max: 64.0,
                got: self.max_sinks as f64,
            });
        }
        Ok(())
    }
}
