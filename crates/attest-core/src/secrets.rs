use anyhow::{anyhow, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "AttestWallet";
const SMART_PASS_KEY: &str = "smartpass_api_key";

/// SmartPass backend the bearer key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmartPassEnv {
    Production,
    Development,
}

impl SmartPassEnv {
    pub fn for_chain(chain_id: u64) -> Self {
        if crate::chains::has_real_value(chain_id) {
            Self::Production
        } else {
            Self::Development
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Production => "prod",
            Self::Development => "dev",
        }
    }

    fn env_var(self) -> &'static str {
        match self {
            Self::Production => "SMARTPASS_API_KEY",
            Self::Development => "SMARTPASS_DEV_API_KEY",
        }
    }
}

fn entry(env: SmartPassEnv) -> Result<Entry> {
    Entry::new(SERVICE_NAME, &format!("{}:{}", SMART_PASS_KEY, env.label()))
        .map_err(|e| anyhow!("keyring init: {e}"))
}

pub fn store_smart_pass_key(env: SmartPassEnv, key: &str) -> Result<()> {
    entry(env)?
        .set_password(key)
        .map_err(|e| anyhow!("store smartpass key: {e}"))?;
    Ok(())
}

/// Environment first, then the OS keyring.
pub fn get_smart_pass_key(env: SmartPassEnv) -> Result<String> {
    if let Ok(key) = std::env::var(env.env_var()) {
        if !key.is_empty() {
            return Ok(key);
        }
    }
    entry(env)?
        .get_password()
        .map_err(|e| anyhow!("load smartpass key: {e}"))
}
