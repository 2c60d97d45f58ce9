use crate::chains::{ARBITRUM_MAIN_ID, MAINNET_ID, SEPOLIA_TESTNET_ID};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const SMART_PASS_PROD_URL: &str =
    "https://backend.smartlayer.network/passes/pass-installed-in-aw";
pub const SMART_PASS_DEV_URL: &str =
    "https://d2a5tt41o5qmyt.cloudfront.net/passes/pass-installed-in-aw";

const RPC_ENV_PREFIX: &str = "ATTEST_RPC_";
const WALLET_ENV: &str = "ATTEST_WALLET";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartPassSettings {
    pub production_url: String,
    pub development_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    20
}

impl Default for SmartPassSettings {
    fn default() -> Self {
        Self {
            production_url: SMART_PASS_PROD_URL.into(),
            development_url: SMART_PASS_DEV_URL.into(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSettings {
    /// Address of the active wallet; attestations must be addressed to it.
    #[serde(default)]
    pub wallet_address: String,
    #[serde(default)]
    pub rpc_urls: BTreeMap<u64, String>,
    #[serde(default)]
    pub smart_pass: SmartPassSettings,
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    #[serde(default)]
    pub definitions_dir: Option<PathBuf>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        let mut rpc_urls = BTreeMap::new();
        rpc_urls.insert(MAINNET_ID, "https://ethereum-rpc.publicnode.com".to_string());
        rpc_urls.insert(
            ARBITRUM_MAIN_ID,
            "https://arbitrum-one-rpc.publicnode.com".to_string(),
        );
        rpc_urls.insert(
            SEPOLIA_TESTNET_ID,
            "https://ethereum-sepolia-rpc.publicnode.com".to_string(),
        );
        Self {
            wallet_address: String::new(),
            rpc_urls,
            smart_pass: SmartPassSettings::default(),
            store_path: None,
            definitions_dir: None,
        }
    }
}

impl ImportSettings {
    /// Settings file if present, defaults otherwise, then environment overrides.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut settings = if path.exists() {
            let data = std::fs::read(path)?;
            serde_json::from_slice(&data)?
        } else {
            debug!(path = %path.display(), "no settings file, using defaults");
            Self::default()
        };
        settings.apply_overrides(std::env::vars());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn apply_overrides(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        for (name, value) in vars {
            if name == WALLET_ENV {
                self.wallet_address = value;
            } else if let Some(chain) = name.strip_prefix(RPC_ENV_PREFIX) {
                if let Ok(chain_id) = chain.parse::<u64>() {
                    self.rpc_urls.insert(chain_id, value);
                }
            }
        }
    }
}
