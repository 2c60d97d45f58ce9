//! Tells the SmartPass backend a pass has been installed in the wallet.

use attest_core::secrets::{get_smart_pass_key, SmartPassEnv};
use attest_core::settings::SmartPassSettings;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

const PAYLOAD_PARAMS: &[&str] = &["ticket", "attestation"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SmartPassReturn {
    ImportSuccess,
    AlreadyImported,
    ImportFailed,
    NoConnection,
}

impl SmartPassReturn {
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        if status.is_success() {
            Self::ImportSuccess
        } else if status.is_client_error() {
            Self::AlreadyImported
        } else {
            Self::ImportFailed
        }
    }
}

fn param_from_pairs(url: &Url) -> Option<String> {
    PAYLOAD_PARAMS.iter().find_map(|wanted| {
        url.query_pairs()
            .find(|(name, value)| name == wanted && !value.is_empty())
            .map(|(_, value)| value.into_owned())
    })
}

/// The signed pass as it appeared in the origin link: the `ticket` or
/// `attestation` parameter from the query or fragment. A link without either
/// is returned as is.
pub fn extract_raw_attestation(link: &str) -> String {
    let link = link.trim();
    if let Ok(url) = Url::parse(link) {
        if let Some(value) = param_from_pairs(&url) {
            return value;
        }
        if let Some(fragment) = url.fragment() {
            let as_query = Url::parse(&format!("http://fragment.invalid/?{fragment}"));
            if let Some(value) = as_query.ok().as_ref().and_then(param_from_pairs) {
                return value;
            }
        }
    }
    link.to_string()
}

pub struct SmartPassNotifier {
    client: reqwest::Client,
    settings: SmartPassSettings,
    production_key: Option<String>,
    development_key: Option<String>,
}

impl SmartPassNotifier {
    pub fn new(
        settings: SmartPassSettings,
        production_key: Option<String>,
        development_key: Option<String>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("attest-service/0.1")
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            settings,
            production_key,
            development_key,
        })
    }

    /// Keys from the environment or keyring; a missing key is sent without auth.
    pub fn from_settings(settings: SmartPassSettings) -> anyhow::Result<Self> {
        let load = |env| match get_smart_pass_key(env) {
            Ok(key) => Some(key),
            Err(err) => {
                warn!(error = %err, ?env, "smartpass key unavailable");
                None
            }
        };
        let production = load(SmartPassEnv::Production);
        let development = load(SmartPassEnv::Development);
        Self::new(settings, production, development)
    }

    fn endpoint(&self, chain_id: u64) -> (&str, Option<&str>) {
        match SmartPassEnv::for_chain(chain_id) {
            SmartPassEnv::Production => {
                (&self.settings.production_url, self.production_key.as_deref())
            }
            SmartPassEnv::Development => {
                (&self.settings.development_url, self.development_key.as_deref())
            }
        }
    }

    pub async fn notify(&self, chain_id: u64, origin_link: &str) -> SmartPassReturn {
        let raw = extract_raw_attestation(origin_link);
        if raw.is_empty() {
            return SmartPassReturn::ImportFailed;
        }
        let (url, key) = self.endpoint(chain_id);
        let mut request = self.client.put(url).json(&serde_json::json!({
            "signedToken": raw,
            "installedPassedInAw": 1,
        }));
        if let Some(key) = key {
            request = request.bearer_auth(key);
        }
        let outcome = match request.send().await {
            Ok(res) => SmartPassReturn::from_status(res.status()),
            Err(err) => {
                warn!(error = %err, url, "smartpass call failed");
                SmartPassReturn::NoConnection
            }
        };
        info!(chain_id, ?outcome, "smartpass notified");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn status_classes_map_to_outcomes() {
        assert_eq!(SmartPassReturn::from_status(StatusCode::CREATED), SmartPassReturn::ImportSuccess);
        assert_eq!(SmartPassReturn::from_status(StatusCode::CONFLICT), SmartPassReturn::AlreadyImported);
        assert_eq!(SmartPassReturn::from_status(StatusCode::BAD_GATEWAY), SmartPassReturn::ImportFailed);
        assert_eq!(SmartPassReturn::from_status(StatusCode::MOVED_PERMANENTLY), SmartPassReturn::ImportFailed);
    }

    #[test]
    fn raw_payload_from_query() {
        assert_eq!(
            extract_raw_attestation("https://pass.example/?ticket=eNpj%2BA&secret=1"),
            "eNpj+A"
        );
        assert_eq!(
            extract_raw_attestation("https://pass.example/?attestation=abc"),
            "abc"
        );
    }

    #[test]
    fn raw_payload_from_fragment() {
        assert_eq!(
            extract_raw_attestation("https://pass.example/#attestation=xyz&id=1"),
            "xyz"
        );
    }

    #[test]
    fn link_without_params_is_returned_whole() {
        assert_eq!(extract_raw_attestation(" eNpjYA "), "eNpjYA");
        assert_eq!(extract_raw_attestation(""), "");
    }
}
