//! Contract verification lookups against the Etherscan v2 API.

use alloy::primitives::Address;
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct AbiResponse {
    status: String,
    #[allow(dead_code)]
    message: Option<String>,
}

/// Checks whether a token's source is verified. Treats any transport or API
/// failure as "unknown" rather than unverified.
pub struct VerificationClient {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    chain_id: u64,
}

impl VerificationClient {
    pub fn new(api_url: String, api_key: Option<String>, chain_id: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url,
            api_key,
            chain_id,
        }
    }

    /// `Some(true)` when a verified ABI exists, `Some(false)` when the API
    /// says there is none, `None` when the lookup itself failed or no API
    /// key is configured.
    pub async fn is_verified(&self, contract: Address) -> Option<bool> {
        let api_key = self.api_key.as_deref()?;

        let chain_id = self.chain_id.to_string();
        let address = format!("{contract:?}");
        let response = self
            .http
            .get(&self.api_url)
            .query(&[
                ("chainid", chain_id.as_str()),
                ("module", "contract"),
                ("action", "getabi"),
                ("address", address.as_str()),
                ("apikey", api_key),
            ])
            .send()
            .await;

        match response {
            Ok(resp) => match resp.json::<AbiResponse>().await {
                Ok(body) => {
                    let verified = body.status == "1";
                    debug!(%contract, verified, "verification lookup");
                    Some(verified)
                }
                Err(e) => {
                    warn!(%contract, ?e, "verification response unreadable");
                    None
                }
            },
            Err(e) => {
                warn!(%contract, ?e, "verification request failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_one_means_verified() {
        let body: AbiResponse =
            serde_json::from_str(r#"{"status":"1","message":"OK","result":"[]"}"#).unwrap();
        assert_eq!(body.status, "1");

        let body: AbiResponse = serde_json::from_str(
            r#"{"status":"0","message":"NOTOK","result":"Contract source code not verified"}"#,
        )
        .unwrap();
        assert_eq!(body.status, "0");
    }

    #[tokio::test]
    async fn missing_api_key_yields_unknown() {
        let client = VerificationClient::new(
            "https://api.etherscan.io/v2/api".to_string(),
            None,
            8453,
        );
        let contract =
            Address::from_str("0x00000000000000000000000000000000000000aa").unwrap();
        assert_eq!(client.is_verified(contract).await, None);
    }
}
