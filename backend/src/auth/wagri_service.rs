use async_trait::async_trait;
use reqwest::Client as HttpClient;
use url::Url;

use super::models::Credential;
use crate::error::RelayError;

/// Source of bearer credentials for authenticated classifiers.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Fetches a fresh credential. Nothing is cached between calls.
    async fn acquire(&self) -> Result<Credential, RelayError>;
}

/// Client-credentials grant against the WAGRI token endpoint.
#[derive(Clone)]
pub struct WagriTokenService {
    http_client: HttpClient,
    token_url: Url,
    client_id: String,
    client_secret: String,
}

impl WagriTokenService {
    pub fn new(http_client: HttpClient, token_url: Url, client_id: String, client_secret: String) -> Self {
        Self {
            http_client,
            token_url,
            client_id,
            client_secret,
        }
    }

    fn grant_params(&self) -> [(&'static str, &str); 3] {
        [
            ("grant_type", "client_credentials"),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ]
    }
}

#[async_trait]
impl CredentialProvider for WagriTokenService {
    async fn acquire(&self) -> Result<Credential, RelayError> {
        let response = self
            .http_client
            .post(self.token_url.clone())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(&self.grant_params())
            .send()
            .await
            .map_err(|e| RelayError::AuthFailure(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RelayError::AuthFailure(format!(
                "token request returned {}: {}",
                status, error_text
            )));
        }

        let credential: Credential = response
            .json()
            .await
            .map_err(|e| RelayError::AuthFailure(e.to_string()))?;
        log::debug!(
            "Acquired {} token valid for {}s",
            credential.token_type,
            credential.expires_in
        );
        Ok(credential)
    }
}
