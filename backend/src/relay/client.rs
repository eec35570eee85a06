use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde_json::Value;

use super::payload::DiagnosisRequest;
use crate::auth::models::Credential;
use crate::endpoints::EndpointDescriptor;
use crate::error::RelayError;

/// Raw classifier response for one image, parsed later by the endpoint's parser.
pub type ClassifierOutcome = Value;

#[async_trait]
pub trait ClassifierClient: Send + Sync {
    async fn submit(
        &self,
        endpoint: &EndpointDescriptor,
        request: &DiagnosisRequest,
        credential: Option<&Credential>,
    ) -> Result<ClassifierOutcome, RelayError>;
}

/// Fixed identity headers the WAGRI gateway expects next to the access token.
#[derive(Debug, Clone)]
pub struct VendorIdentity {
    pub vendor_id: String,
    pub user_id: String,
}

#[derive(Clone)]
pub struct HttpClassifierClient {
    http_client: HttpClient,
    vendor: Option<VendorIdentity>,
}

impl HttpClassifierClient {
    pub fn new(http_client: HttpClient, vendor: Option<VendorIdentity>) -> Self {
        Self {
            http_client,
            vendor,
        }
    }
}

pub fn classify_status(status: StatusCode, body: &str) -> RelayError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => RelayError::RateLimited,
        StatusCode::UNAUTHORIZED => RelayError::CredentialExpired,
        _ => RelayError::OtherClassifierFailure(format!("classifier returned {}: {}", status, body)),
    }
}

#[async_trait]
impl ClassifierClient for HttpClassifierClient {
    async fn submit(
        &self,
        endpoint: &EndpointDescriptor,
        request: &DiagnosisRequest,
        credential: Option<&Credential>,
    ) -> Result<ClassifierOutcome, RelayError> {
        let mut builder = self.http_client.post(endpoint.url.clone()).json(request);
        if let Some(credential) = credential {
            builder = builder.header("X-Authorization", &credential.access_token);
            if let Some(vendor) = &self.vendor {
                builder = builder
                    .header("X-User-Id", &vendor.user_id)
                    .header("Authorization", &vendor.vendor_id);
            }
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RelayError::OtherClassifierFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| RelayError::MalformedUpstreamResponse(e.to_string()))
    }
}
