pub mod client;
pub mod payload;

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use shared::DiagnosisResult;

use crate::auth::models::Credential;
use crate::auth::wagri_service::CredentialProvider;
use crate::endpoints::{AuthMode, EndpointDescriptor};
use crate::error::RelayError;
use crate::formatter::format_results;
use crate::upload::LeafImage;
use client::{ClassifierClient, ClassifierOutcome};
use payload::DiagnosisRequest;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
    /// Pause after a completed batch before the response goes out.
    pub cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            backoff_min: Duration::from_secs(1),
            backoff_max: Duration::from_secs(11),
            cooldown: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    fn backoff_interval(&self) -> Duration {
        let min = self.backoff_min.as_millis() as u64;
        let max = (self.backoff_max.as_millis() as u64).max(min);
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

/// Identity sent in the payload and asset id of every request.
#[derive(Debug, Clone)]
pub struct AssetIdentity {
    pub id_prefix: String,
    pub user_id: String,
}

impl Default for AssetIdentity {
    fn default() -> Self {
        Self {
            id_prefix: "naro-pumpkin-system".into(),
            user_id: "naro-pumpkin-system".into(),
        }
    }
}

/// What to do after a failed submission.
#[derive(Debug)]
pub enum Decision {
    Retry,
    BackOffThenRetry,
    ReauthenticateThenRetry,
    Abort(RelayError),
}

/// Per-image retry decision. `attempt` counts submissions of the current
/// image so far, starting at 1.
pub fn decide(
    mode: AuthMode,
    attempt: u32,
    reauthenticated: bool,
    error: RelayError,
    max_retries: u32,
) -> Decision {
    if reauthenticated {
        // the submission after a re-authentication is the last one
        return Decision::Abort(error);
    }
    match (mode, error) {
        (AuthMode::None, RelayError::MalformedUpstreamResponse(msg)) => {
            Decision::Abort(RelayError::MalformedUpstreamResponse(msg))
        }
        (AuthMode::None, _) if attempt > max_retries => {
            Decision::Abort(RelayError::RetryLimitExceeded(max_retries))
        }
        (AuthMode::None, _) => Decision::Retry,
        (AuthMode::WagriBearer, RelayError::RateLimited) if attempt > max_retries => {
            Decision::Abort(RelayError::RetryLimitExceeded(max_retries))
        }
        (AuthMode::WagriBearer, RelayError::RateLimited) => Decision::BackOffThenRetry,
        (AuthMode::WagriBearer, RelayError::CredentialExpired) => Decision::ReauthenticateThenRetry,
        (AuthMode::WagriBearer, error) => Decision::Abort(error),
    }
}

/// Sends a batch of images, one at a time, to a single classifier endpoint.
#[derive(Clone)]
pub struct DiagnosisRelay {
    endpoint: EndpointDescriptor,
    client: Arc<dyn ClassifierClient>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    policy: RetryPolicy,
    identity: AssetIdentity,
}

impl DiagnosisRelay {
    pub fn new(endpoint: EndpointDescriptor, client: Arc<dyn ClassifierClient>, policy: RetryPolicy) -> Self {
        Self {
            endpoint,
            client,
            credentials: None,
            policy,
            identity: AssetIdentity::default(),
        }
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_identity(mut self, identity: AssetIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn endpoint(&self) -> &EndpointDescriptor {
        &self.endpoint
    }

    /// Diagnoses every image in order. Any fatal error discards the whole batch.
    pub async fn diagnose_batch(&self, images: &[LeafImage]) -> Result<Vec<DiagnosisResult>, RelayError> {
        let outcomes = self.query_batch(images).await?;
        let results = format_results(images, &outcomes, self.endpoint.parser)?;

        if !self.policy.cooldown.is_zero() {
            log::debug!("Cooling down for {:?} after batch", self.policy.cooldown);
            tokio::time::sleep(self.policy.cooldown).await;
        }
        Ok(results)
    }

    /// Collects the raw classifier outcome of every image, in input order.
    pub async fn query_batch(&self, images: &[LeafImage]) -> Result<Vec<ClassifierOutcome>, RelayError> {
        if images.is_empty() {
            return Err(RelayError::EmptyBatch);
        }
        log::info!(
            "Diagnosing {} image(s) with {}",
            images.len(),
            self.endpoint.kind
        );

        let mut credential = match self.endpoint.auth_mode {
            AuthMode::None => None,
            AuthMode::WagriBearer => Some(self.acquire_credential().await?),
        };

        let mut outcomes = Vec::with_capacity(images.len());
        for image in images {
            let outcome = self.submit_image(image, &mut credential).await?;
            log::info!("Classifier answered for {}", image.filename);
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn acquire_credential(&self) -> Result<Credential, RelayError> {
        let provider = self.credentials.as_ref().ok_or_else(|| {
            RelayError::AuthFailure(format!("no credential provider for {}", self.endpoint.kind))
        })?;
        provider.acquire().await
    }

    async fn submit_image(
        &self,
        image: &LeafImage,
        credential: &mut Option<Credential>,
    ) -> Result<ClassifierOutcome, RelayError> {
        let mode = self.endpoint.auth_mode;
        let user_id = match mode {
            AuthMode::None => None,
            AuthMode::WagriBearer => Some(self.identity.user_id.as_str()),
        };
        let mut attempt = 0;
        let mut reauthenticated = false;
        loop {
            attempt += 1;
            // every submission carries a fresh asset id
            let request =
                DiagnosisRequest::single_image(&self.identity.id_prefix, user_id, &image.filename, &image.bytes);
            let error = match self
                .client
                .submit(&self.endpoint, &request, credential.as_ref())
                .await
            {
                Ok(outcome) => return Ok(outcome),
                Err(error) => error,
            };
            log::debug!(
                "Attempt {} for {} failed: {} (transient: {})",
                attempt,
                image.filename,
                error,
                error.is_transient()
            );

            match decide(mode, attempt, reauthenticated, error, self.policy.max_retries) {
                Decision::Retry => {}
                Decision::BackOffThenRetry => {
                    let wait = self.policy.backoff_interval();
                    log::warn!(
                        "Classifier is rate limiting; retrying {} in {:?}",
                        image.filename,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                }
                Decision::ReauthenticateThenRetry => {
                    log::warn!("Access token rejected; re-authenticating once");
                    *credential = Some(self.acquire_credential().await?);
                    reauthenticated = true;
                }
                Decision::Abort(error) => {
                    log::error!("Giving up on {}: {}", image.filename, error);
                    return Err(error);
                }
            }
        }
    }
}
