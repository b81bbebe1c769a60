use async_trait::async_trait;
use serde::Serialize;
use tcc_core::{CoordinatorError, Participant, ParticipantResult, Phase};

/// A [`Participant`] reached over HTTP: issues `POST {base_url}/try|confirm|cancel` with a
/// JSON body `{"transactionId": tx_id}`.
///
/// Connection failures, timeouts, and 5xx responses are classified as retryable
/// [`CoordinatorError::ParticipantExecutionError`]; 4xx responses are a terminal business
/// rejection of the operation, same as a participant synchronously refusing a `Try`.
pub struct HttpParticipant {
    id: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OpBody {
    #[serde(rename = "transactionId")]
    transaction_id: u64,
}

impl HttpParticipant {
    /// Build an HTTP participant identified by `id`, issuing requests against `base_url`.
    pub fn new(id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Build an HTTP participant with a caller-supplied `reqwest::Client` (e.g. to share
    /// connection pools or apply custom timeouts across participants).
    pub fn with_client(id: impl Into<String>, base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            client,
        }
    }

    async fn call(&self, phase: Phase, tx_id: u64) -> ParticipantResult {
        let path = match phase {
            Phase::Try => "try",
            Phase::Confirm => "confirm",
            Phase::Cancel => "cancel",
        };
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);

        let response = self
            .client
            .post(&url)
            .json(&OpBody { transaction_id: tx_id })
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    Ok(())
                } else if status.is_client_error() {
                    Err(CoordinatorError::ParticipantExecutionError {
                        phase,
                        participant_id: self.id.clone(),
                        source: Box::new(StatusError(status.as_u16())),
                        retryable: false,
                    })
                } else {
                    Err(CoordinatorError::ParticipantExecutionError {
                        phase,
                        participant_id: self.id.clone(),
                        source: Box::new(StatusError(status.as_u16())),
                        retryable: true,
                    })
                }
            }
            Err(err) => Err(CoordinatorError::ParticipantExecutionError {
                phase,
                participant_id: self.id.clone(),
                source: Box::new(err),
                retryable: true,
            }),
        }
    }
}

#[derive(Debug)]
struct StatusError(u16);

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unexpected HTTP status {}", self.0)
    }
}

impl std::error::Error for StatusError {}

#[async_trait]
impl Participant for HttpParticipant {
    fn id(&self) -> &str {
        &self.id
    }

    async fn try_op(&self, tx_id: u64) -> ParticipantResult {
        self.call(Phase::Try, tx_id).await
    }

    async fn confirm(&self, tx_id: u64) -> ParticipantResult {
        self.call(Phase::Confirm, tx_id).await
    }

    async fn cancel(&self, tx_id: u64) -> ParticipantResult {
        self.call(Phase::Cancel, tx_id).await
    }
}
