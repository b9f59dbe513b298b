use crate::store::sigv4::Signer;
use crate::store::traits::{Destination, InputLogEvent, LogStore, SequenceToken, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const TARGET_PREFIX: &str = "Logs_20140328";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Client for a CloudWatch-Logs compatible endpoint speaking the JSON 1.1
/// protocol. Without a [`Signer`] requests go out unsigned, which suits a
/// signing proxy or an emulator.
#[derive(Debug)]
pub struct HttpLogStore {
    client: reqwest::Client,
    endpoint: Url,
    signer: Option<Signer>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
    log_events: &'a [InputLogEvent],
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence_token: Option<&'a SequenceToken>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsResponse {
    next_sequence_token: Option<SequenceToken>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLogStreamRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLogGroupRequest<'a> {
    log_group_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PutRetentionPolicyRequest<'a> {
    log_group_name: &'a str,
    retention_in_days: u32,
}

#[derive(Deserialize, Default)]
struct EmptyResponse {}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(rename = "__type")]
    kind: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
    expected_sequence_token: Option<SequenceToken>,
}

impl HttpLogStore {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, StoreError> {
        let endpoint = Url::parse(endpoint).map_err(|e| StoreError::Service {
            code: "InvalidEndpoint".to_string(),
            message: format!("'{}': {}", endpoint, e),
        })?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            signer: None,
        })
    }

    /// Sign every request with `signer`.
    pub fn with_signer(mut self, signer: Signer) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn call<Req, Resp>(&self, operation: &str, request: &Req) -> Result<Resp, StoreError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned + Default,
    {
        let body = serde_json::to_vec(request).map_err(|e| StoreError::Service {
            code: "SerializationException".to_string(),
            message: e.to_string(),
        })?;

        let target = format!("{}.{}", TARGET_PREFIX, operation);
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .header("X-Amz-Target", &target);

        if let Some(signer) = &self.signer {
            let headers = [("content-type", CONTENT_TYPE), ("x-amz-target", target.as_str())];
            for (name, value) in signer.sign("POST", &self.endpoint, &headers, &body, Utc::now()) {
                request = request.header(name, value);
            }
        }

        let response = request.body(body).send().await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        debug!(operation, status = status.as_u16(), "Log store responded");

        if !status.is_success() {
            return Err(error_from_response(status, &bytes));
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Resp::default());
        }
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Service {
            code: "SerializationException".to_string(),
            message: format!("invalid {} response: {}", operation, e),
        })
    }
}

/// Map an error response onto the store error categories. The error code may
/// come namespaced (`com.amazonaws.logs#ThrottlingException`).
pub fn error_from_response(status: StatusCode, body: &[u8]) -> StoreError {
    let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
    let message = parsed
        .message
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());
    let code = parsed
        .kind
        .as_deref()
        .map(|kind| kind.rsplit('#').next().unwrap_or(kind).to_string())
        .unwrap_or_else(|| format!("HTTP{}", status.as_u16()));

    match code.as_str() {
        "ResourceNotFoundException" => StoreError::ResourceNotFound(message),
        "ResourceAlreadyExistsException" => StoreError::ResourceAlreadyExists(message),
        "InvalidSequenceTokenException" => StoreError::InvalidSequenceToken {
            message,
            expected: parsed.expected_sequence_token,
        },
        "DataAlreadyAcceptedException" => StoreError::DataAlreadyAccepted {
            message,
            expected: parsed.expected_sequence_token,
        },
        "ThrottlingException" => StoreError::Throttled(message),
        _ => StoreError::Service { code, message },
    }
}

#[async_trait]
impl LogStore for HttpLogStore {
    async fn put_log_events(
        &self,
        destination: &Destination,
        token: Option<&SequenceToken>,
        events: &[InputLogEvent],
    ) -> Result<Option<SequenceToken>, StoreError> {
        let request = PutLogEventsRequest {
            log_group_name: &destination.group,
            log_stream_name: &destination.stream,
            log_events: events,
            sequence_token: token,
        };
        let response: PutLogEventsResponse = self.call("PutLogEvents", &request).await?;
        Ok(response.next_sequence_token)
    }

    async fn create_log_stream(&self, destination: &Destination) -> Result<(), StoreError> {
        let request = CreateLogStreamRequest {
            log_group_name: &destination.group,
            log_stream_name: &destination.stream,
        };
        let _: EmptyResponse = self.call("CreateLogStream", &request).await?;
        Ok(())
    }

    async fn create_log_group(&self, group: &str) -> Result<(), StoreError> {
        let request = CreateLogGroupRequest {
            log_group_name: group,
        };
        let _: EmptyResponse = self.call("CreateLogGroup", &request).await?;
        Ok(())
    }

    async fn put_retention_policy(&self, group: &str, days: u32) -> Result<(), StoreError> {
        let request = PutRetentionPolicyRequest {
            log_group_name: group,
            retention_in_days: days,
        };
        let _: EmptyResponse = self.call("PutRetentionPolicy", &request).await?;
        Ok(())
    }
}
