use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

pub trait ApiResult: DeserializeOwned + fmt::Debug + Send {}

impl<T> ApiResult for T where T: DeserializeOwned + fmt::Debug + Send {}

#[derive(Debug)]
pub struct ApiSuccess<ResultType> {
    pub result: ResultType,
    pub result_info: Option<serde_json::Value>,
    pub messages: Vec<serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: u32,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiErrors {
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

impl fmt::Display for ApiErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "no error details");
        }

        let messages = self
            .errors
            .iter()
            .map(|err| format!("{}: {}", err.code, err.message))
            .collect::<Vec<_>>();
        write!(f, "{}", messages.join("; "))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiFailure {
    #[error("api returned {0}: {1}")]
    Error(StatusCode, ApiErrors),
    #[error("api response could not be parsed: {0}")]
    Invalid(#[source] serde_json::Error),
    #[error("request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("credentials are not a valid header value")]
    InvalidCredentials(#[from] http::header::InvalidHeaderValue),
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiFailure {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiFailure::Error(status, _) => Some(*status),
            ApiFailure::Reqwest(err) => err.status(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

pub type ApiResponse<ResultType> = Result<ApiSuccess<ResultType>, ApiFailure>;

#[derive(Deserialize)]
struct Envelope {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiError>,
    #[serde(default)]
    messages: Vec<serde_json::Value>,
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    result_info: Option<serde_json::Value>,
}

fn default_success() -> bool {
    true
}

// 2XX with `success: true` that parses is Success.
// 2XX that doesn't parse is Invalid.
// Anything else is Error, with the API errors when the body carried them.
pub(crate) async fn map_api_response<ResultType: ApiResult>(
    resp: reqwest::Response,
) -> ApiResponse<ResultType> {
    let status = resp.status();
    let body = resp.bytes().await?;
    parse_envelope(status, &body)
}

pub(crate) fn parse_envelope<ResultType: ApiResult>(
    status: StatusCode,
    body: &[u8],
) -> ApiResponse<ResultType> {
    if !status.is_success() {
        let errors: ApiErrors = serde_json::from_slice(body).unwrap_or_default();
        return Err(ApiFailure::Error(status, errors));
    }

    let envelope: Envelope = serde_json::from_slice(body).map_err(ApiFailure::Invalid)?;
    if !envelope.success {
        return Err(ApiFailure::Error(
            status,
            ApiErrors {
                errors: envelope.errors,
            },
        ));
    }

    let result = serde_json::from_value(envelope.result).map_err(ApiFailure::Invalid)?;
    Ok(ApiSuccess {
        result,
        result_info: envelope.result_info,
        messages: envelope.messages,
    })
}
