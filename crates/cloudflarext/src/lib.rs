use http::header::{HeaderMap, HeaderValue, InvalidHeaderValue};
use std::fmt;
use std::time::Duration;
use url::Url;

pub mod cfd_tunnel;
pub mod dns;
pub mod endpoint;
pub mod response;
pub mod zones;

pub use endpoint::Endpoint;
pub use response::{ApiError, ApiErrors, ApiFailure, ApiResponse, ApiResult, ApiSuccess};

const PRODUCTION_API: &str = "https://api.cloudflare.com/client/v4/";

#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    UserAuthKey { email: String, key: String },
    UserAuthToken { token: String },
    Service { key: String },
}

// Keeps secrets out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::UserAuthKey { email, .. } => f
                .debug_struct("UserAuthKey")
                .field("email", email)
                .field("key", &"<redacted>")
                .finish(),
            Credentials::UserAuthToken { .. } => f
                .debug_struct("UserAuthToken")
                .field("token", &"<redacted>")
                .finish(),
            Credentials::Service { .. } => f
                .debug_struct("Service")
                .field("key", &"<redacted>")
                .finish(),
        }
    }
}

trait CredentialsExt {
    fn header_map(&self) -> Result<HeaderMap, InvalidHeaderValue>;
}

impl CredentialsExt for Credentials {
    fn header_map(&self) -> Result<HeaderMap, InvalidHeaderValue> {
        let sensitive = |value: &str| {
            HeaderValue::from_str(value).map(|mut value| {
                value.set_sensitive(true);
                value
            })
        };

        let mut headers = HeaderMap::new();
        match self {
            Credentials::UserAuthKey { email, key } => {
                headers.insert("X-Auth-Email", HeaderValue::from_str(email)?);
                headers.insert("X-Auth-Key", sensitive(key)?);
            }
            Credentials::Service { key } => {
                headers.insert("X-Auth-User-Service-Key", sensitive(key)?);
            }
            Credentials::UserAuthToken { token } => {
                headers.insert(
                    http::header::AUTHORIZATION,
                    sensitive(format!("Bearer {}", token).as_str())?,
                );
            }
        };

        Ok(headers)
    }
}

/// Resolved account context handed to every call against the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Auth {
    pub account_id: String,
    pub credentials: Credentials,
}

impl Auth {
    pub fn new(account_id: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            account_id: account_id.into(),
            credentials,
        }
    }

    pub fn with_token(account_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self::new(
            account_id,
            Credentials::UserAuthToken {
                token: token.into(),
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Production,
    Custom(Url),
}

impl Environment {
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        match self {
            Environment::Production => Url::parse(PRODUCTION_API),
            Environment::Custom(url) if url.path().ends_with('/') => Ok(url.clone()),
            Environment::Custom(url) => Url::parse(&format!("{}/", url.as_str())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpApiClientConfig {
    pub http_timeout: Duration,
    pub default_headers: HeaderMap,
}

impl Default for HttpApiClientConfig {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(30),
            default_headers: HeaderMap::default(),
        }
    }
}

/// HTTP client for the v4 API. Credentials travel with each request rather
/// than living in the client.
pub struct AuthlessClient {
    environment: Environment,
    http_client: reqwest::Client,
}

impl AuthlessClient {
    pub fn try_new(
        config: HttpApiClientConfig,
        environment: Environment,
    ) -> Result<AuthlessClient, ApiFailure> {
        let http_client = reqwest::Client::builder()
            .default_headers(config.default_headers)
            .timeout(config.http_timeout)
            .user_agent(concat!("cftunnel/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(AuthlessClient {
            environment,
            http_client,
        })
    }

    pub async fn request<ResultType>(
        &self,
        credentials: &Credentials,
        endpoint: &(dyn Endpoint<ResultType> + Send + Sync),
    ) -> ApiResponse<ResultType>
    where
        ResultType: ApiResult,
    {
        let url = endpoint.url(&self.environment)?;
        let mut request = self.http_client.request(endpoint.method(), url);

        let query = endpoint.query();
        if !query.is_empty() {
            request = request.query(&query);
        }

        if let Some(body) = endpoint.body() {
            request = request.json(&body);
        }

        let response = request.headers(credentials.header_map()?).send().await?;
        response::map_api_response(response).await
    }
}
