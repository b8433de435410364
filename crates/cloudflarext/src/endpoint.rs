use crate::{ApiResult, Environment};
use http::Method;
use url::Url;

/// A single route of the v4 API. The result type is what lives under the
/// envelope's `result` key.
pub trait Endpoint<ResultType: ApiResult> {
    fn method(&self) -> Method;

    /// Path relative to the API root, without a leading slash.
    fn path(&self) -> String;

    fn query(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn body(&self) -> Option<serde_json::Value> {
        None
    }

    fn url(&self, environment: &Environment) -> Result<Url, url::ParseError> {
        environment.base_url()?.join(&self.path())
    }
}
