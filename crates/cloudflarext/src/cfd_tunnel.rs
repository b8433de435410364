use crate::{ApiFailure, Auth, AuthlessClient, Endpoint};
use async_trait::async_trait;
use http::Method;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

pub const CATCH_ALL_SERVICE: &str = "http_status:404";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigurationSrc {
    Local,
    Cloudflare,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Tunnel {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub account_tag: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub deleted_at: Option<String>,
}

/// One routing entry of a remotely managed tunnel. Structural equality is the
/// comparison used when diffing configurations; empty strings and empty
/// `originRequest` objects read back from the API count as absent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IngressRule {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_string_as_none"
    )]
    pub hostname: Option<String>,
    pub service: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_string_as_none"
    )]
    pub path: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_map_as_none"
    )]
    pub origin_request: Option<Map<String, Value>>,
}

impl IngressRule {
    pub fn new(hostname: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            hostname: Some(hostname.into()),
            service: service.into(),
            path: None,
            origin_request: None,
        }
    }

    pub fn catch_all() -> Self {
        Self {
            hostname: None,
            service: CATCH_ALL_SERVICE.to_owned(),
            path: None,
            origin_request: None,
        }
    }

    pub fn is_catch_all(&self) -> bool {
        *self == Self::catch_all()
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

fn empty_map_as_none<'de, D>(deserializer: D) -> Result<Option<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Map<String, Value>>::deserialize(deserializer)?;
    Ok(value.filter(|map| !map.is_empty()))
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TunnelConfiguration {
    #[serde(default)]
    pub ingress: Vec<IngressRule>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TunnelConfigurationResult {
    #[serde(default)]
    pub tunnel_id: Option<Uuid>,
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub config: Option<TunnelConfiguration>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct TunnelToken(pub String);

impl From<TunnelToken> for String {
    fn from(token: TunnelToken) -> String {
        token.0
    }
}

pub struct ListTunnels<'a> {
    pub account_identifier: &'a str,
    pub name: &'a str,
    pub is_deleted: bool,
}

impl Endpoint<Vec<Tunnel>> for ListTunnels<'_> {
    fn method(&self) -> Method {
        Method::GET
    }

    fn path(&self) -> String {
        format!("accounts/{}/cfd_tunnel", self.account_identifier)
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.to_owned()),
            ("is_deleted", self.is_deleted.to_string()),
        ]
    }
}

pub struct CreateTunnel<'a> {
    pub account_identifier: &'a str,
    pub name: &'a str,
    pub tunnel_secret: &'a str,
    pub config_src: ConfigurationSrc,
}

impl Endpoint<Tunnel> for CreateTunnel<'_> {
    fn method(&self) -> Method {
        Method::POST
    }

    fn path(&self) -> String {
        format!("accounts/{}/cfd_tunnel", self.account_identifier)
    }

    fn body(&self) -> Option<Value> {
        Some(json!({
            "name": self.name,
            "tunnel_secret": self.tunnel_secret,
            "config_src": self.config_src,
        }))
    }
}

pub struct DeleteTunnel<'a> {
    pub account_identifier: &'a str,
    pub tunnel_id: Uuid,
}

impl Endpoint<Tunnel> for DeleteTunnel<'_> {
    fn method(&self) -> Method {
        Method::DELETE
    }

    fn path(&self) -> String {
        format!(
            "accounts/{}/cfd_tunnel/{}",
            self.account_identifier, self.tunnel_id
        )
    }
}

pub struct GetTunnelToken<'a> {
    pub account_identifier: &'a str,
    pub tunnel_id: Uuid,
}

impl Endpoint<TunnelToken> for GetTunnelToken<'_> {
    fn method(&self) -> Method {
        Method::GET
    }

    fn path(&self) -> String {
        format!(
            "accounts/{}/cfd_tunnel/{}/token",
            self.account_identifier, self.tunnel_id
        )
    }
}

pub struct GetConfiguration<'a> {
    pub account_identifier: &'a str,
    pub tunnel_id: Uuid,
}

impl Endpoint<TunnelConfigurationResult> for GetConfiguration<'_> {
    fn method(&self) -> Method {
        Method::GET
    }

    fn path(&self) -> String {
        format!(
            "accounts/{}/cfd_tunnel/{}/configurations",
            self.account_identifier, self.tunnel_id
        )
    }
}

pub struct UpdateConfiguration<'a> {
    pub account_identifier: &'a str,
    pub tunnel_id: Uuid,
    pub config: &'a TunnelConfiguration,
}

impl Endpoint<TunnelConfigurationResult> for UpdateConfiguration<'_> {
    fn method(&self) -> Method {
        Method::PUT
    }

    fn path(&self) -> String {
        format!(
            "accounts/{}/cfd_tunnel/{}/configurations",
            self.account_identifier, self.tunnel_id
        )
    }

    fn body(&self) -> Option<Value> {
        Some(json!({ "config": self.config }))
    }
}

#[async_trait]
pub trait CloudflaredTunnel: Send + Sync {
    async fn list_tunnels(&self, auth: &Auth, name: &str) -> Result<Vec<Tunnel>, ApiFailure>;
    async fn create_tunnel(
        &self,
        auth: &Auth,
        name: &str,
        tunnel_secret: &str,
        config_src: ConfigurationSrc,
    ) -> Result<Tunnel, ApiFailure>;
    async fn delete_tunnel(&self, auth: &Auth, tunnel_id: Uuid) -> Result<Tunnel, ApiFailure>;
    async fn get_tunnel_token(
        &self,
        auth: &Auth,
        tunnel_id: Uuid,
    ) -> Result<TunnelToken, ApiFailure>;
    async fn get_configuration(
        &self,
        auth: &Auth,
        tunnel_id: Uuid,
    ) -> Result<TunnelConfigurationResult, ApiFailure>;
    async fn update_configuration(
        &self,
        auth: &Auth,
        tunnel_id: Uuid,
        config: TunnelConfiguration,
    ) -> Result<TunnelConfigurationResult, ApiFailure>;
}

#[async_trait]
impl CloudflaredTunnel for AuthlessClient {
    async fn list_tunnels(&self, auth: &Auth, name: &str) -> Result<Vec<Tunnel>, ApiFailure> {
        let endpoint = ListTunnels {
            account_identifier: &auth.account_id,
            name,
            is_deleted: false,
        };

        let res = self.request(&auth.credentials, &endpoint).await?;
        Ok(res.result)
    }

    async fn create_tunnel(
        &self,
        auth: &Auth,
        name: &str,
        tunnel_secret: &str,
        config_src: ConfigurationSrc,
    ) -> Result<Tunnel, ApiFailure> {
        let endpoint = CreateTunnel {
            account_identifier: &auth.account_id,
            name,
            tunnel_secret,
            config_src,
        };

        let res = self.request(&auth.credentials, &endpoint).await?;
        Ok(res.result)
    }

    async fn delete_tunnel(&self, auth: &Auth, tunnel_id: Uuid) -> Result<Tunnel, ApiFailure> {
        let endpoint = DeleteTunnel {
            account_identifier: &auth.account_id,
            tunnel_id,
        };

        let res = self.request(&auth.credentials, &endpoint).await?;
        Ok(res.result)
    }

    async fn get_tunnel_token(
        &self,
        auth: &Auth,
        tunnel_id: Uuid,
    ) -> Result<TunnelToken, ApiFailure> {
        let endpoint = GetTunnelToken {
            account_identifier: &auth.account_id,
            tunnel_id,
        };

        let res = self
            .request::<TunnelToken>(&auth.credentials, &endpoint)
            .await?;
        Ok(res.result)
    }

    async fn get_configuration(
        &self,
        auth: &Auth,
        tunnel_id: Uuid,
    ) -> Result<TunnelConfigurationResult, ApiFailure> {
        let endpoint = GetConfiguration {
            account_identifier: &auth.account_id,
            tunnel_id,
        };

        let res = self.request(&auth.credentials, &endpoint).await?;
        Ok(res.result)
    }

    async fn update_configuration(
        &self,
        auth: &Auth,
        tunnel_id: Uuid,
        config: TunnelConfiguration,
    ) -> Result<TunnelConfigurationResult, ApiFailure> {
        let endpoint = UpdateConfiguration {
            account_identifier: &auth.account_id,
            tunnel_id,
            config: &config,
        };

        let res = self.request(&auth.credentials, &endpoint).await?;
        Ok(res.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_echo_of_empty_fields_matches_local_rule() {
        let remote: IngressRule = serde_json::from_value(json!({
            "hostname": "a.example.com",
            "service": "https://localhost:8000",
            "path": "",
            "originRequest": {}
        }))
        .unwrap();
        assert_eq!(
            remote,
            IngressRule::new("a.example.com", "https://localhost:8000")
        );
    }

    #[test]
    fn origin_request_key_order_is_irrelevant() {
        let left: IngressRule = serde_json::from_value(json!({
            "service": "http://localhost",
            "originRequest": {"noTLSVerify": true, "connectTimeout": 10}
        }))
        .unwrap();
        let right: IngressRule = serde_json::from_value(json!({
            "service": "http://localhost",
            "originRequest": {"connectTimeout": 10, "noTLSVerify": true}
        }))
        .unwrap();
        assert_eq!(left, right);
    }

    #[test]
    fn catch_all_serializes_service_only() {
        assert_eq!(
            serde_json::to_value(IngressRule::catch_all()).unwrap(),
            json!({"service": "http_status:404"})
        );
    }

    #[test]
    fn null_config_deserializes_to_none() {
        let result: TunnelConfigurationResult = serde_json::from_value(json!({
            "tunnel_id": "f70ff985-a4ef-4643-bbbc-4a0ed4fc8415",
            "version": 0,
            "config": null
        }))
        .unwrap();
        assert!(result.config.is_none());
    }
}
