use crate::{ApiFailure, Auth, AuthlessClient, Endpoint};
use async_trait::async_trait;
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    pub id: String,
    #[serde(default)]
    pub zone_id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub content: String,
    #[serde(default)]
    pub proxied: bool,
    #[serde(default)]
    pub ttl: u32,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Full record document sent on create and on replace.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DnsRecordParams {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub content: String,
    pub ttl: u32,
    pub proxied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DeletedRecord {
    pub id: String,
}

/// Every record in the zone when `name` is unset.
pub struct ListDnsRecords<'a> {
    pub zone_identifier: &'a str,
    pub name: Option<&'a str>,
}

impl Endpoint<Vec<DnsRecord>> for ListDnsRecords<'_> {
    fn method(&self) -> Method {
        Method::GET
    }

    fn path(&self) -> String {
        format!("zones/{}/dns_records", self.zone_identifier)
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        match self.name {
            Some(name) => vec![("name", name.to_owned())],
            None => Vec::new(),
        }
    }
}

pub struct CreateDnsRecord<'a> {
    pub zone_identifier: &'a str,
    pub params: &'a DnsRecordParams,
}

impl Endpoint<DnsRecord> for CreateDnsRecord<'_> {
    fn method(&self) -> Method {
        Method::POST
    }

    fn path(&self) -> String {
        format!("zones/{}/dns_records", self.zone_identifier)
    }

    fn body(&self) -> Option<Value> {
        Some(json!(self.params))
    }
}

pub struct UpdateDnsRecord<'a> {
    pub zone_identifier: &'a str,
    pub identifier: &'a str,
    pub params: &'a DnsRecordParams,
}

impl Endpoint<DnsRecord> for UpdateDnsRecord<'_> {
    fn method(&self) -> Method {
        Method::PUT
    }

    fn path(&self) -> String {
        format!(
            "zones/{}/dns_records/{}",
            self.zone_identifier, self.identifier
        )
    }

    fn body(&self) -> Option<Value> {
        Some(json!(self.params))
    }
}

pub struct DeleteDnsRecord<'a> {
    pub zone_identifier: &'a str,
    pub identifier: &'a str,
}

impl Endpoint<DeletedRecord> for DeleteDnsRecord<'_> {
    fn method(&self) -> Method {
        Method::DELETE
    }

    fn path(&self) -> String {
        format!(
            "zones/{}/dns_records/{}",
            self.zone_identifier, self.identifier
        )
    }
}

#[async_trait]
pub trait CloudflareDns: Send + Sync {
    async fn list_dns_records(
        &self,
        auth: &Auth,
        zone_id: &str,
        name: Option<&str>,
    ) -> Result<Vec<DnsRecord>, ApiFailure>;
    async fn create_dns_record(
        &self,
        auth: &Auth,
        zone_id: &str,
        params: &DnsRecordParams,
    ) -> Result<DnsRecord, ApiFailure>;
    async fn update_dns_record(
        &self,
        auth: &Auth,
        zone_id: &str,
        record_id: &str,
        params: &DnsRecordParams,
    ) -> Result<DnsRecord, ApiFailure>;
    async fn delete_dns_record(
        &self,
        auth: &Auth,
        zone_id: &str,
        record_id: &str,
    ) -> Result<DeletedRecord, ApiFailure>;
}

#[async_trait]
impl CloudflareDns for AuthlessClient {
    async fn list_dns_records(
        &self,
        auth: &Auth,
        zone_id: &str,
        name: Option<&str>,
    ) -> Result<Vec<DnsRecord>, ApiFailure> {
        let endpoint = ListDnsRecords {
            zone_identifier: zone_id,
            name,
        };

        let res = self.request(&auth.credentials, &endpoint).await?;
        Ok(res.result)
    }

    async fn create_dns_record(
        &self,
        auth: &Auth,
        zone_id: &str,
        params: &DnsRecordParams,
    ) -> Result<DnsRecord, ApiFailure> {
        let endpoint = CreateDnsRecord {
            zone_identifier: zone_id,
            params,
        };

        let res = self.request(&auth.credentials, &endpoint).await?;
        Ok(res.result)
    }

    async fn update_dns_record(
        &self,
        auth: &Auth,
        zone_id: &str,
        record_id: &str,
        params: &DnsRecordParams,
    ) -> Result<DnsRecord, ApiFailure> {
        let endpoint = UpdateDnsRecord {
            zone_identifier: zone_id,
            identifier: record_id,
            params,
        };

        let res = self.request(&auth.credentials, &endpoint).await?;
        Ok(res.result)
    }

    async fn delete_dns_record(
        &self,
        auth: &Auth,
        zone_id: &str,
        record_id: &str,
    ) -> Result<DeletedRecord, ApiFailure> {
        let endpoint = DeleteDnsRecord {
            zone_identifier: zone_id,
            identifier: record_id,
        };

        let res = self.request(&auth.credentials, &endpoint).await?;
        Ok(res.result)
    }
}
