use crate::dns::DnsRecordManager;
use crate::zone::{normalize_hostname, ZoneResolver};
use crate::{Context, Error};
use cloudflarext::dns::{CloudflareDns, DnsRecord, DnsRecordParams};
use cloudflarext::zones::CloudflareZones;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

pub const SUPPORTED_RECORD_TYPES: [&str; 4] = ["A", "AAAA", "CNAME", "TXT"];

const AUTOMATIC_TTL: u32 = 1;
const MIN_TTL: u32 = 60;
const MAX_TTL: u32 = 86400;

/// A record requested by hostname, outside of any tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSpec {
    pub hostname: String,
    pub record_type: String,
    pub content: String,
    pub ttl: u32,
    pub proxied: bool,
    pub comment: Option<String>,
}

impl RecordSpec {
    fn params(&self, hostname: String) -> Result<DnsRecordParams, Error> {
        let record_type = self.record_type.to_ascii_uppercase();
        if !SUPPORTED_RECORD_TYPES.contains(&record_type.as_str()) {
            return Err(Error::UnsupportedRecordType(self.record_type.clone()));
        }
        if self.ttl != AUTOMATIC_TTL && !(MIN_TTL..=MAX_TTL).contains(&self.ttl) {
            return Err(Error::InvalidTtl(self.ttl));
        }

        Ok(DnsRecordParams {
            name: hostname,
            record_type,
            content: self.content.clone(),
            ttl: self.ttl,
            proxied: self.proxied,
            comment: self.comment.clone().filter(|comment| !comment.is_empty()),
        })
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordAction {
    Created,
    Updated,
    Unchanged,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecordChange {
    pub action: RecordAction,
    pub record: DnsRecord,
}

fn record_matches(record: &DnsRecord, desired: &DnsRecordParams) -> bool {
    record.record_type.eq_ignore_ascii_case(&desired.record_type)
        && record.content == desired.content
        && record.ttl == desired.ttl
        && record.proxied == desired.proxied
}

/// Hostname addressed DNS operations: the owning zone is resolved for every
/// call.
pub struct DnsRecords<C> {
    zones: ZoneResolver<C>,
    dns: DnsRecordManager<C>,
}

impl<C: CloudflareDns + CloudflareZones> DnsRecords<C> {
    pub fn new(ctx: Arc<Context<C>>) -> Self {
        Self {
            zones: ZoneResolver::new(ctx.clone()),
            dns: DnsRecordManager::new(ctx),
        }
    }

    pub async fn get(&self, hostname: &str) -> Result<Option<DnsRecord>, Error> {
        let hostname = normalize_hostname(hostname)?;
        let zone = self.zones.resolve(&hostname).await?;
        self.dns.find(&zone.id, &hostname).await
    }

    /// All records of the zone `domain` belongs to.
    pub async fn list(&self, domain: &str) -> Result<Vec<DnsRecord>, Error> {
        let domain = normalize_hostname(domain)?;
        let zone = self.zones.resolve(&domain).await?;
        self.dns.list(&zone.id).await
    }

    /// Creates the record, or rewrites it in place when type, content, ttl or
    /// proxying differ from `spec`.
    pub async fn ensure(&self, spec: &RecordSpec) -> Result<RecordChange, Error> {
        let hostname = normalize_hostname(&spec.hostname)?;
        let desired = spec.params(hostname)?;
        let zone = self.zones.resolve(&desired.name).await?;

        let (action, record) = match self.dns.find(&zone.id, &desired.name).await? {
            Some(record) if record_matches(&record, &desired) => (RecordAction::Unchanged, record),
            Some(record) => {
                let record = self.dns.upsert(&zone.id, &desired, Some(&record.id)).await?;
                (RecordAction::Updated, record)
            }
            None => {
                let record = self.dns.upsert(&zone.id, &desired, None).await?;
                (RecordAction::Created, record)
            }
        };

        Ok(RecordChange { action, record })
    }

    /// Removes the record for `hostname` and returns what was removed.
    pub async fn remove(&self, hostname: &str) -> Result<DnsRecord, Error> {
        let hostname = normalize_hostname(hostname)?;
        let zone = self.zones.resolve(&hostname).await?;
        let Some(record) = self.dns.find(&zone.id, &hostname).await? else {
            return Err(Error::RecordNotFound(hostname));
        };

        if !self.dns.remove(&zone.id, &record.id).await? {
            return Err(Error::RecordNotFound(hostname));
        }

        info!(name = %record.name, id = %record.id, "removed dns record");
        Ok(record)
    }
}
