use crate::{Context, Error};
use cloudflarext::dns::{CloudflareDns, DnsRecord, DnsRecordParams};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub const TUNNEL_DOMAIN: &str = "cfargotunnel.com";
pub const MANAGED_COMMENT: &str = "DNS managed by cftunnel";

// Cloudflare reads a ttl of 1 as "automatic".
const AUTOMATIC_TTL: u32 = 1;

pub fn tunnel_target(tunnel_id: Uuid) -> String {
    format!("{}.{}", tunnel_id, TUNNEL_DOMAIN)
}

/// Proxied CNAME routing `hostname` into the tunnel.
pub fn tunnel_cname(hostname: &str, tunnel_id: Uuid) -> DnsRecordParams {
    DnsRecordParams {
        name: hostname.to_owned(),
        record_type: "CNAME".to_owned(),
        content: tunnel_target(tunnel_id),
        ttl: AUTOMATIC_TTL,
        proxied: true,
        comment: Some(MANAGED_COMMENT.to_owned()),
    }
}

pub fn points_at(record: &DnsRecord, tunnel_id: Uuid) -> bool {
    record.content == tunnel_target(tunnel_id) && record.proxied
}

pub struct DnsRecordManager<C> {
    ctx: Arc<Context<C>>,
}

impl<C: CloudflareDns> DnsRecordManager<C> {
    pub fn new(ctx: Arc<Context<C>>) -> Self {
        Self { ctx }
    }

    pub async fn list(&self, zone_id: &str) -> Result<Vec<DnsRecord>, Error> {
        let records = self
            .ctx
            .cloudflare_client
            .list_dns_records(&self.ctx.auth, zone_id, None)
            .await?;

        debug!(zone_id, count = records.len(), "listed dns records");
        Ok(records)
    }

    pub async fn find(&self, zone_id: &str, name: &str) -> Result<Option<DnsRecord>, Error> {
        let records = self
            .ctx
            .cloudflare_client
            .list_dns_records(&self.ctx.auth, zone_id, Some(name))
            .await?;

        let mut records = records
            .into_iter()
            .filter(|record| record.name.eq_ignore_ascii_case(name))
            .collect::<Vec<_>>();

        match records.len() {
            0 => Ok(None),
            1 => Ok(records.pop()),
            count => Err(Error::AmbiguousResult {
                kind: "dns record",
                name: name.to_owned(),
                count,
            }),
        }
    }

    /// Replaces the record at `existing_id` when given, creates one otherwise.
    pub async fn upsert(
        &self,
        zone_id: &str,
        desired: &DnsRecordParams,
        existing_id: Option<&str>,
    ) -> Result<DnsRecord, Error> {
        let client = &self.ctx.cloudflare_client;
        let record = match existing_id {
            Some(record_id) => {
                client
                    .update_dns_record(&self.ctx.auth, zone_id, record_id, desired)
                    .await?
            }
            None => {
                client
                    .create_dns_record(&self.ctx.auth, zone_id, desired)
                    .await?
            }
        };

        info!(
            name = %record.name,
            content = %record.content,
            replaced = existing_id.is_some(),
            "wrote dns record"
        );
        Ok(record)
    }

    pub async fn remove(&self, zone_id: &str, record_id: &str) -> Result<bool, Error> {
        let deleted = self
            .ctx
            .cloudflare_client
            .delete_dns_record(&self.ctx.auth, zone_id, record_id)
            .await?;

        debug!(zone_id, record_id, "deleted dns record");
        Ok(deleted.id == record_id)
    }
}
