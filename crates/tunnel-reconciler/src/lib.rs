//! Drives a remotely managed Cloudflare tunnel, its ingress rules, the DNS
//! records behind them and the local connector service toward a desired
//! state, reporting only what it had to change.

use cloudflarext::{ApiFailure, Auth};
use std::sync::Arc;
use uuid::Uuid;

pub mod config;
pub mod connector;
pub mod dns;
pub mod reconcile;
pub mod records;
pub mod report;
pub mod tunnel;
pub mod zone;

#[cfg(test)]
pub(crate) mod testing;

pub use config::TunnelConfigManager;
pub use connector::{CommandOutput, ConnectorManager, ServiceManager, SystemServiceManager};
pub use dns::DnsRecordManager;
pub use reconcile::{DnsChange, DnsRemoval, Plan, Reconciler};
pub use records::{DnsRecords, RecordAction, RecordChange, RecordSpec};
pub use report::Report;
pub use tunnel::TunnelManager;
pub use zone::ZoneResolver;

/// All errors possible to occur during reconciliation
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid hostname {0:?}, expected at least two labels")]
    InvalidHostname(String),
    #[error("invalid ingress rules: {0}")]
    InvalidIngress(String),
    #[error("no zone found for {hostname} (looked up {domain})")]
    ZoneNotFound { hostname: String, domain: String },
    #[error("expected at most one {kind} named {name}, found {count}")]
    AmbiguousResult {
        kind: &'static str,
        name: String,
        count: usize,
    },
    // Any error that the cloudflare api returns
    #[error("Cloudflare api returned an error: {0}")]
    CloudflareApiFailure(#[from] ApiFailure),
    #[error("tunnel {0} not found")]
    TunnelNotFound(Uuid),
    #[error("no dns record found for {0}")]
    RecordNotFound(String),
    #[error("unsupported record type {0}, expected one of A, AAAA, CNAME, TXT")]
    UnsupportedRecordType(String),
    #[error("invalid ttl {0}, expected 1 (automatic) or 60 to 86400")]
    InvalidTtl(u32),
    #[error("connector install failed: {0}")]
    ConnectorInstall(String),
    #[error("connector uninstall failed: {0}")]
    ConnectorUninstall(String),
    #[error("failed to run {command}: {source}")]
    Command {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Shared handle on the API client and the account it acts for.
pub struct Context<C> {
    pub cloudflare_client: C,
    pub auth: Auth,
}

impl<C> Context<C> {
    pub fn new(cloudflare_client: C, auth: Auth) -> Arc<Self> {
        Arc::new(Self {
            cloudflare_client,
            auth,
        })
    }
}
