use crate::{Context, Error};
use cloudflarext::zones::{CloudflareZones, Zone};
use std::sync::Arc;
use tracing::debug;

/// Lowercases `hostname` and drops a trailing root dot, matching how
/// Cloudflare stores record names.
pub fn normalize_hostname(hostname: &str) -> Result<String, Error> {
    let trimmed = hostname.trim();
    let normalized = trimmed
        .strip_suffix('.')
        .unwrap_or(trimmed)
        .to_ascii_lowercase();

    if normalized.is_empty() {
        return Err(Error::InvalidHostname(hostname.to_owned()));
    }
    Ok(normalized)
}

/// Last two labels of `hostname`.
///
/// Multi-part public suffixes such as `co.uk` are not recognised:
/// `app.example.co.uk` resolves to `co.uk`.
pub fn registrable_domain(hostname: &str) -> Result<String, Error> {
    let labels = hostname
        .strip_suffix('.')
        .unwrap_or(hostname)
        .split('.')
        .collect::<Vec<_>>();

    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(Error::InvalidHostname(hostname.to_owned()));
    }

    Ok(labels[labels.len() - 2..].join("."))
}

pub struct ZoneResolver<C> {
    ctx: Arc<Context<C>>,
}

impl<C: CloudflareZones> ZoneResolver<C> {
    pub fn new(ctx: Arc<Context<C>>) -> Self {
        Self { ctx }
    }

    pub async fn resolve(&self, hostname: &str) -> Result<Zone, Error> {
        let domain = registrable_domain(hostname)?;
        let mut zones = self
            .ctx
            .cloudflare_client
            .list_zones(&self.ctx.auth, &domain)
            .await?;

        match zones.len() {
            0 => Err(Error::ZoneNotFound {
                hostname: hostname.to_owned(),
                domain,
            }),
            1 => {
                let zone = zones.remove(0);
                debug!(hostname, zone = %zone.id, "resolved zone");
                Ok(zone)
            }
            count => Err(Error::AmbiguousResult {
                kind: "zone",
                name: domain,
                count,
            }),
        }
    }
}
