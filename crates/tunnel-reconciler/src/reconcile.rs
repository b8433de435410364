use crate::config::{hostnames, normalize_ingress};
use crate::dns::{points_at, tunnel_cname};
use crate::{
    ConnectorManager, Context, DnsRecordManager, Error, Report, ServiceManager,
    TunnelConfigManager, TunnelManager, ZoneResolver,
};
use cloudflarext::cfd_tunnel::{CloudflaredTunnel, IngressRule, Tunnel};
use cloudflarext::dns::CloudflareDns;
use cloudflarext::zones::CloudflareZones;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// A DNS record to create (`existing_id` unset) or to overwrite in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsChange {
    pub hostname: String,
    pub zone_id: String,
    pub existing_id: Option<String>,
}

/// A hostname dropped from the ingress rules. `record_id` is unset when no
/// record was found for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRemoval {
    pub hostname: String,
    pub zone_id: String,
    pub record_id: Option<String>,
}

/// Everything `present` decided from the state observed on entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub tunnel: Option<Tunnel>,
    pub ingress: Vec<IngressRule>,
    pub update_config: bool,
    pub dns_create: Vec<DnsChange>,
    pub dns_update: Vec<DnsChange>,
    pub dns_remove: Vec<DnsRemoval>,
    pub install_connector: bool,
}

impl Plan {
    pub fn create_tunnel(&self) -> bool {
        self.tunnel.is_none()
    }

    pub fn is_noop(&self) -> bool {
        !self.create_tunnel()
            && !self.update_config
            && self.dns_create.is_empty()
            && self.dns_update.is_empty()
            && self.dns_remove.is_empty()
            && !self.install_connector
    }

    /// Only the first pending change is ever described.
    fn first_pending(&self, name: &str) -> Option<String> {
        if self.create_tunnel() {
            return Some(format!("Tunnel {} will be created", name));
        }
        if self.update_config {
            return Some(format!("Tunnel {} config will be updated", name));
        }
        if let Some(change) = self.dns_create.first() {
            return Some(format!("DNS {} will be created", change.hostname));
        }
        if let Some(change) = self.dns_update.first() {
            return Some(format!("DNS {} will be updated", change.hostname));
        }
        if let Some(removal) = self.dns_remove.first() {
            return Some(format!("DNS {} will be removed", removal.hostname));
        }
        if self.install_connector {
            return Some("Cloudflare connector will be installed".to_owned());
        }
        None
    }
}

/// Converges a named tunnel toward present or absent.
///
/// Steps run strictly one after another. A failing step ends the run with
/// `result = false`; whatever was applied before it stays applied and is
/// listed in the report.
pub struct Reconciler<C, S> {
    zones: ZoneResolver<C>,
    dns: DnsRecordManager<C>,
    tunnels: TunnelManager<C>,
    configs: TunnelConfigManager<C>,
    connector: ConnectorManager<S>,
    dry_run: bool,
}

impl<C, S> Reconciler<C, S>
where
    C: CloudflaredTunnel + CloudflareDns + CloudflareZones,
    S: ServiceManager,
{
    pub fn new(ctx: Arc<Context<C>>, connector: ConnectorManager<S>) -> Self {
        Self {
            zones: ZoneResolver::new(ctx.clone()),
            dns: DnsRecordManager::new(ctx.clone()),
            tunnels: TunnelManager::new(ctx.clone()),
            configs: TunnelConfigManager::new(ctx),
            connector,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Observes the tunnel, its configuration, its DNS records and the
    /// connector once, and works out what `present` has to do.
    ///
    /// The stored ingress list is compared as a whole sequence. Cloudflare
    /// routes on the first matching rule, so a reordering of otherwise equal
    /// rules counts as a configuration change and is written back.
    pub async fn plan(&self, name: &str, ingress: Vec<IngressRule>) -> Result<Plan, Error> {
        let ingress = normalize_ingress(ingress)?;
        let tunnel = self.tunnels.find_by_name(name).await?;

        let remote_ingress = match &tunnel {
            Some(tunnel) => self
                .configs
                .get(tunnel.id)
                .await?
                .map(|config| config.ingress),
            None => None,
        };

        let desired_hosts = hostnames(&ingress);
        let (update_config, dropped) = match &remote_ingress {
            Some(remote) => {
                let dropped = hostnames(remote)
                    .into_iter()
                    .filter(|hostname| !desired_hosts.contains(hostname))
                    .collect::<Vec<_>>();
                (*remote != ingress, dropped)
            }
            None => (true, Vec::new()),
        };

        let mut dns_create = Vec::new();
        let mut dns_update = Vec::new();
        for hostname in &desired_hosts {
            let zone = self.zones.resolve(hostname).await?;
            let record = self.dns.find(&zone.id, hostname).await?;
            match (record, &tunnel) {
                (None, _) => dns_create.push(DnsChange {
                    hostname: (*hostname).to_owned(),
                    zone_id: zone.id,
                    existing_id: None,
                }),
                (Some(record), Some(tunnel)) if points_at(&record, tunnel.id) => {}
                (Some(record), _) => dns_update.push(DnsChange {
                    hostname: (*hostname).to_owned(),
                    zone_id: zone.id,
                    existing_id: Some(record.id),
                }),
            }
        }

        let mut dns_remove = Vec::new();
        for hostname in dropped {
            let zone = self.zones.resolve(hostname).await?;
            let record = self.dns.find(&zone.id, hostname).await?;
            dns_remove.push(DnsRemoval {
                hostname: hostname.to_owned(),
                zone_id: zone.id,
                record_id: record.map(|record| record.id),
            });
        }

        let install_connector = !self.connector.is_installed().await?;

        let plan = Plan {
            tunnel,
            ingress,
            update_config,
            dns_create,
            dns_update,
            dns_remove,
            install_connector,
        };
        debug!(?plan, "planned reconciliation");
        Ok(plan)
    }

    /// Makes sure the tunnel exists, routes exactly `ingress`, has a proxied
    /// CNAME per hostname and has its connector installed locally.
    pub async fn present(&self, name: &str, ingress: Vec<IngressRule>) -> Result<Report, Error> {
        let plan = self.plan(name, ingress).await?;
        let report = Report::new(name);

        if plan.is_noop() {
            return Ok(report.succeed(format!(
                "Cloudflare Tunnel {} is already in the desired state",
                name
            )));
        }

        if self.dry_run {
            let pending = plan.first_pending(name).unwrap_or_default();
            return Ok(report.pending(pending));
        }

        Ok(self.apply(name, plan, report).await)
    }

    async fn apply(&self, name: &str, plan: Plan, mut report: Report) -> Report {
        let tunnel = match plan.tunnel {
            Some(tunnel) => tunnel,
            None => match self.tunnels.create(name).await {
                Ok(tunnel) => {
                    report.record(
                        "tunnel created",
                        name,
                        format!("Cloudflare tunnel {} was created", name),
                    );
                    tunnel
                }
                Err(err) => {
                    return report.fail(format!("Failed to create the {} tunnel: {}", name, err))
                }
            },
        };

        if plan.update_config {
            match self.configs.set(tunnel.id, plan.ingress).await {
                Ok(config) => {
                    let routes = hostnames(&config.ingress);
                    report.record(
                        "tunnel config",
                        json!(routes),
                        format!("Tunnel config for {} was updated", name),
                    );
                }
                Err(err) => {
                    return report.fail(format!(
                        "Failed to update tunnel config for {}: {}",
                        name, err
                    ))
                }
            }
        }

        for change in plan.dns_create.iter().chain(plan.dns_update.iter()) {
            let desired = tunnel_cname(&change.hostname, tunnel.id);
            let verb = match change.existing_id {
                Some(_) => "updated",
                None => "created",
            };

            match self
                .dns
                .upsert(&change.zone_id, &desired, change.existing_id.as_deref())
                .await
            {
                Ok(record) => report.record(
                    change.hostname.clone(),
                    verb,
                    format!("DNS entry {} was {}", record.name, verb),
                ),
                Err(err) => {
                    return report.fail(format!(
                        "Failed to write {} DNS entry: {}",
                        change.hostname, err
                    ))
                }
            }
        }

        for removal in &plan.dns_remove {
            let Some(record_id) = &removal.record_id else {
                debug!(hostname = %removal.hostname, "no dns record left to remove");
                continue;
            };

            match self.dns.remove(&removal.zone_id, record_id).await {
                Ok(true) => report.record(
                    removal.hostname.clone(),
                    "removed",
                    format!("DNS entry {} has been removed", removal.hostname),
                ),
                Ok(false) => {
                    return report.fail(format!(
                        "Failed to remove DNS entry {}",
                        removal.hostname
                    ))
                }
                Err(err) => {
                    return report.fail(format!(
                        "Failed to remove DNS entry {}: {}",
                        removal.hostname, err
                    ))
                }
            }
        }

        if plan.install_connector {
            let installed = match self.tunnels.connection_token(tunnel.id).await {
                Ok(token) => self.connector.install(&token).await,
                Err(err) => Err(err),
            };

            match installed {
                Ok(_) => report.record(
                    "connector",
                    "installed and started",
                    format!("Connector was installed and configured for {}", name),
                ),
                Err(err) => {
                    return report.fail(format!("Failed to configure connector: {}", err))
                }
            }
        }

        info!(name, changes = report.changes.len(), "tunnel reconciled");
        report.succeed(format!("Cloudflare Tunnel {} is in the desired state", name))
    }

    /// Tears down the connector, the DNS records behind the configured
    /// hostnames and finally the tunnel.
    pub async fn absent(&self, name: &str) -> Result<Report, Error> {
        let report = Report::new(name);
        let Some(tunnel) = self.tunnels.find_by_name(name).await? else {
            return Ok(report.succeed(format!("Cloudflare Tunnel {} does not exist", name)));
        };

        if self.dry_run {
            return Ok(report.pending(format!("Cloudflare Tunnel {} will be deleted", name)));
        }

        let config = self.configs.get(tunnel.id).await?;
        Ok(self.teardown(name, tunnel, config.map(|c| c.ingress), report).await)
    }

    async fn teardown(
        &self,
        name: &str,
        tunnel: Tunnel,
        ingress: Option<Vec<IngressRule>>,
        mut report: Report,
    ) -> Report {
        if let Some(ingress) = ingress {
            match self.connector.uninstall().await {
                Ok(true) => report.record(
                    "connector",
                    "removed",
                    "Cloudflare connector has been removed",
                ),
                Ok(false) => return report.fail("Failed to uninstall the cloudflare connector"),
                Err(err) => {
                    return report.fail(format!(
                        "Failed to uninstall the cloudflare connector: {}",
                        err
                    ))
                }
            }

            for hostname in hostnames(&ingress) {
                match self.remove_dns(hostname).await {
                    Ok(Some(true)) => report.record(
                        hostname,
                        "removed",
                        format!("DNS entry {} has been removed", hostname),
                    ),
                    Ok(Some(false)) => {
                        return report.fail(format!("Failed to remove DNS entry {}", hostname))
                    }
                    Ok(None) => debug!(hostname, "no dns record to remove"),
                    Err(err) => {
                        return report.fail(format!(
                            "Failed to remove DNS entry {}: {}",
                            hostname, err
                        ))
                    }
                }
            }
        }

        match self.tunnels.remove(tunnel.id).await {
            Ok(true) => {
                report.record(
                    "tunnel",
                    format!("removed {}", tunnel.name),
                    format!("Cloudflare Tunnel {} has been removed", tunnel.name),
                );
                report.succeed(format!("Cloudflare Tunnel {} is absent", name))
            }
            Ok(false) => report.fail(format!("Failed to remove Cloudflare tunnel {}", tunnel.name)),
            Err(err) => report.fail(format!(
                "Failed to remove Cloudflare tunnel {}: {}",
                tunnel.name, err
            )),
        }
    }

    // `None` when there is no record for the hostname.
    async fn remove_dns(&self, hostname: &str) -> Result<Option<bool>, Error> {
        let zone = self.zones.resolve(hostname).await?;
        match self.dns.find(&zone.id, hostname).await? {
            Some(record) => Ok(Some(self.dns.remove(&zone.id, &record.id).await?)),
            None => Ok(None),
        }
    }
}
