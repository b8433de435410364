use crate::cli::{ConnectorCommand, DnsCommand, TunnelCommand, TunnelTarget};
use anyhow::bail;
use cloudflarext::cfd_tunnel::CloudflaredTunnel;
use cloudflarext::dns::CloudflareDns;
use cloudflarext::zones::CloudflareZones;
use serde_json::{json, Value};
use std::sync::Arc;
use tunnel_reconciler::connector::SERVICE_NAME;
use tunnel_reconciler::{
    ConnectorManager, Context, DnsRecords, ServiceManager, TunnelConfigManager, TunnelManager,
};
use uuid::Uuid;

pub async fn dns<C>(ctx: Arc<Context<C>>, command: &DnsCommand) -> anyhow::Result<Value>
where
    C: CloudflareDns + CloudflareZones,
{
    let records = DnsRecords::new(ctx);
    let output = match command {
        DnsCommand::List { domain } => serde_json::to_value(records.list(domain).await?)?,
        DnsCommand::Get { hostname } => serde_json::to_value(records.get(hostname).await?)?,
        DnsCommand::Create(args) => serde_json::to_value(records.ensure(&args.spec()).await?)?,
        DnsCommand::Remove { hostname } => serde_json::to_value(records.remove(hostname).await?)?,
    };
    Ok(output)
}

pub async fn tunnel<C: CloudflaredTunnel>(
    ctx: Arc<Context<C>>,
    command: &TunnelCommand,
) -> anyhow::Result<Value> {
    let tunnels = TunnelManager::new(ctx.clone());
    match command {
        TunnelCommand::Get { name } => Ok(serde_json::to_value(tunnels.find_by_name(name).await?)?),
        TunnelCommand::Config(target) => {
            let tunnel_id = tunnel_id(&tunnels, target).await?;
            let config = TunnelConfigManager::new(ctx).get(tunnel_id).await?;
            Ok(json!({ "tunnel_id": tunnel_id, "config": config }))
        }
    }
}

async fn tunnel_id<C: CloudflaredTunnel>(
    tunnels: &TunnelManager<C>,
    target: &TunnelTarget,
) -> anyhow::Result<Uuid> {
    if let Some(id) = target.id {
        return Ok(id);
    }
    let Some(name) = &target.name else {
        bail!("either --name or --id is required");
    };
    match tunnels.find_by_name(name).await? {
        Some(tunnel) => Ok(tunnel.id),
        None => bail!("no tunnel named {}", name),
    }
}

pub async fn connector<S: ServiceManager>(
    connector: &ConnectorManager<S>,
    command: &ConnectorCommand,
) -> anyhow::Result<Value> {
    match command {
        ConnectorCommand::Status => Ok(json!({
            "service": SERVICE_NAME,
            "installed": connector.is_installed().await?,
        })),
    }
}
