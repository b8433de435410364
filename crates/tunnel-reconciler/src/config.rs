use crate::tunnel::tunnel_failure;
use crate::zone::normalize_hostname;
use crate::{Context, Error};
use cloudflarext::cfd_tunnel::{
    CloudflaredTunnel, IngressRule, TunnelConfiguration, CATCH_ALL_SERVICE,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Brings caller supplied rules into the stored shape: hostnames normalized,
/// exactly one `http_status:404` catch-all and it comes last.
///
/// A catch-all given anywhere in the list is moved to the end. Any other rule
/// without a hostname would shadow everything after it, so it is rejected.
pub fn normalize_ingress(ingress: Vec<IngressRule>) -> Result<Vec<IngressRule>, Error> {
    let mut rules = Vec::with_capacity(ingress.len() + 1);
    for mut rule in ingress {
        if rule.is_catch_all() {
            continue;
        }

        let Some(hostname) = rule.hostname.take() else {
            return Err(Error::InvalidIngress(format!(
                "rule for service {} has no hostname, only the {} catch-all may omit it",
                rule.service, CATCH_ALL_SERVICE
            )));
        };
        rule.hostname = Some(normalize_hostname(&hostname)?);
        rules.push(rule);
    }

    rules.push(IngressRule::catch_all());
    Ok(rules)
}

/// Distinct hostnames of `ingress`, in rule order.
pub fn hostnames(ingress: &[IngressRule]) -> Vec<&str> {
    let mut hostnames: Vec<&str> = Vec::new();
    for hostname in ingress.iter().filter_map(|rule| rule.hostname.as_deref()) {
        if !hostnames.contains(&hostname) {
            hostnames.push(hostname);
        }
    }
    hostnames
}

pub struct TunnelConfigManager<C> {
    ctx: Arc<Context<C>>,
}

impl<C: CloudflaredTunnel> TunnelConfigManager<C> {
    pub fn new(ctx: Arc<Context<C>>) -> Self {
        Self { ctx }
    }

    /// `None` when the tunnel has never been configured.
    pub async fn get(&self, tunnel_id: Uuid) -> Result<Option<TunnelConfiguration>, Error> {
        let result = self
            .ctx
            .cloudflare_client
            .get_configuration(&self.ctx.auth, tunnel_id)
            .await
            .map_err(tunnel_failure(tunnel_id))?;

        Ok(result.config.filter(|config| !config.ingress.is_empty()))
    }

    /// Replaces the whole ingress list; rules left out are dropped remotely.
    pub async fn set(
        &self,
        tunnel_id: Uuid,
        ingress: Vec<IngressRule>,
    ) -> Result<TunnelConfiguration, Error> {
        let config = TunnelConfiguration {
            ingress: normalize_ingress(ingress)?,
        };

        let result = self
            .ctx
            .cloudflare_client
            .update_configuration(&self.ctx.auth, tunnel_id, config.clone())
            .await
            .map_err(tunnel_failure(tunnel_id))?;

        info!(
            id = %tunnel_id,
            rules = config.ingress.len(),
            version = ?result.version,
            "replaced tunnel configuration"
        );
        Ok(result.config.unwrap_or(config))
    }
}
