use crate::{Context, Error};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use cloudflarext::cfd_tunnel::{CloudflaredTunnel, ConfigurationSrc, Tunnel};
use cloudflarext::ApiFailure;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const SECRET_LENGTH: usize = 35;

/// Base64 of 35 alphanumerics drawn from the operating system's CSPRNG.
pub fn generate_secret() -> String {
    let secret = OsRng
        .sample_iter(&Alphanumeric)
        .take(SECRET_LENGTH)
        .map(char::from)
        .collect::<String>();

    BASE64.encode(secret.as_bytes())
}

pub(crate) fn tunnel_failure(tunnel_id: Uuid) -> impl FnOnce(ApiFailure) -> Error {
    move |err| {
        if err.is_not_found() {
            Error::TunnelNotFound(tunnel_id)
        } else {
            Error::CloudflareApiFailure(err)
        }
    }
}

pub struct TunnelManager<C> {
    ctx: Arc<Context<C>>,
}

impl<C: CloudflaredTunnel> TunnelManager<C> {
    pub fn new(ctx: Arc<Context<C>>) -> Self {
        Self { ctx }
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Tunnel>, Error> {
        let tunnels = self
            .ctx
            .cloudflare_client
            .list_tunnels(&self.ctx.auth, name)
            .await?;

        let mut tunnels = tunnels
            .into_iter()
            .filter(|tunnel| tunnel.name == name && tunnel.deleted_at.is_none())
            .collect::<Vec<_>>();

        match tunnels.len() {
            0 => Ok(None),
            1 => Ok(tunnels.pop()),
            count => Err(Error::AmbiguousResult {
                kind: "tunnel",
                name: name.to_owned(),
                count,
            }),
        }
    }

    /// Callers check `find_by_name` first; the API is free to reject or
    /// duplicate an existing name.
    pub async fn create(&self, name: &str) -> Result<Tunnel, Error> {
        let tunnel = self
            .ctx
            .cloudflare_client
            .create_tunnel(
                &self.ctx.auth,
                name,
                &generate_secret(),
                ConfigurationSrc::Cloudflare,
            )
            .await?;

        info!(name, id = %tunnel.id, "created tunnel");
        Ok(tunnel)
    }

    pub async fn remove(&self, tunnel_id: Uuid) -> Result<bool, Error> {
        let tunnel = self
            .ctx
            .cloudflare_client
            .delete_tunnel(&self.ctx.auth, tunnel_id)
            .await
            .map_err(tunnel_failure(tunnel_id))?;

        info!(name = %tunnel.name, id = %tunnel_id, "removed tunnel");
        Ok(tunnel.id == tunnel_id)
    }

    /// Fresh connector token; not cached or logged.
    pub async fn connection_token(&self, tunnel_id: Uuid) -> Result<String, Error> {
        let token = self
            .ctx
            .cloudflare_client
            .get_tunnel_token(&self.ctx.auth, tunnel_id)
            .await
            .map_err(tunnel_failure(tunnel_id))?;

        Ok(token.into())
    }
}
