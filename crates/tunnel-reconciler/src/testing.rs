//! In-memory stand-ins for the Cloudflare API and the local service manager.

use crate::connector::{CommandOutput, ServiceManager};
use crate::{Context, Error};
use async_trait::async_trait;
use cloudflarext::cfd_tunnel::{
    CloudflaredTunnel, ConfigurationSrc, Tunnel, TunnelConfiguration, TunnelConfigurationResult,
    TunnelToken,
};
use cloudflarext::dns::{CloudflareDns, DeletedRecord, DnsRecord, DnsRecordParams};
use cloudflarext::zones::{CloudflareZones, Zone};
use cloudflarext::{ApiError, ApiErrors, ApiFailure, Auth};
use http::StatusCode;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Default)]
struct State {
    zones: Vec<Zone>,
    tunnels: Vec<Tunnel>,
    created: HashMap<String, (String, ConfigurationSrc)>,
    configs: HashMap<Uuid, TunnelConfiguration>,
    records: Vec<DnsRecord>,
    next_record: u32,
    fail_on: HashSet<&'static str>,
    calls: Vec<String>,
}

/// Remote state held in memory. Tunnel listing returns soft-deleted tunnels
/// too, so callers have to filter them.
#[derive(Default)]
pub struct FakeCloudflare {
    state: Mutex<State>,
}

fn failure(status: StatusCode, message: &str) -> ApiFailure {
    ApiFailure::Error(
        status,
        ApiErrors {
            errors: vec![ApiError {
                code: 1000,
                message: message.to_owned(),
            }],
        },
    )
}

impl FakeCloudflare {
    pub fn with_zones(names: &[&str]) -> Self {
        let fake = Self::default();
        {
            let mut state = fake.state.lock().unwrap();
            for (index, name) in names.iter().enumerate() {
                state.zones.push(Zone {
                    id: format!("zone-{}-{}", index, name),
                    name: (*name).to_owned(),
                    status: "active".to_owned(),
                });
            }
        }
        fake
    }

    pub fn into_context(self) -> Arc<Context<FakeCloudflare>> {
        Context::new(self, Auth::with_token("account", "token"))
    }

    pub fn fail_on(&self, operation: &'static str) {
        self.state.lock().unwrap().fail_on.insert(operation);
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().fail_on.clear();
    }

    pub fn zone_id(&self, name: &str) -> String {
        let state = self.state.lock().unwrap();
        state
            .zones
            .iter()
            .find(|zone| zone.name == name)
            .map(|zone| zone.id.clone())
            .unwrap()
    }

    pub fn creation_request(&self, name: &str) -> (String, ConfigurationSrc) {
        self.state.lock().unwrap().created[name].clone()
    }

    pub fn live_tunnels(&self) -> Vec<Tunnel> {
        let state = self.state.lock().unwrap();
        state
            .tunnels
            .iter()
            .filter(|tunnel| tunnel.deleted_at.is_none())
            .cloned()
            .collect()
    }

    pub fn config(&self, tunnel_id: Uuid) -> Option<TunnelConfiguration> {
        self.state.lock().unwrap().configs.get(&tunnel_id).cloned()
    }

    pub fn records(&self) -> Vec<DnsRecord> {
        self.state.lock().unwrap().records.clone()
    }

    pub fn record(&self, name: &str) -> Option<DnsRecord> {
        self.records().into_iter().find(|record| record.name == name)
    }

    /// Seeds a record directly, bypassing the API.
    pub fn insert_record(&self, zone: &str, name: &str, content: &str, proxied: bool) {
        let zone_id = self.zone_id(zone);
        let mut state = self.state.lock().unwrap();
        state.next_record += 1;
        let id = format!("rec-{}", state.next_record);
        state.records.push(DnsRecord {
            id,
            zone_id: Some(zone_id),
            name: name.to_owned(),
            record_type: "CNAME".to_owned(),
            content: content.to_owned(),
            proxied,
            ttl: 1,
            comment: None,
        });
    }

    pub fn remove_record(&self, record_id: &str) {
        self.state
            .lock()
            .unwrap()
            .records
            .retain(|record| record.id != record_id);
    }

    pub fn drop_config(&self, tunnel_id: Uuid) {
        self.state.lock().unwrap().configs.remove(&tunnel_id);
    }

    /// Mutating calls made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn begin(&self, operation: &'static str, detail: String) -> Result<(), ApiFailure> {
        let mut state = self.state.lock().unwrap();
        if state.fail_on.contains(operation) {
            return Err(failure(StatusCode::INTERNAL_SERVER_ERROR, operation));
        }
        if !operation.starts_with("list") && !operation.starts_with("get") {
            state.calls.push(format!("{} {}", operation, detail));
        }
        Ok(())
    }

    fn live_tunnel(state: &State, tunnel_id: Uuid) -> Result<Tunnel, ApiFailure> {
        state
            .tunnels
            .iter()
            .find(|tunnel| tunnel.id == tunnel_id && tunnel.deleted_at.is_none())
            .cloned()
            .ok_or_else(|| failure(StatusCode::NOT_FOUND, "tunnel not found"))
    }
}

#[async_trait]
impl CloudflareZones for FakeCloudflare {
    async fn list_zones(&self, _auth: &Auth, name: &str) -> Result<Vec<Zone>, ApiFailure> {
        self.begin("list_zones", name.to_owned())?;
        let state = self.state.lock().unwrap();
        Ok(state
            .zones
            .iter()
            .filter(|zone| zone.name == name)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CloudflaredTunnel for FakeCloudflare {
    async fn list_tunnels(&self, _auth: &Auth, name: &str) -> Result<Vec<Tunnel>, ApiFailure> {
        self.begin("list_tunnels", name.to_owned())?;
        let state = self.state.lock().unwrap();
        Ok(state
            .tunnels
            .iter()
            .filter(|tunnel| tunnel.name == name)
            .cloned()
            .collect())
    }

    async fn create_tunnel(
        &self,
        auth: &Auth,
        name: &str,
        tunnel_secret: &str,
        config_src: ConfigurationSrc,
    ) -> Result<Tunnel, ApiFailure> {
        self.begin("create_tunnel", name.to_owned())?;
        let tunnel = Tunnel {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            account_tag: auth.account_id.clone(),
            status: "inactive".to_owned(),
            deleted_at: None,
        };

        let mut state = self.state.lock().unwrap();
        state
            .created
            .insert(name.to_owned(), (tunnel_secret.to_owned(), config_src));
        state.tunnels.push(tunnel.clone());
        Ok(tunnel)
    }

    async fn delete_tunnel(&self, _auth: &Auth, tunnel_id: Uuid) -> Result<Tunnel, ApiFailure> {
        self.begin("delete_tunnel", tunnel_id.to_string())?;
        let mut state = self.state.lock().unwrap();
        let tunnel = Self::live_tunnel(&state, tunnel_id)?;
        for stored in state.tunnels.iter_mut().filter(|t| t.id == tunnel_id) {
            stored.deleted_at = Some("2024-01-01T00:00:00Z".to_owned());
        }
        state.configs.remove(&tunnel_id);
        Ok(tunnel)
    }

    async fn get_tunnel_token(
        &self,
        _auth: &Auth,
        tunnel_id: Uuid,
    ) -> Result<TunnelToken, ApiFailure> {
        self.begin("get_tunnel_token", tunnel_id.to_string())?;
        let state = self.state.lock().unwrap();
        Self::live_tunnel(&state, tunnel_id)?;
        Ok(TunnelToken(format!("token-{}", tunnel_id)))
    }

    async fn get_configuration(
        &self,
        _auth: &Auth,
        tunnel_id: Uuid,
    ) -> Result<TunnelConfigurationResult, ApiFailure> {
        self.begin("get_configuration", tunnel_id.to_string())?;
        let state = self.state.lock().unwrap();
        Self::live_tunnel(&state, tunnel_id)?;
        Ok(TunnelConfigurationResult {
            tunnel_id: Some(tunnel_id),
            version: Some(0),
            config: state.configs.get(&tunnel_id).cloned(),
        })
    }

    async fn update_configuration(
        &self,
        _auth: &Auth,
        tunnel_id: Uuid,
        config: TunnelConfiguration,
    ) -> Result<TunnelConfigurationResult, ApiFailure> {
        self.begin("update_configuration", tunnel_id.to_string())?;
        let mut state = self.state.lock().unwrap();
        Self::live_tunnel(&state, tunnel_id)?;
        state.configs.insert(tunnel_id, config.clone());
        Ok(TunnelConfigurationResult {
            tunnel_id: Some(tunnel_id),
            version: Some(1),
            config: Some(config),
        })
    }
}

#[async_trait]
impl CloudflareDns for FakeCloudflare {
    async fn list_dns_records(
        &self,
        _auth: &Auth,
        zone_id: &str,
        name: Option<&str>,
    ) -> Result<Vec<DnsRecord>, ApiFailure> {
        self.begin("list_dns_records", name.unwrap_or_default().to_owned())?;
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .iter()
            .filter(|record| record.zone_id.as_deref() == Some(zone_id))
            .filter(|record| name.map_or(true, |name| record.name == name))
            .cloned()
            .collect())
    }

    async fn create_dns_record(
        &self,
        _auth: &Auth,
        zone_id: &str,
        params: &DnsRecordParams,
    ) -> Result<DnsRecord, ApiFailure> {
        self.begin("create_dns_record", params.name.clone())?;
        let mut state = self.state.lock().unwrap();
        state.next_record += 1;
        let record = DnsRecord {
            id: format!("rec-{}", state.next_record),
            zone_id: Some(zone_id.to_owned()),
            name: params.name.clone(),
            record_type: params.record_type.clone(),
            content: params.content.clone(),
            proxied: params.proxied,
            ttl: params.ttl,
            comment: params.comment.clone(),
        };
        state.records.push(record.clone());
        Ok(record)
    }

    async fn update_dns_record(
        &self,
        _auth: &Auth,
        zone_id: &str,
        record_id: &str,
        params: &DnsRecordParams,
    ) -> Result<DnsRecord, ApiFailure> {
        self.begin("update_dns_record", params.name.clone())?;
        let mut state = self.state.lock().unwrap();
        let record = state
            .records
            .iter_mut()
            .find(|record| record.id == record_id && record.zone_id.as_deref() == Some(zone_id))
            .ok_or_else(|| failure(StatusCode::NOT_FOUND, "record not found"))?;

        record.name = params.name.clone();
        record.record_type = params.record_type.clone();
        record.content = params.content.clone();
        record.proxied = params.proxied;
        record.ttl = params.ttl;
        record.comment = params.comment.clone();
        Ok(record.clone())
    }

    async fn delete_dns_record(
        &self,
        _auth: &Auth,
        zone_id: &str,
        record_id: &str,
    ) -> Result<DeletedRecord, ApiFailure> {
        self.begin("delete_dns_record", record_id.to_owned())?;
        let mut state = self.state.lock().unwrap();
        let before = state.records.len();
        state
            .records
            .retain(|record| record.id != record_id || record.zone_id.as_deref() != Some(zone_id));
        if state.records.len() == before {
            return Err(failure(StatusCode::NOT_FOUND, "record not found"));
        }
        Ok(DeletedRecord {
            id: record_id.to_owned(),
        })
    }
}

struct ServiceState {
    installed: bool,
    install_output: (bool, String),
    uninstall_output: (bool, String),
    commands: Vec<Vec<String>>,
}

/// Pretends to be the host's service manager with a single `cloudflared`
/// unit.
pub struct FakeServiceManager {
    state: Mutex<ServiceState>,
}

impl Default for FakeServiceManager {
    fn default() -> Self {
        Self {
            state: Mutex::new(ServiceState {
                installed: false,
                install_output: (
                    true,
                    "INF Using Systemd\nINF Linux service for cloudflared installed successfully"
                        .to_owned(),
                ),
                uninstall_output: (
                    true,
                    "INF Using Systemd\nINF Linux service for cloudflared uninstalled successfully"
                        .to_owned(),
                ),
                commands: Vec::new(),
            }),
        }
    }
}

impl FakeServiceManager {
    pub fn installed() -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().installed = true;
        fake
    }

    pub fn set_install_output(&self, success: bool, output: &str) {
        self.state.lock().unwrap().install_output = (success, output.to_owned());
    }

    pub fn set_uninstall_output(&self, success: bool, output: &str) {
        self.state.lock().unwrap().uninstall_output = (success, output.to_owned());
    }

    pub fn is_installed(&self) -> bool {
        self.state.lock().unwrap().installed
    }

    pub fn commands(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().commands.clone()
    }
}

#[async_trait]
impl ServiceManager for FakeServiceManager {
    async fn is_available(&self, service: &str) -> Result<bool, Error> {
        Ok(service == "cloudflared" && self.state.lock().unwrap().installed)
    }

    async fn run_command(&self, program: &str, args: &[&str]) -> Result<CommandOutput, Error> {
        let mut state = self.state.lock().unwrap();
        let mut command = vec![program.to_owned()];
        command.extend(args.iter().map(|arg| (*arg).to_owned()));
        state.commands.push(command);

        let (success, output) = match args {
            ["service", "install", _] => state.install_output.clone(),
            ["service", "uninstall"] => state.uninstall_output.clone(),
            _ => (false, format!("unknown command {}", args.join(" "))),
        };

        if success {
            match args {
                ["service", "install", _] if output.contains("installed successfully") => {
                    state.installed = true
                }
                ["service", "uninstall"] if output.contains("uninstalled successfully") => {
                    state.installed = false
                }
                _ => {}
            }
        }

        Ok(CommandOutput { success, output })
    }
}
