use crate::config::{Overrides, ENV_ACCOUNT, ENV_API_TOKEN, ENV_API_URL, ENV_CLOUDFLARED};
use anyhow::{bail, Context as _};
use clap::{ArgAction, Args, Parser, Subcommand};
use cloudflarext::cfd_tunnel::IngressRule;
use std::path::PathBuf;
use tunnel_reconciler::RecordSpec;
use uuid::Uuid;

/// Converge a Cloudflare Tunnel, its DNS records and the local connector
#[derive(Parser, Debug)]
#[command(name = "cftunnel", author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Report what would change without changing anything (present and absent only)
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Cloudflare API token
    #[arg(long, env = ENV_API_TOKEN, hide_env_values = true, global = true)]
    pub api_token: Option<String>,

    /// Cloudflare account id
    #[arg(long, env = ENV_ACCOUNT, global = true)]
    pub account: Option<String>,

    /// Base URL of the v4 API
    #[arg(long, env = ENV_API_URL, global = true)]
    pub api_url: Option<String>,

    /// Path to the cloudflared binary
    #[arg(long, env = ENV_CLOUDFLARED, global = true)]
    pub cloudflared: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            api_token: self.api_token.clone(),
            account: self.account.clone(),
            api_url: self.api_url.clone(),
            cloudflared: self.cloudflared.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ensure the tunnel exists with the given ingress rules
    Present(PresentArgs),
    /// Ensure the tunnel and everything routed through it is gone
    Absent {
        #[arg(long)]
        name: String,
    },
    /// Read and write single DNS records by hostname
    #[command(subcommand)]
    Dns(DnsCommand),
    /// Look up a tunnel and its stored configuration
    #[command(subcommand)]
    Tunnel(TunnelCommand),
    /// Inspect the local connector service
    #[command(subcommand)]
    Connector(ConnectorCommand),
}

impl Command {
    pub fn supports_dry_run(&self) -> bool {
        !matches!(
            self,
            Command::Dns(DnsCommand::Create(_) | DnsCommand::Remove { .. })
        )
    }
}

#[derive(Subcommand, Debug)]
pub enum DnsCommand {
    /// Every record in the zone the domain belongs to
    List {
        #[arg(long)]
        domain: String,
    },
    Get {
        #[arg(long)]
        hostname: String,
    },
    /// Create the record, or update it when it differs
    Create(CreateRecordArgs),
    Remove {
        #[arg(long)]
        hostname: String,
    },
}

#[derive(Args, Debug)]
pub struct CreateRecordArgs {
    #[arg(long)]
    pub hostname: String,

    /// A, AAAA, CNAME or TXT
    #[arg(long = "type", value_name = "TYPE")]
    pub record_type: String,

    #[arg(long)]
    pub content: String,

    /// Seconds between 60 and 86400, 1 for automatic
    #[arg(long, default_value_t = 1)]
    pub ttl: u32,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub proxied: bool,

    #[arg(long)]
    pub comment: Option<String>,
}

impl CreateRecordArgs {
    pub fn spec(&self) -> RecordSpec {
        RecordSpec {
            hostname: self.hostname.clone(),
            record_type: self.record_type.clone(),
            content: self.content.clone(),
            ttl: self.ttl,
            proxied: self.proxied,
            comment: self.comment.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum TunnelCommand {
    Get {
        #[arg(long)]
        name: String,
    },
    /// Stored ingress configuration of a tunnel
    Config(TunnelTarget),
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct TunnelTarget {
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub id: Option<Uuid>,
}

#[derive(Subcommand, Debug)]
pub enum ConnectorCommand {
    /// Whether the connector service is installed
    Status,
}

#[derive(Args, Debug)]
pub struct PresentArgs {
    #[arg(long)]
    pub name: String,

    /// File holding the ingress rule list (YAML or JSON)
    #[arg(long, conflicts_with_all = ["hostname", "service", "path"])]
    pub ingress: Option<PathBuf>,

    #[arg(long, requires = "service")]
    pub hostname: Option<String>,

    #[arg(long, requires = "hostname")]
    pub service: Option<String>,

    #[arg(long, requires = "hostname")]
    pub path: Option<String>,
}

impl PresentArgs {
    pub fn ingress_rules(&self) -> anyhow::Result<Vec<IngressRule>> {
        if let Some(file) = &self.ingress {
            let contents = std::fs::read_to_string(file)
                .with_context(|| format!("failed to read ingress file {:?}", file))?;
            return parse_ingress(&contents)
                .with_context(|| format!("failed to parse ingress file {:?}", file));
        }

        match (&self.hostname, &self.service) {
            (Some(hostname), Some(service)) => {
                let mut rule = IngressRule::new(hostname.clone(), service.clone());
                rule.path = self.path.clone();
                Ok(vec![rule])
            }
            _ => bail!("either --ingress or --hostname with --service is required"),
        }
    }
}

/// JSON documents are valid YAML, so one parser covers both.
pub fn parse_ingress(contents: &str) -> anyhow::Result<Vec<IngressRule>> {
    let rules: Vec<IngressRule> = serde_yaml::from_str(contents)?;
    if rules.is_empty() {
        bail!("ingress rule list is empty");
    }
    Ok(rules)
}
