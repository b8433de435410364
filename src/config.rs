use anyhow::{bail, Context as _};
use cloudflarext::{Auth, Environment};
use serde::Deserialize;
use std::path::Path;
use tunnel_reconciler::connector::DEFAULT_BINARY;
use url::Url;

pub const ENV_API_TOKEN: &str = "CLOUDFLARE_API_TOKEN";
pub const ENV_ACCOUNT: &str = "CLOUDFLARE_ACCOUNT_ID";
pub const ENV_API_URL: &str = "CLOUDFLARE_API_URL";
pub const ENV_CLOUDFLARED: &str = "CLOUDFLARED_PATH";

#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileSettings {
    #[serde(default)]
    pub cloudflare: CloudflareSection,
    #[serde(default)]
    pub connector: ConnectorSection,
}

#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CloudflareSection {
    pub api_token: Option<String>,
    pub account: Option<String>,
    pub api_url: Option<String>,
}

#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConnectorSection {
    pub binary: Option<String>,
}

impl FileSettings {
    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents).context("invalid settings document")
    }
}

/// Values given on the command line or through the environment variables
/// clap reads for them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Overrides {
    pub api_token: Option<String>,
    pub account: Option<String>,
    pub api_url: Option<String>,
    pub cloudflared: Option<String>,
}

/// Resolved credentials and connector location. Command line and
/// environment values win over the settings file. Credentials are only
/// required once an API client is built from them.
pub struct Settings {
    pub api_token: Option<String>,
    pub account: Option<String>,
    pub api_url: Option<Url>,
    pub cloudflared: String,
}

impl Settings {
    pub fn load(path: Option<&Path>, overrides: Overrides) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read settings file {:?}", path))?;
                FileSettings::parse(&contents)
                    .with_context(|| format!("failed to parse settings file {:?}", path))?
            }
            None => FileSettings::default(),
        };

        Self::from_sources(file, overrides)
    }

    pub fn from_sources(file: FileSettings, overrides: Overrides) -> anyhow::Result<Self> {
        let pick = |value: Option<String>, fallback: Option<String>| {
            value.filter(|value| !value.is_empty()).or(fallback)
        };

        let api_token = pick(overrides.api_token, file.cloudflare.api_token);
        let account = pick(overrides.account, file.cloudflare.account);
        let api_url = pick(overrides.api_url, file.cloudflare.api_url)
            .map(|url| Url::parse(&url).with_context(|| format!("invalid api url {}", url)))
            .transpose()?;

        let cloudflared = pick(overrides.cloudflared, file.connector.binary)
            .unwrap_or_else(|| DEFAULT_BINARY.to_owned());

        Ok(Self {
            api_token,
            account,
            api_url,
            cloudflared,
        })
    }

    pub fn auth(&self) -> anyhow::Result<Auth> {
        let Some(api_token) = &self.api_token else {
            bail!("missing api token, set {} or cloudflare.api_token", ENV_API_TOKEN);
        };
        let Some(account) = &self.account else {
            bail!("missing account id, set {} or cloudflare.account", ENV_ACCOUNT);
        };
        Ok(Auth::with_token(account.clone(), api_token.clone()))
    }

    pub fn environment(&self) -> Environment {
        match &self.api_url {
            Some(url) => Environment::Custom(url.clone()),
            None => Environment::Production,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(api_token: &str, account: &str) -> Overrides {
        Overrides {
            api_token: Some(api_token.to_owned()),
            account: Some(account.to_owned()),
            ..Overrides::default()
        }
    }

    const FILE: &str = r#"
cloudflare:
  api_token: file-token
  account: file-account
  api_url: http://127.0.0.1:8080/client/v4/
connector:
  binary: /usr/local/bin/cloudflared
"#;

    #[test]
    fn file_values_are_used() {
        let settings =
            Settings::from_sources(FileSettings::parse(FILE).unwrap(), Overrides::default())
                .unwrap();

        assert_eq!(settings.api_token.as_deref(), Some("file-token"));
        assert_eq!(settings.account.as_deref(), Some("file-account"));
        assert_eq!(settings.cloudflared, "/usr/local/bin/cloudflared");
        assert_eq!(
            settings.environment(),
            Environment::Custom(Url::parse("http://127.0.0.1:8080/client/v4/").unwrap())
        );
        assert_eq!(settings.auth().unwrap().account_id, "file-account");
    }

    #[test]
    fn overrides_win_over_file_unless_empty() {
        let overrides = Overrides {
            api_token: Some("cli-token".to_owned()),
            cloudflared: Some(String::new()),
            ..Overrides::default()
        };
        let settings =
            Settings::from_sources(FileSettings::parse(FILE).unwrap(), overrides).unwrap();

        assert_eq!(settings.api_token.as_deref(), Some("cli-token"));
        assert_eq!(settings.account.as_deref(), Some("file-account"));
        assert_eq!(settings.cloudflared, "/usr/local/bin/cloudflared");
    }

    #[test]
    fn defaults_apply_without_file() {
        let settings =
            Settings::from_sources(FileSettings::default(), credentials("t", "a")).unwrap();

        assert_eq!(settings.cloudflared, DEFAULT_BINARY);
        assert_eq!(settings.environment(), Environment::Production);
    }

    #[test]
    fn missing_credentials_fail_only_when_auth_is_built() {
        let account_only = Overrides {
            account: Some("a".to_owned()),
            cloudflared: Some("/opt/cloudflared".to_owned()),
            ..Overrides::default()
        };
        let settings = Settings::from_sources(FileSettings::default(), account_only).unwrap();
        assert_eq!(settings.cloudflared, "/opt/cloudflared");
        let err = settings.auth().err().unwrap();
        assert!(err.to_string().contains(ENV_API_TOKEN));

        let token_only = Overrides {
            api_token: Some("t".to_owned()),
            ..Overrides::default()
        };
        let settings = Settings::from_sources(FileSettings::default(), token_only).unwrap();
        let err = settings.auth().err().unwrap();
        assert!(err.to_string().contains(ENV_ACCOUNT));
    }

    #[test]
    fn unknown_keys_and_bad_urls_are_rejected() {
        assert!(FileSettings::parse("cloudflare:\n  apitoken: x\n").is_err());

        let file = FileSettings::parse("cloudflare:\n  api_url: not a url\n").unwrap();
        assert!(Settings::from_sources(file, credentials("t", "a")).is_err());

        let mut overrides = credentials("t", "a");
        overrides.api_url = Some("::".to_owned());
        assert!(Settings::from_sources(FileSettings::default(), overrides).is_err());
    }

    #[test]
    fn settings_file_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, FILE).unwrap();

        let settings =
            Settings::load(Some(&path), credentials("cli-token", "cli-account")).unwrap();
        assert_eq!(settings.api_token.as_deref(), Some("cli-token"));
        assert_eq!(settings.cloudflared, "/usr/local/bin/cloudflared");

        let missing = dir.path().join("missing.yaml");
        assert!(Settings::load(Some(&missing), Overrides::default()).is_err());
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(FileSettings::parse("\n").unwrap(), FileSettings::default());
    }
}
