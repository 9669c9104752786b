use std::env;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context};
use config::Config;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub auth: AuthBootstrap,
    #[serde(default)]
    pub ledger: LedgerBootstrap,
    #[serde(default)]
    pub decode: DecodeBootstrap,
    #[serde(default)]
    pub providers: ProviderBootstrap,
}

impl GatewayConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config_file = env::var("STYLEBASE_CONFIG_FILE")
            .unwrap_or_else(|_| "config/gateway.local.toml".to_string());

        let mut builder = Config::builder()
            .set_default("server.address", ServerConfig::default_address())?
            .set_default("server.port", ServerConfig::default_port())?;

        if Path::new(&config_file).exists() {
            builder = builder.add_source(config::File::from(Path::new(&config_file)));
        }

        builder = builder.add_source(config::Environment::with_prefix("STYLEBASE").separator("__"));

        let config: GatewayConfig = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        Ok(config)
    }
}

pub fn resolve_secret_source(
    literal: &Option<String>,
    env_key: &Option<String>,
    file_path: &Option<String>,
    field: &str,
) -> anyhow::Result<String> {
    if let Some(env_var) = env_key.as_ref() {
        let value = env::var(env_var)
            .with_context(|| format!("environment variable {env_var} for {field} not set"))?;
        return Ok(value);
    }
    if let Some(path) = file_path.as_ref() {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read secret file {path} for {field}"))?;
        return Ok(contents.trim().to_string());
    }
    if let Some(value) = literal.as_ref() {
        if value.is_empty() {
            return Err(anyhow!("{field} literal secret cannot be empty"));
        }
        return Ok(value.clone());
    }
    Err(anyhow!(
        "{field} secret must be provided via literal/env/file"
    ))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_address")]
    pub address: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
}

impl ServerConfig {
    fn default_address() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        8080
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: Self::default_address(),
            port: Self::default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthBootstrap {
    pub issuer: String,
    pub jwks_uri: String,
    #[serde(default)]
    pub audience: Vec<String>,
    #[serde(default = "AuthBootstrap::default_role_claim")]
    pub role_claim: String,
    #[serde(default)]
    pub admin_principals: Vec<String>,
}

impl AuthBootstrap {
    fn default_role_claim() -> String {
        "role".to_string()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerBootstrap {
    #[serde(default = "LedgerBootstrap::default_welcome_tokens")]
    pub welcome_tokens: i64,
    #[serde(default = "LedgerBootstrap::default_plan")]
    pub default_plan: String,
}

impl LedgerBootstrap {
    fn default_welcome_tokens() -> i64 {
        5
    }

    fn default_plan() -> String {
        "free".to_string()
    }
}

impl Default for LedgerBootstrap {
    fn default() -> Self {
        Self {
            welcome_tokens: Self::default_welcome_tokens(),
            default_plan: Self::default_plan(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecodeBootstrap {
    #[serde(default = "DecodeBootstrap::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "DecodeBootstrap::default_cost")]
    pub cost: i64,
}

impl DecodeBootstrap {
    fn default_timeout_secs() -> u64 {
        60
    }

    fn default_cost() -> i64 {
        1
    }
}

impl Default for DecodeBootstrap {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout_secs(),
            cost: Self::default_cost(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProviderBootstrap {
    #[serde(default)]
    pub openai: Option<ProviderSettings>,
    #[serde(default)]
    pub gemini: Option<ProviderSettings>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub max_concurrent_requests: Option<usize>,
}

impl ProviderSettings {
    pub fn resolve_api_key(&self, field: &str) -> anyhow::Result<String> {
        resolve_secret_source(&self.api_key, &self.api_key_env, &self.api_key_file, field)
    }
}
