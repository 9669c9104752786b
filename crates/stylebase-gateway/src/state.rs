use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use stylebase_auth::prelude::{
    AccountConfig, AccountService, AuthFacade, Authenticator, JwksAuthenticator, JwksConfig,
    MemoryAccountStore,
};
use stylebase_decode::prelude::{Coordinator, CoordinatorConfig, MemoryJobStore};
use stylebase_ledger::prelude::{Ledger, MemoryLedger, MemoryLedgerConfig};
use stylebase_llm::prelude::{
    GeminiConfig, GeminiProvider, OpenAiConfig, OpenAiProvider, Registry,
};
use stylebase_normalize::prelude::Normalizer;
use stylebase_observe::prelude::MeterRegistry;

use crate::config::GatewayConfig;

#[derive(Clone)]
pub struct AppState {
    pub auth: AuthFacade,
    pub ledger: Arc<dyn Ledger>,
    pub coordinator: Coordinator,
    pub meter: MeterRegistry,
}

impl AppState {
    pub fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        let authenticator = build_authenticator(config)?;
        let registry = build_registry(config)?;
        Self::from_parts(
            authenticator,
            Arc::new(registry),
            config.ledger.welcome_tokens,
            config.ledger.default_plan.clone(),
            CoordinatorConfig {
                cost_per_decode: config.decode.cost,
                provider_timeout: Duration::from_secs(config.decode.timeout_secs),
            },
        )
    }

    pub fn from_parts(
        authenticator: Arc<dyn Authenticator>,
        registry: Arc<Registry>,
        welcome_tokens: i64,
        default_plan: String,
        coordinator_config: CoordinatorConfig,
    ) -> anyhow::Result<Self> {
        let ledger = Arc::new(MemoryLedger::new(MemoryLedgerConfig {
            default_plan,
        }));
        let ledger_dyn: Arc<dyn Ledger> = ledger;

        let accounts = AccountService::new(
            Arc::new(MemoryAccountStore::new()),
            ledger_dyn.clone(),
            AccountConfig { welcome_tokens },
        );
        let auth = AuthFacade::new(authenticator, accounts);

        let meter = MeterRegistry::default();
        let coordinator = Coordinator::new(
            ledger_dyn.clone(),
            registry,
            Normalizer::new(&meter),
            Arc::new(MemoryJobStore::new()),
            coordinator_config,
        );

        Ok(Self {
            auth,
            ledger: ledger_dyn,
            coordinator,
            meter,
        })
    }
}

fn build_authenticator(config: &GatewayConfig) -> anyhow::Result<Arc<dyn Authenticator>> {
    let mut builder = JwksConfig::builder(config.auth.issuer.clone())
        .jwks_uri(config.auth.jwks_uri.clone())
        .role_claim(config.auth.role_claim.clone())
        .admin_subjects(config.auth.admin_principals.iter().cloned());
    for audience in &config.auth.audience {
        builder = builder.audience(audience.clone());
    }
    let authenticator = JwksAuthenticator::new(builder.build())
        .context("build jwks authenticator")?;
    Ok(Arc::new(authenticator))
}

fn build_registry(config: &GatewayConfig) -> anyhow::Result<Registry> {
    let mut registry = Registry::new();

    if let Some(settings) = &config.providers.openai {
        let api_key = settings.resolve_api_key("providers.openai.api_key")?;
        let mut cfg = OpenAiConfig::new(api_key).context("openai config")?;
        if let Some(base_url) = &settings.base_url {
            cfg = cfg.with_base_url(base_url).context("openai base url")?;
        }
        if let Some(limit) = settings.max_concurrent_requests {
            cfg = cfg.with_max_concurrency(limit);
        }
        registry.install_openai(Arc::new(OpenAiProvider::new(cfg).context("openai provider")?));
    }

    if let Some(settings) = &config.providers.gemini {
        let api_key = settings.resolve_api_key("providers.gemini.api_key")?;
        let mut cfg = GeminiConfig::new(api_key).context("gemini config")?;
        if let Some(base_url) = &settings.base_url {
            cfg = cfg.with_base_url(base_url).context("gemini base url")?;
        }
        if let Some(limit) = settings.max_concurrent_requests {
            cfg = cfg.with_max_concurrency(limit);
        }
        registry.install_gemini(Arc::new(GeminiProvider::new(cfg).context("gemini provider")?));
    }

    Ok(registry)
}
