use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Duration;

use crate::config::ProxyConfig;
use crate::proxy::{CacheAsideProxy, HttpUpstream, Upstream};
use crate::server::{router, ServerState};

/// How often expired cache entries are dropped
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Campaign calendar - caching proxy for the event widgets
#[derive(Parser)]
#[command(name = "campaign-calendar")]
#[command(about = "Caching proxy between the event widgets and the CRM API")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the proxy server (default)
    Serve(ServeArgs),

    /// Show or initialize the configuration
    Config(ConfigArgs),
}

#[derive(Args, Default)]
pub struct ServeArgs {
    /// Address to listen on, overrides the config file
    #[arg(long)]
    pub bind: Option<String>,

    /// CRM organization id, overrides the config file
    #[arg(long)]
    pub org_id: Option<String>,

    /// CRM API key, overrides the config file
    #[arg(long, env = "CAMPAIGN_CALENDAR_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Write a default configuration file if none exists
    #[arg(long)]
    pub init: bool,
}

/// Command-line interface handler
pub struct CliHandler {
    config_path: PathBuf,
    config: ProxyConfig,
}

impl CliHandler {
    pub fn new(config_path: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => ProxyConfig::default_path()?,
        };
        let config = ProxyConfig::load(Some(&config_path))
            .with_context(|| format!("loading {}", config_path.display()))?;
        Ok(Self {
            config_path,
            config,
        })
    }

    /// Handle CLI commands
    pub async fn handle_command(&self, command: Option<Commands>) -> Result<()> {
        match command {
            Some(Commands::Serve(args)) => self.handle_serve(args).await,
            Some(Commands::Config(args)) => self.handle_config(args),
            None => self.handle_serve(ServeArgs::default()).await,
        }
    }

    async fn handle_serve(&self, args: ServeArgs) -> Result<()> {
        let config = Arc::new(apply_overrides(self.config.clone(), args));
        if let Err(e) = config.credentials() {
            tracing::warn!("Proxy is not configured ({}), requests will fail", e.code());
        }

        let upstream = HttpUpstream::new(config.request_timeout(), config.credentials().ok())?;
        let proxy = Arc::new(CacheAsideProxy::new(Arc::new(upstream) as Arc<dyn Upstream>));

        let purge = {
            let proxy = Arc::clone(&proxy);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(PURGE_INTERVAL);
                loop {
                    interval.tick().await;
                    proxy.purge_expired().await;
                }
            })
        };

        let listener = tokio::net::TcpListener::bind(&config.bind)
            .await
            .with_context(|| format!("binding {}", config.bind))?;
        tracing::info!("Listening on {}", config.bind);

        let app = router(ServerState {
            proxy,
            config: Arc::clone(&config),
        });
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for shutdown signal: {}", e);
                }
                tracing::info!("Shutting down");
            })
            .await;

        purge.abort();
        served.context("server error")
    }

    fn handle_config(&self, args: ConfigArgs) -> Result<()> {
        if args.init {
            if self.config_path.exists() {
                println!("Config already exists at {}", self.config_path.display());
            } else {
                ProxyConfig::default().save(&self.config_path)?;
                println!("Wrote default config to {}", self.config_path.display());
            }
            return Ok(());
        }

        println!("Config file: {}", self.config_path.display());
        println!("  bind:            {}", self.config.bind);
        println!("  upstream_url:    {}", self.config.upstream_url);
        println!("  org_id:          {}", display_or_unset(&self.config.org_id));
        println!(
            "  api_key:         {}",
            if self.config.api_key.is_empty() { "(unset)" } else { "********" }
        );
        println!("  events TTL:      {}s", self.config.events_ttl_secs);
        println!("  listing TTL:     {}s", self.config.listing_ttl_secs);
        match self.config.credentials() {
            Ok(_) => println!("Credentials: ok"),
            Err(e) => println!("Credentials: {} ({})", e, e.code()),
        }
        Ok(())
    }
}

fn display_or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(unset)"
    } else {
        value
    }
}

fn apply_overrides(mut config: ProxyConfig, args: ServeArgs) -> ProxyConfig {
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(org_id) = args.org_id {
        config.org_id = org_id;
    }
    if let Some(api_key) = args.api_key {
        config.api_key = api_key;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_flags() {
        let cli = Cli::parse_from([
            "campaign-calendar",
            "--debug",
            "serve",
            "--bind",
            "0.0.0.0:9000",
            "--org-id",
            "acme",
        ]);
        assert!(cli.debug);
        let Some(Commands::Serve(args)) = cli.command else {
            panic!("expected serve");
        };
        let config = apply_overrides(ProxyConfig::default(), args);
        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(config.org_id, "acme");
        assert_eq!(config.events_ttl_secs, 300);
    }

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::parse_from(["campaign-calendar", "--config", "/tmp/proxy.toml"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/proxy.toml")));
    }
}
