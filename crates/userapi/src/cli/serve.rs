use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use tracing::info;

use userapi_runtime::{Database, GatewayConfig, GatewayServer, PgUserRepository, UserService};

use super::{init_tracing, load_config, GlobalArgs};

/// Run the HTTP server.
#[derive(Parser)]
pub struct ServeCommand {
    /// Port to listen on (overrides config).
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl ServeCommand {
    pub async fn execute(self, globals: &GlobalArgs) -> Result<()> {
        let Some(mut config) = load_config(&globals.config)? else {
            anyhow::bail!(
                "Configuration file not found: {}\nCreate one or set DATABASE_URL.",
                globals.config.display()
            );
        };

        init_tracing(&config.logging.level, config.logging.format);

        if let Some(port) = self.port {
            config.server.port = port;
        }

        println!();
        println!(
            "  {} v{}",
            style("userapi").bold().cyan(),
            env!("CARGO_PKG_VERSION")
        );
        println!(
            "  {} Listening on {}",
            style("→").dim(),
            style(format!("http://0.0.0.0:{}", config.server.port)).cyan()
        );
        println!();

        info!("Loading configuration from {}", globals.config.display());

        let db = Database::from_config(&config.database)
            .await
            .context("Failed to connect to database")?;
        db.health_check().await.context("Database health check failed")?;

        let repo = PgUserRepository::new(db.pool().clone());
        let service = UserService::from_config(repo, &config.cache);
        let server = GatewayServer::new(GatewayConfig::from(&config.server), service);

        server.run().await.context("Gateway server failed")?;
        db.close().await;

        println!("\n  {} Goodbye!", style("👋").bold());
        Ok(())
    }
}
