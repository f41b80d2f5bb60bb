//! Recorder Web Server

use anyhow::{Context, Result};
use axum::Router;
use colored::Colorize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use super::routes::{api_router, AppState};
use crate::driver::web::PlaywrightDriver;
use crate::locator::LocatorStore;
use crate::quality::{QualityAnalyzer, RuleSource};
use crate::recorder::{CaptureScript, RecorderService, StepMapper};
use crate::utils::Config;

/// Build the full application router around a service
pub fn app(service: AppState) -> Router {
    api_router()
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// Main recorder server
pub struct RecorderServer {
    config: Config,
}

impl RecorderServer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Wire the orchestrator from configuration. Rules are validated here so a
    /// broken rules file fails at startup instead of on the first stop.
    pub async fn build_service(&self) -> Result<Arc<RecorderService>> {
        let driver = PlaywrightDriver::new(self.config.web_driver_config())
            .await
            .context("Failed to initialize Playwright")?;

        let mapper = StepMapper::new(Arc::new(LocatorStore::new(&self.config.locators_dir)));

        let source = match &self.config.quality_rules {
            Some(path) => RuleSource::File(path.clone()),
            None => RuleSource::Builtin,
        };
        let analyzer = Arc::new(QualityAnalyzer::new(source));
        analyzer.rules().await.context("Invalid quality rules")?;

        Ok(Arc::new(RecorderService::new(
            Arc::new(driver),
            mapper,
            analyzer,
            CaptureScript::new(&self.config.public_base_url()),
            self.config.poll_interval(),
        )))
    }

    /// Start the server and block until Ctrl+C
    pub async fn start(&self) -> Result<()> {
        let service = self.build_service().await?;
        let app = app(service.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));

        println!("\n{} Recorder started!", "🔴".to_string().red().bold());
        println!("   API: http://localhost:{}/api/recorder", self.config.port);
        println!("   Events posted to: {}", self.config.public_base_url().cyan());
        println!("   Browser: {}", self.config.browser.browser_type.cyan());
        println!("   Locators: {}", self.config.locators_dir.display());
        println!("\n   Press Ctrl+C to stop.\n");

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind port {}", self.config.port))?;
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        let open = service.registry().len().await;
        if open > 0 {
            println!("{} Closing {} open session(s)...", "⏹".yellow(), open);
        }
        service.registry().close_all().await;

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
