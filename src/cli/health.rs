use anyhow::{anyhow, Result};
use tracing::debug;

use crate::app::App;

/// Check that the assistant backend is reachable and ready
pub struct HealthCommand;

impl HealthCommand {
    pub async fn execute(&self, app: &App) -> Result<()> {
        let backend = app.backend();
        debug!("Checking health of {}", backend.base_url());

        let health = backend
            .health()
            .await
            .map_err(|e| anyhow!("Backend at {} is unreachable: {}", backend.base_url(), e))?;

        println!(
            "{}: status={}, agent_loaded={}",
            backend.base_url(),
            health.status,
            health.agent_loaded
        );

        if health.is_healthy() {
            Ok(())
        } else {
            Err(anyhow!("Backend is up but not ready to answer questions"))
        }
    }
}
