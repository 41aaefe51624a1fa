use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use dhcpd_core::tokio::{self, task::JoinHandle};

const STARTUP_STABILIZATION_WINDOW: Duration = Duration::from_millis(300);

pub async fn verify_startup_subsystems(
    admin_task: &mut JoinHandle<()>,
    udp_task: &mut JoinHandle<()>,
    sweeper_task: &mut JoinHandle<()>,
) -> Result<()> {
    verify_background_task_running("admin api", admin_task)
        .await
        .context("startup check failed")?;
    verify_background_task_running("dhcpv4 udp server", udp_task)
        .await
        .context("startup check failed")?;
    verify_background_task_running("expiry sweeper", sweeper_task)
        .await
        .context("startup check failed")?;
    Ok(())
}

pub async fn verify_background_task_running(name: &str, task: &mut JoinHandle<()>) -> Result<()> {
    match tokio::time::timeout(STARTUP_STABILIZATION_WINDOW, task).await {
        Err(_) => Ok(()),
        Ok(join_res) => match join_res {
            Ok(()) => Err(anyhow!("{name} exited during startup stabilization window")),
            Err(err) => Err(anyhow!("{name} panicked during startup: {err}")),
        },
    }
}
