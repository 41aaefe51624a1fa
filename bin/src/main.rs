//! dhcpd entry point: parse config, connect the store, bootstrap Options,
//! and run the UDP server, expiry sweeper, and admin HTTP surface to
//! completion under a shared shutdown signal.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio_util::sync::CancellationToken;

mod startup_health;

use admin_api::AdminApi;
use dhcpd_core::{
    config::{cli, trace},
    model::Options,
    options_cache::OptionsCache,
    server::UdpServer,
    store::{sqlite::SqliteStore, Store},
    sweeper::ExpirySweeper,
    tokio::{self, runtime::Builder, signal},
    tracing::*,
};
use startup_health::verify_startup_subsystems;

fn main() -> Result<()> {
    let config = cli::Config::parse();
    let trace_config = trace::Config::parse(&config.dhcpd_log, &config.log_format)?;
    debug!(?config, ?trace_config);
    if let Err(err) = dotenv::dotenv() {
        debug!(?err, ".env file not loaded");
    }

    let mut builder = Builder::new_multi_thread();
    builder.thread_name(&config.thread_name).enable_all();
    if let Some(num) = config.threads {
        builder.worker_threads(num);
    }
    let rt = builder.build()?;

    rt.block_on(async move {
        match tokio::spawn(async move { start(config).await }).await {
            Err(err) => error!(?err, "failed to start server"),
            Ok(Err(err)) => error!(?err, "exited with error"),
            Ok(_) => debug!("exiting..."),
        }
    });

    Ok(())
}

async fn start(config: cli::Config) -> Result<()> {
    debug!("connecting to database");
    let store: Arc<dyn Store> = Arc::new(
        SqliteStore::connect(&config.database_url, config.pool_options())
            .await
            .map_err(|err| anyhow!("connecting to database: {err}"))?,
    );

    bootstrap_options(store.as_ref()).await?;

    let cache = Arc::new(OptionsCache::new());
    // prime the cache so a transient store blip right after startup still has
    // a snapshot to fall back on
    cache
        .query(store.as_ref())
        .await
        .map_err(|err| anyhow!("priming options cache: {err}"))?;

    debug!(addr = %config.v4_addr, interface = ?config.interface, "binding dhcpv4 socket");
    let udp = UdpServer::bind(config.v4_addr, config.interface.as_deref())
        .map_err(|err| anyhow!("binding dhcpv4 socket: {err}"))?;

    let admin = AdminApi::new(config.admin_addr, Arc::clone(&store), Arc::clone(&cache));
    let admin_health = admin.sender();

    let token = CancellationToken::new();

    let mut admin_task = admin.start();
    let mut udp_task = tokio::spawn(udp.serve(Arc::clone(&store), Arc::clone(&cache), token.clone()));
    let mut sweeper_task = tokio::spawn(ExpirySweeper::run(
        Arc::clone(&store),
        config.sweep_interval(),
        token.clone(),
    ));

    if let Err(err) =
        verify_startup_subsystems(&mut admin_task, &mut udp_task, &mut sweeper_task).await
    {
        let _ = admin_health.send(admin_api::Health::Bad).await;
        token.cancel();
        return Err(err);
    }
    debug!("changing health to good after startup checks passed");
    admin_health
        .send(admin_api::Health::Good)
        .await
        .context("error occurred in changing health status to Good")?;
    info!("dhcpd startup checks passed");

    tokio::select! {
        _ = shutdown_signal() => {
            info!("shutdown signal received");
            token.cancel();
        }
        res = &mut admin_task => {
            if let Err(err) = res {
                error!(?err, "admin api task exited unexpectedly");
            }
            let _ = admin_health.send(admin_api::Health::Bad).await;
            token.cancel();
        }
        res = &mut udp_task => {
            if let Err(err) = res {
                error!(?err, "dhcpv4 udp server task exited unexpectedly");
            }
            let _ = admin_health.send(admin_api::Health::Bad).await;
            token.cancel();
        }
        res = &mut sweeper_task => {
            if let Err(err) = res {
                error!(?err, "expiry sweeper task exited unexpectedly");
            }
            let _ = admin_health.send(admin_api::Health::Bad).await;
            token.cancel();
        }
    }

    Ok(())
}

/// insert the §6 bootstrap defaults if the Options row doesn't exist yet
async fn bootstrap_options(store: &dyn Store) -> Result<()> {
    match store.options_get().await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => {
            info!("no options row found, inserting bootstrap defaults");
            store
                .options_create(&Options::bootstrap_default())
                .await
                .context("inserting bootstrap options")?;
            Ok(())
        }
        Err(err) => Err(anyhow!("reading options row at startup: {err}")),
    }
}

async fn shutdown_signal() -> Result<()> {
    signal::ctrl_c().await.map_err(|err| anyhow!(err))
}
