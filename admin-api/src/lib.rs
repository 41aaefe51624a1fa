//! # admin-api
//!
//! the HTTP admin surface: health/metrics endpoints plus the full
//! inform/set/update/del CRUD described in spec §6. A thin layer over
//! [`dhcpd_core::store::Store`] — validation lives in [`validation`], route
//! handlers in [`handlers`].
//!
//! grounded on `external-api/src/lib.rs`'s `ExternalApi`/`ExternalApiGuard`
//! (health-channel listener, `Drop`-aborted task handle), extended with the
//! CRUD routes this server's spec actually needs.
#![warn(
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]
#![deny(rustdoc::broken_intra_doc_links)]
#![allow(clippy::cognitive_complexity, clippy::too_many_arguments)]

mod handlers;
mod models;
mod validation;

pub use models::ResMsg;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Result};
use axum::{routing, Extension, Router};
use tower_http::trace::TraceLayer;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::mpsc, task::JoinHandle};
use tracing::{error, info, trace};

use dhcpd_core::options_cache::OptionsCache;
use dhcpd_core::store::Store;

/// binary health state reported at `/health`
#[derive(Serialize, Deserialize, Debug, PartialEq, Copy, Clone, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Health {
    /// the server is ready to serve
    Good,
    /// startup checks have not yet passed, or a subsystem has failed
    Bad,
}

type HealthState = Arc<Mutex<Health>>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) cache: Arc<OptionsCache>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

/// the task runner for [`AdminApi`]
#[derive(Debug)]
pub struct AdminApiGuard {
    task_handle: JoinHandle<()>,
}

impl Drop for AdminApiGuard {
    fn drop(&mut self) {
        trace!("AdminApiGuard drop called");
        self.task_handle.abort();
    }
}

/// the admin HTTP surface: health reporting plus the §6 CRUD routes
#[derive(Debug)]
pub struct AdminApi {
    tx: mpsc::Sender<Health>,
    rx: mpsc::Receiver<Health>,
    addr: SocketAddr,
    health: HealthState,
    state: AppState,
}

impl AdminApi {
    /// build a new admin surface over `store`/`cache`, listening on `addr`
    pub fn new(addr: SocketAddr, store: Arc<dyn Store>, cache: Arc<OptionsCache>) -> Self {
        trace!("starting admin api");
        let (tx, rx) = mpsc::channel(10);
        Self {
            tx,
            rx,
            addr,
            health: Arc::new(Mutex::new(Health::Bad)),
            state: AppState { store, cache },
        }
    }

    /// clone the health sender channel
    pub fn sender(&self) -> mpsc::Sender<Health> {
        self.tx.clone()
    }

    /// listen for health transitions sent over the channel
    async fn listen_status(&mut self) -> Result<()> {
        while let Some(health) = self.rx.recv().await {
            let mut guard = self.health.lock();
            if *guard != health {
                *guard = health;
            }
        }
        info!("admin api health listener exited-- nothing listening");
        Ok(())
    }

    fn router(health: HealthState, state: AppState) -> Router {
        Router::new()
            .route("/health", routing::get(health::ok))
            .route("/ping", routing::get(health::ping))
            .route("/metrics", routing::get(health::metrics))
            .route("/metrics-text", routing::get(health::metrics_text))
            .route("/api/v1/inform/:tag", routing::get(handlers::inform))
            .route("/api/v1/set/options", routing::post(handlers::set_options))
            .route(
                "/api/v1/update/options",
                routing::put(handlers::update_options),
            )
            .route("/api/v1/set/bind", routing::post(handlers::set_bind))
            .route("/api/v1/update/bind", routing::put(handlers::update_bind))
            .route("/api/v1/del/bind", routing::delete(handlers::del_bind))
            .route("/api/v1/set/acl", routing::post(handlers::set_acl))
            .route("/api/v1/update/acl", routing::put(handlers::update_acl))
            .route("/api/v1/del/acl", routing::delete(handlers::del_acl))
            .route("/api/v1/set/reserve", routing::post(handlers::set_reserve))
            .route("/api/v1/del/reserve", routing::delete(handlers::del_reserve))
            .layer(Extension(health))
            .layer(Extension(state))
            .layer(TraceLayer::new_for_http())
    }

    async fn run(addr: SocketAddr, health: HealthState, state: AppState) -> Result<()> {
        let tcp = TcpListener::bind(&addr).await?;
        let app = Self::router(health, state);
        tracing::debug!("admin API listening on {}", addr);
        axum::serve(tcp, app).await?;
        bail!("admin API returned-- should not happen")
    }

    /// kick off the HTTP service and start listening for health transitions
    pub fn start(mut self) -> JoinHandle<()> {
        let health = Arc::clone(&self.health);
        let addr = self.addr;
        let state = self.state.clone();

        tokio::spawn(async move {
            if let Err(err) =
                tokio::try_join!(AdminApi::run(addr, health, state), self.listen_status())
            {
                error!(?err, "admin api task returning, this should not happen")
            }
        })
    }

    /// start the admin API and return a guard that aborts it on drop
    pub fn serve(self) -> AdminApiGuard {
        AdminApiGuard {
            task_handle: self.start(),
        }
    }
}

mod health {
    use axum::body::Body;
    use axum::extract::Extension;
    use axum::http::{header, Response, StatusCode};
    use axum::response::IntoResponse;
    use dhcpd_core::metrics::{START_TIME, UPTIME};
    use prometheus::{Encoder, ProtobufEncoder, TextEncoder};
    use tracing::error;

    use super::{Health, HealthState};

    pub(crate) async fn ok(
        Extension(health): Extension<HealthState>,
    ) -> Result<impl IntoResponse, std::convert::Infallible> {
        Ok(match *health.lock() {
            Health::Good => StatusCode::OK,
            Health::Bad => StatusCode::INTERNAL_SERVER_ERROR,
        })
    }

    pub(crate) async fn ping() -> impl IntoResponse {
        StatusCode::OK
    }

    pub(crate) async fn metrics() -> Result<impl IntoResponse, std::convert::Infallible> {
        UPTIME.set(START_TIME.elapsed().as_secs() as i64);
        let encoder = ProtobufEncoder::new();
        let mut buf = Vec::new();
        let mf = prometheus::gather();
        let resp = Response::builder().header(header::CONTENT_TYPE, encoder.format_type());
        match encoder.encode(&mf, &mut buf) {
            Err(err) => {
                error!(?err, "error protobuf encoding prometheus metrics");
                Ok(resp
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(Body::empty())
                    .unwrap())
            }
            Ok(_) => Ok(resp.status(StatusCode::OK).body(Body::from(buf)).unwrap()),
        }
    }

    pub(crate) async fn metrics_text() -> Result<impl IntoResponse, std::convert::Infallible> {
        UPTIME.set(START_TIME.elapsed().as_secs() as i64);
        let encoder = TextEncoder::new();
        let mut buf = String::new();
        let mf = prometheus::gather();
        let resp = Response::builder().header(header::CONTENT_TYPE, encoder.format_type());
        match encoder.encode_utf8(&mf, &mut buf) {
            Err(err) => {
                error!(?err, "error text encoding prometheus metrics");
                Ok(resp
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(Body::empty())
                    .unwrap())
            }
            Ok(_) => Ok(resp.status(StatusCode::OK).body(Body::from(buf)).unwrap()),
        }
    }
}
