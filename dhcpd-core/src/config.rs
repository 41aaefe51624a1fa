//! server configuration: CLI/env parsing and tracing setup

pub mod cli {
    //! parses from either cli flags or environment variables

    /// default DHCPv4 listen address
    pub static DEFAULT_V4_ADDR: &str = "0.0.0.0:67";
    /// default admin HTTP listen address
    pub static DEFAULT_ADMIN_ADDR: &str = "0.0.0.0:3333";
    /// default database url; use "sqlite::memory:" for an in-memory store
    pub static DEFAULT_DATABASE_URL: &str = "/var/lib/dhcpd/leases.db";
    /// default tokio worker thread name
    pub static DEFAULT_THREAD_NAME: &str = "dhcpd-worker";
    /// default log level, also settable via the `DHCPD_LOG` env var
    pub static DEFAULT_LOG_LEVEL: &str = "info";
    /// cadence of the expiry sweeper, in seconds
    pub const DEFAULT_SWEEP_INTERVAL: u64 = 60;

    use std::{net::SocketAddr, time::Duration};

    pub use clap::Parser;

    /// parses from cli & environment vars; dhcpd will load `.env` in the
    /// binary's directory as well
    #[derive(Parser, Debug, Clone, PartialEq, Eq)]
    #[clap(author, name = "dhcpd", bin_name = "dhcpd", about, long_about = None)]
    pub struct Config {
        /// the address to listen on for DHCPv4 datagrams
        #[clap(long, env, value_parser, default_value = DEFAULT_V4_ADDR)]
        pub v4_addr: SocketAddr,
        /// bind the DHCPv4 socket to a single link-layer interface (e.g. "eth0")
        #[clap(long, env, value_parser)]
        pub interface: Option<String>,
        /// the address the admin HTTP surface listens on
        #[clap(long, env, value_parser, default_value = DEFAULT_ADMIN_ADDR)]
        pub admin_addr: SocketAddr,
        /// database url; "sqlite::memory:" for an in-memory store
        #[clap(long, env, value_parser, default_value = DEFAULT_DATABASE_URL)]
        pub database_url: String,
        /// maximum number of idle pooled connections
        #[clap(long, env, value_parser, default_value_t = 5)]
        pub db_pool_max_idle: u32,
        /// maximum number of open pooled connections
        #[clap(long, env, value_parser, default_value_t = 10)]
        pub db_pool_max_open: u32,
        /// maximum lifetime of a pooled connection, in seconds
        #[clap(long, env, value_parser, default_value_t = 3600)]
        pub db_pool_max_lifetime_secs: u64,
        /// how often the expiry sweeper runs, in seconds
        #[clap(long, env, value_parser, default_value_t = DEFAULT_SWEEP_INTERVAL)]
        pub sweep_interval_secs: u64,
        /// worker thread name
        #[clap(long, env, value_parser, default_value = DEFAULT_THREAD_NAME)]
        pub thread_name: String,
        /// number of tokio worker threads; default is the number of logical CPUs
        #[clap(long, env, value_parser)]
        pub threads: Option<usize>,
        /// set the log level; all valid `RUST_LOG` values are accepted
        #[clap(long, env, value_parser, default_value = DEFAULT_LOG_LEVEL)]
        pub dhcpd_log: String,
        /// log format: "standard", "json", or "pretty"
        #[clap(long, env, value_parser, default_value = "standard")]
        pub log_format: String,
        /// enable verbose startup diagnostics
        #[clap(long, env)]
        pub debug: bool,
    }

    impl Config {
        /// the expiry sweeper's tick interval as a `Duration`
        pub fn sweep_interval(&self) -> Duration {
            Duration::from_secs(self.sweep_interval_secs)
        }

        /// pool tuning derived from the parsed flags
        pub fn pool_options(&self) -> crate::store::sqlite::PoolOptions {
            crate::store::sqlite::PoolOptions {
                max_idle: self.db_pool_max_idle,
                max_open: self.db_pool_max_open,
                max_lifetime_secs: self.db_pool_max_lifetime_secs,
            }
        }
    }
}

pub mod trace {
    //! tracing-subscriber setup, selected by `--log-format`

    use anyhow::Result;
    use tracing_subscriber::{
        filter::EnvFilter,
        fmt::{
            self,
            format::{Format, PrettyFields},
        },
        prelude::__tracing_subscriber_SubscriberExt,
        util::SubscriberInitExt,
    };

    /// runtime tracing configuration
    #[derive(Debug)]
    pub struct Config {
        /// formatting applied to emitted logs
        pub log_format: String,
    }

    impl Config {
        /// build and install the global subscriber from a log level and format
        pub fn parse(log_level: &str, log_format: &str) -> Result<Self> {
            let filter = EnvFilter::try_new(log_level)
                .or_else(|_| EnvFilter::try_new("info"))?
                .add_directive("hyper=off".parse()?)
                .add_directive("sqlx=warn".parse()?);

            match log_format {
                "json" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().json())
                        .init();
                }
                "pretty" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(
                            fmt::layer()
                                .event_format(
                                    Format::default().pretty().with_source_location(false),
                                )
                                .fmt_fields(PrettyFields::new()),
                        )
                        .init();
                }
                _ => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer())
                        .init();
                }
            }

            Ok(Self {
                log_format: log_format.to_string(),
            })
        }
    }
}
