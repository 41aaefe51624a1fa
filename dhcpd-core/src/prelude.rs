//! dhcpd-core prelude

pub use crate::{
    anyhow::{self, Context, Result},
    async_trait,
    error::Error,
    mac_address::MacAddress,
    store::Store,
    tracing::{self, debug, error, info, instrument, trace, warn},
};

pub use std::sync::Arc;
