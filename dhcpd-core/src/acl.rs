//! allow/deny gate consulted on DISCOVER and REQUEST (§4.4)

use mac_address::MacAddress;
use tracing::warn;

use crate::{
    model::{AclAction, Options},
    store::Store,
};

/// decides whether a client's message should be answered at all
#[derive(Debug, Clone, Copy)]
pub struct AclGate;

impl AclGate {
    /// `true` if the client is allowed to proceed, per the §4.4 truth table
    ///
    /// store errors and unknown `acl_action` values fail closed (deny).
    pub async fn decide(store: &dyn Store, client: MacAddress, options: &Options) -> bool {
        if !options.acl_enabled {
            return true;
        }

        let action: AclAction = match options.acl_action.parse() {
            Ok(action) => action,
            Err(_) => {
                warn!(acl_action = %options.acl_action, "unknown acl_action, failing closed");
                return false;
            }
        };

        let matched = match store.acl_has_match(client, action).await {
            Ok(matched) => matched,
            Err(err) => {
                warn!(%err, "acl store lookup failed, failing closed");
                return false;
            }
        };

        match action {
            AclAction::Allow => matched,
            AclAction::Deny => !matched,
        }
    }
}
