//! sqlite-backed [`Store`] implementation
//!
//! grounded on `ip-manager`'s `SqliteDb`, but uses the runtime `sqlx::query`/
//! `query_as` API rather than the compile-time-checked `query!` macros — the
//! macros need a reachable database or cached query metadata at build time.

use std::net::Ipv4Addr;
use std::str::FromStr;

use mac_address::MacAddress;
use sqlx::{Row, sqlite::SqlitePoolOptions, SqlitePool};

use super::Store;
use crate::{
    error::Error,
    model::{AclAction, AclRule, Binding, Lease, Options, Reservation},
};

/// pool tuning knobs, CLI-configurable per §6
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    /// maximum number of idle connections kept open
    pub max_idle: u32,
    /// maximum number of connections the pool will open
    pub max_open: u32,
    /// maximum lifetime of a single connection, in seconds
    pub max_lifetime_secs: u64,
}

impl Default for PoolOptions {
    fn default() -> Self {
        PoolOptions {
            max_idle: 5,
            max_open: 10,
            max_lifetime_secs: 3600,
        }
    }
}

/// `sqlx::SqlitePool`-backed [`Store`]
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// connect to `database_url`, apply pool tuning, and run migrations
    pub async fn connect(database_url: &str, opts: PoolOptions) -> Result<Self, Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(opts.max_open)
            .min_connections(opts.max_idle)
            .max_lifetime(std::time::Duration::from_secs(opts.max_lifetime_secs))
            .connect(database_url)
            .await
            .map_err(|err| Error::Fatal(format!("connecting to {database_url}: {err}")))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|err| Error::Fatal(format!("running migrations: {err}")))?;

        Ok(SqliteStore { pool })
    }

    /// wrap an already-open pool (used by tests against `sqlite::memory:`)
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, Error> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|err| Error::Fatal(format!("running migrations: {err}")))?;
        Ok(SqliteStore { pool })
    }
}

fn parse_mac(s: &str) -> Result<MacAddress, Error> {
    MacAddress::from_str(s).map_err(|err| Error::StoreUnavailable(format!("corrupt mac {s:?}: {err}")))
}

fn parse_addr(s: &str) -> Result<Ipv4Addr, Error> {
    s.parse()
        .map_err(|_| Error::StoreUnavailable(format!("corrupt address {s:?}")))
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    async fn options_get(&self) -> Result<Option<Options>, Error> {
        let row = sqlx::query(
            "SELECT lease_time, server_ip, gateway_ip, range_start_ip, range_end_ip, netmask, \
             boot_file_name, router, dns, acl_enabled, acl_action FROM options WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(Options {
            lease_time: row.try_get("lease_time")?,
            server_ip: parse_addr(&row.try_get::<String, _>("server_ip")?)?,
            gateway_ip: parse_addr(&row.try_get::<String, _>("gateway_ip")?)?,
            range_start_ip: parse_addr(&row.try_get::<String, _>("range_start_ip")?)?,
            range_end_ip: parse_addr(&row.try_get::<String, _>("range_end_ip")?)?,
            netmask: row.try_get("netmask")?,
            boot_file_name: row.try_get("boot_file_name")?,
            router: row.try_get("router")?,
            dns: row.try_get("dns")?,
            acl_enabled: row.try_get("acl_enabled")?,
            acl_action: row.try_get("acl_action")?,
        }))
    }

    async fn options_create(&self, opts: &Options) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO options (id, lease_time, server_ip, gateway_ip, range_start_ip, \
             range_end_ip, netmask, boot_file_name, router, dns, acl_enabled, acl_action) \
             VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&opts.lease_time)
        .bind(opts.server_ip.to_string())
        .bind(opts.gateway_ip.to_string())
        .bind(opts.range_start_ip.to_string())
        .bind(opts.range_end_ip.to_string())
        .bind(&opts.netmask)
        .bind(&opts.boot_file_name)
        .bind(&opts.router)
        .bind(&opts.dns)
        .bind(opts.acl_enabled)
        .bind(&opts.acl_action)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn options_save(&self, opts: &Options) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO options (id, lease_time, server_ip, gateway_ip, range_start_ip, \
             range_end_ip, netmask, boot_file_name, router, dns, acl_enabled, acl_action) \
             VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET lease_time = excluded.lease_time, \
             server_ip = excluded.server_ip, gateway_ip = excluded.gateway_ip, \
             range_start_ip = excluded.range_start_ip, range_end_ip = excluded.range_end_ip, \
             netmask = excluded.netmask, boot_file_name = excluded.boot_file_name, \
             router = excluded.router, dns = excluded.dns, acl_enabled = excluded.acl_enabled, \
             acl_action = excluded.acl_action",
        )
        .bind(&opts.lease_time)
        .bind(opts.server_ip.to_string())
        .bind(opts.gateway_ip.to_string())
        .bind(opts.range_start_ip.to_string())
        .bind(opts.range_end_ip.to_string())
        .bind(&opts.netmask)
        .bind(&opts.boot_file_name)
        .bind(&opts.router)
        .bind(&opts.dns)
        .bind(opts.acl_enabled)
        .bind(&opts.acl_action)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn lease_find_by_mac(&self, mac: MacAddress) -> Result<Option<Lease>, Error> {
        let row = sqlx::query("SELECT client_hw_addr, assigned_addr, expires FROM leases WHERE client_hw_addr = ?")
            .bind(mac.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_lease).transpose()
    }

    async fn lease_find_by_addr(&self, addr: Ipv4Addr) -> Result<Option<Lease>, Error> {
        let row = sqlx::query("SELECT client_hw_addr, assigned_addr, expires FROM leases WHERE assigned_addr = ?")
            .bind(addr.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_lease).transpose()
    }

    async fn lease_create(&self, lease: &Lease) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO leases (client_hw_addr, assigned_addr, expires) VALUES (?, ?, ?)",
        )
        .bind(lease.client_hw_addr.to_string())
        .bind(lease.assigned_addr.to_string())
        .bind(lease.expires)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn lease_save(&self, lease: &Lease) -> Result<(), Error> {
        sqlx::query("UPDATE leases SET assigned_addr = ?, expires = ? WHERE client_hw_addr = ?")
            .bind(lease.assigned_addr.to_string())
            .bind(lease.expires)
            .bind(lease.client_hw_addr.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn lease_delete_by_mac(&self, mac: MacAddress) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM leases WHERE client_hw_addr = ?")
            .bind(mac.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn lease_delete_expired(&self, threshold: i64) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM leases WHERE expires < ?")
            .bind(threshold)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn lease_list(&self) -> Result<Vec<Lease>, Error> {
        let rows = sqlx::query("SELECT client_hw_addr, assigned_addr, expires FROM leases")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_lease).collect()
    }

    async fn binding_find_by_mac(&self, mac: MacAddress) -> Result<Option<Binding>, Error> {
        let row = sqlx::query("SELECT client_hw_addr, bind_addr FROM bindings WHERE client_hw_addr = ?")
            .bind(mac.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_binding).transpose()
    }

    async fn binding_find_by_addr(&self, addr: Ipv4Addr) -> Result<Option<Binding>, Error> {
        let row = sqlx::query("SELECT client_hw_addr, bind_addr FROM bindings WHERE bind_addr = ?")
            .bind(addr.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_binding).transpose()
    }

    async fn binding_create(&self, binding: &Binding) -> Result<(), Error> {
        sqlx::query("INSERT INTO bindings (client_hw_addr, bind_addr) VALUES (?, ?)")
            .bind(binding.client_hw_addr.to_string())
            .bind(binding.bind_addr.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn binding_save(&self, binding: &Binding) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO bindings (client_hw_addr, bind_addr) VALUES (?, ?) \
             ON CONFLICT(client_hw_addr) DO UPDATE SET bind_addr = excluded.bind_addr",
        )
        .bind(binding.client_hw_addr.to_string())
        .bind(binding.bind_addr.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn binding_delete(
        &self,
        mac: Option<MacAddress>,
        addr: Option<Ipv4Addr>,
    ) -> Result<u64, Error> {
        let result = match (mac, addr) {
            (Some(mac), Some(addr)) => {
                sqlx::query("DELETE FROM bindings WHERE client_hw_addr = ? AND bind_addr = ?")
                    .bind(mac.to_string())
                    .bind(addr.to_string())
                    .execute(&self.pool)
                    .await?
            }
            (Some(mac), None) => {
                sqlx::query("DELETE FROM bindings WHERE client_hw_addr = ?")
                    .bind(mac.to_string())
                    .execute(&self.pool)
                    .await?
            }
            (None, Some(addr)) => {
                sqlx::query("DELETE FROM bindings WHERE bind_addr = ?")
                    .bind(addr.to_string())
                    .execute(&self.pool)
                    .await?
            }
            (None, None) => {
                return Err(Error::InvalidInput(
                    "binding delete requires a mac or an address".into(),
                ));
            }
        };
        Ok(result.rows_affected())
    }

    async fn binding_list(&self) -> Result<Vec<Binding>, Error> {
        let rows = sqlx::query("SELECT client_hw_addr, bind_addr FROM bindings")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_binding).collect()
    }

    async fn reservation_find(&self, addr: Ipv4Addr) -> Result<Option<Reservation>, Error> {
        let row = sqlx::query("SELECT address FROM reservations WHERE address = ?")
            .bind(addr.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| -> Result<Reservation, Error> {
            Ok(Reservation {
                address: parse_addr(&row.try_get::<String, _>("address")?)?,
            })
        })
        .transpose()
    }

    async fn reservation_create(&self, reservation: &Reservation) -> Result<(), Error> {
        sqlx::query("INSERT INTO reservations (address) VALUES (?)")
            .bind(reservation.address.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reservation_delete(&self, addr: Ipv4Addr) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM reservations WHERE address = ?")
            .bind(addr.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn reservation_list(&self) -> Result<Vec<Reservation>, Error> {
        let rows = sqlx::query("SELECT address FROM reservations")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| -> Result<Reservation, Error> {
                Ok(Reservation {
                    address: parse_addr(&row.try_get::<String, _>("address")?)?,
                })
            })
            .collect()
    }

    async fn acl_has_match(&self, mac: MacAddress, action: AclAction) -> Result<bool, Error> {
        let row = sqlx::query(
            "SELECT COUNT(*) as n FROM acl_rules WHERE client_hw_addr = ? AND action = ?",
        )
        .bind(mac.to_string())
        .bind(action.to_string())
        .fetch_one(&self.pool)
        .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n > 0)
    }

    async fn acl_create(&self, rule: &AclRule) -> Result<(), Error> {
        sqlx::query("INSERT INTO acl_rules (client_hw_addr, action) VALUES (?, ?)")
            .bind(rule.client_hw_addr.to_string())
            .bind(rule.action.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn acl_save(&self, rule: &AclRule) -> Result<(), Error> {
        // the unique index is on (client_hw_addr, action), not client_hw_addr
        // alone, so an ON CONFLICT upsert can't replace an existing rule that
        // names a different action for this mac -- clear this mac's rules
        // first, then insert the new one, in one transaction.
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM acl_rules WHERE client_hw_addr = ?")
            .bind(rule.client_hw_addr.to_string())
            .execute(&mut tx)
            .await?;
        sqlx::query("INSERT INTO acl_rules (client_hw_addr, action) VALUES (?, ?)")
            .bind(rule.client_hw_addr.to_string())
            .bind(rule.action.to_string())
            .execute(&mut tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn acl_delete(&self, mac: MacAddress) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM acl_rules WHERE client_hw_addr = ?")
            .bind(mac.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn acl_list(&self) -> Result<Vec<AclRule>, Error> {
        let rows = sqlx::query("SELECT client_hw_addr, action FROM acl_rules")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| -> Result<AclRule, Error> {
                let action: String = row.try_get("action")?;
                Ok(AclRule {
                    client_hw_addr: parse_mac(&row.try_get::<String, _>("client_hw_addr")?)?,
                    action: action.parse()?,
                })
            })
            .collect()
    }
}

fn row_to_lease(row: sqlx::sqlite::SqliteRow) -> Result<Lease, Error> {
    Ok(Lease {
        client_hw_addr: parse_mac(&row.try_get::<String, _>("client_hw_addr")?)?,
        assigned_addr: parse_addr(&row.try_get::<String, _>("assigned_addr")?)?,
        expires: row.try_get("expires")?,
    })
}

fn row_to_binding(row: sqlx::sqlite::SqliteRow) -> Result<Binding, Error> {
    Ok(Binding {
        client_hw_addr: parse_mac(&row.try_get::<String, _>("client_hw_addr")?)?,
        bind_addr: parse_addr(&row.try_get::<String, _>("bind_addr")?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        SqliteStore::from_pool(pool).await.unwrap()
    }

    #[tokio::test]
    async fn options_create_then_duplicate_conflicts() {
        let store = test_store().await;
        let opts = Options::bootstrap_default();
        store.options_create(&opts).await.unwrap();
        assert_eq!(store.options_get().await.unwrap(), Some(opts.clone()));

        match store.options_create(&opts).await {
            Err(Error::Conflict(_)) => {}
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn lease_roundtrip_and_uniqueness() {
        let store = test_store().await;
        let mac = MacAddress::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]);
        let addr: Ipv4Addr = "10.1.1.10".parse().unwrap();
        let lease = Lease {
            client_hw_addr: mac,
            assigned_addr: addr,
            expires: 1000,
        };
        store.lease_create(&lease).await.unwrap();
        assert_eq!(store.lease_find_by_mac(mac).await.unwrap(), Some(lease));

        let other_mac = MacAddress::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x02]);
        let conflicting = Lease {
            client_hw_addr: other_mac,
            assigned_addr: addr,
            ..lease
        };
        match store.lease_create(&conflicting).await {
            Err(Error::Conflict(_)) => {}
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn lease_expiry_sweep() {
        let store = test_store().await;
        let mac = MacAddress::new([0, 0, 0, 0, 0, 1]);
        store
            .lease_create(&Lease {
                client_hw_addr: mac,
                assigned_addr: "10.1.1.10".parse().unwrap(),
                expires: 100,
            })
            .await
            .unwrap();

        let removed = store.lease_delete_expired(200).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.lease_find_by_mac(mac).await.unwrap(), None);
    }

    #[tokio::test]
    async fn binding_delete_requires_a_key() {
        let store = test_store().await;
        match store.binding_delete(None, None).await {
            Err(Error::InvalidInput(_)) => {}
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn acl_save_replaces_the_action_for_a_mac() {
        let store = test_store().await;
        let mac = MacAddress::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]);

        store
            .acl_create(&AclRule {
                client_hw_addr: mac,
                action: AclAction::Allow,
            })
            .await
            .unwrap();

        store
            .acl_save(&AclRule {
                client_hw_addr: mac,
                action: AclAction::Deny,
            })
            .await
            .unwrap();

        let rules = store.acl_list().await.unwrap();
        assert_eq!(rules, vec![AclRule { client_hw_addr: mac, action: AclAction::Deny }]);
        assert!(!store.acl_has_match(mac, AclAction::Allow).await.unwrap());
        assert!(store.acl_has_match(mac, AclAction::Deny).await.unwrap());
    }
}
