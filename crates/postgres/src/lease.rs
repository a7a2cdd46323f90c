//! Cross-process exclusion of one tenant's backups and restores.
//!
//! The lease is a session-level advisory lock on the tenant's own database,
//! so every pgvault process pointed at that database contends for the same
//! key: the server, a CLI run from cron, or a second server replica.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgConnection;
use tokio::time::Instant;
use tracing::{debug, instrument};

use pgvault_core::{TenantConfig, TenantId};

use crate::connect::connect;
use crate::error::LeaseError;

/// Retry interval while another session holds the tenant.
const LEASE_POLL_INTERVAL: Duration = Duration::from_millis(200);

const TRY_LOCK: &str = "SELECT pg_try_advisory_lock(hashtext($1))";

/// Held tenant lease. Dropping it releases the tenant.
pub trait LeaseGuard: Send {}

/// Takes a tenant for the duration of one operation.
#[async_trait]
pub trait TenantLeases: Send + Sync {
    /// Wait up to `wait` for the tenant. `None` means another holder kept it
    /// for the whole wait.
    async fn acquire(
        &self,
        tenant: &TenantConfig,
        wait: Duration,
    ) -> Result<Option<Box<dyn LeaseGuard>>, LeaseError>;
}

/// Advisory lock key shared by every pgvault process for `tenant`.
pub fn lease_key(tenant: &TenantId) -> String {
    format!("pgvault:{tenant}")
}

/// [`TenantLeases`] over `pg_try_advisory_lock` on the tenant database.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgAdvisoryLeases;

/// Owns the session that holds the advisory lock. Closing the session on
/// drop releases the lock on the server.
struct AdvisoryLease {
    _conn: PgConnection,
}

impl LeaseGuard for AdvisoryLease {}

#[async_trait]
impl TenantLeases for PgAdvisoryLeases {
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id))]
    async fn acquire(
        &self,
        tenant: &TenantConfig,
        wait: Duration,
    ) -> Result<Option<Box<dyn LeaseGuard>>, LeaseError> {
        let key = lease_key(&tenant.id);
        let deadline = Instant::now() + wait;
        let mut conn = connect(&tenant.connection).await?;

        loop {
            let held: bool = sqlx::query_scalar(TRY_LOCK)
                .bind(&key)
                .fetch_one(&mut conn)
                .await
                .map_err(|e| LeaseError::Query(e.to_string()))?;
            if held {
                debug!(%key, "advisory lease acquired");
                return Ok(Some(Box::new(AdvisoryLease { _conn: conn })));
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(%key, "advisory lease held elsewhere");
                return Ok(None);
            }
            tokio::time::sleep(LEASE_POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_namespaced_by_tenant() {
        let id = TenantId::new("acme").unwrap();
        assert_eq!(lease_key(&id), "pgvault:acme");
    }
}

#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use super::*;
    use crate::testing::live_tenant;

    #[tokio::test]
    async fn second_session_waits_out_and_gets_none() {
        let (mut tenant, _) = live_tenant(&["person"]);
        tenant.id = TenantId::new("lease-contended").unwrap();

        let held = PgAdvisoryLeases
            .acquire(&tenant, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(held.is_some());

        let contender = PgAdvisoryLeases
            .acquire(&tenant, Duration::from_millis(500))
            .await
            .unwrap();
        assert!(contender.is_none());

        drop(held);
        let after = PgAdvisoryLeases
            .acquire(&tenant, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(after.is_some());
    }

    #[tokio::test]
    async fn different_tenants_do_not_contend() {
        let (mut a, _) = live_tenant(&["person"]);
        let (mut b, _) = live_tenant(&["person"]);
        a.id = TenantId::new("lease-a").unwrap();
        b.id = TenantId::new("lease-b").unwrap();

        let _a = PgAdvisoryLeases.acquire(&a, Duration::from_secs(1)).await.unwrap();
        let other = PgAdvisoryLeases.acquire(&b, Duration::from_secs(1)).await.unwrap();
        assert!(other.is_some());
    }
}
