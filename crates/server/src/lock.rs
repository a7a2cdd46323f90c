use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use pgvault_postgres::{LeaseGuard, TenantLeases};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::{debug, warn};

use pgvault_core::{TenantConfig, TenantId};

use crate::error::ApiError;

/// Serializes backups and restores of the same tenant.
///
/// Callers in this process queue on an async mutex first. With leases
/// configured, the holder then also takes the tenant's cross-process lease,
/// which excludes CLI runs and other replicas. Operations on different
/// tenants never wait for each other. A caller that cannot get the tenant
/// within the timeout fails with [`ApiError::Busy`].
pub struct TenantLocks {
    locks: DashMap<TenantId, Arc<Mutex<()>>>,
    leases: Option<Arc<dyn TenantLeases>>,
    timeout: Duration,
}

/// Held for the duration of one operation; dropping it releases the tenant.
pub struct TenantGuard {
    _lease: Option<Box<dyn LeaseGuard>>,
    _guard: OwnedMutexGuard<()>,
}

impl TenantLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            leases: None,
            timeout,
        }
    }

    /// Also take a cross-process lease for every acquired tenant.
    #[must_use]
    pub fn with_leases(mut self, leases: Arc<dyn TenantLeases>) -> Self {
        self.leases = Some(leases);
        self
    }

    pub async fn acquire(
        &self,
        tenant: &TenantConfig,
        operation: &str,
    ) -> Result<TenantGuard, ApiError> {
        let deadline = Instant::now() + self.timeout;
        let lock = Arc::clone(
            self.locks
                .entry(tenant.id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let Ok(guard) = tokio::time::timeout_at(deadline, lock.lock_owned()).await else {
            return Err(self.busy(&tenant.id, operation));
        };

        let lease = match &self.leases {
            Some(leases) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                match leases.acquire(tenant, wait).await? {
                    Some(lease) => Some(lease),
                    None => return Err(self.busy(&tenant.id, operation)),
                }
            }
            None => None,
        };

        debug!(tenant = %tenant.id, operation, "tenant lock acquired");
        Ok(TenantGuard {
            _lease: lease,
            _guard: guard,
        })
    }

    fn busy(&self, tenant: &TenantId, operation: &str) -> ApiError {
        warn!(
            %tenant,
            operation,
            timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            "tenant is busy"
        );
        ApiError::Busy(tenant.to_string())
    }
}
