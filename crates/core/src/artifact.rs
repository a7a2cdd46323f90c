use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tenant::TenantId;

/// File extension carried by every dump artifact.
pub const ARTIFACT_EXTENSION: &str = ".sql";

/// Timestamp layout embedded in artifact names (always UTC).
pub const ARTIFACT_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Default prefix of artifact names.
pub const DEFAULT_ARTIFACT_PREFIX: &str = "backup";

/// A stored dump in remote object storage.
///
/// Artifacts are immutable once uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Opaque storage identifier.
    pub id: String,
    /// `{prefix}_{tenant}_{YYYYMMDDTHHMMSS}.sql`.
    pub name: String,
    /// When the storage backend recorded the upload.
    pub created_at: DateTime<Utc>,
    /// Id of the folder holding the artifact.
    pub folder: String,
    /// Payload size, when the backend reports it.
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

/// Builds and parses artifact names for one deployment prefix.
///
/// The rotator and the lister both rely on this type, so the naming
/// convention lives in exactly one place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNaming {
    prefix: String,
}

impl Default for ArtifactNaming {
    fn default() -> Self {
        Self::new(DEFAULT_ARTIFACT_PREFIX)
    }
}

impl ArtifactNaming {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Name prefix shared by every artifact of a tenant (`{prefix}_{tenant}_`).
    pub fn tenant_prefix(&self, tenant: &TenantId) -> String {
        format!("{}_{}_", self.prefix, tenant)
    }

    /// Artifact name for a dump taken at `at`.
    pub fn name_for(&self, tenant: &TenantId, at: DateTime<Utc>) -> String {
        format!(
            "{}{}{}",
            self.tenant_prefix(tenant),
            at.format(ARTIFACT_TIMESTAMP_FORMAT),
            ARTIFACT_EXTENSION
        )
    }

    /// Extract the dump time from an artifact name.
    ///
    /// Returns `None` when the name does not follow the convention for this
    /// tenant.
    pub fn parse_time(&self, tenant: &TenantId, name: &str) -> Option<DateTime<Utc>> {
        let stamp = name
            .strip_prefix(&self.tenant_prefix(tenant))?
            .strip_suffix(ARTIFACT_EXTENSION)?;
        if stamp.len() != 15 {
            return None;
        }
        NaiveDateTime::parse_from_str(stamp, ARTIFACT_TIMESTAMP_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn tenant() -> TenantId {
        TenantId::new("T").unwrap()
    }

    #[test]
    fn name_layout() {
        let naming = ArtifactNaming::default();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(naming.name_for(&tenant(), at), "backup_T_20240101T000000.sql");
    }

    #[test]
    fn parse_round_trips_generated_names() {
        let naming = ArtifactNaming::new("nightly");
        let at = Utc.with_ymd_and_hms(2025, 6, 30, 23, 59, 58).unwrap();
        let name = naming.name_for(&tenant(), at);
        assert_eq!(naming.parse_time(&tenant(), &name), Some(at));
    }

    #[test]
    fn unparseable_names_yield_none() {
        let naming = ArtifactNaming::default();
        assert_eq!(naming.parse_time(&tenant(), "backup_T_bad.sql"), None);
        assert_eq!(naming.parse_time(&tenant(), "backup_T_20240101T000000.txt"), None);
        assert_eq!(naming.parse_time(&tenant(), "backup_U_20240101T000000.sql"), None);
        assert_eq!(naming.parse_time(&tenant(), "backup_T_20241301T000000.sql"), None);
    }
}
