use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::version::RestoreMode;

/// Lifecycle of one restore request.
///
/// ```text
/// Received -> Authorized -> Downloaded -> Parsed -> ModeSelected
///   -> Truncated -> Restoring(0..n) -> SequencesRealigned
///   -> VersionsRestored -> Committed
/// ```
///
/// Every non-terminal state may move to `RolledBack`. `Committed` and
/// `RolledBack` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestoreState {
    Received,
    Authorized,
    Downloaded,
    Parsed,
    ModeSelected(RestoreMode),
    Truncated,
    /// Inserting rows of the table at this position in restore order.
    Restoring(usize),
    SequencesRealigned,
    VersionsRestored,
    Committed,
    RolledBack,
}

impl RestoreState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }

    /// Whether `self -> next` is a legal step.
    pub fn can_advance_to(self, next: Self) -> bool {
        use RestoreState::{
            Authorized, Committed, Downloaded, ModeSelected, Parsed, Received, Restoring,
            RolledBack, SequencesRealigned, Truncated, VersionsRestored,
        };
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, RolledBack)
            | (Received, Authorized)
            | (Authorized, Downloaded)
            | (Downloaded, Parsed)
            | (Parsed, ModeSelected(_))
            | (ModeSelected(_), Truncated)
            | (Truncated, Restoring(0) | SequencesRealigned)
            | (Restoring(_), SequencesRealigned)
            | (SequencesRealigned, VersionsRestored)
            | (VersionsRestored, Committed) => true,
            (Restoring(i), Restoring(j)) => j == i + 1,
            _ => false,
        }
    }
}

impl fmt::Display for RestoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Received => write!(f, "received"),
            Self::Authorized => write!(f, "authorized"),
            Self::Downloaded => write!(f, "downloaded"),
            Self::Parsed => write!(f, "parsed"),
            Self::ModeSelected(mode) => write!(f, "mode_selected({mode})"),
            Self::Truncated => write!(f, "truncated"),
            Self::Restoring(i) => write!(f, "restoring({i})"),
            Self::SequencesRealigned => write!(f, "sequences_realigned"),
            Self::VersionsRestored => write!(f, "versions_restored"),
            Self::Committed => write!(f, "committed"),
            Self::RolledBack => write!(f, "rolled_back"),
        }
    }
}

/// Tracks the state of a restore and rejects illegal transitions.
#[derive(Debug, Clone)]
pub struct RestoreProgress {
    state: RestoreState,
    history: Vec<RestoreState>,
}

impl Default for RestoreProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl RestoreProgress {
    pub fn new() -> Self {
        Self {
            state: RestoreState::Received,
            history: vec![RestoreState::Received],
        }
    }

    pub fn state(&self) -> RestoreState {
        self.state
    }

    /// Every state visited so far, oldest first.
    pub fn history(&self) -> &[RestoreState] {
        &self.history
    }

    pub fn advance(&mut self, next: RestoreState) -> Result<(), CoreError> {
        if !self.state.can_advance_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Move to `RolledBack` unless already terminal.
    pub fn roll_back(&mut self) {
        if !self.state.is_terminal() {
            self.state = RestoreState::RolledBack;
            self.history.push(RestoreState::RolledBack);
        }
    }
}

/// Per-table outcome of a restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TableReport {
    pub table: String,
    pub inserted: u64,
    /// Rows rejected by the parser, or dropped because no backup column
    /// exists in the live table.
    pub skipped: u64,
    /// Dump columns dropped because the live table lacks them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignored_columns: Vec<String>,
}

/// Version pair reported back to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SchemaVersions {
    pub current: Option<String>,
    pub backup: Option<String>,
}

/// Summary of a committed restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RestoreReport {
    pub mode: RestoreMode,
    pub schema: SchemaVersions,
    pub tables: Vec<TableReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_accepted() {
        let mut p = RestoreProgress::new();
        for next in [
            RestoreState::Authorized,
            RestoreState::Downloaded,
            RestoreState::Parsed,
            RestoreState::ModeSelected(RestoreMode::Tolerant),
            RestoreState::Truncated,
            RestoreState::Restoring(0),
            RestoreState::Restoring(1),
            RestoreState::SequencesRealigned,
            RestoreState::VersionsRestored,
            RestoreState::Committed,
        ] {
            p.advance(next).unwrap();
        }
        assert_eq!(p.state(), RestoreState::Committed);
        assert_eq!(p.history().len(), 11);
    }

    #[test]
    fn skipping_states_is_rejected() {
        let mut p = RestoreProgress::new();
        let err = p.advance(RestoreState::Truncated).unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidTransition {
                from: RestoreState::Received,
                to: RestoreState::Truncated
            }
        );
    }

    #[test]
    fn tables_advance_one_at_a_time() {
        assert!(RestoreState::Restoring(2).can_advance_to(RestoreState::Restoring(3)));
        assert!(!RestoreState::Restoring(2).can_advance_to(RestoreState::Restoring(4)));
        assert!(!RestoreState::Truncated.can_advance_to(RestoreState::Restoring(1)));
    }

    #[test]
    fn terminal_states_are_final() {
        assert!(!RestoreState::Committed.can_advance_to(RestoreState::RolledBack));
        assert!(!RestoreState::RolledBack.can_advance_to(RestoreState::Received));

        let mut p = RestoreProgress::new();
        p.advance(RestoreState::Authorized).unwrap();
        p.roll_back();
        p.roll_back();
        assert_eq!(p.state(), RestoreState::RolledBack);
        assert_eq!(p.history().len(), 3);
    }

    #[test]
    fn report_serializes_mode_and_schema() {
        let report = RestoreReport {
            mode: RestoreMode::Strict,
            schema: SchemaVersions {
                current: Some("4".into()),
                backup: Some("4".into()),
            },
            tables: vec![],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mode"], "strict");
        assert_eq!(json["schema"]["current"], "4");
    }
}
