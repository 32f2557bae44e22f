//! Work unit state machine.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Final verdict reported for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkOutcome {
    Ok,
    Error,
}

impl WorkOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }
}

/// Work unit states. `ProcessedOk` and `ProcessedError` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkStatus {
    #[default]
    Initiated,
    InProgress,
    ProcessedOk,
    ProcessedError,
}

impl WorkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "INITIATED",
            Self::InProgress => "IN_PROGRESS",
            Self::ProcessedOk => "PROCESSED_OK",
            Self::ProcessedError => "PROCESSED_ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ProcessedOk | Self::ProcessedError)
    }

    pub fn can_transition_to(&self, target: WorkStatus) -> bool {
        use WorkStatus::*;

        matches!(
            (self, target),
            (Initiated, InProgress)
                | (Initiated | InProgress, ProcessedOk)
                | (Initiated | InProgress, ProcessedError)
        )
    }

    pub fn transition_to(&self, target: WorkStatus) -> Result<WorkStatus> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(Error::InvalidStateTransition {
                from: self.as_str().to_string(),
                to: target.as_str().to_string(),
            })
        }
    }
}

impl std::fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Local record of one run's work unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    id: String,
    name: String,
    expectations: usize,
    status: WorkStatus,
}

impl WorkUnit {
    pub fn initiated(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            expectations: 0,
            status: WorkStatus::Initiated,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expectations(&self) -> usize {
        self.expectations
    }

    pub fn status(&self) -> WorkStatus {
        self.status
    }

    /// Record the expected chunk count. Allowed once, before finalization.
    pub fn declare_expectations(&mut self, count: usize) -> Result<()> {
        self.status = self.status.transition_to(WorkStatus::InProgress)?;
        self.expectations = count;
        Ok(())
    }

    pub fn finalize(&mut self, outcome: WorkOutcome) -> Result<()> {
        let target = match outcome {
            WorkOutcome::Ok => WorkStatus::ProcessedOk,
            WorkOutcome::Error => WorkStatus::ProcessedError,
        };
        self.status = self.status.transition_to(target)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut unit = WorkUnit::initiated("work-1", "feed work");
        assert_eq!(unit.status(), WorkStatus::Initiated);

        unit.declare_expectations(3).unwrap();
        assert_eq!(unit.status(), WorkStatus::InProgress);
        assert_eq!(unit.expectations(), 3);

        unit.finalize(WorkOutcome::Ok).unwrap();
        assert_eq!(unit.status(), WorkStatus::ProcessedOk);
        assert!(unit.status().is_terminal());
    }

    #[test]
    fn test_finalize_without_expectations() {
        let mut unit = WorkUnit::initiated("work-1", "feed work");
        unit.finalize(WorkOutcome::Error).unwrap();
        assert_eq!(unit.status(), WorkStatus::ProcessedError);
    }

    #[test]
    fn test_finalized_is_terminal() {
        let mut unit = WorkUnit::initiated("work-1", "feed work");
        unit.finalize(WorkOutcome::Ok).unwrap();

        assert!(matches!(
            unit.finalize(WorkOutcome::Error),
            Err(Error::InvalidStateTransition { .. })
        ));
        assert!(unit.declare_expectations(1).is_err());
        assert_eq!(unit.status(), WorkStatus::ProcessedOk);
    }

    #[test]
    fn test_expectations_declared_once() {
        let mut unit = WorkUnit::initiated("work-1", "feed work");
        unit.declare_expectations(2).unwrap();
        assert!(unit.declare_expectations(5).is_err());
        assert_eq!(unit.expectations(), 2);
    }

    #[test]
    fn test_no_backward_transitions() {
        assert!(!WorkStatus::InProgress.can_transition_to(WorkStatus::Initiated));
        assert!(!WorkStatus::ProcessedError.can_transition_to(WorkStatus::InProgress));
        assert!(!WorkStatus::Initiated.can_transition_to(WorkStatus::Initiated));
    }
}
