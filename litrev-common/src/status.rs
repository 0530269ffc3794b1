//! Lifecycle status enums shared by the database layer, the API and events
//!
//! Statuses are stored as lowercase TEXT columns. `as_str()` produces the
//! stored form and `FromStr` parses it back.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Stored (and serialized) text form
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(Error::InvalidInput(format!(
                        "Unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

/// Status of a preclassification phase
///
/// `inactive → active → completed`, or `inactive|active → annulled`.
/// An active phase may also be parked back to `inactive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Inactive,
    Active,
    Completed,
    Annulled,
}

text_enum!(PhaseStatus {
    Inactive => "inactive",
    Active => "active",
    Completed => "completed",
    Annulled => "annulled",
});

impl PhaseStatus {
    /// Completed and annulled phases never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, PhaseStatus::Completed | PhaseStatus::Annulled)
    }

    /// Structural transition table. Data-dependent guards (single active
    /// phase, open batches, running jobs) are checked by the caller.
    pub fn can_transition_to(&self, next: PhaseStatus) -> bool {
        use PhaseStatus::*;
        matches!(
            (self, next),
            (Inactive, Active)
                | (Active, Inactive)
                | (Active, Completed)
                | (Inactive, Annulled)
                | (Active, Annulled)
        )
    }
}

/// Status of an article batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Translating,
    Translated,
    Preclassifying,
    Preclassified,
    Completed,
    Discarded,
}

text_enum!(BatchStatus {
    Pending => "pending",
    Translating => "translating",
    Translated => "translated",
    Preclassifying => "preclassifying",
    Preclassified => "preclassified",
    Completed => "completed",
    Discarded => "discarded",
});

impl BatchStatus {
    /// All statuses a phase must not have open batches in before completion
    pub const NON_TERMINAL: [BatchStatus; 5] = [
        BatchStatus::Pending,
        BatchStatus::Translating,
        BatchStatus::Translated,
        BatchStatus::Preclassifying,
        BatchStatus::Preclassified,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Discarded)
    }

    /// A job currently owns the batch
    pub fn is_running(&self) -> bool {
        matches!(self, BatchStatus::Translating | BatchStatus::Preclassifying)
    }

    /// Transitions a member may request directly. Job-driven transitions
    /// (into and out of the running statuses) are not listed here.
    pub fn can_user_transition_to(&self, next: BatchStatus) -> bool {
        use BatchStatus::*;
        matches!(
            (self, next),
            (Pending, Discarded)
                | (Translated, Discarded)
                | (Preclassified, Discarded)
                | (Preclassified, Completed)
        )
    }

    /// Status the batch enters while a job of `job_type` runs, if the job
    /// may start from the current status
    pub fn running_status_for(&self, job_type: JobType) -> Option<BatchStatus> {
        use BatchStatus::*;
        match (job_type, self) {
            (JobType::Translation, Pending | Translated | Preclassified) => Some(Translating),
            (JobType::Preclassification, Translated | Preclassified) => Some(Preclassifying),
            _ => None,
        }
    }
}

/// Kind of asynchronous AI work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Translation,
    Preclassification,
}

text_enum!(JobType {
    Translation => "translation",
    Preclassification => "preclassification",
});

impl JobType {
    /// Batch status after a successful job of this type
    pub fn done_status(&self) -> BatchStatus {
        match self {
            JobType::Translation => BatchStatus::Translated,
            JobType::Preclassification => BatchStatus::Preclassified,
        }
    }
}

/// Status of an AI job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

text_enum!(JobStatus {
    Queued => "queued",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
});

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_transition_table() {
        use PhaseStatus::*;
        assert!(Inactive.can_transition_to(Active));
        assert!(Active.can_transition_to(Completed));
        assert!(Active.can_transition_to(Inactive));
        assert!(Inactive.can_transition_to(Annulled));
        assert!(Active.can_transition_to(Annulled));

        assert!(!Inactive.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Active));
        assert!(!Annulled.can_transition_to(Inactive));
        assert!(!Active.can_transition_to(Active));
    }

    #[test]
    fn test_terminal_states() {
        assert!(PhaseStatus::Completed.is_terminal());
        assert!(PhaseStatus::Annulled.is_terminal());
        assert!(!PhaseStatus::Active.is_terminal());

        assert!(BatchStatus::Completed.is_terminal());
        assert!(BatchStatus::Discarded.is_terminal());
        for status in BatchStatus::NON_TERMINAL {
            assert!(!status.is_terminal(), "{} should be non-terminal", status);
        }

        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn test_running_status_for_jobs() {
        use BatchStatus::*;
        assert_eq!(Pending.running_status_for(JobType::Translation), Some(Translating));
        assert_eq!(Translated.running_status_for(JobType::Translation), Some(Translating));
        assert_eq!(Pending.running_status_for(JobType::Preclassification), None);
        assert_eq!(
            Translated.running_status_for(JobType::Preclassification),
            Some(Preclassifying)
        );
        assert_eq!(Translating.running_status_for(JobType::Translation), None);
        assert_eq!(Completed.running_status_for(JobType::Preclassification), None);
    }

    #[test]
    fn test_user_transitions_exclude_running_states() {
        use BatchStatus::*;
        assert!(Preclassified.can_user_transition_to(Completed));
        assert!(Pending.can_user_transition_to(Discarded));
        assert!(!Translating.can_user_transition_to(Discarded));
        assert!(!Pending.can_user_transition_to(Completed));
        assert!(!Pending.can_user_transition_to(Translating));
    }

    #[test]
    fn test_text_round_trip_and_unknown() {
        assert_eq!("active".parse::<PhaseStatus>().unwrap(), PhaseStatus::Active);
        assert_eq!(JobType::Preclassification.as_str(), "preclassification");
        let err = "paused".parse::<JobStatus>().unwrap_err();
        assert!(err.to_string().contains("Unknown JobStatus"));
    }

    #[test]
    fn test_serde_uses_lowercase() {
        let json = serde_json::to_string(&BatchStatus::Preclassifying).unwrap();
        assert_eq!(json, "\"preclassifying\"");
    }
}
