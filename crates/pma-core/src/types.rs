use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PmaError;

// ---------------------------------------------------------------------------
// DocumentStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Never generated.
    Todo,
    Working,
    Approved,
    Rejected,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Todo => "todo",
            DocumentStatus::Working => "working",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
            DocumentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// GenerationStage
// ---------------------------------------------------------------------------

/// In-flight marker persisted on a document while an LLM call is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStage {
    Generating,
    Compacting,
}

impl fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GenerationStage::Generating => "generating",
            GenerationStage::Compacting => "compacting",
        })
    }
}

// ---------------------------------------------------------------------------
// DocumentCategory
// ---------------------------------------------------------------------------

/// Prompt template family for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    Concept,
    Resources,
    Swot,
    Kickoff,
    StatementOfWork,
    PreliminaryReview,
    DetailedPlans,
    SprintPlanning,
    Deployment,
    Generic,
}

impl DocumentCategory {
    pub fn all() -> &'static [DocumentCategory] {
        &[
            DocumentCategory::Concept,
            DocumentCategory::Resources,
            DocumentCategory::Swot,
            DocumentCategory::Kickoff,
            DocumentCategory::StatementOfWork,
            DocumentCategory::PreliminaryReview,
            DocumentCategory::DetailedPlans,
            DocumentCategory::SprintPlanning,
            DocumentCategory::Deployment,
            DocumentCategory::Generic,
        ]
    }

    /// Pick the template family from a document title, using the phase to
    /// disambiguate generic words like "review" or "proposal".
    pub fn classify(title: &str, phase: u8) -> DocumentCategory {
        let t = title.to_lowercase();
        let has_word = |w: &str| t.split(|c: char| !c.is_alphanumeric()).any(|x| x == w);

        if t.contains("detailed plan") {
            DocumentCategory::DetailedPlans
        } else if t.contains("swot") {
            DocumentCategory::Swot
        } else if t.contains("statement of work") || has_word("sow") {
            DocumentCategory::StatementOfWork
        } else if t.contains("kickoff") || t.contains("kick-off") || t.contains("kick off") {
            DocumentCategory::Kickoff
        } else if t.contains("sprint") {
            DocumentCategory::SprintPlanning
        } else if t.contains("deployment") {
            DocumentCategory::Deployment
        } else if t.contains("resource") || t.contains("skill") {
            DocumentCategory::Resources
        } else if t.contains("concept") {
            DocumentCategory::Concept
        } else if t.contains("preliminary") || (phase == 6 && has_word("review")) {
            DocumentCategory::PreliminaryReview
        } else if phase == 1 && (t.contains("proposal") || t.contains("charter")) {
            DocumentCategory::Concept
        } else {
            DocumentCategory::Generic
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentCategory::Concept => "concept",
            DocumentCategory::Resources => "resources",
            DocumentCategory::Swot => "swot",
            DocumentCategory::Kickoff => "kickoff",
            DocumentCategory::StatementOfWork => "statement_of_work",
            DocumentCategory::PreliminaryReview => "preliminary_review",
            DocumentCategory::DetailedPlans => "detailed_plans",
            DocumentCategory::SprintPlanning => "sprint_planning",
            DocumentCategory::Deployment => "deployment",
            DocumentCategory::Generic => "generic",
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Review,
    Done,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "inprogress",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = PmaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "inprogress" | "in_progress" | "in-progress" => Ok(TaskStatus::InProgress),
            "review" => Ok(TaskStatus::Review),
            "done" => Ok(TaskStatus::Done),
            _ => Err(PmaError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// MilestoneStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    Planned,
    Completed,
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MilestoneStatus::Planned => "planned",
            MilestoneStatus::Completed => "completed",
        })
    }
}

// ---------------------------------------------------------------------------
// Recurrence / AgentStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
}

impl std::str::FromStr for Recurrence {
    type Err = PmaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            "monthly" => Ok(Recurrence::Monthly),
            _ => Err(PmaError::InvalidStatus(s.to_string())),
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Running,
    Completed,
    Failed,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AgentStatus::Running => "running",
            AgentStatus::Completed => "completed",
            AgentStatus::Failed => "failed",
        })
    }
}

// ---------------------------------------------------------------------------
// ChangeStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Proposed,
    Applied,
    Failed,
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeStatus::Proposed => "proposed",
            ChangeStatus::Applied => "applied",
            ChangeStatus::Failed => "failed",
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn classify_hmap_titles() {
        let cases = [
            ("Concept Proposal", 1, DocumentCategory::Concept),
            ("Resources & Skills List", 2, DocumentCategory::Resources),
            ("SWOT Analysis", 3, DocumentCategory::Swot),
            ("Kickoff Briefing", 4, DocumentCategory::Kickoff),
            ("Statement of Work (SOW)", 5, DocumentCategory::StatementOfWork),
            ("Preliminary Review", 6, DocumentCategory::PreliminaryReview),
            ("Detailed Plans", 7, DocumentCategory::DetailedPlans),
            ("Sprint Planning", 8, DocumentCategory::SprintPlanning),
            ("Deployment Plan", 9, DocumentCategory::Deployment),
        ];
        for (title, phase, expected) in cases {
            assert_eq!(DocumentCategory::classify(title, phase), expected, "{title}");
        }
    }

    #[test]
    fn classify_uses_phase_for_ambiguous_words() {
        assert_eq!(
            DocumentCategory::classify("Stakeholder Review", 6),
            DocumentCategory::PreliminaryReview
        );
        assert_eq!(
            DocumentCategory::classify("Stakeholder Review", 3),
            DocumentCategory::Generic
        );
        assert_eq!(
            DocumentCategory::classify("Project Charter", 1),
            DocumentCategory::Concept
        );
    }

    #[test]
    fn classify_sow_needs_whole_word() {
        assert_eq!(
            DocumentCategory::classify("Sowing Schedule", 5),
            DocumentCategory::Generic
        );
        assert_eq!(
            DocumentCategory::classify("SOW", 5),
            DocumentCategory::StatementOfWork
        );
    }

    #[test]
    fn task_status_parse() {
        assert_eq!(TaskStatus::from_str("inprogress").unwrap(), TaskStatus::InProgress);
        assert_eq!(TaskStatus::from_str("in_progress").unwrap(), TaskStatus::InProgress);
        assert_eq!(TaskStatus::from_str("done").unwrap(), TaskStatus::Done);
        assert!(TaskStatus::from_str("finished").is_err());
    }

    #[test]
    fn task_status_serializes_lowercase() {
        let yaml = serde_yaml::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(yaml.trim(), "inprogress");
    }
}
