//! Verification oracle request/verdict types.

use serde::{Deserialize, Serialize};

pub const TIMED_OUT_FEEDBACK: &str = "Verification timed out. Please try again.";
pub const UNPARSEABLE_FEEDBACK: &str = "Unable to parse verification response.";
pub const DEFAULT_FEEDBACK: &str = "No feedback provided.";

/// Everything the oracle needs to judge a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub job_description: String,
    pub job_files: Vec<String>,
    pub submission_text: String,
    pub submission_files: Vec<String>,
}

/// Oracle decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub approved: bool,
    pub cheated: bool,
    pub feedback: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictOutcome {
    Cheated,
    NotApproved,
    Approved,
}

impl Verdict {
    /// Non-approving verdict that carries no reputation effect.
    pub fn neutral(feedback: impl Into<String>) -> Self {
        Self { approved: false, cheated: false, feedback: feedback.into() }
    }

    pub fn timed_out() -> Self {
        Self::neutral(TIMED_OUT_FEEDBACK)
    }

    pub fn unparseable() -> Self {
        Self::neutral(UNPARSEABLE_FEEDBACK)
    }

    /// Cheating dominates approval.
    pub fn outcome(&self) -> VerdictOutcome {
        if self.cheated {
            VerdictOutcome::Cheated
        } else if self.approved {
            VerdictOutcome::Approved
        } else {
            VerdictOutcome::NotApproved
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cheating_wins_over_approval() {
        let verdict = Verdict { approved: true, cheated: true, feedback: "copied".into() };
        assert_eq!(verdict.outcome(), VerdictOutcome::Cheated);
    }

    #[test]
    fn neutral_verdicts_do_not_approve() {
        assert_eq!(Verdict::timed_out().outcome(), VerdictOutcome::NotApproved);
        assert_eq!(Verdict::unparseable().feedback, UNPARSEABLE_FEEDBACK);
    }
}
