//! Job marketplace domain model.
//!
//! Pure records and rules: the job and submission state machines, the bounded trust
//! score, oracle verdict interpretation and the claimability decision over a ledger
//! snapshot. No I/O lives here.

pub mod claim;
pub mod job;
pub mod submission;
pub mod user;
pub mod verdict;

pub use claim::{assess_claim, ClaimBlock, ClaimDecision, LedgerJob, LedgerJobStatus};
pub use job::{Job, JobStatus, NewJob, WorkResult};
pub use submission::{feedback, Submission, SubmissionStatus};
pub use user::{TrustScore, User};
pub use verdict::{Verdict, VerdictOutcome, VerificationRequest};
