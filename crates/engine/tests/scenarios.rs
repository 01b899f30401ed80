mod support;

use std::sync::Arc;

use chrono::{Duration, Utc};

use gigledger_engine::{EngineError, ProcessOutcome};
use gigledger_infra::{Datastore, LedgerClient};
use gigledger_marketplace::{JobStatus, SubmissionStatus, TrustScore, feedback};

use support::*;

#[tokio::test]
async fn prepared_job_opens_once_the_ledger_matches() {
    let h = harness();
    let job = h.market.lifecycle.prepare(new_job(0)).await.unwrap();
    assert_eq!(job.status, JobStatus::WaitingOnchainCheck);
    assert_eq!(job.reward.to_string(), "1000000000000000000");

    h.ledger.register(job.contract_job_id, requester(), one_token()).unwrap();
    let opened = h.market.lifecycle.confirm_create(&job.contract_job_id, &requester()).await.unwrap();
    assert_eq!(opened.status, JobStatus::Open);
    assert_eq!(h.store.get_job(job.id).await.unwrap().unwrap().status, JobStatus::Open);
}

#[tokio::test]
async fn reward_mismatch_fails_the_job() {
    let h = harness();
    let job = h.market.lifecycle.prepare(new_job(0)).await.unwrap();
    h.ledger
        .register(job.contract_job_id, requester(), "999999999999999999".parse().unwrap())
        .unwrap();

    let err = h.market.lifecycle.confirm_create(&job.contract_job_id, &requester()).await.unwrap_err();
    assert!(matches!(err, EngineError::ExternalService(_)));
    assert_eq!(h.store.get_job(job.id).await.unwrap().unwrap().status, JobStatus::Failed);
}

#[tokio::test]
async fn unreachable_ledger_fails_confirmation() {
    let h = harness();
    let job = h.market.lifecycle.prepare(new_job(0)).await.unwrap();
    h.ledger.register(job.contract_job_id, requester(), one_token()).unwrap();
    h.ledger.set_unavailable(true).unwrap();

    let err = h.market.lifecycle.confirm_create(&job.contract_job_id, &requester()).await.unwrap_err();
    assert!(matches!(err, EngineError::ExternalService(_)));
    assert_eq!(err.kind().as_str(), "external_service");
    assert_eq!(h.store.get_job(job.id).await.unwrap().unwrap().status, JobStatus::Failed);
}

#[tokio::test]
async fn only_the_requester_confirms_and_only_once() {
    let h = harness();
    let job = h.open_job(0).await;

    let err = h.market.lifecycle.confirm_create(&job.contract_job_id, &worker(1)).await.unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    let err = h.market.lifecycle.confirm_create(&job.contract_job_id, &requester()).await.unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
}

#[tokio::test]
async fn low_trust_submitters_are_turned_away() {
    let h = harness();
    let job = h.open_job(60).await;

    let err = h.market.pipeline.submit(job.id, worker(1), work()).await.unwrap_err();
    assert_eq!(err, EngineError::InsufficientTrustScore { required: 60, actual: 50 });
    assert!(h.store.find_submission(job.id, &worker(1)).await.unwrap().is_none());
}

#[tokio::test]
async fn one_submission_per_worker_and_job() {
    let h = harness();
    let job = h.open_job(0).await;
    h.market.pipeline.submit(job.id, worker(1), work()).await.unwrap();

    let err = h.market.pipeline.submit(job.id, worker(1), work()).await.unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
}

#[tokio::test]
async fn approved_submission_settles_and_rewards_once() {
    let h = harness();
    let job = h.open_job(0).await;
    let submission = h.market.pipeline.submit(job.id, worker(1), work()).await.unwrap();
    assert_eq!(submission.status, SubmissionStatus::PendingReview);
    assert_eq!(submission.submitter_trust_score, TrustScore::new(50));

    h.oracle.push(approve());
    let outcome = h.market.pipeline.process_submission(submission.id).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Approved);

    let job = h.store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::WaitForClaim);
    assert_eq!(job.worker, Some(worker(1)));
    assert_eq!(job.result, Some(work()));
    assert!(job.settlement_tx.is_some());
    let submission = h.store.get_submission(submission.id).await.unwrap().unwrap();
    assert_eq!(submission.status, SubmissionStatus::Approved);
    assert_eq!(h.market.trust.score(&worker(1)).await.unwrap().value(), 51);

    // a duplicate run is fenced out and changes nothing
    let again = h.market.pipeline.process_submission(submission.id).await.unwrap();
    assert_eq!(again, ProcessOutcome::Skipped);
    assert_eq!(h.market.trust.score(&worker(1)).await.unwrap().value(), 51);
    assert_eq!(h.ledger.mark_done_calls(), 1);
}

#[tokio::test]
async fn exhausted_ledger_writes_reopen_the_job_but_keep_the_bonus() {
    let h = harness();
    let job = h.open_job(0).await;
    let submission = h.market.pipeline.submit(job.id, worker(1), work()).await.unwrap();

    // first attempt from the pipeline plus three sweep attempts
    h.ledger.fail_mark_done(4).unwrap();
    h.oracle.push(approve());
    let outcome = h.market.pipeline.process_submission(submission.id).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::AwaitingLedger);
    assert_eq!(h.store.get_job(job.id).await.unwrap().unwrap().status, JobStatus::WaitOnChainApprove);
    assert_eq!(h.market.trust.score(&worker(1)).await.unwrap().value(), 51);

    let step = Duration::minutes(4);
    let mut now = Utc::now();
    for sweep in 1..=3 {
        now += step;
        let report = h.market.reconciler.retry_stuck_approvals(now).await.unwrap();
        assert_eq!(report.examined, 1, "sweep {sweep}");
        if sweep < 3 {
            assert_eq!(report.retried, 1, "sweep {sweep}");
        } else {
            assert_eq!(report.exhausted, 1);
        }
    }

    let submission = h.store.get_submission(submission.id).await.unwrap().unwrap();
    assert_eq!(submission.status, SubmissionStatus::Failed);
    assert_eq!(submission.feedback.as_deref(), Some(feedback::ledger_write_exhausted(3).as_str()));

    let job = h.store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Open);
    assert_eq!(job.worker, None);
    assert_eq!(job.result, None);
    assert_eq!(job.settlement_tx, None);

    assert_eq!(h.market.trust.score(&worker(1)).await.unwrap().value(), 51);
    assert_eq!(h.ledger.mark_done_calls(), 4);

    // the reopened job takes new work
    h.market.pipeline.submit(job.id, worker(2), work()).await.unwrap();
}

#[tokio::test]
async fn approval_sweep_recovers_after_a_transient_failure() {
    let h = harness();
    let job = h.open_job(0).await;
    let submission = h.market.pipeline.submit(job.id, worker(1), work()).await.unwrap();
    h.ledger.fail_mark_done(1).unwrap();
    h.market.pipeline.process_submission(submission.id).await.unwrap();

    // too fresh for the sweep
    let report = h.market.reconciler.retry_stuck_approvals(Utc::now()).await.unwrap();
    assert_eq!(report.examined, 0);

    let report = h.market.reconciler.retry_stuck_approvals(Utc::now() + Duration::minutes(4)).await.unwrap();
    assert_eq!(report.resolved, 1);
    assert_eq!(h.store.get_job(job.id).await.unwrap().unwrap().status, JobStatus::WaitForClaim);
    assert_eq!(
        h.store.get_submission(submission.id).await.unwrap().unwrap().status,
        SubmissionStatus::Approved
    );
}

#[tokio::test]
async fn approval_sweep_skips_the_write_when_the_ledger_already_settled() {
    let h = harness();
    let job = h.open_job(0).await;
    let submission = h.market.pipeline.submit(job.id, worker(1), work()).await.unwrap();
    h.ledger.fail_mark_done(1).unwrap();
    h.market.pipeline.process_submission(submission.id).await.unwrap();

    // the earlier write landed after all
    h.ledger.mark_done(&job.contract_job_id, &worker(1)).await.unwrap();
    let calls = h.ledger.mark_done_calls();

    let report = h.market.reconciler.retry_stuck_approvals(Utc::now() + Duration::minutes(4)).await.unwrap();
    assert_eq!(report.resolved, 1);
    assert_eq!(h.ledger.mark_done_calls(), calls);

    let settled = h.store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(settled.status, JobStatus::WaitForClaim);
    assert_eq!(settled.worker, Some(worker(1)));
    assert_eq!(settled.settlement_tx, None);
}

#[tokio::test]
async fn second_approval_loses_the_job() {
    let mut config = test_config();
    config.pipeline.verification_timeout = std::time::Duration::from_secs(30);
    let h = harness_with(config);
    let job = h.open_job(0).await;
    let slow = h.market.pipeline.submit(job.id, worker(1), work()).await.unwrap();
    let fast = h.market.pipeline.submit(job.id, worker(2), work()).await.unwrap();

    // the slow verification reads the job while it is still open
    let gate = Arc::new(tokio::sync::Notify::new());
    h.oracle.push(Reply::Held(gate.clone()));
    let pipeline = h.market.pipeline.clone();
    let pending = tokio::spawn(async move { pipeline.process_submission(slow.id).await });
    while h.oracle.calls() == 0 {
        tokio::task::yield_now().await;
    }

    assert_eq!(h.market.pipeline.process_submission(fast.id).await.unwrap(), ProcessOutcome::Approved);
    gate.notify_one();
    assert_eq!(pending.await.unwrap().unwrap(), ProcessOutcome::JobClosed);

    let loser = h.store.get_submission(slow.id).await.unwrap().unwrap();
    assert_eq!(loser.status, SubmissionStatus::NotApproved);
    assert_eq!(loser.feedback.as_deref(), Some(feedback::JOB_NO_LONGER_OPEN));
    let job = h.store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::WaitForClaim);
    assert_eq!(job.worker, Some(worker(2)));
    assert_eq!(h.ledger.mark_done_calls(), 1);
}

#[tokio::test]
async fn pending_work_on_a_taken_job_is_closed_without_verification() {
    let h = harness();
    let job = h.open_job(0).await;
    let first = h.market.pipeline.submit(job.id, worker(1), work()).await.unwrap();
    let second = h.market.pipeline.submit(job.id, worker(2), work()).await.unwrap();
    h.ledger.fail_mark_done(1).unwrap();
    assert_eq!(
        h.market.pipeline.process_submission(first.id).await.unwrap(),
        ProcessOutcome::AwaitingLedger
    );

    let calls = h.oracle.calls();
    assert_eq!(h.market.pipeline.process_submission(second.id).await.unwrap(), ProcessOutcome::JobClosed);
    assert_eq!(h.oracle.calls(), calls);
    let closed = h.store.get_submission(second.id).await.unwrap().unwrap();
    assert_eq!(closed.status, SubmissionStatus::NotApproved);
    assert_eq!(closed.feedback.as_deref(), Some(feedback::JOB_NO_LONGER_OPEN));
}

#[tokio::test]
async fn approval_whose_job_write_failed_is_released() {
    let (h, flaky) = harness_with_flaky_jobs();
    let job = h.open_job(0).await;
    let submission = h.market.pipeline.submit(job.id, worker(1), work()).await.unwrap();

    flaky.fail_job_writes(true);
    let err = h.market.pipeline.process_submission(submission.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Storage(_)));
    flaky.fail_job_writes(false);

    let released = h.store.get_submission(submission.id).await.unwrap().unwrap();
    assert_eq!(released.status, SubmissionStatus::NotApproved);
    assert_eq!(released.feedback.as_deref(), Some(feedback::JOB_NO_LONGER_OPEN));
    assert_eq!(h.store.get_job(job.id).await.unwrap().unwrap().status, JobStatus::Open);
    assert_eq!(h.ledger.mark_done_calls(), 0);
}

#[tokio::test]
async fn approval_sweep_releases_a_submission_that_never_took_its_job() {
    let h = harness();
    let job = h.open_job(0).await;
    let submission = h.market.pipeline.submit(job.id, worker(1), work()).await.unwrap();

    // submission moved, job write lost
    let mut provisional = submission.clone();
    provisional.resolve(SubmissionStatus::WaitOnChainApprove, None, Utc::now()).unwrap();
    assert!(h.store.update_submission_if(&provisional, SubmissionStatus::PendingReview).await.unwrap());

    let report = h.market.reconciler.retry_stuck_approvals(Utc::now() + Duration::minutes(4)).await.unwrap();
    assert_eq!(report.exhausted, 1);
    let released = h.store.get_submission(submission.id).await.unwrap().unwrap();
    assert_eq!(released.status, SubmissionStatus::NotApproved);
    assert_eq!(released.feedback.as_deref(), Some(feedback::JOB_NO_LONGER_OPEN));
    assert_eq!(h.store.get_job(job.id).await.unwrap().unwrap().status, JobStatus::Open);
    assert_eq!(h.ledger.mark_done_calls(), 0);
}

#[tokio::test]
async fn approval_sweep_reopens_a_job_left_by_a_failed_submission() {
    let h = harness();
    let job = h.open_job(0).await;
    let submission = h.market.pipeline.submit(job.id, worker(1), work()).await.unwrap();
    h.ledger.fail_mark_done(1).unwrap();
    h.market.pipeline.process_submission(submission.id).await.unwrap();

    // submission failed, job reopen lost
    let mut failed = h.store.get_submission(submission.id).await.unwrap().unwrap();
    failed.resolve(SubmissionStatus::Failed, None, Utc::now()).unwrap();
    assert!(h.store.update_submission_if(&failed, SubmissionStatus::WaitOnChainApprove).await.unwrap());

    let report = h.market.reconciler.retry_stuck_approvals(Utc::now()).await.unwrap();
    assert_eq!(report.exhausted, 1);
    let job = h.store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Open);
    assert_eq!(job.worker, None);
    assert_eq!(job.result, None);

    let report = h.market.reconciler.retry_stuck_approvals(Utc::now()).await.unwrap();
    assert_eq!(report.examined, 0);
}

#[tokio::test]
async fn cheating_is_penalized_once() {
    let h = harness();
    let job = h.open_job(0).await;
    let submission = h.market.pipeline.submit(job.id, worker(1), work()).await.unwrap();

    h.oracle.push(cheat());
    assert_eq!(h.market.pipeline.process_submission(submission.id).await.unwrap(), ProcessOutcome::Cheated);
    assert_eq!(h.market.pipeline.process_submission(submission.id).await.unwrap(), ProcessOutcome::Skipped);

    assert_eq!(h.market.trust.score(&worker(1)).await.unwrap().value(), 40);
    assert_eq!(h.store.get_job(job.id).await.unwrap().unwrap().status, JobStatus::Open);
}

#[tokio::test]
async fn rejection_leaves_score_and_job_alone() {
    let h = harness();
    let job = h.open_job(0).await;
    let submission = h.market.pipeline.submit(job.id, worker(1), work()).await.unwrap();

    h.oracle.push(reject());
    assert_eq!(h.market.pipeline.process_submission(submission.id).await.unwrap(), ProcessOutcome::Rejected);
    let stored = h.store.get_submission(submission.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SubmissionStatus::NotApproved);
    assert_eq!(stored.feedback.as_deref(), Some("Incomplete."));
    assert_eq!(h.market.trust.score(&worker(1)).await.unwrap().value(), 50);
}

#[tokio::test]
async fn oracle_timeout_is_a_neutral_rejection() {
    let h = harness();
    let job = h.open_job(0).await;
    let submission = h.market.pipeline.submit(job.id, worker(1), work()).await.unwrap();

    h.oracle.push(Reply::Hang);
    assert_eq!(h.market.pipeline.process_submission(submission.id).await.unwrap(), ProcessOutcome::Rejected);
    let stored = h.store.get_submission(submission.id).await.unwrap().unwrap();
    assert_eq!(stored.feedback.as_deref(), Some(gigledger_marketplace::verdict::TIMED_OUT_FEEDBACK));
    assert_eq!(h.market.trust.score(&worker(1)).await.unwrap().value(), 50);
}

#[tokio::test]
async fn unavailable_oracle_is_retried_then_given_up() {
    let h = harness();
    let job = h.open_job(0).await;
    let submission = h.market.pipeline.submit(job.id, worker(1), work()).await.unwrap();

    for _ in 0..4 {
        h.oracle.push(Reply::Fail);
    }
    let outcome = h.market.pipeline.process_submission(submission.id).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Deferred(_)));

    let mut now = Utc::now();
    for _ in 0..3 {
        now += Duration::minutes(6);
        let report = h.market.reconciler.retry_stuck_verifications(now).await.unwrap();
        assert_eq!(report.retried, 1);
    }
    now += Duration::minutes(6);
    let report = h.market.reconciler.retry_stuck_verifications(now).await.unwrap();
    assert_eq!(report.exhausted, 1);

    let stored = h.store.get_submission(submission.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SubmissionStatus::NotApproved);
    assert_eq!(stored.feedback.as_deref(), Some(feedback::VERIFICATION_EXHAUSTED));
    assert_eq!(h.oracle.calls(), 4);
}

#[tokio::test]
async fn verification_sweep_finishes_queued_work() {
    let h = harness();
    let job = h.open_job(0).await;
    let submission = h.market.pipeline.submit(job.id, worker(1), work()).await.unwrap();

    let report = h.market.reconciler.retry_stuck_verifications(Utc::now() + Duration::minutes(6)).await.unwrap();
    assert_eq!(report.resolved, 1);
    assert_eq!(
        h.store.get_submission(submission.id).await.unwrap().unwrap().status,
        SubmissionStatus::Approved
    );
}

#[tokio::test]
async fn cancelling_rejects_pending_submissions() {
    let h = harness();
    let job = h.open_job(0).await;
    let first = h.market.pipeline.submit(job.id, worker(1), work()).await.unwrap();
    let second = h.market.pipeline.submit(job.id, worker(2), work()).await.unwrap();

    let err = h.market.lifecycle.cancel(job.id, &worker(1)).await.unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    let cancelled = h.market.lifecycle.cancel(job.id, &requester()).await.unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    for id in [first.id, second.id] {
        let s = h.store.get_submission(id).await.unwrap().unwrap();
        assert_eq!(s.status, SubmissionStatus::NotApproved);
        assert_eq!(s.feedback.as_deref(), Some(feedback::JOB_CANCELLED));
    }

    // already closed out; the oracle is never asked
    assert_eq!(h.market.pipeline.process_submission(first.id).await.unwrap(), ProcessOutcome::Skipped);
    assert_eq!(h.oracle.calls(), 0);

    let err = h.market.lifecycle.cancel(job.id, &requester()).await.unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
}

#[tokio::test]
async fn overdue_sweep_is_idempotent() {
    let h = harness();
    let job = h.open_job(0).await;
    let submission = h.market.pipeline.submit(job.id, worker(1), work()).await.unwrap();

    let later = job.deadline + Duration::minutes(1);
    let report = h.market.lifecycle.check_overdue(later).await.unwrap();
    assert_eq!(report.resolved, 1);
    let report = h.market.lifecycle.check_overdue(later).await.unwrap();
    assert_eq!(report.examined, 0);

    assert_eq!(h.store.get_job(job.id).await.unwrap().unwrap().status, JobStatus::Overdue);
    let s = h.store.get_submission(submission.id).await.unwrap().unwrap();
    assert_eq!(s.feedback.as_deref(), Some(feedback::DEADLINE_PASSED));

    // overdue jobs can still be cancelled
    let cancelled = h.market.lifecycle.cancel(job.id, &requester()).await.unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);
}

#[tokio::test]
async fn claim_flow_and_idempotent_confirmation() {
    let h = harness();
    let job = h.open_job(0).await;
    let submission = h.market.pipeline.submit(job.id, worker(1), work()).await.unwrap();
    h.market.pipeline.process_submission(submission.id).await.unwrap();

    let status = h.market.lifecycle.check_claimable(job.id, &worker(1)).await.unwrap();
    assert!(status.claimable);
    assert_eq!(status.reason, None);

    let err = h.market.lifecycle.check_claimable(job.id, &worker(2)).await.unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    h.ledger.claim_reward(&job.contract_job_id).await.unwrap();

    // anyone learns that it was claimed; the record catches up to Done
    let status = h.market.lifecycle.check_claimable(job.id, &worker(2)).await.unwrap();
    assert!(!status.claimable);
    assert_eq!(status.reason, Some(gigledger_marketplace::ClaimBlock::AlreadyClaimed));
    assert_eq!(h.store.get_job(job.id).await.unwrap().unwrap().status, JobStatus::Done);

    let first = h.market.lifecycle.confirm_claim(job.id, &worker(1)).await.unwrap();
    let second = h.market.lifecycle.confirm_claim(job.id, &worker(1)).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.status, JobStatus::Done);
}

#[tokio::test]
async fn creation_sweep_fails_jobs_never_registered() {
    let h = harness();
    let job = h.market.lifecycle.prepare(new_job(0)).await.unwrap();

    let mut now = Utc::now();
    let step = Duration::minutes(4);
    now += step;
    assert_eq!(h.market.reconciler.retry_creation_checks(now).await.unwrap().retried, 1);
    now += step;
    assert_eq!(h.market.reconciler.retry_creation_checks(now).await.unwrap().exhausted, 1);

    let stored = h.store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.retry_count, 2);
}

#[tokio::test]
async fn creation_sweep_opens_late_registrations() {
    let h = harness();
    let job = h.market.lifecycle.prepare(new_job(0)).await.unwrap();
    h.ledger.register(job.contract_job_id, requester(), one_token()).unwrap();

    // not old enough yet
    assert_eq!(h.market.reconciler.retry_creation_checks(Utc::now()).await.unwrap().examined, 0);

    let report = h.market.reconciler.retry_creation_checks(Utc::now() + Duration::minutes(4)).await.unwrap();
    assert_eq!(report.resolved, 1);
    assert_eq!(h.store.get_job(job.id).await.unwrap().unwrap().status, JobStatus::Open);
}

#[tokio::test]
async fn results_are_shown_only_to_entitled_viewers() {
    let h = harness();
    let job = h.open_job(0).await;
    let approved = h.market.pipeline.submit(job.id, worker(1), work()).await.unwrap();
    h.market.pipeline.submit(job.id, worker(2), work()).await.unwrap();
    h.market.pipeline.process_submission(approved.id).await.unwrap();

    let shown = |details: &gigledger_engine::JobDetails| {
        details.submissions.iter().filter(|s| s.result.is_some()).count()
    };

    let outsider = h.market.queries.get_job(job.id, Some(&worker(3))).await.unwrap();
    assert_eq!(outsider.submissions.len(), 2);
    assert_eq!(shown(&outsider), 0);
    assert_eq!(outsider.job.result, None);

    let pending = h.market.queries.get_job(job.id, Some(&worker(2))).await.unwrap();
    assert_eq!(shown(&pending), 0);

    let winner = h.market.queries.get_job(job.id, Some(&worker(1))).await.unwrap();
    assert_eq!(shown(&winner), 1);

    let owner = h.market.queries.get_job(job.id, Some(&requester())).await.unwrap();
    assert_eq!(shown(&owner), 2);
    // job result waits until the reward is claimed
    assert_eq!(owner.job.result, None);

    assert_eq!(h.market.queries.get_result(job.id, &worker(1)).await.unwrap(), work());
    let err = h.market.queries.get_result(job.id, &worker(3)).await.unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    h.market.lifecycle.confirm_claim(job.id, &worker(1)).await.unwrap();
    let owner = h.market.queries.get_job(job.id, Some(&requester())).await.unwrap();
    assert_eq!(owner.job.result, Some(work()));

    let history = h.market.queries.job_history(&worker(1)).await.unwrap();
    assert_eq!(history.completed.len(), 1);
    assert!(history.requested.is_empty());
}

#[tokio::test]
async fn open_job_listing_respects_trust() {
    let h = harness();
    h.open_job(0).await;
    h.open_job(80).await;

    let page = h.market.queries.find_open_jobs(TrustScore::new(50), Utc::now(), 1, 10).await.unwrap();
    assert_eq!(page.total, 1);
    let page = h.market.queries.list_jobs(vec![JobStatus::Open], 1, 10).await.unwrap();
    assert_eq!(page.total, 2);
}
