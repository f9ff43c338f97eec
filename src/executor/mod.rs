//! Transactional execution: connection, isolation-scoped transaction,
//! timeout, cancellation, and rollback-on-any-failure.
//!
//! State flow per call: Idle → Connecting → TransactionOpen → Executing →
//! Committing/Committed, or RollingBack/RolledBack on any fault. A
//! connect-time fault jumps straight to the failure path without a rollback
//! attempt because no transaction was opened.

pub mod transaction;

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{MssqlExecError, RollbackOutcome};
use crate::params;
use crate::results::{ExecutionOutcome, OutcomeEnvelope, materialize};
use crate::types::{ExecutionRequest, FailureMode};

pub use transaction::Session;

/// Execute a SQL statement or stored-procedure call per the request.
///
/// On failure the fault either propagates as `Err` (annotated with the
/// rollback outcome) or is captured into a failure envelope, depending on
/// the request's failure mode. Either way the transaction never stays
/// half-committed: every fault past `BEGIN` triggers a rollback attempt.
///
/// # Errors
///
/// With `FailureMode::Propagate`, any connectivity, statement, timeout, or
/// cancellation fault. With `FailureMode::Capture`, only envelope-free
/// invariants can fail (never expected in practice); faults land in the
/// envelope instead.
pub async fn execute(
    request: &ExecutionRequest,
    cancel: &CancellationToken,
) -> Result<OutcomeEnvelope, MssqlExecError> {
    let result = run(request, cancel).await;
    deliver(result, request.failure_mode)
}

async fn run(
    request: &ExecutionRequest,
    cancel: &CancellationToken,
) -> Result<ExecutionOutcome, MssqlExecError> {
    let (sql, bound) = params::prepare(&request.statement, &request.params)?;

    let mut session = guard(cancel, Session::connect(&request.connection_string)).await?;
    session.begin(request.isolation).await?;

    let result = {
        let exec = materialize(session.client_mut(), &sql, &bound, request.kind);
        with_limits(cancel, request.timeout_secs, exec).await
    };

    settle(session, result).await
}

/// Route a per-call result through commit or rollback, annotating faults
/// with the rollback outcome. Shared by query, bulk, and export paths.
pub(crate) async fn settle<T>(
    mut session: Session,
    result: Result<T, MssqlExecError>,
) -> Result<T, MssqlExecError> {
    match result {
        Ok(value) => match session.commit().await {
            Ok(()) => Ok(value),
            Err(commit_err) => Err(annotate_with_rollback(&mut session, commit_err).await),
        },
        Err(primary) => {
            if session.in_transaction() {
                Err(annotate_with_rollback(&mut session, primary).await)
            } else {
                Err(primary)
            }
        }
    }
}

/// Ceiling on the rollback attempt itself. The connection may have been
/// abandoned mid-stream by a timeout or cancellation, so the rollback cannot
/// be allowed to stall the already-failed call indefinitely.
const ROLLBACK_DEADLINE: Duration = Duration::from_secs(5);

async fn annotate_with_rollback(session: &mut Session, primary: MssqlExecError) -> MssqlExecError {
    let rollback = bounded_rollback(session.rollback()).await;
    primary.with_rollback(rollback)
}

async fn bounded_rollback<F>(rollback: F) -> RollbackOutcome
where
    F: Future<Output = Result<(), MssqlExecError>>,
{
    match tokio::time::timeout(ROLLBACK_DEADLINE, rollback).await {
        Ok(Ok(())) => RollbackOutcome::Completed,
        Ok(Err(rollback_err)) => RollbackOutcome::Failed(rollback_err.to_string()),
        Err(_) => RollbackOutcome::Failed(format!(
            "rollback timed out after {} seconds",
            ROLLBACK_DEADLINE.as_secs()
        )),
    }
}

/// Apply the request's failure mode to a settled result.
pub(crate) fn deliver(
    result: Result<ExecutionOutcome, MssqlExecError>,
    failure_mode: FailureMode,
) -> Result<OutcomeEnvelope, MssqlExecError> {
    match result {
        Ok(outcome) => Ok(OutcomeEnvelope::succeeded(outcome)),
        Err(e) => match failure_mode {
            FailureMode::Propagate => Err(e),
            FailureMode::Capture => Ok(OutcomeEnvelope::failed(&e)),
        },
    }
}

/// Race a fallible future against the cancellation token.
pub(crate) async fn guard<T, F>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<T, MssqlExecError>
where
    F: Future<Output = Result<T, MssqlExecError>>,
{
    tokio::select! {
        () = cancel.cancelled() => Err(MssqlExecError::Cancelled),
        result = fut => result,
    }
}

/// Race a fallible future against both the cancellation token and the
/// per-call timeout.
pub(crate) async fn with_limits<T, F>(
    cancel: &CancellationToken,
    timeout_secs: Option<u64>,
    fut: F,
) -> Result<T, MssqlExecError>
where
    F: Future<Output = Result<T, MssqlExecError>>,
{
    match timeout_secs {
        None => guard(cancel, fut).await,
        Some(secs) => {
            let limited = async {
                tokio::time::timeout(Duration::from_secs(secs), fut)
                    .await
                    .map_err(|_| MssqlExecError::Timeout(secs))?
            };
            guard(cancel, limited).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::ExecutionOutcome;

    #[test]
    fn capture_mode_wraps_faults_into_envelopes() {
        let err = MssqlExecError::ConnectionError("Login failed for user 'x'".to_string());
        let envelope = deliver(Err(err), FailureMode::Capture).unwrap();
        assert!(!envelope.success);
        assert_eq!(envelope.records_affected, 0);
        assert!(envelope.data.is_none());
        assert!(
            envelope
                .error_message
                .unwrap()
                .contains("Login failed for user")
        );
    }

    #[test]
    fn propagate_mode_raises_the_fault() {
        let err = MssqlExecError::ExecutionError("bad".to_string());
        assert!(deliver(Err(err), FailureMode::Propagate).is_err());
    }

    #[test]
    fn success_is_never_partially_delivered() {
        let envelope = deliver(
            Ok(ExecutionOutcome::NonQuery { affected: 2 }),
            FailureMode::Capture,
        )
        .unwrap();
        assert!(envelope.success);
        assert!(envelope.error_message.is_none());
        assert_eq!(envelope.records_affected, 2);
    }

    #[tokio::test]
    async fn cancellation_surfaces_as_a_cancelled_fault() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let pending = std::future::pending::<Result<(), MssqlExecError>>();
        let result = guard(&cancel, pending).await;
        assert!(matches!(result, Err(MssqlExecError::Cancelled)));
    }

    #[tokio::test]
    async fn wedged_rollback_is_reported_not_awaited_forever() {
        tokio::time::pause();
        let stuck = std::future::pending::<Result<(), MssqlExecError>>();
        let outcome = bounded_rollback(stuck).await;
        match outcome {
            RollbackOutcome::Failed(detail) => assert!(detail.contains("timed out")),
            RollbackOutcome::Completed => panic!("stuck rollback reported as completed"),
        }
    }

    #[tokio::test]
    async fn clean_rollback_reports_completed() {
        let outcome = bounded_rollback(async { Ok(()) }).await;
        assert_eq!(outcome, RollbackOutcome::Completed);
    }

    #[tokio::test]
    async fn timeout_surfaces_with_the_configured_seconds() {
        let cancel = CancellationToken::new();
        let slow = async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<(), MssqlExecError>(())
        };
        tokio::time::pause();
        let result = with_limits(&cancel, Some(1), slow).await;
        assert!(matches!(result, Err(MssqlExecError::Timeout(1))));
    }
}
