//! Mock and scripted [`Participant`] implementations for exercising the lifecycle engine
//! without a real downstream service.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tcc_core::{CoordinatorError, Participant, ParticipantResult, Phase};

mockall::mock! {
    /// Mock implementation of `Participant` for tests that need call-count or argument
    /// assertions `ScriptedParticipant` can't express.
    pub Participant {}

    impl std::fmt::Debug for Participant {
        fn fmt<'a>(&self, f: &mut std::fmt::Formatter<'a>) -> std::fmt::Result;
    }

    #[async_trait]
    impl Participant for Participant {
        fn id(&self) -> &str;
        async fn try_op(&self, tx_id: u64) -> ParticipantResult;
        async fn confirm(&self, tx_id: u64) -> ParticipantResult;
        async fn cancel(&self, tx_id: u64) -> ParticipantResult;
    }
}

/// A scripted response for one phase: either succeed, fail a fixed number of times before
/// succeeding, or fail forever.
#[derive(Debug, Clone, Copy)]
pub enum Script {
    /// Always succeeds.
    AlwaysOk,
    /// Fails with a retryable error `failures` times, then succeeds.
    FailsThenOk {
        /// How many calls return an error before the call that finally succeeds.
        failures: u32,
    },
    /// Always fails. `retryable` controls whether `RetryExecutor` would keep trying.
    AlwaysFails {
        /// Whether the error is classified retryable.
        retryable: bool,
    },
    /// Sleeps past any reasonable Try-phase timeout before succeeding; used to exercise the
    /// abandoned-Try path.
    Hangs,
}

/// A [`Participant`] whose three operations are each driven by an independent [`Script`],
/// with call counts tracked for assertions.
pub struct ScriptedParticipant {
    id: String,
    try_script: Script,
    confirm_script: Script,
    cancel_script: Script,
    try_calls: AtomicU32,
    confirm_calls: AtomicU32,
    cancel_calls: AtomicU32,
}

impl ScriptedParticipant {
    /// A participant whose Try, Confirm, and Cancel all always succeed.
    pub fn always_ok(id: impl Into<String>) -> Arc<Self> {
        Self::new(id, Script::AlwaysOk, Script::AlwaysOk, Script::AlwaysOk)
    }

    /// A participant whose `Try` rejects the transaction for a business reason.
    pub fn try_rejects(id: impl Into<String>) -> Arc<Self> {
        Self::new(
            id,
            Script::AlwaysFails { retryable: false },
            Script::AlwaysOk,
            Script::AlwaysOk,
        )
    }

    /// A participant whose `Try` never returns within any reasonable timeout.
    pub fn try_hangs(id: impl Into<String>) -> Arc<Self> {
        Self::new(id, Script::Hangs, Script::AlwaysOk, Script::AlwaysOk)
    }

    /// A participant whose `Confirm` fails transiently `failures` times before succeeding.
    pub fn confirm_fails_then_ok(id: impl Into<String>, failures: u32) -> Arc<Self> {
        Self::new(
            id,
            Script::AlwaysOk,
            Script::FailsThenOk { failures },
            Script::AlwaysOk,
        )
    }

    /// Build a participant with an independent script per phase.
    pub fn new(
        id: impl Into<String>,
        try_script: Script,
        confirm_script: Script,
        cancel_script: Script,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            try_script,
            confirm_script,
            cancel_script,
            try_calls: AtomicU32::new(0),
            confirm_calls: AtomicU32::new(0),
            cancel_calls: AtomicU32::new(0),
        })
    }

    /// Number of times `try_op` has been called.
    pub fn try_call_count(&self) -> u32 {
        self.try_calls.load(Ordering::SeqCst)
    }

    /// Number of times `confirm` has been called.
    pub fn confirm_call_count(&self) -> u32 {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    /// Number of times `cancel` has been called.
    pub fn cancel_call_count(&self) -> u32 {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    async fn run(&self, phase: Phase, script: Script, attempt: u32) -> ParticipantResult {
        match script {
            Script::AlwaysOk => Ok(()),
            Script::FailsThenOk { failures } => {
                if attempt <= failures {
                    Err(CoordinatorError::ParticipantExecutionError {
                        phase,
                        participant_id: self.id.clone(),
                        source: Box::new(ScriptedError),
                        retryable: true,
                    })
                } else {
                    Ok(())
                }
            }
            Script::AlwaysFails { retryable } => Err(CoordinatorError::ParticipantExecutionError {
                phase,
                participant_id: self.id.clone(),
                source: Box::new(ScriptedError),
                retryable,
            }),
            Script::Hangs => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}

#[derive(Debug)]
struct ScriptedError;

impl std::fmt::Display for ScriptedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scripted participant failure")
    }
}

impl std::error::Error for ScriptedError {}

#[async_trait]
impl Participant for ScriptedParticipant {
    fn id(&self) -> &str {
        &self.id
    }

    async fn try_op(&self, _tx_id: u64) -> ParticipantResult {
        let attempt = self.try_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.run(Phase::Try, self.try_script, attempt).await
    }

    async fn confirm(&self, _tx_id: u64) -> ParticipantResult {
        let attempt = self.confirm_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.run(Phase::Confirm, self.confirm_script, attempt).await
    }

    async fn cancel(&self, _tx_id: u64) -> ParticipantResult {
        let attempt = self.cancel_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.run(Phase::Cancel, self.cancel_script, attempt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fails_then_ok_counts_attempts() {
        let p = ScriptedParticipant::confirm_fails_then_ok("svc", 2);
        assert!(p.confirm(1).await.is_err());
        assert!(p.confirm(1).await.is_err());
        assert!(p.confirm(1).await.is_ok());
        assert_eq!(p.confirm_call_count(), 3);
    }

    #[tokio::test]
    async fn try_rejects_is_terminal() {
        let p = ScriptedParticipant::try_rejects("svc");
        let err = p.try_op(1).await.unwrap_err();
        assert!(!err.retryable());
    }
}
