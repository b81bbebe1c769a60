use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use tcc_core::{Participant, ParticipantResult};

type BoxFuture = Pin<Box<dyn Future<Output = ParticipantResult> + Send>>;
type Op = Box<dyn Fn(u64) -> BoxFuture + Send + Sync>;

/// A [`Participant`] that wraps three closures registered directly in this binary — used for
/// tests and for participants that are just other modules in the same process rather than a
/// separate service reachable over HTTP.
pub struct InProcessParticipant {
    id: String,
    try_op: Op,
    confirm: Op,
    cancel: Op,
}

impl InProcessParticipant {
    /// Build a participant from three `tx_id -> ParticipantResult` async closures.
    pub fn new<TryFn, TryFut, ConfirmFn, ConfirmFut, CancelFn, CancelFut>(
        id: impl Into<String>,
        try_op: TryFn,
        confirm: ConfirmFn,
        cancel: CancelFn,
    ) -> Self
    where
        TryFn: Fn(u64) -> TryFut + Send + Sync + 'static,
        TryFut: Future<Output = ParticipantResult> + Send + 'static,
        ConfirmFn: Fn(u64) -> ConfirmFut + Send + Sync + 'static,
        ConfirmFut: Future<Output = ParticipantResult> + Send + 'static,
        CancelFn: Fn(u64) -> CancelFut + Send + Sync + 'static,
        CancelFut: Future<Output = ParticipantResult> + Send + 'static,
    {
        Self {
            id: id.into(),
            try_op: Box::new(move |tx_id| Box::pin(try_op(tx_id))),
            confirm: Box::new(move |tx_id| Box::pin(confirm(tx_id))),
            cancel: Box::new(move |tx_id| Box::pin(cancel(tx_id))),
        }
    }
}

#[async_trait]
impl Participant for InProcessParticipant {
    fn id(&self) -> &str {
        &self.id
    }

    async fn try_op(&self, tx_id: u64) -> ParticipantResult {
        (self.try_op)(tx_id).await
    }

    async fn confirm(&self, tx_id: u64) -> ParticipantResult {
        (self.confirm)(tx_id).await
    }

    async fn cancel(&self, tx_id: u64) -> ParticipantResult {
        (self.cancel)(tx_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn wraps_closures_and_reports_id() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let p = InProcessParticipant::new(
            "widget-service",
            move |_tx_id| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            |_tx_id| async { Ok(()) },
            |_tx_id| async { Ok(()) },
        );

        assert_eq!(p.id(), "widget-service");
        p.try_op(7).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
