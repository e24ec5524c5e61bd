use crate::error::GateError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Bounds concurrent calls into one model backend.
///
/// Each call runs in its own task that owns its semaphore permit. A caller
/// that gives up (timeout, dropped request) stops waiting, but the permit is
/// only returned once the backend call itself has finished, so a slow
/// inference can never overlap with the next one. Its late result is
/// dropped with the task.
#[derive(Debug, Clone)]
pub struct BackendGate {
    backend: &'static str,
    permits: Arc<Semaphore>,
}

impl BackendGate {
    /// `max_concurrent` of 0 is treated as 1.
    pub fn new(backend: &'static str, max_concurrent: usize) -> Self {
        Self {
            backend,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Runs `call` once a permit is free. `budget` covers both queueing and
    /// execution.
    pub async fn run<F, T>(&self, budget: Duration, call: F) -> Result<T, GateError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let timed_out = GateError::Timeout {
            backend: self.backend,
            after: budget,
        };
        if budget.is_zero() {
            return Err(timed_out);
        }
        let deadline = tokio::time::Instant::now() + budget;

        let permit =
            match tokio::time::timeout_at(deadline, Arc::clone(&self.permits).acquire_owned())
                .await
            {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => {
                    return Err(GateError::Closed {
                        backend: self.backend,
                    })
                }
                Err(_) => {
                    tracing::debug!(backend = self.backend, "timed out waiting for backend");
                    return Err(timed_out);
                }
            };

        let task = tokio::spawn(async move {
            let output = call.await;
            drop(permit);
            output
        });

        match tokio::time::timeout_at(deadline, task).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(GateError::Aborted {
                backend: self.backend,
                reason: e.to_string(),
            }),
            Err(_) => {
                tracing::warn!(
                    backend = self.backend,
                    budget_ms = budget.as_millis() as u64,
                    "backend call exceeded its budget; result will be discarded"
                );
                Err(timed_out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn serializes_calls_at_capacity_one() {
        let gate = BackendGate::new("tts", 1);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let gate = gate.clone();
            let active = active.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                gate.run(Duration::from_secs(5), async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(gate.permits.available_permits(), 1);
    }

    #[tokio::test]
    async fn timed_out_call_keeps_its_permit_until_done() {
        let gate = BackendGate::new("llm", 1);
        let finished = Arc::new(AtomicUsize::new(0));

        let done = finished.clone();
        let result = gate
            .run(Duration::from_millis(20), async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                done.fetch_add(1, Ordering::SeqCst);
                "late"
            })
            .await;

        assert!(matches!(result, Err(GateError::Timeout { .. })));
        assert_eq!(gate.permits.available_permits(), 0, "backend is still busy");

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(gate.permits.available_permits(), 1);
    }

    #[tokio::test]
    async fn queued_caller_times_out_without_running() {
        let gate = BackendGate::new("stt", 1);
        let ran = Arc::new(AtomicUsize::new(0));

        let busy = gate.clone();
        let hold = tokio::spawn(async move {
            busy.run(Duration::from_secs(5), async {
                tokio::time::sleep(Duration::from_millis(200)).await;
            })
            .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let counter = ran.clone();
        let queued = gate
            .run(Duration::from_millis(30), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        assert!(matches!(queued, Err(GateError::Timeout { .. })));
        hold.await.unwrap().unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dropped_caller_does_not_cancel_backend() {
        let gate = BackendGate::new("tts", 1);
        let finished = Arc::new(AtomicUsize::new(0));

        let done = finished.clone();
        let caller = gate.run(Duration::from_secs(5), async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            done.fetch_add(1, Ordering::SeqCst);
        });
        // Poll just long enough to spawn the backend task, then drop.
        let _ = tokio::time::timeout(Duration::from_millis(10), caller).await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(gate.permits.available_permits(), 1);
    }

    #[tokio::test]
    async fn zero_budget_fails_fast() {
        let gate = BackendGate::new("tts", 0);
        assert_eq!(gate.permits.available_permits(), 1);
        let result = gate.run(Duration::ZERO, async { 1 }).await;
        assert!(matches!(result, Err(GateError::Timeout { .. })));
    }

    #[tokio::test]
    async fn panicking_backend_is_reported() {
        let gate = BackendGate::new("llm", 1);
        let result: Result<(), _> = gate
            .run(Duration::from_secs(1), async {
                panic!("model crashed");
            })
            .await;
        assert!(matches!(result, Err(GateError::Aborted { .. })));
        assert_eq!(gate.permits.available_permits(), 1);
    }
}
