//! Delayed execution
//!
//! A `CallOut` delivers one message to a channel after a delay. Dropping or
//! cancelling it before it fires guarantees the message is never sent.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A one-shot delayed message
#[derive(Debug)]
pub struct CallOut {
    /// Caller-chosen id, echoed back so stale deliveries can be recognised
    pub generation: u64,
    handle: JoinHandle<()>,
}

impl CallOut {
    /// Send `message` on `tx` once `delay` has elapsed
    pub fn schedule<T>(generation: u64, delay: Duration, tx: mpsc::Sender<T>, message: T) -> Self
    where
        T: Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(message).await.is_err() {
                warn!(generation, "call_out target closed before delivery");
            }
        });
        debug!(generation, delay_ms = delay.as_millis() as u64, "call_out scheduled");
        Self { generation, handle }
    }

    /// Stop the call_out; the message will not be delivered
    pub fn cancel(self) {
        debug!(generation = self.generation, "call_out cancelled");
        // Drop aborts the task
    }
}

impl Drop for CallOut {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let (tx, mut rx) = mpsc::channel(4);
        let _call_out = CallOut::schedule(7, Duration::from_millis(1500), tx, "continue");

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(rx.recv().await, Some("continue"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_delivery() {
        let (tx, mut rx) = mpsc::channel::<u32>(4);
        let call_out = CallOut::schedule(1, Duration::from_millis(100), tx, 1);
        call_out.cancel();

        tokio::time::sleep(Duration::from_millis(500)).await;
        // Sender was dropped with the aborted task
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts() {
        let (tx, mut rx) = mpsc::channel::<u32>(4);
        {
            let _call_out = CallOut::schedule(2, Duration::from_millis(100), tx.clone(), 2);
        }
        let _keep = CallOut::schedule(3, Duration::from_millis(200), tx, 3);
        assert_eq!(rx.recv().await, Some(3));
    }
}
