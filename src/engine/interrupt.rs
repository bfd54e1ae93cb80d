// file: src/engine/interrupt.rs
// version: 1.0.0
// guid: 20652a37-a9e7-43fd-a224-cb05b42a6a1a

//! Process interrupt signalling for in-flight requests

use std::sync::Arc;
use tokio::sync::watch;

/// Observes whether the process has been asked to stop
#[derive(Debug, Clone)]
pub struct Interrupt {
    rx: watch::Receiver<bool>,
}

/// Trips every [`Interrupt`] created from the same channel
#[derive(Debug, Clone)]
pub struct InterruptTrigger {
    tx: Arc<watch::Sender<bool>>,
}

impl Interrupt {
    pub fn channel() -> (InterruptTrigger, Interrupt) {
        let (tx, rx) = watch::channel(false);
        (InterruptTrigger { tx: Arc::new(tx) }, Interrupt { rx })
    }

    /// An interrupt that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once triggered; pends forever if the trigger is gone
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|triggered| *triggered).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl InterruptTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_waiters() {
        let (trigger, interrupt) = Interrupt::channel();
        assert!(!interrupt.is_triggered());

        let waiter = interrupt.clone();
        let handle = tokio::spawn(async move { waiter.triggered().await });
        trigger.trigger();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(interrupt.is_triggered());
    }

    #[tokio::test]
    async fn test_never_does_not_fire() {
        let interrupt = Interrupt::never();

        let result = tokio::time::timeout(Duration::from_millis(20), interrupt.triggered()).await;

        assert!(result.is_err());
        assert!(!interrupt.is_triggered());
    }
}
