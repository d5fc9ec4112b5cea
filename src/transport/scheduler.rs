//! Cancelable delayed tasks. Reconnect and settle delays go through this
//! scheduler so teardown and scope switches can cancel them instead of
//! leaving stray timers firing into a dead session.

use std::time::Duration;

use tokio::sync::{mpsc::UnboundedSender, watch};

use crate::domain::events::EngineEvent;

const SCHEDULED_TASK_FIRED: &str = "SCHEDULED_TASK_FIRED";
const SCHEDULED_TASK_CANCELED: &str = "SCHEDULED_TASK_CANCELED";

#[derive(Debug)]
struct ScheduledTask {
    label: &'static str,
    cancel_tx: watch::Sender<bool>,
}

/// Emits engine events after a delay. Dropping the scheduler (or calling
/// `cancel_all`) cancels everything still pending.
#[derive(Debug)]
pub struct TaskScheduler {
    events_tx: UnboundedSender<EngineEvent>,
    tasks: Vec<ScheduledTask>,
}

impl TaskScheduler {
    pub fn new(events_tx: UnboundedSender<EngineEvent>) -> Self {
        Self {
            events_tx,
            tasks: Vec::new(),
        }
    }

    pub fn schedule(&mut self, label: &'static str, delay: Duration, event: EngineEvent) {
        // Drop handles whose task already fired or was canceled.
        self.tasks.retain(|task| !task.cancel_tx.is_closed());

        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    tracing::debug!(code = SCHEDULED_TASK_FIRED, task = label, "scheduled task fired");
                    let _ = events_tx.send(event);
                }
                changed = cancel_rx.changed() => {
                    if changed.is_err() || *cancel_rx.borrow() {
                        tracing::debug!(
                            code = SCHEDULED_TASK_CANCELED,
                            task = label,
                            "scheduled task canceled"
                        );
                    }
                }
            }
        });

        self.tasks.push(ScheduledTask { label, cancel_tx });
    }

    pub fn cancel_all(&mut self) {
        for task in self.tasks.drain(..) {
            if !task.cancel_tx.is_closed() {
                tracing::debug!(code = SCHEDULED_TASK_CANCELED, task = task.label, "canceling pending task");
            }
            let _ = task.cancel_tx.send(true);
        }
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    #[tokio::test]
    async fn fires_the_event_after_the_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = TaskScheduler::new(tx);

        scheduler.schedule("queue-settle", Duration::from_millis(10), EngineEvent::ProcessQueue);

        let event = tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("task must fire in time")
            .expect("channel must stay open");
        assert_eq!(event, EngineEvent::ProcessQueue);
    }

    #[tokio::test]
    async fn canceled_tasks_never_fire() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = TaskScheduler::new(tx);

        scheduler.schedule("reconnect", Duration::from_millis(20), EngineEvent::Connect);
        scheduler.cancel_all();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropping_the_scheduler_cancels_pending_tasks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        {
            let mut scheduler = TaskScheduler::new(tx);
            scheduler.schedule("reconnect", Duration::from_millis(20), EngineEvent::Connect);
        }

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn multiple_tasks_fire_independently() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = TaskScheduler::new(tx);

        scheduler.schedule("queue-settle", Duration::from_millis(5), EngineEvent::ProcessQueue);
        scheduler.schedule("reconnect", Duration::from_millis(10), EngineEvent::Connect);

        let first = tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("first task must fire")
            .expect("channel open");
        let second = tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("second task must fire")
            .expect("channel open");
        assert_eq!(first, EngineEvent::ProcessQueue);
        assert_eq!(second, EngineEvent::Connect);
    }
}
