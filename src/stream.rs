//! Direct stream negotiator driver
//!
//! Runs the [`Negotiator`] state machine against one owned peer client in a
//! background task. Owns the single retry timer.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use tracing::{debug, info, trace};

use crate::core::{Action, DirectStreamState, Negotiator, NegotiatorState, PeerEvent};
use crate::identity::random_suffix;
use crate::peer::{PeerClient, PeerClientFactory};

/// What the negotiator reports to the session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamUpdate {
    Direct(DirectStreamState),
    /// Non-fatal advisory; the session keeps running on the fallback player
    Warning(String),
}

pub struct DirectStreamNegotiator {
    event_id: String,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl DirectStreamNegotiator {
    pub fn spawn(
        event_id: &str,
        factory: &dyn PeerClientFactory,
        retry_delay: Duration,
        updates: UnboundedSender<StreamUpdate>,
    ) -> Self {
        let machine = Negotiator::new(event_id, &random_suffix()).with_retry_delay(retry_delay);
        let (client, events) = factory.create();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let driver = Driver {
            machine,
            client,
            retry: None,
            updates,
        };
        let task = tokio::spawn(driver.run(events, shutdown_rx));

        Self {
            event_id: event_id.to_string(),
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    /// Cancel the retry timer, close the peer client and wait for the task
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let task = &mut self.task;
        if let Err(e) = task.await {
            if !e.is_cancelled() {
                debug!(error = %e, "Negotiator task failed");
            }
        }
    }
}

impl Drop for DirectStreamNegotiator {
    fn drop(&mut self) {
        // Not awaited: aborting drops the peer client and the timer with it
        self.task.abort();
    }
}

enum Step {
    Shutdown,
    Event(Option<PeerEvent>),
    Retry,
}

struct Driver {
    machine: Negotiator,
    client: Box<dyn PeerClient>,
    retry: Option<Pin<Box<Sleep>>>,
    updates: UnboundedSender<StreamUpdate>,
}

impl Driver {
    async fn run(
        mut self,
        mut events: UnboundedReceiver<PeerEvent>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let actions = self.machine.start();
        self.execute(actions).await;

        let mut events_open = true;
        loop {
            let step = tokio::select! {
                _ = &mut shutdown => Step::Shutdown,
                event = events.recv(), if events_open => Step::Event(event),
                _ = wait_retry(&mut self.retry) => Step::Retry,
            };

            let actions = match step {
                Step::Shutdown => {
                    let actions = self.machine.shutdown();
                    self.execute(actions).await;
                    break;
                }
                Step::Event(Some(event)) => {
                    trace!(?event, state = ?self.machine.state(), "Peer event");
                    self.machine.handle(event)
                }
                Step::Event(None) => {
                    debug!("Peer event stream closed");
                    events_open = false;
                    continue;
                }
                Step::Retry => {
                    self.retry = None;
                    self.machine.retry_elapsed()
                }
            };
            self.execute(actions).await;
        }

        info!(local_id = %self.machine.local_id(), "Negotiator stopped");
    }

    /// Run actions in order. Command failures are fed back into the machine.
    async fn execute(&mut self, actions: Vec<Action>) {
        let mut queue: std::collections::VecDeque<Action> = actions.into();

        while let Some(action) = queue.pop_front() {
            let result = match action {
                Action::Register { local_id } => self.client.register(&local_id).await,
                Action::OpenControl { remote_id } => self.client.open_control(&remote_id).await,
                Action::SendControl(msg) => self.client.send_control(msg).await,
                Action::Answer {
                    call_id,
                    placeholder,
                } => self.client.answer(&call_id, placeholder).await,
                Action::ScheduleRetry(delay) => {
                    self.retry = Some(Box::pin(sleep(delay)));
                    Ok(())
                }
                Action::CancelRetry => {
                    self.retry = None;
                    Ok(())
                }
                Action::StreamChanged(state) => {
                    let _ = self.updates.send(StreamUpdate::Direct(state));
                    Ok(())
                }
                Action::Warn(msg) => {
                    let _ = self.updates.send(StreamUpdate::Warning(msg));
                    Ok(())
                }
                Action::Close => {
                    self.client.close().await;
                    Ok(())
                }
            };

            if let Err(e) = result {
                if self.machine.state() == NegotiatorState::Terminated {
                    continue;
                }
                queue.extend(self.machine.handle(PeerEvent::Error(e)));
            }
        }
    }
}

async fn wait_retry(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}
