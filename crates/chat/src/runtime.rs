use futures::StreamExt;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::FuturesUnordered;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};

use crate::client::ChatClient;
use crate::events::{ClientEvent, Deferred};

/// Cloneable entry point used by transports and the UI to feed the runtime.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    sender: mpsc::UnboundedSender<ClientEvent>,
}

impl ClientHandle {
    /// Queues an event. Returns false once the runtime has stopped.
    pub fn send(&self, event: ClientEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    pub fn shutdown(&self) -> bool {
        self.send(ClientEvent::Shutdown)
    }
}

/// Single-threaded event loop around a [`ChatClient`].
///
/// Events run to completion one at a time. Decay checks come back as timer events and
/// draft loads are queued behind whatever is already waiting in the channel.
pub struct ClientRuntime {
    client: ChatClient,
    receiver: mpsc::UnboundedReceiver<ClientEvent>,
    loopback: mpsc::WeakUnboundedSender<ClientEvent>,
    timers: FuturesUnordered<BoxFuture<'static, ClientEvent>>,
}

impl ClientRuntime {
    pub fn new(client: ChatClient) -> (Self, ClientHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let runtime = Self {
            client,
            receiver,
            loopback: sender.downgrade(),
            timers: FuturesUnordered::new(),
        };
        (runtime, ClientHandle { sender })
    }

    /// Runs until [`ClientEvent::Shutdown`] arrives or every handle is dropped, then returns
    /// the client. Pending timers are abandoned.
    pub async fn run(mut self) -> ChatClient {
        tracing::info!("chat runtime started");

        loop {
            tokio::select! {
                event = self.receiver.recv() => match event {
                    Some(ClientEvent::Shutdown) | None => break,
                    Some(event) => self.dispatch(event),
                },
                Some(event) = self.timers.next(), if !self.timers.is_empty() => {
                    self.dispatch(event);
                }
            }
        }

        tracing::info!(pending_timers = self.timers.len(), "chat runtime stopped");
        self.client
    }

    fn dispatch(&mut self, event: ClientEvent) {
        let deferred = self.client.handle(event, Instant::now());
        for work in deferred {
            self.schedule(work);
        }
    }

    fn schedule(&mut self, work: Deferred) {
        let due = match &work {
            Deferred::DecayCheck { due, .. } => Some(*due),
            Deferred::LoadDraft { .. } => None,
        };
        let event = work.into_event();

        match due {
            Some(due) => {
                self.timers
                    .push(async move {
                        sleep_until(due).await;
                        event
                    }
                    .boxed());
            }
            None => {
                let Some(sender) = self.loopback.upgrade() else {
                    return;
                };
                if sender.send(event).is_err() {
                    tracing::debug!("runtime channel closed before a deferred draft load");
                }
            }
        }
    }
}
