//! Dispatch Loops
//!
//! One loop per lane pulls messages off its queue and spawns a task per
//! message. The loop never waits for a task to finish, only for a permit from
//! the shared worker pool. Sibling messages therefore complete in any order.
//!
//! # Lock Ordering
//!
//! `inflight` is a `parking_lot` mutex and is never held across an await.

use crate::collected::{CollectedOutputs, CollectedQueue};
use crate::config::{ActorSystemConfig, DeliveryPolicy};
use crate::distributor::OutputDistributor;
use crate::error::ActorSystemError;
use crate::lanes::{Lane, OutputKind};
use crate::messages::{Message, MessageId, MessageTraceId, Payload};
use crate::metrics::SystemMetrics;
use crate::registry::{ActorId, ActorRegistry};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

/// Record of a message the system could not deliver or process
#[derive(Debug, Clone)]
pub struct DispatchFailure {
    pub message_id: MessageId,
    pub trace_id: MessageTraceId,
    pub kind: OutputKind,
    pub sender_id: Option<ActorId>,
    pub receiver_id: Option<ActorId>,
    pub error: ActorSystemError,
}

/// Tasks currently processing a message, keyed by the message they carry
pub(crate) type InflightTasks = Arc<Mutex<HashMap<MessageId, AbortHandle>>>;

/// State shared by both dispatch loops and every per-message task
pub(crate) struct DispatchContext<R: Payload, E: Payload> {
    pub registry: Arc<ActorRegistry<R, E>>,
    pub distributor: OutputDistributor<R, E>,
    pub collected: Arc<CollectedOutputs<R, E>>,
    pub failures: CollectedQueue<DispatchFailure>,
    pub metrics: Arc<SystemMetrics>,
    pub config: ActorSystemConfig,
    pub permits: Arc<Semaphore>,
    pub inflight: InflightTasks,
}

/// Removes a task's in-flight entry however the task ends
struct InflightGuard {
    message_id: MessageId,
    inflight: InflightTasks,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.inflight.lock().remove(&self.message_id);
    }
}

/// Header of a message, kept after its payload has been handed to an actor
struct Envelope {
    message_id: MessageId,
    trace_id: MessageTraceId,
    sender_id: Option<ActorId>,
    receiver_id: Option<ActorId>,
}

impl Envelope {
    fn of<T>(message: &Message<T>) -> Self {
        Self {
            message_id: message.id(),
            trace_id: message.trace_id(),
            sender_id: message.sender_id().cloned(),
            receiver_id: message.receiver_id().cloned(),
        }
    }
}

/// Pull messages off `queue` until it closes, spawning one task per message
pub(crate) async fn run_dispatch_loop<R, E, L>(
    ctx: Arc<DispatchContext<R, E>>,
    mut queue: mpsc::UnboundedReceiver<Message<L::Item>>,
) where
    R: Payload,
    E: Payload,
    L: Lane<R, E>,
{
    info!(kind = %L::KIND, "Dispatch loop started");

    while let Some(message) = queue.recv().await {
        let permit = match Arc::clone(&ctx.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                debug!(kind = %L::KIND, "Worker pool closed, leaving dispatch loop");
                break;
            }
        };

        let message_id = message.id();
        let task_ctx = Arc::clone(&ctx);

        // Hold the table while spawning so the task cannot deregister before it is registered.
        let mut inflight = ctx.inflight.lock();
        let handle = tokio::spawn(async move {
            let _permit = permit;
            let _guard = InflightGuard {
                message_id,
                inflight: Arc::clone(&task_ctx.inflight),
            };
            task_ctx.process::<L>(message).await;
        });
        inflight.insert(message_id, handle.abort_handle());
    }

    info!(kind = %L::KIND, "Dispatch loop finished");
}

impl<R: Payload, E: Payload> DispatchContext<R, E> {
    /// Per-message task body
    pub(crate) async fn process<L: Lane<R, E>>(&self, message: Message<L::Item>) {
        self.metrics.record_dispatched();
        let envelope = Envelope::of(&message);

        if self.config.debug {
            debug!(
                kind = %L::KIND,
                message_id = %envelope.message_id,
                trace_id = %envelope.trace_id,
                sender = ?envelope.sender_id,
                receiver = ?envelope.receiver_id,
                "Dispatching message"
            );
        }

        let Some(receiver_id) = envelope.receiver_id.clone() else {
            self.collect::<L>(envelope, message);
            return;
        };

        let Some(actor) = self.registry.get(&receiver_id).cloned() else {
            self.metrics.record_unknown_receiver();
            let error = ActorSystemError::unknown_receiver(&receiver_id, envelope.sender_id.as_ref());
            self.report(L::KIND, envelope, error);
            return;
        };

        let started = Instant::now();
        let outcome = L::invoke(actor.as_ref(), message.into_data()).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(output) => {
                self.metrics.record_handler_call(elapsed, true);
                let Some(output) = output else {
                    return;
                };
                match self.distributor.distribute(envelope.trace_id, output, actor.as_ref()) {
                    Ok(enqueued) if self.config.debug => {
                        debug!(
                            actor_id = %receiver_id,
                            trace_id = %envelope.trace_id,
                            enqueued,
                            handler_ns = elapsed.as_nanos() as u64,
                            "Handler output distributed"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!(actor_id = %receiver_id, error = %e, "Dropping output, dispatch queue closed");
                    }
                }
            }
            Err(e) => {
                self.metrics.record_handler_call(elapsed, false);
                error!(
                    kind = %L::KIND,
                    actor_id = %receiver_id,
                    message_id = %envelope.message_id,
                    trace_id = %envelope.trace_id,
                    error = %format!("{:#}", e),
                    "Actor handler failed"
                );
                self.report(L::KIND, envelope, ActorSystemError::handler(&receiver_id, &e));
            }
        }
    }

    /// Park a terminal message in its sender's collected queue
    fn collect<L: Lane<R, E>>(&self, envelope: Envelope, message: Message<L::Item>) {
        let Some(sender_id) = envelope.sender_id.clone() else {
            self.metrics.record_orphan();
            self.report(L::KIND, envelope, ActorSystemError::Orphaned);
            return;
        };

        match L::collected(&self.collected, &sender_id) {
            Some(queue) => {
                queue.push(message);
                self.metrics.record_collected();
            }
            None => {
                let error = ActorSystemError::unknown_actor(&sender_id);
                self.report(L::KIND, envelope, error);
            }
        }
    }

    /// Apply the delivery policy to a per-message fault
    fn report(&self, kind: OutputKind, envelope: Envelope, error: ActorSystemError) {
        match self.config.delivery_policy {
            DeliveryPolicy::Surface => {
                if !matches!(error, ActorSystemError::Handler { .. }) {
                    warn!(
                        kind = %kind,
                        message_id = %envelope.message_id,
                        trace_id = %envelope.trace_id,
                        error = %error,
                        error_category = error.category(),
                        "Message could not be delivered"
                    );
                }
                self.failures.push(DispatchFailure {
                    message_id: envelope.message_id,
                    trace_id: envelope.trace_id,
                    kind,
                    sender_id: envelope.sender_id,
                    receiver_id: envelope.receiver_id,
                    error,
                });
            }
            DeliveryPolicy::SilentDrop => {
                debug!(
                    kind = %kind,
                    message_id = %envelope.message_id,
                    error = %error,
                    "Dropping undeliverable message"
                );
            }
        }
    }

    /// Abort every in-flight task without waiting for it, returning how many were aborted
    pub(crate) fn abort_inflight(&self) -> usize {
        let handles: Vec<_> = self.inflight.lock().drain().collect();
        for (message_id, handle) in &handles {
            handle.abort();
            debug!(message_id = %message_id, "Aborted in-flight dispatch task");
        }
        handles.len()
    }
}
