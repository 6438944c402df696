//! Output Distributor
//!
//! Fans an actor's output batch out to every declared receiver: one message
//! per (item × receiver), or one terminal message per item when the sender
//! has no receivers. Queues are unbounded; distribution never waits.

use crate::error::{ActorSystemError, Result};
use crate::lanes::{Exceptions, Lane, Results};
use crate::messages::{Message, MessageTraceId, Output, Payload};
use crate::metrics::SystemMetrics;
use crate::registry::{Actor, ActorId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

/// Receiving halves of the two dispatch queues, handed to the loops on `run()`
pub(crate) struct DispatchReceivers<R, E> {
    pub results: mpsc::UnboundedReceiver<Message<R>>,
    pub exceptions: mpsc::UnboundedReceiver<Message<E>>,
}

/// Sending side of the result and exception dispatch queues
pub struct OutputDistributor<R, E> {
    results: mpsc::UnboundedSender<Message<R>>,
    exceptions: mpsc::UnboundedSender<Message<E>>,
    metrics: Arc<SystemMetrics>,
}

impl<R, E> Clone for OutputDistributor<R, E> {
    fn clone(&self) -> Self {
        Self {
            results: self.results.clone(),
            exceptions: self.exceptions.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<R: Payload, E: Payload> OutputDistributor<R, E> {
    pub(crate) fn new(metrics: Arc<SystemMetrics>) -> (Self, DispatchReceivers<R, E>) {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let (exceptions_tx, exceptions_rx) = mpsc::unbounded_channel();

        let distributor = Self {
            results: results_tx,
            exceptions: exceptions_tx,
            metrics,
        };
        let receivers = DispatchReceivers {
            results: results_rx,
            exceptions: exceptions_rx,
        };
        (distributor, receivers)
    }

    pub(crate) fn results_queue(&self) -> &mpsc::UnboundedSender<Message<R>> {
        &self.results
    }

    pub(crate) fn exceptions_queue(&self) -> &mpsc::UnboundedSender<Message<E>> {
        &self.exceptions
    }

    /// Distribute `output` produced by `sender`, returning the number of messages enqueued
    pub fn distribute(
        &self,
        trace_id: MessageTraceId,
        output: Output<R, E>,
        sender: &dyn Actor<R, E>,
    ) -> Result<usize> {
        let receivers = sender.receiving_actors();
        let Output {
            results,
            exceptions,
        } = output;

        let results = self.fan_out::<Results>(trace_id, results, sender.id(), receivers)?;
        let exceptions = self.fan_out::<Exceptions>(trace_id, exceptions, sender.id(), receivers)?;
        Ok(results + exceptions)
    }

    /// Enqueue `items` on lane `L`, broadcast to every receiver
    pub fn fan_out<L: Lane<R, E>>(
        &self,
        trace_id: MessageTraceId,
        items: Vec<L::Item>,
        sender_id: &ActorId,
        receivers: &[ActorId],
    ) -> Result<usize> {
        let mut enqueued = 0;

        for item in items {
            if receivers.is_empty() {
                self.enqueue::<L>(Message::new(trace_id, item, Some(sender_id.clone()), None))?;
                enqueued += 1;
                continue;
            }
            for receiver in receivers {
                self.enqueue::<L>(Message::new(
                    trace_id,
                    item.clone(),
                    Some(sender_id.clone()),
                    Some(receiver.clone()),
                ))?;
                enqueued += 1;
            }
        }

        if enqueued > 0 {
            trace!(
                kind = %L::KIND,
                sender = %sender_id,
                trace_id = %trace_id,
                enqueued,
                "Distributed output"
            );
        }
        Ok(enqueued)
    }

    /// Enqueue a single message on lane `L`
    pub fn enqueue<L: Lane<R, E>>(&self, message: Message<L::Item>) -> Result<()> {
        L::queue(self)
            .send(message)
            .map_err(|_| ActorSystemError::QueueClosed {
                queue: L::KIND.as_str(),
            })?;
        self.metrics.record_enqueued(L::KIND, 1);
        Ok(())
    }
}

impl<R, E> std::fmt::Debug for OutputDistributor<R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputDistributor")
            .field("results_closed", &self.results.is_closed())
            .field("exceptions_closed", &self.exceptions.is_closed())
            .finish()
    }
}
