//! Result and exception lanes
//!
//! Both paths through the system share one implementation. A lane binds the
//! payload type, the actor method it invokes, the dispatch queue it feeds and
//! the collected queue that captures its terminal messages.

use crate::collected::{CollectedOutputs, CollectedQueue};
use crate::distributor::OutputDistributor;
use crate::messages::{Message, Payload};
use crate::registry::{Actor, ActorId, HandlerResult};
use futures::future::BoxFuture;
use std::fmt;
use tokio::sync::mpsc;

/// Runtime name of a lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    Result,
    Exception,
}

impl OutputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputKind::Result => "result",
            OutputKind::Exception => "exception",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Lane of results, served by `Actor::process_result`
#[derive(Debug, Clone, Copy, Default)]
pub struct Results;

/// Lane of exceptions, served by `Actor::process_exception`
#[derive(Debug, Clone, Copy, Default)]
pub struct Exceptions;

impl sealed::Sealed for Results {}
impl sealed::Sealed for Exceptions {}

/// Typed path through the system; implemented by [`Results`] and [`Exceptions`] only
pub trait Lane<R: Payload, E: Payload>: sealed::Sealed + Send + Sync + 'static {
    type Item: Payload;

    const KIND: OutputKind;

    fn invoke<'a>(actor: &'a dyn Actor<R, E>, data: Self::Item) -> BoxFuture<'a, HandlerResult<R, E>>;

    fn queue(distributor: &OutputDistributor<R, E>) -> &mpsc::UnboundedSender<Message<Self::Item>>;

    fn collected<'a>(
        outputs: &'a CollectedOutputs<R, E>,
        actor_id: &ActorId,
    ) -> Option<&'a CollectedQueue<Message<Self::Item>>>;
}

impl<R: Payload, E: Payload> Lane<R, E> for Results {
    type Item = R;

    const KIND: OutputKind = OutputKind::Result;

    fn invoke<'a>(actor: &'a dyn Actor<R, E>, data: R) -> BoxFuture<'a, HandlerResult<R, E>> {
        actor.process_result(data)
    }

    fn queue(distributor: &OutputDistributor<R, E>) -> &mpsc::UnboundedSender<Message<R>> {
        distributor.results_queue()
    }

    fn collected<'a>(
        outputs: &'a CollectedOutputs<R, E>,
        actor_id: &ActorId,
    ) -> Option<&'a CollectedQueue<Message<R>>> {
        outputs.results(actor_id)
    }
}

impl<R: Payload, E: Payload> Lane<R, E> for Exceptions {
    type Item = E;

    const KIND: OutputKind = OutputKind::Exception;

    fn invoke<'a>(actor: &'a dyn Actor<R, E>, data: E) -> BoxFuture<'a, HandlerResult<R, E>> {
        actor.process_exception(data)
    }

    fn queue(distributor: &OutputDistributor<R, E>) -> &mpsc::UnboundedSender<Message<E>> {
        distributor.exceptions_queue()
    }

    fn collected<'a>(
        outputs: &'a CollectedOutputs<R, E>,
        actor_id: &ActorId,
    ) -> Option<&'a CollectedQueue<Message<E>>> {
        outputs.exceptions(actor_id)
    }
}
