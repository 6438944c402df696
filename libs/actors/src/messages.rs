//! Actor Messages
//!
//! Immutable routing units and the output batch an actor invocation yields.
//! Fan-out copies a payload once per receiver; a routed message is never
//! modified after it is built.

use crate::registry::ActorId;
use std::fmt;
use uuid::Uuid;

/// Bound shared by result and exception payloads
pub trait Payload: Clone + Send + Sync + fmt::Debug + 'static {}

impl<T> Payload for T where T: Clone + Send + Sync + fmt::Debug + 'static {}

/// Unique message identifier, keys the in-flight task table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0.simple())
    }
}

/// Correlates every message derived from one produce call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageTraceId(Uuid);

impl MessageTraceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageTraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageTraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trace-{}", self.0.simple())
    }
}

/// Unit of data routed between actors
///
/// A message without a receiver is terminal: it lands in the sender's
/// collected output queue, or is dropped when there is no sender either.
#[derive(Debug, Clone, PartialEq)]
pub struct Message<T> {
    id: MessageId,
    trace_id: MessageTraceId,
    data: T,
    sender_id: Option<ActorId>,
    receiver_id: Option<ActorId>,
}

impl<T> Message<T> {
    pub fn new(
        trace_id: MessageTraceId,
        data: T,
        sender_id: Option<ActorId>,
        receiver_id: Option<ActorId>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            trace_id,
            data,
            sender_id,
            receiver_id,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn trace_id(&self) -> MessageTraceId {
        self.trace_id
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn sender_id(&self) -> Option<&ActorId> {
        self.sender_id.as_ref()
    }

    pub fn receiver_id(&self) -> Option<&ActorId> {
        self.receiver_id.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.receiver_id.is_none()
    }

    /// Consume the message, keeping only its payload
    pub fn into_data(self) -> T {
        self.data
    }
}

/// Yield of one actor invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Output<R, E> {
    pub results: Vec<R>,
    pub exceptions: Vec<E>,
}

impl<R, E> Output<R, E> {
    pub fn new(results: Vec<R>, exceptions: Vec<E>) -> Self {
        Self {
            results,
            exceptions,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    pub fn results(results: Vec<R>) -> Self {
        Self::new(results, Vec::new())
    }

    pub fn exceptions(exceptions: Vec<E>) -> Self {
        Self::new(Vec::new(), exceptions)
    }

    pub fn with_result(mut self, result: R) -> Self {
        self.results.push(result);
        self
    }

    pub fn with_exception(mut self, exception: E) -> Self {
        self.exceptions.push(exception);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty() && self.exceptions.is_empty()
    }

    /// Total number of items across both lists
    pub fn len(&self) -> usize {
        self.results.len() + self.exceptions.len()
    }
}

impl<R, E> Default for Output<R, E> {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ids_are_unique() {
        let trace = MessageTraceId::new();
        let a = Message::new(trace, 1u32, None, Some(ActorId::named("b")));
        let b = Message::new(trace, 1u32, None, Some(ActorId::named("b")));

        assert_ne!(a.id(), b.id());
        assert_eq!(a.trace_id(), b.trace_id());
        assert!(a.id().to_string().starts_with("msg-"));
        assert!(trace.to_string().starts_with("trace-"));
    }

    #[test]
    fn test_terminal_message() {
        let msg = Message::new(
            MessageTraceId::new(),
            "row".to_string(),
            Some(ActorId::named("load")),
            None,
        );

        assert!(msg.is_terminal());
        assert_eq!(msg.sender_id(), Some(&ActorId::named("load")));
        assert_eq!(msg.into_data(), "row");
    }

    #[test]
    fn test_output_builders() {
        let output: Output<&str, &str> = Output::results(vec!["a"])
            .with_result("b")
            .with_exception("boom");

        assert_eq!(output.results, vec!["a", "b"]);
        assert_eq!(output.exceptions, vec!["boom"]);
        assert_eq!(output.len(), 3);
        assert!(!output.is_empty());
        assert!(Output::<u8, u8>::default().is_empty());
    }
}
