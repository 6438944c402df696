//! Actor System Error Types
//!
//! Infrastructure faults raised by the actor runtime. Business errors produced
//! by actors travel as exception payloads and never show up here.

use crate::registry::ActorId;
use thiserror::Error;

/// Main actor system error type
#[derive(Error, Debug, Clone)]
pub enum ActorSystemError {
    /// A caller referenced an actor the system does not own
    #[error("Unknown actor: {actor_id}")]
    UnknownActor { actor_id: ActorId },

    /// A queued message names a receiver the system does not own
    #[error("Unknown receiver: {receiver_id} (sender: {sender_id:?})")]
    UnknownReceiver {
        receiver_id: ActorId,
        sender_id: Option<ActorId>,
    },

    /// Terminal message with neither receiver nor sender
    #[error("Orphaned message: no receiver and no sender to collect it")]
    Orphaned,

    /// Two actors registered under the same id
    #[error("Duplicate actor id: {actor_id}")]
    DuplicateActor { actor_id: ActorId },

    /// Actor handler returned an error
    #[error("Handler error in {actor_id}: {message}")]
    Handler { actor_id: ActorId, message: String },

    /// `run()` was already called on this system
    #[error("Actor system is already running or has been stopped")]
    AlreadyRunning,

    /// Dispatch queue receiver is gone
    #[error("Queue closed: {queue}")]
    QueueClosed { queue: &'static str },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },
}

/// Result type alias for actor system operations
pub type Result<T> = std::result::Result<T, ActorSystemError>;

impl ActorSystemError {
    /// Create an unknown actor error
    pub fn unknown_actor(actor_id: &ActorId) -> Self {
        Self::UnknownActor {
            actor_id: actor_id.clone(),
        }
    }

    /// Create an unknown receiver error
    pub fn unknown_receiver(receiver_id: &ActorId, sender_id: Option<&ActorId>) -> Self {
        Self::UnknownReceiver {
            receiver_id: receiver_id.clone(),
            sender_id: sender_id.cloned(),
        }
    }

    /// Wrap a handler failure, keeping the full error chain as text
    pub fn handler(actor_id: &ActorId, error: &anyhow::Error) -> Self {
        Self::Handler {
            actor_id: actor_id.clone(),
            message: format!("{:#}", error),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(|f| f.to_string()),
        }
    }

    /// True for faults that belong to a single message rather than the system
    pub fn is_delivery_fault(&self) -> bool {
        matches!(
            self,
            ActorSystemError::UnknownReceiver { .. }
                | ActorSystemError::Orphaned
                | ActorSystemError::Handler { .. }
        )
    }

    /// Get error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            ActorSystemError::UnknownActor { .. } => "unknown_actor",
            ActorSystemError::UnknownReceiver { .. } => "unknown_receiver",
            ActorSystemError::Orphaned => "orphaned",
            ActorSystemError::DuplicateActor { .. } => "duplicate_actor",
            ActorSystemError::Handler { .. } => "handler",
            ActorSystemError::AlreadyRunning => "lifecycle",
            ActorSystemError::QueueClosed { .. } => "queue",
            ActorSystemError::Configuration { .. } => "configuration",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_fault_classification() {
        let id = ActorId::named("load");
        assert!(ActorSystemError::unknown_receiver(&id, None).is_delivery_fault());
        assert!(ActorSystemError::Orphaned.is_delivery_fault());
        assert!(!ActorSystemError::unknown_actor(&id).is_delivery_fault());
        assert!(!ActorSystemError::AlreadyRunning.is_delivery_fault());
    }

    #[test]
    fn test_handler_error_keeps_context_chain() {
        let id = ActorId::named("transform");
        let err = anyhow::anyhow!("bad row").context("parsing batch 7");
        let wrapped = ActorSystemError::handler(&id, &err);

        assert_eq!(wrapped.category(), "handler");
        let text = wrapped.to_string();
        assert!(text.contains("transform"));
        assert!(text.contains("parsing batch 7"));
        assert!(text.contains("bad row"));
    }

    #[test]
    fn test_configuration_error_field() {
        let err = ActorSystemError::configuration("must be positive", Some("max_inflight_dispatches"));
        match err {
            ActorSystemError::Configuration { field, .. } => {
                assert_eq!(field.as_deref(), Some("max_inflight_dispatches"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
