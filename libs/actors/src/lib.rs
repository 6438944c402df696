//! Actor-Based Result/Exception Routing
//!
//! Runtime that routes results and exceptions between independent actors,
//! buffers terminal output per actor, and streams it back out with an idle
//! timeout.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  Output   ┌──────────────────┐  Message  ┌────────────────┐
//! │    Actor     │──────────►│ OutputDistributor │─────────►│ results queue  │
//! │ process_*()  │           │  item × receiver  │          │ exception queue│
//! └──────▲───────┘           └──────────────────┘          └───────┬────────┘
//!        │                                                          │
//!        │             ┌──────────────────────────┐                 │
//!        └─────────────│ dispatch loop (per lane)  │◄───────────────┘
//!                      │ spawn task per message    │
//!                      └────────────┬─────────────┘
//!                                   │ no receiver
//!                                   ▼
//!                      ┌──────────────────────────┐
//!                      │ CollectedOutputs[sender]  │──► stream_actor_*()
//!                      └──────────────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust,no_run
//! use pipes_actors::{ActorId, ActorSystem, Output};
//! use pipes_actors::test_utils::ScriptedActor;
//! use futures::StreamExt;
//!
//! # async fn demo() -> pipes_actors::Result<()> {
//! let upper = ScriptedActor::<String, String>::new("upper", &[])
//!     .on_result(|s| Ok(Some(Output::results(vec![s.to_uppercase()]))));
//! let system = ActorSystem::new(vec![upper.into_dyn()])?;
//!
//! let runner = system.clone();
//! tokio::spawn(async move { runner.run().await });
//!
//! let id = ActorId::named("upper");
//! system.insert_result_message("hello".to_string(), None, Some(&id))?;
//! let out: Vec<String> = system.stream_actor_unpacked_results(&id, None)?.collect().await;
//! assert_eq!(out, vec!["HELLO".to_string()]);
//! system.kill();
//! # Ok(())
//! # }
//! ```

pub mod collected;
pub mod config;
pub mod dispatch;
pub mod distributor;
pub mod error;
pub mod lanes;
pub mod messages;
pub mod metrics;
pub mod registry;
pub mod routing;
pub mod system;
pub mod test_utils;

pub use collected::{CollectedOutputs, CollectedQueue};
pub use config::{ActorSystemConfig, ActorSystemConfigToml, DeliveryPolicy};
pub use dispatch::DispatchFailure;
pub use distributor::OutputDistributor;
pub use error::{ActorSystemError, Result};
pub use lanes::{Exceptions, Lane, OutputKind, Results};
pub use messages::{Message, MessageId, MessageTraceId, Output, Payload};
pub use metrics::{SystemMetrics, SystemStats};
pub use registry::{Actor, ActorId, ActorRegistry, HandlerResult};
pub use routing::{Connection, RoutingTable};
pub use system::{ActorSystem, SystemState};
