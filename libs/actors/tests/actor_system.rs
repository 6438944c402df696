//! Integration Tests for the Actor System
//!
//! Drives the public API end to end:
//! - fan-out to multiple receivers and terminal capture
//! - multi-stage pipelines with trace propagation
//! - exception routing through `process_exception`
//! - idle-timeout stream termination
//! - liveness of sibling messages that complete out of order

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use pipes_actors::test_utils::ScriptedActor;
use pipes_actors::{
    Actor, ActorId, ActorSystem, ActorSystemConfig, HandlerResult, Output, Results,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Exception payload used across the pipeline tests
#[derive(Debug, Clone, PartialEq)]
enum PipelineError {
    Value(String),
    Parse { line: usize },
}

type Record = String;
type DynActor = Arc<dyn Actor<Record, PipelineError>>;

/// Actor that records every call and splits CSV-ish lines into fields
struct SplitActor {
    id: ActorId,
    receivers: Vec<ActorId>,
    results: Mutex<Vec<Record>>,
    exceptions: Mutex<Vec<PipelineError>>,
}

impl SplitActor {
    fn new(id: &str, receivers: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            id: ActorId::named(id),
            receivers: receivers.iter().map(ActorId::named).collect(),
            results: Mutex::new(Vec::new()),
            exceptions: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Actor<Record, PipelineError> for SplitActor {
    fn id(&self) -> &ActorId {
        &self.id
    }

    fn receiving_actors(&self) -> &[ActorId] {
        &self.receivers
    }

    async fn process_result(&self, data: Record) -> HandlerResult<Record, PipelineError> {
        self.results.lock().push(data.clone());

        let mut output = Output::empty();
        for (line, field) in data.split(',').enumerate() {
            if field.is_empty() {
                output = output.with_exception(PipelineError::Parse { line });
            } else {
                output = output.with_result(field.trim().to_string());
            }
        }
        Ok(Some(output))
    }

    async fn process_exception(&self, data: PipelineError) -> HandlerResult<Record, PipelineError> {
        self.exceptions.lock().push(data);
        Ok(None)
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn start(system: &ActorSystem<Record, PipelineError>) -> JoinHandle<pipes_actors::Result<()>> {
    let runner = system.clone();
    tokio::spawn(async move { runner.run().await })
}

async fn stop(system: &ActorSystem<Record, PipelineError>, handle: JoinHandle<pipes_actors::Result<()>>) {
    system.kill();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("actor system did not stop")
        .expect("run task panicked")
        .expect("run returned an error");
}

const IDLE: Option<Duration> = Some(Duration::from_millis(250));

#[tokio::test]
async fn test_fan_out_reaches_every_receiver() {
    init_tracing();
    let source = ScriptedActor::<Record, PipelineError>::new("source", &["left", "right"])
        .emitting(Output::results(vec!["1".into(), "2".into(), "3".into()]));
    let left = ScriptedActor::<Record, PipelineError>::new("left", &[]);
    let right = ScriptedActor::<Record, PipelineError>::new("right", &[]);

    let system = ActorSystem::new(vec![
        source.into_dyn(),
        left.clone().into_dyn(),
        right.clone().into_dyn(),
    ])
    .unwrap();
    let handle = start(&system);

    system
        .insert_result_message("go".into(), None, Some(&ActorId::named("source")))
        .unwrap();

    // Both sinks return no output, so wait on the handler side
    let deadline = Instant::now() + Duration::from_secs(2);
    while (left.results_seen().len() < 3 || right.results_seen().len() < 3) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let mut seen_left = left.results_seen();
    let mut seen_right = right.results_seen();
    seen_left.sort();
    seen_right.sort();
    assert_eq!(seen_left, vec!["1", "2", "3"]);
    assert_eq!(seen_right, vec!["1", "2", "3"]);

    stop(&system, handle).await;
}

#[tokio::test]
async fn test_terminal_outputs_are_captured_unmodified() {
    init_tracing();
    let splitter = SplitActor::new("split", &[]);
    let system = ActorSystem::new(vec![splitter.clone() as DynActor]).unwrap();
    let handle = start(&system);
    let id = ActorId::named("split");

    system
        .insert_result_message("a, b,,c".into(), None, Some(&id))
        .unwrap();

    let mut results: Vec<Record> = system
        .stream_actor_unpacked_results(&id, IDLE)
        .unwrap()
        .collect()
        .await;
    results.sort();
    assert_eq!(results, vec!["a", "b", "c"]);

    let exceptions: Vec<PipelineError> = system
        .stream_actor_unpacked_exceptions(&id, IDLE)
        .unwrap()
        .collect()
        .await;
    assert_eq!(exceptions, vec![PipelineError::Parse { line: 2 }]);

    stop(&system, handle).await;
}

#[tokio::test]
async fn test_two_stage_pipeline_scenario() {
    init_tracing();
    // A feeds B; B declares no receivers so its output is terminal
    let a = ScriptedActor::<Record, PipelineError>::new("a", &["b"])
        .on_result(|x| Ok(Some(Output::results(vec![if x == "x" { "y".into() } else { x }]))));
    let b = ScriptedActor::<Record, PipelineError>::new("b", &[])
        .on_result(|_| Ok(Some(Output::results(vec!["z".into()]))));

    let system = ActorSystem::new(vec![a.clone().into_dyn(), b.clone().into_dyn()]).unwrap();
    let handle = start(&system);

    system
        .insert_result_message("x".into(), None, Some(&ActorId::named("a")))
        .unwrap();

    let collected: Vec<_> = system
        .stream_actor_output::<Results>(&ActorId::named("b"), IDLE)
        .unwrap()
        .collect()
        .await;

    assert_eq!(a.results_seen(), vec!["x"]);
    assert_eq!(b.results_seen(), vec!["y"]);
    assert_eq!(collected.len(), 1);
    assert_eq!(collected[0].data(), "z");
    assert_eq!(collected[0].sender_id(), Some(&ActorId::named("b")));

    stop(&system, handle).await;
}

#[tokio::test]
async fn test_trace_id_shared_by_fanned_out_items() {
    init_tracing();
    let splitter = SplitActor::new("split", &["sink"]);
    let sink = ScriptedActor::<Record, PipelineError>::new("sink", &[])
        .on_result(|x| Ok(Some(Output::results(vec![x]))));
    let system = ActorSystem::new(vec![
        splitter as DynActor,
        sink.into_dyn(),
    ])
    .unwrap();
    let handle = start(&system);

    system
        .insert_result_message("p,q,r".into(), None, Some(&ActorId::named("split")))
        .unwrap();

    let messages: Vec<_> = system
        .stream_actor_output::<Results>(&ActorId::named("sink"), IDLE)
        .unwrap()
        .collect()
        .await;
    assert_eq!(messages.len(), 3);
    let trace = messages[0].trace_id();
    assert!(messages.iter().all(|m| m.trace_id() == trace));

    stop(&system, handle).await;
}

#[tokio::test]
async fn test_emitted_exceptions_reach_downstream_handler() {
    init_tracing();
    let a = ScriptedActor::<Record, PipelineError>::new("a", &["b"])
        .emitting(Output::exceptions(vec![PipelineError::Value("e".into())]));
    let b = ScriptedActor::<Record, PipelineError>::new("b", &[]).on_exception(|e| {
        let annotated = match e {
            PipelineError::Value(v) => PipelineError::Value(format!("{v}!")),
            other => other,
        };
        Ok(Some(Output::exceptions(vec![annotated])))
    });

    let system = ActorSystem::new(vec![a.clone().into_dyn(), b.clone().into_dyn()]).unwrap();
    let handle = start(&system);

    system
        .insert_result_message("go".into(), None, Some(&ActorId::named("a")))
        .unwrap();

    let collected: Vec<PipelineError> = system
        .stream_actor_unpacked_exceptions(&ActorId::named("b"), IDLE)
        .unwrap()
        .collect()
        .await;

    assert_eq!(b.exceptions_seen(), vec![PipelineError::Value("e".into())]);
    assert!(b.results_seen().is_empty());
    assert!(a.exceptions_seen().is_empty());
    assert_eq!(collected, vec![PipelineError::Value("e!".into())]);

    stop(&system, handle).await;
}

#[tokio::test]
async fn test_injected_exception_invokes_handler_once() {
    init_tracing();
    let splitter = SplitActor::new("a", &[]);
    let system = ActorSystem::new(vec![splitter.clone() as DynActor]).unwrap();

    // Injected before the loops start; waits on the queue
    system
        .insert_exception_message(PipelineError::Value("boom".into()), None, Some(&ActorId::named("a")))
        .unwrap();

    let handle = start(&system);
    let deadline = Instant::now() + Duration::from_secs(2);
    while splitter.exceptions.lock().is_empty() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    // Give a duplicate delivery the chance to show up
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        *splitter.exceptions.lock(),
        vec![PipelineError::Value("boom".into())]
    );
    assert!(splitter.results.lock().is_empty());

    stop(&system, handle).await;
}

#[tokio::test]
async fn test_idle_stream_yields_nothing_and_returns() {
    init_tracing();
    let system = ActorSystem::new(vec![
        ScriptedActor::<Record, PipelineError>::new("a", &[]).into_dyn(),
    ])
    .unwrap();
    let handle = start(&system);
    let id = ActorId::named("a");

    for _ in 0..2 {
        let started = Instant::now();
        let items: Vec<Record> = system
            .stream_actor_unpacked_results(&id, Some(Duration::from_millis(100)))
            .unwrap()
            .collect()
            .await;
        assert!(items.is_empty());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    stop(&system, handle).await;
}

#[tokio::test]
async fn test_default_stream_timeout_comes_from_config() {
    init_tracing();
    let config = ActorSystemConfig::default().with_no_outcome_timeout(Duration::from_millis(80));
    let system = ActorSystem::<Record, PipelineError>::with_config(
        vec![ScriptedActor::new("a", &[]).into_dyn()],
        config,
    )
    .unwrap();

    let started = Instant::now();
    let items: Vec<Record> = system
        .stream_actor_unpacked_results(&ActorId::named("a"), None)
        .unwrap()
        .collect()
        .await;

    assert!(items.is_empty());
    assert!(started.elapsed() >= Duration::from_millis(80));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_sibling_messages_all_processed_in_any_order() {
    init_tracing();
    let finished = Arc::new(Mutex::new(Vec::<Record>::new()));
    let log = Arc::clone(&finished);

    let source = ScriptedActor::<Record, PipelineError>::new("source", &["worker"])
        .emitting(Output::results(vec!["slow".into(), "fast".into()]));
    let worker = ScriptedActor::<Record, PipelineError>::new("worker", &[]).on_result(move |x| {
        log.lock().push(x);
        Ok(None)
    });

    // Delay applies before the handler closure runs, so only "slow" is held back
    struct Delayed(ScriptedActor<Record, PipelineError>);

    #[async_trait]
    impl Actor<Record, PipelineError> for Delayed {
        fn id(&self) -> &ActorId {
            self.0.id()
        }

        fn receiving_actors(&self) -> &[ActorId] {
            self.0.receiving_actors()
        }

        async fn process_result(&self, data: Record) -> HandlerResult<Record, PipelineError> {
            if data == "slow" {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            self.0.process_result(data).await
        }

        async fn process_exception(&self, data: PipelineError) -> HandlerResult<Record, PipelineError> {
            self.0.process_exception(data).await
        }
    }

    let system = ActorSystem::new(vec![
        source.into_dyn(),
        Arc::new(Delayed(worker.clone())) as DynActor,
    ])
    .unwrap();
    let handle = start(&system);

    system
        .insert_result_message("go".into(), None, Some(&ActorId::named("source")))
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while finished.lock().len() < 2 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // Each sibling handled exactly once; the later-enqueued one finished first
    assert_eq!(*finished.lock(), vec!["fast".to_string(), "slow".to_string()]);
    let mut seen = worker.results_seen();
    seen.sort();
    assert_eq!(seen, vec!["fast", "slow"]);

    stop(&system, handle).await;
}

#[tokio::test]
async fn test_worker_pool_bounds_concurrency() {
    init_tracing();
    let active = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let peak = Arc::new(std::sync::atomic::AtomicUsize::new(0));

    struct Gauge {
        id: ActorId,
        active: Arc<std::sync::atomic::AtomicUsize>,
        peak: Arc<std::sync::atomic::AtomicUsize>,
    }

    #[async_trait]
    impl Actor<Record, PipelineError> for Gauge {
        fn id(&self) -> &ActorId {
            &self.id
        }

        fn receiving_actors(&self) -> &[ActorId] {
            &[]
        }

        async fn process_result(&self, data: Record) -> HandlerResult<Record, PipelineError> {
            use std::sync::atomic::Ordering;
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(Some(Output::results(vec![data])))
        }

        async fn process_exception(&self, _data: PipelineError) -> HandlerResult<Record, PipelineError> {
            Ok(None)
        }
    }

    let gauge = Arc::new(Gauge {
        id: ActorId::named("gauge"),
        active: Arc::clone(&active),
        peak: Arc::clone(&peak),
    });
    let config = ActorSystemConfig::default().with_max_inflight_dispatches(2);
    let system = ActorSystem::with_config(vec![gauge as DynActor], config).unwrap();
    let handle = start(&system);
    let id = ActorId::named("gauge");

    for i in 0..6 {
        system
            .insert_result_message(format!("r{i}"), None, Some(&id))
            .unwrap();
    }

    let results: Vec<Record> = system
        .stream_actor_unpacked_results(&id, IDLE)
        .unwrap()
        .collect()
        .await;
    assert_eq!(results.len(), 6);
    assert!(peak.load(std::sync::atomic::Ordering::SeqCst) <= 2);

    let stats = system.metrics().get_stats();
    assert_eq!(stats.handler_invocations, 6);
    assert_eq!(stats.terminal_collected, 6);

    stop(&system, handle).await;
}
