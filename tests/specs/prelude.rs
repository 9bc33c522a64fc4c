//! Shared harness: the full platform over scripted collaborators.

use pal_adapters::fake::FakeToolkit;
use pal_adapters::http::fake_http::FakeHttpClient;
use pal_apisec::{ApiSecurityPipeline, FakeResolver, UrlValidator};
use pal_core::{
    Config, Event, FakeClock, Principal, SequentialIdGen, Target, TaskSpec, TaskState, TaskType,
};
use pal_engine::ScannerEngine;
use pal_scheduler::{ScanRunner, Scheduler, Subscription};
use pal_storage::MemoryStore;
use std::sync::Arc;
use std::time::Duration;

pub type TestScheduler =
    Scheduler<MemoryStore, ScanRunner<FakeClock>, FakeClock, SequentialIdGen>;

pub struct Platform {
    pub store: Arc<MemoryStore>,
    pub tools: Arc<FakeToolkit>,
    pub http: Arc<FakeHttpClient>,
    pub resolver: Arc<FakeResolver>,
    pub clock: FakeClock,
    pub scheduler: TestScheduler,
}

impl Platform {
    /// Assemble the full stack with every external dependency scripted.
    pub fn new() -> Self {
        Self::with_config(Config {
            scheduler: pal_core::SchedulerConfig {
                min_execution_time_ms: 1,
                ..pal_core::SchedulerConfig::default()
            },
            ..Config::default()
        })
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let tools = Arc::new(FakeToolkit::new());
        let http = Arc::new(FakeHttpClient::new());
        let resolver = Arc::new(FakeResolver::new());
        resolver.record("example.com", vec!["93.184.216.34".parse().unwrap()]);
        resolver.record("app.example.com", vec!["93.184.216.34".parse().unwrap()]);
        let clock = FakeClock::new();

        let validator = UrlValidator::with_resolver(config.ssrf.clone(), resolver.clone());
        let engine = ScannerEngine::new(
            tools.toolkit(),
            http.clone(),
            validator.clone(),
            config.engine.clone(),
            config.merger.clone(),
            clock.clone(),
        )
        .with_global_inflight_cap(config.scheduler.inflight_cap);
        let pipeline = ApiSecurityPipeline::new(
            http.clone(),
            validator.clone(),
            config.api_security.clone(),
            clock.clone(),
        );
        let runner = Arc::new(ScanRunner::new(engine, pipeline));

        let scheduler = Scheduler::new(
            store.clone(),
            runner,
            validator,
            config.scheduler,
            clock.clone(),
            SequentialIdGen::new("task"),
        );

        Self {
            store,
            tools,
            http,
            resolver,
            clock,
            scheduler,
        }
    }

    pub fn start(&self) {
        self.scheduler.start();
    }
}

pub fn alice() -> Principal {
    Principal::user("alice")
}

pub fn domain_spec(name: &str, task_type: TaskType) -> TaskSpec {
    TaskSpec::builder(name, task_type)
        .target(Target::parse("example.com").unwrap())
        .build()
}

/// Block until the subscription delivers the given state for any task.
pub async fn await_state(sub: &Subscription, state: TaskState) -> Event {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = sub.recv().await;
            if matches!(&event, Event::TaskStateChanged { state: s, .. } if *s == state) {
                return event;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for state {}", state))
}
