//! End-to-end behaviour of the story orchestrator with stubbed collaborators.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bedtime_core::{
    Gender, GenerationResult, Story, StoryKey, StoryRequest, StorySource, Storyteller,
    TemplateStoryteller, ValidationError,
};
use bedtime_runtime::{
    AgentError, CacheError, CircuitBreakerConfig, CircuitState, MemoryStoryCache, ProviderError,
    RuntimeConfig, StoryAgent, StoryCache, StoryError, StoryOrchestrator,
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Succeed,
    Fail,
    Hang,
    Panic,
}

struct ScriptedAgent {
    mode: Mutex<Mode>,
    calls: AtomicUsize,
}

impl ScriptedAgent {
    fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            mode: Mutex::new(mode),
            calls: AtomicUsize::new(0),
        })
    }

    fn set_mode(&self, mode: Mode) {
        *self.mode.lock() = mode;
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoryAgent for ScriptedAgent {
    async fn write_story(&self, request: &StoryRequest) -> Result<Story, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mode = *self.mode.lock();
        match mode {
            Mode::Succeed => Ok(Story::new(
                format!("{} and the Moon", request.name()),
                format!("{} waved goodnight to the moon.", request.name()),
                StorySource::Primary,
            )),
            Mode::Fail => Err(AgentError::Provider(ProviderError::ApiError {
                status: 503,
                message: "overloaded".to_string(),
            })),
            Mode::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(AgentError::EmptyStory)
            }
            Mode::Panic => panic!("agent exploded"),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct CountingStoryteller {
    inner: TemplateStoryteller,
    incomplete: bool,
    calls: AtomicUsize,
}

impl CountingStoryteller {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: TemplateStoryteller::seeded(7),
            incomplete: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn broken() -> Arc<Self> {
        Arc::new(Self {
            inner: TemplateStoryteller::seeded(7),
            incomplete: true,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Storyteller for CountingStoryteller {
    fn tell(&self, request: &StoryRequest) -> Story {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.incomplete {
            return Story::new("Untitled", "   ", StorySource::Fallback);
        }
        self.inner.tell(request)
    }
}

#[derive(Default)]
struct FlakyCache {
    inner: MemoryStoryCache,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    panic_reads: AtomicBool,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl FlakyCache {
    fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoryCache for FlakyCache {
    async fn get(&self, key: &StoryKey) -> Result<Option<GenerationResult>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.panic_reads.load(Ordering::SeqCst) {
            panic!("cache client corrupted");
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("connection refused".to_string()));
        }
        self.inner.get(key).await
    }

    async fn set(
        &self,
        key: StoryKey,
        result: &GenerationResult,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("connection refused".to_string()));
        }
        self.inner.set(key, result, ttl).await
    }
}

struct Harness {
    orchestrator: StoryOrchestrator,
    agent: Arc<ScriptedAgent>,
    storyteller: Arc<CountingStoryteller>,
    cache: Arc<FlakyCache>,
}

fn config(failure_threshold: u32, reset_timeout_ms: u64) -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.circuit_breaker =
        CircuitBreakerConfig::new(failure_threshold, Duration::from_millis(reset_timeout_ms));
    config
}

fn harness_with(mode: Mode, config: RuntimeConfig, storyteller: Arc<CountingStoryteller>) -> Harness {
    let agent = ScriptedAgent::new(mode);
    let cache = Arc::new(FlakyCache::default());
    let orchestrator = StoryOrchestrator::builder()
        .config(config)
        .agent(agent.clone())
        .storyteller(storyteller.clone())
        .cache(cache.clone())
        .build()
        .unwrap();

    Harness {
        orchestrator,
        agent,
        storyteller,
        cache,
    }
}

fn harness(mode: Mode) -> Harness {
    harness_with(mode, config(3, 30_000), CountingStoryteller::new())
}

fn request(name: &str) -> StoryRequest {
    StoryRequest::new(name, ["space", "dragons"], "adventure", Gender::Girl)
}

#[tokio::test]
async fn primary_story_is_returned_and_cached() {
    let h = harness(Mode::Succeed);

    let result = h.orchestrator.generate(&request("Emma")).await.unwrap();

    assert_eq!(result.story.source, StorySource::Primary);
    assert_eq!(result.story.title, "Emma and the Moon");
    assert_eq!(result.request, request("Emma"));
    assert!(!result.cached);
    assert_eq!(h.cache.sets(), 1);
    assert_eq!(h.storyteller.calls(), 0);

    let usage = h.orchestrator.usage();
    assert_eq!(usage.primary_stories, 1);
    assert_eq!(usage.cache_misses, 1);
}

#[tokio::test]
async fn cache_hit_skips_both_generators() {
    let h = harness(Mode::Succeed);
    let stored = GenerationResult::new(
        request("Emma"),
        Story::new("Stored", "A story from yesterday.", StorySource::Primary),
    );
    h.cache
        .inner
        .set(StoryKey::for_request(&request("Emma")), &stored, Duration::from_secs(60))
        .await
        .unwrap();

    let result = h.orchestrator.generate(&request("Emma")).await.unwrap();

    assert!(result.cached);
    assert_ne!(result.id, stored.id);
    assert_eq!(result.story, stored.story);
    assert_eq!(h.agent.calls(), 0);
    assert_eq!(h.storyteller.calls(), 0);
    assert_eq!(h.cache.sets(), 0);
    assert_eq!(h.orchestrator.usage().cache_hits, 1);
}

#[tokio::test]
async fn reordered_interests_hit_the_same_entry() {
    let h = harness(Mode::Succeed);
    let first = StoryRequest::new("Emma", ["space", "dragons"], "adventure", Gender::Girl);
    let second = StoryRequest::new("emma ", ["Dragons", "space"], "Adventure", Gender::Girl);

    let a = h.orchestrator.generate(&first).await.unwrap();
    let b = h.orchestrator.generate(&second).await.unwrap();

    assert!(!a.cached);
    assert!(b.cached);
    assert_eq!(a.story, b.story);
    assert_eq!(a.request, first);
    assert_eq!(b.request, second, "a hit echoes the caller's own request");
    assert_ne!(a.id, b.id);
    assert_eq!(h.agent.calls(), 1);
}

#[tokio::test]
async fn invalid_input_is_rejected_before_any_io() {
    let h = harness(Mode::Succeed);
    let cases = [
        (
            StoryRequest::new("  ", ["space"], "adventure", Gender::Boy),
            ValidationError::MissingChildName,
        ),
        (
            StoryRequest::new("Emma", Vec::<String>::new(), "adventure", Gender::Boy),
            ValidationError::NoInterests,
        ),
        (
            StoryRequest::new("Emma", ["space"], "", Gender::Boy),
            ValidationError::MissingTheme,
        ),
    ];

    for (bad, expected) in cases {
        match h.orchestrator.generate(&bad).await {
            Err(StoryError::InvalidInput(err)) => assert_eq!(err, expected),
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    assert_eq!(h.cache.gets(), 0);
    assert_eq!(h.cache.sets(), 0);
    assert_eq!(h.agent.calls(), 0);
    assert_eq!(h.storyteller.calls(), 0);
}

#[tokio::test]
async fn failing_primary_is_masked_by_fallback() {
    let h = harness(Mode::Fail);

    let result = h.orchestrator.generate(&request("Emma")).await.unwrap();

    assert_eq!(result.story.source, StorySource::Fallback);
    assert!(result.story.body.contains("Emma"));
    assert_eq!(h.agent.calls(), 1);
    assert_eq!(h.storyteller.calls(), 1);
    assert_eq!(h.orchestrator.breaker().failures(), 1);
    assert_eq!(h.orchestrator.usage().fallback_stories, 1);
}

#[tokio::test]
async fn fallback_stories_are_cached_by_default() {
    let h = harness(Mode::Fail);

    h.orchestrator.generate(&request("Emma")).await.unwrap();
    let again = h.orchestrator.generate(&request("Emma")).await.unwrap();

    assert!(again.cached);
    assert_eq!(again.story.source, StorySource::Fallback);
    assert_eq!(h.agent.calls(), 1);
}

#[tokio::test]
async fn fallback_caching_can_be_disabled() {
    let mut config = config(3, 30_000);
    config.cache.cache_fallback_stories = false;
    let h = harness_with(Mode::Fail, config, CountingStoryteller::new());

    h.orchestrator.generate(&request("Emma")).await.unwrap();

    assert_eq!(h.cache.sets(), 0);
}

#[tokio::test]
async fn cache_read_failure_is_treated_as_miss() {
    let h = harness(Mode::Succeed);
    h.cache.fail_reads.store(true, Ordering::SeqCst);

    let result = h.orchestrator.generate(&request("Emma")).await.unwrap();

    assert_eq!(result.story.source, StorySource::Primary);
    assert_eq!(h.agent.calls(), 1);
    assert_eq!(h.orchestrator.usage().cache_errors, 1);
}

#[tokio::test]
async fn cache_write_failure_is_not_fatal() {
    let h = harness(Mode::Succeed);
    h.cache.fail_writes.store(true, Ordering::SeqCst);

    let result = h.orchestrator.generate(&request("Emma")).await.unwrap();

    assert_eq!(result.story.source, StorySource::Primary);
    assert_eq!(h.cache.sets(), 1);
    assert_eq!(h.orchestrator.usage().cache_errors, 1);
}

#[tokio::test(start_paused = true)]
async fn timeout_counts_as_failure() {
    let mut config = config(1, 30_000);
    config.generation.timeout = Duration::from_millis(50);
    let h = harness_with(Mode::Hang, config, CountingStoryteller::new());

    let result = h.orchestrator.generate(&request("Emma")).await.unwrap();

    assert_eq!(result.story.source, StorySource::Fallback);
    assert_eq!(h.orchestrator.breaker_state(), CircuitState::Open);
}

#[tokio::test]
async fn incomplete_story_is_a_defect() {
    let h = harness_with(Mode::Fail, config(3, 30_000), CountingStoryteller::broken());

    let err = h.orchestrator.generate(&request("Emma")).await.unwrap_err();

    assert!(matches!(err, StoryError::GenerationFailed { .. }));
    assert_eq!(h.cache.sets(), 0);
}

#[tokio::test]
async fn panic_in_cache_becomes_generation_failure() {
    let h = harness(Mode::Succeed);
    h.cache.panic_reads.store(true, Ordering::SeqCst);

    match h.orchestrator.generate(&request("Emma")).await {
        Err(StoryError::GenerationFailed { cause }) => {
            assert!(cause.contains("cache client corrupted"))
        }
        other => panic!("expected GenerationFailed, got {:?}", other),
    }
    assert_eq!(h.agent.calls(), 0);
}

#[tokio::test]
async fn panic_in_agent_becomes_generation_failure() {
    let h = harness(Mode::Panic);

    let err = h.orchestrator.generate(&request("Emma")).await.unwrap_err();
    assert!(matches!(err, StoryError::GenerationFailed { .. }));

    // the orchestrator keeps working afterwards
    h.agent.set_mode(Mode::Succeed);
    let result = h.orchestrator.generate(&request("Emma")).await.unwrap();
    assert_eq!(result.story.source, StorySource::Primary);
}

#[tokio::test(start_paused = true)]
async fn breaker_scenario_through_orchestrator() {
    let h = harness_with(Mode::Fail, config(2, 1000), CountingStoryteller::new());
    let breaker = h.orchestrator.breaker();

    let first = h.orchestrator.generate(&request("Ava")).await.unwrap();
    assert_eq!(first.story.source, StorySource::Fallback);
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failures(), 1);

    let second = h.orchestrator.generate(&request("Ben")).await.unwrap();
    assert_eq!(second.story.source, StorySource::Fallback);
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(breaker.failures(), 2);

    let third = h.orchestrator.generate(&request("Cyd")).await.unwrap();
    assert_eq!(third.story.source, StorySource::Fallback);
    assert_eq!(h.agent.calls(), 2);

    tokio::time::advance(Duration::from_millis(1000)).await;
    h.agent.set_mode(Mode::Succeed);

    let fourth = h.orchestrator.generate(&request("Dee")).await.unwrap();
    assert_eq!(fourth.story.source, StorySource::Primary);
    assert_eq!(fourth.story.title, "Dee and the Moon");
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failures(), 0);
    assert_eq!(h.agent.calls(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_all_get_stories() {
    let h = harness(Mode::Fail);
    let orchestrator = Arc::new(h.orchestrator);

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .generate(&request(&format!("Child{}", i)))
                    .await
            })
        })
        .collect();

    for task in tasks {
        let result = task.await.unwrap().unwrap();
        assert!(result.story.is_complete());
    }

    assert_eq!(orchestrator.breaker_state(), CircuitState::Open);
    let usage = orchestrator.usage();
    assert_eq!(usage.fallback_stories, 32);
    assert!(h.agent.calls() >= 3);
    assert!(h.agent.calls() <= 32);
}
