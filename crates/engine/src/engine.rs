//! Engine lifecycle and control surface.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use notify::RecommendedWatcher;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use logeye_compute::{AggregationWindow, AnomalyScorer};
use logeye_core::{Config, LogRecord, MemoryStore, NotifyEvent, ReportStore, SourceType};
use logeye_notify::Dispatcher;
use logeye_rules::loader::{load_corpus, watch_rules, DirectoryRepository, RuleRepository};
use logeye_rules::{Normalizer, RuleInfo, RuleSet};

use crate::aggregation::WindowTask;
use crate::clock::{Clock, SystemClock};
use crate::detection::DetectionWorker;
use crate::error::EngineError;
use crate::scoring::{ScorerMsg, ScorerTask};
use crate::shutdown::Shutdown;
use crate::sink::NotifySink;

const DEFAULT_TICK: Duration = Duration::from_secs(1);
const SCORER_QUEUE: usize = 64;
const SUBSCRIBER_BUFFER: usize = 1024;

// ── Builder ─────────────────────────────────────────────────────────

/// Fluent configuration for [`Engine::start`].
pub struct EngineBuilder {
    config: Config,
    repository: Option<Arc<dyn RuleRepository>>,
    store: Option<Arc<dyn ReportStore>>,
    dispatcher: Option<Dispatcher>,
    clock: Arc<dyn Clock>,
    tick: Duration,
    seed: Option<u64>,
}

impl EngineBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            repository: None,
            store: None,
            dispatcher: None,
            clock: Arc::new(SystemClock),
            tick: DEFAULT_TICK,
            seed: None,
        }
    }

    /// Rule source. Defaults to the configured rules directory.
    pub fn repository(mut self, repository: Arc<dyn RuleRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Report store. Defaults to an in-memory store.
    pub fn store(mut self, store: Arc<dyn ReportStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Notification channels. Defaults to those built from `config.notify`.
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// How often windows check their flush boundary (default 1s).
    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Fixed seed for the isolation forest.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn start(self) -> Result<Engine, EngineError> {
        Engine::start(self)
    }
}

// ── Engine ──────────────────────────────────────────────────────────

/// Reloads the shared corpus from its repository.
#[derive(Clone)]
struct RuleControl {
    repository: Arc<dyn RuleRepository>,
    rules: RuleSet,
}

impl RuleControl {
    fn reload(&self) -> Result<usize, EngineError> {
        match load_corpus(self.repository.as_ref()) {
            Ok(corpus) => {
                let count = corpus.len();
                self.rules.replace(corpus);
                info!(rules = count, "rule corpus reloaded");
                Ok(count)
            }
            Err(e) => {
                warn!(error = %e, "rule reload failed, keeping previous corpus");
                Err(e.into())
            }
        }
    }
}

pub struct Engine {
    control: RuleControl,
    detection: mpsc::Sender<LogRecord>,
    windows: HashMap<SourceType, mpsc::Sender<LogRecord>>,
    scorer: mpsc::Sender<ScorerMsg>,
    subscribers: broadcast::Sender<NotifyEvent>,
    shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
    _watcher: Option<RecommendedWatcher>,
}

impl Engine {
    pub fn builder(config: Config) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// Load the corpus and seed anomaly history (both fatal on failure),
    /// then spawn every stage. Must be called inside a tokio runtime.
    fn start(builder: EngineBuilder) -> Result<Self, EngineError> {
        let EngineBuilder {
            config,
            repository,
            store,
            dispatcher,
            clock,
            tick,
            seed,
        } = builder;

        let repository = repository.unwrap_or_else(|| {
            Arc::new(
                DirectoryRepository::new(config.rules.dir.clone())
                    .with_field_config(config.rules.field_config.clone()),
            )
        });
        let store = store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let dispatcher = match dispatcher {
            Some(d) => d,
            None => Dispatcher::from_config(&config.notify)?,
        };

        let corpus = load_corpus(repository.as_ref())?;
        info!(rules = corpus.len(), "rule corpus loaded");
        let rules = RuleSet::new(corpus);
        let normalizer = Arc::new(Normalizer::from_config(&config.rules));

        let mut scorer = AnomalyScorer::new(config.anomaly.clone(), store.clone());
        if let Some(seed) = seed {
            scorer = scorer.with_seed(seed);
        }
        scorer.load_all()?;

        let shutdown = Shutdown::new();
        let capacity = config.queue.capacity;
        let mut tasks = Vec::new();

        let (subscribers, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        let (events_tx, events_rx) = mpsc::channel(capacity);
        tasks.push(tokio::spawn(
            NotifySink {
                store: store.clone(),
                dispatcher,
                subscribers: subscribers.clone(),
            }
            .run(events_rx),
        ));

        let (scorer_tx, scorer_rx) = mpsc::channel(SCORER_QUEUE);
        tasks.push(tokio::spawn(
            ScorerTask {
                scorer,
                events: events_tx.clone(),
            }
            .run(scorer_rx, shutdown.listener()),
        ));

        let now = clock.now();
        let mut windows = HashMap::new();
        for source in SourceType::ALL {
            let (tx, rx) = mpsc::channel(capacity);
            let task = WindowTask {
                window: AggregationWindow::new(source, &config.report, now),
                clock: clock.clone(),
                store: store.clone(),
                scorer: scorer_tx.clone(),
                tick,
            };
            tasks.push(tokio::spawn(task.run(rx, shutdown.listener())));
            windows.insert(source, tx);
        }

        let (detection_tx, detection_rx) = mpsc::channel(capacity);
        tasks.push(tokio::spawn(
            DetectionWorker {
                rules: rules.clone(),
                normalizer,
                events: events_tx,
            }
            .run(detection_rx, shutdown.listener()),
        ));

        let control = RuleControl { repository, rules };
        let watcher = if config.rules.watch {
            let on_change = control.clone();
            Some(watch_rules(&config.rules.dir, move || {
                let _ = on_change.reload();
            })?)
        } else {
            None
        };

        info!(queue_capacity = capacity, "engine started");

        Ok(Self {
            control,
            detection: detection_tx,
            windows,
            scorer: scorer_tx,
            subscribers,
            shutdown,
            tasks,
            _watcher: watcher,
        })
    }

    // ── Ingestion ───────────────────────────────────────────────────

    /// Queue a record for detection and aggregation. Waits while a queue is
    /// full; never drops.
    pub async fn submit(&self, record: LogRecord) -> Result<(), EngineError> {
        if self.shutdown.is_triggered() {
            return Err(EngineError::Closed);
        }
        match (record.detail.is_some(), record.source_type.is_detectable()) {
            (true, true) => {
                self.send_window(record.clone()).await?;
                self.send_detection(record).await
            }
            (true, false) => self.send_window(record).await,
            (false, true) => self.send_detection(record).await,
            (false, false) => Ok(()),
        }
    }

    async fn send_window(&self, record: LogRecord) -> Result<(), EngineError> {
        let window = self
            .windows
            .get(&record.source_type)
            .ok_or(EngineError::Closed)?;
        window.send(record).await.map_err(|_| EngineError::Closed)
    }

    async fn send_detection(&self, record: LogRecord) -> Result<(), EngineError> {
        self.detection
            .send(record)
            .await
            .map_err(|_| EngineError::Closed)
    }

    /// Stream of every detection (rule matches and anomaly alerts).
    pub fn subscribe(&self) -> broadcast::Receiver<NotifyEvent> {
        self.subscribers.subscribe()
    }

    // ── Control surface ─────────────────────────────────────────────

    /// Reload the corpus. On failure the previous corpus stays active.
    pub fn reload(&self) -> Result<usize, EngineError> {
        self.control.reload()
    }

    /// Discard anomaly history for one type (or all) and reload it from
    /// the report store.
    pub async fn clear_anomaly_data(&self, source: Option<SourceType>) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.scorer
            .send(ScorerMsg::Clear { source, reply })
            .await
            .map_err(|_| EngineError::Closed)?;
        rx.await.map_err(|_| EngineError::Closed)?
    }

    pub fn rule_list(&self) -> Vec<RuleInfo> {
        self.control.rules.snapshot().rule_list()
    }

    /// Check that `text` is a loadable rule; returns its id.
    pub fn parse_rule(text: &str) -> Result<String, EngineError> {
        Ok(logeye_rules::parse_rule(text)?.id)
    }

    // ── Shutdown ────────────────────────────────────────────────────

    /// Signal every stage, drain the detection queue and wait for all
    /// tasks. Open aggregation windows are discarded.
    pub async fn shutdown(self) -> Result<(), EngineError> {
        info!("engine shutting down");
        self.shutdown.trigger();

        let Engine {
            detection,
            windows,
            scorer,
            tasks,
            ..
        } = self;
        drop(detection);
        drop(windows);
        drop(scorer);

        let mut first_error = None;
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "engine task failed");
                first_error.get_or_insert(EngineError::from(e));
            }
        }
        info!("engine stopped");
        first_error.map_or(Ok(()), Err)
    }
}
