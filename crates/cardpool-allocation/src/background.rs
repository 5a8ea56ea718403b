//! Background queue for every write that happens after a response is sent.
//!
//! Binding confirmations, compensating releases, audit records, API-call
//! records, mirror refreshes and relayed SMS are all submitted here and applied by a
//! single worker task, in submission order.
//!
//! # Architecture
//!
//! ```text
//! request path                      worker task
//! ────────────                      ───────────
//! submit(job) ──try_send──> [bounded mpsc] ──> JobHandler::handle
//!      │                                            │ retry with linear backoff
//!      └── full/closed ──┐                          │ up to max_attempts
//!                        └──────> dead letters <────┘
//! ```
//!
//! `submit` never waits: when the channel is full the job goes straight to
//! the dead-letter buffer. Delivery is at-least-once within the attempt
//! limit, so every job must be safe to apply twice.

use crate::error::QueueError;
use cardpool_core::{RemoteDevice, RemoteSimCard};
use cardpool_storage::repositories::{
    ApiCallLogRepository, DeviceRepository, OperationLogRepository, SimCardRepository,
    SmsRecordRepository, SqliteApiCallLogRepository, SqliteDeviceRepository,
    SqliteOperationLogRepository, SqliteSimCardRepository, SqliteSmsRecordRepository,
};
use cardpool_storage::{
    ApiCallLog, BindingUpdate, OperationLog, SmsRecord, SmsStatus, StorageResult,
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

const DEFAULT_CAPACITY: usize = 1024;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(200);
const DEFAULT_DEAD_LETTER_CAPACITY: usize = 256;

/// Work applied after the response was sent
#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    /// Apply a binding change (confirm, compensate or release), then write
    /// the audit record
    Settle {
        binding: Option<BindingUpdate>,
        audit: OperationLog,
    },

    RecordApiCall(ApiCallLog),

    /// Inventory page from `simCardsList`
    SaveSimCards(Vec<RemoteSimCard>),

    /// Devices from `clients` or `clientsInfo`
    SaveDevices(Vec<RemoteDevice>),

    /// Message pulled by `getSms` or accepted by `sendSms`
    SaveSms(SmsRecord),

    /// Delivery report from `sendResult`
    UpdateSmsStatus { msg_id: String, status: SmsStatus },
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::Settle { .. } => "settle",
            Job::RecordApiCall(_) => "record_api_call",
            Job::SaveSimCards(_) => "save_sim_cards",
            Job::SaveDevices(_) => "save_devices",
            Job::SaveSms(_) => "save_sms",
            Job::UpdateSmsStatus { .. } => "update_sms_status",
        }
    }
}

/// Applies jobs for the worker
pub trait JobHandler: Send + Sync + 'static {
    fn handle(&self, job: &Job) -> impl Future<Output = StorageResult<()>> + Send;
}

/// Applies jobs against the SQLite mirror
pub struct StorageJobHandler {
    cards: SqliteSimCardRepository,
    devices: SqliteDeviceRepository,
    operations: SqliteOperationLogRepository,
    api_calls: SqliteApiCallLogRepository,
    sms: SqliteSmsRecordRepository,
}

impl StorageJobHandler {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            cards: SqliteSimCardRepository::new(pool.clone()),
            devices: SqliteDeviceRepository::new(pool.clone()),
            operations: SqliteOperationLogRepository::new(pool.clone()),
            api_calls: SqliteApiCallLogRepository::new(pool.clone()),
            sms: SqliteSmsRecordRepository::new(pool),
        }
    }
}

impl JobHandler for StorageJobHandler {
    async fn handle(&self, job: &Job) -> StorageResult<()> {
        match job {
            Job::Settle { binding, audit } => {
                if let Some(update) = binding {
                    // A lost compare-and-set is not retried: the card moved on
                    if !self.cards.apply_binding(update).await? {
                        warn!(imsi = %update.imsi, target = %update.target, "Binding update skipped");
                    }
                }
                self.operations.create(audit).await?;
            }
            Job::RecordApiCall(log) => {
                self.api_calls.create(log).await?;
            }
            Job::SaveSimCards(cards) => {
                let saved = self.cards.upsert_inventory(cards).await?;
                debug!(saved, "Inventory page mirrored");
            }
            Job::SaveDevices(devices) => {
                let saved = self.devices.upsert(devices).await?;
                debug!(saved, "Devices mirrored");
            }
            Job::SaveSms(record) => {
                if !self.sms.save(record).await? {
                    debug!(msg_id = ?record.msg_id, "SMS already recorded");
                }
            }
            Job::UpdateSmsStatus { msg_id, status } => {
                if self.sms.update_status(msg_id, *status).await? == 0 {
                    warn!(%msg_id, "Delivery report for an unknown SMS");
                }
            }
        }
        Ok(())
    }
}

/// Queue tuning
///
/// # Example
///
/// ```
/// use cardpool_allocation::BackgroundConfig;
/// use std::time::Duration;
///
/// let config = BackgroundConfig::default()
///     .capacity(64)
///     .max_attempts(5)
///     .retry_backoff(Duration::from_millis(50));
/// assert_eq!(config.max_attempts, 5);
/// ```
#[derive(Debug, Clone)]
pub struct BackgroundConfig {
    /// Jobs buffered before `submit` starts dead-lettering
    pub capacity: usize,

    pub max_attempts: u32,

    /// Delay before retry `n` is `retry_backoff * n`
    pub retry_backoff: Duration,

    /// Oldest dead letters are evicted beyond this
    pub dead_letter_capacity: usize,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            dead_letter_capacity: DEFAULT_DEAD_LETTER_CAPACITY,
        }
    }
}

impl BackgroundConfig {
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn dead_letter_capacity(mut self, capacity: usize) -> Self {
        self.dead_letter_capacity = capacity;
        self
    }
}

/// Job given up on
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub job: Job,

    /// Attempts made; zero when the job never reached the worker
    pub attempts: u32,

    pub error: String,
    pub failed_at: DateTime<Utc>,
}

enum Envelope {
    Job(Job),
    Flush(oneshot::Sender<()>),
}

#[derive(Debug)]
struct DeadLetters {
    entries: Mutex<VecDeque<DeadLetter>>,
    capacity: usize,
}

impl DeadLetters {
    fn push(&self, letter: DeadLetter) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if self.capacity == 0 {
            return;
        }
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(letter);
    }

    fn snapshot(&self) -> Vec<DeadLetter> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().cloned().collect()
    }
}

/// Handle to the background worker; cheap to clone
#[derive(Clone)]
pub struct BackgroundQueue {
    sender: mpsc::Sender<Envelope>,
    dead_letters: Arc<DeadLetters>,
}

impl BackgroundQueue {
    /// Spawn a worker applying jobs to the SQLite mirror
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(pool: SqlitePool, config: BackgroundConfig) -> Self {
        Self::with_handler(StorageJobHandler::new(pool), config)
    }

    /// Spawn a worker applying jobs with `handler`
    pub fn with_handler<H: JobHandler>(handler: H, config: BackgroundConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let dead_letters = Arc::new(DeadLetters {
            entries: Mutex::new(VecDeque::new()),
            capacity: config.dead_letter_capacity,
        });

        let worker = Worker {
            receiver,
            handler,
            max_attempts: config.max_attempts.max(1),
            retry_backoff: config.retry_backoff,
            dead_letters: Arc::clone(&dead_letters),
        };
        tokio::spawn(worker.run());

        Self {
            sender,
            dead_letters,
        }
    }

    /// Enqueue a job without waiting
    pub fn submit(&self, job: Job) {
        match self.sender.try_send(Envelope::Job(job)) {
            Ok(()) => {}
            Err(TrySendError::Full(Envelope::Job(job))) => {
                warn!(job = job.name(), "Background queue full, job dead-lettered");
                self.dead_letter(job, "queue full");
            }
            Err(TrySendError::Closed(Envelope::Job(job))) => {
                error!(job = job.name(), "Background queue closed, job dead-lettered");
                self.dead_letter(job, "queue closed");
            }
            Err(_) => {}
        }
    }

    /// Wait until every job submitted before this call has been processed
    pub async fn flush(&self) -> Result<(), QueueError> {
        let (done, processed) = oneshot::channel();
        self.sender
            .send(Envelope::Flush(done))
            .await
            .map_err(|_| QueueError::Closed)?;
        processed.await.map_err(|_| QueueError::Closed)
    }

    /// Snapshot of the jobs given up on, oldest first
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.snapshot()
    }

    fn dead_letter(&self, job: Job, reason: &str) {
        self.dead_letters.push(DeadLetter {
            job,
            attempts: 0,
            error: reason.to_string(),
            failed_at: Utc::now(),
        });
    }
}

struct Worker<H> {
    receiver: mpsc::Receiver<Envelope>,
    handler: H,
    max_attempts: u32,
    retry_backoff: Duration,
    dead_letters: Arc<DeadLetters>,
}

impl<H: JobHandler> Worker<H> {
    async fn run(mut self) {
        while let Some(envelope) = self.receiver.recv().await {
            match envelope {
                Envelope::Job(job) => self.process(job).await,
                Envelope::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!("Background worker stopped");
    }

    async fn process(&self, job: Job) {
        let mut attempt = 1;
        loop {
            match self.handler.handle(&job).await {
                Ok(()) => return,
                Err(e) if attempt < self.max_attempts => {
                    warn!(job = job.name(), attempt, error = %e, "Background job failed, retrying");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(job = job.name(), attempts = attempt, error = %e, "Background job dead-lettered");
                    self.dead_letters.push(DeadLetter {
                        job,
                        attempts: attempt,
                        error: e.to_string(),
                        failed_at: Utc::now(),
                    });
                    return;
                }
            }
        }
    }
}
