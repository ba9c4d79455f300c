//! ETL orchestrator
//!
//! One pass walks every configured partition in increasing id order, derives
//! each record's state from its log, and for each eligible record:
//!
//! 1. claims it with a conditional `attempted` append,
//! 2. runs the type's transform on the immutable payload,
//! 3. applies the resulting entities through the warehouse writer,
//! 4. appends the resolution, again conditionally on its own claim.
//!
//! The claim is the only coordination between workers. Steps 2-4 are not
//! atomic with the claim, so a worker that dies after applying leaves a
//! stale claim; the next worker re-applies the same entities, which the
//! writer absorbs.

use crate::adapters::database::factory::Storage;
use crate::adapters::database::traits::{ReceivingStorage, WarehouseWriter};
use crate::config::schema::EtlConfig;
use crate::core::etl::policy::{Candidate, EtlPolicy, PolicySet};
use crate::core::etl::summary::{PartitionSummary, PassSummary, RunSummary};
use crate::core::etl::transform::{Transform, TransformOutput, TransformRegistry};
use crate::core::processing::manager::ProcessingLogManager;
use crate::domain::document::DocumentType;
use crate::domain::errors::{TransformError, WarehouseError};
use crate::domain::ids::{RecordId, WorkerId};
use crate::domain::log::{NewLogEntry, ProcessingLogEntry, ProcessingOutcome};
use crate::domain::record::ReceivingRecord;
use crate::domain::{HarborError, Result};
use crate::{log_pass_complete, log_pass_start, log_record_outcome};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct EtlSettings {
    /// Partitions to process
    pub document_types: Vec<DocumentType>,

    /// Records fetched per page
    pub batch_size: usize,

    /// Stop a partition after this many candidates in one pass
    pub max_records_per_pass: Option<usize>,

    /// Sleep between passes in `run_until_shutdown`
    pub poll_interval: Duration,

    /// Derive and transform, but write nothing
    pub dry_run: bool,

    /// Scheduling policies
    pub policies: PolicySet,
}

impl Default for EtlSettings {
    fn default() -> Self {
        Self {
            document_types: DocumentType::ALL.to_vec(),
            batch_size: 100,
            max_records_per_pass: None,
            poll_interval: Duration::from_secs(30),
            dry_run: false,
            policies: PolicySet::default(),
        }
    }
}

impl EtlSettings {
    /// Build settings from the `[etl]` configuration section
    ///
    /// An empty `document_types` list selects every type.
    ///
    /// # Errors
    ///
    /// Returns `HarborError::Configuration` for unknown document type names.
    pub fn from_config(config: &EtlConfig, dry_run: bool) -> Result<Self> {
        let document_types = if config.document_types.is_empty() {
            DocumentType::ALL.to_vec()
        } else {
            config
                .document_types
                .iter()
                .map(|name| {
                    DocumentType::from_str(name).map_err(|e| {
                        HarborError::Configuration(format!("etl.document_types: {e}"))
                    })
                })
                .collect::<Result<Vec<_>>>()?
        };

        Ok(Self {
            document_types,
            batch_size: config.batch_size,
            max_records_per_pass: config.max_records_per_pass,
            poll_interval: Duration::from_secs(config.poll_interval_seconds),
            dry_run,
            policies: PolicySet::from_config(config)?,
        })
    }

    /// Restrict processing to some partitions
    pub fn with_document_types(mut self, document_types: Vec<DocumentType>) -> Self {
        self.document_types = document_types;
        self
    }

    /// Use one policy for every partition
    pub fn with_policy(mut self, policy: EtlPolicy) -> Self {
        self.policies = PolicySet::uniform(policy);
        self
    }

    /// Enable or disable dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// What a transform plus apply produced for one claimed record
struct Resolution {
    outcome: ProcessingOutcome,
    detail: Value,
}

/// ETL orchestrator
///
/// Cheap to clone; every clone shares the same stores. Give each concurrent
/// worker its own [`WorkerId`] with [`EtlOrchestrator::with_worker_id`].
#[derive(Clone)]
pub struct EtlOrchestrator {
    receiving: Arc<dyn ReceivingStorage + Send + Sync>,
    log: Arc<ProcessingLogManager>,
    warehouse: Arc<dyn WarehouseWriter + Send + Sync>,
    transforms: TransformRegistry,
    settings: EtlSettings,
    worker_id: WorkerId,
    shutdown: Option<watch::Receiver<bool>>,
}

impl EtlOrchestrator {
    /// Create an orchestrator over a storage bundle
    ///
    /// # Errors
    ///
    /// Returns `HarborError::Configuration` if a configured partition has
    /// no registered transform or the batch size is zero.
    pub fn new(storage: &Storage, transforms: TransformRegistry, settings: EtlSettings) -> Result<Self> {
        if settings.batch_size == 0 {
            return Err(HarborError::Configuration(
                "etl.batch_size must be greater than 0".to_string(),
            ));
        }

        if let Some(missing) = settings
            .document_types
            .iter()
            .find(|t| transforms.get(**t).is_none())
        {
            return Err(HarborError::Configuration(format!(
                "No transform registered for document type '{missing}'"
            )));
        }

        Ok(Self {
            receiving: storage.receiving.clone(),
            log: Arc::new(ProcessingLogManager::new(storage.log.clone())),
            warehouse: storage.warehouse.clone(),
            transforms,
            settings,
            worker_id: WorkerId::generate(),
            shutdown: None,
        })
    }

    /// Use a specific worker id
    pub fn with_worker_id(mut self, worker_id: WorkerId) -> Self {
        self.worker_id = worker_id;
        self
    }

    /// Stop between records once `shutdown` turns true
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// This worker's id
    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    /// Current settings
    pub fn settings(&self) -> &EtlSettings {
        &self.settings
    }

    /// Processing log used by this orchestrator
    pub fn log(&self) -> &ProcessingLogManager {
        &self.log
    }

    /// Clones of this orchestrator with fresh worker ids
    pub fn workers(&self, count: usize) -> Vec<EtlOrchestrator> {
        (0..count.max(1))
            .map(|_| self.clone().with_worker_id(WorkerId::generate()))
            .collect()
    }

    fn shutting_down(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false)
    }

    /// Run one pass over every configured partition now
    pub async fn run_pass(&self) -> PassSummary {
        self.run_pass_at(Utc::now()).await
    }

    /// Run one pass as if it started at `now`
    ///
    /// Eligibility and log timestamps advance from `now` by the real time
    /// elapsed since the pass started.
    pub async fn run_pass_at(&self, now: DateTime<Utc>) -> PassSummary {
        let started = Instant::now();
        let clock = PassClock { base: now, started };

        log_pass_start!(
            &self.worker_id,
            self.settings.document_types.len(),
            self.settings.dry_run
        );

        let partitions = self
            .settings
            .document_types
            .iter()
            .map(|t| self.process_partition(*t, &clock));
        let results = join_all(partitions).await;

        let mut summary = PassSummary::new(self.settings.dry_run);
        for (partition, interrupted) in results {
            summary.interrupted |= interrupted;
            summary.partitions.push(partition);
        }
        let summary = summary.with_duration(started.elapsed());

        log_pass_complete!(&self.worker_id, summary.totals().resolved(), summary.duration);
        summary
    }

    /// Repeat passes every poll interval until shutdown is signalled
    ///
    /// Without a shutdown receiver this runs forever.
    pub async fn run_until_shutdown(&self) -> RunSummary {
        let mut run = RunSummary::default();
        let mut shutdown = self.shutdown.clone();

        tracing::info!(
            worker_id = %self.worker_id,
            poll_interval_secs = self.settings.poll_interval.as_secs(),
            "ETL worker started"
        );

        loop {
            if self.shutting_down() {
                break;
            }

            let pass = self.run_pass().await;
            pass.log_summary();
            run.record(&pass);

            if pass.interrupted {
                break;
            }

            let sender_gone = match shutdown.as_mut() {
                Some(rx) => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.settings.poll_interval) => false,
                        changed = rx.changed() => changed.is_err(),
                    }
                }
                None => {
                    tokio::time::sleep(self.settings.poll_interval).await;
                    false
                }
            };
            // Nobody can ask us to stop any more; keep polling on the timer
            if sender_gone {
                shutdown = None;
            }
        }

        tracing::info!(
            worker_id = %self.worker_id,
            passes = run.passes,
            "ETL worker stopped"
        );
        run
    }

    /// Run `count` workers until shutdown and merge their summaries
    pub async fn run_workers(&self, count: usize) -> RunSummary {
        let workers = self.workers(count);
        let runs = join_all(workers.iter().map(|w| w.run_until_shutdown())).await;

        let mut merged = RunSummary::default();
        for run in &runs {
            merged.merge(run);
        }
        merged
    }

    /// Run a single pass on each of `count` workers concurrently
    pub async fn run_pass_with_workers(&self, count: usize) -> Vec<PassSummary> {
        let workers = self.workers(count);
        join_all(workers.iter().map(|w| w.run_pass())).await
    }

    /// Process one partition; the flag reports whether shutdown interrupted it
    async fn process_partition(
        &self,
        document_type: DocumentType,
        clock: &PassClock,
    ) -> (PartitionSummary, bool) {
        let mut summary = PartitionSummary::new(document_type);

        let Some(transform) = self.transforms.get(document_type) else {
            summary
                .errors
                .push(format!("no transform registered for {document_type}"));
            return (summary, false);
        };
        let policy = self.settings.policies.for_type(document_type);

        match self
            .walk_partition(document_type, transform.as_ref(), policy, clock, &mut summary)
            .await
        {
            Ok(interrupted) => (summary, interrupted),
            Err(e) => {
                tracing::error!(
                    document_type = %document_type,
                    error = %e,
                    "Partition pass aborted"
                );
                summary.errors.push(e.to_string());
                (summary, false)
            }
        }
    }

    async fn walk_partition(
        &self,
        document_type: DocumentType,
        transform: &dyn Transform,
        policy: &EtlPolicy,
        clock: &PassClock,
        summary: &mut PartitionSummary,
    ) -> Result<bool> {
        let revision = transform.revision();
        let mut after: Option<RecordId> = None;

        loop {
            let page = self
                .receiving
                .list(document_type, after, self.settings.batch_size)
                .await?;
            let Some(last) = page.last() else {
                return Ok(false);
            };
            after = Some(last.id);

            let ids: Vec<RecordId> = page.iter().map(|r| r.id).collect();
            let histories = self.log.histories(document_type, &ids).await?;

            for record in &page {
                if self.shutting_down() {
                    tracing::info!(
                        document_type = %document_type,
                        "Shutdown requested, stopping partition"
                    );
                    return Ok(true);
                }

                if let Some(max) = self.settings.max_records_per_pass {
                    if summary.candidates >= max {
                        return Ok(false);
                    }
                }

                summary.examined += 1;
                let history = histories.get(&record.id).map(Vec::as_slice).unwrap_or(&[]);

                let Some(candidate) = policy.candidate(history, revision, clock.now()) else {
                    continue;
                };
                summary.candidates += 1;

                tracing::debug!(
                    record = %record.key(),
                    reason = candidate.as_str(),
                    "Offering record"
                );

                if self.settings.dry_run {
                    self.preview_record(record, transform, summary).await;
                } else {
                    self.process_record(record, history, candidate, transform, policy, clock, summary)
                        .await;
                }
            }

            if page.len() < self.settings.batch_size {
                return Ok(false);
            }
        }
    }

    /// Claim, transform, apply, and resolve one record
    #[allow(clippy::too_many_arguments)]
    async fn process_record(
        &self,
        record: &ReceivingRecord,
        history: &[ProcessingLogEntry],
        candidate: Candidate,
        transform: &dyn Transform,
        policy: &EtlPolicy,
        clock: &PassClock,
        summary: &mut PartitionSummary,
    ) {
        let key = record.key();
        let revision = transform.revision();
        let expected = history.last().map(|e| e.sequence_number);

        let claim = NewLogEntry::new(
            ProcessingOutcome::Attempted,
            json!({
                "worker_id": self.worker_id.to_string(),
                "reason": candidate.as_str(),
            }),
        )
        .with_revision(revision)
        .at(clock.now());

        let claim_sequence = match self.log.append_if_latest(key, expected, claim.clone()).await {
            Ok(Some(sequence)) => sequence,
            Ok(None) => {
                tracing::debug!(record = %key, "Claim lost to another worker");
                summary.lost_races += 1;
                return;
            }
            Err(e) => {
                tracing::error!(record = %key, error = %e, "Failed to claim record");
                summary.errors.push(format!("{key}: {e}"));
                return;
            }
        };
        summary.claimed += 1;

        let mut resolution = self.resolve(record, transform).await;

        if resolution.outcome == ProcessingOutcome::FailedRetryable {
            let mut claimed_history = history.to_vec();
            claimed_history.push(claim.into_entry(claim_sequence));

            if policy.escalates(&claimed_history) {
                resolution.outcome = ProcessingOutcome::FailedTerminal;
                if let Value::Object(ref mut detail) = resolution.detail {
                    detail.insert("escalated".to_string(), json!(true));
                }
            }
        }

        let outcome = resolution.outcome;
        let skipped = resolution.detail.get("status").and_then(Value::as_str) == Some("skipped");
        let entry = NewLogEntry::new(outcome, resolution.detail)
            .with_revision(revision)
            .at(clock.now());

        match self.log.append_if_latest(key, Some(claim_sequence), entry).await {
            Ok(Some(sequence)) => {
                log_record_outcome!(&key, sequence, outcome);
                match outcome {
                    ProcessingOutcome::Succeeded if skipped => summary.skipped += 1,
                    ProcessingOutcome::Succeeded => summary.succeeded += 1,
                    ProcessingOutcome::FailedRetryable => summary.failed_retryable += 1,
                    ProcessingOutcome::FailedTerminal => summary.failed_terminal += 1,
                    ProcessingOutcome::Attempted => {}
                }
            }
            Ok(None) => {
                tracing::warn!(
                    record = %key,
                    outcome = %outcome,
                    "Claim was taken over before the outcome could be recorded"
                );
                summary.lost_races += 1;
            }
            Err(e) => {
                // The claim stays unresolved and goes stale
                tracing::error!(record = %key, error = %e, "Failed to record outcome");
                summary.errors.push(format!("{key}: {e}"));
            }
        }
    }

    /// Run the transform and the apply, classifying the result
    async fn resolve(&self, record: &ReceivingRecord, transform: &dyn Transform) -> Resolution {
        let key = record.key();

        let entities = match transform.transform(record).await {
            Ok(TransformOutput::Skipped(reason)) => {
                return Resolution {
                    outcome: ProcessingOutcome::Succeeded,
                    detail: json!({ "status": "skipped", "reason": reason }),
                };
            }
            Ok(TransformOutput::Entities(entities)) => entities,
            Err(e) => return transform_failure(e),
        };

        match self.warehouse.apply(key, &entities).await {
            Ok(()) => Resolution {
                outcome: ProcessingOutcome::Succeeded,
                detail: json!({ "status": "applied", "entities": entities.len() }),
            },
            Err(WarehouseError::Transient(message)) => Resolution {
                outcome: ProcessingOutcome::FailedRetryable,
                detail: json!({ "stage": "warehouse", "error": message }),
            },
            Err(WarehouseError::Terminal(message)) => Resolution {
                outcome: ProcessingOutcome::FailedTerminal,
                detail: json!({ "stage": "warehouse", "error": message }),
            },
        }
    }

    /// Transform without claiming or writing, counting what would happen
    async fn preview_record(
        &self,
        record: &ReceivingRecord,
        transform: &dyn Transform,
        summary: &mut PartitionSummary,
    ) {
        let result = transform.transform(record).await;
        tracing::info!(
            record = %record.key(),
            result = ?result.as_ref().map(|o| match o {
                TransformOutput::Entities(e) => format!("{} entities", e.len()),
                TransformOutput::Skipped(reason) => format!("skipped: {reason}"),
            }),
            "DRY RUN: would process record"
        );

        match result {
            Ok(TransformOutput::Entities(_)) => summary.succeeded += 1,
            Ok(TransformOutput::Skipped(_)) => summary.skipped += 1,
            Err(TransformError::Retryable(_)) => summary.failed_retryable += 1,
            Err(TransformError::Terminal(_)) => summary.failed_terminal += 1,
        }
    }
}

fn transform_failure(error: TransformError) -> Resolution {
    let outcome = if error.is_retryable() {
        ProcessingOutcome::FailedRetryable
    } else {
        ProcessingOutcome::FailedTerminal
    };
    let message = match error {
        TransformError::Retryable(m) | TransformError::Terminal(m) => m,
    };
    Resolution {
        outcome,
        detail: json!({ "stage": "transform", "error": message }),
    }
}

/// Pass-relative clock
struct PassClock {
    base: DateTime<Utc>,
    started: Instant,
}

impl PassClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.started.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.base + elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::processing::ProcessingState;
    use crate::core::receiving::ReceivingService;
    use crate::domain::ids::RecordKey;
    use crate::domain::warehouse::WarehouseEntity;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails retryably a fixed number of times, then succeeds
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transform for Flaky {
        fn document_type(&self) -> DocumentType {
            DocumentType::Fhir
        }

        fn revision(&self) -> u32 {
            1
        }

        async fn transform(
            &self,
            record: &ReceivingRecord,
        ) -> std::result::Result<TransformOutput, TransformError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(TransformError::retryable("sample not received yet"));
            }
            Ok(TransformOutput::entities(vec![WarehouseEntity::new(
                "encounter",
                record.id.to_string(),
                json!({}),
            )]))
        }
    }

    fn orchestrator(storage: &Storage, transforms: TransformRegistry) -> EtlOrchestrator {
        let settings = EtlSettings::default()
            .with_document_types(vec![DocumentType::Enrollment, DocumentType::Fhir]);
        EtlOrchestrator::new(storage, transforms, settings).unwrap()
    }

    #[tokio::test]
    async fn test_pass_processes_unprocessed_records() {
        let storage = Storage::in_memory();
        let receiving = ReceivingService::new(storage.receiving.clone());
        let id = receiving
            .append(DocumentType::Enrollment, r#"{"participant":"abc"}"#)
            .await
            .unwrap();

        let etl = orchestrator(&storage, TransformRegistry::with_defaults());
        let summary = etl.run_pass().await;

        assert_eq!(summary.totals().succeeded, 1);
        let key = RecordKey::new(DocumentType::Enrollment, id);
        assert_eq!(etl.log().state(key).await.unwrap(), ProcessingState::Done);

        // Nothing left to do
        let again = etl.run_pass().await;
        assert!(again.is_idle());
    }

    #[tokio::test]
    async fn test_retryable_failure_waits_for_backoff() {
        let storage = Storage::in_memory();
        let receiving = ReceivingService::new(storage.receiving.clone());
        receiving.append(DocumentType::Fhir, "{}").await.unwrap();

        let mut transforms = TransformRegistry::with_defaults();
        transforms.register(Arc::new(Flaky {
            failures: 1,
            calls: AtomicUsize::new(0),
        }));
        let etl = orchestrator(&storage, transforms);

        let start = Utc::now();
        let first = etl.run_pass_at(start).await;
        assert_eq!(first.totals().failed_retryable, 1);

        // Default initial backoff is longer than a second
        let early = etl.run_pass_at(start + chrono::Duration::seconds(1)).await;
        assert!(early.is_idle());

        let later = etl.run_pass_at(start + chrono::Duration::hours(2)).await;
        assert_eq!(later.totals().succeeded, 1);
    }

    #[tokio::test]
    async fn test_missing_transform_is_rejected() {
        let storage = Storage::in_memory();
        let result = EtlOrchestrator::new(
            &storage,
            TransformRegistry::new(),
            EtlSettings::default(),
        );
        assert!(matches!(result, Err(HarborError::Configuration(_))));
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = EtlConfig::default();
        config.document_types = vec!["fhir".to_string(), "redcap_det".to_string()];

        let settings = EtlSettings::from_config(&config, true).unwrap();
        assert_eq!(
            settings.document_types,
            vec![DocumentType::Fhir, DocumentType::RedcapDet]
        );
        assert!(settings.dry_run);

        config.document_types = vec!["bogus".to_string()];
        assert!(EtlSettings::from_config(&config, false).is_err());
    }
}
