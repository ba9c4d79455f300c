//! End-to-end ETL scenarios against the in-memory backend
//!
//! These tests verify that:
//! - Records move through the processing log as expected
//! - Retryable failures wait for their backoff, terminal ones wait for a reset
//! - Crashed claims are taken over once stale
//! - Re-applying a record's entities never duplicates warehouse rows
//! - Warehouse errors resolve the claim as retryable or terminal

use async_trait::async_trait;
use chrono::{Duration, Utc};
use harbor::adapters::database::{Storage, WarehouseWriter};
use harbor::adapters::memory::MemoryStore;
use harbor::core::etl::{
    EtlOrchestrator, EtlPolicy, EtlSettings, Transform, TransformOutput, TransformRegistry,
};
use harbor::core::processing::{ProcessingLogManager, ProcessingState};
use harbor::core::receiving::ReceivingService;
use harbor::domain::{
    DocumentType, HarborError, NewLogEntry, ProcessingOutcome, ReceivingRecord, RecordKey,
    TransformError, ValidationError, WarehouseEntity, WarehouseError,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Scripted transform for the kit partition
struct Scripted {
    revision: u32,
    calls: AtomicUsize,
    script: Vec<Step>,
}

#[derive(Clone, Copy)]
enum Step {
    Retry,
    Terminal,
    Skip,
    Apply,
}

impl Scripted {
    fn new(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            revision: 1,
            calls: AtomicUsize::new(0),
            script,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transform for Scripted {
    fn document_type(&self) -> DocumentType {
        DocumentType::Kit
    }

    fn revision(&self) -> u32 {
        self.revision
    }

    async fn transform(&self, record: &ReceivingRecord) -> Result<TransformOutput, TransformError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        // The last step repeats forever
        let step = self
            .script
            .get(call)
            .or_else(|| self.script.last())
            .copied()
            .unwrap_or(Step::Apply);

        match step {
            Step::Retry => Err(TransformError::retryable("sample not received yet")),
            Step::Terminal => Err(TransformError::terminal("kit barcode is malformed")),
            Step::Skip => Ok(TransformOutput::skipped("test kit")),
            Step::Apply => Ok(TransformOutput::entities(vec![
                WarehouseEntity::new("kit", record.id.to_string(), json!({"barcode": "K-1"})),
                WarehouseEntity::new("sample", "S-1", json!({"kit": record.id.value()})),
            ])),
        }
    }
}

fn kit_orchestrator(storage: &Storage, transform: Arc<Scripted>, policy: EtlPolicy) -> EtlOrchestrator {
    let mut transforms = TransformRegistry::with_defaults();
    transforms.register(transform);
    let settings = EtlSettings::default()
        .with_document_types(vec![DocumentType::Kit])
        .with_policy(policy);
    EtlOrchestrator::new(storage, transforms, settings).unwrap()
}

async fn receive_kit(storage: &Storage) -> RecordKey {
    let receiving = ReceivingService::new(storage.receiving.clone());
    let id = receiving
        .append(DocumentType::Kit, r#"{"barcode": "K-1"}"#)
        .await
        .unwrap();
    RecordKey::new(DocumentType::Kit, id)
}

fn outcomes(history: &[harbor::domain::ProcessingLogEntry]) -> Vec<ProcessingOutcome> {
    history.iter().map(|e| e.outcome).collect()
}

#[tokio::test]
async fn test_enrollment_is_processed_once() {
    let storage = Storage::in_memory();
    let receiving = ReceivingService::new(storage.receiving.clone());
    let id = receiving
        .append(DocumentType::Enrollment, r#"{"participant": "P-1", "site": "clinic"}"#)
        .await
        .unwrap();
    assert_eq!(id.value(), 1);

    let etl = EtlOrchestrator::new(
        &storage,
        TransformRegistry::with_defaults(),
        EtlSettings::default(),
    )
    .unwrap();
    etl.run_pass().await;

    let key = RecordKey::new(DocumentType::Enrollment, id);
    let history = etl.log().history(key).await.unwrap();
    assert_eq!(
        outcomes(&history),
        vec![ProcessingOutcome::Attempted, ProcessingOutcome::Succeeded]
    );
    assert_eq!(history[0].sequence_number, 1);
    assert_eq!(history[1].sequence_number, 2);
    assert_eq!(history[1].detail["status"], "applied");

    let entities = storage.warehouse.entities(key).await.unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].body["participant"], "P-1");

    // Done records are not offered again
    assert!(etl.run_pass().await.is_idle());
}

#[tokio::test]
async fn test_array_payload_is_rejected_and_nothing_is_stored() {
    let storage = Storage::in_memory();
    let receiving = ReceivingService::new(storage.receiving.clone());

    let result = receiving
        .append(DocumentType::Fhir, r#"[{"resourceType": "Bundle"}]"#)
        .await;

    assert!(matches!(
        result,
        Err(HarborError::Validation(ValidationError::WrongShape { .. }))
    ));
    assert_eq!(receiving.count(DocumentType::Fhir).await.unwrap(), 0);

    // The next accepted document still gets the first id
    let id = receiving
        .append(DocumentType::Fhir, r#"{"resourceType": "Bundle"}"#)
        .await
        .unwrap();
    assert_eq!(id.value(), 1);
    let log = ProcessingLogManager::new(storage.log.clone());
    let key = RecordKey::new(DocumentType::Fhir, id);
    assert!(log.history(key).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_two_transient_failures_then_success() {
    let storage = Storage::in_memory();
    let key = receive_kit(&storage).await;
    let transform = Scripted::new(vec![Step::Retry, Step::Retry, Step::Apply]);
    let etl = kit_orchestrator(&storage, transform.clone(), EtlPolicy::default());

    let start = Utc::now();
    assert_eq!(etl.run_pass_at(start).await.totals().failed_retryable, 1);

    // Still inside the first backoff window
    assert!(etl.run_pass_at(start + Duration::seconds(5)).await.is_idle());

    assert_eq!(
        etl.run_pass_at(start + Duration::hours(1))
            .await
            .totals()
            .failed_retryable,
        1
    );
    assert_eq!(
        etl.run_pass_at(start + Duration::hours(3))
            .await
            .totals()
            .succeeded,
        1
    );

    let history = etl.log().history(key).await.unwrap();
    assert_eq!(
        outcomes(&history),
        vec![
            ProcessingOutcome::Attempted,
            ProcessingOutcome::FailedRetryable,
            ProcessingOutcome::Attempted,
            ProcessingOutcome::FailedRetryable,
            ProcessingOutcome::Attempted,
            ProcessingOutcome::Succeeded,
        ]
    );
    let sequences: Vec<u64> = history.iter().map(|e| e.sequence_number).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(history[1].detail["stage"], "transform");
    assert_eq!(transform.calls(), 3);
}

#[tokio::test]
async fn test_stale_claim_is_taken_over() {
    let storage = Storage::in_memory();
    let key = receive_kit(&storage).await;
    let log = ProcessingLogManager::new(storage.log.clone());

    // A worker claimed the record an hour ago and died
    let crashed_at = Utc::now() - Duration::hours(1);
    log.append(
        key,
        NewLogEntry::new(ProcessingOutcome::Attempted, json!({"worker_id": "gone"})).at(crashed_at),
    )
    .await
    .unwrap();

    let transform = Scripted::new(vec![Step::Apply]);
    let etl = kit_orchestrator(&storage, transform, EtlPolicy::default());

    // A fresh claim is left alone
    let fresh = etl.run_pass_at(crashed_at + Duration::seconds(10)).await;
    assert!(fresh.is_idle());

    let summary = etl.run_pass().await;
    assert_eq!(summary.totals().succeeded, 1);

    let history = log.history(key).await.unwrap();
    assert_eq!(
        outcomes(&history),
        vec![
            ProcessingOutcome::Attempted,
            ProcessingOutcome::Attempted,
            ProcessingOutcome::Succeeded,
        ]
    );
    assert_eq!(history[1].detail["reason"], "stale-claim");
}

#[tokio::test]
async fn test_terminal_failure_is_never_retried_automatically() {
    let storage = Storage::in_memory();
    let key = receive_kit(&storage).await;
    let transform = Scripted::new(vec![Step::Terminal, Step::Apply]);
    let etl = kit_orchestrator(&storage, transform.clone(), EtlPolicy::default());

    let start = Utc::now();
    assert_eq!(etl.run_pass_at(start).await.totals().failed_terminal, 1);
    assert!(etl.run_pass_at(start + Duration::days(30)).await.is_idle());

    assert_eq!(etl.log().state(key).await.unwrap(), ProcessingState::Dead);
    assert_eq!(transform.calls(), 1);
    assert!(storage.warehouse.entities(key).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reset_makes_dead_record_eligible() {
    let storage = Storage::in_memory();
    let key = receive_kit(&storage).await;
    let transform = Scripted::new(vec![Step::Terminal, Step::Apply]);
    let etl = kit_orchestrator(&storage, transform, EtlPolicy::default());

    // Only dead records can be reset
    let early = etl.log().reset(key, "too soon").await;
    assert!(matches!(early, Err(HarborError::State(_))));

    etl.run_pass().await;
    let sequence = etl.log().reset(key, "barcode fixed upstream").await.unwrap();
    assert_eq!(sequence, 3);
    assert_eq!(etl.log().state(key).await.unwrap(), ProcessingState::Retryable);

    // No backoff after a reset
    assert_eq!(etl.run_pass().await.totals().succeeded, 1);

    let history = etl.log().history(key).await.unwrap();
    assert_eq!(history[2].detail["status"], "reset");
    assert_eq!(history[2].detail["reason"], "barcode fixed upstream");
    assert_eq!(history.last().unwrap().outcome, ProcessingOutcome::Succeeded);
}

#[tokio::test]
async fn test_repeated_retries_escalate_to_terminal() {
    let storage = Storage::in_memory();
    let key = receive_kit(&storage).await;
    let transform = Scripted::new(vec![Step::Retry]);
    let policy = EtlPolicy {
        backoff_initial: std::time::Duration::ZERO,
        terminal_after_attempts: Some(2),
        ..EtlPolicy::default()
    };
    let etl = kit_orchestrator(&storage, transform, policy);

    assert_eq!(etl.run_pass().await.totals().failed_retryable, 1);
    assert_eq!(etl.run_pass().await.totals().failed_terminal, 1);
    assert!(etl.run_pass().await.is_idle());

    let history = etl.log().history(key).await.unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.outcome, ProcessingOutcome::FailedTerminal);
    assert_eq!(last.detail["escalated"], true);

    // A reset starts a fresh run of attempts
    etl.log().reset(key, "retry once more").await.unwrap();
    assert_eq!(etl.run_pass().await.totals().failed_retryable, 1);
}

#[tokio::test]
async fn test_skipped_record_is_done_without_entities() {
    let storage = Storage::in_memory();
    let key = receive_kit(&storage).await;
    let etl = kit_orchestrator(&storage, Scripted::new(vec![Step::Skip]), EtlPolicy::default());

    let summary = etl.run_pass().await;
    assert_eq!(summary.totals().skipped, 1);
    assert_eq!(summary.totals().succeeded, 0);

    let latest = etl.log().latest(key).await.unwrap().unwrap();
    assert_eq!(latest.outcome, ProcessingOutcome::Succeeded);
    assert_eq!(latest.detail["status"], "skipped");
    assert_eq!(latest.detail["reason"], "test kit");
    assert!(storage.warehouse.entities(key).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_revision_bump_reprocesses_done_records() {
    let storage = Storage::in_memory();
    let key = receive_kit(&storage).await;

    let v1 = Scripted::new(vec![Step::Apply]);
    let etl = kit_orchestrator(&storage, v1, EtlPolicy::default());
    assert_eq!(etl.run_pass().await.totals().succeeded, 1);
    assert!(etl.run_pass().await.is_idle());

    let v2 = Arc::new(Scripted {
        revision: 2,
        calls: AtomicUsize::new(0),
        script: vec![Step::Apply],
    });
    let etl = kit_orchestrator(&storage, v2, EtlPolicy::default());
    assert_eq!(etl.run_pass().await.totals().succeeded, 1);
    assert!(etl.run_pass().await.is_idle());

    let history = etl.log().history(key).await.unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[2].detail["reason"], "stale-revision");
    assert_eq!(history[3].revision, Some(2));

    // Re-applying replaced the entity set instead of adding to it
    assert_eq!(storage.warehouse.entities(key).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_apply_is_idempotent() {
    let storage = Storage::in_memory();
    let key = receive_kit(&storage).await;
    let entities = vec![
        WarehouseEntity::new("kit", "1", json!({"barcode": "K-1"})),
        WarehouseEntity::new("sample", "S-1", json!({})),
    ];

    storage.warehouse.apply(key, &entities).await.unwrap();
    let once = storage.warehouse.entities(key).await.unwrap();
    storage.warehouse.apply(key, &entities).await.unwrap();
    let twice = storage.warehouse.entities(key).await.unwrap();

    assert_eq!(once, twice);
    assert_eq!(twice.len(), 2);
}

#[tokio::test]
async fn test_partitions_have_independent_ids() {
    let storage = Storage::in_memory();
    let receiving = ReceivingService::new(storage.receiving.clone());

    let fhir = receiving.append(DocumentType::Fhir, "{}").await.unwrap();
    let kit = receiving.append(DocumentType::Kit, "{}").await.unwrap();
    let fhir2 = receiving.append(DocumentType::Fhir, "{}").await.unwrap();

    assert_eq!(fhir.value(), 1);
    assert_eq!(kit.value(), 1);
    assert_eq!(fhir2.value(), 2);

    let etl = EtlOrchestrator::new(
        &storage,
        TransformRegistry::with_defaults(),
        EtlSettings::default(),
    )
    .unwrap();
    let summary = etl.run_pass().await;
    assert_eq!(summary.partition(DocumentType::Fhir).unwrap().succeeded, 2);
    assert_eq!(summary.partition(DocumentType::Kit).unwrap().succeeded, 1);
}

#[tokio::test]
async fn test_takeover_after_apply_leaves_warehouse_unchanged() {
    let storage = Storage::in_memory();
    let key = receive_kit(&storage).await;
    let log = ProcessingLogManager::new(storage.log.clone());

    // The first worker applied its entities and died before recording the outcome
    let crashed_at = Utc::now() - Duration::hours(1);
    log.append(
        key,
        NewLogEntry::new(ProcessingOutcome::Attempted, json!({"worker_id": "gone"})).at(crashed_at),
    )
    .await
    .unwrap();
    let applied = vec![
        WarehouseEntity::new("kit", key.id.to_string(), json!({"barcode": "K-1"})),
        WarehouseEntity::new("sample", "S-1", json!({"kit": key.id.value()})),
    ];
    storage.warehouse.apply(key, &applied).await.unwrap();
    let before = storage.warehouse.entities(key).await.unwrap();

    let etl = kit_orchestrator(&storage, Scripted::new(vec![Step::Apply]), EtlPolicy::default());
    let summary = etl.run_pass().await;
    assert_eq!(summary.totals().succeeded, 1);

    assert_eq!(storage.warehouse.entities(key).await.unwrap(), before);
    let history = log.history(key).await.unwrap();
    assert_eq!(
        outcomes(&history),
        vec![
            ProcessingOutcome::Attempted,
            ProcessingOutcome::Attempted,
            ProcessingOutcome::Succeeded,
        ]
    );
}

/// Warehouse writer that rejects every apply
struct RejectingWarehouse {
    inner: Arc<MemoryStore>,
    transient: bool,
}

#[async_trait]
impl WarehouseWriter for RejectingWarehouse {
    async fn apply(&self, _key: RecordKey, _entities: &[WarehouseEntity]) -> Result<(), WarehouseError> {
        if self.transient {
            Err(WarehouseError::Transient("could not serialize access".to_string()))
        } else {
            Err(WarehouseError::Terminal("value too long for column".to_string()))
        }
    }

    async fn entities(&self, key: RecordKey) -> harbor::domain::Result<Vec<WarehouseEntity>> {
        self.inner.entities(key).await
    }
}

fn rejecting_storage(transient: bool) -> Storage {
    let store = Arc::new(MemoryStore::new());
    Storage {
        backend: store.clone(),
        receiving: store.clone(),
        log: store.clone(),
        warehouse: Arc::new(RejectingWarehouse {
            inner: store,
            transient,
        }),
    }
}

#[tokio::test]
async fn test_transient_warehouse_error_is_retryable() {
    let storage = rejecting_storage(true);
    let key = receive_kit(&storage).await;

    let etl = kit_orchestrator(&storage, Scripted::new(vec![Step::Apply]), EtlPolicy::default());
    let summary = etl.run_pass().await;
    assert_eq!(summary.totals().failed_retryable, 1);

    let history = etl.log().history(key).await.unwrap();
    assert_eq!(
        outcomes(&history),
        vec![ProcessingOutcome::Attempted, ProcessingOutcome::FailedRetryable]
    );
    assert_eq!(history[1].detail["stage"], "warehouse");
    assert_eq!(etl.log().state(key).await.unwrap(), ProcessingState::Retryable);
}

#[tokio::test]
async fn test_terminal_warehouse_error_is_dead() {
    let storage = rejecting_storage(false);
    let key = receive_kit(&storage).await;

    let etl = kit_orchestrator(&storage, Scripted::new(vec![Step::Apply]), EtlPolicy::default());
    let summary = etl.run_pass().await;
    assert_eq!(summary.totals().failed_terminal, 1);

    let history = etl.log().history(key).await.unwrap();
    assert_eq!(history[1].outcome, ProcessingOutcome::FailedTerminal);
    assert_eq!(history[1].detail["stage"], "warehouse");
    assert_eq!(history[1].detail["error"], "value too long for column");
    assert!(storage.warehouse.entities(key).await.unwrap().is_empty());

    // Not offered again without a reset
    assert!(etl.run_pass_at(Utc::now() + Duration::days(1)).await.is_idle());
}
