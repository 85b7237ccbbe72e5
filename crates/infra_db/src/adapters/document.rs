//! Document Ledger Adapter
//!
//! Stores every record as a versioned JSON document. `atomic_apply` is an
//! optimistic compare-and-set:
//!
//! 1. read the touched documents and remember their versions
//! 2. resolve the batch with [`stage`] outside any lock
//! 3. commit only if every remembered version is unchanged, bumping each
//!    written document's version
//! 4. otherwise back off and retry, up to `AdapterConfig::max_retries`
//!
//! When retries run out the batch fails with [`PortError::Conflict`] and
//! nothing is written.
//!
//! With a snapshot path configured, the store loads the snapshot on
//! [`DocumentLedgerStore::open`] and rewrites it inside every commit. A commit
//! whose snapshot write fails is rolled back before other readers see it.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use core_kernel::{
    AccountId, AdapterConfig, AdapterType, DomainPort, HealthCheckResult, HealthCheckable, InvoiceId, PortError,
    TransactionId,
};
use domain_billing::store::{stage, touched_keys};
use domain_billing::{Collection, LedgerStore, Mutation, OrderBy, Record, RecordKey, StagedWrite};

use crate::error::DatabaseError;

/// A stored document body and its commit version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct VersionedDocument {
    version: u64,
    body: serde_json::Value,
}

/// On-disk layout of a snapshot file
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    accounts: BTreeMap<Uuid, VersionedDocument>,
    #[serde(default)]
    invoices: BTreeMap<Uuid, VersionedDocument>,
    #[serde(default)]
    transactions: BTreeMap<Uuid, VersionedDocument>,
}

impl Snapshot {
    fn from_documents(documents: &HashMap<RecordKey, VersionedDocument>) -> Self {
        let mut snapshot = Snapshot::default();
        for (key, document) in documents {
            snapshot
                .collection_mut(key.collection())
                .insert(key.uuid(), document.clone());
        }
        snapshot
    }

    fn into_documents(self) -> HashMap<RecordKey, VersionedDocument> {
        let mut documents = HashMap::new();
        for (collection, entries) in [
            (Collection::Accounts, self.accounts),
            (Collection::Invoices, self.invoices),
            (Collection::Transactions, self.transactions),
        ] {
            for (id, document) in entries {
                documents.insert(key_for(collection, id), document);
            }
        }
        documents
    }

    fn collection_mut(&mut self, collection: Collection) -> &mut BTreeMap<Uuid, VersionedDocument> {
        match collection {
            Collection::Accounts => &mut self.accounts,
            Collection::Invoices => &mut self.invoices,
            Collection::Transactions => &mut self.transactions,
        }
    }
}

fn key_for(collection: Collection, id: Uuid) -> RecordKey {
    match collection {
        Collection::Accounts => RecordKey::Account(AccountId::from_uuid(id)),
        Collection::Invoices => RecordKey::Invoice(InvoiceId::from_uuid(id)),
        Collection::Transactions => RecordKey::Transaction(TransactionId::from_uuid(id)),
    }
}

/// Versioned JSON document implementation of the LedgerStore trait
#[derive(Debug)]
pub struct DocumentLedgerStore {
    documents: RwLock<HashMap<RecordKey, VersionedDocument>>,
    config: AdapterConfig,
    path: Option<PathBuf>,
    flush_lock: Mutex<()>,
    closed: AtomicBool,
    conflicts: AtomicU64,
}

impl DocumentLedgerStore {
    /// Creates an empty store with no snapshot file
    pub fn in_memory(config: AdapterConfig) -> Self {
        Self::from_documents(HashMap::new(), config, None)
    }

    /// Opens a store, loading the snapshot at `path` when it exists
    pub async fn open(path: Option<PathBuf>, config: AdapterConfig) -> Result<Self, DatabaseError> {
        let documents = match &path {
            Some(path) => load_snapshot(path).await?,
            None => HashMap::new(),
        };
        info!(
            documents = documents.len(),
            path = ?path,
            "Opened document ledger store"
        );
        Ok(Self::from_documents(documents, config, path))
    }

    fn from_documents(
        documents: HashMap<RecordKey, VersionedDocument>,
        config: AdapterConfig,
        path: Option<PathBuf>,
    ) -> Self {
        Self {
            documents: RwLock::new(documents),
            config,
            path,
            flush_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
            conflicts: AtomicU64::new(0),
        }
    }

    /// Default adapter configuration for the document backend
    pub fn default_config() -> AdapterConfig {
        AdapterConfig::new("document-ledger-store", AdapterType::Document)
    }

    /// Number of commits rejected because a document changed underneath
    pub fn conflict_count(&self) -> u64 {
        self.conflicts.load(Ordering::SeqCst)
    }

    /// Current version of a document, if it exists
    pub async fn version_of(&self, key: RecordKey) -> Option<u64> {
        self.documents.read().await.get(&key).map(|d| d.version)
    }

    /// Writes the current state to the snapshot file, if one is configured
    pub async fn flush(&self) -> Result<(), PortError> {
        let documents = self.documents.read().await;
        self.persist(&documents).await
    }

    /// Writes `documents` to the snapshot file; callers hold the documents lock
    async fn persist(&self, documents: &HashMap<RecordKey, VersionedDocument>) -> Result<(), PortError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        // Serialized so the last writer always carries the latest state
        let _guard = self.flush_lock.lock().await;
        write_snapshot(path, &Snapshot::from_documents(documents))
            .await
            .map_err(PortError::from)
    }

    /// Publishes `encoded` into `documents`, persisting before the lock is
    /// released; a failed snapshot write restores the previous documents
    async fn publish(
        &self,
        documents: &mut HashMap<RecordKey, VersionedDocument>,
        encoded: Vec<(RecordKey, serde_json::Value)>,
    ) -> Result<(), PortError> {
        let mut previous = Vec::with_capacity(encoded.len());
        for (key, body) in encoded {
            let version = documents.get(&key).map_or(1, |d| d.version + 1);
            previous.push((key, documents.insert(key, VersionedDocument { version, body })));
        }

        if let Err(e) = self.persist(documents).await {
            for (key, prior) in previous.into_iter().rev() {
                match prior {
                    Some(document) => documents.insert(key, document),
                    None => documents.remove(&key),
                };
            }
            warn!(error = %e, "Snapshot write failed; change rolled back");
            return Err(e);
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), PortError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PortError::ServiceUnavailable {
                service: "document ledger store (closed)".to_string(),
            });
        }
        Ok(())
    }

    /// Reads the touched documents and their versions in one consistent view
    async fn read_versions(
        &self,
        keys: &[RecordKey],
    ) -> Result<(HashMap<RecordKey, Option<Record>>, HashMap<RecordKey, Option<u64>>), PortError> {
        let documents = self.documents.read().await;
        let mut loaded = HashMap::with_capacity(keys.len());
        let mut versions = HashMap::with_capacity(keys.len());
        for key in keys {
            match documents.get(key) {
                Some(document) => {
                    let record = Record::from_document(key.collection(), document.body.clone())?;
                    loaded.insert(*key, Some(record));
                    versions.insert(*key, Some(document.version));
                }
                None => {
                    loaded.insert(*key, None);
                    versions.insert(*key, None);
                }
            }
        }
        Ok((loaded, versions))
    }
}

impl DomainPort for DocumentLedgerStore {}

#[async_trait]
impl HealthCheckable for DocumentLedgerStore {
    async fn health_check(&self) -> HealthCheckResult {
        if self.closed.load(Ordering::SeqCst) {
            return HealthCheckResult::unhealthy(&self.config.adapter_id, 0, "store is closed");
        }
        let start = std::time::Instant::now();
        let count = self.documents.read().await.len();
        let latency_ms = start.elapsed().as_millis() as u64;

        let mut result = HealthCheckResult::healthy(&self.config.adapter_id, latency_ms);
        result.message = Some(format!("{} documents", count));
        result
    }
}

#[async_trait]
impl LedgerStore for DocumentLedgerStore {
    async fn get(&self, key: RecordKey) -> Result<Record, PortError> {
        self.ensure_open()?;
        let documents = self.documents.read().await;
        let document = documents.get(&key).ok_or_else(|| key.not_found())?;
        Record::from_document(key.collection(), document.body.clone())
    }

    async fn list(&self, collection: Collection, order: Option<OrderBy>) -> Result<Vec<Record>, PortError> {
        self.ensure_open()?;
        let mut records = self
            .documents
            .read()
            .await
            .iter()
            .filter(|(key, _)| key.collection() == collection)
            .map(|(_, document)| Record::from_document(collection, document.body.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(order) = order {
            order.sort(&mut records);
        }
        Ok(records)
    }

    #[instrument(skip(self, record), fields(key = %record.key()))]
    async fn put(&self, record: Record) -> Result<(), PortError> {
        self.ensure_open()?;
        let body = record.to_document()?;
        let mut documents = self.documents.write().await;
        self.publish(&mut documents, vec![(record.key(), body)]).await
    }

    #[instrument(skip(self, mutations), fields(batch = mutations.len()))]
    async fn atomic_apply(&self, mutations: Vec<Mutation>) -> Result<Vec<StagedWrite>, PortError> {
        let keys = touched_keys(&mutations);

        for attempt in 0..=self.config.max_retries {
            self.ensure_open()?;
            let (loaded, versions) = self.read_versions(&keys).await?;

            // Business failures are final; only version conflicts retry
            let writes = stage(&mutations, loaded)?;
            let encoded = writes
                .iter()
                .map(|write| Ok((write.record.key(), write.record.to_document()?)))
                .collect::<Result<Vec<_>, PortError>>()?;

            {
                let mut documents = self.documents.write().await;
                let unchanged = versions
                    .iter()
                    .all(|(key, seen)| documents.get(key).map(|d| d.version) == *seen);
                if unchanged {
                    self.publish(&mut documents, encoded).await?;
                    debug!(attempt, records = writes.len(), "Batch committed");
                    return Ok(writes);
                }
            }

            self.conflicts.fetch_add(1, Ordering::SeqCst);
            debug!(attempt, "Version conflict");
            if attempt < self.config.max_retries {
                tokio::time::sleep(self.config.backoff(attempt)).await;
            }
        }

        warn!(retries = self.config.max_retries, "Batch abandoned after repeated conflicts");
        Err(PortError::conflict(format!(
            "documents changed concurrently; gave up after {} retries",
            self.config.max_retries
        )))
    }

    async fn close(&self) -> Result<(), PortError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.flush().await
    }
}

async fn load_snapshot(path: &Path) -> Result<HashMap<RecordKey, VersionedDocument>, DatabaseError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let snapshot: Snapshot = serde_json::from_slice(&bytes)
                .map_err(|e| DatabaseError::SerializationError(format!("{}: {}", path.display(), e)))?;
            Ok(snapshot.into_documents())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(DatabaseError::ConnectionFailed(format!("{}: {}", path.display(), e))),
    }
}

async fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), DatabaseError> {
    let bytes = serde_json::to_vec_pretty(snapshot)
        .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
    let staging = path.with_extension("tmp");
    tokio::fs::write(&staging, bytes)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(format!("{}: {}", staging.display(), e)))?;
    tokio::fs::rename(&staging, path)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(format!("{}: {}", path.display(), e)))
}
