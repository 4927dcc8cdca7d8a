//! Storage layer: durable job/plan records and process-wide caches.
//!
//! Persistence is a two-tier store: an in-memory concurrent map consulted
//! first, with a libSQL database behind it so records survive a process
//! restart. Both tiers implement the same [`Store`] contract and are
//! combined by [`TieredStore`]. No ambient global state — stores are
//! explicit values owned by the service.

mod migrations;

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use libsql::{Connection, Database, params};

use ideaforge_shared::{IdeaforgeError, Result};

/// Record kind for persisted jobs.
pub const KIND_JOB: &str = "job";
/// Record kind for persisted build plans.
pub const KIND_PLAN: &str = "plan";

// ---------------------------------------------------------------------------
// Store contract
// ---------------------------------------------------------------------------

/// Uniform get/put/has contract over (kind, id) → JSON records.
pub trait Store: Send + Sync {
    fn get(&self, kind: &str, id: &str) -> impl Future<Output = Result<Option<String>>> + Send;
    fn put(&self, kind: &str, id: &str, json: &str) -> impl Future<Output = Result<()>> + Send;
    fn has(&self, kind: &str, id: &str) -> impl Future<Output = Result<bool>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory concurrent store. Always the first tier consulted.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<(String, String), String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    async fn get(&self, kind: &str, id: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .get(&(kind.to_string(), id.to_string()))
            .map(|e| e.value().clone()))
    }

    async fn put(&self, kind: &str, id: &str, json: &str) -> Result<()> {
        self.entries
            .insert((kind.to_string(), id.to_string()), json.to_string());
        Ok(())
    }

    async fn has(&self, kind: &str, id: &str) -> Result<bool> {
        Ok(self
            .entries
            .contains_key(&(kind.to_string(), id.to_string())))
    }
}

// ---------------------------------------------------------------------------
// DiskStore (libSQL)
// ---------------------------------------------------------------------------

/// Durable libSQL-backed store, consulted on memory miss.
pub struct DiskStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl DiskStore {
    /// Open or create a database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| IdeaforgeError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| IdeaforgeError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| IdeaforgeError::Storage(e.to_string()))?;

        let store = Self { db, conn };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    IdeaforgeError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }
}

impl Store for DiskStore {
    async fn get(&self, kind: &str, id: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT json FROM records WHERE kind = ?1 AND id = ?2",
                params![kind, id],
            )
            .await
            .map_err(|e| IdeaforgeError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let json: String = row
                    .get(0)
                    .map_err(|e| IdeaforgeError::Storage(e.to_string()))?;
                Ok(Some(json))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(IdeaforgeError::Storage(e.to_string())),
        }
    }

    async fn put(&self, kind: &str, id: &str, json: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO records (kind, id, json, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(kind, id) DO UPDATE SET
                   json = excluded.json,
                   updated_at = excluded.updated_at",
                params![kind, id, json, now.as_str()],
            )
            .await
            .map_err(|e| IdeaforgeError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn has(&self, kind: &str, id: &str) -> Result<bool> {
        Ok(self.get(kind, id).await?.is_some())
    }
}

// ---------------------------------------------------------------------------
// TieredStore
// ---------------------------------------------------------------------------

/// Memory-first store with a durable disk tier behind it.
///
/// Reads hit memory first and fall back to disk, repopulating memory on a
/// disk hit. Writes go to both tiers; a disk write failure is surfaced
/// since durability is the point of this tier.
pub struct TieredStore {
    memory: MemoryStore,
    disk: Option<DiskStore>,
}

impl TieredStore {
    /// Memory-only store (tests, ephemeral runs).
    pub fn in_memory() -> Self {
        Self {
            memory: MemoryStore::new(),
            disk: None,
        }
    }

    /// Memory store backed by a libSQL database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            memory: MemoryStore::new(),
            disk: Some(DiskStore::open(path).await?),
        })
    }
}

impl Store for TieredStore {
    async fn get(&self, kind: &str, id: &str) -> Result<Option<String>> {
        if let Some(json) = self.memory.get(kind, id).await? {
            return Ok(Some(json));
        }

        if let Some(disk) = &self.disk {
            if let Some(json) = disk.get(kind, id).await? {
                self.memory.put(kind, id, &json).await?;
                return Ok(Some(json));
            }
        }

        Ok(None)
    }

    async fn put(&self, kind: &str, id: &str, json: &str) -> Result<()> {
        self.memory.put(kind, id, json).await?;
        if let Some(disk) = &self.disk {
            disk.put(kind, id, json).await?;
        }
        Ok(())
    }

    async fn has(&self, kind: &str, id: &str) -> Result<bool> {
        if self.memory.has(kind, id).await? {
            return Ok(true);
        }
        match &self.disk {
            Some(disk) => disk.has(kind, id).await,
            None => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Typed helpers
// ---------------------------------------------------------------------------

/// Read and deserialize a record.
pub async fn get_json<T: serde::de::DeserializeOwned>(
    store: &impl Store,
    kind: &str,
    id: &str,
) -> Result<Option<T>> {
    match store.get(kind, id).await? {
        Some(json) => {
            let value = serde_json::from_str(&json)
                .map_err(|e| IdeaforgeError::Storage(format!("{kind} {id}: {e}")))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Serialize and write a record.
pub async fn put_json<T: serde::Serialize>(
    store: &impl Store,
    kind: &str,
    id: &str,
    value: &T,
) -> Result<()> {
    let json = serde_json::to_string(value)
        .map_err(|e| IdeaforgeError::Storage(format!("{kind} {id}: {e}")))?;
    store.put(kind, id, &json).await
}

// ---------------------------------------------------------------------------
// TtlCache
// ---------------------------------------------------------------------------

/// Process-wide concurrent cache with time-to-live invalidation.
///
/// Entries are immutable once written and keyed by a stable identity
/// (origin URL, search keyword), so no locking beyond atomic map operations
/// is required. Expired entries are evicted lazily on read.
pub struct TtlCache<V> {
    entries: DashMap<String, (Instant, V)>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Get a live entry, evicting it if expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                let (inserted, value) = entry.value();
                if inserted.elapsed() < self.ttl {
                    return Some(value.clone());
                }
                true
            }
            None => false,
        };

        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), (Instant::now(), value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
