//! Visitor identity — a durable per-browser identifier kept in the host's
//! local storage and reused across sessions.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use fluent_core::error::{WidgetError, WidgetResult};
use rand::Rng;
use tracing::{debug, warn};

/// Storage key holding the visitor identifier.
pub const VISITOR_ID_KEY: &str = "fluent_visitor_id";

/// Stored identifiers must be longer than this to be reused.
const MIN_STORED_ID_LEN: usize = 10;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Key-value store with `localStorage` semantics. Any call may fail (quota,
/// disabled storage, sandboxed iframe).
pub trait VisitorStorage: Send + Sync {
    fn get_item(&self, key: &str) -> WidgetResult<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> WidgetResult<()>;
}

/// Return the stored visitor id, creating and persisting one when absent.
///
/// Storage failures are logged and never fatal: the caller gets a fresh
/// identifier that lives only as long as this page load.
pub fn get_or_create_visitor_id(storage: &dyn VisitorStorage) -> String {
    match storage.get_item(VISITOR_ID_KEY) {
        Ok(Some(stored)) if stored.len() > MIN_STORED_ID_LEN => {
            debug!(visitor_id = %stored, "reusing stored visitor id");
            return stored;
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Visitor storage not available"),
    }

    let id = generate_visitor_id();
    if let Err(e) = storage.set_item(VISITOR_ID_KEY, &id) {
        warn!(error = %e, "Could not persist visitor id, using it for this page load only");
    }
    id
}

/// `visitor_<9 random base36 chars>_<unix millis>`.
pub fn generate_visitor_id() -> String {
    let mut rng = rand::thread_rng();
    let random: String = (0..9)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("visitor_{}_{}", random, Utc::now().timestamp_millis())
}

// ─── In-memory storage ──────────────────────────────────────────────────

/// Volatile storage for tests and hosts without persistence. Can be switched
/// to "unavailable" to emulate a sandboxed context.
#[derive(Default)]
pub struct MemoryStorage {
    items: DashMap<String, String>,
    unavailable: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that rejects every access.
    pub fn unavailable() -> Self {
        let storage = Self::new();
        storage.set_available(false);
        storage
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn check(&self) -> WidgetResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(WidgetError::Storage("storage is disabled".into()));
        }
        Ok(())
    }
}

impl VisitorStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> WidgetResult<Option<String>> {
        self.check()?;
        Ok(self.items.get(key).map(|v| v.value().clone()))
    }

    fn set_item(&self, key: &str, value: &str) -> WidgetResult<()> {
        self.check()?;
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ─── File storage ───────────────────────────────────────────────────────

/// Durable storage backed by a JSON object on disk.
pub struct FileStorage {
    path: PathBuf,
    lock: parking_lot::Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: parking_lot::Mutex::new(()),
        }
    }

    fn read_all(&self) -> WidgetResult<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl VisitorStorage for FileStorage {
    fn get_item(&self, key: &str) -> WidgetResult<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> WidgetResult<()> {
        let _guard = self.lock.lock();
        let mut items = self.read_all()?;
        items.insert(key.to_string(), value.to_string());
        std::fs::write(&self.path, serde_json::to_vec_pretty(&items)?)?;
        Ok(())
    }
}
