//! Durable catalog of managed servers.
//!
//! Every server owns one directory under the registry root:
//!
//! ```text
//! servers/
//!   <id>/
//!     config.json        the ServerRecord
//!     server.properties  key=value settings read by the game server
//!     ...                install artifacts (server.jar, bedrock_server, ...)
//! ```
//!
//! The registry keeps an in-memory copy of every record and rewrites the
//! record file on each mutation, temp file first and then renamed over the
//! old one. It knows nothing about processes; live status is reconciled by
//! the [`LifecycleOrchestrator`](crate::server::LifecycleOrchestrator).
//!
//! # Examples
//!
//! ```no_run
//! use craft_runner::registry::{NewServer, ServerKind, ServerRegistry};
//!
//! let registry = ServerRegistry::open("servers").unwrap();
//! registry.load().unwrap();
//!
//! let record = registry
//!     .create(NewServer {
//!         name: "Survival".to_string(),
//!         kind: ServerKind::Java,
//!         version: "1.21.1".to_string(),
//!         ram: 4,
//!     })
//!     .unwrap();
//! println!("Created {} in {}", record.id, registry.server_dir(&record.id).display());
//! ```
pub mod properties;
mod record;

pub use properties::PropertiesDocument;
pub use record::{NewServer, PropertyValue, ServerKind, ServerRecord, ServerStatus};

use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

/// File name of the persisted record inside a server directory.
pub const RECORD_FILE: &str = "config.json";
/// File name of the game server's properties file.
pub const PROPERTIES_FILE: &str = "server.properties";

/// Durable catalog of server definitions.
pub struct ServerRegistry {
    /// Directory holding one subdirectory per server
    root: PathBuf,
    /// In-memory copy of every loaded record, keyed by id
    records: RwLock<HashMap<String, ServerRecord>>,
}

impl ServerRegistry {
    /// Opens a registry rooted at `root`, creating the directory if needed.
    ///
    /// The catalog starts empty; call [`load`](Self::load) to read existing
    /// records.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            Error::Io(format!(
                "Failed to create servers directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self {
            root,
            records: RwLock::new(HashMap::new()),
        })
    }

    /// Install directory of a server.
    pub fn server_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Scans the root directory and loads every readable record.
    ///
    /// A record that cannot be read or parsed is skipped with a warning so
    /// one corrupt server never hides the others. Returns the number of
    /// records loaded.
    #[tracing::instrument(skip(self), fields(root = %self.root.display()))]
    pub fn load(&self) -> Result<usize> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            Error::Io(format!(
                "Failed to read servers directory {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let mut loaded = HashMap::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };

            let dir_name = entry.file_name().to_string_lossy().into_owned();
            let record_path = entry.path().join(RECORD_FILE);
            if !record_path.is_file() {
                continue;
            }

            match read_record(&record_path) {
                Ok(record) if record.id == dir_name => {
                    tracing::debug!(
                        server_id = %record.id,
                        name = %record.name,
                        "Loaded server record"
                    );
                    loaded.insert(record.id.clone(), record);
                }
                Ok(record) => {
                    tracing::warn!(
                        server_id = %record.id,
                        directory = %dir_name,
                        "Skipping server record whose id does not match its directory"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        directory = %dir_name,
                        error = %e,
                        "Could not load server record"
                    );
                }
            }
        }

        let count = loaded.len();
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        *records = loaded;

        tracing::info!(num_servers = count, "Loaded server registry");
        Ok(count)
    }

    /// Registers a freshly installed server with a new id and `stopped` status.
    #[tracing::instrument(skip(self, new), fields(name = %new.name, kind = %new.kind))]
    pub fn create(&self, new: NewServer) -> Result<ServerRecord> {
        let record = ServerRecord {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            kind: new.kind,
            version: new.version,
            ram: new.ram,
            status: ServerStatus::Stopped,
            properties: BTreeMap::new(),
        };

        self.save(&record)?;
        tracing::info!(server_id = %record.id, "Registered new server");
        Ok(record)
    }

    /// Returns `true` if a record exists for `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Get a record by id
    pub fn get(&self, id: &str) -> Result<ServerRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);

        records
            .get(id)
            .cloned()
            .ok_or_else(|| Error::ServerNotFound(id.to_string()))
    }

    /// All records, sorted by name.
    pub fn list(&self) -> Result<Vec<ServerRecord>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);

        let mut list: Vec<ServerRecord> = records.values().cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }

    /// Persists a record, creating its directory if absent, and updates the
    /// in-memory catalog.
    pub fn save(&self, record: &ServerRecord) -> Result<()> {
        let dir = self.server_dir(&record.id);
        fs::create_dir_all(&dir).map_err(|e| {
            Error::Io(format!(
                "Failed to create server directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let json = serde_json::to_vec_pretty(record).map_err(|e| {
            Error::Serialization(format!("Failed to serialize server record: {}", e))
        })?;
        write_atomic(&dir.join(RECORD_FILE), &json)?;

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.insert(record.id.clone(), record.clone());

        tracing::trace!(server_id = %record.id, "Persisted server record");
        Ok(())
    }

    /// Records a status, persisting only when it differs from the stored one.
    pub fn set_status(&self, id: &str, status: ServerStatus) -> Result<ServerRecord> {
        let mut record = self.get(id)?;
        if record.status != status {
            tracing::debug!(server_id = %id, from = %record.status, to = %status, "Status changed");
            record.status = status;
            self.save(&record)?;
        }
        Ok(record)
    }

    /// Reads `server.properties` with underscored keys. A missing file reads
    /// as empty.
    pub fn read_properties(&self, id: &str) -> Result<BTreeMap<String, String>> {
        Ok(self.read_properties_document(id)?.to_map())
    }

    /// Merges overrides into `server.properties`, leaving other keys as they
    /// were, and records the overrides on the server record.
    ///
    /// Fails with [`Error::InvalidProperty`] before touching either file if
    /// an override would not read back as written.
    #[tracing::instrument(
        skip(self, overrides),
        fields(server_id = %id, num_overrides = overrides.len())
    )]
    pub fn write_properties(
        &self,
        id: &str,
        overrides: &BTreeMap<String, PropertyValue>,
    ) -> Result<()> {
        let mut document = self.read_properties_document(id)?;
        properties::validate_overrides(overrides)?;
        document.merge(overrides);

        let path = self.server_dir(id).join(PROPERTIES_FILE);
        write_atomic(&path, document.render().as_bytes())?;

        let mut record = self.get(id)?;
        for (key, value) in overrides {
            record
                .properties
                .insert(properties::to_internal_key(key), value.clone());
        }
        self.save(&record)?;

        tracing::info!("Updated server properties");
        Ok(())
    }

    fn read_properties_document(&self, id: &str) -> Result<PropertiesDocument> {
        if !self.contains(id) {
            return Err(Error::ServerNotFound(id.to_string()));
        }

        let path = self.server_dir(id).join(PROPERTIES_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(PropertiesDocument::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PropertiesDocument::default()),
            Err(e) => Err(Error::Io(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

fn read_record(path: &Path) -> Result<ServerRecord> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Io(format!("Failed to read {}: {}", path.display(), e)))?;

    serde_json::from_str(&content).map_err(|e| {
        Error::Serialization(format!("Failed to parse {}: {}", path.display(), e))
    })
}

/// Writes `contents` next to `path` and renames it into place.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents)
        .map_err(|e| Error::Io(format!("Failed to write {}: {}", tmp.display(), e)))?;
    fs::rename(&tmp, path).map_err(|e| {
        Error::Io(format!(
            "Failed to move {} into place: {}",
            path.display(),
            e
        ))
    })
}
