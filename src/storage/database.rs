//! Database abstraction layer
//!
//! Provides a unified interface for different database backends (sled, redb).
//! Allows switching between storage engines via feature flags.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Database abstraction trait
///
/// Provides a unified interface for key-value storage operations
/// that can be implemented by different backends (sled, redb).
pub trait Database: Send + Sync {
    /// Open a named tree/table
    fn open_tree(&self, name: &str) -> Result<Box<dyn Tree>>;

    /// Flush all pending writes
    fn flush(&self) -> Result<()>;
}

/// Tree/Table abstraction trait
///
/// Represents a named collection of key-value pairs within a database.
pub trait Tree: Send + Sync {
    /// Insert a key-value pair
    fn insert(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Get a value by key
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Remove a key-value pair
    fn remove(&self, key: &[u8]) -> Result<()>;

    /// Check if a key exists
    fn contains_key(&self, key: &[u8]) -> Result<bool>;

    /// Clear all entries
    fn clear(&self) -> Result<()>;

    /// Get number of entries
    fn len(&self) -> Result<usize>;

    /// Check if tree is empty
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Iterate over all key-value pairs in ascending key order
    fn iter(&self) -> Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> + '_>;
}

/// Database backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    Sled,
    Redb,
}

/// Create a database instance based on backend type
pub fn create_database<P: AsRef<Path>>(
    data_dir: P,
    backend: DatabaseBackend,
) -> Result<Box<dyn Database>> {
    match backend {
        #[cfg(feature = "sled")]
        DatabaseBackend::Sled => Ok(Box::new(sled_impl::SledDatabase::new(data_dir)?)),
        #[cfg(not(feature = "sled"))]
        DatabaseBackend::Sled => Err(anyhow::anyhow!(
            "Sled backend not available (feature not enabled)"
        )),
        #[cfg(feature = "redb")]
        DatabaseBackend::Redb => Ok(Box::new(redb_impl::RedbDatabase::new(data_dir)?)),
        #[cfg(not(feature = "redb"))]
        DatabaseBackend::Redb => Err(anyhow::anyhow!(
            "Redb backend not available (feature not enabled)"
        )),
    }
}

/// Get default database backend
///
/// Returns the preferred backend (redb if available, otherwise sled).
pub fn default_backend() -> DatabaseBackend {
    #[cfg(feature = "redb")]
    {
        DatabaseBackend::Redb
    }
    #[cfg(all(not(feature = "redb"), feature = "sled"))]
    {
        DatabaseBackend::Sled
    }
    #[cfg(all(not(feature = "redb"), not(feature = "sled")))]
    {
        // Sentinel that fails gracefully in create_database() with a
        // clear error message when no backend feature is enabled
        DatabaseBackend::Redb
    }
}

/// Get fallback database backend
///
/// Returns an alternative backend if the primary fails.
/// Returns None if no fallback is available.
pub fn fallback_backend(primary: DatabaseBackend) -> Option<DatabaseBackend> {
    match primary {
        DatabaseBackend::Redb => {
            #[cfg(feature = "sled")]
            {
                Some(DatabaseBackend::Sled)
            }
            #[cfg(not(feature = "sled"))]
            {
                None
            }
        }
        DatabaseBackend::Sled => {
            #[cfg(feature = "redb")]
            {
                Some(DatabaseBackend::Redb)
            }
            #[cfg(not(feature = "redb"))]
            {
                None
            }
        }
    }
}

/// Open a database with the default backend, falling back if it fails
pub fn open_database<P: AsRef<Path>>(data_dir: P) -> Result<Arc<dyn Database>> {
    let default = default_backend();
    match create_database(data_dir.as_ref(), default) {
        Ok(db) => Ok(Arc::from(db)),
        Err(e) => {
            if let Some(fallback) = fallback_backend(default) {
                warn!(
                    "Failed to initialize {:?} backend: {}. Falling back to {:?}.",
                    default, e, fallback
                );
                info!("Attempting to initialize storage with fallback backend: {:?}", fallback);
                Ok(Arc::from(create_database(data_dir, fallback)?))
            } else {
                Err(anyhow::anyhow!(
                    "Failed to initialize {:?} backend: {}. No fallback backend available.",
                    default,
                    e
                ))
            }
        }
    }
}

// Sled implementation
#[cfg(feature = "sled")]
mod sled_impl {
    use super::{Database, Tree};
    use anyhow::Result;
    use sled::Db;
    use std::path::Path;
    use std::sync::Arc;

    pub struct SledDatabase {
        db: Arc<Db>,
    }

    impl SledDatabase {
        pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
            let db = sled::open(data_dir)?;
            Ok(Self { db: Arc::new(db) })
        }
    }

    impl Database for SledDatabase {
        fn open_tree(&self, name: &str) -> Result<Box<dyn Tree>> {
            let tree = self.db.open_tree(name)?;
            Ok(Box::new(SledTree {
                tree: Arc::new(tree),
            }))
        }

        fn flush(&self) -> Result<()> {
            self.db.flush()?;
            Ok(())
        }
    }

    struct SledTree {
        tree: Arc<sled::Tree>,
    }

    impl Tree for SledTree {
        fn insert(&self, key: &[u8], value: &[u8]) -> Result<()> {
            self.tree.insert(key, value)?;
            Ok(())
        }

        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
            Ok(self.tree.get(key)?.map(|v| v.to_vec()))
        }

        fn remove(&self, key: &[u8]) -> Result<()> {
            self.tree.remove(key)?;
            Ok(())
        }

        fn contains_key(&self, key: &[u8]) -> Result<bool> {
            Ok(self.tree.contains_key(key)?)
        }

        fn clear(&self) -> Result<()> {
            self.tree.clear()?;
            Ok(())
        }

        fn len(&self) -> Result<usize> {
            Ok(self.tree.len())
        }

        fn iter(&self) -> Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> + '_> {
            Box::new(self.tree.iter().map(|item| {
                item.map(|(k, v)| (k.to_vec(), v.to_vec()))
                    .map_err(|e| anyhow::anyhow!("Sled iteration error: {}", e))
            }))
        }
    }
}

// Redb implementation
#[cfg(feature = "redb")]
mod redb_impl {
    use super::{Database, Tree};
    use anyhow::Result;
    use redb::{Database as RedbDb, ReadableTable, TableDefinition};
    use std::path::Path;
    use std::sync::Arc;

    // Redb requires static table definitions, so every tree the host
    // uses is pre-defined here
    static MODULE_VERSIONS_TABLE: TableDefinition<&[u8], &[u8]> =
        TableDefinition::new("module_versions");
    static MODULE_HISTORY_TABLE: TableDefinition<&[u8], &[u8]> =
        TableDefinition::new("module_history");
    static META_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("meta");

    pub struct RedbDatabase {
        db: Arc<RedbDb>,
    }

    impl RedbDatabase {
        pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
            let db_path = data_dir.as_ref().join("modhost.redb");
            if let Some(parent) = db_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let db = RedbDb::create(&db_path)?;

            // Ensure all tables exist so read transactions never fail
            // on a fresh database
            let write_txn = db.begin_write()?;
            {
                write_txn.open_table(MODULE_VERSIONS_TABLE)?;
                write_txn.open_table(MODULE_HISTORY_TABLE)?;
                write_txn.open_table(META_TABLE)?;
            }
            write_txn.commit()?;

            Ok(Self { db: Arc::new(db) })
        }
    }

    fn table_for(name: &str) -> Result<TableDefinition<'static, &'static [u8], &'static [u8]>> {
        match name {
            "module_versions" => Ok(MODULE_VERSIONS_TABLE),
            "module_history" => Ok(MODULE_HISTORY_TABLE),
            "meta" => Ok(META_TABLE),
            other => Err(anyhow::anyhow!("Unknown tree name: {}", other)),
        }
    }

    impl Database for RedbDatabase {
        fn open_tree(&self, name: &str) -> Result<Box<dyn Tree>> {
            let table = table_for(name)?;
            Ok(Box::new(RedbTree {
                db: Arc::clone(&self.db),
                table,
            }))
        }

        fn flush(&self) -> Result<()> {
            // Redb commits transactions durably; nothing additional to flush
            Ok(())
        }
    }

    struct RedbTree {
        db: Arc<RedbDb>,
        table: TableDefinition<'static, &'static [u8], &'static [u8]>,
    }

    impl Tree for RedbTree {
        fn insert(&self, key: &[u8], value: &[u8]) -> Result<()> {
            let write_txn = self.db.begin_write()?;
            {
                let mut table = write_txn.open_table(self.table)?;
                table.insert(key, value)?;
            }
            write_txn.commit()?;
            Ok(())
        }

        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
            let read_txn = self.db.begin_read()?;
            let table = read_txn.open_table(self.table)?;
            let value = table.get(key)?.map(|v| v.value().to_vec());
            Ok(value)
        }

        fn remove(&self, key: &[u8]) -> Result<()> {
            let write_txn = self.db.begin_write()?;
            {
                let mut table = write_txn.open_table(self.table)?;
                table.remove(key)?;
            }
            write_txn.commit()?;
            Ok(())
        }

        fn contains_key(&self, key: &[u8]) -> Result<bool> {
            Ok(self.get(key)?.is_some())
        }

        fn clear(&self) -> Result<()> {
            let write_txn = self.db.begin_write()?;
            {
                let mut table = write_txn.open_table(self.table)?;
                // Collect keys first to avoid borrowing the table during removal
                let keys: Vec<Vec<u8>> = table
                    .range::<&[u8]>(..)?
                    .map(|entry| entry.map(|(k, _)| k.value().to_vec()))
                    .collect::<Result<_, _>>()?;
                for key in keys {
                    table.remove(key.as_slice())?;
                }
            }
            write_txn.commit()?;
            Ok(())
        }

        fn len(&self) -> Result<usize> {
            let read_txn = self.db.begin_read()?;
            let table = read_txn.open_table(self.table)?;
            Ok(table.len()? as usize)
        }

        fn iter(&self) -> Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> + '_> {
            // Materialize under a read transaction; trees are small
            // (one record per module plus history rows)
            let snapshot: Vec<Result<(Vec<u8>, Vec<u8>)>> = (|| -> Result<Vec<_>> {
                let read_txn = self.db.begin_read()?;
                let table = read_txn.open_table(self.table)?;
                let mut items = Vec::new();
                for entry in table.range::<&[u8]>(..)? {
                    let (k, v) = entry?;
                    items.push(Ok((k.value().to_vec(), v.value().to_vec())));
                }
                Ok(items)
            })()
            .unwrap_or_else(|e| vec![Err(e)]);
            Box::new(snapshot.into_iter())
        }
    }
}
