use rusqlite::Connection;
use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::errors::StoreError;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

// Poller and sweeper each hold their own connection; let writers queue briefly.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// Thread-local connection slots, one per database file.
thread_local! {
    static DB_CONNS: RefCell<HashMap<PathBuf, Connection>> = RefCell::new(HashMap::new());
}

#[derive(Clone, Debug)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Provides this thread's connection for the database file to the closure.
    /// Must not be called re-entrantly from inside `f`.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError>,
    {
        DB_CONNS
            .try_with(|cell| {
                let mut conns = cell.borrow_mut();
                let conn = match conns.entry(self.path.clone()) {
                    Entry::Occupied(slot) => slot.into_mut(),
                    Entry::Vacant(slot) => slot.insert(open(&self.path)?),
                };
                f(conn)
            })
            .map_err(|_| StoreError::ConnectionUnavailable)?
    }
}

fn open(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
    Ok(conn)
}

/// Creates the snapshot tables if they don't exist yet.
pub fn init_db(db: &Database) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    })?;

    info!(path = %db.path().display(), "database schema ready");
    Ok(())
}
