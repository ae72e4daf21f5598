use bosun_core::error::BosunError;
use bosun_core::store::{Store, StoreProvider};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::analysis_repo::AnalysisRepo;
use crate::event_repo::EventRepo;
use crate::knowledge_repo::KnowledgeRepo;
use crate::schema;
use crate::telemetry_repo::TelemetryRepo;

pub struct DbStore {
    conn: Connection,
}

impl DbStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Store for DbStore {
    type Events<'a>
        = EventRepo<'a>
    where
        Self: 'a;
    type Telemetry<'a>
        = TelemetryRepo<'a>
    where
        Self: 'a;
    type Analyses<'a>
        = AnalysisRepo<'a>
    where
        Self: 'a;
    type Knowledge<'a>
        = KnowledgeRepo<'a>
    where
        Self: 'a;

    fn events(&self) -> Self::Events<'_> {
        EventRepo::new(&self.conn)
    }

    fn telemetry(&self) -> Self::Telemetry<'_> {
        TelemetryRepo::new(&self.conn)
    }

    fn analyses(&self) -> Self::Analyses<'_> {
        AnalysisRepo::new(&self.conn)
    }

    fn knowledge(&self) -> Self::Knowledge<'_> {
        KnowledgeRepo::new(&self.conn)
    }

    fn with_tx<F, T>(&self, f: F) -> Result<T, BosunError>
    where
        F: FnOnce(&Self) -> Result<T, BosunError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(BosunError::internal)?;
        let result = f(self);
        match result {
            Ok(value) => {
                self.conn
                    .execute_batch("COMMIT")
                    .map_err(BosunError::internal)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    warn!(error = %rollback, original = %err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

/// Opens one connection per unit of work against a SQLite file. The schema is
/// migrated once, when the provider is built.
#[derive(Debug, Clone)]
pub struct SqliteProvider {
    path: PathBuf,
}

impl SqliteProvider {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, BosunError> {
        let path = path.as_ref().to_path_buf();
        schema::open_and_migrate(&path.to_string_lossy()).map_err(BosunError::internal)?;
        debug!(path = %path.display(), "database migrated");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StoreProvider for SqliteProvider {
    type Store = DbStore;

    fn open(&self) -> Result<DbStore, BosunError> {
        let conn = schema::open(&self.path.to_string_lossy()).map_err(BosunError::internal)?;
        Ok(DbStore::new(conn))
    }
}
