//! Database layer for ExamFlow
//!
//! Provides:
//! - The `PaperStore` persistence contract
//! - SeaORM entity models and the Postgres-backed repository
//! - An in-memory store for tests and local runs
//! - Connection pool management

mod memory;
pub mod models;
mod repository;

pub use memory::InMemoryPaperStore;
pub use repository::Repository;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use crate::workflow::{Paper, PaperStatus};
use async_trait::async_trait;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    CreatedDesc,
    UpdatedDesc,
}

/// Conjunction of optional constraints over papers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaperSelector {
    pub lecturer_id: Option<Uuid>,
    /// `Some(empty)` matches nothing
    pub course_codes: Option<Vec<String>>,
    pub statuses: Option<Vec<PaperStatus>>,
    pub department: Option<String>,
    pub course_code: Option<String>,
    pub order: SortOrder,
}

impl PaperSelector {
    pub fn matches(&self, paper: &Paper) -> bool {
        self.lecturer_id.map_or(true, |id| paper.lecturer_id == id)
            && self
                .course_codes
                .as_ref()
                .map_or(true, |codes| codes.contains(&paper.metadata.course_code))
            && self
                .statuses
                .as_ref()
                .map_or(true, |statuses| statuses.contains(&paper.status))
            && self
                .department
                .as_ref()
                .map_or(true, |d| paper.metadata.department.as_ref() == Some(d))
            && self
                .course_code
                .as_ref()
                .map_or(true, |c| &paper.metadata.course_code == c)
    }
}

/// Document-store contract the workflow persists through.
///
/// `replace` and `delete` are compare-and-set on status: they only apply
/// when the stored paper still has `expected` status and report `false`
/// otherwise, so a guard is always re-checked against fresh state.
#[async_trait]
pub trait PaperStore: Send + Sync {
    async fn insert(&self, paper: &Paper) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Paper>>;

    async fn find(&self, selector: &PaperSelector) -> Result<Vec<Paper>>;

    async fn replace(&self, paper: &Paper, expected: PaperStatus) -> Result<bool>;

    async fn delete(&self, id: Uuid, expected: PaperStatus) -> Result<bool>;

    async fn ping(&self) -> Result<()>;
}

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    /// Primary connection (for writes)
    pub primary: DatabaseConnection,

    /// Read replica connection (optional)
    pub replica: Option<DatabaseConnection>,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to primary database...");
        let primary = connect(&config.url, config, "primary").await?;

        let replica = match config.read_url {
            Some(ref read_url) => {
                info!("Connecting to read replica...");
                Some(connect(read_url, config, "replica").await?)
            }
            None => None,
        };

        info!("Database connections established");

        Ok(Self { primary, replica })
    }

    /// Get the connection for reads (replica if available, otherwise primary)
    pub fn read(&self) -> &DatabaseConnection {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    /// Get the connection for writes (always primary)
    pub fn write(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Create the papers table if it does not exist yet
    pub async fn ensure_schema(&self) -> Result<()> {
        let backend = self.primary.get_database_backend();
        let schema = Schema::new(backend);
        let mut statement = schema.create_table_from_entity(models::PaperEntity);
        statement.if_not_exists();

        self.primary.execute(backend.build(&statement)).await?;
        info!("Schema ready");
        Ok(())
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Primary ping failed: {}", e),
            })?;

        if let Some(ref replica) = self.replica {
            replica
                .execute_unprepared("SELECT 1")
                .await
                .map_err(|e| AppError::DatabaseConnection {
                    message: format!("Replica ping failed: {}", e),
                })?;
        }

        Ok(())
    }
}

async fn connect(url: &str, config: &DatabaseConfig, label: &str) -> Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new(url);
    opts.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .sqlx_logging(false);

    Database::connect(opts)
        .await
        .map_err(|e| AppError::DatabaseConnection {
            message: format!("Failed to connect to {}: {}", label, e),
        })
}
