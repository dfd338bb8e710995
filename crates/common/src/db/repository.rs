//! Repository pattern for database operations
//!
//! Postgres-backed [`PaperStore`] built on SeaORM.

use crate::db::models::*;
use crate::db::{DbPool, PaperSelector, PaperStore, SortOrder};
use crate::errors::Result;
use crate::workflow::{Paper, PaperStatus};
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder,
};
use uuid::Uuid;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }
}

#[async_trait]
impl PaperStore for Repository {
    async fn insert(&self, paper: &Paper) -> Result<()> {
        PaperActiveModel::from_paper(paper)?
            .insert(self.write_conn())
            .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Paper>> {
        // Primary, not replica: transitions must see their own writes
        PaperEntity::find_by_id(id)
            .one(self.write_conn())
            .await?
            .map(Paper::try_from)
            .transpose()
    }

    async fn find(&self, selector: &PaperSelector) -> Result<Vec<Paper>> {
        let mut query = PaperEntity::find();

        if let Some(lecturer_id) = selector.lecturer_id {
            query = query.filter(PaperColumn::LecturerId.eq(lecturer_id));
        }
        if let Some(ref codes) = selector.course_codes {
            query = query.filter(PaperColumn::CourseCode.is_in(codes.iter().cloned()));
        }
        if let Some(ref statuses) = selector.statuses {
            query = query.filter(PaperColumn::Status.is_in(statuses.iter().map(|s| s.as_str())));
        }
        if let Some(ref department) = selector.department {
            query = query.filter(PaperColumn::Department.eq(department.clone()));
        }
        if let Some(ref course_code) = selector.course_code {
            query = query.filter(PaperColumn::CourseCode.eq(course_code.clone()));
        }

        query = match selector.order {
            SortOrder::CreatedDesc => query.order_by_desc(PaperColumn::CreatedAt),
            SortOrder::UpdatedDesc => query.order_by_desc(PaperColumn::UpdatedAt),
        };

        query
            .all(self.read_conn())
            .await?
            .into_iter()
            .map(Paper::try_from)
            .collect()
    }

    async fn replace(&self, paper: &Paper, expected: PaperStatus) -> Result<bool> {
        let mut model = PaperActiveModel::from_paper(paper)?;
        model.id = NotSet;

        let result = PaperEntity::update_many()
            .set(model)
            .filter(PaperColumn::Id.eq(paper.id))
            .filter(PaperColumn::Status.eq(expected.as_str()))
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn delete(&self, id: Uuid, expected: PaperStatus) -> Result<bool> {
        let result = PaperEntity::delete_many()
            .filter(PaperColumn::Id.eq(id))
            .filter(PaperColumn::Status.eq(expected.as_str()))
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}
