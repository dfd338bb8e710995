//! In-process paper store

use crate::db::{PaperSelector, PaperStore, SortOrder};
use crate::errors::{AppError, Result};
use crate::workflow::{Paper, PaperStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryPaperStore {
    papers: RwLock<HashMap<Uuid, Paper>>,
}

impl InMemoryPaperStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaperStore for InMemoryPaperStore {
    async fn insert(&self, paper: &Paper) -> Result<()> {
        let mut papers = self.papers.write().await;
        if papers.contains_key(&paper.id) {
            return Err(AppError::Internal {
                message: format!("Paper {} already exists", paper.id),
            });
        }
        papers.insert(paper.id, paper.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Paper>> {
        Ok(self.papers.read().await.get(&id).cloned())
    }

    async fn find(&self, selector: &PaperSelector) -> Result<Vec<Paper>> {
        let mut found: Vec<Paper> = self
            .papers
            .read()
            .await
            .values()
            .filter(|p| selector.matches(p))
            .cloned()
            .collect();

        match selector.order {
            SortOrder::CreatedDesc => found.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortOrder::UpdatedDesc => found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
        }
        Ok(found)
    }

    async fn replace(&self, paper: &Paper, expected: PaperStatus) -> Result<bool> {
        let mut papers = self.papers.write().await;
        match papers.get_mut(&paper.id) {
            Some(stored) if stored.status == expected => {
                *stored = paper.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid, expected: PaperStatus) -> Result<bool> {
        let mut papers = self.papers.write().await;
        let current = papers.get(&id).is_some_and(|p| p.status == expected);
        if current {
            papers.remove(&id);
        }
        Ok(current)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
