//! Rhyme catalog — code → name and page footprint.
//!
//! The allocator takes `pages` from here verbatim. `AppState` holds an
//! `Arc<dyn RhymeCatalog>`; production uses `PgRhymeCatalog`.

pub mod handlers;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Rhyme {
    pub code: String,
    pub name: String,
    pub pages: f64,
}

#[async_trait]
pub trait RhymeCatalog: Send + Sync {
    async fn lookup(&self, code: &str) -> Result<Option<Rhyme>, AppError>;

    async fn list(&self) -> Result<Vec<Rhyme>, AppError>;
}

/// Catalog backed by the `rhymes` table.
pub struct PgRhymeCatalog {
    pool: PgPool,
}

impl PgRhymeCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RhymeCatalog for PgRhymeCatalog {
    async fn lookup(&self, code: &str) -> Result<Option<Rhyme>, AppError> {
        Ok(
            sqlx::query_as::<_, Rhyme>("SELECT code, name, pages FROM rhymes WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list(&self) -> Result<Vec<Rhyme>, AppError> {
        Ok(
            sqlx::query_as::<_, Rhyme>("SELECT code, name, pages FROM rhymes ORDER BY name, code")
                .fetch_all(&self.pool)
                .await?,
        )
    }
}

/// Fixed in-memory catalog for tests.
#[cfg(test)]
pub struct StaticCatalog(pub Vec<Rhyme>);

#[cfg(test)]
impl StaticCatalog {
    pub fn nursery() -> Self {
        let rhyme = |code: &str, name: &str, pages: f64| Rhyme {
            code: code.to_string(),
            name: name.to_string(),
            pages,
        };
        Self(vec![
            rhyme("jack-and-jill", "Jack and Jill", 0.5),
            rhyme("humpty-dumpty", "Humpty Dumpty", 0.5),
            rhyme("twinkle", "Twinkle Twinkle Little Star", 1.0),
            rhyme("old-macdonald", "Old MacDonald Had a Farm", 3.0),
        ])
    }
}

#[cfg(test)]
#[async_trait]
impl RhymeCatalog for StaticCatalog {
    async fn lookup(&self, code: &str) -> Result<Option<Rhyme>, AppError> {
        Ok(self.0.iter().find(|r| r.code == code).cloned())
    }

    async fn list(&self) -> Result<Vec<Rhyme>, AppError> {
        Ok(self.0.clone())
    }
}
