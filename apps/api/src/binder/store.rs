//! Selection store — the persistence boundary behind a binder session.
//!
//! The store mirrors the session's local list; it is never consulted while planning.
//! Both writes are idempotent: `save` upserts the `(page, slot)` row and `remove` deletes it.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::layout::{Selection, SlotPosition};
use crate::models::binder::{slot_name, SelectionRow};

#[async_trait]
pub trait SelectionStore: Send + Sync {
    /// Every stored selection for one school's grade binder.
    async fn fetch(&self, school_id: Uuid, grade: &str) -> Result<Vec<Selection>, AppError>;

    async fn save(&self, school_id: Uuid, grade: &str, selection: &Selection)
        -> Result<(), AppError>;

    /// Removes the occupant of `position` on `page_index`, or every occupant of that page
    /// when `position` is `None`.
    async fn remove(
        &self,
        school_id: Uuid,
        grade: &str,
        page_index: i32,
        position: Option<SlotPosition>,
    ) -> Result<(), AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL
// ────────────────────────────────────────────────────────────────────────────

pub struct PgSelectionStore {
    pool: PgPool,
}

impl PgSelectionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SelectionStore for PgSelectionStore {
    async fn fetch(&self, school_id: Uuid, grade: &str) -> Result<Vec<Selection>, AppError> {
        let rows = sqlx::query_as::<_, SelectionRow>(
            r#"
            SELECT s.page_index, s.rhyme_code, s.slot, r.pages
            FROM binder_selections s
            JOIN rhymes r ON r.code = s.rhyme_code
            WHERE s.school_id = $1 AND s.grade = $2
            ORDER BY s.page_index, s.slot DESC
            "#,
        )
        .bind(school_id)
        .bind(grade)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().map(Selection::from).collect())
    }

    async fn save(
        &self,
        school_id: Uuid,
        grade: &str,
        selection: &Selection,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO binder_selections (school_id, grade, page_index, slot, rhyme_code)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (school_id, grade, page_index, slot)
            DO UPDATE SET rhyme_code = EXCLUDED.rhyme_code, updated_at = NOW()
            "#,
        )
        .bind(school_id)
        .bind(grade)
        .bind(selection.page_index)
        .bind(slot_name(selection.position))
        .bind(&selection.code)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        debug!(
            "Saved '{}' at page {} for school {school_id} grade {grade}",
            selection.code, selection.page_index
        );
        Ok(())
    }

    async fn remove(
        &self,
        school_id: Uuid,
        grade: &str,
        page_index: i32,
        position: Option<SlotPosition>,
    ) -> Result<(), AppError> {
        match position {
            Some(pos) => {
                sqlx::query(
                    "DELETE FROM binder_selections WHERE school_id = $1 AND grade = $2 AND page_index = $3 AND slot = $4",
                )
                .bind(school_id)
                .bind(grade)
                .bind(page_index)
                .bind(pos.as_str())
                .execute(&self.pool)
                .await
                .map_err(store_error)?;
            }
            None => {
                sqlx::query(
                    "DELETE FROM binder_selections WHERE school_id = $1 AND grade = $2 AND page_index = $3",
                )
                .bind(school_id)
                .bind(grade)
                .bind(page_index)
                .execute(&self.pool)
                .await
                .map_err(store_error)?;
            }
        }
        Ok(())
    }
}

/// Unreachable database becomes `Persistence` (502); anything else stays `Database`.
fn store_error(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => AppError::Persistence(err.to_string()),
        other => AppError::Database(other),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory (tests)
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub mod memory {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    use tokio::sync::Mutex;

    use super::*;

    /// In-memory store. `set_failing(true)` makes every write fail.
    #[derive(Default)]
    pub struct MemorySelectionStore {
        rows: Mutex<HashMap<(Uuid, String), Vec<Selection>>>,
        failing: AtomicBool,
    }

    impl MemorySelectionStore {
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub async fn seed(&self, school_id: Uuid, grade: &str, selections: Vec<Selection>) {
            self.rows
                .lock()
                .await
                .insert((school_id, grade.to_string()), selections);
        }

        fn check(&self) -> Result<(), AppError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(AppError::Persistence("store unavailable".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SelectionStore for MemorySelectionStore {
        async fn fetch(&self, school_id: Uuid, grade: &str) -> Result<Vec<Selection>, AppError> {
            let rows = self.rows.lock().await;
            let mut selections = rows
                .get(&(school_id, grade.to_string()))
                .cloned()
                .unwrap_or_default();
            crate::layout::selection::normalize_order(&mut selections);
            Ok(selections)
        }

        async fn save(
            &self,
            school_id: Uuid,
            grade: &str,
            selection: &Selection,
        ) -> Result<(), AppError> {
            self.check()?;
            let mut rows = self.rows.lock().await;
            let binder = rows.entry((school_id, grade.to_string())).or_default();
            binder.retain(|s| {
                !(s.page_index == selection.page_index && s.position == selection.position)
            });
            binder.push(selection.clone());
            Ok(())
        }

        async fn remove(
            &self,
            school_id: Uuid,
            grade: &str,
            page_index: i32,
            position: Option<SlotPosition>,
        ) -> Result<(), AppError> {
            self.check()?;
            let mut rows = self.rows.lock().await;
            if let Some(binder) = rows.get_mut(&(school_id, grade.to_string())) {
                binder.retain(|s| {
                    s.page_index != page_index || (position.is_some() && s.position != position)
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_save_upserts_slot() {
        let store = MemorySelectionStore::default();
        let school = Uuid::new_v4();
        let first = Selection::new(1, "jack", 0.5).at(SlotPosition::Top);
        let second = Selection::new(1, "jill", 0.5).at(SlotPosition::Top);
        store.save(school, "k1", &first).await.unwrap();
        store.save(school, "k1", &second).await.unwrap();
        assert_eq!(store.fetch(school, "k1").await.unwrap(), vec![second]);
    }

    #[tokio::test]
    async fn test_remove_by_slot_and_by_page() {
        let store = MemorySelectionStore::default();
        let school = Uuid::new_v4();
        store
            .seed(
                school,
                "k1",
                vec![
                    Selection::new(1, "jack", 0.5).at(SlotPosition::Top),
                    Selection::new(1, "jill", 0.5).at(SlotPosition::Bottom),
                    Selection::new(2, "twinkle", 1.0),
                ],
            )
            .await;
        store
            .remove(school, "k1", 1, Some(SlotPosition::Top))
            .await
            .unwrap();
        assert_eq!(store.fetch(school, "k1").await.unwrap().len(), 2);
        store.remove(school, "k1", 2, None).await.unwrap();
        let left = store.fetch(school, "k1").await.unwrap();
        assert_eq!(left, vec![Selection::new(1, "jill", 0.5).at(SlotPosition::Bottom)]);
    }

    #[tokio::test]
    async fn test_failing_store_rejects_writes() {
        let store = MemorySelectionStore::default();
        store.set_failing(true);
        let err = store
            .save(Uuid::new_v4(), "k1", &Selection::new(0, "twinkle", 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
    }

    #[test]
    fn test_connection_failures_map_to_persistence() {
        assert!(matches!(
            store_error(sqlx::Error::PoolTimedOut),
            AppError::Persistence(_)
        ));
        assert!(matches!(
            store_error(sqlx::Error::PoolClosed),
            AppError::Persistence(_)
        ));
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(
            store_error(sqlx::Error::Io(io)),
            AppError::Persistence(_)
        ));
        assert!(matches!(
            store_error(sqlx::Error::RowNotFound),
            AppError::Database(_)
        ));
    }
}
