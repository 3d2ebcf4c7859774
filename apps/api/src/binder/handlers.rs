//! Axum route handlers for the Binder API.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::binder::session::{BinderKey, Notice};
use crate::errors::AppError;
use crate::layout::{
    audit_selections, compute_current_page_content, compute_page_usage, find_next_available_page,
    plan_selection, total_pages, NextAvailable, PageContent, PageUsage, PlacementRequest, Selection,
    SelectionIssue, SelectionPlan, SlotPosition, MAX_PAGES,
};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    pub current_page: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PositionQuery {
    pub position: Option<SlotPosition>,
}

#[derive(Debug, Serialize)]
pub struct BinderView {
    pub selections: Vec<Selection>,
    pub usage: PageUsage,
    pub next_available: NextAvailable,
    pub total_pages: i32,
    pub issues: Vec<SelectionIssue>,
}

#[derive(Debug, Serialize)]
pub struct PageView {
    pub page_index: i32,
    pub content: PageContent,
    pub replaceable: bool,
}

#[derive(Debug, Deserialize)]
pub struct AddSelectionRequest {
    pub rhyme_code: String,
    pub page_index: Option<i32>,
    pub position: Option<SlotPosition>,
    pub current_page: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    #[serde(flatten)]
    pub plan: SelectionPlan,
    pub total_pages: i32,
}

#[derive(Debug, Deserialize)]
pub struct PlanPreviewRequest {
    pub selections: Vec<Selection>,
    #[serde(flatten)]
    pub placement: PlacementRequest,
    pub current_page: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct RemovalResponse {
    pub removed: Vec<Selection>,
    #[serde(flatten)]
    pub view: BinderView,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/binders/:school_id/:grade
pub async fn handle_get_binder(
    State(state): State<AppState>,
    Path((school_id, grade)): Path<(Uuid, String)>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<BinderView>, AppError> {
    let current_page = check_current_page(query.current_page)?;
    let key = BinderKey::new(school_id, grade);
    let selections = state.sessions.selections(&key).await?;
    Ok(Json(binder_view(selections, current_page)))
}

/// GET /api/v1/binders/:school_id/:grade/pages/:page_index
///
/// Also kicks off artwork prefetch for the next few pages.
pub async fn handle_get_page(
    State(state): State<AppState>,
    Path((school_id, grade, page_index)): Path<(Uuid, String, i32)>,
) -> Result<Json<PageView>, AppError> {
    check_page_index(page_index)?;
    let key = BinderKey::new(school_id, grade);
    let selections = state.sessions.selections(&key).await?;

    let content = compute_current_page_content(&selections, page_index);
    let upcoming: Vec<String> = (page_index + 1..=page_index + state.config.prefetch_ahead)
        .filter(|p| *p < MAX_PAGES)
        .flat_map(|p| {
            compute_current_page_content(&selections, p)
                .codes()
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect();
    state.assets.prefetch(upcoming);

    Ok(Json(PageView {
        page_index,
        replaceable: content.is_replaceable(),
        content,
    }))
}

/// POST /api/v1/binders/:school_id/:grade/selections
///
/// Adds or replaces a rhyme. The page count comes from the catalog, never the client.
pub async fn handle_add_selection(
    State(state): State<AppState>,
    Path((school_id, grade)): Path<(Uuid, String)>,
    Json(request): Json<AddSelectionRequest>,
) -> Result<Json<PlanResponse>, AppError> {
    if request.rhyme_code.trim().is_empty() {
        return Err(AppError::Validation("rhyme_code cannot be empty".to_string()));
    }
    if let Some(page_index) = request.page_index {
        check_page_index(page_index)?;
    }
    let current_page = check_current_page(request.current_page)?;
    let rhyme = state
        .catalog
        .lookup(&request.rhyme_code)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Rhyme '{}' not found", request.rhyme_code)))?;

    let key = BinderKey::new(school_id, grade);
    let plan = state
        .sessions
        .place(
            &key,
            &PlacementRequest {
                code: rhyme.code,
                pages: rhyme.pages,
                page_index: request.page_index,
                position: request.position,
            },
        )
        .await?;

    let current_page = current_page.max(plan.navigate_to);
    Ok(Json(plan_response(plan, current_page)))
}

/// DELETE /api/v1/binders/:school_id/:grade/pages/:page_index
pub async fn handle_remove_selection(
    State(state): State<AppState>,
    Path((school_id, grade, page_index)): Path<(Uuid, String, i32)>,
    Query(query): Query<PositionQuery>,
) -> Result<Json<RemovalResponse>, AppError> {
    check_page_index(page_index)?;
    let key = BinderKey::new(school_id, grade);
    let removal = state
        .sessions
        .remove(&key, page_index, query.position)
        .await?;

    Ok(Json(RemovalResponse {
        removed: removal.removed,
        view: binder_view(removal.selections, page_index),
    }))
}

/// POST /api/v1/binders/:school_id/:grade/pages/:page_index/swap
pub async fn handle_swap_halves(
    State(state): State<AppState>,
    Path((school_id, grade, page_index)): Path<(Uuid, String, i32)>,
) -> Result<Json<PageView>, AppError> {
    check_page_index(page_index)?;
    let key = BinderKey::new(school_id, grade);
    let swapped = state.sessions.swap(&key, page_index).await?;
    let content = compute_current_page_content(&swapped, page_index);

    Ok(Json(PageView {
        page_index,
        replaceable: content.is_replaceable(),
        content,
    }))
}

/// POST /api/v1/binders/:school_id/:grade/refresh
///
/// Replaces the local list with the store's view.
pub async fn handle_refresh(
    State(state): State<AppState>,
    Path((school_id, grade)): Path<(Uuid, String)>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<BinderView>, AppError> {
    let current_page = check_current_page(query.current_page)?;
    let key = BinderKey::new(school_id, grade);
    let selections = state.sessions.refresh(&key).await?;
    Ok(Json(binder_view(selections, current_page)))
}

/// GET /api/v1/binders/:school_id/:grade/notices
pub async fn handle_drain_notices(
    State(state): State<AppState>,
    Path((school_id, grade)): Path<(Uuid, String)>,
) -> Result<Json<Vec<Notice>>, AppError> {
    let key = BinderKey::new(school_id, grade);
    Ok(Json(state.sessions.drain_notices(&key).await?))
}

/// POST /api/v1/layout/plan
///
/// Stateless planning over a client-supplied list. Nothing is stored.
pub async fn handle_plan_preview(
    Json(request): Json<PlanPreviewRequest>,
) -> Result<Json<PlanResponse>, AppError> {
    if let Some(page_index) = request.placement.page_index {
        check_page_index(page_index)?;
    }
    let current_page = check_current_page(request.current_page)?;
    let plan = plan_selection(&request.selections, &request.placement)?;
    let current_page = current_page.max(plan.navigate_to);
    Ok(Json(plan_response(plan, current_page)))
}

// ────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ────────────────────────────────────────────────────────────────────────────

fn check_page_index(page_index: i32) -> Result<(), AppError> {
    if !(0..MAX_PAGES).contains(&page_index) {
        return Err(AppError::Validation(format!(
            "page_index must be between 0 and {}",
            MAX_PAGES - 1
        )));
    }
    Ok(())
}

/// Viewed page from a query or body; defaults to the first page.
fn check_current_page(current_page: Option<i32>) -> Result<i32, AppError> {
    let current_page = current_page.unwrap_or(0);
    if !(0..MAX_PAGES).contains(&current_page) {
        return Err(AppError::Validation(format!(
            "current_page must be between 0 and {}",
            MAX_PAGES - 1
        )));
    }
    Ok(current_page)
}

fn binder_view(selections: Vec<Selection>, current_page: i32) -> BinderView {
    let usage = compute_page_usage(&selections);
    let next_available = find_next_available_page(&usage);
    let issues = audit_selections(&selections);
    if !issues.is_empty() {
        warn!("Binder has {} selection issue(s): {issues:?}", issues.len());
    }

    BinderView {
        total_pages: total_pages(&usage, &next_available, current_page),
        selections,
        usage,
        next_available,
        issues,
    }
}

fn plan_response(plan: SelectionPlan, current_page: i32) -> PlanResponse {
    let usage = compute_page_usage(&plan.selections);
    PlanResponse {
        total_pages: total_pages(&usage, &plan.next_available, current_page),
        plan,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::store::memory::MemorySelectionStore;
    use crate::binder::store::SelectionStore;
    use std::sync::Arc;

    fn test_state() -> (Arc<MemorySelectionStore>, AppState) {
        let store = Arc::new(MemorySelectionStore::default());
        (store.clone(), AppState::for_tests(store))
    }

    fn add_request(code: &str, page_index: Option<i32>) -> AddSelectionRequest {
        AddSelectionRequest {
            rhyme_code: code.to_string(),
            page_index,
            position: None,
            current_page: None,
        }
    }

    #[tokio::test]
    async fn test_add_uses_catalog_pages() {
        let (_store, state) = test_state();
        let school = Uuid::new_v4();
        let Json(resp) = handle_add_selection(
            State(state.clone()),
            Path((school, "k1".to_string())),
            Json(add_request("old-macdonald", None)),
        )
        .await
        .unwrap();
        assert_eq!(resp.plan.placed.pages, 3.0);
        assert_eq!(resp.plan.placed.page_index, 0);
        assert_eq!(resp.plan.navigate_to, 3);
        assert_eq!(resp.total_pages, 4);
    }

    #[tokio::test]
    async fn test_add_unknown_rhyme_is_not_found() {
        let (_store, state) = test_state();
        let err = handle_add_selection(
            State(state),
            Path((Uuid::new_v4(), "k1".to_string())),
            Json(add_request("no-such-rhyme", None)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_page_view_reports_continuation() {
        let (_store, state) = test_state();
        let school = Uuid::new_v4();
        handle_add_selection(
            State(state.clone()),
            Path((school, "k1".to_string())),
            Json(add_request("old-macdonald", Some(5))),
        )
        .await
        .unwrap();

        let Json(page) = handle_get_page(State(state), Path((school, "k1".to_string(), 7)))
            .await
            .unwrap();
        assert!(!page.replaceable);
        assert!(matches!(
            page.content,
            PageContent::MultiPage {
                offset: 2,
                total: 3,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_page_out_of_range_is_rejected() {
        let (_store, state) = test_state();
        let err = handle_get_page(State(state), Path((Uuid::new_v4(), "k1".to_string(), 44)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_swap_and_remove_round_trip() {
        let (_store, state) = test_state();
        let school = Uuid::new_v4();
        for code in ["jack-and-jill", "humpty-dumpty"] {
            handle_add_selection(
                State(state.clone()),
                Path((school, "k1".to_string())),
                Json(add_request(code, None)),
            )
            .await
            .unwrap();
        }

        let Json(page) =
            handle_swap_halves(State(state.clone()), Path((school, "k1".to_string(), 0)))
                .await
                .unwrap();
        match page.content {
            PageContent::HalfPages { top, bottom, .. } => {
                assert_eq!(top.map(|s| s.code).as_deref(), Some("humpty-dumpty"));
                assert_eq!(bottom.map(|s| s.code).as_deref(), Some("jack-and-jill"));
            }
            other => panic!("expected HalfPages, got {other:?}"),
        }

        let Json(removal) = handle_remove_selection(
            State(state),
            Path((school, "k1".to_string(), 0)),
            Query(PositionQuery {
                position: Some(SlotPosition::Top),
            }),
        )
        .await
        .unwrap();
        assert_eq!(removal.removed[0].code, "humpty-dumpty");
        assert_eq!(removal.view.selections.len(), 1);
    }

    #[tokio::test]
    async fn test_swap_single_half_is_conflict() {
        let (_store, state) = test_state();
        let school = Uuid::new_v4();
        handle_add_selection(
            State(state.clone()),
            Path((school, "k1".to_string())),
            Json(add_request("jack-and-jill", Some(2))),
        )
        .await
        .unwrap();
        let err = handle_swap_halves(State(state), Path((school, "k1".to_string(), 2)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Layout(crate::layout::LayoutError::NoSwapPossible { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_persistence_surfaces_as_notice() {
        let (store, state) = test_state();
        store.set_failing(true);
        let school = Uuid::new_v4();
        handle_add_selection(
            State(state.clone()),
            Path((school, "k1".to_string())),
            Json(add_request("twinkle", None)),
        )
        .await
        .unwrap();

        let Json(view) = handle_refresh(
            State(state.clone()),
            Path((school, "k1".to_string())),
            Query(ViewQuery::default()),
        )
        .await
        .unwrap();
        assert!(view.selections.is_empty());

        let Json(notices) = handle_drain_notices(State(state), Path((school, "k1".to_string())))
            .await
            .unwrap();
        assert_eq!(notices.len(), 1);
    }

    #[tokio::test]
    async fn test_plan_preview_is_stateless() {
        let Json(resp) = handle_plan_preview(Json(PlanPreviewRequest {
            selections: vec![
                Selection::new(2, "jack", 0.5).at(SlotPosition::Top),
                Selection::new(2, "jill", 0.5).at(SlotPosition::Bottom),
            ],
            placement: PlacementRequest {
                code: "twinkle".to_string(),
                pages: 1.0,
                page_index: Some(2),
                position: None,
            },
            current_page: None,
        }))
        .await
        .unwrap();
        assert!(resp.plan.is_replacement);
        assert_eq!(resp.plan.removed.len(), 2);
        assert_eq!(resp.plan.navigate_to, 2);
        assert_eq!(resp.total_pages, 3);
    }

    #[tokio::test]
    async fn test_add_with_extreme_page_index_is_rejected() {
        let (store, state) = test_state();
        let school = Uuid::new_v4();
        let err = handle_add_selection(
            State(state.clone()),
            Path((school, "k1".to_string())),
            Json(add_request("twinkle", Some(i32::MAX))),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut request = add_request("twinkle", None);
        request.current_page = Some(-1);
        let err = handle_add_selection(
            State(state),
            Path((school, "k1".to_string())),
            Json(request),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.fetch(school, "k1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_view_rejects_out_of_range_current_page() {
        let (_store, state) = test_state();
        let school = Uuid::new_v4();
        for current_page in [i32::MAX, MAX_PAGES, -1] {
            let err = handle_get_binder(
                State(state.clone()),
                Path((school, "k1".to_string())),
                Query(ViewQuery {
                    current_page: Some(current_page),
                }),
            )
            .await
            .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));

            let err = handle_refresh(
                State(state.clone()),
                Path((school, "k1".to_string())),
                Query(ViewQuery {
                    current_page: Some(current_page),
                }),
            )
            .await
            .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }

        let Json(view) = handle_get_binder(
            State(state),
            Path((school, "k1".to_string())),
            Query(ViewQuery {
                current_page: Some(MAX_PAGES - 1),
            }),
        )
        .await
        .unwrap();
        assert_eq!(view.total_pages, MAX_PAGES);
    }

    #[tokio::test]
    async fn test_plan_preview_rejects_extreme_inputs() {
        let preview = |page_index: Option<i32>, pages: f64, current_page: Option<i32>| {
            PlanPreviewRequest {
                selections: vec![Selection::new(0, "a", 1.0)],
                placement: PlacementRequest {
                    code: "huge".to_string(),
                    pages,
                    page_index,
                    position: None,
                },
                current_page,
            }
        };

        let err = handle_plan_preview(Json(preview(Some(i32::MAX), 1.0, None)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = handle_plan_preview(Json(preview(None, 1.0, Some(i32::MAX))))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = handle_plan_preview(Json(preview(None, 1e12, None)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Layout(crate::layout::LayoutError::MalformedSelection { .. })
        ));
    }

    #[test]
    fn test_binder_view_flags_untagged_halves() {
        let view = binder_view(vec![Selection::new(0, "jack", 0.5)], 0);
        assert_eq!(view.issues.len(), 1);
        assert_eq!(view.next_available.index, 0);
        assert_eq!(view.total_pages, 1);
    }
}
