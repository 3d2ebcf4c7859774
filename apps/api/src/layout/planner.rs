//! Selection planning — add, replace and remove rhymes without corrupting neighbours.
//!
//! Planning is pure: it takes the current list and returns a new one. The caller decides
//! whether to commit it. A rejected plan leaves nothing behind.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::layout::selection::{
    normalize_order, resolve_positions, Footprint, Selection, SlotPosition,
};
use crate::layout::usage::{
    compute_page_usage, find_first_fit, find_next_available_page, NextAvailable,
};
use crate::layout::{LayoutError, MAX_PAGES};

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

/// A request to place one rhyme. `page_index: None` means first-fit placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementRequest {
    pub code: String,
    pub pages: f64,
    #[serde(default)]
    pub page_index: Option<i32>,
    #[serde(default)]
    pub position: Option<SlotPosition>,
}

/// Outcome of a successful placement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionPlan {
    /// The full, normalized list to commit.
    pub selections: Vec<Selection>,
    pub placed: Selection,
    pub removed: Vec<Selection>,
    pub is_replacement: bool,
    /// First-fit state of the resulting list.
    pub next_available: NextAvailable,
    /// Where the view should go next: the placed page for replacements, otherwise the
    /// next available page.
    pub navigate_to: i32,
}

/// Outcome of an explicit removal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Removal {
    pub selections: Vec<Selection>,
    pub removed: Vec<Selection>,
}

// ────────────────────────────────────────────────────────────────────────────
// Planning
// ────────────────────────────────────────────────────────────────────────────

/// Plans the placement of a rhyme into the binder.
///
/// 1. Resolve the target page (first fit when absent) and, for half pages, the slot.
/// 2. Evict every occupant the new rhyme cannot coexist with.
/// 3. Reject non-replacing adds that do not fit in the binder.
/// 4. Return the normalized list with the first-fit state it leaves behind.
///
/// Capacity is judged on the list before the add, so a non-replacing add may fill the last
/// free slot. Targets outside `0..MAX_PAGES`, or spans running past the last page, are
/// `CapacityExceeded`.
pub fn plan_selection(
    selections: &[Selection],
    request: &PlacementRequest,
) -> Result<SelectionPlan, LayoutError> {
    let footprint =
        Footprint::from_pages(request.pages).ok_or_else(|| LayoutError::MalformedSelection {
            code: request.code.clone(),
            page_index: request.page_index.unwrap_or(-1),
            pages: request.pages,
            reason: "unsupported pages value".to_string(),
        })?;

    let usage = compute_page_usage(selections);
    let capacity_exceeded = || LayoutError::CapacityExceeded {
        code: request.code.clone(),
        pages: request.pages,
    };

    let (page_index, fitted_position) = match request.page_index {
        Some(page) => (page, None),
        None => {
            find_first_fit(&usage, footprint, request.position).ok_or_else(capacity_exceeded)?
        }
    };

    let span = footprint.span();
    if !(0..MAX_PAGES).contains(&page_index) || span > MAX_PAGES - page_index {
        return Err(capacity_exceeded());
    }

    if let Some(host) = selections.iter().find(|s| continues_over(s, page_index)) {
        return Err(LayoutError::ContinuationPage {
            page_index,
            start_index: host.page_index,
            code: host.code.clone(),
        });
    }

    let position = footprint
        .is_half()
        .then(|| fitted_position.or(request.position).unwrap_or(SlotPosition::Top));

    let placed = Selection {
        page_index,
        code: request.code.clone(),
        pages: request.pages,
        position,
    };

    // Evictions are decided against resolved positions so untagged entries are matched too.
    let positions = resolve_positions(selections);
    let (removed, kept): (Vec<_>, Vec<_>) = selections
        .iter()
        .cloned()
        .zip(positions)
        .partition(|(existing, existing_pos)| {
            displaced_by(existing, *existing_pos, page_index, span, footprint, position)
        });
    let removed: Vec<Selection> = removed.into_iter().map(|(s, _)| s).collect();
    let is_replacement = !removed.is_empty();

    if !is_replacement && !find_next_available_page(&usage).has_capacity {
        return Err(capacity_exceeded());
    }

    let mut next_list: Vec<Selection> = kept.into_iter().map(|(s, _)| s).collect();
    next_list.push(placed.clone());
    normalize_order(&mut next_list);

    let next_available = find_next_available_page(&compute_page_usage(&next_list));
    let navigate_to = if is_replacement {
        page_index
    } else {
        next_available.index
    };

    debug!(
        "Planned '{}' at page {} ({} removed, replacement={})",
        placed.code,
        page_index,
        removed.len(),
        is_replacement
    );

    Ok(SelectionPlan {
        selections: next_list,
        placed,
        removed,
        is_replacement,
        next_available,
        navigate_to,
    })
}

/// Removes the selection(s) occupying `page_index`.
///
/// For half pages only the occupant of `position` goes; without a position every occupant
/// of the page goes. A multi-page rhyme is removed from any page of its span.
pub fn remove_selection(
    selections: &[Selection],
    page_index: i32,
    position: Option<SlotPosition>,
) -> Removal {
    let positions = resolve_positions(selections);
    let (removed, kept): (Vec<_>, Vec<_>) = selections
        .iter()
        .cloned()
        .zip(positions)
        .partition(|(sel, resolved)| {
            sel.covers(page_index)
                && match (resolved, position) {
                    (Some(slot), Some(wanted)) => *slot == wanted,
                    _ => true,
                }
        });

    let mut selections: Vec<Selection> = kept.into_iter().map(|(s, _)| s).collect();
    normalize_order(&mut selections);

    Removal {
        selections,
        removed: removed.into_iter().map(|(s, _)| s).collect(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ────────────────────────────────────────────────────────────────────────────

/// True if `existing` is a multi-page rhyme whose span covers `page_index` past its first page.
fn continues_over(existing: &Selection, page_index: i32) -> bool {
    existing.page_index < page_index && existing.covers(page_index)
}

fn displaced_by(
    existing: &Selection,
    existing_pos: Option<SlotPosition>,
    page_index: i32,
    span: i32,
    footprint: Footprint,
    position: Option<SlotPosition>,
) -> bool {
    let Ok(existing_fp) = existing.footprint() else {
        return false;
    };

    if !footprint.is_half() {
        return (page_index..page_index + span).contains(&existing.page_index);
    }

    existing.page_index == page_index && (!existing_fp.is_half() || existing_pos == position)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
