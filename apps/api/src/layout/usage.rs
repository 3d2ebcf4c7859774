//! Occupancy — which slots of which pages are taken, and where the next free one is.
//!
//! The occupancy map is always rebuilt from the full selection list. It is never patched
//! incrementally.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::layout::selection::{resolve_positions, Footprint, Selection, SlotPosition};
use crate::layout::MAX_PAGES;

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

/// Occupancy of one page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotUsage {
    pub top: bool,
    pub bottom: bool,
}

impl SlotUsage {
    pub fn is_full(&self) -> bool {
        self.top && self.bottom
    }

    pub fn is_free(&self, position: SlotPosition) -> bool {
        match position {
            SlotPosition::Top => !self.top,
            SlotPosition::Bottom => !self.bottom,
        }
    }

    fn mark(&mut self, position: SlotPosition) {
        match position {
            SlotPosition::Top => self.top = true,
            SlotPosition::Bottom => self.bottom = true,
        }
    }
}

/// Occupancy map over every touched page, plus the touched bounds (`-1` when empty).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageUsage {
    pub pages: BTreeMap<i32, SlotUsage>,
    pub highest_index: i32,
    pub lowest_index: i32,
    /// Input positions of entries skipped as malformed.
    pub skipped: Vec<usize>,
}

impl PageUsage {
    pub fn slot(&self, page_index: i32) -> SlotUsage {
        self.pages.get(&page_index).copied().unwrap_or_default()
    }

    pub fn is_page_empty(&self, page_index: i32) -> bool {
        self.slot(page_index) == SlotUsage::default()
    }
}

/// Result of the first-fit scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextAvailable {
    pub has_capacity: bool,
    pub index: i32,
}

// ────────────────────────────────────────────────────────────────────────────
// Core functions
// ────────────────────────────────────────────────────────────────────────────

/// Builds the occupancy map for a selection list.
///
/// Half-page selections mark their resolved slot. Full and multi-page selections mark both
/// slots of every page they span, clamped to the binder. Malformed entries are skipped.
pub fn compute_page_usage(selections: &[Selection]) -> PageUsage {
    let positions = resolve_positions(selections);
    let mut pages: BTreeMap<i32, SlotUsage> = BTreeMap::new();
    let mut skipped = Vec::new();

    for (i, sel) in selections.iter().enumerate() {
        let footprint = match sel.footprint() {
            Ok(fp) => fp,
            Err(e) => {
                debug!("Skipping selection in occupancy map: {e}");
                skipped.push(i);
                continue;
            }
        };

        match (footprint, positions[i]) {
            (Footprint::Half, Some(pos)) => pages.entry(sel.page_index).or_default().mark(pos),
            _ => {
                for page in sel.covered_pages(footprint) {
                    let usage = pages.entry(page).or_default();
                    usage.top = true;
                    usage.bottom = true;
                }
            }
        }
    }

    let highest_index = pages.keys().next_back().copied().unwrap_or(-1);
    let lowest_index = pages.keys().next().copied().unwrap_or(-1);

    PageUsage {
        pages,
        highest_index,
        lowest_index,
        skipped,
    }
}

/// First-fit scan: the lowest page index with at least one free slot.
///
/// When the binder is packed, returns `has_capacity: false` with the highest touched page
/// (clamped into the binder) as an anchor for navigation. That index is never a write target.
pub fn find_next_available_page(usage: &PageUsage) -> NextAvailable {
    (0..MAX_PAGES)
        .find(|&page| !usage.slot(page).is_full())
        .map(|index| NextAvailable {
            has_capacity: true,
            index,
        })
        .unwrap_or(NextAvailable {
            has_capacity: false,
            index: usage.highest_index.clamp(0, MAX_PAGES - 1),
        })
}

/// First page (and slot, for half pages) where a new selection of `footprint` fits
/// without displacing anything.
///
/// Half pages take the hinted slot when it is free, otherwise top, otherwise bottom.
/// Full and multi-page items need a run of `span` entirely empty pages.
pub fn find_first_fit(
    usage: &PageUsage,
    footprint: Footprint,
    hint: Option<SlotPosition>,
) -> Option<(i32, Option<SlotPosition>)> {
    match footprint {
        Footprint::Half => (0..MAX_PAGES).find_map(|page| {
            let slot = usage.slot(page);
            let preferred = hint.unwrap_or(SlotPosition::Top);
            [preferred, preferred.other()]
                .into_iter()
                .find(|&pos| slot.is_free(pos))
                .map(|pos| (page, Some(pos)))
        }),
        Footprint::Full | Footprint::Multi(_) => {
            let span = footprint.span();
            (0..=MAX_PAGES - span)
                .find(|&start| (start..start + span).all(|p| usage.is_page_empty(p)))
                .map(|start| (start, None))
        }
    }
}

/// Number of pages the binder view should show.
///
/// Grows with content, never shrinks below the page being viewed, never exceeds the binder.
/// A `current_page` outside the binder is clamped into it.
pub fn total_pages(usage: &PageUsage, next: &NextAvailable, current_page: i32) -> i32 {
    let furthest = usage.highest_index.max(next.index).max(current_page);
    furthest.clamp(0, MAX_PAGES - 1) + 1
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
