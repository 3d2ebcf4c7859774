// Rhyme-binder page allocator.
// Decides which page and half-page slot each selected rhyme occupies.
// Pure and synchronous: no I/O, no async, no shared state. Every screen and handler goes
// through this module; nothing else computes occupancy.

pub mod content;
pub mod planner;
pub mod selection;
pub mod usage;

use thiserror::Error;

// Re-export the public API consumed by the binder session and handlers.
pub use content::{compute_current_page_content, swap_half_page_order, PageContent};
pub use planner::{plan_selection, remove_selection, PlacementRequest, Removal, SelectionPlan};
pub use selection::{audit_selections, Selection, SelectionIssue, SlotPosition};
pub use usage::{
    compute_page_usage, find_next_available_page, total_pages, NextAvailable, PageUsage,
};

/// Number of physical pages in a binder. Valid page indices are `0..MAX_PAGES`.
pub const MAX_PAGES: i32 = 44;

/// Failures surfaced by the allocator. None of them leave partial state behind.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    /// A non-replacing add found no room, or would start or end past the last page.
    #[error("Binder is full: no room for '{code}' ({pages} pages)")]
    CapacityExceeded { code: String, pages: f64 },

    #[error("Cannot swap page {page_index}: expected two half-page rhymes in distinct slots, found {half_pages}")]
    NoSwapPossible { page_index: i32, half_pages: usize },

    #[error("Malformed selection '{code}' at page {page_index} (pages = {pages}): {reason}")]
    MalformedSelection {
        code: String,
        page_index: i32,
        pages: f64,
        reason: String,
    },

    /// Only the first page of a multi-page rhyme accepts a replacement.
    #[error("Page {page_index} continues '{code}' which starts on page {start_index}")]
    ContinuationPage {
        page_index: i32,
        start_index: i32,
        code: String,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
