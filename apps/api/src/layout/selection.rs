//! Selection model — one booked rhyme and the page footprint it consumes.
//!
//! Selections arrive from the catalog and the selection store as plain data. Nothing here
//! trusts them: `page_index` and `pages` are classified on every read, and entries that fail
//! classification are reported as `MalformedSelection` and skipped by the occupancy logic.

use serde::{Deserialize, Serialize};

use crate::layout::{LayoutError, MAX_PAGES};

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

/// Top or bottom half of a binder page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotPosition {
    Top,
    Bottom,
}

impl SlotPosition {
    /// Ordering weight used when normalizing a selection list (bottom sorts after top).
    pub fn weight(self) -> u8 {
        match self {
            SlotPosition::Top => 0,
            SlotPosition::Bottom => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            SlotPosition::Top => SlotPosition::Bottom,
            SlotPosition::Bottom => SlotPosition::Top,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SlotPosition::Top => "top",
            SlotPosition::Bottom => "bottom",
        }
    }
}

/// A single rhyme booking inside a binder.
///
/// `pages` is the catalog value verbatim (`0.5`, `1`, or an integer > 1).
/// `position` only means something for half-page rhymes; an absent tag resolves to `Top`
/// unless a sibling half-page rhyme on the same page already claims it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub page_index: i32,
    pub code: String,
    pub pages: f64,
    #[serde(default)]
    pub position: Option<SlotPosition>,
}

/// How much page space a selection consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "span", rename_all = "snake_case")]
pub enum Footprint {
    /// One half of a page (top or bottom slot).
    Half,
    /// Both slots of exactly one page.
    Full,
    /// Both slots of `n` consecutive pages, `2 <= n <= MAX_PAGES`.
    Multi(i32),
}

impl Footprint {
    /// Classifies a raw `pages` value. Returns `None` for values that cannot be placed,
    /// including spans longer than the whole binder.
    pub fn from_pages(pages: f64) -> Option<Self> {
        if !pages.is_finite() || pages <= 0.0 {
            return None;
        }
        if (pages - 0.5).abs() < f64::EPSILON {
            return Some(Footprint::Half);
        }
        let rounded = pages.round();
        if pages < 1.0 || rounded > f64::from(MAX_PAGES) {
            return None;
        }
        match rounded.max(1.0) as i32 {
            1 => Some(Footprint::Full),
            n => Some(Footprint::Multi(n)),
        }
    }

    /// Number of page indices this footprint touches. Always within `1..=MAX_PAGES`.
    pub fn span(self) -> i32 {
        match self {
            Footprint::Half | Footprint::Full => 1,
            Footprint::Multi(n) => n,
        }
    }

    pub fn is_half(self) -> bool {
        matches!(self, Footprint::Half)
    }
}

impl Selection {
    pub fn new(page_index: i32, code: impl Into<String>, pages: f64) -> Self {
        Self {
            page_index,
            code: code.into(),
            pages,
            position: None,
        }
    }

    pub fn at(mut self, position: SlotPosition) -> Self {
        self.position = Some(position);
        self
    }

    /// Footprint of a selection whose `page_index` and `pages` are both usable.
    pub fn footprint(&self) -> Result<Footprint, LayoutError> {
        if self.page_index < 0 || self.page_index >= MAX_PAGES {
            return Err(self.malformed("page_index outside the binder"));
        }
        Footprint::from_pages(self.pages).ok_or_else(|| self.malformed("unsupported pages value"))
    }

    /// Page indices covered by this selection, clamped to the binder.
    pub fn covered_pages(&self, footprint: Footprint) -> std::ops::Range<i32> {
        let end = self.page_index.saturating_add(footprint.span()).min(MAX_PAGES);
        self.page_index..end
    }

    pub fn covers(&self, page_index: i32) -> bool {
        match self.footprint() {
            Ok(fp) => self.covered_pages(fp).contains(&page_index),
            Err(_) => false,
        }
    }

    fn malformed(&self, reason: &str) -> LayoutError {
        LayoutError::MalformedSelection {
            code: self.code.clone(),
            page_index: self.page_index,
            pages: self.pages,
            reason: reason.to_string(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Position resolution and ordering
// ────────────────────────────────────────────────────────────────────────────

/// Resolves the slot of every half-page selection in the list (index-aligned).
///
/// Full and multi-page selections, and malformed entries, resolve to `None`.
/// An untagged half-page selection takes `Top` unless another half-page selection on the
/// same page is explicitly tagged `Top`, in which case it takes `Bottom`.
pub fn resolve_positions(selections: &[Selection]) -> Vec<Option<SlotPosition>> {
    selections
        .iter()
        .enumerate()
        .map(|(i, sel)| {
            if !matches!(sel.footprint(), Ok(Footprint::Half)) {
                return None;
            }
            if let Some(pos) = sel.position {
                return Some(pos);
            }
            let top_claimed = selections.iter().enumerate().any(|(j, other)| {
                j != i
                    && other.page_index == sel.page_index
                    && other.position == Some(SlotPosition::Top)
                    && matches!(other.footprint(), Ok(Footprint::Half))
            });
            Some(if top_claimed {
                SlotPosition::Bottom
            } else {
                SlotPosition::Top
            })
        })
        .collect()
}

/// Sorts selections by page index, then by slot weight (top before bottom). Stable.
pub fn normalize_order(selections: &mut [Selection]) {
    selections.sort_by_key(|s| {
        (
            s.page_index,
            s.position.map(SlotPosition::weight).unwrap_or(0),
        )
    });
}

// ────────────────────────────────────────────────────────────────────────────
// Audit
// ────────────────────────────────────────────────────────────────────────────

/// A problem found in a stored selection list. Reported, never auto-fixed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum SelectionIssue {
    Malformed { code: String, page_index: i32, reason: String },
    UntaggedHalfPage { code: String, page_index: i32 },
}

/// Flags malformed entries and half-page entries that rely on position inference.
pub fn audit_selections(selections: &[Selection]) -> Vec<SelectionIssue> {
    selections
        .iter()
        .filter_map(|sel| match sel.footprint() {
            Err(LayoutError::MalformedSelection { reason, .. }) => Some(SelectionIssue::Malformed {
                code: sel.code.clone(),
                page_index: sel.page_index,
                reason,
            }),
            Ok(Footprint::Half) if sel.position.is_none() => Some(SelectionIssue::UntaggedHalfPage {
                code: sel.code.clone(),
                page_index: sel.page_index,
            }),
            _ => None,
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
