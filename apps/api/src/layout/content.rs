//! Per-page view — what to render on one page, and reordering its two halves.

use serde::Serialize;

use crate::layout::selection::{
    normalize_order, resolve_positions, Footprint, Selection, SlotPosition,
};
use crate::layout::LayoutError;

/// What occupies a single binder page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageContent {
    Empty,
    /// One page of a multi-page rhyme. Only `offset == 0` accepts a replacement.
    MultiPage {
        selection: Selection,
        offset: i32,
        total: i32,
    },
    FullPage {
        selection: Selection,
    },
    /// Half-page rhymes placed by their explicit tag. Untagged ones are returned in
    /// `unplaced` for display only.
    HalfPages {
        top: Option<Selection>,
        bottom: Option<Selection>,
        unplaced: Vec<Selection>,
    },
}

impl PageContent {
    pub fn is_replaceable(&self) -> bool {
        !matches!(self, PageContent::MultiPage { offset, .. } if *offset > 0)
    }

    /// Codes of every rhyme shown on this page.
    pub fn codes(&self) -> Vec<&str> {
        match self {
            PageContent::Empty => vec![],
            PageContent::MultiPage { selection, .. } | PageContent::FullPage { selection } => {
                vec![selection.code.as_str()]
            }
            PageContent::HalfPages {
                top,
                bottom,
                unplaced,
            } => top
                .iter()
                .chain(bottom.iter())
                .chain(unplaced.iter())
                .map(|s| s.code.as_str())
                .collect(),
        }
    }
}

/// Resolves the content of `page_index`.
///
/// A multi-page rhyme covering the page wins, then a full-page rhyme starting on it, then
/// whatever half-page rhymes start on it. Half-page positions are never inferred here.
pub fn compute_current_page_content(selections: &[Selection], page_index: i32) -> PageContent {
    let valid = || {
        selections
            .iter()
            .filter_map(|s| s.footprint().ok().map(|fp| (s, fp)))
    };

    if let Some((sel, fp)) = valid().find(|(s, fp)| {
        matches!(fp, Footprint::Multi(_)) && s.covered_pages(*fp).contains(&page_index)
    }) {
        return PageContent::MultiPage {
            selection: sel.clone(),
            offset: page_index - sel.page_index,
            total: fp.span(),
        };
    }

    if let Some((sel, _)) =
        valid().find(|(s, fp)| *fp == Footprint::Full && s.page_index == page_index)
    {
        return PageContent::FullPage {
            selection: sel.clone(),
        };
    }

    let mut top = None;
    let mut bottom = None;
    let mut unplaced = Vec::new();
    for (sel, _) in valid().filter(|(s, fp)| fp.is_half() && s.page_index == page_index) {
        match sel.position {
            Some(SlotPosition::Top) if top.is_none() => top = Some(sel.clone()),
            Some(SlotPosition::Bottom) if bottom.is_none() => bottom = Some(sel.clone()),
            _ => unplaced.push(sel.clone()),
        }
    }

    if top.is_none() && bottom.is_none() && unplaced.is_empty() {
        PageContent::Empty
    } else {
        PageContent::HalfPages {
            top,
            bottom,
            unplaced,
        }
    }
}

/// Exchanges the slots of the two half-page rhymes on `page_index`.
///
/// Requires exactly two half-page rhymes with distinct resolved positions. Both come back
/// explicitly tagged. Applying it twice restores the original slots.
pub fn swap_half_page_order(
    selections: &[Selection],
    page_index: i32,
) -> Result<Vec<Selection>, LayoutError> {
    let positions = resolve_positions(selections);
    let halves: Vec<(usize, SlotPosition)> = selections
        .iter()
        .zip(&positions)
        .enumerate()
        .filter(|(_, (sel, _))| sel.page_index == page_index)
        .filter_map(|(i, (_, pos))| pos.map(|p| (i, p)))
        .collect();

    let (first, first_pos, second, second_pos) = match halves.as_slice() {
        [(a, a_pos), (b, b_pos)] => (*a, *a_pos, *b, *b_pos),
        _ => {
            return Err(LayoutError::NoSwapPossible {
                page_index,
                half_pages: halves.len(),
            })
        }
    };
    if first_pos == second_pos {
        return Err(LayoutError::NoSwapPossible {
            page_index,
            half_pages: 2,
        });
    }

    let mut swapped = selections.to_vec();
    swapped[first].position = Some(second_pos);
    swapped[second].position = Some(first_pos);
    normalize_order(&mut swapped);
    Ok(swapped)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn half_page_pair() -> Vec<Selection> {
        vec![
            Selection::new(2, "jack", 0.5).at(SlotPosition::Top),
            Selection::new(2, "jill", 0.5).at(SlotPosition::Bottom),
        ]
    }

    // ── compute_current_page_content ────────────────────────────────────────

    #[test]
    fn test_empty_page() {
        assert_eq!(compute_current_page_content(&[], 0), PageContent::Empty);
    }

    #[test]
    fn test_multi_page_offset_and_total() {
        let sels = vec![Selection::new(5, "epic", 3.0)];
        let content = compute_current_page_content(&sels, 7);
        assert_eq!(
            content,
            PageContent::MultiPage {
                selection: sels[0].clone(),
                offset: 2,
                total: 3,
            }
        );
        assert!(!content.is_replaceable());
        assert!(compute_current_page_content(&sels, 5).is_replaceable());
        assert_eq!(compute_current_page_content(&sels, 8), PageContent::Empty);
    }

    #[test]
    fn test_full_page_content() {
        let sels = vec![Selection::new(1, "bo-peep", 1.0)];
        assert_eq!(
            compute_current_page_content(&sels, 1),
            PageContent::FullPage {
                selection: sels[0].clone()
            }
        );
    }

    #[test]
    fn test_half_pages_placed_by_tag() {
        let sels = vec![
            Selection::new(2, "jill", 0.5).at(SlotPosition::Bottom),
            Selection::new(2, "jack", 0.5).at(SlotPosition::Top),
        ];
        match compute_current_page_content(&sels, 2) {
            PageContent::HalfPages {
                top,
                bottom,
                unplaced,
            } => {
                assert_eq!(top.map(|s| s.code), Some("jack".to_string()));
                assert_eq!(bottom.map(|s| s.code), Some("jill".to_string()));
                assert!(unplaced.is_empty());
            }
            other => panic!("expected HalfPages, got {other:?}"),
        }
    }

    #[test]
    fn test_untagged_half_is_left_unplaced() {
        let sels = vec![Selection::new(2, "jack", 0.5)];
        match compute_current_page_content(&sels, 2) {
            PageContent::HalfPages {
                top,
                bottom,
                unplaced,
            } => {
                assert!(top.is_none());
                assert!(bottom.is_none());
                assert_eq!(unplaced, sels);
            }
            other => panic!("expected HalfPages, got {other:?}"),
        }
    }

    #[test]
    fn test_codes_lists_every_occupant() {
        let content = compute_current_page_content(&half_page_pair(), 2);
        assert_eq!(content.codes(), vec!["jack", "jill"]);
    }

    // ── swap_half_page_order ────────────────────────────────────────────────

    #[test]
    fn test_swap_exchanges_positions() {
        let swapped = swap_half_page_order(&half_page_pair(), 2).unwrap();
        assert_eq!(swapped[0].code, "jill");
        assert_eq!(swapped[0].position, Some(SlotPosition::Top));
        assert_eq!(swapped[1].code, "jack");
        assert_eq!(swapped[1].position, Some(SlotPosition::Bottom));
    }

    #[test]
    fn test_swap_is_an_involution() {
        let original = half_page_pair();
        let once = swap_half_page_order(&original, 2).unwrap();
        let twice = swap_half_page_order(&once, 2).unwrap();
        assert_eq!(twice, original);
    }

    #[test]
    fn test_swap_with_single_half_fails() {
        let sels = vec![Selection::new(2, "jack", 0.5).at(SlotPosition::Top)];
        let err = swap_half_page_order(&sels, 2).unwrap_err();
        assert_eq!(
            err,
            LayoutError::NoSwapPossible {
                page_index: 2,
                half_pages: 1
            }
        );
    }

    #[test]
    fn test_swap_with_colliding_positions_fails() {
        let sels = vec![
            Selection::new(2, "jack", 0.5).at(SlotPosition::Top),
            Selection::new(2, "jill", 0.5).at(SlotPosition::Top),
        ];
        assert!(matches!(
            swap_half_page_order(&sels, 2),
            Err(LayoutError::NoSwapPossible { half_pages: 2, .. })
        ));
    }

    #[test]
    fn test_swap_tags_untagged_sibling() {
        let sels = vec![
            Selection::new(2, "jack", 0.5),
            Selection::new(2, "jill", 0.5).at(SlotPosition::Bottom),
        ];
        let swapped = swap_half_page_order(&sels, 2).unwrap();
        assert_eq!(swapped[0].code, "jill");
        assert_eq!(swapped[0].position, Some(SlotPosition::Top));
        assert_eq!(swapped[1].position, Some(SlotPosition::Bottom));
    }

    #[test]
    fn test_swap_on_full_page_fails() {
        let sels = vec![Selection::new(2, "bo-peep", 1.0)];
        assert!(swap_half_page_order(&sels, 2).is_err());
    }
}
