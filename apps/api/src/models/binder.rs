use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::layout::{Selection, SlotPosition};

/// Slot value stored for full and multi-page rhymes.
pub const FULL_SLOT: &str = "full";

/// One row of `binder_selections` joined with the catalog's page count.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SelectionRow {
    pub page_index: i32,
    pub rhyme_code: String,
    pub slot: String,
    pub pages: f64,
}

impl From<SelectionRow> for Selection {
    fn from(row: SelectionRow) -> Self {
        Selection {
            page_index: row.page_index,
            code: row.rhyme_code,
            pages: row.pages,
            position: parse_slot(&row.slot),
        }
    }
}

pub fn slot_name(position: Option<SlotPosition>) -> &'static str {
    position.map(SlotPosition::as_str).unwrap_or(FULL_SLOT)
}

pub fn parse_slot(slot: &str) -> Option<SlotPosition> {
    match slot {
        "top" => Some(SlotPosition::Top),
        "bottom" => Some(SlotPosition::Bottom),
        _ => None,
    }
}
