use crate::dock::Dock;
use crate::grid::{AvailabilityGrid, Cell, Facility};
use crate::selection::{Rejection, Selection};
use crate::time::SlotTime;
use chrono::NaiveDate;
use proptest::prelude::*;
use std::sync::Arc;

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 9).unwrap()
}

pub fn time(s: &str) -> SlotTime {
    s.parse().unwrap()
}

/// Facility with the given dock ids and times; `breaks` must be among `times`.
pub fn facility(docks: &[&str], times: &[&str], breaks: &[&str]) -> Arc<Facility> {
    Arc::new(Facility {
        docks: docks.iter().map(|d| Dock::new(d, d, "Test Pack")).collect(),
        times: times.iter().map(|t| time(t)).collect(),
        breaks: breaks.iter().map(|t| time(t)).collect(),
    })
}

pub fn grid(facility: Arc<Facility>, disabled: &[(usize, usize)]) -> AvailabilityGrid {
    AvailabilityGrid::new(
        day(),
        facility,
        disabled.iter().map(|(r, c)| Cell::new(*r, *c)),
    )
}

pub fn default_grid(disabled: &[(usize, usize)]) -> AvailabilityGrid {
    grid(Arc::new(Facility::default()), disabled)
}

/// Picks the cells in order, stopping at the first rejection.
pub fn pick(
    selection: &mut Selection,
    grid: &AvailabilityGrid,
    cells: &[(usize, usize)],
) -> Result<(), Rejection> {
    cells
        .iter()
        .try_for_each(|(r, c)| selection.add(Cell::new(*r, *c), grid))
}

/// 4x7 default facility layout with a random disabled set.
pub fn arb_disabled() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..4usize, 0..7usize), 0..10)
}

pub fn arb_clicks() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..4usize, 0..7usize), 1..25)
}
