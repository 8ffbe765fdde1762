use crate::dock::Dock;
use crate::time::SlotTime;
use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Static layout of the loading area: which docks exist and at which times
/// of day they can be booked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facility {
    pub docks: Vec<Dock>,
    pub times: Vec<SlotTime>,
    #[serde(default)]
    pub breaks: Vec<SlotTime>,
}

impl Default for Facility {
    fn default() -> Self {
        Facility {
            docks: vec![
                Dock::new("A1", "A1", "APC Pack"),
                Dock::new("A2", "A2", "APC Pack"),
                Dock::new("B3", "B3", "Maker Pack"),
                Dock::new("C4", "C4", "F/L Unload"),
            ],
            times: vec![
                SlotTime::hm(7, 30),
                SlotTime::hm(9, 0),
                SlotTime::hm(10, 30),
                SlotTime::hm(12, 0),
                SlotTime::hm(13, 0),
                SlotTime::hm(14, 30),
                SlotTime::hm(16, 0),
            ],
            breaks: vec![SlotTime::hm(12, 0)],
        }
    }
}

impl Facility {
    pub fn rows(&self) -> usize {
        self.docks.len()
    }

    pub fn cols(&self) -> usize {
        self.times.len()
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.row < self.rows() && cell.col < self.cols()
    }

    pub fn is_break(&self, col: usize) -> bool {
        self.times
            .get(col)
            .is_some_and(|time| self.breaks.contains(time))
    }

    pub fn dock_index(&self, key: &str) -> Option<usize> {
        self.docks.iter().position(|d| d.matches(key))
    }

    pub fn time_index(&self, time: SlotTime) -> Option<usize> {
        self.times.iter().position(|t| *t == time)
    }

    /// Cell of a dock (id or label) at a slot time.
    pub fn cell_of(&self, dock: &str, time: SlotTime) -> Option<Cell> {
        Some(Cell::new(self.dock_index(dock)?, self.time_index(time)?))
    }

    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.rows()).flat_map(move |row| (0..self.cols()).map(move |col| Cell::new(row, col)))
    }
}

/// One (dock row, time column) pair of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub fn new(row: usize, col: usize) -> Cell {
        Cell { row, col }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStatus {
    Break,
    Disabled,
    Selected,
    Open,
}

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

/// Availability of every cell for one calendar date.
///
/// The disabled set is the only state that outlives the grid (it is written
/// back to the data source when the grid is replaced). Interest counters and
/// the transient booking flags belong to this instance and die with it.
#[derive(Debug)]
pub struct AvailabilityGrid {
    date: NaiveDate,
    facility: Arc<Facility>,
    disabled: BTreeSet<Cell>,
    interest: HashMap<Cell, u32>,
    active: HashSet<Cell>,
    transitioning: HashSet<Cell>,
    epoch: u64,
}

impl AvailabilityGrid {
    pub fn new(
        date: NaiveDate,
        facility: Arc<Facility>,
        disabled: impl IntoIterator<Item = Cell>,
    ) -> AvailabilityGrid {
        // break status always wins over disabled
        let disabled = disabled
            .into_iter()
            .filter(|c| facility.contains(*c) && !facility.is_break(c.col))
            .collect();
        AvailabilityGrid {
            date,
            facility,
            disabled,
            interest: HashMap::new(),
            active: HashSet::new(),
            transitioning: HashSet::new(),
            epoch: NEXT_EPOCH.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn facility(&self) -> &Arc<Facility> {
        &self.facility
    }

    /// Identity of this grid instance; a replaced grid never shares it.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn rows(&self) -> usize {
        self.facility.rows()
    }

    pub fn cols(&self) -> usize {
        self.facility.cols()
    }

    pub fn is_break(&self, col: usize) -> bool {
        self.facility.is_break(col)
    }

    pub fn is_disabled(&self, row: usize, col: usize) -> bool {
        self.disabled.contains(&Cell::new(row, col))
    }

    /// Inside the grid, not a break and not disabled.
    pub fn is_available(&self, cell: Cell) -> bool {
        self.facility.contains(cell)
            && !self.is_break(cell.col)
            && !self.is_disabled(cell.row, cell.col)
    }

    /// Returns whether the cell was newly disabled. Break and out-of-range
    /// cells are left alone.
    pub fn mark_disabled(&mut self, row: usize, col: usize) -> bool {
        let cell = Cell::new(row, col);
        if !self.facility.contains(cell) || self.is_break(col) {
            return false;
        }
        self.disabled.insert(cell)
    }

    /// Frees a booked cell again. Returns whether it was disabled.
    pub fn release(&mut self, cell: Cell) -> bool {
        self.disabled.remove(&cell)
    }

    pub fn disabled(&self) -> &BTreeSet<Cell> {
        &self.disabled
    }

    pub fn status(&self, cell: Cell, selection: &[Cell]) -> CellStatus {
        if self.is_break(cell.col) {
            CellStatus::Break
        } else if self.is_disabled(cell.row, cell.col) {
            CellStatus::Disabled
        } else if selection.contains(&cell) {
            CellStatus::Selected
        } else {
            CellStatus::Open
        }
    }

    pub fn interest(&self, cell: Cell) -> u32 {
        self.interest.get(&cell).copied().unwrap_or(0)
    }

    pub fn set_interest(&mut self, cell: Cell, count: u32) {
        if count == 0 {
            self.interest.remove(&cell);
        } else {
            self.interest.insert(cell, count);
        }
    }

    pub fn clear_interest(&mut self, cell: Cell) {
        self.interest.remove(&cell);
    }

    /// Gives each open cell a `probability` chance of starting with
    /// `1..=max` interested users.
    pub fn seed_interest<R: Rng>(&mut self, rng: &mut R, probability: f64, max: u32) {
        self.interest.clear();
        let open = self
            .facility
            .cells()
            .filter(|c| self.is_available(*c))
            .collect::<Vec<_>>();
        for cell in open {
            if rng.random_bool(probability) {
                self.interest.insert(cell, rng.random_range(1..=max.max(1)));
            }
        }
    }

    /// Open cells with a nonzero interest count that nobody is booking yet,
    /// in row-major order.
    pub fn popular_cells(&self) -> Vec<Cell> {
        let mut cells = self
            .interest
            .iter()
            .filter(|(cell, count)| **count > 0 && self.is_idle(**cell))
            .map(|(cell, _)| *cell)
            .collect::<Vec<_>>();
        cells.sort();
        cells
    }

    pub fn has_popular_cells(&self) -> bool {
        self.interest
            .iter()
            .any(|(cell, count)| *count > 0 && self.is_idle(*cell))
    }

    /// Available and not currently being booked by a simulated user.
    pub fn is_idle(&self, cell: Cell) -> bool {
        self.is_available(cell) && !self.active.contains(&cell) && !self.transitioning.contains(&cell)
    }

    pub fn set_active(&mut self, cell: Cell, active: bool) {
        if active {
            self.active.insert(cell);
        } else {
            self.active.remove(&cell);
        }
    }

    pub fn is_active(&self, cell: Cell) -> bool {
        self.active.contains(&cell)
    }

    pub fn set_transitioning(&mut self, cell: Cell, transitioning: bool) {
        if transitioning {
            self.transitioning.insert(cell);
        } else {
            self.transitioning.remove(&cell);
        }
    }

    pub fn is_transitioning(&self, cell: Cell) -> bool {
        self.transitioning.contains(&cell)
    }

    /// Drops the transient booking flags, e.g. after the simulator stopped.
    pub fn clear_activity(&mut self) {
        self.active.clear();
        self.transitioning.clear();
    }

    /// `"<time> - <dock label> (<dock info>)"`
    pub fn describe(&self, cell: Cell) -> Option<String> {
        let dock = self.facility.docks.get(cell.row)?;
        let time = self.facility.times.get(cell.col)?;
        Some(format!("{} - {}", time, dock))
    }
}

/// Pseudo-random disabled cells for `date`, seeded by the character codes
/// of its `YYYY-MM-DD` form. The same date always yields the same layout.
pub fn base_layout(date: NaiveDate, facility: &Facility) -> BTreeSet<Cell> {
    let seed = date
        .format("%Y-%m-%d")
        .to_string()
        .chars()
        .map(|c| c as u64)
        .sum::<u64>();
    facility
        .cells()
        .filter(|c| !facility.is_break(c.col))
        .filter(|c| layout_noise(seed, (c.row * 11 + c.col * 7) as u64) > 0.7)
        .collect()
}

fn layout_noise(seed: u64, index: u64) -> f64 {
    // remainder keeps the sign of the dividend, negative values never disable
    ((seed + index) as f64).sin() * 10000.0 % 1.0
}

#[cfg(test)]
mod tests {
    mod layout;
}
