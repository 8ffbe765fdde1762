use crate::grid::{AvailabilityGrid, Cell};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

pub const MAX_SELECTIONS: usize = 3;

/// Why a candidate cell cannot join the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Slot is not available")]
    Unavailable,
    #[error("Slot is already selected")]
    AlreadySelected,
    #[error("Select up to 3 slots as maximum")]
    MaxSlots,
    #[error("Please select slots in the same vertical or horizontal")]
    NotAligned,
    #[error("Cannot select across occupied slots")]
    SpansOccupied,
    #[error("Please select consecutive slots")]
    NotConsecutive,
}

/// Axis a run of two or more cells lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal { row: usize },
    Vertical { col: usize },
}

impl Orientation {
    /// Position of `cell` along the varying axis.
    pub fn index(&self, cell: Cell) -> usize {
        match self {
            Orientation::Horizontal { .. } => cell.col,
            Orientation::Vertical { .. } => cell.row,
        }
    }

    pub fn cell_at(&self, index: usize) -> Cell {
        match *self {
            Orientation::Horizontal { row } => Cell::new(row, index),
            Orientation::Vertical { col } => Cell::new(index, col),
        }
    }

    pub fn holds(&self, cell: Cell) -> bool {
        match *self {
            Orientation::Horizontal { row } => cell.row == row,
            Orientation::Vertical { col } => cell.col == col,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Added,
    Removed,
}

/// Cells picked by the current user for the displayed date, in pick order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    cells: Vec<Cell>,
}

impl Selection {
    pub fn new() -> Selection {
        Selection::default()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn orientation(&self) -> Option<Orientation> {
        fixed_orientation(&self.cells)
    }

    /// Deselects a picked cell, or validates and appends a new one.
    pub fn toggle(&mut self, cell: Cell, grid: &AvailabilityGrid) -> Result<Toggle, Rejection> {
        if let Some(pos) = self.cells.iter().position(|c| *c == cell) {
            self.cells.remove(pos);
            return Ok(Toggle::Removed);
        }
        self.add(cell, grid)?;
        Ok(Toggle::Added)
    }

    pub fn add(&mut self, cell: Cell, grid: &AvailabilityGrid) -> Result<(), Rejection> {
        if let Err(rejection) = can_select(&self.cells, cell, grid) {
            debug!(%cell, %rejection, "selection rejected");
            return Err(rejection);
        }
        self.cells.push(cell);
        Ok(())
    }

    /// Drops every cell that became disabled since it was picked and returns
    /// the dropped cells in pick order.
    pub fn prune_disabled(&mut self, grid: &AvailabilityGrid) -> Vec<Cell> {
        let (conflicted, still_valid): (Vec<Cell>, Vec<Cell>) = self
            .cells
            .iter()
            .partition(|c| grid.is_disabled(c.row, c.col));
        self.cells = still_valid;
        conflicted
    }
}

/// Orientation shared by all of `cells`, once there are at least two.
fn fixed_orientation(cells: &[Cell]) -> Option<Orientation> {
    let (first, rest) = cells.split_first()?;
    if rest.is_empty() {
        return None;
    }
    if rest.iter().all(|c| c.row == first.row) {
        Some(Orientation::Horizontal { row: first.row })
    } else if rest.iter().all(|c| c.col == first.col) {
        Some(Orientation::Vertical { col: first.col })
    } else {
        None
    }
}

/// Decides whether `candidate` may join `selection` so that the picked cells
/// stay a single unbroken run of available cells along one axis.
///
/// Break columns are transparent to the run. Disabled cells are never
/// skipped: a run may not span one unless it is itself picked.
pub fn can_select(
    selection: &[Cell],
    candidate: Cell,
    grid: &AvailabilityGrid,
) -> Result<(), Rejection> {
    if !grid.is_available(candidate) {
        return Err(Rejection::Unavailable);
    }
    let Some(first) = selection.first() else {
        return Ok(());
    };
    if selection.len() >= MAX_SELECTIONS {
        return Err(Rejection::MaxSlots);
    }
    if selection.contains(&candidate) {
        return Err(Rejection::AlreadySelected);
    }

    let orientation = match fixed_orientation(selection) {
        None if selection.len() == 1 => {
            match (candidate.row == first.row, candidate.col == first.col) {
                (true, false) => Orientation::Horizontal { row: first.row },
                (false, true) => Orientation::Vertical { col: first.col },
                _ => return Err(Rejection::NotAligned),
            }
        }
        Some(fixed) if fixed.holds(candidate) => fixed,
        _ => return Err(Rejection::NotAligned),
    };

    check_run(selection, candidate, orientation, grid)
}

fn check_run(
    selection: &[Cell],
    candidate: Cell,
    orientation: Orientation,
    grid: &AvailabilityGrid,
) -> Result<(), Rejection> {
    let chosen = selection
        .iter()
        .chain(std::iter::once(&candidate))
        .map(|c| orientation.index(*c))
        .collect::<BTreeSet<usize>>();
    let (Some(&lo), Some(&hi)) = (chosen.first(), chosen.last()) else {
        return Ok(());
    };
    let horizontal = matches!(orientation, Orientation::Horizontal { .. });

    for i in lo..=hi {
        if horizontal && grid.is_break(i) {
            continue;
        }
        let cell = orientation.cell_at(i);
        if grid.is_disabled(cell.row, cell.col) && !chosen.contains(&i) {
            return Err(Rejection::SpansOccupied);
        }
    }

    let gap = (lo..=hi)
        .filter(|i| grid.is_available(orientation.cell_at(*i)))
        .any(|i| !chosen.contains(&i));
    if gap {
        return Err(Rejection::NotConsecutive);
    }

    Ok(())
}
