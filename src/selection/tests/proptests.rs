use crate::grid::{AvailabilityGrid, Cell};
use crate::selection::tests::utils::{arb_clicks, arb_disabled, default_grid};
use crate::selection::{MAX_SELECTIONS, Orientation, Selection};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn span(selection: &Selection) -> Option<(Orientation, BTreeSet<usize>)> {
    let orientation = selection.orientation()?;
    let chosen = selection
        .cells()
        .iter()
        .map(|c| orientation.index(*c))
        .collect::<BTreeSet<_>>();
    Some((orientation, chosen))
}

fn cells_in_span(orientation: Orientation, chosen: &BTreeSet<usize>) -> Vec<(usize, Cell)> {
    let lo = *chosen.first().unwrap();
    let hi = *chosen.last().unwrap();
    (lo..=hi).map(|i| (i, orientation.cell_at(i))).collect()
}

fn check_accepted(selection: &Selection, grid: &AvailabilityGrid) -> Result<(), TestCaseError> {
    prop_assert!(selection.len() <= MAX_SELECTIONS, "selection grew to {}", selection.len());

    let Some((orientation, chosen)) = span(selection) else {
        prop_assert!(selection.len() <= 1, "unaligned selection {:?}", selection.cells());
        return Ok(());
    };

    for (i, cell) in cells_in_span(orientation, &chosen) {
        prop_assert!(
            !grid.is_disabled(cell.row, cell.col),
            "run {:?} spans disabled cell {}",
            selection.cells(),
            cell
        );
        prop_assert_eq!(
            grid.is_available(cell),
            chosen.contains(&i),
            "run {:?} has a gap at {}",
            selection.cells(),
            cell
        );
    }
    Ok(())
}

proptest! {
    #[test]
    fn test_accepted_selections_stay_contiguous_runs(
        disabled in arb_disabled(),
        clicks in arb_clicks(),
    ) {
        let grid = default_grid(&disabled);
        let mut selection = Selection::new();
        let mut locked: Option<Orientation> = None;

        for (row, col) in clicks {
            let before = selection.clone();
            match selection.add(Cell::new(row, col), &grid) {
                Ok(()) => {
                    check_accepted(&selection, &grid)?;
                    if let Some(fixed) = locked {
                        prop_assert_eq!(Some(fixed), selection.orientation());
                    }
                    locked = selection.orientation();
                }
                Err(_) => {
                    prop_assert_eq!(&before, &selection);
                }
            }
        }
    }

    #[test]
    fn test_spanning_a_disabled_cell_is_always_rejected(
        disabled in arb_disabled(),
        start in (0..4usize, 0..7usize),
        target in (0..4usize, 0..7usize),
    ) {
        let grid = default_grid(&disabled);
        let start = Cell::new(start.0, start.1);
        let target = Cell::new(target.0, target.1);
        prop_assume!(grid.is_available(start) && start != target);

        let orientation = if start.row == target.row {
            Orientation::Horizontal { row: start.row }
        } else if start.col == target.col {
            Orientation::Vertical { col: start.col }
        } else {
            return Ok(());
        };
        let lo = orientation.index(start).min(orientation.index(target));
        let hi = orientation.index(start).max(orientation.index(target));
        let blocked = (lo + 1..hi)
            .map(|i| orientation.cell_at(i))
            .any(|c| grid.is_disabled(c.row, c.col));

        let mut selection = Selection::new();
        selection.add(start, &grid).unwrap();
        if blocked {
            prop_assert!(selection.add(target, &grid).is_err());
        }
    }
}
