use std::collections::{BTreeMap, BTreeSet, HashSet};

/// A license plate placed in one time column of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment<'a> {
    pub col: usize,
    pub plate: &'a str,
}

/// First assignment whose plate already appears in the same time column.
/// Empty plates are ignored.
pub fn duplicate_in_slot<'a>(assignments: &[Assignment<'a>]) -> Option<Assignment<'a>> {
    let mut seen = HashSet::new();
    assignments
        .iter()
        .filter(|a| !a.plate.is_empty())
        .find(|a| !seen.insert((a.col, a.plate)))
        .copied()
}

/// A plate booked in three time columns `i, i+1, i+2`, regardless of dock.
pub fn consecutive_run<'a>(assignments: &[Assignment<'a>]) -> Option<&'a str> {
    let mut by_plate: BTreeMap<&str, BTreeSet<usize>> = BTreeMap::new();
    for a in assignments.iter().filter(|a| !a.plate.is_empty()) {
        by_plate.entry(a.plate).or_default().insert(a.col);
    }
    by_plate.into_iter().find_map(|(plate, cols)| {
        let cols = cols.into_iter().collect::<Vec<_>>();
        cols.windows(3)
            .any(|w| w[1] == w[0] + 1 && w[2] == w[0] + 2)
            .then_some(plate)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(col: usize, plate: &str) -> Assignment<'_> {
        Assignment { col, plate }
    }

    #[test]
    fn test_same_plate_twice_in_one_column() {
        let list = [at(4, "1กข-1234"), at(4, "1กข-1234")];

        assert_eq!(Some(at(4, "1กข-1234")), duplicate_in_slot(&list));
    }

    #[test]
    fn test_same_plate_in_other_columns_is_fine() {
        let list = [at(4, "1กข-1234"), at(5, "1กข-1234"), at(4, "70-0001")];

        assert_eq!(None, duplicate_in_slot(&list));
    }

    #[test]
    fn test_blank_plates_never_clash() {
        let list = [at(1, ""), at(1, ""), at(2, ""), at(3, "")];

        assert_eq!(None, duplicate_in_slot(&list));
        assert_eq!(None, consecutive_run(&list));
    }

    #[test]
    fn test_three_in_a_row_in_any_order() {
        let list = [at(3, "AB-1"), at(1, "AB-1"), at(2, "AB-1")];

        assert_eq!(Some("AB-1"), consecutive_run(&list));
    }

    #[test]
    fn test_gap_breaks_the_run() {
        let list = [at(1, "AB-1"), at(2, "AB-1"), at(4, "AB-1")];

        assert_eq!(None, consecutive_run(&list));
    }

    #[test]
    fn test_run_needs_one_plate() {
        let list = [at(1, "AB-1"), at(2, "AB-2"), at(3, "AB-1")];

        assert_eq!(None, consecutive_run(&list));
    }

    #[test]
    fn test_repeated_column_does_not_hide_run() {
        let list = [at(1, "AB-1"), at(2, "AB-1"), at(2, "AB-1"), at(3, "AB-1")];

        assert_eq!(Some("AB-1"), consecutive_run(&list));
    }
}
