use crate::grid::{AvailabilityGrid, Cell, Facility};
use crate::simulator::{ContentionSimulator, Resolution, SimulationPolicy};
use chrono::NaiveDate;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

pub fn grid(disabled: &[(usize, usize)], interest: &[((usize, usize), u32)]) -> AvailabilityGrid {
    let mut grid = AvailabilityGrid::new(
        NaiveDate::from_ymd_opt(2025, 10, 9).unwrap(),
        Arc::new(Facility::default()),
        disabled.iter().map(|(r, c)| Cell::new(*r, *c)),
    );
    for ((r, c), n) in interest {
        grid.set_interest(Cell::new(*r, *c), *n);
    }
    grid
}

pub fn simulator(
    grid: &AvailabilityGrid,
    seed: u64,
    policy: SimulationPolicy,
) -> ContentionSimulator<ChaCha8Rng> {
    ContentionSimulator::new(grid, ChaCha8Rng::seed_from_u64(seed), policy)
}

/// Single-cell bookings on a fixed 3 s beat, resolved with the given odds.
pub fn single_policy(disable: f64, increase: f64) -> SimulationPolicy {
    SimulationPolicy {
        min_interval_ms: 3000,
        max_interval_ms: 3000,
        chain_probability: 0.0,
        single: Resolution { disable, increase },
        ..SimulationPolicy::default()
    }
}

pub fn chain_policy(disable: f64, increase: f64) -> SimulationPolicy {
    SimulationPolicy {
        min_interval_ms: 3000,
        max_interval_ms: 3000,
        chain_probability: 1.0,
        chain: Resolution { disable, increase },
        ..SimulationPolicy::default()
    }
}
