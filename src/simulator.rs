use crate::grid::{AvailabilityGrid, Cell};
use crate::scheduler::{TaskId, TaskQueue};
use crate::time::Tick;
use rand::Rng;
use tracing::{debug, info, warn};

/// Odds applied when a simulated booking attempt resolves. Whatever is left
/// after `disable` and `increase` decreases the interest count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub disable: f64,
    pub increase: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationPolicy {
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
    pub chain_probability: f64,
    pub max_chain: usize,
    pub chain_stagger_ms: u64,
    pub booking_ms: u64,
    pub transition_ms: u64,
    pub chain: Resolution,
    pub single: Resolution,
    pub seed_probability: f64,
    pub max_seed_interest: u32,
}

impl Default for SimulationPolicy {
    fn default() -> Self {
        SimulationPolicy {
            min_interval_ms: 3000,
            max_interval_ms: 6000,
            chain_probability: 0.3,
            max_chain: 3,
            chain_stagger_ms: 800,
            booking_ms: 2000,
            transition_ms: 1000,
            chain: Resolution {
                disable: 0.1,
                increase: 0.7,
            },
            single: Resolution {
                disable: 0.2,
                increase: 0.4,
            },
            seed_probability: 0.35,
            max_seed_interest: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Chain,
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimEvent {
    Tick,
    BeginBooking { cell: Cell, mode: Mode },
    Resolve { cell: Cell, mode: Mode },
    Disable { cell: Cell },
}

/// What the simulated users did to the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    BookingStarted(Cell),
    InterestChanged { cell: Cell, from: u32, to: u32 },
    Transitioning(Cell),
    Disabled(Cell),
}

/// Emulates other users competing for slots of one grid.
///
/// The simulator is bound to the grid it was created for and only ever sees
/// it through `&mut` borrows handed to [`ContentionSimulator::advance`];
/// dropping it drops every pending timer.
pub struct ContentionSimulator<R> {
    rng: R,
    policy: SimulationPolicy,
    queue: TaskQueue<SimEvent>,
    tick: Option<TaskId>,
    grid_epoch: u64,
    running: bool,
}

impl<R: Rng> ContentionSimulator<R> {
    pub fn new(grid: &AvailabilityGrid, rng: R, policy: SimulationPolicy) -> Self {
        ContentionSimulator {
            rng,
            policy,
            queue: TaskQueue::new(),
            tick: None,
            grid_epoch: grid.epoch(),
            running: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Timers still waiting to fire.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_bound_to(&self, grid: &AvailabilityGrid) -> bool {
        self.grid_epoch == grid.epoch()
    }

    /// Randomly marks open cells of the grid as popular.
    pub fn seed_interest(&mut self, grid: &mut AvailabilityGrid) {
        grid.seed_interest(
            &mut self.rng,
            self.policy.seed_probability,
            self.policy.max_seed_interest,
        );
    }

    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.schedule_tick();
        debug!(epoch = self.grid_epoch, "contention simulator started");
    }

    /// Cancels every pending timer, including bookings already in flight.
    pub fn stop(&mut self) -> usize {
        self.running = false;
        self.tick = None;
        let dropped = self.queue.cancel_all();
        debug!(epoch = self.grid_epoch, dropped, "contention simulator stopped");
        dropped
    }

    /// Nothing but the recurring tick is pending and no cell draws interest,
    /// so no later tick can change the grid.
    fn is_quiet(&self, grid: &AvailabilityGrid) -> bool {
        let only_tick = match self.tick {
            Some(_) => self.queue.len() == 1,
            None => self.queue.is_empty(),
        };
        only_tick && !grid.has_popular_cells()
    }

    /// Runs every timer that falls due within the next `elapsed_ms`. Once the
    /// grid has gone quiet the clock jumps straight to the end of the window.
    pub fn advance(&mut self, grid: &mut AvailabilityGrid, elapsed_ms: u64) -> Vec<Activity> {
        let mut activity = vec![];
        if !self.is_bound_to(grid) {
            warn!(
                expected = self.grid_epoch,
                actual = grid.epoch(),
                "simulator asked to drive a foreign grid"
            );
            return activity;
        }

        let until = self.queue.now() + elapsed_ms;
        while !self.is_quiet(grid) {
            let Some((_, event)) = self.queue.pop_due(until) else {
                break;
            };
            self.handle(event, grid, &mut activity);
        }
        if self.is_quiet(grid) {
            self.fast_forward(until);
        }
        self.queue.advance_to(until);
        debug!(clock = %until, changes = activity.len(), "simulator advanced");
        activity
    }

    fn schedule_tick(&mut self) {
        // a zero interval would re-fire forever inside one advance
        let min = self.policy.min_interval_ms.max(1);
        let max = self.policy.max_interval_ms.max(min);
        let delay = self.rng.random_range(min..=max);
        self.tick = Some(self.queue.schedule_after(delay, SimEvent::Tick));
    }

    fn fast_forward(&mut self, until: Tick) {
        let Some(tick) = self.tick.take() else {
            return;
        };
        self.queue.cancel(tick);
        self.queue.advance_to(until);
        self.schedule_tick();
    }

    fn handle(&mut self, event: SimEvent, grid: &mut AvailabilityGrid, activity: &mut Vec<Activity>) {
        match event {
            SimEvent::Tick => self.on_tick(grid, activity),
            SimEvent::BeginBooking { cell, mode } => self.begin_booking(cell, mode, grid, activity),
            SimEvent::Resolve { cell, mode } => self.resolve(cell, mode, grid, activity),
            SimEvent::Disable { cell } => {
                grid.set_transitioning(cell, false);
                grid.clear_interest(cell);
                if grid.mark_disabled(cell.row, cell.col) {
                    info!(date = %grid.date(), %cell, "slot booked by simulated user");
                    activity.push(Activity::Disabled(cell));
                }
            }
        }
    }

    fn on_tick(&mut self, grid: &mut AvailabilityGrid, activity: &mut Vec<Activity>) {
        self.tick = None;
        if self.running {
            self.schedule_tick();
        }

        let popular = grid.popular_cells();
        if popular.is_empty() {
            return;
        }

        if self.rng.random_bool(self.policy.chain_probability) {
            if let Some(run) = find_chain(grid, self.policy.max_chain) {
                debug!(len = run.len(), "simulated chain booking");
                for (i, cell) in run.into_iter().enumerate() {
                    let delay = i as u64 * self.policy.chain_stagger_ms;
                    let mode = Mode::Chain;
                    self.queue.schedule_after(delay, SimEvent::BeginBooking { cell, mode });
                }
                return;
            }
        }

        let cell = popular[self.rng.random_range(0..popular.len())];
        self.begin_booking(cell, Mode::Single, grid, activity);
    }

    fn begin_booking(
        &mut self,
        cell: Cell,
        mode: Mode,
        grid: &mut AvailabilityGrid,
        activity: &mut Vec<Activity>,
    ) {
        if !grid.is_idle(cell) {
            return;
        }
        grid.set_active(cell, true);
        activity.push(Activity::BookingStarted(cell));
        self.queue
            .schedule_after(self.policy.booking_ms, SimEvent::Resolve { cell, mode });
    }

    fn resolve(
        &mut self,
        cell: Cell,
        mode: Mode,
        grid: &mut AvailabilityGrid,
        activity: &mut Vec<Activity>,
    ) {
        grid.set_active(cell, false);
        if !grid.is_available(cell) {
            return;
        }

        let odds = match mode {
            Mode::Chain => self.policy.chain,
            Mode::Single => self.policy.single,
        };
        let roll: f64 = self.rng.random();
        if roll < odds.disable {
            grid.set_transitioning(cell, true);
            activity.push(Activity::Transitioning(cell));
            self.queue
                .schedule_after(self.policy.transition_ms, SimEvent::Disable { cell });
            return;
        }

        let from = grid.interest(cell);
        let to = if roll < odds.disable + odds.increase {
            from + self.rng.random_range(1..=2)
        } else {
            from.saturating_sub(1)
        };
        grid.set_interest(cell, to);
        activity.push(Activity::InterestChanged { cell, from, to });
    }
}

/// First horizontal run of popular cells, preferring the longest run up to
/// `max_len` and scanning rows in order.
pub fn find_chain(grid: &AvailabilityGrid, max_len: usize) -> Option<Vec<Cell>> {
    let popular = |cell: Cell| grid.is_idle(cell) && grid.interest(cell) > 0;
    for len in (1..=max_len).rev() {
        let Some(last_start) = grid.cols().checked_sub(len) else {
            continue;
        };
        for row in 0..grid.rows() {
            for start in 0..=last_start {
                let run = (start..start + len)
                    .map(|col| Cell::new(row, col))
                    .collect::<Vec<_>>();
                if run.iter().all(|c| popular(*c)) {
                    return Some(run);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    mod utils;
    mod contention;
}
