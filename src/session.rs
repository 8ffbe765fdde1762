use crate::backend::DataSource;
use crate::booking::{BookingError, BookingFlow, DeliveryInfo, TruckType, check_plate};
use crate::grid::{AvailabilityGrid, Cell, Facility};
use crate::selection::Toggle;
use crate::simulator::{Activity, ContentionSimulator, SimulationPolicy};
use crate::ticket::{Ticket, export_csv, export_file_name};
use crate::time::SlotTime;
use crate::timetable::{ScheduleDraft, ScheduleError, ScheduleRequest};
use chrono::{Days, NaiveDate};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// How far past the picked date `day next` may go.
pub const HORIZON_DAYS: u64 = 7;

/// Longest single `wait`, one day.
pub const MAX_WAIT_SECS: u64 = 24 * 60 * 60;

/// The one screen currently shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Entry,
    Draft,
    Maintenance,
    ApproveChild,
    FastLaneSchedule,
    FastLaneBooking,
    FastLaneInquiry,
    FastLaneInquiryAdmin,
}

impl View {
    pub const ALL: [View; 8] = [
        View::Entry,
        View::Draft,
        View::Maintenance,
        View::ApproveChild,
        View::FastLaneSchedule,
        View::FastLaneBooking,
        View::FastLaneInquiry,
        View::FastLaneInquiryAdmin,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            View::Entry => "entry",
            View::Draft => "draft",
            View::Maintenance => "maintenance",
            View::ApproveChild => "approve-child",
            View::FastLaneSchedule => "schedule",
            View::FastLaneBooking => "booking",
            View::FastLaneInquiry => "inquiry",
            View::FastLaneInquiryAdmin => "inquiry-admin",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown view {0}")]
pub struct ParseViewError(pub String);

impl FromStr for View {
    type Err = ParseViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        View::ALL
            .into_iter()
            .find(|v| v.name() == key)
            .ok_or_else(|| ParseViewError(s.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Booking(#[from] BookingError),
    #[error("Cannot go back before {0}")]
    BeforeBase(NaiveDate),
    #[error("Slots can be booked at most 7 days ahead (until {0})")]
    BeyondHorizon(NaiveDate),
    #[error("No dock {0}")]
    UnknownDock(String),
    #[error("No time slot at {0}")]
    UnknownTime(SlotTime),
    #[error("Not available in the {0} view")]
    ViewInactive(View),
    #[error("Export range {0} - {1} is empty")]
    InvalidRange(NaiveDate, NaiveDate),
    #[error("Cannot wait {0}s, at most 86400s at a time")]
    WaitTooLong(u64),
    #[error("No booking {0}")]
    UnknownBooking(String),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("Generate a schedule first")]
    NoSchedule,
    #[error("Cannot write export: {0}")]
    Export(#[from] csv::Error),
}

/// The grid on display together with the simulated users competing for it.
/// Replacing the board drops every timer of the old simulator.
pub struct Board {
    pub grid: AvailabilityGrid,
    pub simulator: ContentionSimulator<ChaCha8Rng>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub file_name: String,
    pub contents: Vec<u8>,
    pub rows: usize,
}

/// Console state: which view is showing, the displayed date's board and the
/// user's booking flow.
pub struct Session<D> {
    source: D,
    view: View,
    today: NaiveDate,
    base_date: NaiveDate,
    board: Board,
    flow: BookingFlow,
    rng: ChaCha8Rng,
    policy: SimulationPolicy,
    simulate: bool,
    schedule: Option<ScheduleDraft>,
}

fn open_board<D: DataSource>(
    source: &mut D,
    date: NaiveDate,
    rng: &mut ChaCha8Rng,
    policy: &SimulationPolicy,
    running: bool,
) -> Board {
    let mut grid = source.availability(date);
    let mut simulator =
        ContentionSimulator::new(&grid, ChaCha8Rng::seed_from_u64(rng.random()), policy.clone());
    simulator.seed_interest(&mut grid);
    if running {
        simulator.start();
    }
    info!(%date, disabled = grid.disabled().len(), "board opened");
    Board { grid, simulator }
}

impl<D: DataSource> Session<D> {
    pub fn new(
        mut source: D,
        today: NaiveDate,
        seed: u64,
        policy: SimulationPolicy,
        simulate: bool,
    ) -> Session<D> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let board = open_board(&mut source, today, &mut rng, &policy, simulate);
        let flow = BookingFlow::delivering_on(today);
        Session {
            source,
            view: View::FastLaneBooking,
            today,
            base_date: today,
            board,
            flow,
            rng,
            policy,
            simulate,
            schedule: None,
        }
    }

    pub fn source(&self) -> &D {
        &self.source
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn base_date(&self) -> NaiveDate {
        self.base_date
    }

    pub fn grid(&self) -> &AvailabilityGrid {
        &self.board.grid
    }

    pub fn simulator(&self) -> &ContentionSimulator<ChaCha8Rng> {
        &self.board.simulator
    }

    pub fn flow(&self) -> &BookingFlow {
        &self.flow
    }

    pub fn is_simulating(&self) -> bool {
        self.simulate
    }

    pub fn schedule(&self) -> Option<&ScheduleDraft> {
        self.schedule.as_ref()
    }

    /// Docks and times bookings are currently taken against.
    pub fn facility(&self) -> Arc<Facility> {
        self.source.facility()
    }

    fn booking_view(&self) -> Result<(), SessionError> {
        match self.view {
            View::FastLaneBooking => Ok(()),
            view => Err(SessionError::ViewInactive(view)),
        }
    }

    fn inquiry_view(&self) -> Result<(), SessionError> {
        match self.view {
            View::FastLaneInquiry | View::FastLaneInquiryAdmin => Ok(()),
            view => Err(SessionError::ViewInactive(view)),
        }
    }

    fn schedule_view(&self) -> Result<(), SessionError> {
        match self.view {
            View::FastLaneSchedule => Ok(()),
            view => Err(SessionError::ViewInactive(view)),
        }
    }

    fn show_date(&mut self, date: NaiveDate) -> Result<NaiveDate, SessionError> {
        self.booking_view()?;
        // the date cannot change under a selection that already moved on
        self.flow.set_delivery_date(Some(date))?;

        self.board.simulator.stop();
        self.source
            .store_availability(self.board.grid.date(), self.board.grid.disabled());
        let running = self.simulate && self.view == View::FastLaneBooking;
        self.board = open_board(&mut self.source, date, &mut self.rng, &self.policy, running);
        self.flow.clear_selection();
        Ok(date)
    }

    pub fn next_day(&mut self) -> Result<NaiveDate, SessionError> {
        let limit = self.base_date + Days::new(HORIZON_DAYS);
        let next = self.board.grid.date() + Days::new(1);
        if next > limit {
            return Err(SessionError::BeyondHorizon(limit));
        }
        self.show_date(next)
    }

    pub fn prev_day(&mut self) -> Result<NaiveDate, SessionError> {
        let prev = self.board.grid.date() - Days::new(1);
        if prev < self.base_date {
            return Err(SessionError::BeforeBase(self.base_date));
        }
        self.show_date(prev)
    }

    /// Jumps to `date` and makes it the new base for `next_day`/`prev_day`.
    pub fn pick_date(&mut self, date: NaiveDate) -> Result<NaiveDate, SessionError> {
        if date < self.today {
            return Err(BookingError::PastDate.into());
        }
        self.show_date(date)?;
        self.base_date = date;
        Ok(date)
    }

    /// Overrides the delivery date without changing the displayed grid.
    pub fn set_delivery_date(&mut self, date: NaiveDate) -> Result<(), SessionError> {
        self.booking_view()?;
        self.flow.set_delivery_date(Some(date))?;
        Ok(())
    }

    pub fn locate(&self, dock: &str, time: SlotTime) -> Result<Cell, SessionError> {
        let facility = self.board.grid.facility();
        let row = facility
            .dock_index(dock)
            .ok_or_else(|| SessionError::UnknownDock(dock.to_string()))?;
        let col = facility
            .time_index(time)
            .ok_or(SessionError::UnknownTime(time))?;
        Ok(Cell::new(row, col))
    }

    pub fn click(&mut self, dock: &str, time: SlotTime) -> Result<Toggle, SessionError> {
        self.booking_view()?;
        let cell = self.locate(dock, time)?;
        Ok(self.flow.toggle_slot(cell, &self.board.grid)?)
    }

    /// Feeds `elapsed_ms` of wall-clock time to the simulated users.
    pub fn advance(&mut self, elapsed_ms: u64) -> Vec<Activity> {
        if self.view != View::FastLaneBooking {
            return vec![];
        }
        self.board.simulator.advance(&mut self.board.grid, elapsed_ms)
    }

    /// Lets the simulated users act for `secs` seconds of virtual time.
    pub fn wait(&mut self, secs: u64) -> Result<Vec<Activity>, SessionError> {
        if secs > MAX_WAIT_SECS {
            return Err(SessionError::WaitTooLong(secs));
        }
        Ok(self.advance(secs * 1000))
    }

    /// Another user books every currently selected slot. Returns the cells
    /// that changed hands.
    pub fn steal_selection(&mut self) -> Vec<Cell> {
        let stolen = self
            .flow
            .selection()
            .cells()
            .iter()
            .copied()
            .filter(|c| self.board.grid.mark_disabled(c.row, c.col))
            .collect::<Vec<_>>();
        debug!(count = stolen.len(), "selection booked by another user");
        stolen
    }

    pub fn proceed(&mut self) -> Result<(), SessionError> {
        self.booking_view()?;
        Ok(self.flow.proceed(&self.board.grid, self.today)?)
    }

    pub fn toggle_invoice(&mut self, id: &str) -> Result<bool, SessionError> {
        Ok(self
            .flow
            .toggle_invoice(id, self.source.available_invoices())?)
    }

    pub fn select_all_invoices(&mut self) -> Result<(), SessionError> {
        Ok(self
            .flow
            .select_all_invoices(self.source.available_invoices())?)
    }

    pub fn clear_invoices(&mut self) -> Result<(), SessionError> {
        Ok(self.flow.clear_invoices()?)
    }

    pub fn continue_to_delivery(&mut self) -> Result<&[DeliveryInfo], SessionError> {
        Ok(self
            .flow
            .continue_to_delivery(&self.board.grid, self.source.profile())?)
    }

    pub fn set_license_plate(&mut self, index: usize, plate: &str) -> Result<(), SessionError> {
        Ok(self.flow.set_license_plate(index, plate)?)
    }

    pub fn set_truck_type(&mut self, index: usize, truck_type: TruckType) -> Result<(), SessionError> {
        Ok(self.flow.set_truck_type(index, truck_type)?)
    }

    /// Books the slots and records the issued tickets with the data source.
    pub fn confirm(&mut self) -> Result<Vec<Ticket>, SessionError> {
        self.booking_view()?;
        let tickets = self
            .flow
            .confirm(&mut self.board.grid, self.today, &mut self.rng)?
            .to_vec();
        self.source.record_tickets(&tickets);
        Ok(tickets)
    }

    pub fn back(&mut self) -> Result<(), SessionError> {
        Ok(self.flow.back()?)
    }

    pub fn cancel(&mut self) {
        self.flow.exit();
    }

    pub fn switch_view(&mut self, view: View) {
        if view == self.view {
            return;
        }
        if self.view == View::FastLaneBooking {
            self.flow.exit();
            self.board.simulator.stop();
            self.board.grid.clear_activity();
        }
        if view == View::FastLaneBooking && self.simulate {
            self.board.simulator.start();
        }
        debug!(from = %self.view, to = %view, "view switched");
        self.view = view;
    }

    /// Resumes or pauses the simulated users. Returns how many of their
    /// timers were cancelled.
    pub fn set_simulation(&mut self, on: bool) -> usize {
        self.simulate = on;
        if on && self.view == View::FastLaneBooking {
            self.board.simulator.start();
            0
        } else if !on {
            self.board.grid.clear_activity();
            self.board.simulator.stop()
        } else {
            0
        }
    }

    pub fn inquiry(&self, booking_id: &str) -> Option<Ticket> {
        self.source.booking_detail(booking_id.trim())
    }

    /// Tickets recorded for deliveries within `from..=to`.
    pub fn bookings(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Ticket>, SessionError> {
        if from > to {
            return Err(SessionError::InvalidRange(from, to));
        }
        Ok(self.source.tickets_between(from, to))
    }

    pub fn export(&self, from: NaiveDate, to: NaiveDate) -> Result<Export, SessionError> {
        let tickets = self.bookings(from, to)?;
        let warehouse = self.source.warehouse();
        Ok(Export {
            file_name: export_file_name(warehouse, from, to),
            contents: export_csv(warehouse, &tickets)?,
            rows: tickets.len(),
        })
    }

    /// Changes the truck of a recorded booking, under the same plate rules
    /// as a new booking.
    pub fn update_booking(
        &mut self,
        booking_id: &str,
        license_plate: &str,
        truck_type: TruckType,
    ) -> Result<Ticket, SessionError> {
        self.inquiry_view()?;
        let plate = check_plate(license_plate)?;
        if plate.is_empty() {
            return Err(BookingError::MissingVehicle.into());
        }
        let booking_id = booking_id.trim();
        self.source
            .update_booking(booking_id, plate, truck_type)
            .ok_or_else(|| SessionError::UnknownBooking(booking_id.to_string()))
    }

    /// Cancels a recorded booking and frees its slot, on the displayed grid
    /// too when it shows the booking's date.
    pub fn cancel_booking(&mut self, booking_id: &str) -> Result<Ticket, SessionError> {
        self.inquiry_view()?;
        let booking_id = booking_id.trim();
        let ticket = self
            .source
            .cancel_booking(booking_id)
            .ok_or_else(|| SessionError::UnknownBooking(booking_id.to_string()))?;
        if ticket.date == self.board.grid.date() {
            let cell = self
                .board
                .grid
                .facility()
                .cell_of(&ticket.slot_code, ticket.time);
            if let Some(cell) = cell {
                self.board.grid.release(cell);
            }
        }
        info!(booking_id, date = %ticket.date, "booking cancelled");
        Ok(ticket)
    }

    pub fn generate_schedule(
        &mut self,
        request: &ScheduleRequest,
    ) -> Result<&ScheduleDraft, SessionError> {
        self.schedule_view()?;
        let draft = ScheduleDraft::generate(self.source.warehouse(), request, self.today)?;
        Ok(&*self.schedule.insert(draft))
    }

    pub fn revise_schedule(
        &mut self,
        index: usize,
        label: &str,
        info: &str,
    ) -> Result<&ScheduleDraft, SessionError> {
        self.schedule_view()?;
        let draft = self.schedule.as_mut().ok_or(SessionError::NoSchedule)?;
        draft.revise(index, label, info)?;
        Ok(&*draft)
    }
}
