pub mod rules;

use crate::backend::{BookingProfile, Invoice};
use crate::booking::rules::{Assignment, consecutive_run, duplicate_in_slot};
use crate::grid::{AvailabilityGrid, Cell};
use crate::selection::{Rejection, Selection, Toggle};
use crate::ticket::Ticket;
use crate::time::SlotTime;
use chrono::NaiveDate;
use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const MAX_PLATE_LEN: usize = 9;

/// Trims `plate` and checks it fits the ticket. Thai plates count
/// characters, not bytes.
pub fn check_plate(plate: &str) -> Result<&str, BookingError> {
    let plate = plate.trim();
    if plate.chars().count() > MAX_PLATE_LEN {
        return Err(BookingError::PlateTooLong(plate.to_string()));
    }
    Ok(plate)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Selecting,
    InvoicePicking,
    DeliveryInfoEntry,
    Confirmed,
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowState::Selecting => "selecting slots",
            FlowState::InvoicePicking => "picking invoices",
            FlowState::DeliveryInfoEntry => "entering delivery info",
            FlowState::Confirmed => "confirmed",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruckType {
    FourWheel,
    SixWheel,
}

impl fmt::Display for TruckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TruckType::FourWheel => write!(f, "4W"),
            TruckType::SixWheel => write!(f, "6W"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown truck type {0} (expected 4W or 6W)")]
pub struct ParseTruckTypeError(pub String);

impl FromStr for TruckType {
    type Err = ParseTruckTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "4W" => Ok(TruckType::FourWheel),
            "6W" => Ok(TruckType::SixWheel),
            _ => Err(ParseTruckTypeError(s.to_string())),
        }
    }
}

/// A picked slot that another user booked first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictedSlot {
    pub cell: Cell,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConflict {
    pub slots: Vec<ConflictedSlot>,
}

impl fmt::Display for PendingConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = self
            .slots
            .iter()
            .map(|s| s.label.as_str())
            .collect::<Vec<_>>();
        write!(f, "{}", labels.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingError {
    #[error("Please select a delivery date before proceeding.")]
    MissingDate,
    #[error("Delivery date must be today or later. Please select a valid date.")]
    PastDate,
    #[error("Please select at least one time slot before proceeding.")]
    EmptySelection,
    #[error("These slots were just booked by another user: {0}")]
    SlotsTaken(PendingConflict),
    #[error("Please select at least one invoice.")]
    NoInvoices,
    #[error("No open invoice with id {0}")]
    UnknownInvoice(String),
    #[error("No delivery slot #{0}")]
    UnknownSlot(usize),
    #[error("License plate {0} is longer than 9 characters")]
    PlateTooLong(String),
    #[error("Please fill in License Plate and Truck Type for all slots.")]
    MissingVehicle,
    #[error("The same truck cannot be booked in the same time slot more than once.")]
    DuplicatePlateInSlot,
    #[error("The same truck cannot be booked in three consecutive time slots.")]
    ConsecutiveSlots,
    #[error("Not possible while {0}")]
    WrongState(FlowState),
    #[error(transparent)]
    Rejected(#[from] Rejection),
}

/// Delivery details of one selected slot, filled in before confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryInfo {
    pub cell: Cell,
    pub slot_code: Arc<str>,
    pub date: NaiveDate,
    pub time: SlotTime,
    pub delivery_place: String,
    pub maker_code: String,
    pub maker_name: String,
    pub transport_mode: String,
    pub license_plate: String,
    pub truck_type: Option<TruckType>,
}

impl DeliveryInfo {
    /// `dd/MM/yyyy HH:MM`
    pub fn delivery_date_time(&self) -> String {
        format!("{} {}", self.date.format("%d/%m/%Y"), self.time)
    }
}

/// `YYYYMMDD` of `today` followed by a 5 digit number unique within one
/// confirmation.
pub fn booking_id<R: Rng>(today: NaiveDate, index: usize, rng: &mut R) -> String {
    let serial = rng.random_range(0..1000) + index * 1000;
    format!("{}{:05}", today.format("%Y%m%d"), serial)
}

/// The user's way from picked slots to printed tickets.
///
/// Picked slots are re-checked against the live grid when leaving
/// `Selecting`, since other users may have booked them in the meantime.
#[derive(Debug, Clone)]
pub struct BookingFlow {
    state: FlowState,
    selection: Selection,
    delivery_date: Option<NaiveDate>,
    invoices: Vec<String>,
    deliveries: Vec<DeliveryInfo>,
    tickets: Vec<Ticket>,
}

impl Default for BookingFlow {
    fn default() -> Self {
        BookingFlow {
            state: FlowState::Selecting,
            selection: Selection::new(),
            delivery_date: None,
            invoices: vec![],
            deliveries: vec![],
            tickets: vec![],
        }
    }
}

impl BookingFlow {
    pub fn delivering_on(date: NaiveDate) -> BookingFlow {
        BookingFlow {
            delivery_date: Some(date),
            ..BookingFlow::default()
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn delivery_date(&self) -> Option<NaiveDate> {
        self.delivery_date
    }

    pub fn selected_invoices(&self) -> &[String] {
        &self.invoices
    }

    pub fn deliveries(&self) -> &[DeliveryInfo] {
        &self.deliveries
    }

    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    fn expect_state(&self, state: FlowState) -> Result<(), BookingError> {
        if self.state != state {
            return Err(BookingError::WrongState(self.state));
        }
        Ok(())
    }

    pub fn set_delivery_date(&mut self, date: Option<NaiveDate>) -> Result<(), BookingError> {
        self.expect_state(FlowState::Selecting)?;
        self.delivery_date = date;
        Ok(())
    }

    pub fn toggle_slot(
        &mut self,
        cell: Cell,
        grid: &AvailabilityGrid,
    ) -> Result<Toggle, BookingError> {
        self.expect_state(FlowState::Selecting)?;
        Ok(self.selection.toggle(cell, grid)?)
    }

    pub fn clear_selection(&mut self) {
        if self.state == FlowState::Selecting {
            self.selection.clear();
        }
    }

    /// Moves on to invoice picking once the gates pass and every picked slot
    /// is still free. Slots taken meanwhile are dropped from the selection
    /// and reported; the flow then stays in `Selecting`.
    pub fn proceed(&mut self, grid: &AvailabilityGrid, today: NaiveDate) -> Result<(), BookingError> {
        self.expect_state(FlowState::Selecting)?;
        let date = self.delivery_date.ok_or(BookingError::MissingDate)?;
        if date < today {
            debug!(%date, %today, "delivery date in the past");
            return Err(BookingError::PastDate);
        }
        if self.selection.is_empty() {
            return Err(BookingError::EmptySelection);
        }

        let conflicted = self.selection.prune_disabled(grid);
        if !conflicted.is_empty() {
            let slots = conflicted
                .into_iter()
                .map(|cell| ConflictedSlot {
                    cell,
                    label: grid.describe(cell).unwrap_or_else(|| cell.to_string()),
                })
                .collect::<Vec<_>>();
            let conflict = PendingConflict { slots };
            warn!(%conflict, kept = self.selection.len(), "picked slots taken by another user");
            return Err(BookingError::SlotsTaken(conflict));
        }

        info!(%date, slots = self.selection.len(), "slots held, picking invoices");
        self.state = FlowState::InvoicePicking;
        Ok(())
    }

    /// Returns whether the invoice is selected afterwards.
    pub fn toggle_invoice(&mut self, id: &str, available: &[Invoice]) -> Result<bool, BookingError> {
        self.expect_state(FlowState::InvoicePicking)?;
        if !available.iter().any(|i| i.id == id) {
            return Err(BookingError::UnknownInvoice(id.to_string()));
        }
        if let Some(pos) = self.invoices.iter().position(|i| i == id) {
            self.invoices.remove(pos);
            Ok(false)
        } else {
            self.invoices.push(id.to_string());
            Ok(true)
        }
    }

    pub fn select_all_invoices(&mut self, available: &[Invoice]) -> Result<(), BookingError> {
        self.expect_state(FlowState::InvoicePicking)?;
        self.invoices = available.iter().map(|i| i.id.clone()).collect();
        Ok(())
    }

    pub fn clear_invoices(&mut self) -> Result<(), BookingError> {
        self.expect_state(FlowState::InvoicePicking)?;
        self.invoices.clear();
        Ok(())
    }

    /// Creates one delivery row per picked slot, in pick order.
    pub fn continue_to_delivery(
        &mut self,
        grid: &AvailabilityGrid,
        profile: &BookingProfile,
    ) -> Result<&[DeliveryInfo], BookingError> {
        self.expect_state(FlowState::InvoicePicking)?;
        if self.invoices.is_empty() {
            return Err(BookingError::NoInvoices);
        }
        let date = self.delivery_date.ok_or(BookingError::MissingDate)?;

        let facility = grid.facility();
        let mut deliveries = Vec::with_capacity(self.selection.len());
        for &cell in self.selection.cells() {
            let (Some(dock), Some(time)) = (facility.docks.get(cell.row), facility.times.get(cell.col))
            else {
                return Err(Rejection::Unavailable.into());
            };
            deliveries.push(DeliveryInfo {
                cell,
                slot_code: dock.label.clone(),
                date,
                time: *time,
                delivery_place: profile.delivery_place.clone(),
                maker_code: profile.maker_code.clone(),
                maker_name: profile.maker_name.clone(),
                transport_mode: profile.transport_mode.clone(),
                license_plate: String::new(),
                truck_type: None,
            });
        }

        self.deliveries = deliveries;
        self.state = FlowState::DeliveryInfoEntry;
        Ok(&self.deliveries)
    }

    fn delivery_mut(&mut self, index: usize) -> Result<&mut DeliveryInfo, BookingError> {
        self.expect_state(FlowState::DeliveryInfoEntry)?;
        self.deliveries
            .get_mut(index)
            .ok_or(BookingError::UnknownSlot(index + 1))
    }

    pub fn set_license_plate(&mut self, index: usize, plate: &str) -> Result<(), BookingError> {
        let row = self.delivery_mut(index)?;
        row.license_plate = check_plate(plate)?.to_string();
        Ok(())
    }

    pub fn set_truck_type(&mut self, index: usize, truck_type: TruckType) -> Result<(), BookingError> {
        self.delivery_mut(index)?.truck_type = Some(truck_type);
        Ok(())
    }

    /// Validates the vehicle assignments, books the slots in `grid` and
    /// issues one ticket per slot.
    pub fn confirm<R: Rng>(
        &mut self,
        grid: &mut AvailabilityGrid,
        today: NaiveDate,
        rng: &mut R,
    ) -> Result<&[Ticket], BookingError> {
        self.expect_state(FlowState::DeliveryInfoEntry)?;
        if self
            .deliveries
            .iter()
            .any(|d| d.license_plate.is_empty() || d.truck_type.is_none())
        {
            return Err(BookingError::MissingVehicle);
        }

        let assignments = self
            .deliveries
            .iter()
            .map(|d| Assignment {
                col: d.cell.col,
                plate: &d.license_plate,
            })
            .collect::<Vec<_>>();
        if let Some(dup) = duplicate_in_slot(&assignments) {
            debug!(plate = dup.plate, col = dup.col, "plate booked twice in one slot");
            return Err(BookingError::DuplicatePlateInSlot);
        }
        if let Some(plate) = consecutive_run(&assignments) {
            debug!(plate, "plate booked in three consecutive slots");
            return Err(BookingError::ConsecutiveSlots);
        }

        let mut tickets = Vec::with_capacity(self.deliveries.len());
        for (index, d) in self.deliveries.iter().enumerate() {
            let Some(truck_type) = d.truck_type else {
                return Err(BookingError::MissingVehicle);
            };
            tickets.push(Ticket {
                booking_id: booking_id(today, index, rng),
                slot_code: d.slot_code.clone(),
                date: d.date,
                time: d.time,
                delivery_place: d.delivery_place.clone(),
                maker_code: d.maker_code.clone(),
                maker_name: d.maker_name.clone(),
                transport_mode: d.transport_mode.clone(),
                license_plate: d.license_plate.clone(),
                truck_type,
            });
        }
        for d in &self.deliveries {
            grid.clear_interest(d.cell);
            if !grid.mark_disabled(d.cell.row, d.cell.col) {
                // only checked on proceed, another user got here meanwhile
                warn!(date = %d.date, cell = %d.cell, "ticket issued for a slot that was already taken");
            }
        }

        info!(date = %grid.date(), count = tickets.len(), "booking confirmed");
        self.tickets = tickets;
        self.state = FlowState::Confirmed;
        Ok(&self.tickets)
    }

    /// One step back: invoice picking returns to the kept selection, delivery
    /// entry returns to invoice picking.
    pub fn back(&mut self) -> Result<(), BookingError> {
        match self.state {
            FlowState::InvoicePicking => {
                self.invoices.clear();
                self.state = FlowState::Selecting;
            }
            FlowState::DeliveryInfoEntry => {
                self.deliveries.clear();
                self.state = FlowState::InvoicePicking;
            }
            state => return Err(BookingError::WrongState(state)),
        }
        Ok(())
    }

    /// Abandons the flow from any state. The delivery date is kept.
    pub fn exit(&mut self) {
        let delivery_date = self.delivery_date;
        *self = BookingFlow {
            delivery_date,
            ..BookingFlow::default()
        };
    }
}
