use crate::booking::TruckType;
use crate::grid::{AvailabilityGrid, Cell, Facility, base_layout};
use crate::ticket::Ticket;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tabled::Tabled;
use thiserror::Error;
use tracing::{debug, info};

/// An open supplier invoice that can ride along with a booking.
#[derive(Debug, Clone, PartialEq, Deserialize, Tabled)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Maker code")]
    pub maker_code: String,
    #[tabled(rename = "Maker name")]
    pub maker_name: String,
    #[tabled(rename = "Invoice date")]
    pub invoice_date: String,
    #[tabled(rename = "Invoice no.")]
    pub invoice_no: String,
    #[tabled(rename = "Arrival no.")]
    pub arrival_no: String,
    #[tabled(rename = "Items")]
    pub items: u32,
    #[tabled(rename = "PCS")]
    pub pcs: u32,
    #[tabled(rename = "Amount")]
    pub amount: String,
    #[tabled(rename = "Status")]
    pub status: String,
}

/// Fixed delivery details stamped on every slot of a booking.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingProfile {
    pub delivery_place: String,
    pub maker_code: String,
    pub maker_name: String,
    pub transport_mode: String,
}

impl Default for BookingProfile {
    fn default() -> Self {
        BookingProfile {
            delivery_place: "APC 2".to_string(),
            maker_code: "05686".to_string(),
            maker_name: "ASTEMO ASIA LTD.".to_string(),
            transport_mode: "DIRECT".to_string(),
        }
    }
}

/// Everything the booking screens read from, or hand back to, the backend.
pub trait DataSource {
    fn warehouse(&self) -> &str;

    fn facility(&self) -> Arc<Facility>;

    fn profile(&self) -> &BookingProfile;

    fn availability(&mut self, date: NaiveDate) -> AvailabilityGrid;

    /// Keeps the disabled cells of a grid that is about to be discarded.
    fn store_availability(&mut self, date: NaiveDate, disabled: &BTreeSet<Cell>);

    fn booking_detail(&self, booking_id: &str) -> Option<Ticket>;

    fn available_invoices(&self) -> &[Invoice];

    fn record_tickets(&mut self, tickets: &[Ticket]);

    /// Recorded tickets delivered within `from..=to`, in booking order.
    fn tickets_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<Ticket>;

    /// Changes the vehicle of a recorded booking. Returns the updated ticket.
    fn update_booking(
        &mut self,
        booking_id: &str,
        license_plate: &str,
        truck_type: TruckType,
    ) -> Option<Ticket>;

    /// Drops a recorded booking and frees its slot in the stored
    /// availability of its date. Returns the cancelled ticket.
    fn cancel_booking(&mut self, booking_id: &str) -> Option<Ticket>;
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("cannot read scenario: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse scenario: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid scenario: {0}")]
    Invalid(String),
}

/// In-memory backend seeded from a scenario file. Nothing survives a restart.
#[derive(Debug)]
pub struct MockBackend {
    warehouse: String,
    facility: Arc<Facility>,
    profile: BookingProfile,
    invoices: Vec<Invoice>,
    availability: HashMap<NaiveDate, BTreeSet<Cell>>,
    tickets: Vec<Ticket>,
}

impl MockBackend {
    pub fn new(
        warehouse: &str,
        facility: Facility,
        profile: BookingProfile,
        invoices: Vec<Invoice>,
    ) -> Result<MockBackend, ScenarioError> {
        validate(&facility, &invoices)?;
        Ok(MockBackend {
            warehouse: warehouse.to_string(),
            facility: Arc::new(facility),
            profile,
            invoices,
            availability: HashMap::new(),
            tickets: vec![],
        })
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self, ScenarioError> {
        #[derive(Deserialize)]
        struct RawData {
            warehouse: String,
            #[serde(default)]
            facility: Facility,
            #[serde(default)]
            profile: BookingProfile,
            #[serde(default)]
            invoices: Vec<Invoice>,
        }
        let raw: RawData = serde_json::from_str(data)?;
        MockBackend::new(&raw.warehouse, raw.facility, raw.profile, raw.invoices)
    }
}

fn validate(facility: &Facility, invoices: &[Invoice]) -> Result<(), ScenarioError> {
    if facility.docks.is_empty() || facility.times.is_empty() {
        return Err(ScenarioError::Invalid(
            "facility needs at least one dock and one time".to_string(),
        ));
    }
    let mut times = facility.times.clone();
    times.sort();
    times.dedup();
    if times.len() != facility.times.len() {
        return Err(ScenarioError::Invalid("duplicate slot time".to_string()));
    }
    if let Some(t) = facility.breaks.iter().find(|t| !facility.times.contains(t)) {
        return Err(ScenarioError::Invalid(format!(
            "break {} is not one of the slot times",
            t
        )));
    }
    let mut ids = facility.docks.iter().map(|d| &d.id).collect::<Vec<_>>();
    ids.sort();
    ids.dedup();
    if ids.len() != facility.docks.len() {
        return Err(ScenarioError::Invalid("duplicate dock id".to_string()));
    }
    let mut invoice_ids = invoices.iter().map(|i| &i.id).collect::<Vec<_>>();
    invoice_ids.sort();
    invoice_ids.dedup();
    if invoice_ids.len() != invoices.len() {
        return Err(ScenarioError::Invalid("duplicate invoice id".to_string()));
    }
    Ok(())
}

impl DataSource for MockBackend {
    fn warehouse(&self) -> &str {
        &self.warehouse
    }

    fn facility(&self) -> Arc<Facility> {
        self.facility.clone()
    }

    fn profile(&self) -> &BookingProfile {
        &self.profile
    }

    fn availability(&mut self, date: NaiveDate) -> AvailabilityGrid {
        let facility = self.facility.clone();
        let disabled = self
            .availability
            .entry(date)
            .or_insert_with(|| base_layout(date, &facility))
            .clone();
        debug!(%date, disabled = disabled.len(), "availability served");
        AvailabilityGrid::new(date, facility, disabled)
    }

    fn store_availability(&mut self, date: NaiveDate, disabled: &BTreeSet<Cell>) {
        self.availability.insert(date, disabled.clone());
    }

    fn booking_detail(&self, booking_id: &str) -> Option<Ticket> {
        self.tickets
            .iter()
            .find(|t| t.booking_id == booking_id)
            .cloned()
    }

    fn available_invoices(&self) -> &[Invoice] {
        &self.invoices
    }

    fn record_tickets(&mut self, tickets: &[Ticket]) {
        info!(count = tickets.len(), "tickets recorded");
        self.tickets.extend_from_slice(tickets);
    }

    fn tickets_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<Ticket> {
        self.tickets
            .iter()
            .filter(|t| from <= t.date && t.date <= to)
            .cloned()
            .collect()
    }

    fn update_booking(
        &mut self,
        booking_id: &str,
        license_plate: &str,
        truck_type: TruckType,
    ) -> Option<Ticket> {
        let ticket = self.tickets.iter_mut().find(|t| t.booking_id == booking_id)?;
        ticket.license_plate = license_plate.to_string();
        ticket.truck_type = truck_type;
        info!(booking_id, license_plate, %truck_type, "booking updated");
        Some(ticket.clone())
    }

    fn cancel_booking(&mut self, booking_id: &str) -> Option<Ticket> {
        let pos = self.tickets.iter().position(|t| t.booking_id == booking_id)?;
        let ticket = self.tickets.remove(pos);
        let freed = self
            .facility
            .cell_of(&ticket.slot_code, ticket.time)
            .zip(self.availability.get_mut(&ticket.date))
            .is_some_and(|(cell, disabled)| disabled.remove(&cell));
        info!(booking_id, date = %ticket.date, freed, "booking cancelled");
        Some(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::SlotTime;
    use crate::ticket::tests::ticket;

    const SCENARIO: &str = r#"{
        "warehouse": "APC2",
        "facility": {
            "docks": [
                {"id": "A1", "label": "A1", "info": "APC Pack"},
                {"id": "B3", "label": "B3", "info": "Maker Pack"}
            ],
            "times": ["07:30", "09:00", "12:00", "13:00"],
            "breaks": ["12:00"]
        },
        "invoices": [{
            "id": "1", "makerCode": "05646", "makerName": "Atemo Asia LTD",
            "invoiceDate": "9/9/2025", "invoiceNo": "JUSTPARENT007",
            "arrivalNo": "A59100001", "items": 5, "pcs": 200,
            "amount": "1,130.50", "status": "20"
        }]
    }"#;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
    }

    #[test]
    fn test_scenario_loads() {
        let backend = MockBackend::from_json(SCENARIO).unwrap();

        assert_eq!("APC2", backend.warehouse());
        assert_eq!(2, backend.facility().rows());
        assert!(backend.facility().is_break(2));
        assert_eq!(SlotTime::hm(13, 0), backend.facility().times[3]);
        assert_eq!(BookingProfile::default(), *backend.profile());
        assert_eq!("JUSTPARENT007", backend.available_invoices()[0].invoice_no);
    }

    #[test]
    fn test_missing_facility_falls_back_to_default() {
        let backend = MockBackend::from_json(r#"{"warehouse": "APC2"}"#).unwrap();

        assert_eq!(*backend.facility(), Facility::default());
        assert!(backend.available_invoices().is_empty());
    }

    #[test]
    fn test_break_must_be_a_slot_time() {
        let raw = SCENARIO.replace(r#""breaks": ["12:00"]"#, r#""breaks": ["12:30"]"#);

        assert!(matches!(
            MockBackend::from_json(&raw),
            Err(ScenarioError::Invalid(_))
        ));
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        assert!(matches!(
            MockBackend::from_json("{"),
            Err(ScenarioError::Parse(_))
        ));
    }

    #[test]
    fn test_availability_is_stable_per_date() {
        let mut backend = MockBackend::from_json(SCENARIO).unwrap();

        let first = backend.availability(day(9));
        let second = backend.availability(day(9));

        assert_eq!(first.disabled(), second.disabled());
        assert_ne!(first.epoch(), second.epoch());
    }

    #[test]
    fn test_stored_availability_is_served_back() {
        let mut backend = MockBackend::from_json(SCENARIO).unwrap();
        let mut grid = backend.availability(day(9));
        let open = grid
            .facility()
            .cells()
            .find(|c| grid.is_available(*c))
            .unwrap();
        grid.mark_disabled(open.row, open.col);

        backend.store_availability(day(9), grid.disabled());

        assert!(backend.availability(day(9)).is_disabled(open.row, open.col));
        assert_eq!(
            base_layout(day(10), &backend.facility()),
            *backend.availability(day(10)).disabled()
        );
    }

    #[test]
    fn test_recorded_tickets_are_searchable() {
        let mut backend = MockBackend::from_json(SCENARIO).unwrap();
        backend.record_tickets(&[ticket("2025100900123", day(9)), ticket("2025100901456", day(12))]);

        assert_eq!(day(12), backend.booking_detail("2025100901456").unwrap().date);
        assert!(backend.booking_detail("nope").is_none());
        assert_eq!(1, backend.tickets_between(day(1), day(9)).len());
        assert_eq!(2, backend.tickets_between(day(9), day(12)).len());
        assert!(backend.tickets_between(day(13), day(20)).is_empty());
    }

    #[test]
    fn test_update_changes_vehicle_only() {
        let mut backend = MockBackend::from_json(SCENARIO).unwrap();
        backend.record_tickets(&[ticket("2025100900123", day(9))]);

        let updated = backend
            .update_booking("2025100900123", "70-5678", TruckType::FourWheel)
            .unwrap();

        assert_eq!("70-5678", updated.license_plate);
        assert_eq!(TruckType::FourWheel, updated.truck_type);
        assert_eq!(Some(updated), backend.booking_detail("2025100900123"));
        assert!(backend.update_booking("nope", "70-5678", TruckType::FourWheel).is_none());
    }

    #[test]
    fn test_cancel_frees_stored_slot() {
        let mut backend = MockBackend::from_json(SCENARIO).unwrap();
        // the fixture ticket is A1 at 09:00
        let mut grid = backend.availability(day(9));
        grid.mark_disabled(0, 1);
        backend.store_availability(day(9), grid.disabled());
        backend.record_tickets(&[ticket("2025100900123", day(9))]);

        let cancelled = backend.cancel_booking("2025100900123").unwrap();

        assert_eq!("2025100900123", cancelled.booking_id);
        assert!(backend.booking_detail("2025100900123").is_none());
        assert!(!backend.availability(day(9)).is_disabled(0, 1));
        assert!(backend.cancel_booking("2025100900123").is_none());
    }
}
