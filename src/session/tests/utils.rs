use crate::backend::{BookingProfile, Invoice, MockBackend};
use crate::booking::TruckType;
use crate::grid::{Cell, Facility};
use crate::session::Session;
use crate::simulator::SimulationPolicy;
use crate::time::SlotTime;
use chrono::NaiveDate;

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
}

pub fn today() -> NaiveDate {
    day(9)
}

pub fn backend() -> MockBackend {
    let invoice = Invoice {
        id: "1".to_string(),
        maker_code: "05646".to_string(),
        maker_name: "Atemo Asia LTD".to_string(),
        invoice_date: "9/9/2025".to_string(),
        invoice_no: "JUSTPARENT007".to_string(),
        arrival_no: "A59100001".to_string(),
        items: 5,
        pcs: 200,
        amount: "1,130.50".to_string(),
        status: "20".to_string(),
    };
    MockBackend::new("APC2", Facility::default(), BookingProfile::default(), vec![invoice]).unwrap()
}

/// Session with the simulated users paused.
pub fn session() -> Session<MockBackend> {
    Session::new(backend(), today(), 7, SimulationPolicy::default(), false)
}

pub fn live_session() -> Session<MockBackend> {
    Session::new(backend(), today(), 7, SimulationPolicy::default(), true)
}

/// Dock id and time of the first open cell on the displayed grid.
pub fn first_open(session: &Session<MockBackend>) -> (String, SlotTime, Cell) {
    let grid = session.grid();
    let cell = grid
        .facility()
        .cells()
        .find(|c| grid.is_available(*c))
        .unwrap();
    let facility = grid.facility();
    (
        facility.docks[cell.row].id.to_string(),
        facility.times[cell.col],
        cell,
    )
}

pub fn click_first_open(session: &mut Session<MockBackend>) -> Cell {
    let (dock, time, cell) = first_open(session);
    session.click(&dock, time).unwrap();
    cell
}

/// Books the first open cell with one 4W truck. Returns the booking id.
pub fn book_first_open(session: &mut Session<MockBackend>) -> String {
    click_first_open(session);
    session.proceed().unwrap();
    session.select_all_invoices().unwrap();
    session.continue_to_delivery().unwrap();
    session.set_license_plate(0, "1กข-1234").unwrap();
    session.set_truck_type(0, TruckType::FourWheel).unwrap();
    let tickets = session.confirm().unwrap();
    assert_eq!(1, tickets.len());
    tickets[0].booking_id.clone()
}
