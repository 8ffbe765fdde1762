use crate::backend::{BookingProfile, Invoice};
use crate::booking::{BookingFlow, FlowState, TruckType};
use crate::dock::Dock;
use crate::grid::{AvailabilityGrid, Cell, Facility};
use chrono::NaiveDate;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
}

pub fn today() -> NaiveDate {
    day(9)
}

pub fn rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(7)
}

pub fn default_grid(disabled: &[(usize, usize)]) -> AvailabilityGrid {
    AvailabilityGrid::new(
        today(),
        Arc::new(Facility::default()),
        disabled.iter().map(|(r, c)| Cell::new(*r, *c)),
    )
}

/// One dock, no break: 07:30, 09:00, 10:30, 13:00, 14:30.
pub fn straight_grid() -> AvailabilityGrid {
    let facility = Facility {
        docks: vec![Dock::new("A1", "A1", "APC Pack")],
        times: ["07:30", "09:00", "10:30", "13:00", "14:30"]
            .iter()
            .map(|t| t.parse().unwrap())
            .collect(),
        breaks: vec![],
    };
    AvailabilityGrid::new(today(), Arc::new(facility), Vec::<Cell>::new())
}

pub fn invoice(id: &str, invoice_no: &str) -> Invoice {
    Invoice {
        id: id.to_string(),
        maker_code: "05646".to_string(),
        maker_name: "Atemo Asia LTD".to_string(),
        invoice_date: "10/9/2025".to_string(),
        invoice_no: invoice_no.to_string(),
        arrival_no: "A59110001".to_string(),
        items: 6,
        pcs: 666,
        amount: "14,679.77".to_string(),
        status: "20".to_string(),
    }
}

pub fn invoices() -> Vec<Invoice> {
    vec![
        invoice("1", "JUSTPARENT007"),
        invoice("2", "JUSTCHILDPART007"),
        invoice("3", "TESTINPUT091025"),
    ]
}

/// Flow in `Selecting` with the cells picked and delivery set to today.
pub fn selecting(grid: &AvailabilityGrid, cells: &[(usize, usize)]) -> BookingFlow {
    let mut flow = BookingFlow::default();
    flow.set_delivery_date(Some(today())).unwrap();
    for (r, c) in cells {
        flow.toggle_slot(Cell::new(*r, *c), grid).unwrap();
    }
    flow
}

/// Flow in `DeliveryInfoEntry` for the given cells, one invoice attached.
pub fn delivering(grid: &AvailabilityGrid, cells: &[(usize, usize)]) -> BookingFlow {
    let mut flow = selecting(grid, cells);
    flow.proceed(grid, today()).unwrap();
    flow.toggle_invoice("1", &invoices()).unwrap();
    flow.continue_to_delivery(grid, &BookingProfile::default())
        .unwrap();
    assert_eq!(FlowState::DeliveryInfoEntry, flow.state());
    flow
}

/// Gives row `i` plate `plates[i]` and a 4W truck.
pub fn fill(flow: &mut BookingFlow, plates: &[&str]) {
    for (i, plate) in plates.iter().enumerate() {
        flow.set_license_plate(i, plate).unwrap();
        flow.set_truck_type(i, TruckType::FourWheel).unwrap();
    }
}
