use crate::booking::TruckType;
use crate::time::SlotTime;
use chrono::NaiveDate;
use qrcode::QrCode;
use qrcode::render::unicode::Dense1x2;
use serde::Serialize;
use std::sync::Arc;
use tabled::builder::Builder;
use tabled::settings::Style;

/// A confirmed delivery slot, as printed and exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub booking_id: String,
    pub slot_code: Arc<str>,
    pub date: NaiveDate,
    pub time: SlotTime,
    pub delivery_place: String,
    pub maker_code: String,
    pub maker_name: String,
    pub transport_mode: String,
    pub license_plate: String,
    pub truck_type: TruckType,
}

impl Ticket {
    /// `dd/MM/yyyy HH:MM`
    pub fn delivery_date_time(&self) -> String {
        format!("{} {}", self.date.format("%d/%m/%Y"), self.time)
    }

    /// The QR code on the printed ticket encodes the booking id verbatim.
    pub fn qr_payload(&self) -> &str {
        &self.booking_id
    }
}

/// Scannable QR code of `payload`, drawn with half-block characters.
pub fn render_qr(payload: &str) -> Option<String> {
    let code = QrCode::new(payload.as_bytes()).ok()?;
    Some(
        code.render::<Dense1x2>()
            .dark_color(Dense1x2::Light)
            .light_color(Dense1x2::Dark)
            .build(),
    )
}

pub fn render_ticket(ticket: &Ticket) -> String {
    let mut builder = Builder::default();
    for (field, value) in [
        ("Slot", ticket.slot_code.to_string()),
        ("Delivery date", ticket.delivery_date_time()),
        ("Delivery place", ticket.delivery_place.clone()),
        ("Maker", format!("{} {}", ticket.maker_code, ticket.maker_name)),
        ("Transport mode", ticket.transport_mode.clone()),
        ("License plate", ticket.license_plate.clone()),
        ("Truck type", ticket.truck_type.to_string()),
        ("Booking ID", ticket.booking_id.clone()),
    ] {
        builder.push_record(vec![field.to_string(), value]);
    }
    let mut table = builder.build();
    table.with(Style::rounded());

    let mut card = table.to_string();
    card.push('\n');
    if let Some(qr) = render_qr(ticket.qr_payload()) {
        card.push_str(&qr);
        card.push('\n');
    }
    card.push_str(ticket.qr_payload());
    card
}

pub const EXPORT_HEADERS: [&str; 10] = [
    "Date to delivery",
    "Wh",
    "Slot",
    "Time",
    "Transport mode",
    "Truck type",
    "License plate",
    "Maker code",
    "Maker name",
    "Delivery Ticket No.",
];

/// One spreadsheet row per ticket; the column names are [`EXPORT_HEADERS`].
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Date to delivery")]
    date: String,
    #[serde(rename = "Wh")]
    warehouse: &'a str,
    #[serde(rename = "Slot")]
    slot_code: &'a str,
    #[serde(rename = "Time")]
    time: SlotTime,
    #[serde(rename = "Transport mode")]
    transport_mode: &'a str,
    #[serde(rename = "Truck type")]
    truck_type: String,
    #[serde(rename = "License plate")]
    license_plate: &'a str,
    #[serde(rename = "Maker code")]
    maker_code: &'a str,
    #[serde(rename = "Maker name")]
    maker_name: &'a str,
    #[serde(rename = "Delivery Ticket No.")]
    booking_id: &'a str,
}

impl<'a> ExportRow<'a> {
    fn new(warehouse: &'a str, t: &'a Ticket) -> ExportRow<'a> {
        ExportRow {
            date: t.date.format("%d/%m/%Y").to_string(),
            warehouse,
            slot_code: &t.slot_code,
            time: t.time,
            transport_mode: &t.transport_mode,
            truck_type: t.truck_type.to_string(),
            license_plate: &t.license_plate,
            maker_code: &t.maker_code,
            maker_name: &t.maker_name,
            booking_id: &t.booking_id,
        }
    }
}

pub fn export_file_name(warehouse: &str, from: NaiveDate, to: NaiveDate) -> String {
    format!(
        "FastLane_Export_{}_{}_{}.csv",
        warehouse,
        from.format("%Y%m%d"),
        to.format("%Y%m%d")
    )
}

pub fn export_csv(warehouse: &str, tickets: &[Ticket]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(vec![]);
    // serialize only writes the header row along with the first record
    if tickets.is_empty() {
        writer.write_record(EXPORT_HEADERS)?;
    }
    for t in tickets {
        writer.serialize(ExportRow::new(warehouse, t))?;
    }
    writer.into_inner().map_err(|e| e.into_error().into())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn ticket(booking_id: &str, date: NaiveDate) -> Ticket {
        Ticket {
            booking_id: booking_id.to_string(),
            slot_code: Arc::from("A1"),
            date,
            time: SlotTime::hm(9, 0),
            delivery_place: "APC 2".to_string(),
            maker_code: "05686".to_string(),
            maker_name: "ASTEMO ASIA LTD.".to_string(),
            transport_mode: "DIRECT".to_string(),
            license_plate: "1กข-1234".to_string(),
            truck_type: TruckType::SixWheel,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 9).unwrap()
    }

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_ticket_card_carries_every_field() {
        let card = render_ticket(&ticket("2025100901042", day()));

        for expected in ["A1", "09/10/2025 09:00", "APC 2", "05686 ASTEMO ASIA LTD.", "DIRECT", "6W"] {
            assert!(card.contains(expected), "missing {expected} in\n{card}");
        }
        assert_eq!(2, card.matches("2025100901042").count());
    }

    #[test]
    fn test_ticket_card_draws_qr_code() {
        let card = render_ticket(&ticket("2025100901042", day()));
        let qr = render_qr("2025100901042").unwrap();

        assert!(card.contains(&qr));
        let width = qr.lines().next().unwrap().chars().count();
        assert!(width > 21);
        assert!(qr.lines().all(|l| l.chars().count() == width));
        assert!(qr.contains('█') || qr.contains('▀') || qr.contains('▄'));
        assert_ne!(qr, render_qr("2025100901043").unwrap());
    }

    #[test]
    fn test_export_file_name() {
        let to = NaiveDate::from_ymd_opt(2025, 10, 16).unwrap();

        assert_eq!(
            "FastLane_Export_APC2_20251009_20251016.csv",
            export_file_name("APC2", day(), to)
        );
    }

    #[test]
    fn test_export_rows_follow_headers() {
        let csv = text(export_csv("APC2", &[ticket("2025100900007", day())]).unwrap());
        let lines = csv.lines().collect::<Vec<_>>();

        assert_eq!(2, lines.len());
        assert_eq!(EXPORT_HEADERS.join(","), lines[0]);
        assert_eq!(
            "09/10/2025,APC2,A1,09:00,DIRECT,6W,1กข-1234,05686,ASTEMO ASIA LTD.,2025100900007",
            lines[1]
        );
    }

    #[test]
    fn test_empty_export_still_has_headers() {
        let csv = text(export_csv("APC2", &[]).unwrap());

        assert_eq!(vec![EXPORT_HEADERS.join(",")], csv.lines().collect::<Vec<_>>());
    }

    #[test]
    fn test_export_quotes_awkward_fields() {
        let mut t = ticket("2025100900007", day());
        t.maker_name = "Atemo, \"Asia\"".to_string();

        let bytes = export_csv("APC2", &[t]).unwrap();

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!("Atemo, \"Asia\"", &record[8]);
        assert!(text(bytes).contains(",\"Atemo, \"\"Asia\"\"\","));
    }
}
