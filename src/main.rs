use crate::backend::{DataSource, MockBackend};
use crate::booking::{DeliveryInfo, FlowState, TruckType};
use crate::dock::Dock;
use crate::grid::{AvailabilityGrid, Cell, CellStatus};
use crate::selection::{MAX_SELECTIONS, Orientation};
use crate::session::{HORIZON_DAYS, Session, SessionError, View};
use crate::simulator::{Activity, SimulationPolicy};
use crate::ticket::{Ticket, render_ticket};
use crate::time::SlotTime;
use crate::timetable::{ScheduleRequest, parse_duration};
use chrono::Days;
use chrono::NaiveDate;
use clap::Parser;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::{Context, Editor, Helper, Highlighter, Hinter, Validator};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Instant;
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing_subscriber::EnvFilter;

mod backend;
mod booking;
mod dock;
mod grid;
mod scheduler;
mod selection;
mod session;
mod simulator;
mod ticket;
mod time;
mod timetable;

#[derive(Parser)]
struct Args {
    /// Path to the JSON scenario file
    #[arg(short, long, value_name = "FILE", default_value = "data/default.json")]
    scenario: PathBuf,

    /// Seed for the simulated users and booking ids
    #[arg(long)]
    seed: Option<u64>,

    /// Pretend today is this date
    #[arg(long, value_name = "YYYY-MM-DD")]
    today: Option<NaiveDate>,

    /// Start with the simulated users paused
    #[arg(long)]
    no_sim: bool,
}

#[derive(Helper, Hinter, Highlighter, Validator)]
pub struct CompleteHelper {
    pub commands: Vec<String>,
}

impl Completer for CompleteHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, _pos: usize, _ctx: &Context<'_>) -> rustyline::Result<(usize, Vec<Pair>)> {
        let mut candidates = Vec::new();

        for cmd in &self.commands {
            if cmd.starts_with(line) {
                candidates.push(Pair {
                    display: cmd.clone(),
                    replacement: format!("{} ", cmd),
                });
            }
        }

        Ok((0, candidates))
    }
}

fn paginate(content: String) {
    let pager = Command::new("less")
        .arg("-R")
        .stdin(Stdio::piped())
        .spawn()
        // Fallback to 'more' if 'less' isn't available
        .or_else(|_| Command::new("more").stdin(Stdio::piped()).spawn());
    let Ok(mut pager) = pager else {
        println!("{}", content);
        return;
    };

    if let Some(mut stdin) = pager.stdin.take() {
        if let Err(e) = stdin.write_all(content.as_bytes()) {
            // Broken pipe is common if the user quits the pager early
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                eprintln!("Error writing to pager: {}", e);
            }
        }
    }

    let _ = pager.wait();
}

fn render_grid(grid: &AvailabilityGrid, selected: &[Cell]) -> String {
    let facility = grid.facility();
    let mut builder = Builder::default();
    let mut header = vec![grid.date().format("%a %d/%m/%Y").to_string()];
    header.extend(facility.times.iter().map(|t| t.to_string()));
    builder.push_record(header);

    for (row, dock) in facility.docks.iter().enumerate() {
        let mut record = vec![dock.to_string()];
        for col in 0..facility.cols() {
            let cell = Cell::new(row, col);
            let mark = match grid.status(cell, selected) {
                CellStatus::Break => "break".dimmed().to_string(),
                CellStatus::Disabled => "x".red().to_string(),
                CellStatus::Selected => "[#]".green().bold().to_string(),
                CellStatus::Open if grid.is_transitioning(cell) => "~".yellow().to_string(),
                CellStatus::Open if grid.is_active(cell) => "*".yellow().bold().to_string(),
                CellStatus::Open => match grid.interest(cell) {
                    0 => "o".to_string(),
                    n => format!("o +{}", n).cyan().to_string(),
                },
            };
            record.push(mark);
        }
        builder.push_record(record);
    }

    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

fn render_deliveries(rows: &[DeliveryInfo]) -> String {
    let mut builder = Builder::default();
    builder.push_record(
        ["#", "Slot", "Delivery date", "Place", "Maker", "Transport", "License plate", "Truck"]
            .map(String::from),
    );
    for (i, d) in rows.iter().enumerate() {
        builder.push_record([
            format!("{}/{}", i + 1, rows.len()),
            d.slot_code.to_string(),
            d.delivery_date_time(),
            d.delivery_place.clone(),
            format!("{} {}", d.maker_code, d.maker_name),
            d.transport_mode.clone(),
            d.license_plate.clone(),
            d.truck_type.map(|t| t.to_string()).unwrap_or_default(),
        ]);
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

fn render_bookings(tickets: &[Ticket]) -> String {
    let mut builder = Builder::default();
    builder.push_record(
        ["Booking ID", "Date", "Time", "Slot", "License plate", "Truck"].map(String::from),
    );
    for t in tickets {
        builder.push_record([
            t.booking_id.clone(),
            t.date.format("%d/%m/%Y").to_string(),
            t.time.to_string(),
            t.slot_code.to_string(),
            t.license_plate.clone(),
            t.truck_type.to_string(),
        ]);
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    table.with(tabled::settings::Alignment::left());
    table.to_string()
}

fn render_timetable(times: &[SlotTime], docks: &[Dock]) -> String {
    let mut builder = Builder::default();
    let mut header = vec!["#".to_string(), "Dock".to_string(), "Info".to_string()];
    header.extend(times.iter().map(|t| t.to_string()));
    builder.push_record(header);
    for (i, dock) in docks.iter().enumerate() {
        let mut record = vec![(i + 1).to_string(), dock.label.to_string(), dock.info.to_string()];
        record.extend(times.iter().map(|_| "o".to_string()));
        builder.push_record(record);
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

fn print_schedule(session: &Session<MockBackend>) {
    match session.schedule() {
        Some(draft) => {
            println!("{}", render_timetable(&draft.times, &draft.docks));
            println!(
                "Delivery place: {}  |  applies from {}",
                draft.place,
                draft.applies_from.format("%d/%m/%Y")
            );
        }
        None => {
            let facility = session.facility();
            println!("{}", render_timetable(&facility.times, &facility.docks));
            println!("Current timetable. Draft a new one with 'schedule <start> <H:MM> <slots>'.");
        }
    }
}

fn print_board(session: &Session<MockBackend>) {
    let grid = session.grid();
    let facility = grid.facility();
    println!("{}", render_grid(grid, session.flow().selection().cells()));

    let selection = session.flow().selection();
    let along = match selection.orientation() {
        Some(Orientation::Horizontal { row }) => facility.docks.get(row).map(|d| format!(" along dock {}", d.label)),
        Some(Orientation::Vertical { col }) => facility.times.get(col).map(|t| format!(" at {}", t)),
        None => None,
    };
    println!(
        "Delivery date: {}  |  {}  |  selected {}/{}{}  |  other users: {}",
        session
            .flow()
            .delivery_date()
            .map(|d| d.format("%d/%m/%Y").to_string())
            .unwrap_or_else(|| "-".to_string()),
        session.flow().state(),
        selection.len(),
        MAX_SELECTIONS,
        along.unwrap_or_default(),
        if session.simulator().is_running() { "on" } else { "off" },
    );
    let base = session.base_date();
    println!(
        "Today {}  |  bookable {} - {}",
        session.today().format("%d/%m/%Y"),
        base.format("%d/%m/%Y"),
        (base + Days::new(HORIZON_DAYS)).format("%d/%m/%Y"),
    );
}

fn print_activity(grid: &AvailabilityGrid, activity: &[Activity]) {
    for a in activity {
        match a {
            Activity::Transitioning(cell) => {
                if let Some(slot) = grid.describe(*cell) {
                    println!("{} {}", "Someone is taking".yellow(), slot);
                }
            }
            Activity::Disabled(cell) => {
                if let Some(slot) = grid.describe(*cell) {
                    println!("{} {}", "Booked by another user:".yellow(), slot);
                }
            }
            Activity::BookingStarted(_) | Activity::InterestChanged { .. } => {}
        }
    }
}

fn report<T>(result: Result<T, SessionError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            println!("{}", e.to_string().red());
            None
        }
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok();
    if date.is_none() {
        println!("Invalid date {} (expected YYYY-MM-DD)", s);
    }
    date
}

/// 1-based row number from the console to a row index.
fn parse_row(s: &str) -> Option<usize> {
    let row = s.parse::<usize>().ok().and_then(|n| n.checked_sub(1));
    if row.is_none() {
        println!("Invalid slot number {}", s);
    }
    row
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let backend = MockBackend::load_from_file(&args.scenario)?;
    let today = args
        .today
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let seed = args.seed.unwrap_or_else(rand::random);
    println!(
        "Fast lane online. Warehouse {} loaded from {} (seed {})",
        backend.warehouse(),
        args.scenario.display(),
        seed
    );

    let mut session = Session::new(backend, today, seed, SimulationPolicy::default(), !args.no_sim);
    print_board(&session);

    let config = rustyline::Config::builder()
        .history_ignore_space(true)
        .completion_type(rustyline::CompletionType::List)
        .build();

    let helper = CompleteHelper {
        commands: [
            "grid", "day", "deliver", "pick", "wait", "steal", "proceed", "invoices", "invoice",
            "continue", "rows", "plate", "truck", "confirm", "tickets", "back", "cancel", "inquiry",
            "edit", "delete", "bookings", "export", "schedule", "revise", "view", "sim", "help", "exit",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect(),
    };

    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(helper));
    let mut last_input = Instant::now();

    loop {
        let readline = rl.readline(">> ");
        let elapsed = last_input.elapsed().as_millis() as u64;
        last_input = Instant::now();
        let activity = session.advance(elapsed);
        print_activity(session.grid(), &activity);

        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() { continue; }

                rl.add_history_entry(trimmed)?;

                let parts: Vec<&str> = trimmed.split_whitespace().collect();
                match parts[0] {
                    "grid" => print_board(&session),
                    "day" => {
                        let moved = match parts.get(1).copied() {
                            Some("next") => report(session.next_day()),
                            Some("prev") => report(session.prev_day()),
                            Some(date) => parse_date(date).and_then(|d| report(session.pick_date(d))),
                            None => {
                                println!("Usage: day next|prev|<YYYY-MM-DD>");
                                None
                            }
                        };
                        if moved.is_some() {
                            print_board(&session);
                        }
                    },
                    "deliver" => {
                        if let Some(date) = parts.get(1).and_then(|s| parse_date(s)) {
                            if report(session.set_delivery_date(date)).is_some() {
                                println!("Delivery date set to {}", date.format("%d/%m/%Y"));
                            }
                        } else {
                            println!("Usage: deliver <YYYY-MM-DD>");
                        }
                    },
                    "pick" => {
                        if let (Some(dock), Some(time)) = (parts.get(1), parts.get(2)) {
                            match time.parse::<SlotTime>() {
                                Ok(time) => {
                                    if report(session.click(dock, time)).is_some() {
                                        print_board(&session);
                                    }
                                },
                                Err(e) => println!("{}", e),
                            }
                        } else {
                            println!("Usage: pick <dock> <HH:MM>");
                        }
                    },
                    "wait" => {
                        let Ok(secs) = parts.get(1).map_or(Ok(5), |s| s.parse::<u64>()) else {
                            println!("Usage: wait [seconds]");
                            continue;
                        };
                        if let Some(activity) = report(session.wait(secs)) {
                            print_activity(session.grid(), &activity);
                            print_board(&session);
                        }
                    },
                    "steal" => {
                        let stolen = session.steal_selection();
                        println!("Another user booked {} of your selected slots.", stolen.len());
                    },
                    "proceed" => {
                        if report(session.proceed()).is_some() {
                            println!("Slots still free. Pick invoices with 'invoice <id>|all', then 'continue'.");
                        } else {
                            print_board(&session);
                        }
                    },
                    "invoices" => {
                        let invoices = session.source().available_invoices();
                        let mut table = tabled::Table::new(invoices);
                        table.with(Style::rounded());
                        println!("{}", table);
                        println!("Selected: {}", session.flow().selected_invoices().join(", "));
                    },
                    "invoice" => {
                        match parts.get(1).copied() {
                            Some("all") => { report(session.select_all_invoices()); },
                            Some("none") => { report(session.clear_invoices()); },
                            Some(id) => { report(session.toggle_invoice(id)); },
                            None => println!("Usage: invoice <id>|all|none"),
                        }
                        println!("Selected: {}", session.flow().selected_invoices().join(", "));
                    },
                    "continue" => {
                        if let Some(rows) = report(session.continue_to_delivery()) {
                            println!("{}", render_deliveries(rows));
                        }
                    },
                    "rows" => println!("{}", render_deliveries(session.flow().deliveries())),
                    "plate" => {
                        if let (Some(n), Some(plate)) = (parts.get(1), parts.get(2)) {
                            if let Some(index) = parse_row(n) {
                                report(session.set_license_plate(index, plate));
                            }
                        } else {
                            println!("Usage: plate <n> <license plate>");
                        }
                    },
                    "truck" => {
                        if let (Some(n), Some(kind)) = (parts.get(1), parts.get(2)) {
                            match (parse_row(n), kind.parse::<TruckType>()) {
                                (Some(index), Ok(kind)) => { report(session.set_truck_type(index, kind)); },
                                (_, Err(e)) => println!("{}", e),
                                _ => {}
                            }
                        } else {
                            println!("Usage: truck <n> 4W|6W");
                        }
                    },
                    "confirm" => {
                        if let Some(tickets) = report(session.confirm()) {
                            for t in &tickets {
                                println!("{}", render_ticket(t));
                            }
                            println!("Booking confirmed. 'cancel' starts a new booking.");
                        }
                    },
                    "tickets" => {
                        let tickets = session.flow().tickets();
                        if tickets.is_empty() {
                            println!("No tickets issued yet.");
                        }
                        for t in tickets {
                            println!("{}", render_ticket(t));
                        }
                    },
                    "back" => {
                        if report(session.back()).is_some() && session.flow().state() == FlowState::Selecting {
                            print_board(&session);
                        }
                    },
                    "cancel" => {
                        session.cancel();
                        print_board(&session);
                    },
                    "inquiry" => {
                        if let Some(id) = parts.get(1) {
                            match session.inquiry(id) {
                                Some(ticket) => println!("{}", render_ticket(&ticket)),
                                None => println!("No booking {}", id),
                            }
                        } else {
                            println!("Usage: inquiry <booking id>");
                        }
                    },
                    "edit" => {
                        if let (Some(id), Some(plate), Some(kind)) = (parts.get(1), parts.get(2), parts.get(3)) {
                            match kind.parse::<TruckType>() {
                                Ok(kind) => {
                                    if let Some(ticket) = report(session.update_booking(id, plate, kind)) {
                                        println!("{}", render_ticket(&ticket));
                                    }
                                },
                                Err(e) => println!("{}", e),
                            }
                        } else {
                            println!("Usage: edit <booking id> <license plate> 4W|6W");
                        }
                    },
                    "delete" => {
                        if let Some(id) = parts.get(1) {
                            if let Some(ticket) = report(session.cancel_booking(id)) {
                                println!("Booking {} cancelled, {} {} is free again.", ticket.booking_id, ticket.slot_code, ticket.delivery_date_time());
                            }
                        } else {
                            println!("Usage: delete <booking id>");
                        }
                    },
                    "schedule" => {
                        if parts.len() == 1 {
                            print_schedule(&session);
                            continue;
                        }
                        let (Some(start), Some(duration), Some(slots)) = (parts.get(1), parts.get(2), parts.get(3)) else {
                            println!("Usage: schedule [<start HH:MM> <duration H:MM> <no. of slots>]");
                            continue;
                        };
                        let request = match (start.parse::<SlotTime>(), parse_duration(duration), slots.parse::<usize>()) {
                            (Ok(start), Ok(duration_minutes), Ok(docks)) => ScheduleRequest {
                                start,
                                duration_minutes,
                                docks,
                                ..ScheduleRequest::default()
                            },
                            (Err(e), _, _) => { println!("{}", e); continue; },
                            (_, Err(e), _) => { println!("{}", e); continue; },
                            (_, _, Err(_)) => { println!("Invalid no. of slots {}", slots); continue; },
                        };
                        if report(session.generate_schedule(&request)).is_some() {
                            print_schedule(&session);
                        }
                    },
                    "revise" => {
                        if let (Some(n), Some(label)) = (parts.get(1), parts.get(2)) {
                            if let Some(index) = parse_row(n) {
                                let info = parts[3..].join(" ");
                                if report(session.revise_schedule(index, label, &info)).is_some() {
                                    print_schedule(&session);
                                }
                            }
                        } else {
                            println!("Usage: revise <n> <dock> [info]");
                        }
                    },
                    "bookings" | "export" => {
                        let range = (parts.get(1).and_then(|s| parse_date(s)), parts.get(2).and_then(|s| parse_date(s)));
                        let (Some(from), Some(to)) = range else {
                            println!("Usage: {} <YYYY-MM-DD> <YYYY-MM-DD>", parts[0]);
                            continue;
                        };
                        if parts[0] == "bookings" {
                            if let Some(tickets) = report(session.bookings(from, to)) {
                                let table = render_bookings(&tickets);
                                if tickets.len() > 20 {
                                    paginate(table);
                                } else {
                                    println!("{}", table);
                                }
                            }
                        } else if let Some(export) = report(session.export(from, to)) {
                            match std::fs::write(&export.file_name, &export.contents) {
                                Ok(()) => println!("Exported {} bookings to {}", export.rows, export.file_name),
                                Err(e) => println!("Cannot write {}: {}", export.file_name, e),
                            }
                        }
                    },
                    "view" => {
                        match parts.get(1).map(|s| s.parse::<View>()) {
                            Some(Ok(view)) => {
                                session.switch_view(view);
                                match view {
                                    View::FastLaneBooking => print_board(&session),
                                    View::FastLaneSchedule => print_schedule(&session),
                                    View::FastLaneInquiry | View::FastLaneInquiryAdmin => {
                                        println!("Now showing {}. Use 'inquiry', 'edit', 'delete', 'bookings' or 'export'.", view)
                                    },
                                    _ => println!("Now showing {}. This screen has no console commands.", view),
                                }
                            },
                            Some(Err(e)) => println!("{}", e),
                            None => println!("Showing {}", session.view()),
                        }
                    },
                    "sim" => {
                        match parts.get(1).copied() {
                            Some("on") => { session.set_simulation(true); },
                            Some("off") => {
                                let dropped = session.set_simulation(false);
                                println!("Other users paused, {} pending actions dropped.", dropped);
                            },
                            None => println!(
                                "Other users {} ({} timers pending)",
                                if session.is_simulating() { "on" } else { "off" },
                                session.simulator().pending()
                            ),
                            _ => println!("Usage: sim [on|off]"),
                        }
                    },
                    "help" | "?" => {
                        println!("\nAvailable Commands:");
                        println!("  grid                   - Show the availability grid for the displayed date");
                        println!("  day next|prev|<date>   - Move the displayed date (at most 7 days past the picked date)");
                        println!("  deliver <date>         - Set the delivery date");
                        println!("  pick <dock> <HH:MM>    - Select or deselect a slot (up to 3, one row or column)");
                        println!("  wait [s]               - Let other users act for <s> seconds (default 5, at most a day)");
                        println!("  steal                  - Let another user book all of your selected slots");
                        println!("  proceed                - Hold the selected slots and pick invoices");
                        println!("  invoices               - List open invoices");
                        println!("  invoice <id>|all|none  - Toggle an invoice, select all or none");
                        println!("  continue               - Enter delivery info for every slot");
                        println!("  rows                   - Show the delivery info rows");
                        println!("  plate <n> <plate>      - Set the license plate of row <n>");
                        println!("  truck <n> 4W|6W        - Set the truck type of row <n>");
                        println!("  confirm                - Book the slots and print tickets");
                        println!("  tickets                - Print the tickets of the last booking again");
                        println!("  back / cancel          - Go back one step / start over");
                        println!("  inquiry <id>           - Show a booking");
                        println!("  edit <id> <plate> <t>  - Change the truck of a booking (inquiry screens)");
                        println!("  delete <id>            - Cancel a booking and free its slot (inquiry screens)");
                        println!("  bookings <from> <to>   - List bookings by delivery date");
                        println!("  export <from> <to>     - Write bookings to a CSV file");
                        println!("  schedule [s d n]       - Show or draft a timetable: start, H:MM per slot, no. of slots");
                        println!("  revise <n> <dock> [i]  - Rename row <n> of the drafted timetable");
                        println!("  view [name]            - Switch screens: {}", View::ALL.map(|v| v.name()).join(", "));
                        println!("  sim [on|off]           - Show, resume or pause the other users");
                        println!("  help / ?               - Show this help menu");
                        println!("  exit / quit            - Leave the console\n");
                    },
                    "exit" | "quit" => break,
                    _ => println!("Unknown command: {}", parts[0]),
                }
            },
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            },
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            },
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }
    Ok(())
}
