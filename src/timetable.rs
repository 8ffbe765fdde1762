use crate::dock::Dock;
use crate::time::SlotTime;
use chrono::{Days, NaiveDate};
use thiserror::Error;
use tracing::debug;

/// A new timetable only applies to bookings this many days out.
pub const APPLY_AFTER_DAYS: u64 = 7;

/// Dock names and info given to the first generated rows.
const DOCK_NAMES: [(&str, &str); 5] = [
    ("A1", "APC Pack"),
    ("A3", "F/L"),
    ("B3", "Maker Pack"),
    ("C4", "F/L Unload"),
    ("C5", "F/L Unload"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRequest {
    pub start: SlotTime,
    pub end: SlotTime,
    pub duration_minutes: u16,
    pub docks: usize,
}

impl Default for ScheduleRequest {
    fn default() -> Self {
        ScheduleRequest {
            start: SlotTime::hm(8, 30),
            end: SlotTime::hm(17, 0),
            duration_minutes: 90,
            docks: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("Time duration per slot must be longer than 0:00")]
    ZeroDuration,
    #[error("Time start {0} is after time end {1}")]
    EndBeforeStart(SlotTime, SlotTime),
    #[error("No. of slot must be at least 1")]
    NoDocks,
    #[error("No schedule row #{0}")]
    UnknownRow(usize),
    #[error("invalid duration {0} (expected H:MM)")]
    BadDuration(String),
}

/// `H:MM` slot length in minutes.
pub fn parse_duration(s: &str) -> Result<u16, ScheduleError> {
    s.parse::<SlotTime>()
        .map(|t| t.0)
        .map_err(|_| ScheduleError::BadDuration(s.to_string()))
}

/// Slot start times from `start` up to and including `end`, `step` minutes
/// apart.
pub fn generate_times(
    start: SlotTime,
    end: SlotTime,
    step: u16,
) -> Result<Vec<SlotTime>, ScheduleError> {
    if step == 0 {
        return Err(ScheduleError::ZeroDuration);
    }
    if start > end {
        return Err(ScheduleError::EndBeforeStart(start, end));
    }
    Ok((start.0..=end.0).step_by(step as usize).map(SlotTime).collect())
}

/// A dock timetable drafted on the maintenance screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleDraft {
    pub place: String,
    pub applies_from: NaiveDate,
    pub times: Vec<SlotTime>,
    pub docks: Vec<Dock>,
}

impl ScheduleDraft {
    pub fn generate(
        place: &str,
        request: &ScheduleRequest,
        today: NaiveDate,
    ) -> Result<ScheduleDraft, ScheduleError> {
        if request.docks == 0 {
            return Err(ScheduleError::NoDocks);
        }
        let times = generate_times(request.start, request.end, request.duration_minutes)?;
        let docks = (0..request.docks)
            .map(|i| match DOCK_NAMES.get(i) {
                Some((name, info)) => Dock::new(name, name, info),
                None => {
                    let name = format!("Slot{}", i + 1);
                    Dock::new(&name, &name, "")
                }
            })
            .collect::<Vec<_>>();
        debug!(place, times = times.len(), docks = docks.len(), "schedule drafted");
        Ok(ScheduleDraft {
            place: place.to_string(),
            applies_from: today + Days::new(APPLY_AFTER_DAYS),
            times,
            docks,
        })
    }

    /// Renames row `index` and replaces its info.
    pub fn revise(&mut self, index: usize, label: &str, info: &str) -> Result<(), ScheduleError> {
        let dock = self
            .docks
            .get_mut(index)
            .ok_or(ScheduleError::UnknownRow(index + 1))?;
        *dock = Dock::new(&dock.id, label.trim(), info.trim());
        Ok(())
    }
}
