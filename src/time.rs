use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Add;
use std::str::FromStr;
use thiserror::Error;

/// Time of day, in minutes after midnight.
#[derive(Debug, Clone, Copy, Ord, Eq, PartialEq, PartialOrd, Hash)]
pub struct SlotTime(pub u16);

impl SlotTime {
    pub fn hm(hours: u16, minutes: u16) -> SlotTime {
        SlotTime(hours * 60 + minutes)
    }

    pub fn hours(&self) -> u16 {
        self.0 / 60
    }

    pub fn minutes(&self) -> u16 {
        self.0 % 60
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hours(), self.minutes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid time of day: {0} (expected HH:MM)")]
pub struct ParseSlotTimeError(pub String);

impl FromStr for SlotTime {
    type Err = ParseSlotTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseSlotTimeError(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(err)?;
        let hours = h.parse::<u16>().map_err(|_| err())?;
        let minutes = m.parse::<u16>().map_err(|_| err())?;
        if hours >= 24 || minutes >= 60 || m.len() != 2 {
            return Err(err());
        }
        Ok(SlotTime::hm(hours, minutes))
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Reading of the virtual clock that drives scheduled tasks, in milliseconds.
#[derive(Debug, Clone, Copy, Default, Ord, Eq, PartialEq, PartialOrd, Hash)]
pub struct Tick(pub u64);

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}s", self.0 / 1000, self.0 % 1000)
    }
}

impl Add<u64> for Tick {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        Tick(self.0.saturating_add(rhs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_time_round_trips_through_text() {
        let t: SlotTime = "07:30".parse().unwrap();
        assert_eq!(SlotTime::hm(7, 30), t);
        assert_eq!("07:30", t.to_string());
    }

    #[test]
    fn test_slot_time_rejects_garbage() {
        assert!("7".parse::<SlotTime>().is_err());
        assert!("24:00".parse::<SlotTime>().is_err());
        assert!("12:60".parse::<SlotTime>().is_err());
        assert!("12:5".parse::<SlotTime>().is_err());
    }

    #[test]
    fn test_tick_arithmetic() {
        let t = Tick(1500) + 500;
        assert_eq!(Tick(2000), t);
        assert_eq!(Tick(u64::MAX), Tick(u64::MAX - 1) + 5);
        assert_eq!("2.000s", t.to_string());
    }
}
