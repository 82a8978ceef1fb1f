//! Weekly fixed-time schedules.
//!
//! A schedule is written as `"<weekday> <HH:MM>"` in UTC, e.g. `"sun 00:00"`.
//! Weekday tokens accept English full names or three-letter abbreviations,
//! case-insensitive. [`Schedule::next_fire`] returns the next instant
//! strictly after a reference instant, so a run triggered exactly at the
//! fire time never re-fires in the same second.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors that can occur while parsing a schedule.
#[derive(Debug, Error)]
pub enum ScheduleError {
  /// Input is not of the form `"<weekday> <HH:MM>"`.
  #[error("invalid schedule {0:?}: expected \"<weekday> <HH:MM>\"")]
  Format(String),

  /// Weekday token was not recognized.
  #[error("invalid weekday {0:?}")]
  Weekday(String),

  /// Time token was not a valid `HH:MM`.
  #[error("invalid time {0:?}")]
  Time(String),
}

/// A weekly fire time in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
  pub weekday: Weekday,
  pub time: NaiveTime,
}

impl Schedule {
  /// Returns the next fire instant strictly after `after`.
  pub fn next_fire(&self, after: DateTime<Utc>) -> DateTime<Utc> {
    let days_ahead = (self.weekday.num_days_from_monday() as i64
      - after.weekday().num_days_from_monday() as i64)
      .rem_euclid(7);

    let candidate = (after.date_naive() + Duration::days(days_ahead))
      .and_time(self.time)
      .and_utc();

    if candidate <= after {
      candidate + Duration::days(7)
    } else {
      candidate
    }
  }
}

impl FromStr for Schedule {
  type Err = ScheduleError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut parts = s.split_whitespace();
    let (Some(day), Some(time), None) = (parts.next(), parts.next(), parts.next()) else {
      return Err(ScheduleError::Format(s.to_string()));
    };

    let weekday = Weekday::from_str(day).map_err(|_| ScheduleError::Weekday(day.to_string()))?;
    let time = NaiveTime::parse_from_str(time, "%H:%M").map_err(|_| ScheduleError::Time(time.to_string()))?;

    Ok(Schedule { weekday, time })
  }
}

impl fmt::Display for Schedule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.weekday, self.time.format("%H:%M"))
  }
}

impl Serialize for Schedule {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for Schedule {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(D::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
  }

  #[test]
  fn parses_abbreviated_weekday() {
    let schedule: Schedule = "sun 00:00".parse().unwrap();
    assert_eq!(schedule.weekday, Weekday::Sun);
    assert_eq!(schedule.time, NaiveTime::from_hms_opt(0, 0, 0).unwrap());
  }

  #[test]
  fn parses_full_weekday_case_insensitive() {
    let schedule: Schedule = "Monday 14:30".parse().unwrap();
    assert_eq!(schedule.weekday, Weekday::Mon);
    assert_eq!(schedule.time, NaiveTime::from_hms_opt(14, 30, 0).unwrap());
  }

  #[test]
  fn rejects_malformed_input() {
    assert!(matches!("sun".parse::<Schedule>(), Err(ScheduleError::Format(_))));
    assert!(matches!("sun 00:00 extra".parse::<Schedule>(), Err(ScheduleError::Format(_))));
    assert!(matches!("someday 00:00".parse::<Schedule>(), Err(ScheduleError::Weekday(_))));
    assert!(matches!("sun 25:00".parse::<Schedule>(), Err(ScheduleError::Time(_))));
  }

  #[test]
  fn next_fire_later_same_day() {
    // 2026-08-05 is a Wednesday.
    let schedule: Schedule = "wed 18:00".parse().unwrap();
    let next = schedule.next_fire(utc(2026, 8, 5, 9, 0));
    assert_eq!(next, utc(2026, 8, 5, 18, 0));
  }

  #[test]
  fn next_fire_wraps_to_next_week() {
    let schedule: Schedule = "wed 08:00".parse().unwrap();
    let next = schedule.next_fire(utc(2026, 8, 5, 9, 0));
    assert_eq!(next, utc(2026, 8, 12, 8, 0));
  }

  #[test]
  fn next_fire_is_strictly_after() {
    let schedule: Schedule = "sun 00:00".parse().unwrap();
    // 2026-08-09 is a Sunday; firing exactly at the scheduled instant
    // pushes to the following week.
    let next = schedule.next_fire(utc(2026, 8, 9, 0, 0));
    assert_eq!(next, utc(2026, 8, 16, 0, 0));
  }

  #[test]
  fn next_fire_crosses_into_earlier_weekday() {
    let schedule: Schedule = "mon 06:00".parse().unwrap();
    let next = schedule.next_fire(utc(2026, 8, 8, 23, 0));
    assert_eq!(next, utc(2026, 8, 10, 6, 0));
  }

  #[test]
  fn serde_round_trips_as_string() {
    let schedule: Schedule = "sun 00:00".parse().unwrap();
    let yaml = serde_yaml::to_string(&schedule).unwrap();
    assert_eq!(yaml.trim(), "Sun 00:00");

    let back: Schedule = serde_yaml::from_str(yaml.trim()).unwrap();
    assert_eq!(back, schedule);
  }
}
