//! Broadcast time conversion.
//!
//! Catalog entries describe when a show airs at its origin as a weekday, an
//! `HH:MM` wall-clock time and a timezone name. This module shifts that slot
//! into the viewer's timezone and formats it for display.
//!
//! The offset between the two zones is taken as whole hours from the current
//! wall-clock difference, so half-hour zones and DST transitions are only
//! approximated.

use std::fmt;

use chrono::{DateTime, Utc, Weekday};
use chrono_tz::Tz;
use thiserror::Error;

pub const MISSING_PLACEHOLDER: &str = "N/A";
pub const CONVERSION_ERROR_PLACEHOLDER: &str = "Time conversion error";

/// Week order used for rollover, starting on Sunday.
const DAYS_OF_WEEK: [Weekday; 7] = [
   Weekday::Sun,
   Weekday::Mon,
   Weekday::Tue,
   Weekday::Wed,
   Weekday::Thu,
   Weekday::Fri,
   Weekday::Sat,
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversionError {
   #[error("unknown broadcast day \"{0}\"")]
   UnknownDay(String),
   #[error("malformed broadcast time \"{0}\"")]
   MalformedTime(String),
}

/// Wall-clock time of day, as published by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastTime {
   pub hour: u32,
   pub minute: u32,
}

impl BroadcastTime {
   pub fn parse(raw: &str) -> Result<Self, ConversionError> {
      let malformed = || ConversionError::MalformedTime(raw.to_string());

      let (hour, minute) = raw.trim().split_once(':').ok_or_else(malformed)?;
      let hour: u32 = hour.parse().map_err(|_| malformed())?;
      let minute: u32 = minute.parse().map_err(|_| malformed())?;

      if hour > 23 || minute > 59 {
         return Err(malformed());
      }

      Ok(Self { hour, minute })
   }
}

/// A broadcast slot expressed in the viewer's timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalBroadcast {
   pub weekday: Weekday,
   /// 0..=23
   pub hour: u32,
   pub minute: u32,
}

impl LocalBroadcast {
   pub fn hour12(&self) -> u32 {
      match self.hour % 12 {
         0 => 12,
         h => h,
      }
   }

   pub fn period(&self) -> &'static str {
      if self.hour < 12 { "AM" } else { "PM" }
   }
}

impl fmt::Display for LocalBroadcast {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      write!(
         f,
         "{}, {}:{:02} {}",
         plural_day_name(self.weekday),
         self.hour12(),
         self.minute,
         self.period()
      )
   }
}

/// Parses catalog day names. Both "Mondays" and "Monday" are accepted.
pub fn parse_day(raw: &str) -> Result<Weekday, ConversionError> {
   let name = raw.trim();
   let singular = name.strip_suffix('s').unwrap_or(name);

   DAYS_OF_WEEK
      .iter()
      .copied()
      .find(|day| singular_day_name(*day).eq_ignore_ascii_case(singular))
      .ok_or_else(|| ConversionError::UnknownDay(raw.to_string()))
}

fn singular_day_name(day: Weekday) -> &'static str {
   match day {
      Weekday::Sun => "Sunday",
      Weekday::Mon => "Monday",
      Weekday::Tue => "Tuesday",
      Weekday::Wed => "Wednesday",
      Weekday::Thu => "Thursday",
      Weekday::Fri => "Friday",
      Weekday::Sat => "Saturday",
   }
}

pub fn plural_day_name(day: Weekday) -> &'static str {
   match day {
      Weekday::Sun => "Sundays",
      Weekday::Mon => "Mondays",
      Weekday::Tue => "Tuesdays",
      Weekday::Wed => "Wednesdays",
      Weekday::Thu => "Thursdays",
      Weekday::Fri => "Fridays",
      Weekday::Sat => "Saturdays",
   }
}

/// Whole hours the source zone's wall clock is ahead of the viewer's at `now`.
pub fn whole_hour_offset(source: Tz, viewer: Tz, now: DateTime<Utc>) -> i64 {
   let source_wall = now.with_timezone(&source).naive_local();
   let viewer_wall = now.with_timezone(&viewer).naive_local();

   (source_wall - viewer_wall).num_hours()
}

/// Moves a source broadcast slot back by `offset_hours`, rolling the weekday
/// whenever the hour leaves the 0..24 range.
pub fn shift(day: Weekday, time: BroadcastTime, offset_hours: i64) -> LocalBroadcast {
   let shifted = i64::from(time.hour) - offset_hours;
   let day_shift = shifted.div_euclid(24);
   let hour = shifted.rem_euclid(24);

   let index = DAYS_OF_WEEK
      .iter()
      .position(|d| *d == day)
      .map_or(0, |i| i as i64);
   let weekday = DAYS_OF_WEEK[(index + day_shift).rem_euclid(7) as usize];

   LocalBroadcast {
      weekday,
      hour: hour as u32,
      minute: time.minute,
   }
}

pub fn convert(day: &str, time: &str, offset_hours: i64) -> Result<LocalBroadcast, ConversionError> {
   let day = parse_day(day)?;
   let time = BroadcastTime::parse(time)?;

   Ok(shift(day, time, offset_hours))
}

/// Source and viewer timezones used when rendering a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zones {
   pub source: Tz,
   pub viewer: Tz,
}

impl Zones {
   /// Formats a catalog broadcast descriptor for the viewer.
   ///
   /// Never fails: missing fields yield [`MISSING_PLACEHOLDER`] and any
   /// conversion problem yields [`CONVERSION_ERROR_PLACEHOLDER`].
   pub fn format(
      &self,
      day: Option<&str>,
      time: Option<&str>,
      timezone: Option<&str>,
      now: DateTime<Utc>,
   ) -> String {
      fn present(field: Option<&str>) -> Option<&str> {
         field.filter(|v| !v.trim().is_empty())
      }

      let (Some(day), Some(time), Some(_)) = (present(day), present(time), present(timezone)) else {
         return MISSING_PLACEHOLDER.to_string();
      };

      let offset = whole_hour_offset(self.source, self.viewer, now);

      match convert(day, time, offset) {
         Ok(local) => format!("{} ({})", local, self.viewer.name()),
         Err(e) => {
            log::error!("Error formatting broadcast time: {}", e);
            CONVERSION_ERROR_PLACEHOLDER.to_string()
         }
      }
   }
}

#[cfg(test)]
mod tests {
   use chrono::TimeZone;

   use super::*;

   fn at(hour: u32, minute: u32) -> BroadcastTime {
      BroadcastTime { hour, minute }
   }

   fn tokyo_and(viewer: Tz) -> Zones {
      Zones {
         source: chrono_tz::Asia::Tokyo,
         viewer,
      }
   }

   fn winter_noon() -> DateTime<Utc> {
      Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
   }

   #[test]
   fn test_same_day_when_hour_stays_in_range() {
      // Arrange & Act
      let local = convert("Mondays", "23:00", 9).unwrap();

      // Assert
      assert_eq!(local.weekday, Weekday::Mon);
      assert_eq!(local.to_string(), "Mondays, 2:00 PM");
   }

   #[test]
   fn test_rolls_back_across_sunday() {
      // Arrange & Act
      let local = convert("Sundays", "01:00", 9).unwrap();

      // Assert
      assert_eq!(local.weekday, Weekday::Sat);
      assert_eq!(local.hour, 16);
      assert_eq!(local.to_string(), "Saturdays, 4:00 PM");
   }

   #[test]
   fn test_rolls_forward_across_saturday() {
      // Arrange: viewer is 3 hours ahead of the source
      let local = convert("Saturdays", "22:30", -3).unwrap();

      // Assert
      assert_eq!(local.weekday, Weekday::Sun);
      assert_eq!(local.to_string(), "Sundays, 1:30 AM");
   }

   #[test]
   fn test_midnight_and_noon_in_twelve_hour_form() {
      // Arrange & Act
      let midnight = shift(Weekday::Wed, at(0, 5), 0);
      let noon = shift(Weekday::Wed, at(12, 0), 0);

      // Assert
      assert_eq!(midnight.to_string(), "Wednesdays, 12:05 AM");
      assert_eq!(noon.to_string(), "Wednesdays, 12:00 PM");
   }

   #[test]
   fn test_hour_and_period_always_in_range() {
      for day in DAYS_OF_WEEK {
         for offset in [-14_i64, -9, -1, 0, 1, 9, 14] {
            for hour in 0..24 {
               for minute in [0, 15, 59] {
                  let local = shift(day, at(hour, minute), offset);

                  assert!((1..=12).contains(&local.hour12()), "{local:?}");
                  assert!(["AM", "PM"].contains(&local.period()));
                  assert!(local.hour < 24);
               }
            }
         }
      }
   }

   #[test]
   fn test_rollover_direction_matches_sign_of_shifted_hour() {
      for (i, day) in DAYS_OF_WEEK.iter().enumerate() {
         let previous = DAYS_OF_WEEK[(i + 6) % 7];
         let next = DAYS_OF_WEEK[(i + 1) % 7];

         assert_eq!(shift(*day, at(2, 0), 9).weekday, previous);
         assert_eq!(shift(*day, at(20, 0), -6).weekday, next);
         assert_eq!(shift(*day, at(12, 0), 9).weekday, *day);
      }
   }

   #[test]
   fn test_parse_day_accepts_singular_and_plural() {
      assert_eq!(parse_day("Fridays"), Ok(Weekday::Fri));
      assert_eq!(parse_day("friday"), Ok(Weekday::Fri));
      assert_eq!(
         parse_day("Someday"),
         Err(ConversionError::UnknownDay(String::from("Someday")))
      );
   }

   #[test]
   fn test_parse_time_rejects_out_of_range_values() {
      assert_eq!(BroadcastTime::parse("09:05"), Ok(at(9, 5)));
      assert!(BroadcastTime::parse("24:00").is_err());
      assert!(BroadcastTime::parse("10:60").is_err());
      assert!(BroadcastTime::parse("1000").is_err());
      assert!(BroadcastTime::parse("ab:cd").is_err());
   }

   #[test]
   fn test_whole_hour_offset_between_zones() {
      // Arrange
      let now = winter_noon();

      // Act & Assert
      assert_eq!(whole_hour_offset(chrono_tz::Asia::Tokyo, chrono_tz::UTC, now), 9);
      assert_eq!(
         whole_hour_offset(chrono_tz::Asia::Tokyo, chrono_tz::America::New_York, now),
         14
      );
      assert_eq!(whole_hour_offset(chrono_tz::Asia::Tokyo, chrono_tz::Asia::Tokyo, now), 0);
      // +5:30 truncates toward zero
      assert_eq!(
         whole_hour_offset(chrono_tz::Asia::Tokyo, chrono_tz::Asia::Kolkata, now),
         3
      );
   }

   #[test]
   fn test_format_for_viewer() {
      // Arrange
      let zones = tokyo_and(chrono_tz::Europe::London);

      // Act
      let display = zones.format(
         Some("Sundays"),
         Some("01:00"),
         Some("Asia/Tokyo"),
         winter_noon(),
      );

      // Assert
      assert_eq!(display, "Saturdays, 4:00 PM (Europe/London)");
   }

   #[test]
   fn test_format_missing_fields() {
      let zones = tokyo_and(chrono_tz::UTC);
      let now = winter_noon();

      assert_eq!(zones.format(None, Some("01:00"), Some("Asia/Tokyo"), now), "N/A");
      assert_eq!(zones.format(Some("Sundays"), None, Some("Asia/Tokyo"), now), "N/A");
      assert_eq!(zones.format(Some("Sundays"), Some("01:00"), None, now), "N/A");
      assert_eq!(zones.format(Some(""), Some("01:00"), Some("Asia/Tokyo"), now), "N/A");
      assert_eq!(zones.format(Some("Sundays"), Some("01:00"), Some("  "), now), "N/A");
   }

   #[test]
   fn test_format_borrows_present_fields() {
      let zones = tokyo_and(chrono_tz::UTC);
      let day = String::from("Mondays");
      let time = String::from("23:00");

      let display = zones.format(Some(day.as_str()), Some(time.as_str()), Some("Asia/Tokyo"), winter_noon());

      assert_eq!(display, "Mondays, 2:00 PM (UTC)");
   }

   #[test]
   fn test_format_conversion_error() {
      let zones = tokyo_and(chrono_tz::UTC);

      let display = zones.format(
         Some("Mondays"),
         Some("late night"),
         Some("Asia/Tokyo"),
         winter_noon(),
      );

      assert_eq!(display, "Time conversion error");
   }
}
