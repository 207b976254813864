use super::{date_ms, duration_ms, number, string};
use crate::error::ErrorMessage;
use crate::registry::{FnEntry, FrType, RegistryBuilder};
use crate::value::{format_number, Value};
use lazy_static::lazy_static;
use regex::Regex;

const MINUTE: f64 = 60.0 * 1000.0;
const HOUR: f64 = 60.0 * MINUTE;
const DAY: f64 = 24.0 * HOUR;
const YEAR: f64 = 365.25 * DAY;

lazy_static! {
  static ref DATE_RE: Result<Regex, regex::Error> =
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})(?:[T ](\d{2}):(\d{2})(?::(\d{2}))?Z?)?$");
}

/// Days since 1970-01-01 of a proleptic Gregorian date.
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
  let y = if m <= 2 { y - 1 } else { y };
  let era = (if y >= 0 { y } else { y - 399 }) / 400;
  let yoe = y - era * 400;
  let mp = (m + 9) % 12;
  let doy = (153 * mp + 2) / 5 + d - 1;
  let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
  era * 146097 + doe - 719468
}

fn civil_from_days(z: i64) -> (i64, i64, i64) {
  let z = z + 719468;
  let era = (if z >= 0 { z } else { z - 146096 }) / 146097;
  let doe = z - era * 146097;
  let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
  let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
  let mp = (5 * doy + 2) / 153;
  let d = doy - (153 * mp + 2) / 5 + 1;
  let m = if mp < 10 { mp + 3 } else { mp - 9 };
  let y = yoe + era * 400 + if m <= 2 { 1 } else { 0 };
  (y, m, d)
}

fn is_leap(y: i64) -> bool {
  (y % 4 == 0 && y % 100 != 0) || y % 400 == 0
}

fn days_in_month(y: i64, m: i64) -> i64 {
  match m {
    2 if is_leap(y) => 29,
    2 => 28,
    4 | 6 | 9 | 11 => 30,
    _ => 31,
  }
}

fn make_date(y: f64, m: f64, d: f64) -> Result<f64, ErrorMessage> {
  if y.fract() != 0.0 || m.fract() != 0.0 || d.fract() != 0.0 {
    return Err(ErrorMessage::argument("year, month and day must be integers"));
  }
  let (y, m, d) = (y as i64, m as i64, d as i64);
  if !(1..=12).contains(&m) {
    return Err(ErrorMessage::domain(format!("month {} is not between 1 and 12", m)));
  }
  if d < 1 || d > days_in_month(y, m) {
    return Err(ErrorMessage::domain(format!("day {} does not exist in {}-{:02}", d, y, m)));
  }
  Ok(days_from_civil(y, m, d) as f64 * DAY)
}

/// ISO date, with the time of day when it is not midnight.
pub fn format_date(ms: f64) -> String {
  if !ms.is_finite() {
    return format!("Date({})", format_number(ms));
  }
  let days = (ms / DAY).floor();
  let (y, m, d) = civil_from_days(days as i64);
  let rest = (ms - days * DAY).round() as i64;
  if rest == 0 {
    return format!("{:04}-{:02}-{:02}", y, m, d);
  }
  let secs = rest / 1000;
  format!(
    "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
    y,
    m,
    d,
    secs / 3600,
    (secs / 60) % 60,
    secs % 60
  )
}

pub fn format_duration(ms: f64) -> String {
  let abs = ms.abs();
  let (amount, unit) = if abs < HOUR {
    (ms / MINUTE, "minutes")
  } else if abs < DAY {
    (ms / HOUR, "hours")
  } else if abs < YEAR {
    (ms / DAY, "days")
  } else {
    (ms / YEAR, "years")
  };
  format!("{} {}", format_number((amount * 100.0).round() / 100.0), unit)
}

fn parse_date(s: &str) -> Result<f64, ErrorMessage> {
  let re = DATE_RE.as_ref().map_err(|e| ErrorMessage::internal(e.to_string()))?;
  let caps = re
    .captures(s.trim())
    .ok_or_else(|| ErrorMessage::argument(format!("{:?} is not a date of the form YYYY-MM-DD", s)))?;
  let field = |i: usize| -> f64 {
    caps
      .get(i)
      .and_then(|m| m.as_str().parse::<f64>().ok())
      .unwrap_or(0.0)
  };
  let day = make_date(field(1), field(2), field(3))?;
  let (h, min, sec) = (field(4), field(5), field(6));
  if h > 23.0 || min > 59.0 || sec > 59.0 {
    return Err(ErrorMessage::domain(format!("{:?} has an invalid time of day", s)));
  }
  Ok(day + h * HOUR + min * MINUTE + sec * 1000.0)
}

fn from_year(year: f64) -> Result<f64, ErrorMessage> {
  let whole = year.floor();
  let start = make_date(whole, 1.0, 1.0)?;
  let end = make_date(whole + 1.0, 1.0, 1.0)?;
  Ok(start + (year - whole) * (end - start))
}

pub fn register(b: &mut RegistryBuilder) {
  b.add(
    FnEntry::new("Date", "make")
      .describe("A calendar date from year, month and day.")
      .def(vec![FrType::Number, FrType::Number, FrType::Number], |args, _| {
        Ok(Value::Date(make_date(number(&args[0])?, number(&args[1])?, number(&args[2])?)?))
      }),
  );
  b.add(
    FnEntry::new("Date", "fromYear")
      .describe("Start of the year; fractional years land proportionally inside it.")
      .def(vec![FrType::Number], |args, _| Ok(Value::Date(from_year(number(&args[0])?)?))),
  );
  b.add(
    FnEntry::new("Date", "fromUnixTime")
      .def(vec![FrType::Number], |args, _| Ok(Value::Date(number(&args[0])? * 1000.0))),
  );
  b.add(
    FnEntry::new("Date", "toUnixTime")
      .def(vec![FrType::Date], |args, _| Ok(Value::Number(date_ms(&args[0])? / 1000.0))),
  );
  b.add(
    FnEntry::new("Date", "fromString")
      .def(vec![FrType::String], |args, _| Ok(Value::Date(parse_date(string(&args[0])?)?))),
  );

  let units: [(&str, f64); 4] = [("Minutes", MINUTE), ("Hours", HOUR), ("Days", DAY), ("Years", YEAR)];
  for (unit, scale) in units {
    b.add(
      FnEntry::new("Duration", &format!("from{}", unit))
        .def(vec![FrType::Number], move |args, _| Ok(Value::Duration(number(&args[0])? * scale))),
    );
    b.add(
      FnEntry::new("Duration", &format!("to{}", unit))
        .def(vec![FrType::Duration], move |args, _| Ok(Value::Number(duration_ms(&args[0])? / scale))),
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn civil_days_round_trip() {
    assert_eq!(days_from_civil(1970, 1, 1), 0);
    assert_eq!(days_from_civil(2000, 3, 1), 11017);
    for z in [-1000, -1, 0, 59, 10957, 20000] {
      let (y, m, d) = civil_from_days(z);
      assert_eq!(days_from_civil(y, m, d), z);
    }
  }

  #[test]
  fn formats_dates_and_durations() {
    assert_eq!(format_date(make_date(2024.0, 2.0, 29.0).unwrap()), "2024-02-29");
    assert_eq!(format_date(parse_date("2020-01-02T03:04:05").unwrap()), "2020-01-02T03:04:05");
    assert_eq!(format_duration(90.0 * MINUTE), "1.5 hours");
    assert_eq!(format_duration(3.0 * DAY), "3 days");
  }

  #[test]
  fn rejects_impossible_dates() {
    assert!(make_date(2023.0, 2.0, 29.0).is_err());
    assert!(parse_date("2023-13-01").is_err());
    assert!(parse_date("yesterday").is_err());
  }

  #[test]
  fn fractional_years() {
    let mid = from_year(2021.5).unwrap();
    let start = make_date(2021.0, 1.0, 1.0).unwrap();
    assert_eq!((mid - start) / DAY, 182.5);
  }
}
