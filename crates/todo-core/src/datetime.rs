use anyhow::anyhow;
use chrono::{
  DateTime,
  Local,
  NaiveDate,
  NaiveDateTime,
  SecondsFormat,
  Utc
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str =
  "%Y-%m-%dT%H:%M:%S";

/// ISO-8601 with millisecond precision
/// and a `Z` suffix, the same shape a
/// browser's `Date.toISOString` emits.
#[must_use]
pub fn format_iso(
  dt: DateTime<Utc>
) -> String {
  dt.to_rfc3339_opts(
    SecondsFormat::Millis,
    true
  )
}

#[must_use]
pub fn format_local(
  dt: DateTime<Utc>
) -> String {
  dt.with_timezone(&Local)
    .format("%Y-%m-%d %H:%M")
    .to_string()
}

/// Parses a user supplied creation
/// time. Accepts RFC 3339, a bare
/// `YYYY-MM-DDTHH:MM:SS` (read as UTC)
/// or a `YYYY-MM-DD` date (midnight UTC).
pub fn parse_date_arg(
  raw: &str
) -> anyhow::Result<DateTime<Utc>> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(anyhow!(
      "date cannot be empty"
    ));
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(
      trimmed
    )
  {
    return Ok(dt.with_timezone(&Utc));
  }

  if let Ok(ndt) =
    NaiveDateTime::parse_from_str(
      trimmed,
      DATETIME_FORMAT
    )
  {
    return Ok(ndt.and_utc());
  }

  match NaiveDate::parse_from_str(
    trimmed,
    DATE_FORMAT
  ) {
    | Ok(date) => date
      .and_hms_opt(0, 0, 0)
      .map(|ndt| ndt.and_utc())
      .ok_or_else(|| {
        anyhow!(
          "invalid date: {trimmed}"
        )
      }),
    | Err(err) => Err(anyhow!(
      "unrecognized date '{trimmed}': \
       {err}"
    ))
  }
}

pub mod iso_date_serde {
  use chrono::{
    DateTime,
    SubsecRound,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer
      .serialize_str(&super::format_iso(*dt))
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    DateTime::parse_from_rfc3339(&raw)
      .map(|dt| {
        dt.with_timezone(&Utc)
          .trunc_subsecs(3)
      })
      .map_err(serde::de::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc
  };

  use super::{
    format_iso,
    parse_date_arg
  };

  #[test]
  fn formats_with_millis_and_z() {
    let dt = Utc
      .with_ymd_and_hms(
        2024, 3, 1, 9, 30, 0
      )
      .single()
      .expect("valid time");
    assert_eq!(
      format_iso(dt),
      "2024-03-01T09:30:00.000Z"
    );
  }

  #[test]
  fn parses_dates_and_offsets() {
    let midnight =
      parse_date_arg("2024-03-01")
        .expect("parse date");
    assert_eq!(
      format_iso(midnight),
      "2024-03-01T00:00:00.000Z"
    );

    let shifted = parse_date_arg(
      "2024-03-01T10:00:00+02:00"
    )
    .expect("parse rfc3339");
    assert_eq!(
      format_iso(shifted),
      "2024-03-01T08:00:00.000Z"
    );

    let naive = parse_date_arg(
      "2024-03-01T10:15:00"
    )
    .expect("parse naive");
    assert_eq!(
      format_iso(naive),
      "2024-03-01T10:15:00.000Z"
    );
  }

  #[test]
  fn rejects_garbage() {
    assert!(
      parse_date_arg("soon").is_err()
    );
    assert!(
      parse_date_arg("  ").is_err()
    );
  }
}
