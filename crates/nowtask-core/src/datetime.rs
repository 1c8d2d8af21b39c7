use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  LocalResult,
  NaiveDate,
  TimeZone,
  Timelike,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "nowtask-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "NOWTASK_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "NOWTASK_TIME_CONFIG";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// The wall clock as the engine sees
/// it: a calendar day plus the minute of
/// that day.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct LocalNow {
  pub day:    NaiveDate,
  pub minute: u32
}

impl LocalNow {
  #[must_use]
  pub fn at(
    now: DateTime<Utc>,
    tz: &Tz
  ) -> Self {
    let local = now.with_timezone(tz);
    Self {
      day:    local.date_naive(),
      minute: local.hour() * 60
        + local.minute()
    }
  }
}

pub fn project_timezone() -> &'static Tz
{
  static PROJECT_TZ: OnceLock<Tz> =
    OnceLock::new();
  PROJECT_TZ.get_or_init(
    resolve_project_timezone
  )
}

#[must_use]
pub fn calendar_day(
  dt: DateTime<Utc>,
  tz: &Tz
) -> NaiveDate {
  dt.with_timezone(tz).date_naive()
}

/// Midnight of `day` in `tz`, as UTC.
///
/// Ambiguous midnights take the earlier
/// instant; a midnight skipped by a DST
/// jump resolves to the first hour that
/// exists.
#[must_use]
pub fn day_start_utc(
  day: NaiveDate,
  tz: &Tz
) -> DateTime<Utc> {
  let midnight = day.and_time(
    chrono::NaiveTime::MIN
  );
  match tz.from_local_datetime(&midnight)
  {
    | LocalResult::Single(local) => {
      local.with_timezone(&Utc)
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::debug!(
        %day,
        "ambiguous local midnight; using earliest"
      );
      first.min(second).with_timezone(&Utc)
    }
    | LocalResult::None => {
      tracing::warn!(
        %day,
        timezone = %tz,
        "local midnight does not exist; shifting forward"
      );
      (1..=3)
        .find_map(|hours| {
          tz.from_local_datetime(
            &(midnight
              + Duration::hours(hours))
          )
          .earliest()
        })
        .map_or_else(
          || midnight.and_utc(),
          |local| {
            local.with_timezone(&Utc)
          }
        )
    }
  }
}

fn resolve_project_timezone() -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  tracing::debug!(
    "no project timezone configured; using UTC"
  );
  chrono_tz::UTC
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  timezone_from_toml(
    &raw,
    &format!("file:{}", path.display())
  )
}

fn timezone_from_toml(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let parsed = match toml::from_str::<
    TimezoneConfig
  >(raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        source,
        error = %err,
        "failed parsing timezone config"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      source,
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    source
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured project timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Resolves a day argument relative to
/// `today`.
///
/// Accepts `YYYY-MM-DD`,
/// today/tomorrow/yesterday, weekday
/// names (next occurrence) and `+Nd` /
/// `-Nd` offsets.
#[tracing::instrument(fields(input = input))]
pub fn parse_day_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return shift_days(today, 1);
    }
    | "yesterday" => {
      return shift_days(today, -1);
    }
    | _ => {}
  }

  if let Some(target) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today, target
    ));
  }

  if let Some(rest) = lower
    .strip_suffix('d')
    .filter(|rest| {
      rest.starts_with('+')
        || rest.starts_with('-')
    })
  {
    let offset: i64 =
      rest.parse().with_context(|| {
        format!(
          "invalid day offset: {input}"
        )
      })?;
    return shift_days(today, offset);
  }

  NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .with_context(|| {
    format!(
      "unrecognized day: {input} \
       (expected YYYY-MM-DD, \
       today/tomorrow/yesterday, a \
       weekday name or +Nd)"
    )
  })
}

fn shift_days(
  day: NaiveDate,
  offset: i64
) -> anyhow::Result<NaiveDate> {
  day
    .checked_add_signed(Duration::days(
      offset
    ))
    .ok_or_else(|| {
      anyhow!(
        "day offset out of range: \
         {offset}"
      )
    })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_signed(Duration::days(
      delta
    ))
    .unwrap_or(from)
}
