use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Deepest allowed level; roots sit at 0, so five levels exist in total.
pub const MAX_DEPTH: usize = 4;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Wall-clock time of day at minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(self) -> u8 {
        self.hour
    }

    pub fn minute(self) -> u8 {
        self.minute
    }

    pub fn minute_of_day(self) -> u32 {
        u32::from(self.hour) * 60 + u32::from(self.minute)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for ClockTime {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        static CLOCK_RE: OnceLock<Option<Regex>> = OnceLock::new();
        let clock_re = CLOCK_RE
            .get_or_init(|| {
                Regex::new(r"(?i)^(?P<hour>\d{1,2})(?::(?P<minute>\d{2}))?\s*(?P<ampm>[ap]m)?$")
                    .ok()
            })
            .as_ref()
            .ok_or_else(|| anyhow!("internal regex compile failure"))?;

        let caps = clock_re
            .captures(s.trim())
            .ok_or_else(|| anyhow!("expected HH:MM clock time, got: {s}"))?;
        let raw_hour: u8 = caps["hour"].parse()?;
        let minute: u8 = match caps.name("minute") {
            Some(m) => m.as_str().parse()?,
            None if caps.name("ampm").is_some() => 0,
            None => return Err(anyhow!("expected HH:MM clock time, got: {s}")),
        };

        let hour = match caps.name("ampm").map(|m| m.as_str().to_ascii_lowercase()) {
            Some(ampm) => {
                if raw_hour == 0 || raw_hour > 12 {
                    return Err(anyhow!("hour out of range for 12-hour clock: {s}"));
                }
                match (ampm.as_str(), raw_hour) {
                    ("am", 12) => 0,
                    ("am", h) => h,
                    ("pm", 12) => 12,
                    (_, h) => h + 12,
                }
            }
            None => raw_hour,
        };

        Self::new(hour, minute).ok_or_else(|| anyhow!("clock time out of range: {s}"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Priority {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl Priority {
    /// Sort tier, lower first.
    pub fn tier(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
            Priority::None => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::None => "",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Priority::None),
            "low" | "l" => Ok(Priority::Low),
            "medium" | "m" => Ok(Priority::Medium),
            "high" | "h" => Ok(Priority::High),
            other => Err(anyhow!("unknown priority: {other}")),
        }
    }
}

impl Serialize for Priority {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            Some(value) => value.parse().map_err(serde::de::Error::custom),
            None => Ok(Priority::None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,

    #[serde(default)]
    pub parent_id: Option<TaskId>,

    pub title: String,

    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,

    #[serde(default, with = "clock_time_serde::option")]
    pub start_time: Option<ClockTime>,

    #[serde(default, with = "clock_time_serde::option")]
    pub end_time: Option<ClockTime>,

    #[serde(default)]
    pub duration: Option<u32>,

    #[serde(default)]
    pub is_completed: bool,

    #[serde(default)]
    pub urgent: bool,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub custom_order: i64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub total_time: u64,

    #[serde(default)]
    pub is_timer_running: bool,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Task {
    pub fn new(title: String, now: DateTime<Utc>) -> Self {
        Self {
            id: TaskId::generate(),
            parent_id: None,
            title,
            due_date: None,
            start_time: None,
            end_time: None,
            duration: None,
            is_completed: false,
            urgent: false,
            priority: Priority::None,
            custom_order: 0,
            created_at: now,
            updated_at: now,
            total_time: 0,
            is_timer_running: false,
            extra: BTreeMap::new(),
        }
    }

    /// Both ends of the scheduled window, if the task has a complete one.
    pub fn window(&self) -> Option<(ClockTime, ClockTime)> {
        Some((self.start_time?, self.end_time?))
    }

    pub fn crosses_midnight(&self) -> bool {
        self.window().is_some_and(|(start, end)| end < start)
    }
}

pub mod clock_time_serde {
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use tracing::warn;

        use crate::task::ClockTime;

        pub fn serialize<S>(value: &Option<ClockTime>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(time) => serializer.serialize_str(&time.to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<ClockTime>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw = Option::<String>::deserialize(deserializer)?;
            match raw.as_deref().map(str::trim) {
                None | Some("") => Ok(None),
                Some(text) => match text.parse::<ClockTime>() {
                    Ok(time) => Ok(Some(time)),
                    Err(err) => {
                        warn!(value = text, error = %err, "dropping unreadable clock time");
                        Ok(None)
                    }
                },
            }
        }
    }
}
