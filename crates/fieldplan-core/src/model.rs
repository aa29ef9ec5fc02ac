//! Domain types shared by the store, planner and scheduler.

use chrono::{DateTime, Datelike, Days, Duration, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stored task names are cut to this many characters.
pub const TASK_NAME_MAX_CHARS: usize = 50;

/// Priority used when the planner gives none (1 = most urgent).
pub const DEFAULT_PRIORITY: i64 = 3;
pub const MIN_PRIORITY: i64 = 1;
pub const MAX_PRIORITY: i64 = 3;

/// Longest accepted task period, in days. Longer spans are rejected at
/// normalization; stored rows beyond it are clipped when ranged.
pub const MAX_PERIOD_DAYS: u32 = 366;

/// Content containing any of these marks the task as pest control.
pub const PEST_KEYWORDS: &[&str] = &[
    "진딧물", "응애", "방제", "병해충", "살충제", "살균제", "해충", "전염병", "병해", "충해",
];

/// A cultivated field, owned by the surrounding system. Read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: i64,
    pub owner_id: i64,
    pub crop_name: String,
    #[serde(default)]
    pub address: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub geometry: Option<serde_json::Value>,
}

/// Inclusive calendar-day span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DayRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DayRange {
    /// `[start, start + period - 1]`; a zero period is treated as one day and
    /// the period is capped at [`MAX_PERIOD_DAYS`]. The end saturates at the
    /// last representable date.
    pub fn from_period(start: NaiveDate, period: u32) -> Self {
        let span = u64::from(period.clamp(1, MAX_PERIOD_DAYS)) - 1;
        Self {
            start,
            end: start
                .checked_add_days(Days::new(span))
                .unwrap_or(NaiveDate::MAX),
        }
    }

    /// Build a range, rejecting `end < start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// The whole calendar month.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(Self {
            start,
            end: next - Duration::days(1),
        })
    }

    /// Closed-interval overlap, boundary days included.
    pub fn overlaps(&self, other: &DayRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    pub fn intersect(&self, other: &DayRange) -> Option<DayRange> {
        DayRange::new(self.start.max(other.start), self.end.min(other.end))
    }

    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Every day in the range, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    /// `(year, month)` pairs this range touches, in order.
    pub fn months(&self) -> Vec<(i32, u32)> {
        let mut out = Vec::new();
        let (mut year, mut month) = (self.start.year(), self.start.month());
        loop {
            out.push((year, month));
            if (year, month) >= (self.end.year(), self.end.month()) {
                break;
            }
            if month == 12 {
                year += 1;
                month = 1;
            } else {
                month += 1;
            }
        }
        out
    }
}

impl fmt::Display for DayRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A persisted farm task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub owner_id: i64,
    pub field_id: i64,
    pub task_name: String,
    pub task_content: String,
    pub priority: i64,
    pub period: u32,
    /// "Repeat every N days" hint carried over from planning input.
    pub repeat_interval_hint: u32,
    /// Number of ledger days marked done.
    pub completed_day_count: u32,
    pub is_pest: bool,
    pub start_date: DateTime<FixedOffset>,
}

impl Task {
    pub fn first_day(&self) -> NaiveDate {
        self.start_date.date_naive()
    }

    pub fn occupied_range(&self) -> DayRange {
        DayRange::from_period(self.first_day(), self.period)
    }

    /// Name and content joined, the text compared for near-duplicates.
    pub fn text(&self) -> TaskText<'_> {
        TaskText {
            name: &self.task_name,
            content: &self.task_content,
        }
    }
}

/// Borrowed name + content pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskText<'a> {
    pub name: &'a str,
    pub content: &'a str,
}

impl TaskText<'_> {
    pub fn combined(&self) -> String {
        if self.content.is_empty() {
            self.name.to_string()
        } else {
            format!("{} {}", self.name, self.content)
        }
    }
}

/// A normalized candidate, ready to be checked and persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    /// Full name; truncation only happens at persistence.
    pub task_name: String,
    pub task_content: String,
    pub priority: i64,
    pub period: u32,
    pub repeat_interval_hint: u32,
    pub is_pest: bool,
    pub start_date: DateTime<FixedOffset>,
}

impl NewTask {
    pub fn first_day(&self) -> NaiveDate {
        self.start_date.date_naive()
    }

    pub fn occupied_range(&self) -> DayRange {
        DayRange::from_period(self.first_day(), self.period)
    }

    pub fn text(&self) -> TaskText<'_> {
        TaskText {
            name: &self.task_name,
            content: &self.task_content,
        }
    }

    /// Name as it is written to storage.
    pub fn stored_name(&self) -> String {
        truncate_chars(&self.task_name, TASK_NAME_MAX_CHARS)
    }
}

/// Partial update of a persisted task. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub task_name: Option<String>,
    pub task_content: Option<String>,
    pub priority: Option<i64>,
    pub period: Option<u32>,
    pub start_date: Option<DateTime<FixedOffset>>,
}

impl TaskPatch {
    /// True when the occupied range may move, so the ledger must be re-seeded.
    pub fn touches_range(&self) -> bool {
        self.period.is_some() || self.start_date.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Partial update as supplied by a caller, decoded by
/// [`crate::normalize::normalize_patch`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPatch {
    #[serde(default)]
    pub task_name: Option<String>,
    #[serde(default)]
    pub task_content: Option<String>,
    #[serde(default)]
    pub priority: Option<LooseNumber>,
    #[serde(default)]
    pub period: Option<LooseNumber>,
    #[serde(default)]
    pub start_date: Option<StartInput>,
}

/// Cut `s` to at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// True when `content` mentions any pest-control keyword.
pub fn mentions_pest(content: &str) -> bool {
    PEST_KEYWORDS.iter().any(|k| content.contains(k))
}

/// Daily ledger status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Done,
    #[default]
    Skip,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Skip => "skip",
        }
    }
}

impl FromStr for ProgressStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "done" => Ok(Self::Done),
            "skip" => Ok(Self::Skip),
            other => Err(format!("unknown status '{other}', expected done or skip")),
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub task_id: String,
    pub date: NaiveDate,
    pub status: ProgressStatus,
}

/// A number that may arrive as an integer, a float, or free text like `"3일"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<i64> for LooseNumber {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for LooseNumber {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Start date as supplied by the planner: ISO text or an already-typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StartInput {
    Text(String),
    Date(NaiveDate),
    Naive(NaiveDateTime),
    Zoned(DateTime<FixedOffset>),
}

impl From<String> for StartInput {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for StartInput {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<NaiveDate> for StartInput {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<NaiveDateTime> for StartInput {
    fn from(v: NaiveDateTime) -> Self {
        Self::Naive(v)
    }
}

impl From<DateTime<FixedOffset>> for StartInput {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Self::Zoned(v)
    }
}

impl From<StartInput> for String {
    fn from(v: StartInput) -> Self {
        match v {
            StartInput::Text(s) => s,
            StartInput::Date(d) => d.format("%Y-%m-%d").to_string(),
            StartInput::Naive(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
            StartInput::Zoned(dt) => dt.to_rfc3339(),
        }
    }
}

/// Unvalidated task descriptor as produced by the planner or an API caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    #[serde(default)]
    pub task_name: String,
    #[serde(default)]
    pub task_content: Option<String>,
    #[serde(default)]
    pub period: Option<LooseNumber>,
    #[serde(default)]
    pub cycle: Option<LooseNumber>,
    #[serde(default)]
    pub priority: Option<LooseNumber>,
    #[serde(default)]
    pub start_date: Option<StartInput>,
}

impl RawCandidate {
    pub fn new(name: &str, content: &str, start: impl Into<StartInput>) -> Self {
        Self {
            task_name: name.to_string(),
            task_content: Some(content.to_string()),
            start_date: Some(start.into()),
            ..Self::default()
        }
    }

    pub fn with_period(mut self, period: impl Into<LooseNumber>) -> Self {
        self.period = Some(period.into());
        self
    }

    pub fn with_cycle(mut self, cycle: impl Into<LooseNumber>) -> Self {
        self.cycle = Some(cycle.into());
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(LooseNumber::Int(priority));
        self
    }
}

/// A monthly planning keyword. Accepts `"관수"` or `{"keyword": "관수", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeywordInput {
    Plain(String),
    Detailed {
        #[serde(alias = "name", alias = "word")]
        keyword: String,
    },
}

impl KeywordInput {
    pub fn into_keyword(self) -> String {
        match self {
            Self::Plain(s) => s.trim().to_string(),
            Self::Detailed { keyword } => keyword.trim().to_string(),
        }
    }
}

/// Decode a mixed list of keyword shapes, dropping empty entries.
pub fn decode_keywords(inputs: Vec<KeywordInput>) -> Vec<String> {
    inputs
        .into_iter()
        .map(KeywordInput::into_keyword)
        .filter(|k| !k.is_empty())
        .collect()
}

/// Keywords for one field and calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyKeywords {
    pub field_id: i64,
    pub year: i32,
    pub month: u32,
    pub keywords: Vec<String>,
}
