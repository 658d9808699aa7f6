//! A single crontab line: five timing fields, a command and a free-text
//! annotation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One of the five timing columns of a crontab line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
}

const MONTH_NAMES: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAY_NAMES: &[&str] = &["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Minute,
        Field::Hour,
        Field::DayOfMonth,
        Field::Month,
        Field::DayOfWeek,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::DayOfMonth => "day-of-month",
            Self::Month => "month",
            Self::DayOfWeek => "day-of-week",
        }
    }

    /// Inclusive numeric bounds. Day-of-week accepts both 0 and 7 for Sunday.
    fn bounds(self) -> (u32, u32) {
        match self {
            Self::Minute => (0, 59),
            Self::Hour => (0, 23),
            Self::DayOfMonth => (1, 31),
            Self::Month => (1, 12),
            Self::DayOfWeek => (0, 7),
        }
    }

    fn parse_value(self, token: &str) -> Option<u32> {
        if let Ok(n) = token.parse::<u32>() {
            return Some(n);
        }
        let lower = token.to_ascii_lowercase();
        match self {
            Self::Month => MONTH_NAMES
                .iter()
                .position(|m| *m == lower)
                .map(|i| i as u32 + 1),
            Self::DayOfWeek => WEEKDAY_NAMES
                .iter()
                .position(|d| *d == lower)
                .map(|i| i as u32),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Check one timing field against the crontab grammar: a comma-separated
/// list of `*`, `N` or `N-M`, each with an optional `/STEP`.
pub fn validate_field(field: Field, expr: &str) -> Result<()> {
    let invalid = |why: &str| Error::validation(format!("invalid {field} field '{expr}': {why}"));

    if expr.is_empty() {
        return Err(invalid("empty"));
    }
    let (min, max) = field.bounds();

    for item in expr.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => (range, Some(step)),
            None => (item, None),
        };

        if let Some(step) = step {
            match step.parse::<u32>() {
                Ok(0) => return Err(invalid("step must be greater than zero")),
                Ok(_) => {},
                Err(_) => return Err(invalid("step is not a number")),
            }
        }

        if range == "*" {
            continue;
        }

        let (start, end) = match range.split_once('-') {
            Some((a, b)) => (a, Some(b)),
            None => (range, None),
        };
        let start = field
            .parse_value(start)
            .ok_or_else(|| invalid("unrecognised value"))?;
        let end = match end {
            Some(end) => field
                .parse_value(end)
                .ok_or_else(|| invalid("unrecognised value"))?,
            None => start,
        };
        if start < min || end > max {
            return Err(invalid(&format!("values must be within {min}-{max}")));
        }
        if start > end {
            return Err(invalid("range start is after range end"));
        }
    }
    Ok(())
}

/// Expand an `@` schedule macro into its five-field form.
fn expand_macro(expr: &str) -> Result<[&'static str; 5]> {
    match expr.to_ascii_lowercase().as_str() {
        "@yearly" | "@annually" => Ok(["0", "0", "1", "1", "*"]),
        "@monthly" => Ok(["0", "0", "1", "*", "*"]),
        "@weekly" => Ok(["0", "0", "*", "*", "0"]),
        "@daily" | "@midnight" => Ok(["0", "0", "*", "*", "*"]),
        "@hourly" => Ok(["0", "*", "*", "*", "*"]),
        "@reboot" => Err(Error::validation(
            "@reboot is not a recurring schedule and cannot be registered",
        )),
        other => Err(Error::validation(format!(
            "unknown schedule macro '{other}'"
        ))),
    }
}

fn default_true() -> bool {
    true
}

/// One scheduled entry of a crontab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrontabEntry {
    pub minute: String,
    pub hour: String,
    pub day_of_month: String,
    pub month: String,
    pub day_of_week: String,
    /// Full command line executed by the OS scheduler.
    pub command: String,
    /// Annotation written after the command as `# ...`.
    #[serde(default)]
    pub comment: String,
    /// Disabled entries are written commented out.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl CrontabEntry {
    /// Build an entry from a schedule expression (five fields or an `@` macro)
    /// and a command line.
    pub fn from_expression(expr: &str, command: &str) -> Result<Self> {
        let expr = expr.trim();
        let fields: Vec<&str> = if expr.starts_with('@') {
            expand_macro(expr)?.to_vec()
        } else {
            expr.split_whitespace().collect()
        };
        if fields.len() != 5 {
            return Err(Error::validation(format!(
                "expected five timing fields (minute hour day-of-month month day-of-week), got \
                 '{expr}'"
            )));
        }

        let entry = Self {
            minute: fields[0].to_string(),
            hour: fields[1].to_string(),
            day_of_month: fields[2].to_string(),
            month: fields[3].to_string(),
            day_of_week: fields[4].to_string(),
            command: command.trim().to_string(),
            comment: String::new(),
            enabled: true,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Parse one crontab line. A leading `#` followed by a valid entry is read
    /// as a disabled entry. Schedule macros such as `@daily` are expanded to
    /// their five fields; `@reboot` lines are rejected.
    pub fn parse_line(line: &str) -> Result<Self> {
        let trimmed = line.trim();
        let (enabled, body) = match trimmed.strip_prefix('#') {
            Some(rest) => (false, rest.trim_start()),
            None => (true, trimmed),
        };
        let missing = || {
            Error::validation(format!(
                "expected five timing fields and a command: '{trimmed}'"
            ))
        };

        let mut rest = body;
        let mut fields = Vec::with_capacity(5);
        if body.starts_with('@') {
            let (token, tail) = next_token(body).ok_or_else(missing)?;
            fields.extend(expand_macro(token)?);
            rest = tail;
        } else {
            for _ in 0..5 {
                let (token, tail) = next_token(rest).ok_or_else(missing)?;
                fields.push(token);
                rest = tail;
            }
        }
        if rest.trim().is_empty() {
            return Err(missing());
        }

        let (command, comment) = split_comment(rest.trim());
        let entry = Self {
            minute: fields[0].to_string(),
            hour: fields[1].to_string(),
            day_of_month: fields[2].to_string(),
            month: fields[3].to_string(),
            day_of_week: fields[4].to_string(),
            command: command.to_string(),
            comment: comment.to_string(),
            enabled,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Validate the timing fields and the command.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in Field::ALL.iter().zip(self.timing_fields()) {
            validate_field(*field, value)?;
        }
        if self.command.trim().is_empty() {
            return Err(Error::validation("command is empty"));
        }
        if self.command.contains(['\n', '\r']) || self.comment.contains(['\n', '\r']) {
            return Err(Error::validation(
                "command and comment must fit on a single line",
            ));
        }
        Ok(())
    }

    /// The five timing fields in crontab order.
    #[must_use]
    pub fn timing_fields(&self) -> [&str; 5] {
        [
            &self.minute,
            &self.hour,
            &self.day_of_month,
            &self.month,
            &self.day_of_week,
        ]
    }

    /// The timing fields joined as they appear on the line.
    #[must_use]
    pub fn timing(&self) -> String {
        self.timing_fields().join(" ")
    }

    #[must_use]
    pub fn same_schedule(&self, other: &Self) -> bool {
        self.timing_fields() == other.timing_fields()
    }

    /// Overwrite the five timing fields with those of `other`.
    pub fn copy_schedule_from(&mut self, other: &Self) {
        self.minute.clone_from(&other.minute);
        self.hour.clone_from(&other.hour);
        self.day_of_month.clone_from(&other.day_of_month);
        self.month.clone_from(&other.month);
        self.day_of_week.clone_from(&other.day_of_week);
    }

    /// Append `note` to the existing comment, separated by a space.
    pub fn append_comment(&mut self, note: &str) {
        let note = note.trim();
        if note.is_empty() {
            return;
        }
        if self.comment.trim().is_empty() {
            self.comment = note.to_string();
        } else {
            self.comment = format!("{} {note}", self.comment.trim_end());
        }
    }

    /// Render the entry as a single crontab line (no trailing newline).
    #[must_use]
    pub fn render(&self) -> String {
        let mut line = String::new();
        if !self.enabled {
            line.push('#');
        }
        line.push_str(&self.timing());
        line.push(' ');
        line.push_str(self.command.trim());
        if !self.comment.trim().is_empty() {
            line.push_str(" # ");
            line.push_str(self.comment.trim());
        }
        line
    }
}

impl fmt::Display for CrontabEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn next_token(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    let end = input.find(char::is_whitespace).unwrap_or(input.len());
    Some((&input[..end], &input[end..]))
}

/// Split `command # comment` at the first `#` preceded by whitespace.
fn split_comment(rest: &str) -> (&str, &str) {
    let hash = rest
        .char_indices()
        .find(|&(i, c)| c == '#' && i > 0 && rest[..i].ends_with(char::is_whitespace));
    match hash {
        Some((i, _)) => (rest[..i].trim_end(), rest[i + 1..].trim()),
        None => (rest, ""),
    }
}
