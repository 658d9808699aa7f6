//! Turning a caller's schedule into a complete, annotated crontab entry.

use std::path::Path;

use {
    chrono::{DateTime, Local, TimeZone},
    serde::{Deserialize, Serialize},
};

use crate::{Error, Result, entry::CrontabEntry, fingerprint::Fingerprint};

/// A schedule as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScheduleInput {
    /// Five cron fields (or an `@` macro); the job's command is appended.
    Expression(String),
    /// A fully built entry, command included, used as-is.
    Entry(CrontabEntry),
}

impl From<&str> for ScheduleInput {
    fn from(expr: &str) -> Self {
        Self::Expression(expr.to_string())
    }
}

impl From<String> for ScheduleInput {
    fn from(expr: String) -> Self {
        Self::Expression(expr)
    }
}

impl From<CrontabEntry> for ScheduleInput {
    fn from(entry: CrontabEntry) -> Self {
        Self::Entry(entry)
    }
}

impl TryFrom<serde_json::Value> for ScheduleInput {
    type Error = Error;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        match &value {
            serde_json::Value::String(expr) => Ok(Self::Expression(expr.clone())),
            serde_json::Value::Object(_) => serde_json::from_value::<CrontabEntry>(value.clone())
                .map(Self::Entry)
                .map_err(|_| unexpected_schedule(&value)),
            _ => Err(unexpected_schedule(&value)),
        }
    }
}

fn unexpected_schedule(value: &serde_json::Value) -> Error {
    Error::validation(format!(
        "expected a schedule expression or crontab entry, received {value}"
    ))
}

/// Build the canonical entry for `input`, bound to `command`, with
/// `annotation` appended to any annotation the caller already supplied.
pub fn normalize(input: &ScheduleInput, command: &str, annotation: &str) -> Result<CrontabEntry> {
    let mut entry = match input {
        ScheduleInput::Expression(expr) => CrontabEntry::from_expression(expr, command)?,
        ScheduleInput::Entry(entry) => {
            entry.validate()?;
            entry.clone()
        },
    };
    entry.append_comment(annotation);
    entry.validate()?;
    Ok(entry)
}

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %I:%M%P";

/// Annotation for a plain self-registering job.
#[must_use]
pub fn job_annotation<Tz: TimeZone>(
    script: &Path,
    owner: &str,
    fingerprint: &Fingerprint,
    at: &DateTime<Tz>,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "Created by {}:{owner} {} (Job ID {fingerprint})",
        script.display(),
        at.format(TIMESTAMP_FORMAT)
    )
}

/// Annotation for a data-collector job.
#[must_use]
pub fn collector_annotation<Tz: TimeZone>(
    owner: &str,
    fingerprint: &Fingerprint,
    at: &DateTime<Tz>,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "[Created by {owner} (Job ID {fingerprint}) {}]",
        at.format(TIMESTAMP_FORMAT)
    )
}

/// Current local time, for annotations.
#[must_use]
pub fn now() -> DateTime<Local> {
    Local::now()
}

/// Build the command line the OS scheduler runs: the interpreter (if any)
/// followed by the script path, quoted when it needs to be.
#[must_use]
pub fn command_line(interpreter: Option<&str>, script: &Path) -> String {
    let script = shell_quote(&script.display().to_string());
    match interpreter.map(str::trim).filter(|i| !i.is_empty()) {
        Some(interpreter) => format!("{interpreter} {script}"),
        None => script,
    }
}

fn shell_quote(word: &str) -> String {
    let plain = word.chars().all(|c| {
        c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '+' | ':' | ',' | '@')
    });
    if plain && !word.is_empty() {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::fingerprint::fingerprint,
        chrono::{NaiveDate, Utc},
        std::path::PathBuf,
    };

    fn at() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn expression_gets_command_and_annotation() {
        let entry = normalize(
            &ScheduleInput::from("*/5 * * * *"),
            "/bin/sh /opt/job.sh",
            "Created by test (Job ID example.1)",
        )
        .unwrap();
        assert_eq!(entry.minute, "*/5");
        assert_eq!(entry.command, "/bin/sh /opt/job.sh");
        assert_eq!(entry.comment, "Created by test (Job ID example.1)");
    }

    #[test]
    fn prebuilt_entry_keeps_its_command_and_comment() {
        let mut prebuilt =
            CrontabEntry::from_expression("0 6 * * 1-5", "/usr/bin/custom --flag").unwrap();
        prebuilt.append_comment("weekday mornings");

        let entry = normalize(
            &ScheduleInput::from(prebuilt),
            "/bin/sh /opt/ignored.sh",
            "(Job ID example.1)",
        )
        .unwrap();
        assert_eq!(entry.command, "/usr/bin/custom --flag");
        assert_eq!(entry.comment, "weekday mornings (Job ID example.1)");
        assert_eq!(entry.timing(), "0 6 * * 1-5");
    }

    #[test]
    fn invalid_expression_is_validation_error() {
        let err = normalize(&ScheduleInput::from("every five minutes"), "job", "x").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn invalid_prebuilt_entry_is_validation_error() {
        let entry = CrontabEntry {
            minute: "99".into(),
            hour: "*".into(),
            day_of_month: "*".into(),
            month: "*".into(),
            day_of_week: "*".into(),
            command: "job".into(),
            comment: String::new(),
            enabled: true,
        };
        assert!(
            normalize(&ScheduleInput::Entry(entry), "job", "x")
                .unwrap_err()
                .is_validation()
        );
    }

    #[test]
    fn json_string_and_object_are_accepted() {
        let from_string = ScheduleInput::try_from(serde_json::json!("0 * * * *")).unwrap();
        assert_eq!(from_string, ScheduleInput::from("0 * * * *"));

        let from_object = ScheduleInput::try_from(serde_json::json!({
            "minute": "0", "hour": "1", "day_of_month": "*", "month": "*",
            "day_of_week": "*", "command": "/opt/x.sh"
        }))
        .unwrap();
        assert!(matches!(from_object, ScheduleInput::Entry(e) if e.command == "/opt/x.sh"));
    }

    #[test]
    fn json_of_other_shapes_is_rejected() {
        for value in [
            serde_json::json!(5),
            serde_json::json!(null),
            serde_json::json!(["*/5", "*"]),
            serde_json::json!({ "minute": "0" }),
        ] {
            let err = ScheduleInput::try_from(value).unwrap_err();
            assert!(err.is_validation());
            assert!(err.to_string().contains("expected a schedule expression"));
        }
    }

    #[test]
    fn untagged_deserialize() {
        let input: ScheduleInput = serde_json::from_str("\"@daily\"").unwrap();
        assert_eq!(input, ScheduleInput::from("@daily"));
    }

    #[test]
    fn job_annotation_format() {
        let fp = fingerprint("example", &["/opt/example.sh"]);
        let note = job_annotation(Path::new("/opt/example.sh"), "demo::Example", &fp, &at());
        assert_eq!(
            note,
            format!("Created by /opt/example.sh:demo::Example 2024-03-09 02:05pm (Job ID {fp})")
        );
    }

    #[test]
    fn collector_annotation_format() {
        let fp = fingerprint("grades", &["schema.sql"]);
        let note = collector_annotation("GradeCollector", &fp, &at());
        assert_eq!(
            note,
            format!("[Created by GradeCollector (Job ID {fp}) 2024-03-09 02:05pm]")
        );
    }

    #[test]
    fn command_line_with_and_without_interpreter() {
        let script = PathBuf::from("/opt/jobs/sync.py");
        assert_eq!(
            command_line(Some("/usr/bin/python3"), &script),
            "/usr/bin/python3 /opt/jobs/sync.py"
        );
        assert_eq!(command_line(None, &script), "/opt/jobs/sync.py");
        assert_eq!(command_line(Some("  "), &script), "/opt/jobs/sync.py");
    }

    #[test]
    fn command_line_quotes_awkward_paths() {
        assert_eq!(
            command_line(Some("sh"), Path::new("/opt/my jobs/run.sh")),
            "sh '/opt/my jobs/run.sh'"
        );
        assert_eq!(
            command_line(None, Path::new("/opt/it's.sh")),
            r"'/opt/it'\''s.sh'"
        );
    }
}
