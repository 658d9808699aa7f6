//! Configuration validation engine.
//!
//! Checks a config file against the known schema, detects unknown or
//! misspelled fields, and checks every declared job the way registration
//! would, without touching any crontab.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use autocron_cron::{
    DuplicatePolicy, fingerprint::validate_identifier, schedule::normalize,
};

use crate::{
    loader::{find_config_file, parse_config_value},
    schema::{AutocronConfig, StoreConfig},
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "store", "job",
    /// "schedule", "file-ref", "policy"
    pub category: &'static str,
    /// Dotted path, e.g. "jobs[0].script"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    Array(Box<KnownKeys>),
    Leaf,
}

fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Array, Leaf, Struct};

    let entry = Struct(HashMap::from([
        ("minute", Leaf),
        ("hour", Leaf),
        ("day_of_month", Leaf),
        ("month", Leaf),
        ("day_of_week", Leaf),
        ("command", Leaf),
        ("comment", Leaf),
        ("enabled", Leaf),
    ]));

    Struct(HashMap::from([
        (
            "store",
            Struct(HashMap::from([
                ("kind", Leaf),
                ("user", Leaf),
                ("program", Leaf),
                ("path", Leaf),
            ])),
        ),
        (
            "registration",
            Struct(HashMap::from([("merge", Leaf), ("duplicates", Leaf)])),
        ),
        (
            "jobs",
            Array(Box::new(Struct(HashMap::from([
                ("identifier", Leaf),
                ("script", Leaf),
                ("interpreter", Leaf),
                ("schedule", entry),
            ])))),
        ),
    ]))
}

// ── Levenshtein distance ────────────────────────────────────────────────────

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&candidate| (candidate, levenshtein(needle, candidate)))
        .filter(|&(_, d)| d > 0 && d <= max_distance)
        .min_by_key(|&(candidate, d)| (d, candidate))
        .map(|(candidate, _)| candidate)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate the config file at `path`, or the discovered one when `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = path.map(Path::to_path_buf).or_else(find_config_file);

    let Some(actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Info,
                "file-ref",
                "",
                "no config file found; using defaults",
            )],
            config_path: None,
        };
    };

    let base = actual_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    let mut result = match std::fs::read_to_string(&actual_path) {
        Ok(content) => validate_str(
            &crate::env_subst::substitute_env(&content),
            &actual_path,
            &base,
        ),
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("failed to read config file: {e}"),
            )],
            config_path: None,
        },
    };
    result.config_path = Some(actual_path);
    result
}

/// Validate config text. The format is taken from `format_path`'s extension;
/// relative script paths resolve against `base`.
#[must_use]
pub fn validate_str(raw: &str, format_path: &Path, base: &Path) -> ValidationResult {
    let mut diagnostics = Vec::new();

    // 1. Syntax
    let value = match parse_config_value(raw, format_path) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("syntax error: {e}"),
            ));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    // 2. Unknown fields
    check_unknown_fields(&value, &build_schema_map(), "", &mut diagnostics);

    // 3. Types, then semantics on the typed config
    match serde_json::from_value::<AutocronConfig>(value) {
        Ok(config) => diagnostics.extend(check_config(&config, base)),
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(
    value: &serde_json::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match (value, schema) {
        (serde_json::Value::Object(map), KnownKeys::Struct(fields)) => {
            let mut known_keys: Vec<&str> = fields.keys().copied().collect();
            known_keys.sort_unstable();
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                if let Some(child_schema) = fields.get(key.as_str()) {
                    check_unknown_fields(child, child_schema, &path, diagnostics);
                    continue;
                }
                let level = if prefix.is_empty() {
                    "at top level "
                } else {
                    ""
                };
                let message = match suggest(key, &known_keys, 3) {
                    Some(s) => format!("unknown field {level}(did you mean \"{s}\"?)"),
                    None => format!("unknown field {level}"),
                };
                diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    "unknown-field",
                    path,
                    message.trim(),
                ));
            }
        },
        (serde_json::Value::Array(items), KnownKeys::Array(item_schema)) => {
            for (i, item) in items.iter().enumerate() {
                check_unknown_fields(item, item_schema, &format!("{prefix}[{i}]"), diagnostics);
            }
        },
        // Leaf or shape mismatch; type errors are reported separately.
        _ => {},
    }
}

/// Semantic checks on a parsed config. Relative script paths resolve
/// against `base`.
#[must_use]
pub fn check_config(config: &AutocronConfig, base: &Path) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if let StoreConfig::File { path } = &config.store {
        match path {
            None => diagnostics.push(Diagnostic::new(
                Severity::Error,
                "store",
                "store.path",
                "store.kind = \"file\" requires a path",
            )),
            Some(path) if path.is_relative() => diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "store",
                "store.path",
                format!(
                    "relative crontab path {} depends on the working directory",
                    path.display()
                ),
            )),
            Some(_) => {},
        }
    }

    if config.registration.duplicates == DuplicatePolicy::Prune {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "policy",
            "registration.duplicates",
            "duplicate entries carrying a job's fingerprint will be deleted",
        ));
    }

    if config.jobs.is_empty() {
        diagnostics.push(Diagnostic::new(Severity::Info, "job", "jobs", "no jobs declared"));
    }

    let mut seen = HashSet::new();
    for (i, job) in config.jobs.iter().enumerate() {
        let at = |field: &str| format!("jobs[{i}].{field}");

        if let Err(e) = validate_identifier(&job.identifier) {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "job",
                at("identifier"),
                e.to_string(),
            ));
        } else if !seen.insert(job.identifier.as_str()) {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "job",
                at("identifier"),
                format!("duplicate identifier \"{}\"", job.identifier),
            ));
        }

        if job.script.is_relative() {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "file-ref",
                at("script"),
                format!(
                    "relative script path {} resolves against {}",
                    job.script.display(),
                    base.display()
                ),
            ));
        }
        let script = job.script_from(base);
        if !script.is_file() {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "file-ref",
                at("script"),
                format!("script not found: {}", script.display()),
            ));
        }

        if let Err(e) = normalize(&job.schedule, &script.display().to_string(), "") {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "schedule",
                at("schedule"),
                e.to_string(),
            ));
        }
    }

    diagnostics
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, std::fs, tempfile::TempDir};

    fn toml(raw: &str, base: &Path) -> ValidationResult {
        validate_str(raw, Path::new("autocron.toml"), base)
    }

    fn find<'a>(result: &'a ValidationResult, path: &str) -> Option<&'a Diagnostic> {
        result.diagnostics.iter().find(|d| d.path == path)
    }

    fn with_script() -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("sync.sh"), "#!/bin/sh\n").unwrap();
        tmp
    }

    #[test]
    fn levenshtein_distances() {
        assert_eq!(levenshtein("store", "store"), 0);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("stor", "store"), 1);
        assert_eq!(levenshtein("jbos", "jobs"), 2);
    }

    #[test]
    fn empty_config_has_no_errors() {
        let result = toml("", Path::new("."));
        assert!(!result.has_errors());
        assert_eq!(result.count(Severity::Info), 1);
    }

    #[test]
    fn valid_config_no_errors() {
        let tmp = with_script();
        let raw = r#"
[store]
kind = "file"
path = "/etc/cron.d/app"

[[jobs]]
identifier = "sync"
script = "sync.sh"
interpreter = "/bin/sh"
schedule = "*/10 * * * *"
"#;
        let result = toml(raw, tmp.path());
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        // Relative script path is only a warning.
        assert_eq!(
            find(&result, "jobs[0].script").unwrap().severity,
            Severity::Warning
        );
    }

    #[test]
    fn syntax_error_detected() {
        let result = toml("[store\nkind = ", Path::new("."));
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].category, "syntax");
    }

    #[test]
    fn unknown_top_level_key_with_suggestion() {
        let result = toml("[stor]\nkind = \"system\"\n", Path::new("."));
        let d = find(&result, "stor").unwrap();
        assert_eq!(d.category, "unknown-field");
        assert!(d.message.contains("\"store\""), "{}", d.message);
    }

    #[test]
    fn unknown_key_inside_job() {
        let tmp = with_script();
        let raw = "[[jobs]]\nidentifier = \"a\"\nscript = \"sync.sh\"\nschedule = \"@daily\"\nscriptt = \"x\"\n";
        let result = toml(raw, tmp.path());
        let d = find(&result, "jobs[0].scriptt").unwrap();
        assert!(d.message.contains("\"script\""));
    }

    #[test]
    fn missing_script_is_error() {
        let result = toml(
            "[[jobs]]\nidentifier = \"a\"\nscript = \"/nonexistent/a.sh\"\nschedule = \"@daily\"\n",
            Path::new("."),
        );
        let d = find(&result, "jobs[0].script").unwrap();
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.category, "file-ref");
    }

    #[test]
    fn invalid_schedule_is_error() {
        let tmp = with_script();
        let result = toml(
            "[[jobs]]\nidentifier = \"a\"\nscript = \"sync.sh\"\nschedule = \"*/5 * * *\"\n",
            tmp.path(),
        );
        let d = find(&result, "jobs[0].schedule").unwrap();
        assert_eq!(d.category, "schedule");
        assert_eq!(d.severity, Severity::Error);
    }

    #[test]
    fn duplicate_and_empty_identifiers() {
        let tmp = with_script();
        let job = |id: &str| {
            format!("[[jobs]]\nidentifier = \"{id}\"\nscript = \"sync.sh\"\nschedule = \"@hourly\"\n")
        };
        let raw = format!("{}{}{}", job("a"), job("a"), job(""));
        let result = toml(&raw, tmp.path());
        assert!(
            find(&result, "jobs[1].identifier")
                .unwrap()
                .message
                .contains("duplicate")
        );
        assert_eq!(
            find(&result, "jobs[2].identifier").unwrap().severity,
            Severity::Error
        );
        assert!(find(&result, "jobs[0].identifier").is_none());
    }

    #[test]
    fn file_store_without_path_is_error() {
        let result = toml("[store]\nkind = \"file\"\n", Path::new("."));
        assert_eq!(find(&result, "store.path").unwrap().severity, Severity::Error);
    }

    #[test]
    fn prune_policy_warned() {
        let result = toml("[registration]\nduplicates = \"prune\"\n", Path::new("."));
        let d = find(&result, "registration.duplicates").unwrap();
        assert_eq!(d.severity, Severity::Warning);
    }

    #[test]
    fn unknown_policy_value_is_type_error() {
        let result = toml("[registration]\nmerge = \"everything\"\n", Path::new("."));
        assert!(result.diagnostics.iter().any(|d| d.category == "type-error"));
    }

    #[test]
    fn yaml_is_validated_too() {
        let tmp = with_script();
        let raw = "jobs:\n  - identifier: a\n    script: sync.sh\n    schedule: \"@daily\"\n    colour: red\n";
        let result = validate_str(raw, Path::new("autocron.yaml"), tmp.path());
        assert!(find(&result, "jobs[0].colour").is_some());
    }

    #[test]
    fn validate_reads_file_and_resolves_relative_scripts() {
        let tmp = with_script();
        let path = tmp.path().join("autocron.toml");
        fs::write(
            &path,
            "[[jobs]]\nidentifier = \"a\"\nscript = \"sync.sh\"\nschedule = \"@daily\"\n",
        )
        .unwrap();
        let result = validate(Some(&path));
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        assert_eq!(result.config_path, Some(path));
    }
}
