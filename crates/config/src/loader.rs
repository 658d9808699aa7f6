use std::path::{Path, PathBuf};

use {anyhow::Context, tracing::debug};

use crate::{env_subst::substitute_env, schema::AutocronConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "autocron.toml",
    "autocron.yaml",
    "autocron.yml",
    "autocron.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<AutocronConfig> {
    let raw = read_substituted(path)?;
    parse_config(&raw, path).with_context(|| format!("failed to parse {}", path.display()))
}

/// Load the config file as an untyped value, after env substitution.
pub fn load_config_value(path: &Path) -> anyhow::Result<serde_json::Value> {
    let raw = read_substituted(path)?;
    parse_config_value(&raw, path)
}

fn read_substituted(path: &Path) -> anyhow::Result<String> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(substitute_env(&raw))
}

/// Load `explicit` if given, else the first config file found in the
/// standard locations, else the defaults.
///
/// Returns the path that was loaded, if any.
pub fn load_or_discover(
    explicit: Option<&Path>,
) -> anyhow::Result<(AutocronConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    };
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            Ok((load_config(&path)?, Some(path)))
        },
        None => {
            debug!("no config file found, using defaults");
            Ok((AutocronConfig::default(), None))
        },
    }
}

/// Find the first config file in standard locations.
///
/// Search order:
/// 1. `./autocron.{toml,yaml,yml,json}`
/// 2. `<user config dir>/autocron.{toml,yaml,yml,json}`
pub fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/autocron/` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "autocron").map(|d| d.config_dir().to_path_buf())
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("toml")
}

pub(crate) fn parse_config(raw: &str, path: &Path) -> anyhow::Result<AutocronConfig> {
    match extension(path) {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        ext => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

pub(crate) fn parse_config_value(raw: &str, path: &Path) -> anyhow::Result<serde_json::Value> {
    match extension(path) {
        "toml" => {
            let v: toml::Value = toml::from_str(raw)?;
            Ok(serde_json::to_value(v)?)
        },
        "yaml" | "yml" => {
            let v: serde_yaml::Value = serde_yaml::from_str(raw)?;
            Ok(serde_json::to_value(v)?)
        },
        "json" => Ok(serde_json::from_str(raw)?),
        ext => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::schema::StoreConfig, std::fs, tempfile::TempDir};

    #[test]
    fn loads_each_format() {
        let tmp = TempDir::new().unwrap();
        let toml_path = tmp.path().join("autocron.toml");
        fs::write(
            &toml_path,
            "[[jobs]]\nidentifier = \"a\"\nscript = \"/opt/a.sh\"\nschedule = \"@daily\"\n",
        )
        .unwrap();
        let yaml_path = tmp.path().join("autocron.yaml");
        fs::write(
            &yaml_path,
            "jobs:\n  - identifier: a\n    script: /opt/a.sh\n    schedule: \"@daily\"\n",
        )
        .unwrap();
        let json_path = tmp.path().join("autocron.json");
        fs::write(
            &json_path,
            r#"{"jobs": [{"identifier": "a", "script": "/opt/a.sh", "schedule": "@daily"}]}"#,
        )
        .unwrap();

        for path in [toml_path, yaml_path, json_path] {
            let config = load_config(&path).unwrap();
            assert_eq!(config.jobs.len(), 1, "{}", path.display());
            assert_eq!(config.jobs[0].identifier, "a");
        }
    }

    #[test]
    fn substitutes_env_before_parsing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("autocron.toml");
        fs::write(
            &path,
            "[store]\nkind = \"file\"\npath = \"${AUTOCRON_TEST_UNSET_DIR:-/var/spool}/crontab\"\n",
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.store, StoreConfig::File {
            path: Some(PathBuf::from("/var/spool/crontab"))
        });
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("autocron.ini");
        fs::write(&path, "").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("unsupported config format"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(load_or_discover(Some(&tmp.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn explicit_file_is_loaded() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.toml");
        fs::write(&path, "[registration]\nduplicates = \"prune\"\n").unwrap();
        let (config, loaded) = load_or_discover(Some(&path)).unwrap();
        assert_eq!(loaded.as_deref(), Some(path.as_path()));
        assert_eq!(
            config.registration.duplicates,
            autocron_cron::DuplicatePolicy::Prune
        );
    }
}
