/// Replace `${VAR}` and `${VAR:-fallback}` placeholders in raw config text.
///
/// A placeholder whose variable is unset and has no fallback is left as-is.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated, keep the remainder verbatim.
            out.push_str(&rest[start..]);
            return out;
        };

        let body = &after[..end];
        let (name, fallback) = match body.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (body, None),
        };
        match lookup(name).or_else(|| fallback.map(str::to_string)) {
            Some(value) if !name.is_empty() => out.push_str(&value),
            _ => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "CRON_USER" => Some("www-data".to_string()),
            "EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_known_var() {
        assert_eq!(
            substitute_env_with("user = \"${CRON_USER}\"", lookup),
            "user = \"www-data\""
        );
        assert_eq!(substitute_env_with("x${EMPTY}y", lookup), "xy");
    }

    #[test]
    fn fallback_used_when_unset() {
        assert_eq!(
            substitute_env_with("${JOBS_DIR:-/opt/jobs}/sync.sh", lookup),
            "/opt/jobs/sync.sh"
        );
        assert_eq!(substitute_env_with("${CRON_USER:-root}", lookup), "www-data");
    }

    #[test]
    fn leaves_unknown_and_malformed() {
        assert_eq!(substitute_env_with("${NOPE}", lookup), "${NOPE}");
        assert_eq!(substitute_env_with("${}", lookup), "${}");
        assert_eq!(substitute_env_with("a ${CRON_USER", lookup), "a ${CRON_USER");
    }

    #[test]
    fn no_placeholders() {
        assert_eq!(substitute_env("*/5 * * * * $HOME/x"), "*/5 * * * * $HOME/x");
    }
}
