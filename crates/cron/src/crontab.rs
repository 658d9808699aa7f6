//! In-memory view of a whole crontab.
//!
//! The crontab is shared with other programs and people, so every line that
//! is not a schedule entry (environment assignments, comments, blank lines,
//! `@reboot` lines) is kept verbatim and written back in place.

use regex::Regex;

use crate::entry::CrontabEntry;

/// One line of a crontab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrontabLine {
    /// A schedule entry. `raw` holds the line as read until the entry is
    /// modified, so untouched entries keep their original spacing.
    Entry {
        entry: CrontabEntry,
        raw: Option<String>,
    },
    /// Anything that is not a schedule entry, preserved byte-for-byte.
    Other(String),
}

/// Ordered crontab content as loaded from a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Crontab {
    lines: Vec<CrontabLine>,
}

impl Crontab {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse crontab text. Never fails: unparseable lines become
    /// [`CrontabLine::Other`].
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let lines = text
            .lines()
            .map(|line| {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    return CrontabLine::Other(line.to_string());
                }
                match CrontabEntry::parse_line(line) {
                    Ok(entry) => CrontabLine::Entry {
                        entry,
                        raw: Some(line.to_string()),
                    },
                    Err(_) => CrontabLine::Other(line.to_string()),
                }
            })
            .collect();
        Self { lines }
    }

    /// Render to crontab text. Non-empty output always ends with a newline,
    /// which `crontab(1)` requires for the last entry to be read.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                CrontabLine::Entry { raw: Some(raw), .. } => out.push_str(raw),
                CrontabLine::Entry { entry, raw: None } => out.push_str(&entry.render()),
                CrontabLine::Other(raw) => out.push_str(raw),
            }
            out.push('\n');
        }
        out
    }

    #[must_use]
    pub fn lines(&self) -> &[CrontabLine] {
        &self.lines
    }

    /// All schedule entries in file order.
    pub fn entries(&self) -> impl Iterator<Item = &CrontabEntry> {
        self.lines.iter().filter_map(|line| match line {
            CrontabLine::Entry { entry, .. } => Some(entry),
            CrontabLine::Other(_) => None,
        })
    }

    /// Number of schedule entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries whose annotation matches `pattern`, in file order.
    #[must_use]
    pub fn find_by_regex(&self, pattern: &Regex) -> Vec<&CrontabEntry> {
        self.entries()
            .filter(|entry| pattern.is_match(&entry.comment))
            .collect()
    }

    /// Line indices of the entries whose annotation matches `pattern`.
    pub(crate) fn matching_lines(&self, pattern: &Regex) -> Vec<usize> {
        self.lines
            .iter()
            .enumerate()
            .filter_map(|(i, line)| match line {
                CrontabLine::Entry { entry, .. } if pattern.is_match(&entry.comment) => Some(i),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn entry_mut(&mut self, line: usize) -> Option<&mut CrontabEntry> {
        match self.lines.get_mut(line) {
            Some(CrontabLine::Entry { entry, raw }) => {
                *raw = None;
                Some(entry)
            },
            _ => None,
        }
    }

    /// Append a new entry at the end of the crontab.
    pub fn add(&mut self, entry: CrontabEntry) {
        self.lines.push(CrontabLine::Entry { entry, raw: None });
    }

    /// Remove the given line indices. Indices must come from
    /// [`Crontab::matching_lines`] on this same crontab.
    pub(crate) fn remove_lines(&mut self, lines: &[usize]) {
        let mut index = 0;
        self.lines.retain(|_| {
            let keep = !lines.contains(&index);
            index += 1;
            keep
        });
    }

    /// Remove every entry whose annotation matches `pattern`. Returns how
    /// many entries were removed.
    pub fn remove_matching(&mut self, pattern: &Regex) -> usize {
        let matches = self.matching_lines(pattern);
        self.remove_lines(&matches);
        matches.len()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const SHARED: &str = "\
SHELL=/bin/sh
MAILTO=ops@example.com

# m h dom mon dow command
@reboot /usr/local/bin/warmup
30 2 * * * /usr/bin/logrotate /etc/logrotate.conf
*/5 * * * * php /srv/poll.php # Created by poll (Job ID poll.abc)
#0 * * * * /opt/disabled.sh # Created by x (Job ID x.def)
";

    #[test]
    fn parse_separates_entries_from_other_lines() {
        let crontab = Crontab::parse(SHARED);
        assert_eq!(crontab.lines().len(), 8);
        assert_eq!(crontab.len(), 3);
        assert!(matches!(&crontab.lines()[4], CrontabLine::Other(l) if l.starts_with("@reboot")));
    }

    #[test]
    fn render_preserves_unrelated_lines() {
        let crontab = Crontab::parse(SHARED);
        assert_eq!(crontab.render(), SHARED);
    }

    #[test]
    fn untouched_entries_keep_their_spacing() {
        let text = "0  3 *  * *\t/opt/nightly.sh   # Job ID a.1\n* * * * * /opt/b.sh # Job ID b.2\n";
        let mut crontab = Crontab::parse(text);
        assert_eq!(crontab.render(), text);

        let line = crontab.matching_lines(&Regex::new("b\\.2").unwrap())[0];
        crontab.entry_mut(line).unwrap().minute = "*/2".into();
        assert_eq!(
            crontab.render(),
            "0  3 *  * *\t/opt/nightly.sh   # Job ID a.1\n*/2 * * * * /opt/b.sh # Job ID b.2\n"
        );
    }

    #[test]
    fn macro_entries_are_searchable_and_kept_verbatim() {
        let text = "@daily /bin/sh /opt/example.sh # Created by x (Job ID example.7)\n";
        let crontab = Crontab::parse(text);
        assert_eq!(crontab.len(), 1);
        assert_eq!(crontab.find_by_regex(&Regex::new("example\\.7").unwrap()).len(), 1);
        assert_eq!(crontab.render(), text);
    }

    #[test]
    fn render_empty_is_empty() {
        assert_eq!(Crontab::new().render(), "");
        assert!(Crontab::parse("").is_empty());
    }

    #[test]
    fn find_by_regex_matches_annotation_only() {
        let crontab = Crontab::parse(SHARED);
        let found = crontab.find_by_regex(&Regex::new("poll\\.abc").unwrap());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].command, "php /srv/poll.php");

        // "logrotate" only appears in a command, never in an annotation.
        assert!(
            crontab
                .find_by_regex(&Regex::new("logrotate").unwrap())
                .is_empty()
        );
    }

    #[test]
    fn disabled_entries_are_still_found() {
        let crontab = Crontab::parse(SHARED);
        let found = crontab.find_by_regex(&Regex::new("x\\.def").unwrap());
        assert_eq!(found.len(), 1);
        assert!(!found[0].enabled);
    }

    #[test]
    fn add_appends_at_end() {
        let mut crontab = Crontab::parse(SHARED);
        let mut entry = CrontabEntry::from_expression("0 0 * * *", "/opt/new.sh").unwrap();
        entry.append_comment("Job ID new.123");
        crontab.add(entry);

        let rendered = crontab.render();
        assert!(rendered.starts_with(SHARED));
        assert!(rendered.ends_with("0 0 * * * /opt/new.sh # Job ID new.123\n"));
    }

    #[test]
    fn remove_matching_only_removes_matches() {
        let mut crontab = Crontab::parse(SHARED);
        let removed = crontab.remove_matching(&Regex::new("Job ID").unwrap());
        assert_eq!(removed, 2);
        assert_eq!(crontab.len(), 1);
        assert!(crontab.render().contains("MAILTO=ops@example.com"));
        assert!(crontab.render().contains("logrotate"));
    }

    #[test]
    fn entry_mut_ignores_other_lines() {
        let mut crontab = Crontab::parse(SHARED);
        assert!(crontab.entry_mut(0).is_none());
        assert!(crontab.entry_mut(5).is_some());
        assert!(crontab.entry_mut(100).is_none());
    }
}
