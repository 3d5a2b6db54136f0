//! Per-plugin results of a loading run

use std::fmt;

/// Where a candidate was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Bundled,
    /// `<cwd>/<pluginDir>`
    Local,
    /// `dependencies`/`devDependencies` of the project
    Dependency,
    /// npm/yarn global roots
    Global,
    /// Loaded through the `debug` command
    Debug,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Source::Bundled => "bundled",
            Source::Local => "local",
            Source::Dependency => "dependency",
            Source::Global => "global",
            Source::Debug => "debug",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Installed; the commands it added to the dispatcher
    Loaded { commands: Vec<String> },
    /// Never invoked
    Skipped { reason: String },
    /// Invoked and failed, or its package was unreadable
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadEntry {
    pub id: String,
    pub source: Source,
    pub outcome: Outcome,
}

impl LoadEntry {
    pub fn is_loaded(&self) -> bool {
        matches!(self.outcome, Outcome::Loaded { .. })
    }
}

/// Every load attempt of a run, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    entries: Vec<LoadEntry>,
}

impl LoadReport {
    pub fn push(&mut self, entry: LoadEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LoadEntry] {
        &self.entries
    }

    /// First entry recorded for `id`
    pub fn get(&self, id: &str) -> Option<&LoadEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn loaded(&self) -> impl Iterator<Item = &LoadEntry> {
        self.entries.iter().filter(|e| e.is_loaded())
    }

    pub fn failed(&self) -> impl Iterator<Item = &LoadEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, Outcome::Failed { .. }))
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.id == id && e.is_loaded())
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let skipped = self
            .entries
            .iter()
            .filter(|e| matches!(e.outcome, Outcome::Skipped { .. }))
            .count();
        write!(
            f,
            "{} loaded, {} skipped, {} failed",
            self.loaded().count(),
            skipped,
            self.failed().count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, outcome: Outcome) -> LoadEntry {
        LoadEntry {
            id: id.to_string(),
            source: Source::Local,
            outcome,
        }
    }

    #[test]
    fn test_report_summary() {
        let mut report = LoadReport::default();
        report.push(entry(
            "merry-plugin-a",
            Outcome::Loaded {
                commands: vec!["a".to_string()],
            },
        ));
        report.push(entry(
            "merry-plugin-a",
            Outcome::Skipped {
                reason: "already attempted".to_string(),
            },
        ));
        report.push(entry(
            "merry-plugin-b",
            Outcome::Failed {
                error: "boom".to_string(),
            },
        ));

        assert_eq!(report.to_string(), "1 loaded, 1 skipped, 1 failed");
        assert!(report.is_loaded("merry-plugin-a"));
        assert!(!report.is_loaded("merry-plugin-b"));
        assert!(report.get("merry-plugin-a").unwrap().is_loaded());
    }
}
