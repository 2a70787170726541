//! `.dockerignore` rules for build context fingerprints
//!
//! Follows docker's matching: patterns are relative to the context root,
//! `*`/`?`/`[...]` never cross a `/`, `**` spans any number of directories,
//! and a pattern that matches a directory covers everything below it. Lines
//! starting with `!` re-include what an earlier line excluded; the last
//! matching line wins.

use crate::error::{SkiffError, SkiffResult};
use crate::hash::Visit;
use glob::{MatchOptions, Pattern};
use std::fs;
use std::path::{Path, PathBuf};

const IGNORE_FILE: &str = ".dockerignore";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
struct Rule {
    pattern: Pattern,
    negated: bool,
}

/// Parsed ignore rules of one build context
#[derive(Debug, Clone, Default)]
pub struct DockerIgnore {
    rules: Vec<Rule>,
}

impl DockerIgnore {
    /// Rules for building `dockerfile` in `context`.
    ///
    /// `<Dockerfile>.dockerignore` next to the Dockerfile takes precedence
    /// over `<context>/.dockerignore`. Neither present means no rules.
    pub fn read(context: &Path, dockerfile: &Path) -> SkiffResult<Self> {
        let mut specific = dockerfile.as_os_str().to_owned();
        specific.push(IGNORE_FILE);
        let candidates = [PathBuf::from(specific), context.join(IGNORE_FILE)];

        let Some(path) = candidates.iter().find(|p| p.is_file()) else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path).map_err(|e| SkiffError::hash(path, e))?;
        Self::parse(&content).map_err(|reason| SkiffError::hash(path, reason))
    }

    /// Parse ignore file content
    pub fn parse(content: &str) -> Result<Self, String> {
        let mut rules = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (negated, raw) = match line.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, line),
            };
            let cleaned = clean(raw);
            if cleaned.is_empty() {
                continue;
            }
            let pattern = Pattern::new(&cleaned)
                .map_err(|e| format!("invalid pattern '{}': {}", raw, e))?;
            rules.push(Rule { pattern, negated });
        }
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether a `/`-separated context-relative path is excluded
    pub fn is_ignored(&self, rel: &str) -> bool {
        let mut ignored = false;
        for rule in &self.rules {
            if matches_self_or_parent(&rule.pattern, rel) {
                ignored = !rule.negated;
            }
        }
        ignored
    }

    /// Walk decision for a context entry.
    ///
    /// Ignored directories are only pruned when no `!` rule could bring one
    /// of their children back.
    pub fn visit(&self, rel: &str, is_dir: bool) -> Visit {
        if !self.is_ignored(rel) {
            Visit::Hash
        } else if is_dir && !self.rules.iter().any(|r| r.negated) {
            Visit::Prune
        } else {
            Visit::Skip
        }
    }
}

fn clean(raw: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in raw.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }
    parts.join("/")
}

fn matches_self_or_parent(pattern: &Pattern, rel: &str) -> bool {
    if pattern.matches_with(rel, MATCH_OPTIONS) {
        return true;
    }
    rel.match_indices('/')
        .any(|(i, _)| pattern.matches_with(&rel[..i], MATCH_OPTIONS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn directory_pattern_covers_children() {
        let rules = DockerIgnore::parse("node_modules\n*.log\n").unwrap();
        assert!(rules.is_ignored("node_modules"));
        assert!(rules.is_ignored("node_modules/react/index.js"));
        assert!(rules.is_ignored("debug.log"));
        assert!(!rules.is_ignored("logs/debug.log"));
        assert!(!rules.is_ignored("src/main.js"));
    }

    #[test]
    fn globstar_and_anchoring() {
        let rules =
            DockerIgnore::parse("# build output\n/dist/\n**/*.tmp\n./docs/../cache\n").unwrap();
        assert!(rules.is_ignored("dist/app.js"));
        assert!(!rules.is_ignored("web/dist/app.js"));
        assert!(rules.is_ignored("a/b/c.tmp"));
        assert!(rules.is_ignored("cache/x"));
    }

    #[test]
    fn negation_reincludes_and_last_match_wins() {
        let rules = DockerIgnore::parse("*.md\n!README.md\n").unwrap();
        assert!(rules.is_ignored("CHANGELOG.md"));
        assert!(!rules.is_ignored("README.md"));

        let rules = DockerIgnore::parse("!README.md\n*.md\n").unwrap();
        assert!(rules.is_ignored("README.md"));
    }

    #[test]
    fn negation_disables_pruning() {
        let plain = DockerIgnore::parse("vendor\n").unwrap();
        assert_eq!(plain.visit("vendor", true), Visit::Prune);

        let negated = DockerIgnore::parse("vendor\n!vendor/keep\n").unwrap();
        assert_eq!(negated.visit("vendor", true), Visit::Skip);
        assert_eq!(negated.visit("vendor/keep", false), Visit::Hash);
        assert_eq!(negated.visit("src", true), Visit::Hash);
    }

    #[test]
    fn dockerfile_specific_file_wins() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".dockerignore"), "a\n").unwrap();
        std::fs::write(temp.path().join("api.Dockerfile.dockerignore"), "b\n").unwrap();

        let rules = DockerIgnore::read(temp.path(), &temp.path().join("api.Dockerfile")).unwrap();
        assert!(rules.is_ignored("b"));
        assert!(!rules.is_ignored("a"));

        let rules = DockerIgnore::read(temp.path(), &temp.path().join("Dockerfile")).unwrap();
        assert!(rules.is_ignored("a"));
    }

    #[test]
    fn missing_file_means_no_rules() {
        let temp = TempDir::new().unwrap();
        let rules = DockerIgnore::read(temp.path(), &temp.path().join("Dockerfile")).unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(DockerIgnore::parse("[z-a\n").is_err());
    }
}
