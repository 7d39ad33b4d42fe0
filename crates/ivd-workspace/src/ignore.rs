//! `.ivaldiignore` pattern evaluation.
//!
//! Rules:
//! - A trailing `/` matches a directory and everything under it.
//! - `*` and `?` are glob metacharacters (`*` does not cross `/`).
//! - Patterns without a separator match any path component.
//! - Exact matches win.
//! - `.ivaldi/` and `.git/` are always ignored regardless of patterns.
//! - Lines starting with `#` and blank lines are skipped.

use std::fs;
use std::path::Path;

use globset::{GlobBuilder, GlobMatcher};
use tracing::warn;

use crate::error::{WorkspaceError, WorkspaceResult};

/// Directories whose contents are never tracked.
const FORCED_IGNORES: &[&str] = &[".ivaldi", ".git"];

enum Rule {
    /// `pattern/`: the directory itself and everything under it.
    Dir(String),
    /// Literal path containing a separator.
    Exact(String),
    /// Literal name without a separator: matches any path component.
    Component(String),
    /// Glob containing a separator, matched against the whole path.
    PathGlob(GlobMatcher),
    /// Glob without a separator, matched against each component.
    ComponentGlob(GlobMatcher),
}

/// Compiled ignore rules for one working tree.
pub struct IgnoreEngine {
    rules: Vec<Rule>,
}

impl IgnoreEngine {
    /// An engine with only the forced ignores.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Load `.ivaldiignore` from the working-tree root. A missing file
    /// yields the empty engine.
    pub fn load(root: &Path) -> WorkspaceResult<Self> {
        let path = root.join(".ivaldiignore");
        match fs::read_to_string(&path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::empty()),
            Err(e) => Err(WorkspaceError::io("read", path, e)),
        }
    }

    /// Parse ignore rules from file contents.
    pub fn parse(contents: &str) -> WorkspaceResult<Self> {
        let mut rules = Vec::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match compile_rule(line) {
                Ok(rule) => rules.push(rule),
                Err(e) => {
                    // A single bad pattern should not take tracking down.
                    warn!(pattern = line, error = %e, "skipping unparseable ignore pattern");
                }
            }
        }
        Ok(Self { rules })
    }

    /// Evaluate a repository-relative POSIX path.
    pub fn is_ignored(&self, path: &str) -> bool {
        for forced in FORCED_IGNORES {
            if path == *forced || path.starts_with(&format!("{forced}/")) {
                return true;
            }
        }
        self.rules.iter().any(|rule| rule.matches(path))
    }

    /// Number of user rules loaded.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Rule {
    fn matches(&self, path: &str) -> bool {
        match self {
            Rule::Dir(dir) => path == dir || path.starts_with(&format!("{dir}/")),
            Rule::Exact(exact) => path == exact,
            Rule::Component(name) => path.split('/').any(|c| c == name),
            Rule::PathGlob(glob) => glob.is_match(path),
            Rule::ComponentGlob(glob) => path.split('/').any(|c| glob.is_match(c)),
        }
    }
}

fn compile_rule(pattern: &str) -> WorkspaceResult<Rule> {
    if let Some(dir) = pattern.strip_suffix('/') {
        return Ok(Rule::Dir(dir.to_string()));
    }
    let has_meta = pattern.contains(['*', '?', '[']);
    let has_separator = pattern.contains('/');
    if !has_meta {
        return Ok(if has_separator {
            Rule::Exact(pattern.to_string())
        } else {
            Rule::Component(pattern.to_string())
        });
    }
    let glob = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| WorkspaceError::Pattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?
        .compile_matcher();
    Ok(if has_separator {
        Rule::PathGlob(glob)
    } else {
        Rule::ComponentGlob(glob)
    })
}
