use std::path::Path;

/// A single ignore rule from the config's `ignore` list.
///
/// Three matching behaviors, decided by the pattern's shape:
/// - trailing `/` marks a directory rule: the directory and everything
///   beneath it are ignored;
/// - an absolute pattern is glob-matched against the absolute path;
/// - anything else is glob-matched against the file name and against the
///   full slash-normalized relative path.
#[derive(Debug, Clone)]
enum IgnoreRule {
    DirPrefix(String),
    Absolute(glob::Pattern),
    Glob(glob::Pattern),
}

impl IgnoreRule {
    /// Compile a pattern string. Returns `None` for malformed patterns,
    /// which simply never match.
    fn compile(pattern: &str) -> Option<Self> {
        if let Some(prefix) = pattern.strip_suffix('/') {
            if prefix.is_empty() {
                return None;
            }
            return Some(IgnoreRule::DirPrefix(prefix.to_string()));
        }

        match glob::Pattern::new(pattern) {
            Ok(compiled) if Path::new(pattern).is_absolute() => {
                Some(IgnoreRule::Absolute(compiled))
            }
            Ok(compiled) => Some(IgnoreRule::Glob(compiled)),
            Err(e) => {
                tracing::warn!("Skipping malformed ignore pattern '{}': {}", pattern, e);
                None
            }
        }
    }

    fn matches(&self, rel_path: &str, file_name: &str, abs_path: &Path) -> bool {
        match self {
            IgnoreRule::DirPrefix(prefix) => {
                rel_path == prefix || rel_path.starts_with(&format!("{}/", prefix))
            }
            IgnoreRule::Absolute(pattern) => abs_path
                .to_str()
                .is_some_and(|abs| pattern.matches(abs)),
            IgnoreRule::Glob(pattern) => {
                pattern.matches(file_name) || pattern.matches(rel_path)
            }
        }
    }
}

/// Compiled ignore rules for the whole run.
///
/// Pure: matching is a function of the path and the pattern list alone.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<IgnoreRule>,
}

impl IgnoreRules {
    pub fn new(patterns: &[String]) -> Self {
        let rules = patterns
            .iter()
            .filter_map(|p| IgnoreRule::compile(p))
            .collect();
        Self { rules }
    }

    /// Whether `rel_path` (relative to the local root) is excluded from sync.
    ///
    /// `rel_path` is normalized to forward slashes before matching so that
    /// patterns behave identically across platforms.
    pub fn matches(&self, rel_path: &Path, abs_path: &Path) -> bool {
        if self.rules.is_empty() {
            return false;
        }

        let unified = rel_path.to_string_lossy().replace('\\', "/");
        let file_name = rel_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.rules
            .iter()
            .any(|rule| rule.matches(&unified, &file_name, abs_path))
    }
}
