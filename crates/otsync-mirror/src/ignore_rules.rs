use camino::Utf8Path;
use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;

/// `.pcignore` parsed as gitignore-style patterns (§4.2's "Ignore rules"):
/// tests paths relative to the workspace root. The ignore file itself and
/// the root are always processable, so reconciliation can still read
/// `.pcignore` to build this predicate in the first place.
#[derive(Clone)]
pub struct IgnoreRules {
    matcher: Option<Gitignore>,
    ignore_file_name: String,
}

impl IgnoreRules {
    /// No ignore file present: nothing is ignored.
    #[must_use]
    pub fn empty(ignore_file_name: impl Into<String>) -> Self {
        Self { matcher: None, ignore_file_name: ignore_file_name.into() }
    }

    /// Builds the predicate from the raw contents of a `.pcignore`-style
    /// file (one gitignore pattern per line).
    #[must_use]
    pub fn from_content(content: &str, ignore_file_name: impl Into<String>) -> Self {
        let mut builder = GitignoreBuilder::new("/");
        for line in content.lines() {
            // A malformed individual pattern shouldn't take down the whole
            // predicate; skip it and keep building with the rest.
            let _ = builder.add_line(None, line);
        }
        let matcher = builder.build().ok();
        Self { matcher, ignore_file_name: ignore_file_name.into() }
    }

    #[must_use]
    pub fn is_ignored(&self, path: &Utf8Path, is_dir: bool) -> bool {
        if path.as_str().is_empty() || path.as_str() == self.ignore_file_name {
            return false;
        }
        match &self.matcher {
            Some(matcher) => matcher.matched(format!("/{path}"), is_dir).is_ignore(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_content_ignores_nothing() {
        let rules = IgnoreRules::empty(".pcignore");
        assert!(!rules.is_ignored(Utf8Path::new("node_modules/x.js"), false));
    }

    #[test]
    fn a_matched_pattern_is_ignored() {
        let rules = IgnoreRules::from_content("node_modules/\n*.log\n", ".pcignore");
        assert!(rules.is_ignored(Utf8Path::new("node_modules/x.js"), false));
        assert!(rules.is_ignored(Utf8Path::new("debug.log"), false));
        assert!(!rules.is_ignored(Utf8Path::new("src/a.js"), false));
    }

    #[test]
    fn the_ignore_file_itself_and_the_root_are_never_ignored() {
        let rules = IgnoreRules::from_content("*\n", ".pcignore");
        assert!(!rules.is_ignored(Utf8Path::new(".pcignore"), false));
        assert!(!rules.is_ignored(Utf8Path::new(""), true));
    }
}
