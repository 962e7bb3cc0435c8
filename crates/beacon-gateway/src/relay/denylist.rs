//! Action denylist
//!
//! Glob patterns of action names that must never be reachable over the
//! transport - gateway-internal actions in particular. Checked before any
//! backend contact.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Compiled denylist
pub struct Denylist {
    set: GlobSet,
    patterns: Vec<String>,
}

impl Denylist {
    /// Compile a set of glob patterns. Fails at configuration time on an
    /// invalid pattern rather than silently allowing everything.
    pub fn new(patterns: &[String]) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            // `gateway.*` must match the dot like the rest of the name
            let glob = GlobBuilder::new(pattern).literal_separator(false).build()?;
            builder.add(glob);
        }
        Ok(Self {
            set: builder.build()?,
            patterns: patterns.to_vec(),
        })
    }

    /// Whether an action name is denied.
    #[must_use]
    pub fn is_denied(&self, action: &str) -> bool {
        self.set.is_match(action)
    }

    /// The source patterns, for logging.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl std::fmt::Debug for Denylist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Denylist")
            .field("patterns", &self.patterns)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn denylist(patterns: &[&str]) -> Denylist {
        let patterns: Vec<String> = patterns.iter().map(ToString::to_string).collect();
        Denylist::new(&patterns).unwrap()
    }

    #[test]
    fn test_gateway_actions_are_denied() {
        let list = denylist(&["gateway.*"]);
        assert!(list.is_denied("gateway.joinRoom"));
        assert!(list.is_denied("gateway.internal.danger"));
        assert!(!list.is_denied("chat.message.send"));
        assert!(!list.is_denied("gateway"));
    }

    #[test]
    fn test_multiple_patterns() {
        let list = denylist(&["gateway.*", "*.internal.*"]);
        assert!(list.is_denied("chat.internal.purge"));
        assert!(!list.is_denied("chat.message.send"));
    }

    #[test]
    fn test_invalid_pattern_fails_at_build() {
        assert!(Denylist::new(&["[".to_string()]).is_err());
    }
}
