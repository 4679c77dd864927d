//! Compiled include/exclude glob matching, shared by every `skip_*`
//! rewriter. Grounded on the teacher's `redactor::matcher::ColumnMatcher`:
//! compile `glob::Pattern`s once, match against them repeatedly.

use glob::Pattern;

#[derive(Debug, Clone)]
pub struct GlobFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    case_insensitive: bool,
}

impl GlobFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, glob::PatternError> {
        Self::build(include, exclude, false)
    }

    /// Engine names are matched case-insensitively on both sides.
    pub fn new_case_insensitive(include: &[String], exclude: &[String]) -> Result<Self, glob::PatternError> {
        Self::build(include, exclude, true)
    }

    fn build(include: &[String], exclude: &[String], case_insensitive: bool) -> Result<Self, glob::PatternError> {
        let lower = |s: &String| if case_insensitive { s.to_lowercase() } else { s.clone() };
        let include = include
            .iter()
            .map(lower)
            .map(|s| Pattern::new(&s))
            .collect::<Result<_, _>>()?;
        let exclude = exclude
            .iter()
            .map(lower)
            .map(|s| Pattern::new(&s))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            include,
            exclude,
            case_insensitive,
        })
    }

    /// `true` if `text` should be kept (passes the include set, if any, and
    /// doesn't match any exclude pattern).
    pub fn check(&self, text: &str) -> bool {
        let text = if self.case_insensitive {
            text.to_lowercase()
        } else {
            text.to_string()
        };
        if !self.include.is_empty() && !self.include.iter().any(|p| p.matches(&text)) {
            return false;
        }
        !self.exclude.iter().any(|p| p.matches(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_include_passes_everything_not_excluded() {
        let f = GlobFilter::new(&[], &["secret*".to_string()]).unwrap();
        assert!(f.check("users"));
        assert!(!f.check("secrets"));
    }

    #[test]
    fn nonempty_include_requires_a_match() {
        let f = GlobFilter::new(&["user*".to_string()], &[]).unwrap();
        assert!(f.check("users"));
        assert!(!f.check("orders"));
    }

    #[test]
    fn engine_matching_is_case_insensitive() {
        let f = GlobFilter::new_case_insensitive(&["innodb".to_string()], &[]).unwrap();
        assert!(f.check("InnoDB"));
        assert!(!f.check("MyISAM"));
    }
}
