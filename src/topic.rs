//! Topic grammar and wildcard-aware matching.
//!
//! A topic is a `/`-separated sequence of levels. `+` matches exactly one
//! level; `#` matches zero or more trailing levels and must be the final
//! one. The degenerate topic `#` on its own is valid and matches anything.

use std::fmt;

use crate::error::BrokerError;

const SINGLE_LEVEL_WILDCARD: u8 = b'+';
const MULTI_LEVEL_WILDCARD: u8 = b'#';

/// A parsed topic or filter. Owns its levels directly rather than viewing
/// into the original string, which keeps the type free of self-referential
/// lifetimes while preserving the original form for display and logging.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    original: String,
    levels: Vec<String>,
    multilevel_index: Option<usize>,
}

impl Topic {
    /// Parses a topic or filter string. Rejects empty levels (except the
    /// standalone `#`), a `#` anywhere but the final level, and more than
    /// one `#`.
    pub fn parse(input: &str) -> Result<Topic, BrokerError> {
        if input == "#" {
            return Ok(Topic {
                original: input.to_owned(),
                levels: vec!["#".to_owned()],
                multilevel_index: Some(0),
            });
        }

        let levels: Vec<String> = input.split('/').map(str::to_owned).collect();
        if levels.iter().any(|level| level.is_empty()) {
            return Err(invalid(input));
        }

        let mut multilevel_index = None;
        for (i, level) in levels.iter().enumerate() {
            if level == "#" {
                if multilevel_index.is_some() {
                    return Err(invalid(input));
                }
                if i != levels.len() - 1 {
                    return Err(invalid(input));
                }
                multilevel_index = Some(i);
            }
        }

        Ok(Topic {
            original: input.to_owned(),
            levels,
            multilevel_index,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

fn invalid(input: &str) -> BrokerError {
    BrokerError::InvalidTopic(input.to_owned())
}

fn level_is_wildcard(level: &str) -> bool {
    matches!(level.as_bytes().first(), Some(&SINGLE_LEVEL_WILDCARD) | Some(&MULTI_LEVEL_WILDCARD))
}

/// Tests whether two topics (either of which may carry wildcards) match.
/// Symmetric: `matches(a, b) == matches(b, a)`.
pub fn matches(a: &Topic, b: &Topic) -> bool {
    let min_len = a.levels.len().min(b.levels.len());

    let compare_upto = match (a.multilevel_index, b.multilevel_index) {
        (Some(ai), Some(bi)) => ai.min(bi),
        (Some(ai), None) => ai,
        (None, Some(bi)) => bi,
        (None, None) => {
            if a.levels.len() != b.levels.len() {
                return false;
            }
            min_len
        }
    };

    for i in 0..compare_upto {
        // A `#` whose literal prefix is longer than the other side can put
        // `compare_upto` past one side's level count; that can only happen
        // when the shapes genuinely don't line up, so treat it as a
        // mismatch instead of indexing out of bounds.
        let (Some(a_level), Some(b_level)) = (a.levels.get(i), b.levels.get(i)) else {
            return false;
        };

        let ignore = level_is_wildcard(a_level) || level_is_wildcard(b_level);
        if !ignore && a_level != b_level {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Topic {
        Topic::parse(s).unwrap()
    }

    #[test]
    fn rejects_empty_and_malformed_topics() {
        assert!(Topic::parse("").is_err());
        assert!(Topic::parse("a//b").is_err());
        assert!(Topic::parse("a/#/b").is_err());
        assert!(Topic::parse("a/#/#").is_err());
    }

    #[test]
    fn accepts_lone_hash() {
        let topic = t("#");
        assert_eq!(topic.levels(), &["#".to_owned()]);
    }

    #[test]
    fn exact_match_requires_byte_equal_levels() {
        assert!(matches(&t("a/b"), &t("a/b")));
        assert!(!matches(&t("a/b"), &t("a/c")));
        assert!(!matches(&t("a/b"), &t("a/b/c")));
    }

    #[test]
    fn hash_matches_everything() {
        assert!(matches(&t("#"), &t("a/b/c")));
        assert!(matches(&t("#"), &t("a")));
        assert!(matches(&t("a/b/c"), &t("#")));
    }

    #[test]
    fn plus_matches_single_level_only() {
        assert!(matches(&t("+/x"), &t("a/x")));
        assert!(!matches(&t("+/x"), &t("a/b/x")));
    }

    #[test]
    fn multilevel_prefix_beyond_other_side_is_not_a_panic_or_match() {
        // "x/y/#" has a two-level literal prefix; "m" is shorter than that
        // prefix and cannot satisfy it.
        assert!(!matches(&t("x/y/#"), &t("m")));
    }

    #[test]
    fn matching_is_symmetric() {
        let cases = [("#", "a/b/c"), ("+/x", "a/x"), ("a/b", "a/b"), ("a/+/c", "a/b/c")];
        for (a, b) in cases {
            assert_eq!(matches(&t(a), &t(b)), matches(&t(b), &t(a)));
        }
    }

    #[test]
    fn display_preserves_original_form() {
        assert_eq!(t("sensors/+/temp").to_string(), "sensors/+/temp");
    }
}
