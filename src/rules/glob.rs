//! Glob → anchored regex translation for rule patterns.
//!
//! Patterns are shell-style globs evaluated against `/`-separated paths:
//!
//! | Glob | Regex | Meaning |
//! |---|---|---|
//! | `*` | `[^/]*` | any run of characters within one segment |
//! | `?` | `[^/]` | one character within a segment |
//! | `**/` | `(?:.*/)?` | zero or more whole directories |
//! | `**` | `.*` | anything, across segments |
//!
//! Everything else is matched literally. The result is anchored at both ends.

use regex::Regex;

/// True when the glob contains a wildcard character.
pub fn has_wildcard(glob: &str) -> bool {
    glob.contains(['*', '?'])
}

/// Translate a glob into an anchored regex source string.
pub fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');
    let mut literal = String::new();
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' | '?' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                if c == '?' {
                    out.push_str("[^/]");
                } else if chars.peek() == Some(&'*') {
                    chars.next();
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        out.push_str("(?:.*/)?");
                    } else {
                        out.push_str(".*");
                    }
                } else {
                    out.push_str("[^/]*");
                }
            }
            _ => literal.push(c),
        }
    }
    out.push_str(&regex::escape(&literal));
    out.push('$');
    out
}

/// Compile a glob into an anchored [`Regex`].
pub fn compile(glob: &str) -> Result<Regex, regex::Error> {
    Regex::new(&glob_to_regex(glob))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_stays_within_segment() {
        let re = compile("/res/excluded/*").unwrap();
        assert!(re.is_match("/res/excluded/b.svg"));
        assert!(!re.is_match("/res/excluded/deep/b.svg"));
    }

    #[test]
    fn double_star_crosses_segments() {
        let re = compile("/res/**/b.svg").unwrap();
        assert!(re.is_match("/res/b.svg"));
        assert!(re.is_match("/res/x/y/b.svg"));
    }

    #[test]
    fn trailing_double_star_matches_everything_below() {
        let re = compile("/res/gen/**").unwrap();
        assert!(re.is_match("/res/gen/a/b.svg"));
    }

    #[test]
    fn question_mark_is_one_char() {
        let re = compile("/res/a?.svg").unwrap();
        assert!(re.is_match("/res/ab.svg"));
        assert!(!re.is_match("/res/abc.svg"));
    }

    #[test]
    fn literal_dots_are_escaped() {
        let re = compile("/res/a.svg").unwrap();
        assert!(!re.is_match("/res/aXsvg"));
    }

    #[test]
    fn match_is_anchored() {
        let re = compile("/res/a.svg").unwrap();
        assert!(!re.is_match("/x/res/a.svg"));
        assert!(!re.is_match("/res/a.svg.bak"));
    }

    #[test]
    fn wildcard_detection() {
        assert!(has_wildcard("a/*.svg"));
        assert!(has_wildcard("a?.svg"));
        assert!(!has_wildcard("a/b.svg"));
    }
}
