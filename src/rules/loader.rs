//! Rule file parsing.
//!
//! A rule file holds one directive per line. Blank lines are ignored and
//! every other line must start with a recognized directive; anything else is
//! a fatal error naming the file and line, so a typo never silently disables
//! a rule.
//!
//! ```text
//! skip: <glob>
//! used: <glob>
//! deprecated: <glob>[-><replacement>][;<comment>]
//! merge
//! mergeAdd: <path>
//! name: <directory-display-name>
//! forceSync: <glob>
//! skipSync: <glob>
//! # comment
//! ```
//!
//! The replacement of a `deprecated:` directive may name the context type
//! that owns it: `ContextType@/path/to/replacement.svg`.

use super::RuleError;
use std::fs;
use std::path::Path;

/// One parsed directive line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Skip(String),
    Used(String),
    Deprecated(DeprecatedDirective),
    Merge,
    MergeAdd(String),
    Name(String),
    ForceSync(String),
    SkipSync(String),
}

/// Raw pieces of a `deprecated:` directive, before path resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeprecatedDirective {
    pub pattern: String,
    pub replacement: Option<String>,
    pub context_type: Option<String>,
    pub comment: Option<String>,
}

/// A directive together with its 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveLine {
    pub line: usize,
    pub directive: Directive,
}

/// Why a single line was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    Unknown,
    EmptyValue(&'static str),
    MalformedDeprecation(&'static str),
}

const VALUE_DIRECTIVES: &[&str] = &[
    "skip:",
    "used:",
    "deprecated:",
    "mergeAdd:",
    "name:",
    "forceSync:",
    "skipSync:",
];

/// Parse one line. Blank lines and comments yield `Ok(None)`.
pub fn parse_line(raw: &str) -> Result<Option<Directive>, LineError> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    if line == "merge" {
        return Ok(Some(Directive::Merge));
    }
    for prefix in VALUE_DIRECTIVES {
        let Some(rest) = line.strip_prefix(prefix) else {
            continue;
        };
        let value = rest.trim();
        if value.is_empty() {
            return Err(LineError::EmptyValue(prefix));
        }
        let value = value.to_string();
        let directive = match *prefix {
            "skip:" => Directive::Skip(value),
            "used:" => Directive::Used(value),
            "deprecated:" => Directive::Deprecated(parse_deprecated(&value)?),
            "mergeAdd:" => Directive::MergeAdd(value),
            "name:" => Directive::Name(value),
            "forceSync:" => Directive::ForceSync(value),
            _ => Directive::SkipSync(value),
        };
        return Ok(Some(directive));
    }
    Err(LineError::Unknown)
}

/// Parse `<glob>[-><replacement>][;<comment>]`.
pub fn parse_deprecated(value: &str) -> Result<DeprecatedDirective, LineError> {
    let (body, comment) = match value.split_once(';') {
        Some((body, comment)) => (body, Some(comment.trim())),
        None => (value, None),
    };
    let comment = comment.filter(|c| !c.is_empty()).map(String::from);

    let mut parts = body.split("->");
    let pattern = parts.next().unwrap_or_default().trim();
    let replacement = parts.next().map(str::trim);
    if parts.next().is_some() {
        return Err(LineError::MalformedDeprecation("more than one '->'"));
    }
    if pattern.is_empty() {
        return Err(LineError::MalformedDeprecation("empty pattern"));
    }

    let (context_type, replacement) = match replacement {
        None => (None, None),
        Some("") => return Err(LineError::MalformedDeprecation("empty replacement")),
        Some(r) => match r.split_once("@/") {
            Some(("", _)) => {
                return Err(LineError::MalformedDeprecation("empty context type"));
            }
            Some((_, "")) => {
                return Err(LineError::MalformedDeprecation("empty replacement path"));
            }
            Some((ctx, path)) => (Some(ctx.to_string()), Some(format!("/{path}"))),
            None => (None, Some(r.to_string())),
        },
    };

    Ok(DeprecatedDirective {
        pattern: pattern.to_string(),
        replacement,
        context_type,
        comment,
    })
}

/// Read and parse every directive of a rule file.
pub fn parse_rule_file(path: &Path) -> Result<Vec<DirectiveLine>, RuleError> {
    let content = fs::read_to_string(path).map_err(|source| RuleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_rule_text(path, &content)
}

/// Parse rule text; `path` is only used for diagnostics.
pub fn parse_rule_text(path: &Path, content: &str) -> Result<Vec<DirectiveLine>, RuleError> {
    let mut directives = Vec::new();
    for (index, raw) in content.lines().enumerate() {
        let line = index + 1;
        match parse_line(raw) {
            Ok(Some(directive)) => directives.push(DirectiveLine { line, directive }),
            Ok(None) => {}
            Err(LineError::Unknown) => {
                return Err(RuleError::UnknownDirective {
                    path: path.to_path_buf(),
                    line,
                    content: raw.to_string(),
                });
            }
            Err(LineError::EmptyValue(directive)) => {
                return Err(RuleError::EmptyValue {
                    path: path.to_path_buf(),
                    line,
                    directive,
                });
            }
            Err(LineError::MalformedDeprecation(reason)) => {
                return Err(RuleError::MalformedDeprecation {
                    path: path.to_path_buf(),
                    line,
                    reason,
                });
            }
        }
    }
    Ok(directives)
}
