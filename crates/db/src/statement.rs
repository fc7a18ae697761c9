//! SQL text inspection: read-only guard, explicit row limits, table-name lists

use regex::Regex;
use std::sync::OnceLock;

use crate::{DbError, Dialect, Result};

/// Leading keywords of statements that only read
const READ_ONLY_KEYWORDS: &[&str] = &[
    "select", "with", "explain", "show", "describe", "desc", "pragma", "values", "table",
];

/// Pragmas that take an argument naming what to inspect and change nothing
const PRAGMA_QUERIES: &[&str] = &[
    "table_info",
    "table_xinfo",
    "table_list",
    "index_list",
    "index_info",
    "index_xinfo",
    "foreign_key_list",
    "foreign_key_check",
    "integrity_check",
    "quick_check",
];

/// Upper bound on rows a query may return even with an explicit LIMIT
pub const MAX_EXPLICIT_ROWS: usize = 1000;

fn write_keyword_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(insert|update|delete|merge|drop|alter|create|truncate|grant|revoke|into)\b",
        )
        .expect("valid regex")
    })
}

fn limit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\blimit\s+(\d+)(?:\s*,\s*(\d+))?(?:\s+offset\s+\d+)?\s*$|\bfetch\s+(?:first|next)\s+(\d+)\s+rows?\s+only\s*$",
        )
        .expect("valid regex")
    })
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Index just past the closing quote; a doubled quote stays inside
fn skip_quoted(
    chars: &[char],
    start: usize,
    quote: char,
    backslash_escapes: bool,
) -> Option<usize> {
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if backslash_escapes && c == '\\' {
            i += 2;
            continue;
        }
        if c == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

/// First index at or after `from` where `pattern` starts
fn find(chars: &[char], from: usize, pattern: &[char]) -> Option<usize> {
    if chars.len() < pattern.len() {
        return None;
    }
    (from..=chars.len() - pattern.len()).find(|&i| chars[i..].starts_with(pattern))
}

/// Index of the newline ending a line comment, or the end of input
fn skip_line(chars: &[char], start: usize) -> usize {
    chars[start..]
        .iter()
        .position(|&c| c == '\n')
        .map_or(chars.len(), |p| start + p)
}

/// `$tag$` opening a dollar-quoted body; `$1` parameters are not tags
fn dollar_tag(chars: &[char], start: usize) -> Option<Vec<char>> {
    if start > 0 && is_word_char(chars[start - 1]) {
        return None;
    }
    let mut i = start + 1;
    while let Some(&c) = chars.get(i) {
        if c == '$' {
            return Some(chars[start..=i].to_vec());
        }
        if !is_word_char(c) || (i == start + 1 && c.is_ascii_digit()) {
            return None;
        }
        i += 1;
    }
    None
}

/// `E'...'` on PostgreSQL takes backslash escapes
fn is_escape_string(chars: &[char], quote: usize) -> bool {
    quote > 0
        && matches!(chars[quote - 1], 'e' | 'E')
        && (quote < 2 || !is_word_char(chars[quote - 2]))
}

/// One pass over the statement using the dialect's quoting and comment
/// rules. Literals become `''`, quoted identifiers become empty quotes and
/// comments become a space. `None` when a quote or block comment is left open.
fn scan(sql: &str, dialect: Dialect) -> Option<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mysql = dialect == Dialect::MySql;
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            '\'' => {
                let escapes = mysql
                    || (dialect == Dialect::PostgreSql && is_escape_string(&chars, i));
                i = skip_quoted(&chars, i, '\'', escapes)?;
                out.push_str("''");
            }
            // MySQL reads double quotes as a string literal
            '"' => {
                i = skip_quoted(&chars, i, '"', mysql)?;
                out.push_str("\"\"");
            }
            '`' if dialect != Dialect::PostgreSql => {
                i = skip_quoted(&chars, i, '`', false)?;
                out.push_str("``");
            }
            '[' if dialect == Dialect::Sqlite => {
                i = find(&chars, i + 1, &[']'])? + 1;
                out.push_str("[]");
            }
            // MySQL only starts a comment at `-- ` followed by whitespace
            '-' if next == Some('-')
                && (!mysql || chars.get(i + 2).map_or(true, |c| c.is_whitespace())) =>
            {
                i = skip_line(&chars, i);
                out.push(' ');
            }
            '#' if mysql => {
                i = skip_line(&chars, i);
                out.push(' ');
            }
            // MySQL runs the body of `/*! ... */` as code
            '/' if next == Some('*') && mysql && chars.get(i + 2) == Some(&'!') => {
                i += 3;
                while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
                    i += 1;
                }
                out.push(' ');
            }
            '/' if next == Some('*') => {
                i = find(&chars, i + 2, &['*', '/'])? + 2;
                out.push(' ');
            }
            '$' if dialect == Dialect::PostgreSql => match dollar_tag(&chars, i) {
                Some(tag) => {
                    i = find(&chars, i + tag.len(), &tag)? + tag.len();
                    out.push_str("''");
                }
                None => {
                    out.push(c);
                    i += 1;
                }
            },
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    Some(out)
}

/// Scanned text with trailing semicolons trimmed
fn normalize(sql: &str, dialect: Dialect) -> Option<String> {
    let scanned = scan(sql, dialect)?;
    Some(
        scanned
            .trim()
            .trim_end_matches(|c: char| c == ';' || c.is_whitespace())
            .to_string(),
    )
}

fn rejected(reason: impl Into<String>) -> DbError {
    DbError::Rejected(reason.into())
}

/// Bare `PRAGMA name` reads; assignments and most arguments change settings
fn ensure_pragma_reads(normalized: &str) -> Result<()> {
    if normalized.contains('=') {
        return Err(rejected(
            "PRAGMA assignments are not allowed; only read-only queries may be run",
        ));
    }
    let Some(open) = normalized.find('(') else {
        return Ok(());
    };
    let name = normalized[..open]
        .split_whitespace()
        .last()
        .and_then(|n| n.rsplit('.').next())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if PRAGMA_QUERIES.contains(&name.as_str()) {
        Ok(())
    } else {
        Err(rejected(format!(
            "PRAGMA {} with an argument is not allowed; only read-only queries may be run",
            name
        )))
    }
}

/// Reject anything but a single statement that only reads, lexing it the
/// way `dialect` does
pub fn ensure_read_only(sql: &str, dialect: Dialect) -> Result<()> {
    let normalized = normalize(sql, dialect)
        .ok_or_else(|| rejected("unterminated quote or comment"))?;
    if normalized.is_empty() {
        return Err(rejected("empty statement"));
    }
    if normalized.contains(';') {
        return Err(rejected("only a single statement may be run at a time"));
    }

    let first = normalized
        .split(|c: char| c.is_whitespace() || c == '(')
        .find(|w| !w.is_empty())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if !READ_ONLY_KEYWORDS.contains(&first.as_str()) {
        return Err(rejected(format!(
            "{} statements are not allowed; only read-only queries may be run",
            first.to_uppercase()
        )));
    }

    match first.as_str() {
        "pragma" => ensure_pragma_reads(&normalized)?,
        "show" | "describe" | "desc" => {}
        _ => {
            if let Some(m) = write_keyword_re().find(&normalized) {
                return Err(rejected(format!(
                    "{} is not allowed; only read-only queries may be run",
                    m.as_str().to_uppercase()
                )));
            }
        }
    }

    Ok(())
}

/// Row count named by a trailing `LIMIT n`, `LIMIT offset, n` or `FETCH FIRST n ROWS ONLY`
pub fn explicit_limit(sql: &str) -> Option<usize> {
    let normalized = normalize(sql, Dialect::Sqlite)?;
    let caps = limit_re().captures(&normalized)?;
    caps.get(2)
        .or_else(|| caps.get(1))
        .or_else(|| caps.get(3))
        .and_then(|m| m.as_str().parse().ok())
}

/// Rows the query tool may return: `top_k`, raised to an explicit larger LIMIT
pub fn row_cap(sql: &str, top_k: usize) -> usize {
    match explicit_limit(sql) {
        Some(limit) if limit > top_k => limit.min(MAX_EXPLICIT_ROWS),
        _ => top_k,
    }
}

/// Split a comma-separated table list, dropping quotes and blanks
pub fn split_table_names(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|t| t.trim().trim_matches(|c| c == '"' || c == '`' || c == '\'').trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
