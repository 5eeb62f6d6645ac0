//! Statement splitting for migration bodies.
//!
//! Migration bodies are executed one statement at a time inside the
//! migration's transaction, so a body has to be split on top-level semicolons.
//! Semicolons inside quoted strings, quoted identifiers, comments and
//! dollar-quoted blocks (PL/pgSQL function bodies) do not end a statement.

use std::iter::Peekable;
use std::str::Chars;

enum State {
    Normal,
    /// `true` for `E'...'` strings, where a backslash escapes the next character.
    SingleQuote(bool),
    DoubleQuote,
    LineComment,
    BlockComment,
    DollarQuote(String),
}

/// Split SQL into individual statements, without their trailing semicolons.
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut state = State::Normal;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);

        state = match state {
            State::Normal => match c {
                '\'' => State::SingleQuote(opens_escape_string(&current)),
                '"' => State::DoubleQuote,
                '-' if chars.peek() == Some(&'-') => {
                    current.extend(chars.next());
                    State::LineComment
                }
                '/' if chars.peek() == Some(&'*') => {
                    current.extend(chars.next());
                    State::BlockComment
                }
                '$' => match read_dollar_tag(&mut chars, &mut current) {
                    Some(tag) => State::DollarQuote(tag),
                    None => State::Normal,
                },
                ';' => {
                    push_statement(&mut statements, &current);
                    current.clear();
                    State::Normal
                }
                _ => State::Normal,
            },
            State::SingleQuote(escapes) => {
                if escapes && c == '\\' {
                    current.extend(chars.next());
                    State::SingleQuote(escapes)
                } else if c == '\'' {
                    if chars.peek() == Some(&'\'') {
                        // '' is an escaped quote
                        current.extend(chars.next());
                        State::SingleQuote(escapes)
                    } else {
                        State::Normal
                    }
                } else {
                    State::SingleQuote(escapes)
                }
            }
            State::DoubleQuote => {
                if c == '"' {
                    State::Normal
                } else {
                    State::DoubleQuote
                }
            }
            State::LineComment => {
                if c == '\n' {
                    State::Normal
                } else {
                    State::LineComment
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    current.extend(chars.next());
                    State::Normal
                } else {
                    State::BlockComment
                }
            }
            State::DollarQuote(tag) => {
                if c == '$' {
                    match read_dollar_tag(&mut chars, &mut current) {
                        Some(closing) if closing == tag => State::Normal,
                        _ => State::DollarQuote(tag),
                    }
                } else {
                    State::DollarQuote(tag)
                }
            }
        };
    }

    // The last statement may not end with ;
    push_statement(&mut statements, &current);

    statements
}

/// Statements that would actually run: chunks made only of blank lines and
/// `--` comments are dropped.
pub fn executable_statements(sql: &str) -> Vec<String> {
    split_sql_statements(sql)
        .into_iter()
        .filter(|statement| {
            !statement.lines().all(|l| {
                let l = l.trim();
                l.is_empty() || l.starts_with("--")
            })
        })
        .collect()
}

/// Whether the quote that `current` ends with opens an `E'...'` string: the
/// quote is preceded by a lone `E` or `e`, not by the tail of an identifier.
fn opens_escape_string(current: &str) -> bool {
    let mut before = current.chars().rev().skip(1);
    match before.next() {
        Some('E' | 'e') => !matches!(before.next(), Some(c) if c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}

/// Having just consumed a `$`, read the rest of a `$tag$` delimiter.
///
/// Consumed characters are appended to `current` either way. Returns the full
/// delimiter (including both `$`) when one was found.
fn read_dollar_tag(chars: &mut Peekable<Chars<'_>>, current: &mut String) -> Option<String> {
    let mut tag = String::from("$");

    while let Some(&next) = chars.peek() {
        if next == '$' {
            chars.next();
            current.push('$');
            tag.push('$');
            return Some(tag);
        }
        if next.is_alphanumeric() || next == '_' {
            chars.next();
            current.push(next);
            tag.push(next);
        } else {
            break;
        }
    }

    None
}

fn push_statement(statements: &mut Vec<String>, current: &str) {
    let stmt = current.trim().trim_end_matches(';').trim();
    if !stmt.is_empty() {
        statements.push(stmt.to_string());
    }
}
