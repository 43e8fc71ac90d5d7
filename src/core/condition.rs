//! Run conditions for commands
//!
//! A command may carry an `if:` expression that is evaluated once per matrix
//! entry. Clauses compare the entry's interpreter version or an environment
//! variable against a literal or a regular expression, joined with `&&`:
//!
//! ```text
//! version != "3.5"
//! version =~ /^3\.[67]$/ && $DATABASE == postgres
//! ```

use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors raised while parsing an `if:` expression
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConditionError {
    #[error("condition is empty")]
    Empty,

    #[error("cannot parse clause `{0}` (expected `<version|$VAR> <==|!=|=~|!~> <value>`)")]
    Syntax(String),

    #[error("regex literal only allowed with =~ or !~ in `{0}`")]
    RegexWithEquality(String),

    #[error("invalid regex in `{clause}`: {message}")]
    Regex { clause: String, message: String },

    #[error("unterminated `{delimiter}` in `{expression}`")]
    Unterminated { delimiter: char, expression: String },
}

/// Pattern a clause compares against
#[derive(Debug, Clone)]
pub enum ConditionPattern {
    /// Exact string comparison
    Simple(String),
    /// Regular expression match
    Regex(Regex),
}

impl ConditionPattern {
    /// Check if the pattern matches the given text
    pub fn matches(&self, text: &str) -> bool {
        match self {
            ConditionPattern::Simple(pattern) => text == pattern,
            ConditionPattern::Regex(regex) => regex.is_match(text),
        }
    }
}

/// Left-hand side of a clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// The matrix entry's interpreter version
    Version,
    /// An environment variable of the entry (missing = empty string)
    Env(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Ne,
    Matches,
    NotMatches,
}

impl Operator {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "==" => Some(Operator::Eq),
            "!=" => Some(Operator::Ne),
            "=~" => Some(Operator::Matches),
            "!~" => Some(Operator::NotMatches),
            _ => None,
        }
    }

    fn is_negated(&self) -> bool {
        matches!(self, Operator::Ne | Operator::NotMatches)
    }

    fn is_regex(&self) -> bool {
        matches!(self, Operator::Matches | Operator::NotMatches)
    }
}

#[derive(Debug, Clone)]
struct Clause {
    subject: Subject,
    operator: Operator,
    pattern: ConditionPattern,
}

impl Clause {
    fn holds(&self, version: &str, env: &HashMap<String, String>) -> bool {
        let value = match &self.subject {
            Subject::Version => version,
            Subject::Env(name) => env.get(name).map(String::as_str).unwrap_or(""),
        };
        self.pattern.matches(value) != self.operator.is_negated()
    }
}

/// A parsed `if:` expression; all clauses must hold
#[derive(Debug, Clone)]
pub struct RunCondition {
    source: String,
    clauses: Vec<Clause>,
}

fn clause_regex() -> &'static Regex {
    static CLAUSE: OnceLock<Regex> = OnceLock::new();
    CLAUSE.get_or_init(|| {
        Regex::new(
            r"^(version|\$\{[A-Za-z_][A-Za-z0-9_]*\}|\$[A-Za-z_][A-Za-z0-9_]*)\s*(==|!=|=~|!~)\s*(\S.*)$",
        )
        .expect("clause grammar regex is valid")
    })
}

impl RunCondition {
    /// Parse an `if:` expression
    pub fn parse(expression: &str) -> Result<Self, ConditionError> {
        if expression.trim().is_empty() {
            return Err(ConditionError::Empty);
        }

        let clauses = split_clauses(expression)?
            .into_iter()
            .map(|raw| Self::parse_clause(raw.trim()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: expression.trim().to_string(),
            clauses,
        })
    }

    fn parse_clause(clause: &str) -> Result<Clause, ConditionError> {
        let captures = clause_regex()
            .captures(clause)
            .ok_or_else(|| ConditionError::Syntax(clause.to_string()))?;

        let subject = match &captures[1] {
            "version" => Subject::Version,
            var => Subject::Env(
                var.trim_start_matches('$')
                    .trim_start_matches('{')
                    .trim_end_matches('}')
                    .to_string(),
            ),
        };
        let operator = Operator::parse(&captures[2])
            .ok_or_else(|| ConditionError::Syntax(clause.to_string()))?;
        let raw_value = captures[3].trim();

        let (value, is_regex_literal) = unquote(raw_value);
        if is_regex_literal && !operator.is_regex() {
            return Err(ConditionError::RegexWithEquality(clause.to_string()));
        }

        let pattern = if operator.is_regex() {
            let regex = Regex::new(value).map_err(|e| ConditionError::Regex {
                clause: clause.to_string(),
                message: e.to_string(),
            })?;
            ConditionPattern::Regex(regex)
        } else {
            ConditionPattern::Simple(value.to_string())
        };

        Ok(Clause {
            subject,
            operator,
            pattern,
        })
    }

    /// Evaluate against an entry's interpreter version and environment
    pub fn evaluate(&self, version: &str, env: &HashMap<String, String>) -> bool {
        self.clauses.iter().all(|clause| clause.holds(version, env))
    }
}

impl fmt::Display for RunCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Split on `&&` outside quoted values and `/.../` regex literals.
///
/// A value is delimited only when it starts right after an operator: quotes
/// after any operator, slashes after `=~` or `!~`.
fn split_clauses(expression: &str) -> Result<Vec<&str>, ConditionError> {
    let mut clauses = Vec::new();
    let mut start = 0;
    let mut open: Option<char> = None;
    let mut escaped = false;
    let mut previous = ' ';
    let mut chars = expression.char_indices().peekable();

    while let Some((index, c)) = chars.next() {
        if let Some(delimiter) = open {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == delimiter {
                open = None;
            }
            continue;
        }

        match c {
            '"' | '\'' if matches!(previous, '=' | '~') => open = Some(c),
            '/' if previous == '~' => open = Some(c),
            '&' if matches!(chars.peek(), Some((_, '&'))) => {
                chars.next();
                clauses.push(&expression[start..index]);
                start = index + 2;
            }
            _ => {}
        }
        if !c.is_whitespace() {
            previous = c;
        }
    }

    if let Some(delimiter) = open {
        return Err(ConditionError::Unterminated {
            delimiter,
            expression: expression.trim().to_string(),
        });
    }
    clauses.push(&expression[start..]);
    Ok(clauses)
}

/// Strip quotes or regex slashes; the flag tells whether it was `/.../`
fn unquote(value: &str) -> (&str, bool) {
    let delimited = |c: char| value.len() >= 2 && value.starts_with(c) && value.ends_with(c);

    if delimited('"') || delimited('\'') {
        (&value[1..value.len() - 1], false)
    } else if delimited('/') {
        (&value[1..value.len() - 1], true)
    } else {
        (value, false)
    }
}
