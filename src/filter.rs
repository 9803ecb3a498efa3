//! Metadata filter language.
//!
//! One expression per filter: `key OP value` with `OP` one of `=`, `>=`,
//! `<=`, `>`, `<` or `in` (whitespace-delimited, value is a comma list).
//! Malformed expressions are dropped with a warning; the rest still apply.
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::frontmatter::Metadata;

static EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z0-9_.-]+)\s*(?:(>=|<=|>|<|=)|\s(in)\s)\s*([^=<>\s].*?)\s*$").unwrap()
});

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("invalid filter expression {expr:?}: {reason}")]
pub struct FilterSyntaxError {
    pub expr: String,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilterOp {
    Eq,
    Ge,
    Le,
    Gt,
    Lt,
    In,
}

impl FilterOp {
    fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "=" => Self::Eq,
            ">=" => Self::Ge,
            "<=" => Self::Le,
            ">" => Self::Gt,
            "<" => Self::Lt,
            "in" => Self::In,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::In => "in",
        }
    }

    fn accepts(self, ord: Ordering) -> bool {
        match self {
            Self::Ge => ord.is_ge(),
            Self::Le => ord.is_le(),
            Self::Gt => ord.is_gt(),
            Self::Lt => ord.is_lt(),
            Self::Eq => ord.is_eq(),
            Self::In => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    Single(String),
    List(Vec<String>),
}

/// One parsed metadata predicate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    pub key: String,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl Filter {
    pub fn parse(expr: &str) -> Result<Self, FilterSyntaxError> {
        let syntax = |reason| FilterSyntaxError {
            expr: expr.to_string(),
            reason,
        };

        let caps = EXPRESSION
            .captures(expr)
            .ok_or_else(|| syntax("expected `key OP value` with OP one of =, >=, <=, >, <, in"))?;
        let op_token = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
        let op = FilterOp::from_token(op_token).ok_or_else(|| syntax("unknown operator"))?;
        let raw = &caps[4];

        let value = if op == FilterOp::In {
            let items: Vec<String> = raw
                .split(',')
                .map(|item| unquote(item.trim()).to_string())
                .filter(|item| !item.is_empty())
                .collect();
            if items.is_empty() {
                return Err(syntax("`in` needs at least one value"));
            }
            FilterValue::List(items)
        } else {
            let value = unquote(raw);
            if value.is_empty() {
                return Err(syntax("empty value"));
            }
            FilterValue::Single(value.to_string())
        };

        Ok(Self {
            key: caps[1].to_string(),
            op,
            value,
        })
    }

    /// Whether `metadata` satisfies this predicate. A missing key never does.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        let Some(actual) = metadata.get(&self.key) else {
            return false;
        };
        let actual = actual.to_string();

        match (&self.value, self.op) {
            (FilterValue::List(items), FilterOp::In) => items.iter().any(|item| *item == actual),
            (FilterValue::Single(expected), FilterOp::Eq) => actual == *expected,
            (FilterValue::Single(expected), op) => {
                compare(&actual, expected).is_some_and(|ord| op.accepts(ord))
            }
            (FilterValue::List(_), _) => false,
        }
    }
}

impl FromStr for Filter {
    type Err = FilterSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            FilterValue::Single(v) => write!(f, "{}{}{}", self.key, self.op.as_str(), v),
            FilterValue::List(items) => write!(f, "{} in {}", self.key, items.join(",")),
        }
    }
}

/// Filters combined with AND, plus the expressions that failed to parse.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    pub filters: Vec<Filter>,
    pub rejected: Vec<FilterSyntaxError>,
}

impl FilterSet {
    /// No usable filters; every record is a candidate.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// True when every filter matches; an empty set matches everything.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.filters.iter().all(|f| f.matches(metadata))
    }
}

/// Parse every expression, keeping the good ones and logging the rest.
pub fn parse_filters<I, S>(exprs: I) -> FilterSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut set = FilterSet::default();
    for expr in exprs {
        match expr.as_ref().parse::<Filter>() {
            Ok(filter) => set.filters.push(filter),
            Err(e) => {
                warn!("Dropping filter: {e}");
                set.rejected.push(e);
            }
        }
    }
    set
}

fn unquote(s: &str) -> &str {
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// Numbers first, then dates; `None` when neither reading fits both sides.
fn compare(lhs: &str, rhs: &str) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (parse_number(lhs), parse_number(rhs)) {
        return a.partial_cmp(&b);
    }
    if let (Some(a), Some(b)) = (parse_date(lhs), parse_date(rhs)) {
        return Some(a.cmp(&b));
    }
    None
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
