//! Search request model and query-string parsing

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Validation failure for a search query string.
///
/// Display strings are part of the HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("invalid parameter: {0}")]
    UnknownParameter(String),

    #[error("invalid {param} parameter: {reason}")]
    InvalidValue { param: String, reason: String },

    #[error("invalid sort field: {0}")]
    InvalidSortField(String),
}

impl ParamError {
    fn invalid(param: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            param: param.to_string(),
            reason: reason.into(),
        }
    }
}

/// Fields a search may be filtered on
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FilterField {
    Description,
    Name,
    Owner,
    Provides,
    Requires,
    Series,
    Summary,
    Tags,
    Type,
    Promulgated,
}

/// Filter values keyed by field: OR within a field, AND across fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filters(BTreeMap<FilterField, Vec<String>>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one value for `field`, keeping earlier values
    pub fn push(&mut self, field: FilterField, value: impl Into<String>) {
        self.0.entry(field).or_default().push(value.into());
    }

    /// Builder form of [`Filters::push`]
    pub fn with(mut self, field: FilterField, value: impl Into<String>) -> Self {
        self.push(field, value);
        self
    }

    pub fn get(&self, field: FilterField) -> Option<&[String]> {
        self.0.get(&field).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FilterField, &[String])> {
        self.0.iter().map(|(f, v)| (*f, v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Fields a search may be sorted on
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortField {
    Name,
    Owner,
    Series,
    Downloads,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            descending: true,
        }
    }
}

impl FromStr for SortKey {
    type Err = ParamError;

    /// Parses `field` or `-field`
    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let (descending, name) = match token.strip_prefix('-') {
            Some(name) => (true, name),
            None => (false, token),
        };
        let field = SortField::from_str(name)
            .map_err(|_| ParamError::InvalidSortField(name.to_string()))?;
        Ok(Self { field, descending })
    }
}

/// A validated search request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free text; empty matches everything
    pub text: String,

    /// Treat the text as a partial word
    pub auto_complete: bool,

    pub filters: Filters,

    /// Metadata sections to attach to each result
    pub include: Vec<String>,

    /// Maximum results to return; zero means no limit
    pub limit: usize,

    pub skip: usize,

    /// Explicit ordering; empty means relevance
    pub sort: Vec<SortKey>,
}

impl SearchRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, field: FilterField, value: impl Into<String>) -> Self {
        self.filters.push(field, value);
        self
    }

    pub fn with_sort(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_auto_complete(mut self, auto_complete: bool) -> Self {
        self.auto_complete = auto_complete;
        self
    }

    pub fn with_include(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.is_empty() && !self.include.contains(&name) {
            self.include.push(name);
        }
        self
    }

    /// Parse raw query-string pairs (keys may repeat).
    ///
    /// Unknown keys are rejected before any value is looked at.
    pub fn from_pairs<K, V>(pairs: &[(K, V)]) -> Result<Self, ParamError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let pairs: Vec<(&str, &str)> = pairs
            .iter()
            .map(|(k, v)| (k.as_ref(), v.as_ref()))
            .collect();

        if let Some((key, _)) = pairs.iter().find(|(k, _)| !is_known_key(k)) {
            return Err(ParamError::UnknownParameter(key.to_string()));
        }

        let mut req = SearchRequest::default();

        if let Some(text) = first_value(&pairs, "text") {
            req.text = text.to_string();
        }

        if let Some(value) = first_value(&pairs, "autocomplete") {
            req.auto_complete =
                parse_bool(value).map_err(|reason| ParamError::invalid("autocomplete", reason))?;
        }

        if let Some(value) = first_value(&pairs, "limit") {
            let limit = parse_int(value).map_err(|reason| ParamError::invalid("limit", reason))?;
            if limit <= 0 {
                return Err(ParamError::invalid(
                    "limit",
                    "expected integer greater than zero",
                ));
            }
            req.limit = limit as usize;
        }

        if let Some(value) = first_value(&pairs, "skip") {
            let skip = parse_int(value).map_err(|reason| ParamError::invalid("skip", reason))?;
            if skip < 0 {
                return Err(ParamError::invalid("skip", "expected non-negative integer"));
            }
            req.skip = skip as usize;
        }

        for value in all_values(&pairs, "include") {
            req = req.with_include(value);
        }

        for value in all_values(&pairs, "sort") {
            for token in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                req.sort.push(token.parse()?);
            }
        }

        for (key, value) in &pairs {
            let Ok(field) = FilterField::from_str(key) else {
                continue;
            };
            if field == FilterField::Promulgated {
                parse_bool(value)
                    .map_err(|reason| ParamError::invalid("promulgated filter", reason))?;
            }
            req.filters.push(field, *value);
        }

        Ok(req)
    }
}

fn first_value<'a>(pairs: &[(&'a str, &'a str)], name: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| *k == name).map(|(_, v)| *v)
}

fn all_values<'a>(
    pairs: &'a [(&'a str, &'a str)],
    name: &'a str,
) -> impl Iterator<Item = &'a str> + 'a {
    pairs
        .iter()
        .filter(move |(k, _)| *k == name)
        .map(|(_, v)| *v)
}

fn is_known_key(key: &str) -> bool {
    matches!(
        key,
        "text" | "autocomplete" | "limit" | "skip" | "include" | "sort"
    ) || FilterField::from_str(key).is_ok()
}

/// Parse a `"0"`/`"1"` flag
pub(crate) fn parse_bool(value: &str) -> Result<bool, String> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(format!(
            "unexpected bool value {:?} (must be \"0\" or \"1\")",
            value
        )),
    }
}

fn parse_int(value: &str) -> Result<i64, String> {
    value
        .parse::<i64>()
        .map_err(|e| format!("could not parse integer: {}", e))
}
