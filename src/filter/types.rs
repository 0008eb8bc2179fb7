use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Search operators accepted in `field__op` query parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Neq,
    In,
    Nin,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    Starts,
    Ends,
    Null,
    NotNull,
}

impl FilterOp {
    pub const ALL: [FilterOp; 13] = [
        FilterOp::Eq,
        FilterOp::Neq,
        FilterOp::In,
        FilterOp::Nin,
        FilterOp::Gt,
        FilterOp::Gte,
        FilterOp::Lt,
        FilterOp::Lte,
        FilterOp::Contains,
        FilterOp::Starts,
        FilterOp::Ends,
        FilterOp::Null,
        FilterOp::NotNull,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::In => "in",
            FilterOp::Nin => "nin",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Contains => "contains",
            FilterOp::Starts => "starts",
            FilterOp::Ends => "ends",
            FilterOp::Null => "null",
            FilterOp::NotNull => "notnull",
        }
    }

    /// Operators that take a list of values
    pub fn is_list(&self) -> bool {
        matches!(self, FilterOp::In | FilterOp::Nin)
    }

    /// Operators that ignore the submitted value
    pub fn is_unary(&self) -> bool {
        matches!(self, FilterOp::Null | FilterOp::NotNull)
    }

    /// Operators matching text with a wildcard pattern
    pub fn is_pattern(&self) -> bool {
        matches!(self, FilterOp::Contains | FilterOp::Starts | FilterOp::Ends)
    }
}

impl FromStr for FilterOp {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterOp::ALL.iter().copied().find(|op| op.as_str() == s).ok_or(())
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_operators() {
        assert_eq!("notnull".parse::<FilterOp>(), Ok(FilterOp::NotNull));
        assert_eq!("contains".parse::<FilterOp>(), Ok(FilterOp::Contains));
        assert!("like".parse::<FilterOp>().is_err());
        assert!("$eq".parse::<FilterOp>().is_err());
    }
}
