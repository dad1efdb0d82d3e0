use crate::HarvestError;
use std::fmt;

/// A normalized search query
///
/// Leading and trailing whitespace is removed and internal whitespace runs
/// collapse to a single space. Spaces become `+` on the wire through the
/// form encoding of the `q` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query(String);

impl Query {
    /// Normalizes `raw`, rejecting queries that are empty afterwards
    ///
    /// # Examples
    ///
    /// ```
    /// use serp_harvest::Query;
    ///
    /// let query = Query::new("  inurl:admin   login ").unwrap();
    /// assert_eq!(query.as_str(), "inurl:admin login");
    /// assert!(Query::new(" \t ").is_err());
    /// ```
    pub fn new(raw: &str) -> Result<Self, HarvestError> {
        let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.is_empty() {
            return Err(HarvestError::EmptyQuery);
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
