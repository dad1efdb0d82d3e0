//! Result filtering
//!
//! Decides whether a discovered result URL may be written to the output.
//! Matching is plain substring containment against the denylist, so an entry
//! like `x.com` also blocks `https://fox.com/` and any URL whose path or query
//! happens to contain the entry.

mod denylist;

pub use denylist::{Denylist, DEFAULT_DENYLIST};

/// Pure accept/reject predicate over an injected denylist
#[derive(Debug, Clone, Default)]
pub struct Filter {
    denylist: Denylist,
}

impl Filter {
    pub fn new(denylist: Denylist) -> Self {
        Self { denylist }
    }

    /// Returns true if the URL contains none of the denylist entries
    ///
    /// Comparison is case-insensitive.
    ///
    /// # Examples
    ///
    /// ```
    /// use serp_harvest::filter::{Denylist, Filter};
    ///
    /// let filter = Filter::new(Denylist::new(["github.com"]));
    /// assert!(!filter.accept("https://GitHub.com/rust-lang/rust"));
    /// assert!(filter.accept("https://example.com/"));
    /// ```
    pub fn accept(&self, url: &str) -> bool {
        self.rejected_by(url).is_none()
    }

    /// Returns the denylist entry that rejects `url`, if any
    pub fn rejected_by(&self, url: &str) -> Option<&str> {
        if self.denylist.is_empty() {
            return None;
        }
        self.denylist.first_match(&url.to_lowercase())
    }

    pub fn denylist(&self) -> &Denylist {
        &self.denylist
    }
}
