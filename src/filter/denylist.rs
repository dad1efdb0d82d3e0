/// Domains excluded from results when the configuration does not name its own
///
/// Mostly forums, Q&A sites, social networks and large vendor sites whose
/// pages rarely make useful targets.
pub const DEFAULT_DENYLIST: &[&str] = &[
    "github.com",
    "reddit.com",
    "stackexchange.com",
    "stackoverflow.com",
    "quora.com",
    "medium.com",
    "facebook.com",
    "x.com",
    "twitter.com",
    "linkedin.com",
    "pinterest.com",
    "tumblr.com",
    "instagram.com",
    "flickr.com",
    "wikipedia.org",
    "youtube.com",
    "pastebin.com",
    "mozilla.org",
    "duckduckgo.com",
    "sitepoint.com",
    "codecademy.com",
    "bytes.com",
    "programmingforums.org",
    "dev.to",
    "codenewbie.org",
    "slashdot.org",
    "daniweb.com",
    "coderanch.com",
    "gamedev.net",
    "replit.com",
    "community.sap.com",
    "community.spiceworks.com",
    "techguy.org",
    "techsupportforum.com",
    "bleepingcomputer.com/forums",
    "linustechtips.com/main",
    "tomshardware.com/forum",
    "hardforum.com",
    "arstechnica.com/civis",
    "neowin.net/forum",
    "forums.anandtech.com",
    "php.net",
    "microsoft.com",
    "vulnweb.com",
    "intel.com",
];

/// Ordered set of lowercase substrings that disqualify a URL
///
/// Entries keep their insertion order; duplicates (after lowercasing and
/// trimming) and blank entries are dropped at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Denylist {
    entries: Vec<String>,
}

impl Denylist {
    /// Builds a denylist from arbitrary entries
    ///
    /// # Examples
    ///
    /// ```
    /// use serp_harvest::filter::Denylist;
    ///
    /// let denylist = Denylist::new(["Reddit.com", "reddit.com", "github.com"]);
    /// assert_eq!(denylist.len(), 2);
    /// assert_eq!(denylist.entries()[0], "reddit.com");
    /// ```
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list: Vec<String> = Vec::new();
        for entry in entries {
            let normalized = entry.as_ref().trim().to_lowercase();
            if normalized.is_empty() || list.contains(&normalized) {
                continue;
            }
            list.push(normalized);
        }
        Self { entries: list }
    }

    /// Returns the built-in denylist
    pub fn builtin() -> Self {
        Self::new(DEFAULT_DENYLIST.iter().copied())
    }

    /// Returns the first entry contained in `haystack`, if any
    ///
    /// `haystack` must already be lowercase.
    pub fn first_match(&self, haystack: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| haystack.contains(entry.as_str()))
            .map(String::as_str)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
