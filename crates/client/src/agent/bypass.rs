//! Hosts whose traffic never touches the cache.

use url::Url;

/// Set of hostname substrings matched against a request's host.
///
/// Matching is a case-insensitive `contains`, so an entry also covers its
/// subdomains (`googleapis.com` matches `firestore.googleapis.com`).
#[derive(Debug, Clone, Default)]
pub struct BypassDomains {
    entries: Vec<String>,
}

impl BypassDomains {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .map(|e| e.as_ref().trim().to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { entries }
    }

    /// The entry that matches `url`'s host, if any.
    pub fn matching(&self, url: &Url) -> Option<&str> {
        let host = url.host_str()?.to_ascii_lowercase();
        self.entries.iter().find(|e| host.contains(e.as_str())).map(String::as_str)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
