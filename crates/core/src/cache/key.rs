//! Request identity used to key cache entries.

use sha2::{Digest, Sha256};
use url::Url;

use crate::resource::{Method, ResourceRequest};

/// Normalized method + URL of a request.
///
/// The query string is significant; the fragment is dropped because it never
/// reaches the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    method: Method,
    url: Url,
    hash: String,
}

impl RequestKey {
    pub fn new(method: Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        let hash = compute_key_hash(method.as_str(), url.as_str());
        Self { method, url, hash }
    }

    pub fn for_request(request: &ResourceRequest) -> Self {
        Self::new(request.method, &request.url)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Hex SHA-256 used as the primary key within a generation.
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Compute the storage hash for a method + URL pair.
pub fn compute_key_hash(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
