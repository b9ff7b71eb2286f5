//! Ordered query parameter list.
//!
//! Copy requests rewrite a handful of query parameters (`multipart-manifest`,
//! `format`) while everything else must survive untouched and in order.

use std::fmt;

/// Query parameters in their original order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parse a raw query string (without the leading `?`).
    ///
    /// # Examples
    ///
    /// ```
    /// use ruststack_copy_core::query::QueryParams;
    ///
    /// let q = QueryParams::parse("multipart-manifest=get&a=1");
    /// assert_eq!(q.get("multipart-manifest"), Some("get"));
    /// ```
    #[must_use]
    pub fn parse(query: &str) -> Self {
        Self {
            pairs: form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        }
    }

    /// Parse the query string of a URI, if any.
    #[must_use]
    pub fn from_uri(uri: &http::Uri) -> Self {
        uri.query().map(Self::parse).unwrap_or_default()
    }

    /// First value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set `key` to `value`, replacing all existing values in place of the first.
    pub fn set(&mut self, key: &str, value: &str) {
        match self.pairs.iter().position(|(k, _)| k == key) {
            Some(idx) => {
                self.pairs[idx].1 = value.to_owned();
                let mut seen = 0usize;
                self.pairs.retain(|(k, _)| {
                    if k == key {
                        seen += 1;
                        seen == 1
                    } else {
                        true
                    }
                });
            }
            None => self.pairs.push((key.to_owned(), value.to_owned())),
        }
    }

    /// Remove every value of `key`.
    pub fn remove(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    /// Whether there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Append the encoded query (with `?`) to `path`.
    #[must_use]
    pub fn with_path(&self, path: &str) -> String {
        if self.is_empty() {
            path.to_owned()
        } else {
            format!("{path}?{self}")
        }
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.pairs)
            .finish();
        f.write_str(&encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_and_encode_in_order() {
        let q = QueryParams::parse("b=2&a=1&c=x%20y");
        assert_eq!(q.get("c"), Some("x y"));
        assert_eq!(q.to_string(), "b=2&a=1&c=x+y");
    }

    #[test]
    fn test_should_set_existing_key_in_place() {
        let mut q = QueryParams::parse("multipart-manifest=get&a=1&multipart-manifest=x");
        q.set("multipart-manifest", "put");
        assert_eq!(q.to_string(), "multipart-manifest=put&a=1");
    }

    #[test]
    fn test_should_append_new_key() {
        let mut q = QueryParams::parse("a=1");
        q.set("format", "raw");
        assert_eq!(q.to_string(), "a=1&format=raw");
    }

    #[test]
    fn test_should_remove_key() {
        let mut q = QueryParams::parse("multipart-manifest=get&a=1");
        q.remove("multipart-manifest");
        assert_eq!(q.get("multipart-manifest"), None);
        assert_eq!(q.with_path("/v1/a/c/o"), "/v1/a/c/o?a=1");
    }

    #[test]
    fn test_should_omit_question_mark_when_empty() {
        let q = QueryParams::from_uri(&"/v1/a/c/o".parse().expect("valid uri"));
        assert!(q.is_empty());
        assert_eq!(q.with_path("/v1/a/c/o"), "/v1/a/c/o");
    }
}
