//! Authenticated query-string construction.
//!
//! Every Virtualizor call is a request against a single endpoint where the action and
//! credentials travel in the query string:
//! `{base}?act={action}&api=json&apikey={key}&apipass={pass}[&extra=...]`.

use crate::client::QueryEncoding;
use std::fmt;
use std::fmt::Display;
use url::form_urlencoded;

/// Ordered builder for query parameter pairs.
///
/// Keys are unique: pushing a key that is already present replaces its value in place,
/// so the mandatory parameters always appear exactly once and in their original position.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(&'static str, String)>,
}

impl QueryParams {
    /// Create a new, empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Start a builder with the mandatory `act`, `api`, `apikey` and `apipass` pairs.
    #[must_use]
    pub fn authenticated(action: &str, api_key: &str, api_pass: &str) -> Self {
        let mut params = Self::new();
        params.push("act", action);
        params.push("api", "json");
        params.push("apikey", api_key);
        params.push("apipass", api_pass);
        params
    }

    /// Append a key/value pair.
    pub fn push<T>(&mut self, key: &'static str, value: T)
    where
        T: Display,
    {
        let value = value.to_string();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    /// Append every pair from `extra`, in order.
    pub fn extend<T>(&mut self, extra: &[(&'static str, T)])
    where
        T: Display,
    {
        for (key, value) in extra {
            self.push(*key, value);
        }
    }

    /// Render `key=value` pairs joined by `&`.
    #[must_use]
    pub fn to_query_string(&self, encoding: QueryEncoding) -> String {
        self.pairs
            .iter()
            .map(|(key, value)| match encoding {
                QueryEncoding::Encoded => {
                    let encoded: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
                    format!("{key}={encoded}")
                }
                QueryEncoding::Raw => format!("{key}={value}"),
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Append the rendered query to `base_url` after a `?`.
    #[must_use]
    pub fn to_url(&self, base_url: &str, encoding: QueryEncoding) -> String {
        format!("{base_url}?{}", self.to_query_string(encoding))
    }
}

impl fmt::Debug for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.pairs.iter().map(|(key, value)| {
                let shown = if *key == "apipass" { "***" } else { value.as_str() };
                (key, shown)
            }))
            .finish()
    }
}
