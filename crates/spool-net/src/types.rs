use std::{collections::HashMap, ops::Range, time::Duration};

/// Request or response header map.
///
/// Keys keep the casing they were inserted with; [`Headers::get_ignore_case`]
/// is the lookup to use for headers coming back from a server.
#[derive(Clone, Debug, PartialEq)]
pub struct Headers {
    inner: HashMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.inner.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(String::as_str)
    }

    pub fn get_ignore_case(&self, key: &str) -> Option<&str> {
        self.get(key).or_else(|| {
            self.inner
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.as_str())
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for Headers {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte range for a `Range` request header. `end` is inclusive.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeSpec {
    pub start: u64,
    pub end: Option<u64>,
}

impl RangeSpec {
    pub fn new(start: u64, end: Option<u64>) -> Self {
        Self { start, end }
    }

    pub fn from_start(start: u64) -> Self {
        Self { start, end: None }
    }

    /// Range spec covering the half-open `range`.
    ///
    /// An end of `u64::MAX` means "until the end of the resource".
    pub fn from_range(range: &Range<u64>) -> Self {
        if range.end == u64::MAX {
            return Self::from_start(range.start);
        }
        Self::new(range.start, Some(range.end.saturating_sub(1)))
    }

    pub fn to_header_value(&self) -> String {
        if let Some(end) = self.end {
            format!("bytes={}-{}", self.start, end)
        } else {
            format!("bytes={}-", self.start)
        }
    }
}

#[derive(Clone, Debug)]
pub struct NetOptions {
    /// Deadline for the request/response phase and for every idle gap
    /// between body chunks.
    pub request_timeout: Duration,
    /// Max idle connections per host. Set to 0 to disable pooling.
    pub pool_max_idle_per_host: usize,
}

impl Default for NetOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            pool_max_idle_per_host: 2,
        }
    }
}

impl NetOptions {
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case::empty_headers(Headers::new(), true)]
    #[case::headers_with_values({
        let mut h = Headers::new();
        h.insert("key1", "value1");
        h
    }, false)]
    fn test_headers_is_empty(#[case] headers: Headers, #[case] expected_empty: bool) {
        assert_eq!(headers.is_empty(), expected_empty);
    }

    #[rstest]
    #[case("content-range", "Content-Range")]
    #[case("CONTENT-TYPE", "content-type")]
    #[case("Accept-Ranges", "accept-ranges")]
    fn test_headers_get_ignore_case(#[case] inserted: &str, #[case] lookup: &str) {
        let mut headers = Headers::new();
        headers.insert(inserted, "v");

        assert_eq!(headers.get_ignore_case(lookup), Some("v"));
        assert_eq!(headers.get_ignore_case("x-missing"), None);
    }

    #[rstest]
    #[case::full_range(0, Some(100), "bytes=0-100")]
    #[case::open_ended(50, None, "bytes=50-")]
    #[case::single_byte(10, Some(10), "bytes=10-10")]
    fn test_range_spec_to_header_value(
        #[case] start: u64,
        #[case] end: Option<u64>,
        #[case] expected_header: &str,
    ) {
        let range = RangeSpec::new(start, end);
        assert_eq!(range.to_header_value(), expected_header);
    }

    #[rstest]
    #[case::bounded(0..1000, "bytes=0-999")]
    #[case::one_byte(7..8, "bytes=7-7")]
    #[case::open(500..u64::MAX, "bytes=500-")]
    fn test_range_spec_from_range(#[case] range: Range<u64>, #[case] expected_header: &str) {
        assert_eq!(RangeSpec::from_range(&range).to_header_value(), expected_header);
    }

    #[test]
    fn test_net_options_default_timeout() {
        let options = NetOptions::default();
        assert_eq!(options.request_timeout, Duration::from_secs(60));
    }
}
