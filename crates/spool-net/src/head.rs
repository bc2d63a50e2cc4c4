use crate::types::Headers;

/// Status line and headers of a ranged response, captured before the body
/// is consumed.
#[derive(Clone, Debug, PartialEq)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: Headers,
}

impl ResponseHead {
    pub fn new(status: u16, headers: Headers) -> Self {
        Self { status, headers }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get_ignore_case("content-type")
    }

    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get_ignore_case("content-length")
            .and_then(|v| v.trim().parse().ok())
    }

    /// First byte offset from `Content-Range: bytes <start>-b/total`.
    pub fn content_range_start(&self) -> Option<u64> {
        let value = self.headers.get_ignore_case("content-range")?;
        let spec = value.trim().strip_prefix("bytes")?.trim_start();
        spec.split('-').next()?.trim().parse().ok()
    }

    /// Total resource length from `Content-Range: bytes a-b/<total>`.
    ///
    /// `None` when the header is absent or the total is `*`.
    pub fn content_range_total(&self) -> Option<u64> {
        let value = self.headers.get_ignore_case("content-range")?;
        value.rsplit('/').next()?.trim().parse().ok()
    }

    /// Total resource length: `Content-Range` first, then `Content-Length` of
    /// a full-body `200` response.
    pub fn total_length(&self) -> Option<u64> {
        self.content_range_total().or_else(|| {
            if self.status == 200 {
                self.content_length()
            } else {
                None
            }
        })
    }

    pub fn accepts_byte_ranges(&self) -> bool {
        self.headers
            .get_ignore_case("accept-ranges")
            .is_some_and(|v| v.split(',').any(|token| token.trim() == "bytes"))
    }

    pub fn is_partial(&self) -> bool {
        self.status == 206
    }

    /// Whether the MIME type is a `video/*` type.
    pub fn is_video(&self) -> bool {
        self.content_type().is_some_and(|ct| {
            ct.trim_start()
                .get(..6)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case("video/"))
        })
    }
}
