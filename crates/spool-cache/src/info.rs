use serde::{Deserialize, Serialize};

/// Metadata of a remote resource, taken from the first response seen for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub content_length: u64,
    pub content_type: String,
    pub supports_range_access: bool,
}

impl ResourceInfo {
    pub fn new<S: Into<String>>(
        content_length: u64,
        content_type: S,
        supports_range_access: bool,
    ) -> Self {
        Self {
            content_length,
            content_type: content_type.into(),
            supports_range_access,
        }
    }
}
