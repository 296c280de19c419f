use serde::{Deserialize, Serialize};

/// One page of a paginated feed, as returned by
/// `GET <base>?page=<n>&size=<m>`.
///
/// `content` may be absent or null, which is treated like an empty page.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageEnvelope<T> {
    #[serde(default = "Option::default")]
    pub content: Option<Vec<T>>,
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub total_pages: u64,
}

impl<T> PageEnvelope<T> {
    pub fn is_empty(&self) -> bool {
        self.content.as_ref().is_none_or(|c| c.is_empty())
    }

    pub fn len(&self) -> usize {
        self.content.as_ref().map_or(0, Vec::len)
    }

    pub fn into_content(self) -> Vec<T> {
        self.content.unwrap_or_default()
    }
}
