//! Supabase Storage API payloads

use serde::{Deserialize, Serialize};

/// Body of `POST /object/list/{bucket}`.
#[derive(Debug, Serialize)]
pub struct ListRequest<'a> {
    /// Folder to list, without a trailing slash.
    pub prefix: &'a str,
    pub limit: u32,
    pub offset: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<&'a str>,
    #[serde(rename = "sortBy")]
    pub sort_by: SortBy,
}

#[derive(Debug, Serialize)]
pub struct SortBy {
    pub column: &'static str,
    pub order: &'static str,
}

impl Default for SortBy {
    fn default() -> Self {
        Self {
            column: "name",
            order: "asc",
        }
    }
}

/// One entry of a folder listing. Sub-folders come back without an id.
#[derive(Debug, Clone, Deserialize)]
pub struct ListEntry {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: Option<ObjectMetadata>,
}

impl ListEntry {
    pub fn is_folder(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectMetadata {
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub mimetype: Option<String>,
}

/// Body of `DELETE /object/{bucket}`.
#[derive(Debug, Serialize)]
pub struct DeleteRequest<'a> {
    pub prefixes: &'a [String],
}

/// Error body returned by the storage API.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, rename = "statusCode")]
    pub status_code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
