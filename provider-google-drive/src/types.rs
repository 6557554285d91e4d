//! Google Drive API payloads
//!
//! Data structures for Google Drive API v3 requests and responses.

use serde::{Deserialize, Serialize};

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Google Drive API file resource
///
/// See: https://developers.google.com/drive/api/v3/reference/files#resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,

    pub name: String,

    pub mime_type: String,

    /// Decimal string, omitted for folders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    /// RFC 3339
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,

    /// RFC 3339
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,

    #[serde(default)]
    pub parents: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_content_link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_link: Option<String>,

    #[serde(default)]
    pub trashed: bool,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

/// Google Drive API files.list response
///
/// See: https://developers.google.com/drive/api/v3/reference/files/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesListResponse {
    #[serde(default)]
    pub files: Vec<DriveFile>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Body of files.create, for folders and upload session metadata alike.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCreateRequest<'a> {
    pub name: &'a str,
    pub mime_type: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<&'a str>,
}

/// Body of permissions.create.
#[derive(Debug, Serialize)]
pub struct PermissionRequest<'a> {
    pub role: &'a str,
    #[serde(rename = "type")]
    pub grantee: &'a str,
}

impl PermissionRequest<'static> {
    /// Anyone with the link can view.
    pub fn public_reader() -> Self {
        Self {
            role: "reader",
            grantee: "anyone",
        }
    }
}
