use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Document,
    Image,
    Video,
    Audio,
    Other,
}

impl FileType {
    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Document => "document",
            FileType::Image => "image",
            FileType::Video => "video",
            FileType::Audio => "audio",
            FileType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "document" => Some(FileType::Document),
            "image" => Some(FileType::Image),
            "video" => Some(FileType::Video),
            "audio" => Some(FileType::Audio),
            "other" => Some(FileType::Other),
            _ => None,
        }
    }
}

/// Metadata record for one stored binary, before the document store assigns it an id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileDocument {
    #[serde(rename = "type")]
    pub kind: FileType,
    pub name: String,
    pub url: String,
    pub extension: String,
    pub size: i64,
    pub owner: String,
    pub account_id: String,
    pub users: Vec<String>,
    pub bucket_file_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    #[serde(flatten)]
    pub document: FileDocument,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FileList {
    pub total: usize,
    pub documents: Vec<FileRecord>,
}

impl From<Vec<FileRecord>> for FileList {
    fn from(documents: Vec<FileRecord>) -> Self {
        Self { total: documents.len(), documents }
    }
}
