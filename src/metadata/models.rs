/// File record data models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle state of a stored file
///
/// Bytes are retrievable if and only if the record is `Available`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Pending,
    Available,
    CleanupRequired,
    Deleted,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "pending",
            FileStatus::Available => "available",
            FileStatus::CleanupRequired => "cleanup_required",
            FileStatus::Deleted => "deleted",
        }
    }
}

impl FromStr for FileStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FileStatus::Pending),
            "available" => Ok(FileStatus::Available),
            "cleanup_required" => Ok(FileStatus::CleanupRequired),
            "deleted" => Ok(FileStatus::Deleted),
            other => Err(format!("Unknown file status '{}'", other)),
        }
    }
}

/// File metadata stored in database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub storage_key: String,
    pub user_filename: String,
    pub content_type: String,
    pub owner: Option<String>,
    pub status: FileStatus,
    pub metadata: String,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
}

/// Values for a new Pending record
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub storage_key: String,
    pub user_filename: String,
    pub content_type: String,
    pub owner: Option<String>,
    pub metadata: String,
}

/// Metadata snapshot returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDetails {
    pub id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub status: FileStatus,
    pub metadata: String,
    pub created_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
}

impl From<&FileRecord> for FileDetails {
    fn from(record: &FileRecord) -> Self {
        Self {
            id: record.id,
            filename: record.user_filename.clone(),
            content_type: record.content_type.clone(),
            status: record.status,
            metadata: record.metadata.clone(),
            created_at: record.created_at,
            last_modified_at: record.last_modified_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_column_text() {
        for status in [
            FileStatus::Pending,
            FileStatus::Available,
            FileStatus::CleanupRequired,
            FileStatus::Deleted,
        ] {
            assert_eq!(status.as_str().parse::<FileStatus>(), Ok(status));
        }
        assert!("archived".parse::<FileStatus>().is_err());
    }
}
