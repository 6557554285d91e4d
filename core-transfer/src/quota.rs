//! Storage quota accounting
//!
//! Usage is recomputed from the catalog on every call. The check and the
//! upload that follows are not atomic, so concurrent transfers can jointly
//! exceed the ceiling.

use core_media::{MediaCategory, StorageUsageRow};
use serde::Serialize;
use std::collections::BTreeMap;

/// Bytes and files stored for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryUsage {
    pub bytes: u64,
    pub files: usize,
}

/// Snapshot of object storage usage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageAnalytics {
    pub used_bytes: u64,
    pub ceiling_bytes: u64,
    /// `used_bytes / ceiling_bytes * 100`, not clamped.
    pub percentage: f64,
    pub file_count: usize,
    pub by_category: BTreeMap<MediaCategory, CategoryUsage>,
}

impl StorageAnalytics {
    pub fn from_rows(rows: &[StorageUsageRow], ceiling_bytes: u64) -> Self {
        let mut by_category: BTreeMap<MediaCategory, CategoryUsage> = BTreeMap::new();
        let mut used_bytes = 0u64;

        for row in rows {
            used_bytes = used_bytes.saturating_add(row.file_size);
            let usage = by_category.entry(row.category).or_default();
            usage.bytes = usage.bytes.saturating_add(row.file_size);
            usage.files += 1;
        }

        let percentage = if ceiling_bytes == 0 {
            0.0
        } else {
            used_bytes as f64 / ceiling_bytes as f64 * 100.0
        };

        Self {
            used_bytes,
            ceiling_bytes,
            percentage,
            file_count: rows.len(),
            by_category,
        }
    }

    pub fn available_bytes(&self) -> u64 {
        self.ceiling_bytes.saturating_sub(self.used_bytes)
    }

    /// Whether `required` more bytes fit under the ceiling.
    pub fn fits(&self, required: u64) -> bool {
        self.used_bytes.saturating_add(required) <= self.ceiling_bytes
    }
}

/// A cleanup item that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    pub media_file_id: String,
    pub storage_path: String,
    pub error: String,
}

/// Outcome of a cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Media ids whose object was removed.
    pub cleaned: Vec<String>,
    pub freed_bytes: u64,
    pub errors: Vec<CleanupFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn row(id: &str, category: MediaCategory, size: u64) -> StorageUsageRow {
        StorageUsageRow {
            media_file_id: id.to_string(),
            category,
            file_size: size,
        }
    }

    #[test]
    fn test_breakdown_by_category() {
        let rows = vec![
            row("a", MediaCategory::GalleryImage, 2 * GIB),
            row("b", MediaCategory::GalleryImage, GIB),
            row("c", MediaCategory::BackgroundVideo, GIB),
        ];
        let analytics = StorageAnalytics::from_rows(&rows, 8 * GIB);

        assert_eq!(analytics.used_bytes, 4 * GIB);
        assert_eq!(analytics.file_count, 3);
        assert!((analytics.percentage - 50.0).abs() < f64::EPSILON);
        assert_eq!(
            analytics.by_category[&MediaCategory::GalleryImage],
            CategoryUsage {
                bytes: 3 * GIB,
                files: 2
            }
        );
        assert!(!analytics.by_category.contains_key(&MediaCategory::Logo));
        assert_eq!(analytics.available_bytes(), 4 * GIB);
    }

    #[test]
    fn test_fits_is_inclusive() {
        let analytics = StorageAnalytics::from_rows(&[row("a", MediaCategory::Logo, 6 * GIB)], 8 * GIB);
        assert!(analytics.fits(2 * GIB));
        assert!(!analytics.fits(2 * GIB + 1));
    }

    #[test]
    fn test_empty_usage() {
        let analytics = StorageAnalytics::from_rows(&[], 8 * GIB);
        assert_eq!(analytics.used_bytes, 0);
        assert_eq!(analytics.percentage, 0.0);
        assert!(!analytics.fits(9 * GIB));
    }
}
