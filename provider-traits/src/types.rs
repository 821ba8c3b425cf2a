//! Wire data shapes exchanged with the cloud-storage provider.

use serde::{Deserialize, Serialize};

/// Opaque pointer to content hosted by the provider but not yet owned by
/// this account: a share code plus its optional access code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShareRef {
    /// Provider-assigned share code
    pub share_code: String,
    /// Access code required to open the share, if any
    pub access_code: Option<String>,
}

impl ShareRef {
    pub fn new(share_code: impl Into<String>) -> Self {
        Self {
            share_code: share_code.into(),
            access_code: None,
        }
    }

    pub fn with_access_code(mut self, code: impl Into<String>) -> Self {
        self.access_code = Some(code.into());
        self
    }
}

impl std::fmt::Display for ShareRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.share_code)
    }
}

/// Availability of a share as reported by its snapshot.
///
/// Concrete clients map the provider's wire states onto this vocabulary;
/// codes they cannot classify become `Unknown` and the prober treats those
/// as an error rather than guessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareAvailability {
    /// Content is visible and transferable
    Ready,
    /// Provider is still auditing the shared content
    Auditing,
    /// Provider is still generating the share snapshot
    Snapshotting,
    /// The share has expired
    Expired,
    /// The share was taken down for a policy violation
    Prohibited,
    /// Unclassified wire state
    Unknown(i64),
}

/// One entry in a share snapshot or a destination-folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Provider-assigned identifier (file or folder)
    pub id: String,
    /// Display name
    pub name: String,
    /// Size in bytes; folders report none
    pub size: Option<u64>,
    /// Whether the entry is a folder
    pub is_dir: bool,
}

impl RemoteEntry {
    pub fn file(id: impl Into<String>, name: impl Into<String>, size: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size: Some(size),
            is_dir: false,
        }
    }

    pub fn dir(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size: None,
            is_dir: true,
        }
    }
}

/// Snapshot of a share: availability plus the flat list of top-level
/// transferable entries (only populated when `Ready`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareSnapshot {
    pub availability: ShareAvailability,
    pub entries: Vec<RemoteEntry>,
    /// Total number of files reachable through the share, when reported
    pub total_files: Option<u64>,
    /// Total payload size in bytes, when reported
    pub total_bytes: Option<u64>,
}

/// A share created by a publish call, before or after the permanent
/// extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedShare {
    pub share_code: String,
    pub access_code: Option<String>,
}

impl PublishedShare {
    /// Compose the user-facing link: `{base}/{code}` plus the access code
    /// as a `password` query parameter when present.
    pub fn url(&self, base: &str) -> String {
        let base = base.trim_end_matches('/');
        match &self.access_code {
            Some(code) => format!("{}/{}?password={}", base, self.share_code, code),
            None => format!("{}/{}", base, self.share_code),
        }
    }
}

/// Account storage usage as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceInfo {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl SpaceInfo {
    pub fn free_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.used_bytes)
    }

    /// Used fraction in `[0, 1]`; zero-capacity accounts report full.
    pub fn utilization(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        self.used_bytes as f64 / self.total_bytes as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_ref_display() {
        let share = ShareRef::new("sw3abc").with_access_code("x9y8");
        assert_eq!(share.to_string(), "sw3abc");
        assert_eq!(share.access_code.as_deref(), Some("x9y8"));
    }

    #[test]
    fn test_published_share_url() {
        let plain = PublishedShare {
            share_code: "swnew1".to_string(),
            access_code: None,
        };
        assert_eq!(plain.url("https://115.com/s/"), "https://115.com/s/swnew1");

        let coded = PublishedShare {
            share_code: "swnew2".to_string(),
            access_code: Some("abcd".to_string()),
        };
        assert_eq!(
            coded.url("https://115.com/s"),
            "https://115.com/s/swnew2?password=abcd"
        );
    }

    #[test]
    fn test_space_info_free_and_utilization() {
        let info = SpaceInfo {
            used_bytes: 920,
            total_bytes: 1000,
        };
        assert_eq!(info.free_bytes(), 80);
        assert!((info.utilization() - 0.92).abs() < f64::EPSILON);

        let empty = SpaceInfo {
            used_bytes: 0,
            total_bytes: 0,
        };
        assert_eq!(empty.free_bytes(), 0);
        assert_eq!(empty.utilization(), 1.0);
    }
}
