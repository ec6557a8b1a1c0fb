//! Type definitions shared by the resolver and its callers.

use serde::{Deserialize, Serialize};

/// Individual entry within an opened archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Path of the entry within the archive
    pub path: String,

    /// Whether this entry is a directory
    pub is_directory: bool,

    /// Uncompressed size in bytes
    pub size: u64,

    /// Compressed size in bytes (if available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_size: Option<u64>,

    /// Whether the entry data is encrypted
    pub encrypted: bool,
}

/// One unwrap step: an outer archive whose main subfile was opened in turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestingLink {
    /// Format of the outer archive
    pub outer_format: String,

    /// Index of the main subfile inside the outer archive
    pub main_subfile: u32,

    /// Path of the main subfile as reported by the outer archive
    pub path: String,
}

/// Summary of an opened archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveInfo {
    /// Format of the innermost archive (e.g., "tar", "zip")
    pub format: String,

    /// Unwrap steps taken to reach it, outermost first
    pub chain: Vec<NestingLink>,

    /// Display name of the innermost archive, when it was nested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_archive_name: Option<String>,

    /// Size of the innermost archive's data, if the handler reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_size: Option<u64>,

    /// Number of entries in the archive
    pub entries: u64,

    /// Whether any entry is password-protected
    pub encrypted: bool,

    /// List of all entries in the archive
    pub entry_list: Vec<ArchiveEntry>,
}

/// Options for opening an archive.
#[derive(Clone)]
pub struct OpenOptions {
    /// Password for encrypted archives
    pub password: Option<String>,

    /// Detect the outermost format from content rather than the extension.
    /// Nested levels are always detected from content.
    pub detect_by_signature: bool,

    /// Formats accepted as payloads of self-extracting executables. Falls
    /// back to the registry document's list, then to the built-in list.
    pub sfx_handlers: Option<Vec<String>>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            password: None,
            detect_by_signature: true,
            sfx_handlers: None,
        }
    }
}

impl std::fmt::Debug for OpenOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenOptions")
            .field("password", &self.password.as_ref().map(|_| "<hidden>"))
            .field("detect_by_signature", &self.detect_by_signature)
            .field("sfx_handlers", &self.sfx_handlers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_options_default() {
        let options = OpenOptions::default();
        assert!(options.password.is_none());
        assert!(options.detect_by_signature);
        assert!(options.sfx_handlers.is_none());
    }

    #[test]
    fn test_open_options_debug_hides_password() {
        let options = OpenOptions {
            password: Some("hunter2".to_string()),
            ..OpenOptions::default()
        };
        let rendered = format!("{:?}", options);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<hidden>"));

        let rendered = format!("{:?}", OpenOptions::default());
        assert!(rendered.contains("password: None"));
    }

    #[test]
    fn test_archive_info_json_skips_missing_fields() {
        let info = ArchiveInfo {
            format: "tar".to_string(),
            chain: Vec::new(),
            sub_archive_name: None,
            physical_size: None,
            entries: 1,
            encrypted: false,
            entry_list: vec![ArchiveEntry {
                path: "a.txt".to_string(),
                is_directory: false,
                size: 3,
                compressed_size: None,
                encrypted: false,
            }],
        };

        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("sub_archive_name"));
        assert!(!json.contains("physical_size"));
        assert!(!json.contains("compressed_size"));
        assert!(json.contains("\"path\":\"a.txt\""));
    }
}
