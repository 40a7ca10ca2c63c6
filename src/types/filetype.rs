use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Coarse classification of an uploaded bundle, inferred from its filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Android,
    Ios,
    Other,
}

impl FileType {
    /// Infers the type from the original filename's extension.
    #[must_use]
    pub fn from_filename(name: &str) -> FileType {
        match Path::new(name).extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("apk") => FileType::Android,
            Some(ext) if ext.eq_ignore_ascii_case("ipa") => FileType::Ios,
            _ => FileType::Other,
        }
    }

    /// Converts the stored integer representation back to a type.
    #[must_use]
    pub fn from_i64(value: i64) -> FileType {
        match value {
            1 => FileType::Android,
            2 => FileType::Ios,
            _ => FileType::Other,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            FileType::Android => "android",
            FileType::Ios => "ios",
            FileType::Other => "other",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<FileType> for i64 {
    fn from(t: FileType) -> Self {
        match t {
            FileType::Android => 1,
            FileType::Ios => 2,
            FileType::Other => 0,
        }
    }
}
