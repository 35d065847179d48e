use derive_more::Display;
use serde::Serialize;
use std::path::PathBuf;

/// Why a single ROM could not be classified (or placed).
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum FailureKind {
    /// The file could not be opened or read.
    #[display("Read Error")]
    Read,
    /// The file is empty or too small to be a ROM.
    #[display("Format Error")]
    Format,
    /// Neither the hash library nor the catalog knows the content hash.
    #[display("Unknown ROM")]
    UnknownRom,
    /// The hash belongs to a game that no longer exists upstream.
    #[display("Game Not Found")]
    GameNotFound,
    /// The catalog could not answer, even after retrying.
    #[display("Catalog Error")]
    Catalog,
    /// The file was classified but could not be copied or moved.
    #[display("File Processing Error")]
    Placement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

/// Per-file result of reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    HasAchievements(u32),
    NoAchievements,
    Error(Failure),
}

impl Outcome {
    /// A count of zero means "known, no achievements".
    pub fn from_count(achievements: u32) -> Self {
        match achievements {
            0 => Self::NoAchievements,
            n => Self::HasAchievements(n),
        }
    }

    pub fn has_achievements(&self) -> bool {
        matches!(self, Self::HasAchievements(_))
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Error(failure) => Some(failure),
            _ => None,
        }
    }
}

/// A ROM together with everything reconciliation learned about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRom {
    pub path: PathBuf,
    /// Absent when hashing failed.
    pub hash: Option<String>,
    pub title: Option<String>,
    pub outcome: Outcome,
}

impl ClassifiedRom {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, Outcome::NoAchievements)]
    #[case(1, Outcome::HasAchievements(1))]
    #[case(42, Outcome::HasAchievements(42))]
    fn test_from_count(#[case] count: u32, #[case] expected: Outcome) {
        assert_eq!(Outcome::from_count(count), expected);
    }

    #[test]
    fn test_failure_labels() {
        assert_eq!(FailureKind::UnknownRom.to_string(), "Unknown ROM");
        assert_eq!(FailureKind::Placement.to_string(), "File Processing Error");
        let outcome = Outcome::Error(Failure::new(FailureKind::Read, "permission denied"));
        assert_eq!(outcome.failure().map(|f| f.kind), Some(FailureKind::Read));
        assert!(!outcome.has_achievements());
    }
}
