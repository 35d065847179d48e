use crate::error::{Error, ErrorKind};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::str::FromStr;

/// A gaming platform whose ROMs can be hashed and looked up in the catalog.
///
/// Only one system is supported; the enum exists so that the catalog id,
/// file extensions and size limits travel together instead of being
/// scattered around as magic numbers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum System {
    #[default]
    GameBoyAdvance,
}

impl System {
    /// Console identifier used by the RetroAchievements catalog.
    #[must_use]
    pub const fn id(&self) -> u32 {
        match self {
            Self::GameBoyAdvance => 5,
        }
    }

    /// Short name for configuration (for displaying to user).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GameBoyAdvance => "gba",
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GameBoyAdvance => "Game Boy Advance",
        }
    }

    /// File extensions (without the leading dot) of ROM dumps for this system.
    #[must_use]
    pub const fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::GameBoyAdvance => &["gba"],
        }
    }

    /// Smallest file size that could plausibly be a ROM.
    ///
    /// For the GBA this is the 192-byte cartridge header; anything shorter
    /// cannot even contain the entry point and logo.
    #[must_use]
    pub const fn min_rom_size(&self) -> u64 {
        match self {
            Self::GameBoyAdvance => 0xC0,
        }
    }

    /// Whether the file extension of `path` (case-insensitive) belongs to this system.
    pub fn matches_extension(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions().iter().any(|known| known.eq_ignore_ascii_case(ext)))
    }
}

impl Display for System {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for System {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gba" | "game-boy-advance" | "gameboy-advance" | "5" => Ok(Self::GameBoyAdvance),
            other => exn::bail!(ErrorKind::UnsupportedSystem(other.to_string())),
        }
    }
}

impl TryFrom<u32> for System {
    type Error = Error;
    fn try_from(id: u32) -> Result<Self, Self::Error> {
        match id {
            5 => Ok(Self::GameBoyAdvance),
            other => exn::bail!(ErrorKind::UnsupportedSystem(other.to_string())),
        }
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::System;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    impl Serialize for System {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(self.as_str())
        }
    }

    // Configuration files may say `system = "gba"` or `system = 5`.
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Id(u32),
        Name(String),
    }

    impl<'de> Deserialize<'de> for System {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            match Raw::deserialize(deserializer)? {
                Raw::Id(id) => System::try_from(id).map_err(|e| D::Error::custom(&*e)),
                Raw::Name(name) => name.parse().map_err(|e: crate::error::Error| D::Error::custom(&*e)),
            }
        }
    }
}
