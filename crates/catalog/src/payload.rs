//! Response bodies of the catalog endpoints.
//!
//! The catalog has returned numbers both as JSON numbers and as strings over
//! the years, so numeric fields accept either.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use serde::{Deserialize, Deserializer};

mod lenient {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Int(u32),
        Text(String),
    }

    impl Number {
        fn into_u32<E: serde::de::Error>(self) -> Result<u32, E> {
            match self {
                Self::Int(n) => Ok(n),
                Self::Text(text) => text.trim().parse().map_err(E::custom),
            }
        }
    }

    pub(super) fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        Number::deserialize(deserializer)?.into_u32()
    }

    pub(super) fn optional_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        Option::<Number>::deserialize(deserializer)?
            .map(Number::into_u32::<D::Error>)
            .transpose()
    }
}

/// One content hash from the bulk game list, with the game it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogHash {
    /// Lowercase hex.
    pub hash: String,
    pub game_id: u32,
    pub title: String,
    /// Present when the listing included achievement counts.
    pub achievements: Option<u32>,
}

/// Per-game details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameDetail {
    pub id: u32,
    pub title: String,
    pub achievements: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GameListEntry {
    #[serde(rename = "ID", deserialize_with = "lenient::number")]
    id: u32,
    title: String,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    num_achievements: Option<u32>,
    #[serde(default, deserialize_with = "null_as_empty")]
    hashes: Vec<String>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GameListPayload {
    Games(Vec<GameListEntry>),
    Failure {
        #[serde(rename = "Error")]
        error: String,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GameInfoPayload {
    #[serde(rename = "ID", default, deserialize_with = "lenient::optional_number")]
    id: Option<u32>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    num_achievements: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

/// Flattens a game list into one entry per content hash.
///
/// Accepts both the live endpoint's response and an offline dump of it.
/// Hashes are normalized to lowercase; games without hashes contribute
/// nothing.
pub fn parse_game_list(body: &str) -> Result<Vec<CatalogHash>> {
    let payload: GameListPayload = serde_json::from_str(body)
        .or_raise(|| ErrorKind::InvalidResponse("game list is not a list of games".to_string()))?;
    let games = match payload {
        GameListPayload::Games(games) => games,
        GameListPayload::Failure { error } => exn::bail!(ErrorKind::InvalidResponse(error)),
    };
    let hashes = games
        .into_iter()
        .flat_map(|game| {
            let GameListEntry { id, title, num_achievements, hashes } = game;
            hashes.into_iter().map(move |hash| CatalogHash {
                hash: hash.trim().to_ascii_lowercase(),
                game_id: id,
                title: title.clone(),
                achievements: num_achievements,
            })
        })
        .filter(|entry| !entry.hash.is_empty())
        .collect();
    Ok(hashes)
}

/// Interprets a game info body.
///
/// A payload carrying an `Error`, or lacking a title, means the game does
/// not exist.
pub fn parse_game_detail(game_id: u32, body: &str) -> Result<GameDetail> {
    let payload: GameInfoPayload = serde_json::from_str(body)
        .or_raise(|| ErrorKind::InvalidResponse(format!("game {game_id} info is not a JSON object")))?;
    if let Some(error) = payload.error {
        tracing::debug!(game_id, %error, "Catalog reported an error for game");
        exn::bail!(ErrorKind::NotFound(format!("game {game_id}")));
    }
    let Some(title) = payload.title.filter(|title| !title.is_empty()) else {
        exn::bail!(ErrorKind::NotFound(format!("game {game_id}")));
    };
    let achievements = payload
        .num_achievements
        .ok_or_raise(|| ErrorKind::InvalidResponse(format!("game {game_id} info has no achievement count")))?;
    Ok(GameDetail {
        id: payload.id.unwrap_or(game_id),
        title,
        achievements,
    })
}
