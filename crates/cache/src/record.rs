use serde::{Deserialize, Serialize};

/// What the catalog knows about one content hash.
///
/// Every field is optional because records are assembled from different
/// catalog calls: the bulk game list supplies the game id and title, the
/// per-game lookup supplies the achievement count. An `achievements` value of
/// `Some(0)` means "known, no achievements", which is different from `None`
/// ("not fetched yet").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashRecord {
    #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achievements: Option<u32>,
}

impl HashRecord {
    pub fn new(game_id: u32, title: impl Into<String>, achievements: impl Into<Option<u32>>) -> Self {
        Self {
            game_id: Some(game_id),
            title: Some(title.into()),
            achievements: achievements.into(),
        }
    }

    /// A record that only knows which game a hash belongs to.
    pub fn game(game_id: u32) -> Self {
        Self { game_id: Some(game_id), ..Self::default() }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_achievements(mut self, achievements: u32) -> Self {
        self.achievements = Some(achievements);
        self
    }

    /// Field-wise merge: a field present in `other` wins, a field absent from
    /// `other` keeps its current value.
    ///
    /// Returns `true` if anything changed.
    pub fn merge(&mut self, other: HashRecord) -> bool {
        let before = self.clone();
        if other.game_id.is_some() {
            self.game_id = other.game_id;
        }
        if other.title.is_some() {
            self.title = other.title;
        }
        if other.achievements.is_some() {
            self.achievements = other.achievements;
        }
        *self != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_merge_keeps_fields_missing_from_update() {
        let mut record = HashRecord::game(42).with_title("Game X");
        assert!(record.merge(HashRecord { achievements: Some(10), ..HashRecord::default() }));
        assert_eq!(record, HashRecord::new(42, "Game X", 10));
    }

    #[test]
    fn test_merge_new_value_wins() {
        let mut record = HashRecord::new(42, "Game X", 10);
        assert!(record.merge(HashRecord::new(42, "Game X (Rev 1)", 0)));
        assert_eq!(record.title.as_deref(), Some("Game X (Rev 1)"));
        assert_eq!(record.achievements, Some(0));
    }

    #[rstest]
    #[case(HashRecord::default())]
    #[case(HashRecord::game(42))]
    #[case(HashRecord::new(42, "Game X", 10))]
    fn test_merge_same_data_is_noop(#[case] update: HashRecord) {
        let mut record = HashRecord::new(42, "Game X", 10);
        assert!(!record.merge(update));
        assert_eq!(record, HashRecord::new(42, "Game X", 10));
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_string(&HashRecord::new(42, "Game X", 10)).unwrap();
        assert_eq!(json, r#"{"id":42,"title":"Game X","achievements":10}"#);
        let json = serde_json::to_string(&HashRecord::game(7)).unwrap();
        assert_eq!(json, r#"{"id":7}"#);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let record: HashRecord = serde_json::from_str(r#"{"id":1,"points":400,"achievements":3}"#).unwrap();
        assert_eq!(record, HashRecord { game_id: Some(1), title: None, achievements: Some(3) });
    }
}
