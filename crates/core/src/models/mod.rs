//! Shared domain models.

use std::{
    collections::HashSet,
    fmt,
    path::{Path, PathBuf},
};

use chrono::{serde::ts_seconds_option, DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Supported titles, plus an open variant for anything else a user registers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GameType {
    /// Grand Theft Auto III.
    Gta3,
    /// Grand Theft Auto: Vice City.
    GtaVc,
    /// Grand Theft Auto: San Andreas.
    GtaSa,
    /// Unrecognised type, stored verbatim.
    Other(String),
}

impl GameType {
    /// Every title with a built-in name and executable.
    pub const KNOWN: [GameType; 3] = [GameType::Gta3, GameType::GtaVc, GameType::GtaSa];

    /// Parse a type tag case-insensitively; unknown tags are kept as typed.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "GTA3" => Self::Gta3,
            "GTAVC" => Self::GtaVc,
            "GTASA" => Self::GtaSa,
            _ => Self::Other(trimmed.to_string()),
        }
    }

    /// Canonical tag written to the registry document.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Gta3 => "GTA3",
            Self::GtaVc => "GTAVC",
            Self::GtaSa => "GTASA",
            Self::Other(value) => value,
        }
    }

    /// Default display name, echoing the tag for unknown types.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Gta3 => "GTA III",
            Self::GtaVc => "GTA Vice City",
            Self::GtaSa => "GTA San Andreas",
            Self::Other(value) => value,
        }
    }

    /// Executable launched when no override is configured.
    pub fn default_executable(&self) -> Option<&'static str> {
        match self {
            Self::Gta3 => Some("gta3.exe"),
            Self::GtaVc => Some("gta-vc.exe"),
            Self::GtaSa => Some("gta-sa.exe"),
            Self::Other(_) => None,
        }
    }

    /// Whether the tag is blank.
    pub fn is_empty(&self) -> bool {
        self.as_str().trim().is_empty()
    }
}

impl From<String> for GameType {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<&str> for GameType {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<GameType> for String {
    fn from(value: GameType) -> Self {
        match value {
            GameType::Other(value) => value,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current time at the one-second precision the registry stores.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Soft-delete flag carried by every record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    /// Listed in the main library.
    #[default]
    Active,
    /// Moved to the recycle bin; can be restored.
    Deleted,
}

impl GameStatus {
    /// Parse `active`/`deleted`, ignoring case.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Deleted => f.write_str("deleted"),
        }
    }
}

/// One registered game installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    /// Stable identifier, unique across active and deleted records.
    /// Zero marks a legacy record that has not been assigned one yet.
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: u64,
    /// Title tag.
    #[serde(rename = "type")]
    pub game_type: GameType,
    /// Installation root.
    pub directory: PathBuf,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Creation time; never rewritten. Only legacy records lack it until
    /// they are normalised.
    #[serde(
        default,
        with = "ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub added_time: Option<DateTime<Utc>>,
    /// Soft-delete flag. Anything other than `deleted` reads as active.
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: GameStatus,
    /// Set exactly while `status` is [`GameStatus::Deleted`].
    #[serde(
        default,
        with = "ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub deleted_time: Option<DateTime<Utc>>,
    /// Executable launched instead of the type's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_executable: Option<String>,
    /// Fields written by other tools or older revisions.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GameRecord {
    /// Whether the record is in the recycle bin.
    pub fn is_deleted(&self) -> bool {
        self.status == GameStatus::Deleted
    }

    /// Move to `status`, keeping `deleted_time` in step with it.
    /// Setting the current status again leaves the timestamp alone.
    pub fn set_status(&mut self, status: GameStatus, now: DateTime<Utc>) {
        if self.status == status {
            return;
        }
        self.status = status;
        self.deleted_time = match status {
            GameStatus::Deleted => Some(now),
            GameStatus::Active => None,
        };
    }

    /// Name shown in lists, falling back to the type's display name.
    pub fn display_name(&self) -> &str {
        let trimmed = self.name.trim();
        if trimmed.is_empty() {
            self.game_type.display_name()
        } else {
            trimmed
        }
    }
}

/// Reference to a record as the front-end hands it over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameRef {
    /// Stable record id.
    Id(u64),
    /// Legacy position in the stored sequence.
    Index(usize),
}

impl fmt::Display for GameRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id {id}"),
            Self::Index(index) => write!(f, "index {index}"),
        }
    }
}

/// Root of the persisted game list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    /// Records in insertion order.
    #[serde(default)]
    pub games: Vec<GameRecord>,
    /// Highest id ever handed out, so hard deletes cannot free an id.
    #[serde(default, rename = "lastId", skip_serializing_if = "is_zero")]
    pub last_id: u64,
    /// Keys kept from older layouts (e.g. `name`/`author` beside `games`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RegistryDocument {
    /// Id the next added record receives.
    pub fn next_id(&self) -> u64 {
        let max_stored = self.games.iter().map(|game| game.id).max().unwrap_or(0);
        max_stored.max(self.last_id) + 1
    }

    /// Hand out the next id and advance the high-water mark.
    pub fn allocate_id(&mut self) -> u64 {
        let id = self.next_id();
        self.last_id = id;
        id
    }

    /// Position of the referenced record.
    pub fn position(&self, reference: GameRef) -> Option<usize> {
        match reference {
            GameRef::Id(id) => self.games.iter().position(|game| game.id == id),
            GameRef::Index(index) => (index < self.games.len()).then_some(index),
        }
    }

    /// Record with the given id.
    pub fn find(&self, id: u64) -> Option<&GameRecord> {
        self.games.iter().find(|game| game.id == id)
    }

    /// Active record other than `skip` that owns `directory`.
    pub fn active_owner(&self, directory: &Path, skip: Option<usize>) -> Option<&GameRecord> {
        self.games
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != skip)
            .map(|(_, game)| game)
            .find(|game| !game.is_deleted() && game.directory == directory)
    }

    /// Repair records written by older revisions. Returns whether anything changed.
    pub fn normalize(&mut self, now: DateTime<Utc>) -> bool {
        let mut changed = false;

        let mut seen = HashSet::new();
        for game in self.games.iter_mut() {
            if game.id != 0 && !seen.insert(game.id) {
                game.id = 0;
            }
        }

        let mut next = self.next_id();
        for game in self.games.iter_mut() {
            if game.id == 0 {
                game.id = next;
                next += 1;
                changed = true;
            }
            if game.name.trim().is_empty() {
                game.name = game.game_type.display_name().to_string();
                changed = true;
            }
            if game.added_time.is_none() {
                game.added_time = Some(now);
                changed = true;
            }
            match (game.status, game.deleted_time) {
                (GameStatus::Deleted, None) => {
                    game.deleted_time = Some(now);
                    changed = true;
                }
                (GameStatus::Active, Some(_)) => {
                    game.deleted_time = None;
                    changed = true;
                }
                _ => {}
            }
        }

        let max_stored = self.games.iter().map(|game| game.id).max().unwrap_or(0);
        if max_stored > self.last_id {
            self.last_id = max_stored;
            changed = true;
        }
        changed
    }
}

/// Whether any record in a raw document stores its status in a form other
/// than the canonical `active`/`deleted`, so loading it must rewrite the file.
pub fn has_irregular_status(raw: &Value) -> bool {
    raw.get("games")
        .and_then(Value::as_array)
        .is_some_and(|games| {
            games.iter().any(|game| {
                !matches!(
                    game.get("status").and_then(Value::as_str),
                    Some("active" | "deleted")
                )
            })
        })
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

/// Accept ids stored as numbers, numeric strings, or the legacy `"id3"` form.
/// Anything else becomes zero and is reassigned on load.
fn lenient_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce_stored_id).unwrap_or(0))
}

/// Only a case-insensitive `deleted` puts a record in the recycle bin;
/// `null`, unknown strings and other shapes read as active.
fn lenient_status<'de, D>(deserializer: D) -> Result<GameStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value.as_ref().and_then(Value::as_str) {
        Some(text) if text.trim().eq_ignore_ascii_case("deleted") => GameStatus::Deleted,
        _ => GameStatus::Active,
    })
}

fn coerce_stored_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => {
            let text = text.trim();
            let digits = text.strip_prefix("id").unwrap_or(text);
            digits.parse().ok()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn game_type_parses_case_insensitively() {
        assert_eq!(GameType::parse("gtasa"), GameType::GtaSa);
        assert_eq!(GameType::parse(" GTAVC "), GameType::GtaVc);
        assert_eq!(
            GameType::parse("Bully"),
            GameType::Other("Bully".to_string())
        );
        assert_eq!(GameType::GtaSa.display_name(), "GTA San Andreas");
        assert_eq!(GameType::parse("Bully").display_name(), "Bully");
        assert_eq!(GameType::Gta3.default_executable(), Some("gta3.exe"));
    }

    #[test]
    fn record_serializes_with_wire_names() {
        let added = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let record = GameRecord {
            id: 4,
            game_type: GameType::GtaVc,
            directory: PathBuf::from("/games/vc"),
            name: "Vice".to_string(),
            added_time: Some(added),
            status: GameStatus::Active,
            deleted_time: None,
            custom_executable: Some("vc-mp.exe".to_string()),
            extra: Map::new(),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 4,
                "type": "GTAVC",
                "directory": "/games/vc",
                "name": "Vice",
                "addedTime": 1_700_000_000,
                "status": "active",
                "customExecutable": "vc-mp.exe"
            })
        );
    }

    #[test]
    fn legacy_document_is_normalized() {
        let raw = json!({
            "name": "GTANext ModLoader",
            "games": [
                { "type": "GTA3", "directory": "/games/iii", "addedTime": 10 },
                { "id": "id7", "type": "gtasa", "directory": "/games/sa", "name": "SA", "addedTime": 11, "status": "deleted" },
                { "id": "2", "type": "Bully", "directory": "/games/bully", "addedTime": 12, "deletedTime": 13 }
            ]
        });
        let mut document: RegistryDocument = serde_json::from_value(raw).unwrap();
        let now = Utc.timestamp_opt(99, 0).unwrap();

        assert!(document.normalize(now));
        let ids: Vec<u64> = document.games.iter().map(|game| game.id).collect();
        assert_eq!(ids, vec![8, 7, 2]);
        assert_eq!(document.last_id, 8);
        assert_eq!(document.games[0].name, "GTA III");
        assert_eq!(document.games[0].status, GameStatus::Active);
        assert_eq!(document.games[1].game_type, GameType::GtaSa);
        assert_eq!(document.games[1].deleted_time, Some(now));
        assert_eq!(document.games[2].deleted_time, None);
        assert_eq!(document.extra.get("name"), Some(&json!("GTANext ModLoader")));

        assert!(!document.normalize(now));
    }

    #[test]
    fn duplicate_ids_are_reassigned() {
        let raw = json!({
            "games": [
                { "id": 1, "type": "GTA3", "directory": "/a", "name": "a", "addedTime": 1 },
                { "id": 1, "type": "GTA3", "directory": "/b", "name": "b", "addedTime": 1 }
            ]
        });
        let mut document: RegistryDocument = serde_json::from_value(raw).unwrap();
        document.normalize(Utc::now());
        assert_eq!(document.games[0].id, 1);
        assert_eq!(document.games[1].id, 2);
    }

    #[test]
    fn next_id_respects_high_water_mark() {
        let mut document = RegistryDocument::default();
        assert_eq!(document.allocate_id(), 1);
        assert_eq!(document.allocate_id(), 2);
        document.games.clear();
        assert_eq!(document.next_id(), 3);
    }

    #[test]
    fn irregular_status_reads_as_active() {
        let raw = json!({
            "games": [
                { "id": 1, "type": "GTA3", "directory": "/a", "name": "a", "addedTime": 1, "status": null },
                { "id": 2, "type": "GTA3", "directory": "/b", "name": "b", "addedTime": 1, "status": "archived" },
                { "id": 3, "type": "GTA3", "directory": "/c", "name": "c", "addedTime": 1, "status": "DELETED", "deletedTime": 5 },
                { "id": 4, "type": "GTA3", "directory": "/d", "name": "d", "addedTime": 1, "status": 7 }
            ]
        });
        assert!(has_irregular_status(&raw));

        let document: RegistryDocument = serde_json::from_value(raw).unwrap();
        let statuses: Vec<GameStatus> = document.games.iter().map(|game| game.status).collect();
        assert_eq!(
            statuses,
            vec![
                GameStatus::Active,
                GameStatus::Active,
                GameStatus::Deleted,
                GameStatus::Active
            ]
        );

        let rewritten = serde_json::to_value(&document).unwrap();
        assert!(!has_irregular_status(&rewritten));
    }

    #[test]
    fn missing_added_time_is_stamped_once() {
        let raw = json!({
            "lastId": 1,
            "games": [{ "id": 1, "type": "GTAVC", "directory": "/vc", "name": "VC" }]
        });
        let mut document: RegistryDocument = serde_json::from_value(raw).unwrap();
        assert_eq!(document.games[0].added_time, None);

        let stamped = Utc.timestamp_opt(500, 0).unwrap();
        assert!(document.normalize(stamped));
        assert_eq!(document.games[0].added_time, Some(stamped));

        let later = Utc.timestamp_opt(900, 0).unwrap();
        assert!(!document.normalize(later));
        assert_eq!(document.games[0].added_time, Some(stamped));
    }

    #[test]
    fn now_has_whole_second_precision() {
        let stamp = now();
        assert_eq!(stamp.timestamp_subsec_nanos(), 0);
        let round_trip = Utc.timestamp_opt(stamp.timestamp(), 0).unwrap();
        assert_eq!(round_trip, stamp);
    }

    #[test]
    fn set_status_tracks_deleted_time() {
        let mut record: GameRecord = serde_json::from_value(json!({
            "id": 1, "type": "GTA3", "directory": "/a", "name": "a", "addedTime": 1
        }))
        .unwrap();
        let first = Utc.timestamp_opt(100, 0).unwrap();
        let later = Utc.timestamp_opt(200, 0).unwrap();

        record.set_status(GameStatus::Deleted, first);
        assert_eq!(record.deleted_time, Some(first));
        record.set_status(GameStatus::Deleted, later);
        assert_eq!(record.deleted_time, Some(first));
        record.set_status(GameStatus::Active, later);
        assert_eq!(record.deleted_time, None);
    }
}
