//! Game registry persistence and lifecycle.
//!
//! Every mutating call loads the whole document, changes it in memory and
//! writes it back. There is no locking; the front-end issues one call at a
//! time.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::{
    config::AppConfig,
    error::{RegistryError, RegistryResult},
    models::{self, GameRecord, GameRef, GameStatus, GameType, RegistryDocument},
};

/// Input for [`GameRegistry::add`].
#[derive(Debug, Clone)]
pub struct NewGame {
    /// Title tag.
    pub game_type: GameType,
    /// Installation root; must exist.
    pub directory: PathBuf,
    /// Display name; defaults from the type when blank.
    pub name: Option<String>,
}

/// Input for [`GameRegistry::update`].
///
/// `custom_executable` distinguishes three cases: `None` keeps the current
/// value, `Some("")` clears it, anything else replaces it.
#[derive(Debug, Clone)]
pub struct GameUpdate {
    /// Title tag.
    pub game_type: GameType,
    /// Installation root.
    pub directory: PathBuf,
    /// Display name; defaults from the type when blank.
    pub name: Option<String>,
    /// Launch override.
    pub custom_executable: Option<String>,
    /// Requested status; `None` leaves it untouched.
    pub status: Option<GameStatus>,
}

impl GameUpdate {
    /// Update that rewrites a record with its own values.
    pub fn from_record(record: &GameRecord) -> Self {
        Self {
            game_type: record.game_type.clone(),
            directory: record.directory.clone(),
            name: Some(record.name.clone()),
            custom_executable: None,
            status: None,
        }
    }

    /// Same update with a status change.
    pub fn with_status(mut self, status: GameStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Owner of the registry document on disk.
#[derive(Debug, Clone)]
pub struct GameRegistry {
    path: PathBuf,
}

impl GameRegistry {
    /// Registry backed by the document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Registry at the configured location.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.registry_path())
    }

    /// Location of the registry document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty document if none exists yet.
    pub fn ensure_exists(&self) -> RegistryResult<()> {
        if self.path.exists() {
            return Ok(());
        }
        info!(path = %self.path.display(), "creating empty game registry");
        self.write_document(&RegistryDocument::default())
    }

    /// Load the document, repairing and rewriting legacy records if needed.
    pub fn load(&self) -> RegistryResult<RegistryDocument> {
        let (mut document, irregular) = self.read_document()?;
        if document.normalize(models::now()) || irregular {
            info!(path = %self.path.display(), "normalized legacy registry records");
            self.write_document(&document)?;
        }
        Ok(document)
    }

    /// Register a new installation and return the stored record.
    pub fn add(&self, new_game: NewGame) -> RegistryResult<GameRecord> {
        if new_game.game_type.is_empty() || is_blank(&new_game.directory) {
            return Err(RegistryError::validation(
                "game type and directory must not be empty",
            ));
        }
        if !new_game.directory.exists() {
            return Err(RegistryError::validation(format!(
                "game directory {} does not exist",
                new_game.directory.display()
            )));
        }
        if !new_game.directory.is_dir() {
            return Err(RegistryError::validation(format!(
                "{} is not a directory",
                new_game.directory.display()
            )));
        }

        let mut document = self.load()?;
        if let Some(existing) = document.active_owner(&new_game.directory, None) {
            return Err(RegistryError::Conflict {
                directory: new_game.directory.clone(),
                existing_id: existing.id,
            });
        }

        let name = resolve_name(new_game.name.as_deref(), &new_game.game_type);
        let record = GameRecord {
            id: document.allocate_id(),
            game_type: new_game.game_type,
            directory: new_game.directory,
            name,
            added_time: Some(models::now()),
            status: GameStatus::Active,
            deleted_time: None,
            custom_executable: None,
            extra: Map::new(),
        };
        document.games.push(record.clone());
        self.write_document(&document)?;

        info!(id = record.id, name = %record.name, directory = %record.directory.display(), "game added");
        Ok(record)
    }

    /// Apply a partial update; `id` and `added_time` are never changed.
    pub fn update(&self, reference: GameRef, update: GameUpdate) -> RegistryResult<GameRecord> {
        if update.game_type.is_empty() || is_blank(&update.directory) {
            return Err(RegistryError::validation(
                "game type and directory must not be empty",
            ));
        }

        let mut document = self.load()?;
        let index = document
            .position(reference)
            .ok_or_else(|| RegistryError::not_found(format!("no game with {reference}")))?;

        let current_status = document.games[index].status;
        let resulting_status = update.status.unwrap_or(current_status);
        if resulting_status == GameStatus::Active {
            if let Some(existing) = document.active_owner(&update.directory, Some(index)) {
                return Err(RegistryError::Conflict {
                    directory: update.directory.clone(),
                    existing_id: existing.id,
                });
            }
        }

        let record = &mut document.games[index];
        record.name = resolve_name(update.name.as_deref(), &update.game_type);
        record.game_type = update.game_type;
        record.directory = update.directory;
        if let Some(status) = update.status {
            record.set_status(status, models::now());
        }
        match update.custom_executable {
            Some(executable) if executable.trim().is_empty() => record.custom_executable = None,
            Some(executable) => record.custom_executable = Some(executable.trim().to_string()),
            None => {}
        }

        let updated = record.clone();
        self.write_document(&document)?;

        debug!(id = updated.id, status = %updated.status, "game updated");
        Ok(updated)
    }

    /// Move a record to the recycle bin.
    pub fn soft_delete(&self, id: u64) -> RegistryResult<GameRecord> {
        self.change_status(id, GameStatus::Deleted)
    }

    /// Bring a record back from the recycle bin.
    pub fn restore(&self, id: u64) -> RegistryResult<GameRecord> {
        self.change_status(id, GameStatus::Active)
    }

    /// Remove a record permanently. Its id stays retired.
    pub fn delete(&self, reference: GameRef) -> RegistryResult<GameRecord> {
        let mut document = self.load()?;
        let index = document
            .position(reference)
            .ok_or_else(|| RegistryError::not_found(format!("no game with {reference}")))?;
        let removed = document.games.remove(index);
        self.write_document(&document)?;

        info!(id = removed.id, name = %removed.name, "game removed permanently");
        Ok(removed)
    }

    /// Records that are not in the recycle bin, in stored order.
    pub fn list_active(&self) -> RegistryResult<Vec<GameRecord>> {
        self.filtered(|game| !game.is_deleted())
    }

    /// Records in the recycle bin, in stored order.
    pub fn list_deleted(&self) -> RegistryResult<Vec<GameRecord>> {
        self.filtered(GameRecord::is_deleted)
    }

    /// Every stored record.
    pub fn list_all(&self) -> RegistryResult<Vec<GameRecord>> {
        Ok(self.load()?.games)
    }

    /// Record with the given id, if any.
    pub fn get_by_id(&self, id: u64) -> RegistryResult<Option<GameRecord>> {
        Ok(self.load()?.find(id).cloned())
    }

    /// Active record other than `exclude` that already uses `directory`.
    pub fn find_duplicate_directory(
        &self,
        directory: &Path,
        exclude: Option<u64>,
    ) -> RegistryResult<Option<GameRecord>> {
        let document = self.load()?;
        let skip = exclude.and_then(|id| document.position(GameRef::Id(id)));
        Ok(document.active_owner(directory, skip).cloned())
    }

    fn change_status(&self, id: u64, status: GameStatus) -> RegistryResult<GameRecord> {
        let record = self
            .get_by_id(id)?
            .ok_or_else(|| RegistryError::not_found(format!("no game with id {id}")))?;
        self.update(
            GameRef::Id(id),
            GameUpdate::from_record(&record).with_status(status),
        )
    }

    fn filtered(&self, keep: impl Fn(&GameRecord) -> bool) -> RegistryResult<Vec<GameRecord>> {
        let document = self.load()?;
        Ok(document.games.into_iter().filter(|game| keep(game)).collect())
    }

    /// Parsed document plus whether any stored status needs rewriting.
    fn read_document(&self) -> RegistryResult<(RegistryDocument, bool)> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok((RegistryDocument::default(), false))
            }
            Err(err) => return Err(RegistryError::io("read", &self.path, err)),
        };
        if content.trim().is_empty() {
            return Ok((RegistryDocument::default(), false));
        }
        let parse_error = |source| RegistryError::Parse {
            path: self.path.clone(),
            source,
        };
        let raw: Value = serde_json::from_str(&content).map_err(parse_error)?;
        let irregular = models::has_irregular_status(&raw);
        let document = serde_json::from_value(raw).map_err(parse_error)?;
        Ok((document, irregular))
    }

    fn write_document(&self, document: &RegistryDocument) -> RegistryResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| RegistryError::io("create directory", parent, err))?;
        }
        let serialized =
            serde_json::to_vec_pretty(document).map_err(|source| RegistryError::Parse {
                path: self.path.clone(),
                source,
            })?;
        fs::write(&self.path, serialized).map_err(|err| RegistryError::io("write", &self.path, err))
    }
}

fn resolve_name(name: Option<&str>, game_type: &GameType) -> String {
    name.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| game_type.display_name().to_string())
}

fn is_blank(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::collections::HashSet;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        root: TempDir,
        registry: GameRegistry,
    }

    impl Fixture {
        fn new() -> Result<Self> {
            let root = tempdir()?;
            let registry = GameRegistry::new(root.path().join("data").join("games.json"));
            Ok(Self { root, registry })
        }

        fn game_dir(&self, name: &str) -> Result<PathBuf> {
            let dir = self.root.path().join("games").join(name);
            fs::create_dir_all(&dir)?;
            Ok(dir)
        }

        fn add(&self, game_type: &str, dir: &Path) -> RegistryResult<GameRecord> {
            self.registry.add(NewGame {
                game_type: GameType::parse(game_type),
                directory: dir.to_path_buf(),
                name: None,
            })
        }
    }

    #[test]
    fn add_soft_delete_restore_scenario() -> Result<()> {
        let fx = Fixture::new()?;
        let sa = fx.game_dir("sa")?;

        let record = fx.add("GTASA", &sa)?;
        assert_eq!(record.id, 1);
        assert_eq!(record.name, "GTA San Andreas");
        assert_eq!(record.status, GameStatus::Active);

        let err = fx.add("GTASA", &sa).unwrap_err();
        assert!(matches!(err, RegistryError::Conflict { existing_id: 1, .. }));
        assert!(err.to_string().contains("already registered"));

        fx.registry.soft_delete(1)?;
        assert!(fx.registry.list_active()?.is_empty());
        let deleted = fx.registry.list_deleted()?;
        assert_eq!(deleted.len(), 1);
        assert!(deleted[0].deleted_time.is_some());

        fx.registry.restore(1)?;
        let active = fx.registry.list_active()?;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].deleted_time, None);
        Ok(())
    }

    #[test]
    fn ids_increase_and_are_never_reused() -> Result<()> {
        let fx = Fixture::new()?;
        let first = fx.add("GTA3", &fx.game_dir("iii")?)?;
        let second = fx.add("GTAVC", &fx.game_dir("vc")?)?;
        assert!(second.id > first.id);

        fx.registry.soft_delete(second.id)?;
        let third = fx.add("GTASA", &fx.game_dir("sa")?)?;
        assert!(third.id > second.id);

        fx.registry.delete(GameRef::Id(third.id))?;
        let fourth = fx.add("GTASA", &fx.game_dir("sa2")?)?;
        assert!(fourth.id > third.id);

        let all = fx.registry.list_all()?;
        let unique: HashSet<u64> = all.iter().map(|game| game.id).collect();
        assert_eq!(unique.len(), all.len());
        Ok(())
    }

    #[test]
    fn directory_can_be_reused_after_soft_delete() -> Result<()> {
        let fx = Fixture::new()?;
        let dir = fx.game_dir("vc")?;
        let original = fx.add("GTAVC", &dir)?;
        fx.registry.soft_delete(original.id)?;

        let replacement = fx.add("GTAVC", &dir)?;
        assert_ne!(replacement.id, original.id);

        let err = fx.registry.restore(original.id).unwrap_err();
        assert!(matches!(err, RegistryError::Conflict { .. }));
        Ok(())
    }

    #[test]
    fn active_and_deleted_partition_all_records() -> Result<()> {
        let fx = Fixture::new()?;
        for name in ["a", "b", "c", "d"] {
            fx.add("GTA3", &fx.game_dir(name)?)?;
        }
        fx.registry.soft_delete(2)?;
        fx.registry.soft_delete(4)?;

        let active: HashSet<u64> = fx.registry.list_active()?.iter().map(|g| g.id).collect();
        let deleted: HashSet<u64> = fx.registry.list_deleted()?.iter().map(|g| g.id).collect();
        let all: HashSet<u64> = fx.registry.list_all()?.iter().map(|g| g.id).collect();

        assert!(active.is_disjoint(&deleted));
        assert_eq!(active.union(&deleted).copied().collect::<HashSet<_>>(), all);
        assert_eq!(
            fx.registry
                .list_active()?
                .iter()
                .map(|g| g.id)
                .collect::<Vec<_>>(),
            vec![1, 3]
        );
        Ok(())
    }

    #[test]
    fn soft_delete_then_restore_keeps_other_fields() -> Result<()> {
        let fx = Fixture::new()?;
        let dir = fx.game_dir("sa")?;
        let added = fx.registry.add(NewGame {
            game_type: GameType::GtaSa,
            directory: dir.clone(),
            name: Some("My SA".to_string()),
        })?;
        fx.registry.update(
            GameRef::Id(added.id),
            GameUpdate {
                custom_executable: Some("gta_sa.exe".to_string()),
                ..GameUpdate::from_record(&added)
            },
        )?;

        fx.registry.soft_delete(added.id)?;
        let restored = fx.registry.restore(added.id)?;

        assert_eq!(restored.status, GameStatus::Active);
        assert_eq!(restored.deleted_time, None);
        assert_eq!(restored.added_time, added.added_time);
        assert_eq!(restored.name, "My SA");
        assert_eq!(restored.directory, dir);
        assert_eq!(restored.custom_executable.as_deref(), Some("gta_sa.exe"));
        Ok(())
    }

    #[test]
    fn update_is_partial() -> Result<()> {
        let fx = Fixture::new()?;
        let dir = fx.game_dir("iii")?;
        let added = fx.add("GTA3", &dir)?;

        let with_exe = fx.registry.update(
            GameRef::Id(added.id),
            GameUpdate {
                game_type: GameType::Gta3,
                directory: dir.clone(),
                name: Some("Liberty".to_string()),
                custom_executable: Some("gta3-mod.exe".to_string()),
                status: None,
            },
        )?;
        assert_eq!(with_exe.added_time, added.added_time);
        assert_eq!(with_exe.id, added.id);
        assert_eq!(with_exe.name, "Liberty");

        let untouched = fx.registry.update(
            GameRef::Index(0),
            GameUpdate {
                game_type: GameType::Gta3,
                directory: dir.clone(),
                name: None,
                custom_executable: None,
                status: None,
            },
        )?;
        assert_eq!(untouched.custom_executable.as_deref(), Some("gta3-mod.exe"));
        assert_eq!(untouched.name, "GTA III");
        assert_eq!(untouched.status, GameStatus::Active);
        assert_eq!(untouched.added_time, added.added_time);

        let cleared = fx.registry.update(
            GameRef::Id(added.id),
            GameUpdate {
                custom_executable: Some(String::new()),
                ..GameUpdate::from_record(&untouched)
            },
        )?;
        assert_eq!(cleared.custom_executable, None);
        Ok(())
    }

    #[test]
    fn update_status_sets_and_clears_deleted_time() -> Result<()> {
        let fx = Fixture::new()?;
        let added = fx.add("GTA3", &fx.game_dir("iii")?)?;

        let deleted = fx.registry.update(
            GameRef::Id(added.id),
            GameUpdate::from_record(&added).with_status(GameStatus::Deleted),
        )?;
        assert!(deleted.deleted_time.is_some());

        let renamed = fx.registry.update(
            GameRef::Id(added.id),
            GameUpdate {
                name: Some("Renamed".to_string()),
                ..GameUpdate::from_record(&deleted)
            },
        )?;
        assert_eq!(renamed.status, GameStatus::Deleted);
        assert_eq!(renamed.deleted_time, deleted.deleted_time);
        Ok(())
    }

    #[test]
    fn update_rejects_directory_held_by_another_active_game() -> Result<()> {
        let fx = Fixture::new()?;
        let iii = fx.game_dir("iii")?;
        let vc = fx.game_dir("vc")?;
        fx.add("GTA3", &iii)?;
        let second = fx.add("GTAVC", &vc)?;

        let err = fx
            .registry
            .update(
                GameRef::Id(second.id),
                GameUpdate {
                    directory: iii,
                    ..GameUpdate::from_record(&second)
                },
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::Conflict { existing_id: 1, .. }));
        Ok(())
    }

    #[test]
    fn unknown_references_are_not_found() -> Result<()> {
        let fx = Fixture::new()?;
        fx.add("GTA3", &fx.game_dir("iii")?)?;

        assert!(matches!(
            fx.registry.soft_delete(42),
            Err(RegistryError::NotFound(_))
        ));
        assert!(matches!(
            fx.registry.delete(GameRef::Index(5)),
            Err(RegistryError::NotFound(_))
        ));
        assert!(fx.registry.get_by_id(42)?.is_none());
        Ok(())
    }

    #[test]
    fn add_validates_input() -> Result<()> {
        let fx = Fixture::new()?;
        let missing = fx.root.path().join("nowhere");

        assert!(matches!(
            fx.add("", &fx.game_dir("x")?),
            Err(RegistryError::Validation(_))
        ));
        assert!(matches!(
            fx.add("GTA3", Path::new("")),
            Err(RegistryError::Validation(_))
        ));
        assert!(matches!(
            fx.add("GTA3", &missing),
            Err(RegistryError::Validation(_))
        ));
        Ok(())
    }

    #[test]
    fn unknown_type_echoes_as_name() -> Result<()> {
        let fx = Fixture::new()?;
        let record = fx.add("Bully", &fx.game_dir("bully")?)?;
        assert_eq!(record.name, "Bully");
        assert_eq!(record.game_type, GameType::Other("Bully".to_string()));
        Ok(())
    }

    #[test]
    fn missing_document_reads_as_empty() -> Result<()> {
        let fx = Fixture::new()?;
        assert!(fx.registry.list_all()?.is_empty());
        assert!(!fx.registry.path().exists());

        fx.registry.ensure_exists()?;
        let content = fs::read_to_string(fx.registry.path())?;
        assert!(content.contains("\"games\": []"));
        Ok(())
    }

    #[test]
    fn legacy_document_is_rewritten_with_ids() -> Result<()> {
        let fx = Fixture::new()?;
        fs::create_dir_all(fx.registry.path().parent().unwrap())?;
        fs::write(
            fx.registry.path(),
            r#"{"games": [{"type": "GTA3", "directory": "/games/iii", "name": "GTA III", "addedTime": 1700000000}]}"#,
        )?;

        let games = fx.registry.list_active()?;
        assert_eq!(games[0].id, 1);
        let content = fs::read_to_string(fx.registry.path())?;
        assert!(content.contains("\"id\": 1"));
        assert!(content.contains("\"status\": \"active\""));
        Ok(())
    }

    #[test]
    fn stray_status_values_do_not_block_the_registry() -> Result<()> {
        let fx = Fixture::new()?;
        fs::create_dir_all(fx.registry.path().parent().unwrap())?;
        fs::write(
            fx.registry.path(),
            r#"{"lastId": 2, "games": [
                {"id": 1, "type": "GTA3", "directory": "/games/iii", "name": "III", "addedTime": 1700000000, "status": null},
                {"id": 2, "type": "GTAVC", "directory": "/games/vc", "name": "VC", "addedTime": 1700000000, "status": "archived"}
            ]}"#,
        )?;

        let active = fx.registry.list_active()?;
        assert_eq!(active.len(), 2);
        assert!(fx.registry.list_deleted()?.is_empty());
        let content = fs::read_to_string(fx.registry.path())?;
        assert!(!content.contains("archived"));
        assert_eq!(content.matches("\"status\": \"active\"").count(), 2);

        let added = fx.add("GTASA", &fx.game_dir("sa")?)?;
        assert_eq!(added.id, 3);
        Ok(())
    }

    #[test]
    fn returned_records_match_what_is_stored() -> Result<()> {
        let fx = Fixture::new()?;
        let added = fx.add("GTASA", &fx.game_dir("sa")?)?;
        assert_eq!(fx.registry.get_by_id(added.id)?, Some(added.clone()));

        let deleted = fx.registry.soft_delete(added.id)?;
        assert_eq!(fx.registry.get_by_id(added.id)?, Some(deleted));
        Ok(())
    }

    #[test]
    fn missing_added_time_is_persisted_on_first_load() -> Result<()> {
        let fx = Fixture::new()?;
        fs::create_dir_all(fx.registry.path().parent().unwrap())?;
        fs::write(
            fx.registry.path(),
            r#"{"lastId": 1, "games": [{"id": 1, "type": "GTA3", "directory": "/games/iii", "name": "III", "status": "active"}]}"#,
        )?;

        let first = fx.registry.list_all()?;
        let stamped = first[0].added_time;
        assert!(stamped.is_some());
        assert!(fs::read_to_string(fx.registry.path())?.contains("addedTime"));
        assert_eq!(fx.registry.list_all()?[0].added_time, stamped);
        Ok(())
    }

    #[test]
    fn duplicate_directory_lookup_skips_excluded_and_deleted() -> Result<()> {
        let fx = Fixture::new()?;
        let vc = fx.game_dir("vc")?;
        let first = fx.add("GTAVC", &vc)?;

        let owner = fx.registry.find_duplicate_directory(&vc, None)?;
        assert_eq!(owner.map(|game| game.id), Some(first.id));
        assert!(fx.registry.find_duplicate_directory(&vc, Some(first.id))?.is_none());

        fx.registry.soft_delete(first.id)?;
        assert!(fx.registry.find_duplicate_directory(&vc, None)?.is_none());
        Ok(())
    }

    #[test]
    fn malformed_document_surfaces_parse_error() -> Result<()> {
        let fx = Fixture::new()?;
        fs::create_dir_all(fx.registry.path().parent().unwrap())?;
        fs::write(fx.registry.path(), "[1, 2")?;

        let err = fx.registry.list_active().unwrap_err();
        assert_eq!(err.kind(), "parse");
        Ok(())
    }
}
