//! Request payloads and the single identifier-normalisation step.

use std::path::PathBuf;

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

use crate::{
    error::{RegistryError, RegistryResult},
    launch::LaunchRequest,
    loaders::{InstallRequest, LoaderComponent},
    models::{GameRef, GameStatus, GameType},
    registry::{GameUpdate, NewGame},
};

/// How a bare number or string is read when no `id`/`index` key says otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// Bare values are record ids.
    Id,
    /// Bare values are positions (legacy delete path).
    Index,
}

/// Parse a non-negative integer from a JSON number or numeric string.
pub fn parse_number(value: &Value) -> RegistryResult<u64> {
    let parsed = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        RegistryError::validation(format!("identifier must be a non-negative integer, got {value}"))
    })
}

/// Normalise whatever the front-end sent into a [`GameRef`].
///
/// Objects are read by key (`id` wins over `index`), which also covers
/// whole records being passed back. Bare values follow `bare`.
pub fn parse_game_ref(value: &Value, bare: RefKind) -> RegistryResult<GameRef> {
    match value {
        Value::Object(map) => {
            if let Some(id) = map.get("id").filter(|value| !value.is_null()) {
                Ok(GameRef::Id(parse_number(id)?))
            } else if let Some(index) = map.get("index").filter(|value| !value.is_null()) {
                Ok(GameRef::Index(to_index(parse_number(index)?)?))
            } else {
                Err(RegistryError::validation("request is missing an id or index"))
            }
        }
        Value::Number(_) | Value::String(_) => {
            let number = parse_number(value)?;
            match bare {
                RefKind::Id => Ok(GameRef::Id(number)),
                RefKind::Index => Ok(GameRef::Index(to_index(number)?)),
            }
        }
        _ => Err(RegistryError::validation("request is missing an id or index")),
    }
}

/// Parse a reference that must resolve to an id.
pub fn parse_game_id(value: &Value) -> RegistryResult<u64> {
    match parse_game_ref(value, RefKind::Id)? {
        GameRef::Id(id) => Ok(id),
        GameRef::Index(_) => Err(RegistryError::validation("an id is required here")),
    }
}

fn to_index(number: u64) -> RegistryResult<usize> {
    usize::try_from(number).map_err(|_| RegistryError::validation("index out of range"))
}

/// Deserialize a request object, reporting shape errors as validation failures.
pub fn from_params<T: DeserializeOwned>(params: Value) -> RegistryResult<T> {
    serde_json::from_value(params)
        .map_err(|err| RegistryError::validation(format!("invalid request: {err}")))
}

/// `add_game` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddGameRequest {
    /// Title tag.
    #[serde(rename = "type", default)]
    pub game_type: String,
    /// Installation root.
    #[serde(default)]
    pub directory: String,
    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,
}

impl From<AddGameRequest> for NewGame {
    fn from(request: AddGameRequest) -> Self {
        Self {
            game_type: GameType::parse(&request.game_type),
            directory: PathBuf::from(request.directory.trim()),
            name: request.name,
        }
    }
}

/// `update_game` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGameRequest {
    /// Record id; preferred over `index`.
    #[serde(default)]
    pub id: Option<Value>,
    /// Legacy position.
    #[serde(default)]
    pub index: Option<Value>,
    /// Title tag.
    #[serde(rename = "type", default)]
    pub game_type: String,
    /// Installation root.
    #[serde(default)]
    pub directory: String,
    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,
    /// `None`/null keeps the override, `""` clears it.
    #[serde(default)]
    pub custom_executable: Option<String>,
    /// `active` or `deleted`.
    #[serde(default)]
    pub status: Option<String>,
}

impl UpdateGameRequest {
    /// Split into the record reference and the update to apply.
    pub fn into_parts(self) -> RegistryResult<(GameRef, GameUpdate)> {
        let reference = match (&self.id, &self.index) {
            (Some(id), _) if !id.is_null() => GameRef::Id(parse_number(id)?),
            (_, Some(index)) if !index.is_null() => GameRef::Index(to_index(parse_number(index)?)?),
            _ => return Err(RegistryError::validation("request is missing an id or index")),
        };
        let status = match self.status.as_deref() {
            None => None,
            Some(raw) => Some(GameStatus::parse(raw).ok_or_else(|| {
                RegistryError::validation(format!("unknown status: {raw}"))
            })?),
        };
        let update = GameUpdate {
            game_type: GameType::parse(&self.game_type),
            directory: PathBuf::from(self.directory.trim()),
            name: self.name,
            custom_executable: self.custom_executable,
            status,
        };
        Ok((reference, update))
    }
}

/// `launch_game` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchGameRequest {
    /// Title tag.
    #[serde(rename = "type", default)]
    pub game_type: String,
    /// Installation root.
    #[serde(default)]
    pub directory: String,
    /// One-off executable.
    #[serde(default)]
    pub exe: Option<String>,
    /// Executable configured on the record.
    #[serde(default)]
    pub custom_executable: Option<String>,
}

impl LaunchGameRequest {
    /// Validate and convert into a [`LaunchRequest`].
    pub fn into_launch(self) -> RegistryResult<LaunchRequest> {
        if self.directory.trim().is_empty() {
            return Err(RegistryError::validation("game directory must not be empty"));
        }
        Ok(LaunchRequest {
            game_type: GameType::parse(&self.game_type),
            directory: PathBuf::from(self.directory.trim()),
            exe: self.exe,
            custom_executable: self.custom_executable,
        })
    }
}

/// `install_mod_prerequisites` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallPrerequisitesRequest {
    /// Game root.
    #[serde(default, alias = "gameDir", alias = "game_dir")]
    pub directory: String,
    /// Title tag, selecting the CLEO build.
    #[serde(rename = "type", alias = "gameType", alias = "game_type", default)]
    pub game_type: String,
    /// Loader names; omitted or empty installs `dinput8` and `cleo`.
    #[serde(default)]
    pub components: Option<Vec<String>>,
}

impl InstallPrerequisitesRequest {
    /// Validate and convert into an [`InstallRequest`].
    pub fn into_install(self) -> RegistryResult<InstallRequest> {
        if self.directory.trim().is_empty() {
            return Err(RegistryError::validation("game directory must not be empty"));
        }
        let components = self
            .components
            .unwrap_or_default()
            .iter()
            .map(|name| {
                LoaderComponent::parse(name).ok_or_else(|| {
                    RegistryError::validation(format!("unknown loader component: {name}"))
                })
            })
            .collect::<RegistryResult<Vec<_>>>()?;
        Ok(InstallRequest {
            game_dir: PathBuf::from(self.directory.trim()),
            game_type: GameType::parse(&self.game_type),
            components,
        })
    }
}

/// `check_duplicate_directory` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateDirectoryRequest {
    /// Directory about to be registered.
    #[serde(default, alias = "dir")]
    pub directory: String,
    /// Record being edited, which may keep its own directory.
    #[serde(default, alias = "exclude_id", alias = "excludeGameId")]
    pub exclude_id: Option<Value>,
}

impl DuplicateDirectoryRequest {
    /// Directory to look up and the id to skip.
    pub fn into_parts(self) -> RegistryResult<(PathBuf, Option<u64>)> {
        let directory = parse_directory(&Value::String(self.directory))?;
        let exclude = match self.exclude_id {
            Some(value) if !value.is_null() => Some(parse_number(&value)?),
            _ => None,
        };
        Ok((directory, exclude))
    }
}

/// Read a directory from `{directory}` or a bare string.
pub fn parse_directory(value: &Value) -> RegistryResult<PathBuf> {
    let raw = match value {
        Value::String(text) => Some(text.as_str()),
        Value::Object(map) => map.get("directory").and_then(Value::as_str),
        _ => None,
    };
    raw.map(str::trim)
        .filter(|text| !text.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| RegistryError::validation("a directory is required"))
}
