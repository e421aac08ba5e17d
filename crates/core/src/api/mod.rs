//! Call surface used by front-ends.
//!
//! [`Backend`] exposes typed methods for in-process callers (the terminal
//! UI) and [`Backend::call`] for JSON callers. Errors never escape either
//! path: mutating calls answer with an [`ApiResponse`], queries with an
//! empty or `null` value, and the dispatcher wraps anything left over into
//! `{success: false, message}`.

mod picker;
mod request;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

pub use picker::{FilePicker, HeadlessPicker};
pub use request::{
    from_params, parse_directory, parse_game_id, parse_game_ref, parse_number, AddGameRequest,
    DuplicateDirectoryRequest, InstallPrerequisitesRequest, LaunchGameRequest, RefKind,
    UpdateGameRequest,
};

use crate::{
    config::AppConfig,
    detection::{detect_game, DetectedGame},
    environment::{check_environment, EnvironmentReport},
    error::{RegistryError, RegistryResult},
    launch::{self, DetachedLauncher, LaunchRequest, Launcher},
    loaders::{self, InstallResult, LoaderStatus},
    metadata::AppMetadata,
    models::{GameRecord, GameRef},
    prerequisites::{detect_prerequisite_mods, PrerequisiteReport},
    registry::GameRegistry,
};

/// Method names understood by [`Backend::call`].
pub const METHODS: [&str; 20] = [
    "add_game",
    "update_game",
    "delete_game",
    "soft_delete_game",
    "restore_game",
    "get_games",
    "get_deleted_games",
    "get_all_games",
    "get_game_info",
    "launch_game",
    "select_directory",
    "select_game_executable",
    "detect_prerequisite_mods",
    "detect_game",
    "check_environment",
    "get_app_info",
    "check_mod_loaders",
    "install_mod_prerequisites",
    "open_game_folder",
    "check_duplicate_directory",
];

/// Outcome of a mutating call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Whether the call took effect.
    pub success: bool,
    /// Message suitable for a status line.
    pub message: String,
    /// Id of a newly created record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl ApiResponse {
    /// Successful response.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            id: None,
        }
    }

    /// Failed response.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            id: None,
        }
    }

    /// Attach the id of a created record.
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }
}

impl From<RegistryError> for ApiResponse {
    fn from(err: RegistryError) -> Self {
        Self::failure(err.to_string())
    }
}

/// Registry, launcher and picker behind one front-end facing object.
#[derive(Debug)]
pub struct Backend<L = DetachedLauncher, P = HeadlessPicker> {
    registry: GameRegistry,
    metadata_path: PathBuf,
    module_dir: Option<PathBuf>,
    launcher: L,
    picker: P,
}

impl Backend {
    /// Backend using the configured documents, real process launch and the
    /// headless picker.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::with_parts(
            GameRegistry::from_config(config),
            config.metadata_path(),
            DetachedLauncher,
            HeadlessPicker,
        )
        .with_module_dir(config.module_path())
    }
}

impl<L: Launcher, P: FilePicker> Backend<L, P> {
    /// Assemble a backend from explicit parts.
    pub fn with_parts(
        registry: GameRegistry,
        metadata_path: impl Into<PathBuf>,
        launcher: L,
        picker: P,
    ) -> Self {
        Self {
            registry,
            metadata_path: metadata_path.into(),
            module_dir: None,
            launcher,
            picker,
        }
    }

    /// Directory holding the bundled loader packages.
    pub fn with_module_dir(mut self, module_dir: impl Into<PathBuf>) -> Self {
        self.module_dir = Some(module_dir.into());
        self
    }

    /// Create both documents with defaults when they are missing.
    pub fn initialize(&self) -> RegistryResult<AppMetadata> {
        self.registry.ensure_exists()?;
        AppMetadata::ensure(&self.metadata_path)
    }

    /// Underlying registry.
    pub fn registry(&self) -> &GameRegistry {
        &self.registry
    }

    /// Register a game.
    pub fn add_game(&self, request: AddGameRequest) -> ApiResponse {
        match self.registry.add(request.into()) {
            Ok(record) => {
                ApiResponse::ok(format!("Added {}", record.name)).with_id(record.id)
            }
            Err(err) => failed("add_game", err),
        }
    }

    /// Edit a game by id or legacy index.
    pub fn update_game(&self, request: UpdateGameRequest) -> ApiResponse {
        let result = request
            .into_parts()
            .and_then(|(reference, update)| self.registry.update(reference, update));
        match result {
            Ok(record) => ApiResponse::ok(format!("Updated {}", record.name)),
            Err(err) => failed("update_game", err),
        }
    }

    /// Remove a game permanently.
    pub fn delete_game(&self, reference: GameRef) -> ApiResponse {
        match self.registry.delete(reference) {
            Ok(record) => ApiResponse::ok(format!("Deleted {} permanently", record.name)),
            Err(err) => failed("delete_game", err),
        }
    }

    /// Move a game to the recycle bin.
    pub fn soft_delete_game(&self, id: u64) -> ApiResponse {
        match self.registry.soft_delete(id) {
            Ok(record) => ApiResponse::ok(format!("Moved {} to the recycle bin", record.name)),
            Err(err) => failed("soft_delete_game", err),
        }
    }

    /// Bring a game back from the recycle bin.
    pub fn restore_game(&self, id: u64) -> ApiResponse {
        match self.registry.restore(id) {
            Ok(record) => ApiResponse::ok(format!("Restored {}", record.name)),
            Err(err) => failed("restore_game", err),
        }
    }

    /// Start a game from an explicit request.
    pub fn launch_game(&self, request: LaunchGameRequest) -> ApiResponse {
        match request.into_launch() {
            Ok(request) => self.run_launch(&request),
            Err(err) => failed("launch_game", err),
        }
    }

    /// Start a stored game with its own settings.
    pub fn launch_record(&self, record: &GameRecord) -> ApiResponse {
        self.run_launch(&LaunchRequest::from(record))
    }

    fn run_launch(&self, request: &LaunchRequest) -> ApiResponse {
        match launch::launch(&self.launcher, request) {
            Ok(executable) => {
                let file = executable
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| executable.display().to_string());
                ApiResponse::ok(format!("Launched {file}"))
            }
            Err(err) => failed("launch_game", err),
        }
    }

    /// Ask the picker for a folder; empty when nothing was chosen.
    pub fn select_directory(&self) -> String {
        self.picker
            .pick_directory()
            .map(|path| path.display().to_string())
            .unwrap_or_default()
    }

    /// Ask the picker for an executable inside `directory`.
    pub fn select_game_executable(&self, directory: &Path) -> Option<String> {
        self.picker
            .pick_executable(directory)
            .map(|path| path.display().to_string())
    }

    /// Scan `directory` for the loader mods.
    pub fn detect_prerequisite_mods(&self, directory: &Path) -> PrerequisiteReport {
        detect_prerequisite_mods(directory)
    }

    /// Identify the title installed in `directory`.
    pub fn detect_game(&self, directory: &Path) -> Option<DetectedGame> {
        detect_game(directory)
    }

    /// Run the startup runtime probes.
    pub fn check_environment(&self) -> EnvironmentReport {
        check_environment()
    }

    /// Report the loaders installed in `directory`.
    pub fn check_mod_loaders(&self, directory: &Path) -> RegistryResult<LoaderStatus> {
        loaders::check_mod_loaders(directory)
    }

    /// Copy loader packages into a game folder.
    pub fn install_mod_prerequisites(
        &self,
        request: InstallPrerequisitesRequest,
    ) -> RegistryResult<InstallResult> {
        let module_dir = self
            .module_dir
            .as_deref()
            .ok_or_else(|| RegistryError::validation("no module directory is configured"))?;
        loaders::install_prerequisites(module_dir, &request.into_install()?)
    }

    /// Show a game folder in the file manager.
    pub fn open_game_folder(&self, directory: &Path) -> ApiResponse {
        match launch::open_game_folder(&self.launcher, directory) {
            Ok(()) => ApiResponse::ok(format!("Opened {}", directory.display())),
            Err(err) => failed("open_game_folder", err),
        }
    }

    /// Succeeds when no other active game uses the directory.
    pub fn check_duplicate_directory(&self, request: DuplicateDirectoryRequest) -> ApiResponse {
        let result = request.into_parts().and_then(|(directory, exclude)| {
            self.registry.find_duplicate_directory(&directory, exclude)
        });
        match result {
            Ok(None) => ApiResponse::ok("Directory is not registered yet"),
            Ok(Some(owner)) => ApiResponse::failure(format!(
                "Directory is already used by \"{}\"",
                owner.name
            ))
            .with_id(owner.id),
            Err(err) => failed("check_duplicate_directory", err),
        }
    }

    /// Name and author from the metadata document.
    pub fn app_info(&self) -> RegistryResult<AppMetadata> {
        AppMetadata::load(&self.metadata_path)
    }

    /// Dispatch a JSON call by method name.
    ///
    /// `params` may be the argument itself, a one-element array holding it,
    /// or `null` for methods without arguments.
    pub fn call(&self, method: &str, params: Value) -> Value {
        debug!(method, "dispatching call");
        match self.dispatch(method, single_argument(params)) {
            Ok(value) => value,
            Err(err) => to_json(failed(method, err)),
        }
    }

    fn dispatch(&self, method: &str, params: Value) -> RegistryResult<Value> {
        let value = match method {
            "add_game" => to_json(self.add_game(from_params(params)?)),
            "update_game" => to_json(self.update_game(from_params(params)?)),
            "delete_game" => to_json(self.delete_game(parse_game_ref(&params, RefKind::Index)?)),
            "soft_delete_game" => to_json(self.soft_delete_game(parse_game_id(&params)?)),
            "restore_game" => to_json(self.restore_game(parse_game_id(&params)?)),
            "get_games" => to_json(self.registry.list_active()?),
            "get_deleted_games" => to_json(self.registry.list_deleted()?),
            "get_all_games" => to_json(self.registry.list_all()?),
            "get_game_info" => {
                match parse_game_id(&params).and_then(|id| self.registry.get_by_id(id)) {
                    Ok(record) => to_json(record),
                    Err(err) => {
                        warn!(method, error = %err, "game lookup failed");
                        Value::Null
                    }
                }
            }
            "launch_game" => to_json(self.launch_game(from_params(params)?)),
            "select_directory" => Value::String(self.select_directory()),
            "select_game_executable" => {
                to_json(self.select_game_executable(&parse_directory(&params)?))
            }
            "detect_prerequisite_mods" => {
                to_json(self.detect_prerequisite_mods(&parse_directory(&params)?))
            }
            "detect_game" => to_json(self.detect_game(&parse_directory(&params)?)),
            "check_environment" => to_json(self.check_environment()),
            "get_app_info" => to_json(self.app_info()?),
            "check_mod_loaders" => to_json(self.check_mod_loaders(&parse_directory(&params)?)?),
            "install_mod_prerequisites" => {
                to_json(self.install_mod_prerequisites(from_params(params)?)?)
            }
            "open_game_folder" => to_json(self.open_game_folder(&parse_directory(&params)?)),
            "check_duplicate_directory" => {
                to_json(self.check_duplicate_directory(from_params(params)?))
            }
            other => {
                return Err(RegistryError::validation(format!("unknown method: {other}")));
            }
        };
        Ok(value)
    }
}

fn failed(method: &str, err: RegistryError) -> ApiResponse {
    warn!(method, kind = err.kind(), error = %err, "call failed");
    ApiResponse::from(err)
}

fn single_argument(params: Value) -> Value {
    match params {
        Value::Array(mut items) if items.len() <= 1 => items.pop().unwrap_or(Value::Null),
        other => other,
    }
}

fn to_json<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|err| {
        warn!(error = %err, "response could not be serialized");
        Value::Null
    })
}
