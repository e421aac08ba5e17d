//! Executable resolution and detached game launch.

use std::{
    io,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use tracing::info;
use walkdir::WalkDir;

use crate::{
    error::{RegistryError, RegistryResult},
    models::{GameRecord, GameType},
};

/// Everything needed to start a game.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Title tag, used for the default executable.
    pub game_type: GameType,
    /// Installation root; also the working directory.
    pub directory: PathBuf,
    /// One-off executable chosen for this launch.
    pub exe: Option<String>,
    /// Executable configured on the record.
    pub custom_executable: Option<String>,
}

impl From<&GameRecord> for LaunchRequest {
    fn from(record: &GameRecord) -> Self {
        Self {
            game_type: record.game_type.clone(),
            directory: record.directory.clone(),
            exe: None,
            custom_executable: record.custom_executable.clone(),
        }
    }
}

/// Starts processes. Split out so callers can substitute a recorder in tests.
pub trait Launcher {
    /// Start `executable` in `working_dir` without waiting for it.
    fn spawn(&self, executable: &Path, working_dir: &Path) -> io::Result<()>;

    /// Show `directory` in the desktop file manager.
    fn open_folder(&self, directory: &Path) -> io::Result<()>;
}

/// Spawns the game as an unsupervised child process.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedLauncher;

impl Launcher for DetachedLauncher {
    fn spawn(&self, executable: &Path, working_dir: &Path) -> io::Result<()> {
        let mut command = Command::new(executable);
        command
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const DETACHED_PROCESS: u32 = 0x0000_0008;
            command.creation_flags(DETACHED_PROCESS);
        }

        command.spawn().map(|_child| ())
    }

    fn open_folder(&self, directory: &Path) -> io::Result<()> {
        open::that(directory)
    }
}

/// Pick the executable for `request`: explicit `exe`, then the record's
/// override, then the type default.
pub fn resolve_executable(request: &LaunchRequest) -> RegistryResult<PathBuf> {
    let explicit = non_empty(request.exe.as_deref());
    let custom = non_empty(request.custom_executable.as_deref());
    let executable = explicit
        .or(custom)
        .or_else(|| request.game_type.default_executable())
        .ok_or_else(|| {
            RegistryError::validation(format!("unknown game type: {}", request.game_type))
        })?;

    let path = request.directory.join(executable);
    if !path.is_file() {
        return Err(RegistryError::not_found(format!(
            "game executable not found: {}",
            path.display()
        )));
    }
    Ok(path)
}

/// Open a game folder in the file manager.
pub fn open_game_folder(launcher: &dyn Launcher, directory: &Path) -> RegistryResult<()> {
    if !directory.is_dir() {
        return Err(RegistryError::not_found(format!(
            "game directory {} does not exist",
            directory.display()
        )));
    }
    launcher
        .open_folder(directory)
        .map_err(|err| RegistryError::io("open", directory, err))?;
    info!(directory = %directory.display(), "game folder opened");
    Ok(())
}

/// Resolve and start the game, returning the executable that was launched.
pub fn launch(launcher: &dyn Launcher, request: &LaunchRequest) -> RegistryResult<PathBuf> {
    let executable = resolve_executable(request)?;
    launcher
        .spawn(&executable, &request.directory)
        .map_err(|err| RegistryError::io("launch", &executable, err))?;
    info!(executable = %executable.display(), "game launched");
    Ok(executable)
}

/// Whether the type's default executable is present, so no picker is needed.
pub fn can_launch_directly(game_type: &GameType, directory: &Path) -> bool {
    game_type
        .default_executable()
        .map(|exe| directory.join(exe).is_file())
        .unwrap_or(false)
}

/// `.exe` files directly inside `directory`, sorted by name.
pub fn candidate_executables(directory: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("exe"))
                .unwrap_or(false)
        })
        .collect();
    found.sort();
    found
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
