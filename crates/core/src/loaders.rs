//! Loader status and installation of the bundled loader packages.
//!
//! [`check_mod_loaders`] reports which of the four loaders a game folder
//! carries. [`install_prerequisites`] copies them from a local module
//! directory laid out as:
//!
//! ```text
//! modules/
//!   dinput8.dll
//!   CLEO.III_v2.1.1/{III.CLEO.asi, CLEO/}
//!   CLEO.VC_v2.1.1/{VC.CLEO.asi, CLEO/}
//!   CLEO.SA_v4.44/{CLEO.asi, bass.dll, vorbisFile.dll, vorbisHooked.dll, cleo/, scripts/, cleo_sdk/}
//!   CLEO.Redux_v1.3.3/{cleo_redux.asi, CLEO/}
//!   ModLoader/{modloader.asi, modloader/}
//! ```

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{
    error::{RegistryError, RegistryResult},
    models::GameType,
    prerequisites::is_cleo_asi,
};

/// ASI loader proxy expected in the game root.
pub const DINPUT8: &str = "dinput8.dll";
/// CLEO Redux plugin file.
pub const CLEO_REDUX_ASI: &str = "cleo_redux.asi";
/// Mod Loader plugin file.
pub const MODLOADER_ASI: &str = "modloader.asi";

/// Directories searched for plugins, with their labels.
const PLUGIN_DIRS: [(&str, Option<&str>); 3] = [
    ("root directory", None),
    ("plugins directory", Some("plugins")),
    ("scripts directory", Some("scripts")),
];

/// Installable loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderComponent {
    /// `dinput8.dll` ASI loader.
    Dinput8,
    /// Per-title CLEO library.
    Cleo,
    /// CLEO Redux.
    CleoRedux,
    /// Mod Loader.
    Modloader,
}

impl LoaderComponent {
    /// Installed when a request names no components.
    pub const DEFAULT_INSTALL: [LoaderComponent; 2] =
        [LoaderComponent::Dinput8, LoaderComponent::Cleo];

    /// Parse `dinput8`, `cleo`, `cleo_redux` or `modloader`, ignoring case.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "dinput8" => Some(Self::Dinput8),
            "cleo" => Some(Self::Cleo),
            "cleo_redux" => Some(Self::CleoRedux),
            "modloader" => Some(Self::Modloader),
            _ => None,
        }
    }

    /// Name used in status lists.
    pub fn label(self) -> &'static str {
        match self {
            Self::Dinput8 => DINPUT8,
            Self::Cleo => "CLEO",
            Self::CleoRedux => "CLEO Redux",
            Self::Modloader => "ModLoader",
        }
    }
}

impl fmt::Display for LoaderComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which loaders a game folder carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderStatus {
    /// `dinput8.dll` sits in the game root.
    pub has_dinput8: bool,
    /// A `modloader` folder or `modloader.asi` was found.
    pub has_modloader: bool,
    /// A CLEO build was found.
    pub has_cleo: bool,
    /// `cleo_redux.asi` was found.
    pub has_cleo_redux: bool,
    /// Labels of the loaders that were not found.
    pub missing_loaders: Vec<String>,
    /// One line per hit, e.g. `CLEO (plugins directory/III.CLEO.asi)`.
    pub found_loaders: Vec<String>,
}

impl LoaderStatus {
    fn mark(&mut self, component: LoaderComponent, found: bool) {
        match component {
            LoaderComponent::Dinput8 => self.has_dinput8 = found,
            LoaderComponent::Cleo => self.has_cleo = found,
            LoaderComponent::CleoRedux => self.has_cleo_redux = found,
            LoaderComponent::Modloader => self.has_modloader = found,
        }
        if !found {
            self.missing_loaders.push(component.label().to_string());
        }
    }

    fn hit(&mut self, component: LoaderComponent, location: &str, name: &str) {
        self.found_loaders
            .push(format!("{} ({location}/{name})", component.label()));
    }
}

/// Report the loaders present in `game_dir`.
pub fn check_mod_loaders(game_dir: &Path) -> RegistryResult<LoaderStatus> {
    require_directory(game_dir)?;
    let mut status = LoaderStatus::default();

    let dinput8 = find_file(game_dir, |name| name.eq_ignore_ascii_case(DINPUT8));
    if let Some(name) = &dinput8 {
        status.hit(LoaderComponent::Dinput8, "root directory", name);
    }
    status.mark(LoaderComponent::Dinput8, dinput8.is_some());

    let cleo = first_in_plugin_dirs(game_dir, is_cleo_asi);
    if let Some((label, name)) = &cleo {
        status.hit(LoaderComponent::Cleo, label, name);
    }
    status.mark(LoaderComponent::Cleo, cleo.is_some());

    let mut has_modloader = false;
    if let Some(folder) = find_dir(game_dir, "modloader") {
        has_modloader = true;
        status.hit(LoaderComponent::Modloader, "root directory", &format!("{folder} folder"));
    }
    for (label, directory) in plugin_dirs(game_dir) {
        if let Some(name) = find_file(&directory, |name| name.eq_ignore_ascii_case(MODLOADER_ASI)) {
            has_modloader = true;
            status.hit(LoaderComponent::Modloader, label, &name);
        }
    }
    status.mark(LoaderComponent::Modloader, has_modloader);

    let redux = first_in_plugin_dirs(game_dir, |name| name.eq_ignore_ascii_case(CLEO_REDUX_ASI));
    if let Some((label, name)) = &redux {
        status.hit(LoaderComponent::CleoRedux, label, name);
    }
    status.mark(LoaderComponent::CleoRedux, redux.is_some());

    debug!(
        directory = %game_dir.display(),
        found = ?status.found_loaders,
        missing = ?status.missing_loaders,
        "loader check finished"
    );
    Ok(status)
}

/// What to install and where.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Game root receiving the files.
    pub game_dir: PathBuf,
    /// Title, selecting the CLEO build.
    pub game_type: GameType,
    /// Loaders to install; empty means [`LoaderComponent::DEFAULT_INSTALL`].
    pub components: Vec<LoaderComponent>,
}

/// Files and folders written by an install, relative to the game root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallResult {
    /// Copied files.
    pub installed_files: Vec<String>,
    /// Created or merged folders.
    pub created_directories: Vec<String>,
}

impl InstallResult {
    fn file(&mut self, relative: String) {
        self.installed_files.push(relative);
    }

    fn directory(&mut self, relative: String) {
        if !self.created_directories.contains(&relative) {
            self.created_directories.push(relative);
        }
    }
}

/// Package contents for one loader, relative to its folder in the module directory.
struct Package {
    folder: &'static str,
    plugin: &'static str,
    root_files: &'static [&'static str],
    root_dirs: &'static [&'static str],
    plugin_dirs: &'static [&'static str],
}

fn cleo_package(game_type: &GameType) -> Option<Package> {
    let package = match game_type {
        GameType::Gta3 => Package {
            folder: "CLEO.III_v2.1.1",
            plugin: "III.CLEO.asi",
            root_files: &[],
            root_dirs: &["CLEO"],
            plugin_dirs: &[],
        },
        GameType::GtaVc => Package {
            folder: "CLEO.VC_v2.1.1",
            plugin: "VC.CLEO.asi",
            root_files: &[],
            root_dirs: &["CLEO"],
            plugin_dirs: &[],
        },
        GameType::GtaSa => Package {
            folder: "CLEO.SA_v4.44",
            plugin: "CLEO.asi",
            root_files: &["bass.dll", "vorbisFile.dll", "vorbisHooked.dll"],
            root_dirs: &["cleo", "scripts", "cleo_sdk"],
            plugin_dirs: &[],
        },
        GameType::Other(_) => return None,
    };
    Some(package)
}

const CLEO_REDUX_PACKAGE: Package = Package {
    folder: "CLEO.Redux_v1.3.3",
    plugin: CLEO_REDUX_ASI,
    root_files: &[],
    root_dirs: &[],
    plugin_dirs: &["CLEO"],
};

const MODLOADER_PACKAGE: Package = Package {
    folder: "ModLoader",
    plugin: MODLOADER_ASI,
    root_files: &[],
    root_dirs: &["modloader"],
    plugin_dirs: &[],
};

/// Copy the requested loaders from `module_dir` into the game folder.
///
/// ASI plugins go to `plugins` when it exists, else `scripts` when it
/// exists, else a newly created `plugins`. Missing package files fail the
/// install; files already copied stay in place.
pub fn install_prerequisites(
    module_dir: &Path,
    request: &InstallRequest,
) -> RegistryResult<InstallResult> {
    require_directory(&request.game_dir)?;
    if !module_dir.is_dir() {
        return Err(RegistryError::not_found(format!(
            "module directory {} does not exist",
            module_dir.display()
        )));
    }

    let components: &[LoaderComponent] = if request.components.is_empty() {
        &LoaderComponent::DEFAULT_INSTALL
    } else {
        &request.components
    };
    let game_dir = &request.game_dir;
    let mut result = InstallResult::default();

    for component in components {
        let package = match component {
            LoaderComponent::Dinput8 => {
                let source = module_dir.join(DINPUT8);
                copy_file(&source, &game_dir.join(DINPUT8))?;
                result.file(DINPUT8.to_string());
                continue;
            }
            LoaderComponent::Cleo => match cleo_package(&request.game_type) {
                Some(package) => package,
                None => {
                    warn!(game_type = %request.game_type, "no CLEO build for this game type");
                    continue;
                }
            },
            LoaderComponent::CleoRedux => CLEO_REDUX_PACKAGE,
            LoaderComponent::Modloader => MODLOADER_PACKAGE,
        };
        install_package(module_dir, game_dir, &package, &mut result)?;
    }

    info!(
        directory = %game_dir.display(),
        files = result.installed_files.len(),
        directories = result.created_directories.len(),
        "loader install finished"
    );
    Ok(result)
}

fn install_package(
    module_dir: &Path,
    game_dir: &Path,
    package: &Package,
    result: &mut InstallResult,
) -> RegistryResult<()> {
    let source = module_dir.join(package.folder);
    if !source.is_dir() {
        return Err(RegistryError::not_found(format!(
            "loader package {} does not exist",
            source.display()
        )));
    }

    let (plugin_dir, plugin_prefix) = plugin_target(game_dir, result)?;
    copy_file(
        &source.join(package.plugin),
        &plugin_dir.join(package.plugin),
    )?;
    result.file(format!("{plugin_prefix}{}", package.plugin));

    for file in package.root_files {
        let from = source.join(file);
        if from.is_file() {
            copy_file(&from, &game_dir.join(file))?;
            result.file(file.to_string());
        }
    }
    for folder in package.root_dirs {
        let from = source.join(folder);
        if from.is_dir() {
            copy_tree(&from, &game_dir.join(folder))?;
            result.directory(folder.to_string());
        }
    }
    for folder in package.plugin_dirs {
        let from = source.join(folder);
        if from.is_dir() {
            copy_tree(&from, &plugin_dir.join(folder))?;
            result.directory(format!("{plugin_prefix}{folder}"));
        }
    }
    Ok(())
}

/// Directory receiving ASI plugins and its prefix relative to the game root.
fn plugin_target(
    game_dir: &Path,
    result: &mut InstallResult,
) -> RegistryResult<(PathBuf, &'static str)> {
    let plugins = game_dir.join("plugins");
    if plugins.is_dir() {
        return Ok((plugins, "plugins/"));
    }
    let scripts = game_dir.join("scripts");
    if scripts.is_dir() {
        return Ok((scripts, "scripts/"));
    }
    fs::create_dir_all(&plugins)
        .map_err(|err| RegistryError::io("create directory", &plugins, err))?;
    result.directory("plugins".to_string());
    Ok((plugins, "plugins/"))
}

fn copy_file(from: &Path, to: &Path) -> RegistryResult<()> {
    if !from.is_file() {
        return Err(RegistryError::not_found(format!(
            "{} does not exist",
            from.display()
        )));
    }
    fs::copy(from, to).map_err(|err| RegistryError::io("copy", from, err))?;
    debug!(from = %from.display(), to = %to.display(), "copied");
    Ok(())
}

/// Merge `from` into `to`, overwriting files that already exist.
fn copy_tree(from: &Path, to: &Path) -> RegistryResult<()> {
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|err| RegistryError::io("read", from, err.into()))?;
        let Ok(relative) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(|err| RegistryError::io("create directory", &target, err))?;
        } else {
            fs::copy(entry.path(), &target)
                .map_err(|err| RegistryError::io("copy", entry.path(), err))?;
        }
    }
    Ok(())
}

fn require_directory(game_dir: &Path) -> RegistryResult<()> {
    if game_dir.is_dir() {
        Ok(())
    } else {
        Err(RegistryError::not_found(format!(
            "game directory {} does not exist",
            game_dir.display()
        )))
    }
}

fn plugin_dirs(game_dir: &Path) -> impl Iterator<Item = (&'static str, PathBuf)> + '_ {
    PLUGIN_DIRS.into_iter().map(move |(label, sub_dir)| {
        let directory = match sub_dir {
            Some(name) => game_dir.join(name),
            None => game_dir.to_path_buf(),
        };
        (label, directory)
    })
}

fn first_in_plugin_dirs(
    game_dir: &Path,
    matches: impl Fn(&str) -> bool + Copy,
) -> Option<(&'static str, String)> {
    plugin_dirs(game_dir)
        .find_map(|(label, directory)| find_file(&directory, matches).map(|name| (label, name)))
}

/// Name of the first file in `directory` accepted by `matches`, in name order.
fn find_file(directory: &Path, matches: impl Fn(&str) -> bool) -> Option<String> {
    entry_names(directory, false)
        .into_iter()
        .find(|name| matches(name.as_str()))
}

fn find_dir(directory: &Path, name: &str) -> Option<String> {
    entry_names(directory, true)
        .into_iter()
        .find(|entry| entry.eq_ignore_ascii_case(name))
}

fn entry_names(directory: &Path, dirs: bool) -> Vec<String> {
    WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            if dirs {
                entry.file_type().is_dir()
            } else {
                entry.file_type().is_file()
            }
        })
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::{tempdir, TempDir};

    fn touch(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, b"bin")?;
        Ok(())
    }

    fn module_dir() -> Result<TempDir> {
        let dir = tempdir()?;
        let root = dir.path();
        touch(&root.join(DINPUT8))?;
        touch(&root.join("CLEO.III_v2.1.1").join("III.CLEO.asi"))?;
        touch(&root.join("CLEO.III_v2.1.1").join("CLEO").join("CLEO_TEXT").join("readme.txt"))?;
        touch(&root.join("CLEO.SA_v4.44").join("CLEO.asi"))?;
        touch(&root.join("CLEO.SA_v4.44").join("bass.dll"))?;
        touch(&root.join("CLEO.SA_v4.44").join("cleo").join("cleo_saves").join(".keep"))?;
        touch(&root.join("CLEO.Redux_v1.3.3").join(CLEO_REDUX_ASI))?;
        touch(&root.join("CLEO.Redux_v1.3.3").join("CLEO").join("CLEO_PLUGINS").join("a.cleo"))?;
        touch(&root.join("ModLoader").join(MODLOADER_ASI))?;
        touch(&root.join("ModLoader").join("modloader").join("modloader.ini"))?;
        Ok(dir)
    }

    #[test]
    fn bare_game_folder_misses_everything() -> Result<()> {
        let game = tempdir()?;
        let status = check_mod_loaders(game.path())?;
        assert!(!status.has_dinput8 && !status.has_cleo && !status.has_modloader);
        assert_eq!(
            status.missing_loaders,
            vec!["dinput8.dll", "CLEO", "ModLoader", "CLEO Redux"]
        );
        assert!(status.found_loaders.is_empty());
        Ok(())
    }

    #[test]
    fn loaders_are_found_case_insensitively() -> Result<()> {
        let game = tempdir()?;
        touch(&game.path().join("DInput8.DLL"))?;
        touch(&game.path().join("plugins").join("VC.CLEO.asi"))?;
        touch(&game.path().join("scripts").join("ModLoader.asi"))?;
        touch(&game.path().join("plugins").join("CLEO_Redux.asi"))?;
        fs::create_dir_all(game.path().join("ModLoader"))?;

        let status = check_mod_loaders(game.path())?;
        assert!(status.has_dinput8);
        assert!(status.has_cleo);
        assert!(status.has_cleo_redux);
        assert!(status.has_modloader);
        assert!(status.missing_loaders.is_empty());
        assert_eq!(
            status.found_loaders,
            vec![
                "dinput8.dll (root directory/DInput8.DLL)",
                "CLEO (plugins directory/VC.CLEO.asi)",
                "ModLoader (root directory/ModLoader folder)",
                "ModLoader (scripts directory/ModLoader.asi)",
                "CLEO Redux (plugins directory/CLEO_Redux.asi)",
            ]
        );
        Ok(())
    }

    #[test]
    fn redux_alone_is_not_cleo() -> Result<()> {
        let game = tempdir()?;
        touch(&game.path().join(CLEO_REDUX_ASI))?;
        let status = check_mod_loaders(game.path())?;
        assert!(status.has_cleo_redux);
        assert!(!status.has_cleo);
        assert!(status.missing_loaders.contains(&"CLEO".to_string()));
        Ok(())
    }

    #[test]
    fn missing_game_folder_is_not_found() {
        let err = check_mod_loaders(Path::new("/definitely/not/a/game")).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn default_install_copies_dinput8_and_cleo() -> Result<()> {
        let modules = module_dir()?;
        let game = tempdir()?;
        let request = InstallRequest {
            game_dir: game.path().to_path_buf(),
            game_type: GameType::Gta3,
            components: Vec::new(),
        };

        let result = install_prerequisites(modules.path(), &request)?;
        assert_eq!(result.installed_files, vec!["dinput8.dll", "plugins/III.CLEO.asi"]);
        assert_eq!(result.created_directories, vec!["plugins", "CLEO"]);
        assert!(game.path().join("CLEO").join("CLEO_TEXT").join("readme.txt").is_file());

        let status = check_mod_loaders(game.path())?;
        assert!(status.has_dinput8 && status.has_cleo);
        Ok(())
    }

    #[test]
    fn plugins_prefer_existing_scripts_folder() -> Result<()> {
        let modules = module_dir()?;
        let game = tempdir()?;
        fs::create_dir_all(game.path().join("scripts"))?;
        let request = InstallRequest {
            game_dir: game.path().to_path_buf(),
            game_type: GameType::GtaSa,
            components: vec![LoaderComponent::Modloader, LoaderComponent::CleoRedux],
        };

        let result = install_prerequisites(modules.path(), &request)?;
        assert_eq!(
            result.installed_files,
            vec!["scripts/modloader.asi", "scripts/cleo_redux.asi"]
        );
        assert_eq!(result.created_directories, vec!["modloader", "scripts/CLEO"]);
        assert!(!game.path().join("plugins").exists());
        assert!(game
            .path()
            .join("scripts")
            .join("CLEO")
            .join("CLEO_PLUGINS")
            .join("a.cleo")
            .is_file());
        Ok(())
    }

    #[test]
    fn san_andreas_cleo_brings_its_extras() -> Result<()> {
        let modules = module_dir()?;
        let game = tempdir()?;
        fs::create_dir_all(game.path().join("plugins"))?;
        let request = InstallRequest {
            game_dir: game.path().to_path_buf(),
            game_type: GameType::GtaSa,
            components: vec![LoaderComponent::Cleo],
        };

        let result = install_prerequisites(modules.path(), &request)?;
        assert_eq!(result.installed_files, vec!["plugins/CLEO.asi", "bass.dll"]);
        assert_eq!(result.created_directories, vec!["cleo"]);
        assert!(game.path().join("cleo").join("cleo_saves").join(".keep").is_file());
        Ok(())
    }

    #[test]
    fn missing_package_fails_install() -> Result<()> {
        let modules = module_dir()?;
        let game = tempdir()?;
        let request = InstallRequest {
            game_dir: game.path().to_path_buf(),
            game_type: GameType::GtaVc,
            components: vec![LoaderComponent::Cleo],
        };
        let err = install_prerequisites(modules.path(), &request).unwrap_err();
        assert_eq!(err.kind(), "not_found");

        let err = install_prerequisites(&game.path().join("no-modules"), &request).unwrap_err();
        assert!(err.to_string().contains("module directory"));
        Ok(())
    }

    #[test]
    fn components_parse_from_wire_names() {
        assert_eq!(LoaderComponent::parse("CLEO_Redux"), Some(LoaderComponent::CleoRedux));
        assert_eq!(LoaderComponent::parse("dinput8"), Some(LoaderComponent::Dinput8));
        assert_eq!(LoaderComponent::parse("asi"), None);
    }
}
