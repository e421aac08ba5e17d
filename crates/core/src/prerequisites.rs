//! Detection of the loader mods other mods depend on.

use std::{
    fs,
    path::{Path, PathBuf},
};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Loader files that must be present for most mods to work.
pub const REQUIRED_MODS: [&str; 2] = ["modloader.asi", "cleo.asi"];

/// Sub-directories searched besides the game root, with their labels.
const SEARCH_DIRS: [(&str, Option<&str>); 3] = [
    ("root directory", None),
    ("scripts directory", Some("scripts")),
    ("plugins directory", Some("plugins")),
];

/// Any ASI plugin with `cleo` in its name, e.g. `III.CLEO.asi` or `CLEO.asi`.
static CLEO_ASI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^.*cleo.*\.asi$").expect("invalid CLEO regex"));

/// One required file located on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundMod {
    /// Required mod name the file satisfies.
    pub mod_file: String,
    /// Label of the directory it was found in.
    pub directory_name: String,
    /// Directory it was found in.
    pub directory_path: PathBuf,
    /// Path of the file as it exists on disk.
    pub full_path: PathBuf,
}

/// Outcome of a prerequisite scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteReport {
    /// At least one required file was found.
    pub has_prerequisite: bool,
    /// Labels of directories with hits, comma separated.
    pub location: Option<String>,
    /// Required names that were found.
    pub found_mods: Vec<String>,
    /// Required names that were not found anywhere.
    pub missing_mods: Vec<String>,
    /// Every required file was found.
    pub all_required_found: bool,
    /// Every hit, including the same mod in several directories.
    pub found_mods_details: Vec<FoundMod>,
    /// Labels of every directory considered.
    pub checked_directories: Vec<String>,
}

impl PrerequisiteReport {
    fn empty() -> Self {
        Self {
            has_prerequisite: false,
            location: None,
            found_mods: Vec::new(),
            missing_mods: REQUIRED_MODS.iter().map(|name| name.to_string()).collect(),
            all_required_found: false,
            found_mods_details: Vec::new(),
            checked_directories: SEARCH_DIRS
                .iter()
                .map(|(label, _)| label.to_string())
                .collect(),
        }
    }

    fn record(&mut self, hit: FoundMod) {
        if !self.found_mods.contains(&hit.mod_file) {
            self.found_mods.push(hit.mod_file.clone());
        }
        self.missing_mods.retain(|name| name != &hit.mod_file);
        self.found_mods_details.push(hit);
    }

    fn finish(mut self) -> Self {
        self.has_prerequisite = !self.found_mods.is_empty();
        self.all_required_found = self.missing_mods.is_empty();

        let mut labels: Vec<&str> = Vec::new();
        for detail in &self.found_mods_details {
            if !labels.contains(&detail.directory_name.as_str()) {
                labels.push(&detail.directory_name);
            }
        }
        self.location = (!labels.is_empty()).then(|| labels.join(", "));
        self
    }
}

/// Scan the game root, `scripts` and `plugins` for the required loaders.
pub fn detect_prerequisite_mods(game_dir: impl AsRef<Path>) -> PrerequisiteReport {
    let game_dir = game_dir.as_ref();
    let mut report = PrerequisiteReport::empty();
    if !game_dir.is_dir() {
        warn!(directory = %game_dir.display(), "prerequisite scan skipped, directory missing");
        return report.finish();
    }

    for (label, sub_dir) in SEARCH_DIRS {
        let directory = match sub_dir {
            Some(name) => game_dir.join(name),
            None => game_dir.to_path_buf(),
        };
        for hit in scan_directory(&directory, label) {
            report.record(hit);
        }
    }

    let report = report.finish();
    debug!(
        directory = %game_dir.display(),
        found = ?report.found_mods,
        missing = ?report.missing_mods,
        "prerequisite scan finished"
    );
    report
}

fn scan_directory(directory: &Path, label: &str) -> Vec<FoundMod> {
    let Ok(entries) = fs::read_dir(directory) else {
        return Vec::new();
    };
    let mut files: Vec<(String, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .map(|entry| (entry.file_name().to_string_lossy().into_owned(), entry.path()))
        .collect();
    files.sort();

    REQUIRED_MODS
        .iter()
        .filter_map(|required| {
            files
                .iter()
                .find(|(name, _)| satisfies(name, required))
                .map(|(_, path)| FoundMod {
                    mod_file: required.to_string(),
                    directory_name: label.to_string(),
                    directory_path: directory.to_path_buf(),
                    full_path: path.clone(),
                })
        })
        .collect()
}

fn satisfies(file_name: &str, required: &str) -> bool {
    file_name.eq_ignore_ascii_case(required) || (required == "cleo.asi" && is_cleo_asi(file_name))
}

/// Whether `file_name` is a CLEO build. CLEO Redux is a separate loader.
pub fn is_cleo_asi(file_name: &str) -> bool {
    CLEO_ASI.is_match(file_name) && !file_name.to_ascii_lowercase().contains("redux")
}
