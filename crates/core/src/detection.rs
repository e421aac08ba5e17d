//! Identify which title lives in a directory from its executable.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::models::GameType;

/// Executable names shipped by each supported release, in lookup order.
const KNOWN_EXECUTABLES: [(&str, GameType, &str); 5] = [
    ("gta3.exe", GameType::Gta3, "Grand Theft Auto III"),
    ("gta-vc.exe", GameType::GtaVc, "Grand Theft Auto: Vice City"),
    ("gtasa.exe", GameType::GtaSa, "Grand Theft Auto: San Andreas"),
    ("gta-sa.exe", GameType::GtaSa, "Grand Theft Auto: San Andreas"),
    ("gta_sa.exe", GameType::GtaSa, "Grand Theft Auto: San Andreas"),
];

/// A title recognised in a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedGame {
    /// Title tag.
    #[serde(rename = "type")]
    pub game_type: GameType,
    /// Executable file name as found on disk.
    pub executable: String,
    /// Full product name.
    pub game_name: String,
}

/// Look for a known executable directly inside `directory`.
pub fn detect_game(directory: impl AsRef<Path>) -> Option<DetectedGame> {
    let entries = fs::read_dir(directory.as_ref()).ok()?;
    let files: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();

    KNOWN_EXECUTABLES
        .iter()
        .find_map(|(exe, game_type, game_name)| {
            files
                .iter()
                .find(|file| file.eq_ignore_ascii_case(exe))
                .map(|file| DetectedGame {
                    game_type: game_type.clone(),
                    executable: file.clone(),
                    game_name: game_name.to_string(),
                })
        })
}
