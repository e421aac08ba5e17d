//! File and folder selection.

use std::path::{Path, PathBuf};

use crate::{detection::detect_game, launch::candidate_executables};

/// Source of user-chosen paths. A windowed front-end would open native dialogs.
pub trait FilePicker {
    /// Ask for a game folder; `None` when cancelled.
    fn pick_directory(&self) -> Option<PathBuf>;

    /// Ask for an executable inside `directory`; `None` when cancelled.
    fn pick_executable(&self, directory: &Path) -> Option<PathBuf>;
}

/// Picker for terminal and scripted use.
///
/// It cannot browse for folders, so `pick_directory` always cancels. For
/// executables it takes the recognised game binary, or failing that the
/// first `.exe` in the folder.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessPicker;

impl FilePicker for HeadlessPicker {
    fn pick_directory(&self) -> Option<PathBuf> {
        None
    }

    fn pick_executable(&self, directory: &Path) -> Option<PathBuf> {
        detect_game(directory)
            .map(|detected| directory.join(detected.executable))
            .or_else(|| candidate_executables(directory).into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn prefers_recognised_executable() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a-setup.exe"), b"")?;
        fs::write(dir.path().join("gta-vc.exe"), b"")?;

        let picked = HeadlessPicker.pick_executable(dir.path());
        assert_eq!(picked, Some(dir.path().join("gta-vc.exe")));
        assert_eq!(HeadlessPicker.pick_directory(), None);
        Ok(())
    }

    #[test]
    fn falls_back_to_first_candidate() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("b.exe"), b"")?;
        fs::write(dir.path().join("a.exe"), b"")?;
        assert_eq!(
            HeadlessPicker.pick_executable(dir.path()),
            Some(dir.path().join("a.exe"))
        );
        assert_eq!(HeadlessPicker.pick_executable(&dir.path().join("none")), None);
        Ok(())
    }
}
