//! Startup probes for the runtimes the launcher depends on.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Minimum `Release` value of .NET Framework 4.8.
pub const DOTNET_48_RELEASE: u32 = 528_040;

/// Result of a single runtime probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    /// The runtime is installed.
    Present,
    /// The runtime is missing or too old.
    Missing,
    /// The probe has no meaning on this platform.
    NotApplicable,
}

impl ProbeStatus {
    fn from_present(present: bool) -> Self {
        if present {
            Self::Present
        } else {
            Self::Missing
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => f.write_str("installed"),
            Self::Missing => f.write_str("missing"),
            Self::NotApplicable => f.write_str("not applicable"),
        }
    }
}

/// Outcome of every startup probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentReport {
    /// Browser-engine runtime used by the web front-end.
    pub webview_runtime: ProbeStatus,
    /// .NET Framework 4.8 or newer.
    pub dotnet_runtime: ProbeStatus,
}

impl EnvironmentReport {
    /// Human-readable names of missing components.
    pub fn missing_components(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.webview_runtime == ProbeStatus::Missing {
            missing.push("WebView2 Runtime");
        }
        if self.dotnet_runtime == ProbeStatus::Missing {
            missing.push(".NET Framework 4.8 or newer");
        }
        missing
    }

    /// Whether startup may proceed.
    pub fn is_satisfied(&self) -> bool {
        self.missing_components().is_empty()
    }

    /// Warning shown to the user when something is missing.
    pub fn warning(&self) -> Option<String> {
        let missing = self.missing_components();
        if missing.is_empty() {
            return None;
        }
        Some(format!(
            "Missing required components: {}. Install them and start the launcher again.",
            missing.join(", ")
        ))
    }
}

/// Run every probe for the current platform.
pub fn check_environment() -> EnvironmentReport {
    let webview_runtime = platform::webview_installed()
        .map_or(ProbeStatus::NotApplicable, ProbeStatus::from_present);
    let dotnet_runtime = platform::dotnet_release().map_or(ProbeStatus::NotApplicable, |release| {
        ProbeStatus::from_present(release.is_some_and(|value| value >= DOTNET_48_RELEASE))
    });
    EnvironmentReport {
        webview_runtime,
        dotnet_runtime,
    }
}

#[cfg(windows)]
mod platform {
    use winreg::{
        enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE},
        RegKey, HKEY,
    };

    const WEBVIEW_CLIENT: &str =
        r"Microsoft\EdgeUpdate\Clients\{F3017226-FE2A-4295-8BDF-00C3A9A7E4C5}";
    const DOTNET_KEY: &str = r"SOFTWARE\Microsoft\NET Framework Setup\NDP\v4\Full";

    pub fn webview_installed() -> Option<bool> {
        let locations: [(HKEY, String); 3] = [
            (HKEY_CURRENT_USER, format!(r"Software\{WEBVIEW_CLIENT}")),
            (HKEY_LOCAL_MACHINE, format!(r"SOFTWARE\WOW6432Node\{WEBVIEW_CLIENT}")),
            (HKEY_LOCAL_MACHINE, format!(r"SOFTWARE\{WEBVIEW_CLIENT}")),
        ];
        let found = locations.iter().any(|(hive, path)| {
            RegKey::predef(*hive)
                .open_subkey(path)
                .and_then(|key| key.get_value::<String, _>("pv"))
                .map(|version| !version.is_empty() && version != "0.0.0.0")
                .unwrap_or(false)
        });
        Some(found)
    }

    pub fn dotnet_release() -> Option<Option<u32>> {
        let release = RegKey::predef(HKEY_LOCAL_MACHINE)
            .open_subkey(DOTNET_KEY)
            .and_then(|key| key.get_value::<u32, _>("Release"))
            .ok();
        Some(release)
    }
}

#[cfg(not(windows))]
mod platform {
    pub fn webview_installed() -> Option<bool> {
        None
    }

    pub fn dotnet_release() -> Option<Option<u32>> {
        None
    }
}
