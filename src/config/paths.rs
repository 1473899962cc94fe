//! Platform-specific configuration paths.
//!
//!   Windows: %APPDATA%/autoamp
//!   macOS:   ~/Library/Application Support/autoamp
//!   Linux:   $XDG_CONFIG_HOME/autoamp (default ~/.config)

use std::path::PathBuf;

/// Directory holding autoamp's settings.
pub fn get_config_dir() -> PathBuf {
    get_config_base().join("autoamp")
}

/// Default settings file location.
pub fn get_settings_path() -> PathBuf {
    get_config_dir().join("settings.json")
}

fn get_config_base() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata);
        }
        dirs::config_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    #[cfg(target_os = "macos")]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Library")
            .join("Application Support")
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        // Respect XDG_CONFIG_HOME, default ~/.config
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
    }
}
