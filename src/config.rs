//! dscbridge configuration (~/.config/dscbridge/config.toml)
//!
//! ```toml
//! install_root = "/opt/dscbridge"
//! template_dir = "~/.config/dscbridge/templates"
//!
//! [powershell]
//! path = "/usr/bin/pwsh"
//! args = ["-NoProfile", "-NonInteractive", "-Command", "-"]
//! ```
//!
//! A missing file means defaults everywhere.

use anyhow::{Context, Result};
use dsckit::{PowerShellConfig, TemplateSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DscBridgeConfig {
    /// Installation root; vendored DSC modules live in `dsc_resources/` below it
    pub install_root: Option<String>,
    /// Directory overriding the built-in script fragments
    pub template_dir: Option<String>,
    pub powershell: PowerShellSection,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerShellSection {
    pub path: Option<String>,
    pub args: Option<Vec<String>>,
}

/// Default config file location
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("dscbridge").join("config.toml"))
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

impl DscBridgeConfig {
    /// Load from an explicit path, or the default location
    ///
    /// An explicit path must exist; the default location may be missing.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (config_path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (default_config_path()?, false),
        };

        if !required && !config_path.exists() {
            log::debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Could not read config file: {}", config_path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))
    }

    /// Parse TOML config content
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML format in dscbridge config")
    }

    /// Interpreter settings, with an optional executable override
    pub fn powershell_config(&self, pwsh: Option<&Path>, debug: bool) -> PowerShellConfig {
        let defaults = PowerShellConfig::default();
        let path = match (pwsh, &self.powershell.path) {
            (Some(path), _) => path.to_path_buf(),
            (None, Some(path)) => expand(path),
            (None, None) => defaults.path,
        };
        PowerShellConfig {
            path,
            args: self.powershell.args.clone().unwrap_or(defaults.args),
            debug,
        }
    }

    /// Installation root: configured, else the directory holding the executable
    pub fn install_root(&self) -> Result<PathBuf> {
        if let Some(root) = &self.install_root {
            return Ok(expand(root));
        }
        let exe = std::env::current_exe().context("Could not locate the dscbridge executable")?;
        exe.parent()
            .map(Path::to_path_buf)
            .context("Executable has no parent directory")
    }

    /// Script fragments: the override directory if configured, else built-ins
    pub fn templates(&self) -> Result<TemplateSet> {
        match &self.template_dir {
            Some(dir) => {
                let dir = expand(dir);
                log::debug!("Loading script templates from {}", dir.display());
                TemplateSet::from_dir(&dir)
                    .with_context(|| format!("Could not load templates from {}", dir.display()))
            }
            None => Ok(TemplateSet::builtin()),
        }
    }
}
