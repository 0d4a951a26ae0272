//! Immutable build configuration.
//!
//! Built once in `main` from the chosen command and handed by reference to
//! every pipeline. Nothing in here is mutated after construction.
//!
//! ```text
//! Command ──► Mode { production, watch, serve }
//!                 │
//! --root ──► Paths│
//!                 ▼
//!            BuildConfig { mode, paths, tools, serve }
//! ```

pub mod defaults;
pub mod error;
pub mod paths;
pub mod serve;

pub use error::{CommandError, ConfigError};
pub use paths::Paths;
pub use serve::ServeConfig;

use anyhow::{Context, Result, bail};
use educe::Educe;
use std::{path::PathBuf, str::FromStr};

// ============================================================================
// Command & Mode
// ============================================================================

/// The three operations the driver knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Clean,
    Build,
    Dev,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "clean" => Ok(Self::Clean),
            "build" => Ok(Self::Build),
            "dev" => Ok(Self::Dev),
            other => Err(CommandError::Unknown(other.to_owned())),
        }
    }
}

impl Command {
    /// Mode flags implied by this command.
    pub const fn mode(self) -> Mode {
        match self {
            Self::Clean => Mode {
                production: false,
                watch: false,
                serve: false,
            },
            Self::Build => Mode::production(),
            Self::Dev => Mode::development(),
        }
    }
}

/// Build mode: three independent flags, fixed for the life of the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mode {
    /// Minify output and omit debug aids.
    pub production: bool,
    /// Re-run pipelines on file changes.
    pub watch: bool,
    /// Start the dev server after the first run.
    pub serve: bool,
}

impl Mode {
    pub const fn production() -> Self {
        Self {
            production: true,
            watch: false,
            serve: false,
        }
    }

    pub const fn development() -> Self {
        Self {
            production: false,
            watch: true,
            serve: true,
        }
    }
}

// ============================================================================
// Tools
// ============================================================================

/// External commands the pipelines delegate to.
#[derive(Debug, Clone, Educe)]
#[educe(Default)]
pub struct ToolsConfig {
    /// JS bundler (esbuild-compatible CLI).
    #[educe(Default = defaults::tools::bundler())]
    pub bundler: Vec<String>,

    /// Utility-class generator. `None` skips the step.
    #[educe(Default = defaults::tools::utility())]
    pub utility: Option<Vec<String>>,
}

// ============================================================================
// BuildConfig
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    pub mode: Mode,
    pub paths: Paths,
    pub tools: ToolsConfig,
    pub serve: ServeConfig,
}

impl BuildConfig {
    pub fn for_command(root: impl Into<PathBuf>, command: Command) -> Self {
        Self {
            mode: command.mode(),
            paths: Paths::new(root),
            ..Self::default()
        }
    }

    /// Check that every delegated tool can be found before any work starts.
    pub fn validate(&self) -> Result<()> {
        Self::check_command_installed("bundler", &self.tools.bundler)?;
        if let Some(utility) = &self.tools.utility {
            Self::check_command_installed("utility", utility)?;
        }
        Ok(())
    }

    fn check_command_installed(field: &str, command: &[String]) -> Result<()> {
        let Some(cmd) = command.first() else {
            bail!(ConfigError::Validation(format!(
                "{field} command must have at least one element"
            )));
        };

        which::which(cmd).with_context(|| ConfigError::ToolMissing(cmd.clone()))?;
        Ok(())
    }
}
