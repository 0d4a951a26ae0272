//! Fixed defaults for paths, tools and the dev server.
//!
//! Nothing here is read from the environment or a config file; these are
//! the only values the orchestrator ever uses.

// ============================================================================
// Directory Set
// ============================================================================

pub mod dirs {
    use std::path::PathBuf;

    pub fn root() -> PathBuf {
        "./".into()
    }

    pub fn src() -> PathBuf {
        "src".into()
    }

    pub fn dist() -> PathBuf {
        "dist".into()
    }

    pub fn tmp() -> PathBuf {
        "tmp".into()
    }

    /// Sub-directory holding compiled and copied assets, in both trees.
    pub const ASSETS: &str = "assets";
}

// ============================================================================
// Pipeline Entries
// ============================================================================

pub mod entries {
    /// Root stylesheet, relative to `src`.
    pub const STYLE: &str = "styles/main.scss";

    /// Script entry point, relative to `src`.
    pub const SCRIPT: &str = "js/app.js";

    /// Compiled (pre post-processing) CSS, relative to `tmp`.
    pub const STYLE_TMP: &str = "main.css";

    /// Utility-expanded CSS, relative to `tmp`.
    pub const UTILITY_TMP: &str = "main.utility.css";

    /// Published stylesheet, relative to `dist/assets`.
    pub const STYLE_OUT: &str = "main.css";
}

// ============================================================================
// File Patterns (relative to `src`)
// ============================================================================

pub mod patterns {
    /// Stylesheet sources.
    pub const STYLES: &[&str] = &["styles/**/*.scss"];

    /// Files whose class names feed utility generation.
    pub const UTILITY_SOURCES: &[&str] = &["**/*.{html,php,js}"];

    /// Markup and templates copied verbatim.
    pub const MARKUP: &[&str] = &["**/*.html", "**/*.php"];

    /// Static asset sub-tree copied verbatim.
    pub const ASSETS: &[&str] = &["assets/**/*"];
}

// ============================================================================
// External Tools
// ============================================================================

pub mod tools {
    pub fn bundler() -> Vec<String> {
        vec!["esbuild".into()]
    }

    pub fn utility() -> Option<Vec<String>> {
        Some(vec!["tailwindcss".into()])
    }
}

// ============================================================================
// Dev Server
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub const fn port() -> u16 {
        8080
    }
}
