use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use taf_syntax::LexerConfig;
use taf_syntax::lexer::DEFAULT_INDENT_UNIT;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_indent_unit")]
    pub indent_unit: usize,

    #[serde(default = "default_true")]
    pub colored: bool,

    #[serde(default)]
    pub verbose: bool,
}

fn default_true() -> bool {
    true
}

fn default_indent_unit() -> usize {
    DEFAULT_INDENT_UNIT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            indent_unit: DEFAULT_INDENT_UNIT,
            colored: true,
            verbose: false,
        }
    }
}

impl Config {
    /// Load config from taf.toml or .tafrc.toml in `dir`, falling back to defaults.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_paths = [PathBuf::from("taf.toml"), PathBuf::from(".tafrc.toml")];

        for path in config_paths {
            let path = dir.join(path);
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Config::default())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        if config.indent_unit == 0 {
            anyhow::bail!("indent_unit in {} must be at least 1", path.display());
        }
        Ok(config)
    }

    /// Merge CLI arguments into config
    pub fn merge_cli_args(&mut self, indent: Option<usize>, no_color: bool, verbose: bool) {
        if let Some(indent) = indent {
            self.indent_unit = indent;
        }

        if no_color {
            self.colored = false;
        }

        if verbose {
            self.verbose = true;
        }
    }

    pub fn lexer(&self) -> LexerConfig {
        LexerConfig::with_indent_unit(self.indent_unit)
    }
}
