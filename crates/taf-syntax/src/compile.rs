//! Load, tokenize and parse in one call.
//!
//! Each stage short-circuits: the first failure becomes the single
//! [`PositionedError`] of the compile, tagged with the stage it came from.

use crate::ast::Script;
use crate::document;
use crate::error::{Position, PositionedError, Stage};
use crate::lexer::{self, LexerConfig, Token};
use crate::parser;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub fn compile(text: &str) -> Result<Script, PositionedError> {
    compile_with(text, &LexerConfig::default())
}

pub fn compile_with(text: &str, config: &LexerConfig) -> Result<Script, PositionedError> {
    let tokens = tokens_with(text, config)?;
    let script = parser::parse(tokens)?;
    Ok(script)
}

/// Runs the load and tokenize stages only, for token dumps.
pub fn tokens_with(text: &str, config: &LexerConfig) -> Result<Vec<Token>, PositionedError> {
    let document = document::load(text)?;
    debug!("document loaded");
    let tokens = lexer::tokenize_with(&document, config)?;
    debug!(count = tokens.len(), "document tokenized");
    Ok(tokens)
}

/// Reads and compiles a script file. The path is attached to any error.
pub fn compile_file(
    path: impl AsRef<Path>,
    config: &LexerConfig,
) -> Result<Script, PositionedError> {
    let path = path.as_ref();
    let text = read_source(path)?;
    compile_with(&text, config).map_err(|err| err.with_path(path))
}

pub fn read_source(path: &Path) -> Result<String, PositionedError> {
    fs::read_to_string(path).map_err(|err| {
        PositionedError::new(
            Stage::Load,
            Position::default(),
            format!("cannot read script: {}", err),
        )
        .with_path(path)
    })
}

/// Compiles independent script files in parallel.
///
/// Results come back in the order of `paths`; a failing file does not affect
/// the others.
pub fn compile_batch(
    paths: &[PathBuf],
    config: &LexerConfig,
) -> Vec<(PathBuf, Result<Script, PositionedError>)> {
    paths
        .par_iter()
        .map(|path| (path.clone(), compile_file(path, config)))
        .collect()
}
