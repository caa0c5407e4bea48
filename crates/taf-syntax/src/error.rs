use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Zero-based line/column of a key, value or token in the script source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} column {}", self.line, self.column)
    }
}

/// Renders a short excerpt of `source` around `position` with a caret under the column.
pub fn format_error_with_source(error_msg: &str, source: &str, position: Position) -> String {
    let lines: Vec<&str> = source.lines().collect();

    if position.line >= lines.len() {
        return format!("{} at line {}", error_msg, position.line);
    }

    let width = (position.line + 1).to_string().len();
    let mut output = String::new();
    output.push_str(&format!("  --> {}:{}\n", position.line, position.column));
    output.push_str(&format!("{:>width$} |\n", "", width = width));

    if position.line > 0 {
        output.push_str(&format!(
            "{:>width$} | {}\n",
            position.line - 1,
            lines[position.line - 1],
            width = width
        ));
    }

    output.push_str(&format!(
        "{:>width$} | {}\n",
        position.line,
        lines[position.line],
        width = width
    ));
    output.push_str(&format!(
        "{:>width$} | {}^ {}\n",
        "",
        " ".repeat(position.column),
        error_msg,
        width = width
    ));

    if position.line + 1 < lines.len() {
        output.push_str(&format!(
            "{:>width$} | {}\n",
            position.line + 1,
            lines[position.line + 1],
            width = width
        ));
    }

    output.push_str(&format!("{:>width$} |", "", width = width));

    output
}

/// Failure of the document loader: malformed YAML or a tree shape the loader refuses.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadError {
    pub message: String,
    pub position: Position,
}

impl LoadError {
    pub fn new(message: impl Into<String>, position: Position) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for LoadError {}

#[derive(Debug, Clone, PartialEq)]
pub enum LexError {
    Misaligned {
        key: String,
        indent_unit: usize,
        position: Position,
    },
    IndentMismatch {
        key: String,
        expected: usize,
        found: usize,
        position: Position,
    },
    UnexpectedShape {
        key: String,
        expected: &'static str,
        found: &'static str,
        position: Position,
    },
    EmptyObject {
        key: String,
        position: Position,
    },
    FlowMapping {
        key: String,
        position: Position,
    },
}

impl LexError {
    pub fn position(&self) -> Position {
        match self {
            LexError::Misaligned { position, .. } => *position,
            LexError::IndentMismatch { position, .. } => *position,
            LexError::UnexpectedShape { position, .. } => *position,
            LexError::EmptyObject { position, .. } => *position,
            LexError::FlowMapping { position, .. } => *position,
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::Misaligned {
                key, indent_unit, ..
            } => {
                write!(
                    f,
                    "key '{}' is not aligned to the {}-column indentation",
                    key, indent_unit
                )
            }
            LexError::IndentMismatch {
                key,
                expected,
                found,
                ..
            } => {
                write!(
                    f,
                    "key '{}' is indented at level {}, expected level {}",
                    key, found, expected
                )
            }
            LexError::UnexpectedShape {
                key,
                expected,
                found,
                ..
            } => {
                write!(f, "value of '{}' must be {}, found {}", key, expected, found)
            }
            LexError::EmptyObject { key, .. } => {
                write!(f, "section '{}' must not be empty", key)
            }
            LexError::FlowMapping { key, .. } => {
                write!(
                    f,
                    "value of '{}' is an inline {{...}} mapping; only input, output, parameterize and foreach may be written inline",
                    key
                )
            }
        }
    }
}

impl std::error::Error for LexError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    UnexpectedToken {
        found: String,
        expected: Vec<&'static str>,
        position: Position,
    },
    UnexpectedEnd {
        expected: Vec<&'static str>,
        position: Position,
    },
    InvalidValue {
        clause: &'static str,
        value: String,
        reason: &'static str,
        position: Position,
    },
}

impl ParseError {
    pub fn position(&self) -> Position {
        match self {
            ParseError::UnexpectedToken { position, .. } => *position,
            ParseError::UnexpectedEnd { position, .. } => *position,
            ParseError::InvalidValue { position, .. } => *position,
        }
    }

    pub fn expected(&self) -> &[&'static str] {
        match self {
            ParseError::UnexpectedToken { expected, .. } => expected,
            ParseError::UnexpectedEnd { expected, .. } => expected,
            ParseError::InvalidValue { .. } => &[],
        }
    }
}

fn write_expected(f: &mut fmt::Formatter<'_>, expected: &[&'static str]) -> fmt::Result {
    match expected {
        [] => Ok(()),
        [single] => write!(f, ", expected {}", single),
        many => write!(f, ", expected one of {}", many.join(", ")),
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedToken {
                found, expected, ..
            } => {
                write!(f, "unexpected {}", found)?;
                write_expected(f, expected)
            }
            ParseError::UnexpectedEnd { expected, .. } => {
                write!(f, "unexpected end of script")?;
                write_expected(f, expected)
            }
            ParseError::InvalidValue {
                clause,
                value,
                reason,
                ..
            } => {
                write!(f, "invalid {} value '{}': {}", clause, value, reason)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Pipeline stage a [`PositionedError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Load,
    Lex,
    Parse,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Lex => "lex",
            Stage::Parse => "parse",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single error surfaced by a failed compile, whatever stage produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedError {
    pub path: Option<PathBuf>,
    pub position: Position,
    pub message: String,
    pub stage: Stage,
}

impl PositionedError {
    pub fn new(stage: Stage, position: Position, message: impl Into<String>) -> Self {
        Self {
            path: None,
            position,
            message: message.into(),
            stage,
        }
    }

    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn line(&self) -> usize {
        self.position.line
    }

    pub fn column(&self) -> usize {
        self.position.column
    }

    pub fn render(&self, source: &str) -> String {
        let label = format!("{} error, {}", self.stage, self.message);
        let mut output = String::new();
        if let Some(path) = &self.path {
            output.push_str(&format!("{}\n", path.display()));
        }
        output.push_str(&format_error_with_source(&label, source, self.position));
        output
    }
}

impl fmt::Display for PositionedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "{} ", path.display())?;
        }
        write!(
            f,
            "line {} column {}: {} error, {}",
            self.position.line, self.position.column, self.stage, self.message
        )
    }
}

impl std::error::Error for PositionedError {}

impl From<LoadError> for PositionedError {
    fn from(err: LoadError) -> Self {
        PositionedError::new(Stage::Load, err.position, err.message)
    }
}

impl From<LexError> for PositionedError {
    fn from(err: LexError) -> Self {
        PositionedError::new(Stage::Lex, err.position(), err.to_string())
    }
}

impl From<ParseError> for PositionedError {
    fn from(err: ParseError) -> Self {
        PositionedError::new(Stage::Parse, err.position(), err.to_string())
    }
}
