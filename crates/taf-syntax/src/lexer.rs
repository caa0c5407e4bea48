use crate::document::{Document, Entry, Mapping, Node};
use crate::error::{LexError, Position};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::trace;

pub const DEFAULT_INDENT_UNIT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Keyword {
    Issue,
    Markers,
    Before,
    After,
    Steps,
    SkipEnv,
    Skip,
    Flaky,
    Parameterize,
    Foreach,
    Use,
    Input,
    Output,
}

impl Keyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Issue => "issue",
            Keyword::Markers => "markers",
            Keyword::Before => "before",
            Keyword::After => "after",
            Keyword::Steps => "steps",
            Keyword::SkipEnv => "skip_env",
            Keyword::Skip => "skip",
            Keyword::Flaky => "flaky",
            Keyword::Parameterize => "parameterize",
            Keyword::Foreach => "foreach",
            Keyword::Use => "use",
            Keyword::Input => "input",
            Keyword::Output => "output",
        }
    }

    /// Grammar terminal name, as listed in expected-sets.
    pub fn terminal(&self) -> &'static str {
        match self {
            Keyword::Issue => "ISSUE",
            Keyword::Markers => "MARKERS",
            Keyword::Before => "BEFORE",
            Keyword::After => "AFTER",
            Keyword::Steps => "STEPS",
            Keyword::SkipEnv => "SKIP_ENV",
            Keyword::Skip => "SKIP",
            Keyword::Flaky => "FLAKY",
            Keyword::Parameterize => "PARAMETERIZE",
            Keyword::Foreach => "FOREACH",
            Keyword::Use => "USE",
            Keyword::Input => "INPUT",
            Keyword::Output => "OUTPUT",
        }
    }

    pub fn spec(&self) -> &'static KeywordSpec {
        &KEYWORDS[self.as_str()]
    }

    /// Whether this keyword is recognised at `depth`.
    pub fn allowed_at(&self, depth: usize) -> bool {
        self.spec().depths.contains(&depth)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a keyword's value must look like in the document tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Nested steps, or nothing.
    Mapping,
    /// A single scalar, or nothing.
    Scalar,
    /// A scalar or a list of scalars, or nothing.
    Scalars,
    /// Names: a scalar split on whitespace, or a list with one name per item.
    Names,
    /// A non-empty subtree emitted as one opaque token.
    Blob { mapping_only: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordSpec {
    pub keyword: Keyword,
    pub depths: &'static [usize],
    pub shape: Shape,
}

static KEYWORDS: Lazy<HashMap<&'static str, KeywordSpec>> = Lazy::new(|| {
    const TOP: &[usize] = &[0];
    const STEP: &[usize] = &[2, 4];
    const HOOKS: &[usize] = &[0, 2];
    const MARKERS: &[usize] = &[0, 2, 4];

    let table = [
        (Keyword::Issue, TOP, Shape::Scalar),
        (Keyword::Steps, TOP, Shape::Mapping),
        (Keyword::Markers, MARKERS, Shape::Names),
        (Keyword::Before, HOOKS, Shape::Mapping),
        (Keyword::After, HOOKS, Shape::Mapping),
        (Keyword::SkipEnv, STEP, Shape::Scalar),
        (Keyword::Skip, STEP, Shape::Scalars),
        (Keyword::Flaky, STEP, Shape::Scalar),
        (Keyword::Parameterize, STEP, Shape::Blob { mapping_only: false }),
        (Keyword::Foreach, STEP, Shape::Blob { mapping_only: false }),
        (Keyword::Use, STEP, Shape::Scalar),
        (Keyword::Input, STEP, Shape::Blob { mapping_only: true }),
        (Keyword::Output, STEP, Shape::Blob { mapping_only: true }),
    ];

    let mut m = HashMap::with_capacity(table.len());
    for (keyword, depths, shape) in table {
        m.insert(
            keyword.as_str(),
            KeywordSpec {
                keyword,
                depths,
                shape,
            },
        );
    }
    m
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Keyword(&'static KeywordSpec),
    Identifier,
}

/// Decides whether `key` at `depth` is a keyword or a plain identifier.
///
/// A key spelled like a keyword is only a keyword inside that keyword's
/// indentation domain.
pub fn classify(key: &str, depth: usize) -> Classification {
    match KEYWORDS.get(key) {
        Some(spec) if spec.depths.contains(&depth) => Classification::Keyword(spec),
        _ => Classification::Identifier,
    }
}

/// Static tokenizer settings. Immutable once built and safe to share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexerConfig {
    pub indent_unit: usize,
}

impl LexerConfig {
    pub fn with_indent_unit(indent_unit: usize) -> Self {
        Self {
            indent_unit: indent_unit.max(1),
        }
    }
}

impl Default for LexerConfig {
    fn default() -> Self {
        Self {
            indent_unit: DEFAULT_INDENT_UNIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TokenKind {
    Keyword(Keyword),
    Identifier(String),
    Value(String),
    Object(serde_json::Value),
}

impl TokenKind {
    /// Grammar terminal name.
    pub fn terminal(&self) -> &'static str {
        match self {
            TokenKind::Keyword(k) => k.terminal(),
            TokenKind::Identifier(_) => "ID",
            TokenKind::Value(_) => "VALUE",
            TokenKind::Object(_) => "OBJECT",
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            TokenKind::Keyword(k) => format!("keyword '{}'", k),
            TokenKind::Identifier(s) => format!("identifier '{}'", s),
            TokenKind::Value(s) => format!("value '{}'", s),
            TokenKind::Object(_) => "object".to_string(),
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Keyword(k) => write!(f, "{}", k.terminal()),
            TokenKind::Identifier(s) => write!(f, "ID({})", s),
            TokenKind::Value(s) => write!(f, "VALUE({})", s),
            TokenKind::Object(v) => write!(f, "OBJECT({})", v),
        }
    }
}

/// A token with the position of the key or value it came from and the
/// indentation depth of the key that owns it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
    pub depth: usize,
}

impl Token {
    pub fn new(kind: TokenKind, position: Position, depth: usize) -> Self {
        Self {
            kind,
            position,
            depth,
        }
    }

    pub fn is_keyword(&self, keyword: Keyword, depth: usize) -> bool {
        self.kind == TokenKind::Keyword(keyword) && self.depth == depth
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {}",
            self.position.line, self.position.column, self.kind
        )
    }
}

/// Tokenizes a loaded document with the default indentation unit.
pub fn tokenize(document: &Document) -> Result<Vec<Token>, LexError> {
    tokenize_with(document, &LexerConfig::default())
}

pub fn tokenize_with(document: &Document, config: &LexerConfig) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();

    match document.root() {
        Node::Mapping(root) if root.flow => {
            return Err(LexError::FlowMapping {
                key: "document".to_string(),
                position: root.position,
            });
        }
        Node::Mapping(root) => {
            let base_column = root
                .entries
                .first()
                .map(|entry| entry.position.column)
                .unwrap_or(0);
            let mut walker = Walker {
                indent_unit: config.indent_unit.max(1),
                base_column,
                tokens: &mut tokens,
            };
            walker.mapping(root, 0, Context::Body)?;
        }
        Node::Null(_) => {}
        other => {
            return Err(LexError::UnexpectedShape {
                key: "document".to_string(),
                expected: "a mapping",
                found: other.kind_name(),
                position: other.position(),
            });
        }
    }

    trace!(count = tokens.len(), "tokenized document");
    Ok(tokens)
}

/// Whether the keys of a mapping are step identifiers whose values must be step bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Steps,
    Body,
}

struct Walker<'a> {
    indent_unit: usize,
    base_column: usize,
    tokens: &'a mut Vec<Token>,
}

impl Walker<'_> {
    fn push(&mut self, kind: TokenKind, position: Position, depth: usize) {
        self.tokens.push(Token::new(kind, position, depth));
    }

    fn depth_of(&self, entry: &Entry, level: usize) -> Result<usize, LexError> {
        let column = entry.position.column;
        let offset = column
            .checked_sub(self.base_column)
            .filter(|offset| offset % self.indent_unit == 0)
            .ok_or_else(|| LexError::Misaligned {
                key: entry.key.clone(),
                indent_unit: self.indent_unit,
                position: entry.position,
            })?;

        let depth = offset / self.indent_unit;
        if depth != level {
            return Err(LexError::IndentMismatch {
                key: entry.key.clone(),
                expected: level,
                found: depth,
                position: entry.position,
            });
        }
        Ok(depth)
    }

    fn mapping(&mut self, mapping: &Mapping, level: usize, context: Context) -> Result<(), LexError> {
        for entry in &mapping.entries {
            let depth = self.depth_of(entry, level)?;

            match classify(&entry.key, depth) {
                Classification::Keyword(spec) => {
                    self.push(TokenKind::Keyword(spec.keyword), entry.position, depth);
                    self.keyword_value(spec, entry, depth)?;
                }
                Classification::Identifier => {
                    self.push(
                        TokenKind::Identifier(entry.key.clone()),
                        entry.position,
                        depth,
                    );
                    self.identifier_value(entry, depth, context)?;
                }
            }
        }
        Ok(())
    }

    fn keyword_value(
        &mut self,
        spec: &KeywordSpec,
        entry: &Entry,
        depth: usize,
    ) -> Result<(), LexError> {
        let value = &entry.value;

        match (spec.shape, value) {
            (_, Node::Null(_)) if !matches!(spec.shape, Shape::Blob { .. }) => Ok(()),

            (Shape::Mapping, Node::Mapping(m)) => self.nested(entry, m, depth + 1, Context::Steps),
            (Shape::Mapping, other) => Err(shape_error(entry, "a mapping of steps", other)),

            (Shape::Scalar, Node::Scalar(s)) => {
                self.push(TokenKind::Value(s.text.clone()), s.position, depth);
                Ok(())
            }
            (Shape::Scalar, other) => Err(shape_error(entry, "a scalar", other)),

            (Shape::Scalars, _) => self.scalars(entry, depth, false),
            (Shape::Names, _) => self.scalars(entry, depth, true),

            (Shape::Blob { .. }, value) if value.is_empty() => Err(LexError::EmptyObject {
                key: entry.key.clone(),
                position: entry.position,
            }),
            (Shape::Blob { .. }, Node::Scalar(_)) => {
                Err(shape_error(entry, "a mapping or a list", value))
            }
            (Shape::Blob { mapping_only: true }, Node::Sequence(_)) => {
                Err(shape_error(entry, "a mapping", value))
            }
            (Shape::Blob { .. }, value) => {
                self.push(TokenKind::Object(value.to_json()), value.position(), depth);
                Ok(())
            }
        }
    }

    fn identifier_value(
        &mut self,
        entry: &Entry,
        depth: usize,
        context: Context,
    ) -> Result<(), LexError> {
        match (&entry.value, context) {
            (Node::Mapping(m), _) => self.nested(entry, m, depth + 1, Context::Body),
            (Node::Null(_), _) => Ok(()),
            (other, Context::Steps) => Err(shape_error(entry, "a mapping of step clauses", other)),
            (_, Context::Body) => self.scalars(entry, depth, false),
        }
    }

    /// Recurses into a block mapping. Inline `{...}` mappings carry no
    /// indentation, so only blob sections may use them.
    fn nested(
        &mut self,
        entry: &Entry,
        mapping: &Mapping,
        level: usize,
        context: Context,
    ) -> Result<(), LexError> {
        if mapping.flow && !mapping.entries.is_empty() {
            return Err(LexError::FlowMapping {
                key: entry.key.clone(),
                position: mapping.position,
            });
        }
        self.mapping(mapping, level, context)
    }

    fn scalars(&mut self, entry: &Entry, depth: usize, split: bool) -> Result<(), LexError> {
        match &entry.value {
            Node::Null(_) => Ok(()),
            Node::Scalar(s) if split => {
                for name in s.text.split_whitespace() {
                    self.push(TokenKind::Value(name.to_string()), s.position, depth);
                }
                Ok(())
            }
            Node::Scalar(s) => {
                self.push(TokenKind::Value(s.text.clone()), s.position, depth);
                Ok(())
            }
            Node::Sequence(seq) => {
                for item in &seq.items {
                    match item {
                        Node::Scalar(s) => {
                            self.push(TokenKind::Value(s.text.clone()), s.position, depth)
                        }
                        Node::Null(_) => {}
                        other => {
                            return Err(LexError::UnexpectedShape {
                                key: entry.key.clone(),
                                expected: "a list of scalars",
                                found: other.kind_name(),
                                position: other.position(),
                            });
                        }
                    }
                }
                Ok(())
            }
            other @ Node::Mapping(_) => Err(shape_error(entry, "a scalar or a list of scalars", other)),
        }
    }
}

fn shape_error(entry: &Entry, expected: &'static str, found: &Node) -> LexError {
    LexError::UnexpectedShape {
        key: entry.key.clone(),
        expected,
        found: found.kind_name(),
        position: found.position(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::load;

    fn lex(source: &str) -> Vec<Token> {
        tokenize(&load(source).unwrap()).unwrap()
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_classify_respects_domain() {
        assert!(matches!(classify("use", 2), Classification::Keyword(_)));
        assert!(matches!(classify("use", 4), Classification::Keyword(_)));
        assert_eq!(classify("use", 1), Classification::Identifier);
        assert_eq!(classify("use", 0), Classification::Identifier);
        assert_eq!(classify("issue", 2), Classification::Identifier);
        assert_eq!(classify("login", 0), Classification::Identifier);
    }

    #[test]
    fn test_every_keyword_in_table() {
        for keyword in [
            Keyword::Issue,
            Keyword::Markers,
            Keyword::Before,
            Keyword::After,
            Keyword::Steps,
            Keyword::SkipEnv,
            Keyword::Skip,
            Keyword::Flaky,
            Keyword::Parameterize,
            Keyword::Foreach,
            Keyword::Use,
            Keyword::Input,
            Keyword::Output,
        ] {
            assert_eq!(keyword.spec().keyword, keyword);
            assert!(!keyword.spec().depths.is_empty());
        }
    }

    #[test]
    fn test_tokenize_steps() {
        let source = "issue: \"test case\"\n\nsteps:\n\n  1. test step:\n    use: none\n\n  2. test step:\n    use: none\n";
        let tokens = lex(source);

        assert_eq!(tokens[0].kind, TokenKind::Keyword(Keyword::Issue));
        assert_eq!(tokens[0].position, Position::new(0, 0));
        assert_eq!(tokens[1].kind, TokenKind::Value("test case".to_string()));
        assert_eq!(tokens[2].kind, TokenKind::Keyword(Keyword::Steps));
        assert_eq!(tokens[2].position, Position::new(2, 0));
        assert_eq!(tokens[3].kind, TokenKind::Identifier("1. test step".to_string()));
        assert_eq!(tokens[3].position, Position::new(4, 2));
        assert_eq!(tokens[3].depth, 1);
        assert_eq!(tokens[4].kind, TokenKind::Keyword(Keyword::Use));
        assert_eq!(tokens[4].position, Position::new(5, 4));
        assert_eq!(tokens[5].kind, TokenKind::Value("none".to_string()));
        assert_eq!(tokens[6].kind, TokenKind::Identifier("2. test step".to_string()));
        assert_eq!(tokens[7].kind, TokenKind::Keyword(Keyword::Use));
        assert_eq!(tokens[8].kind, TokenKind::Value("none".to_string()));
        assert_eq!(tokens.len(), 9);
    }

    #[test]
    fn test_value_carries_scalar_position() {
        let tokens = lex("issue: t1\n");
        assert_eq!(tokens[1].position, Position::new(0, 7));
    }

    #[test]
    fn test_bare_keyword_emits_no_value() {
        let tokens = kinds("issue: t\nafter:\nsteps:\n  s1:\n");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Keyword(Keyword::Issue),
                TokenKind::Value("t".to_string()),
                TokenKind::Keyword(Keyword::After),
                TokenKind::Keyword(Keyword::Steps),
                TokenKind::Identifier("s1".to_string()),
            ]
        );
    }

    #[test]
    fn test_input_is_single_object() {
        let tokens = kinds("issue: t\nsteps:\n  s1:\n    input:\n      p:\n        env: value\n      q: 1\n");
        assert_eq!(tokens.len(), 6);
        assert_eq!(tokens[4], TokenKind::Keyword(Keyword::Input));
        assert_eq!(
            tokens[5],
            TokenKind::Object(serde_json::json!({"p": {"env": "value"}, "q": 1}))
        );
    }

    #[test]
    fn test_blob_keywords_not_recursed() {
        // keys inside the payload look like keywords but stay opaque
        let tokens = kinds("issue: t\nsteps:\n  s1:\n    parameterize:\n      use: x\n      steps: y\n");
        assert_eq!(tokens.len(), 6);
        assert_eq!(
            tokens[5],
            TokenKind::Object(serde_json::json!({"use": "x", "steps": "y"}))
        );
    }

    #[test]
    fn test_foreach_accepts_list() {
        let tokens = kinds("issue: t\nsteps:\n  s1:\n    foreach: [1, 2]\n");
        assert_eq!(tokens[4], TokenKind::Keyword(Keyword::Foreach));
        assert_eq!(tokens[5], TokenKind::Object(serde_json::json!([1, 2])));
    }

    #[test]
    fn test_markers_list_yields_values() {
        let tokens = kinds("issue: t\nmarkers: [smoke, slow]\nsteps:\n  s1:\n");
        assert_eq!(tokens[2], TokenKind::Keyword(Keyword::Markers));
        assert_eq!(tokens[3], TokenKind::Value("smoke".to_string()));
        assert_eq!(tokens[4], TokenKind::Value("slow".to_string()));
    }

    #[test]
    fn test_markers_scalar_split_into_names() {
        let tokens = lex("issue: t\nmarkers: smoke  slow\nsteps:\n  s1:\n");
        assert_eq!(tokens[3].kind, TokenKind::Value("smoke".to_string()));
        assert_eq!(tokens[4].kind, TokenKind::Value("slow".to_string()));
        assert_eq!(tokens[4].position, Position::new(1, 9));
        assert_eq!(tokens[5].kind, TokenKind::Keyword(Keyword::Steps));
    }

    #[test]
    fn test_markers_list_item_kept_whole() {
        let tokens = kinds("issue: t\nmarkers:\n  - slow test\n  - smoke\nsteps:\n  s1:\n");
        assert_eq!(tokens[3], TokenKind::Value("slow test".to_string()));
        assert_eq!(tokens[4], TokenKind::Value("smoke".to_string()));
    }

    #[test]
    fn test_skip_reason_not_split() {
        let tokens = kinds("issue: t\nsteps:\n  s1:\n    skip: not on ci\n");
        assert_eq!(tokens[5], TokenKind::Value("not on ci".to_string()));
    }

    #[test]
    fn test_object_token_at_first_key() {
        let tokens = lex("issue: t\nsteps:\n  s1:\n    input:\n      p: v\n");
        assert_eq!(tokens[5].kind, TokenKind::Object(serde_json::json!({"p": "v"})));
        assert_eq!(tokens[5].position, Position::new(4, 6));
    }

    #[test]
    fn test_inline_object_at_brace() {
        let tokens = lex("issue: t\nsteps:\n  s1:\n    input: {p: v}\n");
        assert_eq!(tokens[5].position, Position::new(3, 11));
    }

    #[test]
    fn test_error_inline_step_body() {
        let err = tokenize(&load("issue: t\nsteps:\n  s1: {use: call}\n").unwrap()).unwrap_err();
        match &err {
            LexError::FlowMapping { key, position } => {
                assert_eq!(key, "s1");
                assert_eq!(*position, Position::new(2, 6));
            }
            other => panic!("Expected FlowMapping, got {:?}", other),
        }
        assert!(err.to_string().contains("only input, output, parameterize and foreach"));
    }

    #[test]
    fn test_error_inline_document() {
        let err = tokenize(&load("{issue: t, steps: {s1: }}\n").unwrap()).unwrap_err();
        assert!(matches!(err, LexError::FlowMapping { .. }));
    }

    #[test]
    fn test_keyword_outside_domain_is_identifier() {
        let tokens = kinds("issue: t\nsteps:\n  use:\n    use: call\n");
        assert_eq!(tokens[2], TokenKind::Keyword(Keyword::Steps));
        assert_eq!(tokens[3], TokenKind::Identifier("use".to_string()));
        assert_eq!(tokens[4], TokenKind::Keyword(Keyword::Use));
    }

    #[test]
    fn test_tokenize_is_deterministic() {
        let source = "issue: t\nmarkers: a b\nsteps:\n  s1:\n    skip: why\n    input:\n      p: v\n";
        let document = load(source).unwrap();
        assert_eq!(tokenize(&document).unwrap(), tokenize(&document).unwrap());
    }

    #[test]
    fn test_whole_document_indented() {
        let source = "\n    issue: t\n    steps:\n        s1:\n            use: call\n";
        let tokens = tokenize_with(&load(source).unwrap(), &LexerConfig::with_indent_unit(4)).unwrap();
        assert_eq!(tokens[3].kind, TokenKind::Identifier("s1".to_string()));
        assert_eq!(tokens[4].kind, TokenKind::Keyword(Keyword::Use));
    }

    #[test]
    fn test_error_misaligned_key() {
        let err = tokenize(&load("issue: t\nsteps:\n   s1:\n").unwrap()).unwrap_err();
        assert!(matches!(err, LexError::Misaligned { .. }));
        assert_eq!(err.position(), Position::new(2, 3));
    }

    #[test]
    fn test_error_wrong_indent_unit() {
        let err = tokenize(&load("issue: t\nsteps:\n    s1:\n").unwrap()).unwrap_err();
        assert!(matches!(
            err,
            LexError::IndentMismatch {
                expected: 1,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_error_scalar_before_hook() {
        let err = tokenize(&load("issue: t\nbefore: wait\nsteps:\n  s1:\n").unwrap()).unwrap_err();
        assert!(matches!(err, LexError::UnexpectedShape { .. }));
        assert_eq!(err.position(), Position::new(1, 8));
    }

    #[test]
    fn test_error_empty_input() {
        let err = tokenize(&load("issue: t\nsteps:\n  s1:\n    input:\n").unwrap()).unwrap_err();
        assert!(matches!(err, LexError::EmptyObject { .. }));
        assert_eq!(err.position(), Position::new(3, 4));
    }

    #[test]
    fn test_error_input_list() {
        let err = tokenize(&load("issue: t\nsteps:\n  s1:\n    input: [a]\n").unwrap()).unwrap_err();
        assert!(matches!(err, LexError::UnexpectedShape { expected: "a mapping", .. }));
    }

    #[test]
    fn test_error_root_not_mapping() {
        let err = tokenize(&load("- a\n- b\n").unwrap()).unwrap_err();
        assert!(matches!(err, LexError::UnexpectedShape { .. }));
    }

    #[test]
    fn test_empty_document_has_no_tokens() {
        assert!(lex("").is_empty());
    }
}
