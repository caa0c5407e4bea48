mod steps;

use crate::ast::*;
use crate::error::{ParseError, Position};
use crate::lexer::{Keyword, Token, TokenKind};
use tracing::debug;

/// Single-pass grammar validator for the script token stream.
///
/// Every optional clause is decided on one token of lookahead. Failed probes
/// at the current position are collected so that an error can list every
/// terminal that would have been accepted there.
pub struct Parser {
    pub(super) tokens: Vec<Token>,
    pub(super) pos: usize,
    expected: Vec<&'static str>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            expected: Vec::new(),
        }
    }

    #[inline]
    pub(super) fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    #[inline]
    pub(super) fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned()?;
        self.pos += 1;
        self.expected.clear();
        Some(token)
    }

    pub(super) fn expecting(&mut self, terminal: &'static str) {
        if !self.expected.contains(&terminal) {
            self.expected.push(terminal);
        }
    }

    pub(super) fn unexpected(&self) -> ParseError {
        let expected = self.expected.clone();
        match self.peek() {
            Some(token) => ParseError::UnexpectedToken {
                found: token.kind.display_name(),
                expected,
                position: token.position,
            },
            None => ParseError::UnexpectedEnd {
                expected,
                position: self
                    .tokens
                    .last()
                    .map(|t| t.position)
                    .unwrap_or_default(),
            },
        }
    }

    pub(super) fn eat_keyword(&mut self, keyword: Keyword, depth: usize) -> Option<Token> {
        if self.peek().is_some_and(|t| t.is_keyword(keyword, depth)) {
            return self.advance();
        }
        self.expecting(keyword.terminal());
        None
    }

    pub(super) fn expect_keyword(
        &mut self,
        keyword: Keyword,
        depth: usize,
    ) -> Result<Token, ParseError> {
        self.eat_keyword(keyword, depth)
            .ok_or_else(|| self.unexpected())
    }

    pub(super) fn eat_value(&mut self) -> Option<(String, Position)> {
        if matches!(self.peek(), Some(Token { kind: TokenKind::Value(_), .. }))
            && let Some(Token {
                kind: TokenKind::Value(text),
                position,
                ..
            }) = self.advance()
        {
            return Some((text, position));
        }
        self.expecting("VALUE");
        None
    }

    pub(super) fn expect_value(&mut self) -> Result<(String, Position), ParseError> {
        self.eat_value().ok_or_else(|| self.unexpected())
    }

    /// Consumes `VALUE*`.
    pub(super) fn values(&mut self) -> Vec<(String, Position)> {
        let mut values = Vec::new();
        while let Some(value) = self.eat_value() {
            values.push(value);
        }
        values
    }

    pub(super) fn eat_object(&mut self) -> Option<Param> {
        if matches!(self.peek(), Some(Token { kind: TokenKind::Object(_), .. }))
            && let Some(Token {
                kind: TokenKind::Object(object),
                position,
                ..
            }) = self.advance()
        {
            return Some(Param { object, position });
        }
        self.expecting("OBJECT");
        None
    }

    pub(super) fn expect_object(&mut self) -> Result<Param, ParseError> {
        self.eat_object().ok_or_else(|| self.unexpected())
    }

    pub(super) fn at_identifier(&mut self, depth: usize) -> bool {
        let found = self
            .peek()
            .is_some_and(|t| matches!(t.kind, TokenKind::Identifier(_)) && t.depth == depth);
        if !found {
            self.expecting("ID");
        }
        found
    }

    fn finish(&self) -> Result<(), ParseError> {
        match self.peek() {
            Some(_) => Err(self.unexpected()),
            None => Ok(()),
        }
    }

    /// `script := ISSUE VALUE markers? before? after? STEPS step+`
    fn parse_script(&mut self) -> Result<Script, ParseError> {
        let issue_token = self.expect_keyword(Keyword::Issue, 0)?;
        let (id, issue_position) = self.expect_value()?;

        let markers = self.parse_markers(0);
        let before = self.parse_hooks(Keyword::Before, 0)?;
        let after = self.parse_hooks(Keyword::After, 0)?;

        self.expect_keyword(Keyword::Steps, 0)?;
        let steps = self.parse_steps(1)?;
        if steps.is_empty() {
            return Err(self.unexpected());
        }
        self.finish()?;

        Ok(Script {
            issue: Issue {
                id,
                position: issue_position,
            },
            markers,
            before,
            after,
            steps,
            position: issue_token.position,
        })
    }

    /// `markers := MARKERS VALUE*`, one name per value.
    pub(super) fn parse_markers(&mut self, depth: usize) -> Option<Markers> {
        let token = self.eat_keyword(Keyword::Markers, depth)?;
        let names: Vec<String> = self.values().into_iter().map(|(text, _)| text).collect();

        if names.is_empty() {
            return None;
        }
        Some(Markers {
            names,
            position: token.position,
        })
    }

    /// `before := BEFORE step*` and `after := AFTER step*`. An empty section is a no-op.
    pub(super) fn parse_hooks(
        &mut self,
        keyword: Keyword,
        depth: usize,
    ) -> Result<Option<Hooks>, ParseError> {
        let Some(token) = self.eat_keyword(keyword, depth) else {
            return Ok(None);
        };
        let steps = self.parse_steps(depth + 1)?;
        if steps.is_empty() {
            return Ok(None);
        }
        Ok(Some(Hooks {
            steps,
            position: token.position,
        }))
    }

    pub(super) fn parse_steps(&mut self, depth: usize) -> Result<Vec<Step>, ParseError> {
        let mut steps = Vec::with_capacity(8);
        while self.at_identifier(depth) {
            steps.push(self.parse_step(depth)?);
        }
        Ok(steps)
    }
}

/// Validates a token stream against the script grammar and builds the syntax tree.
pub fn parse(tokens: Vec<Token>) -> Result<Script, ParseError> {
    let mut parser = Parser::new(tokens);
    let script = parser.parse_script()?;
    debug!(
        issue = %script.issue.id,
        steps = script.steps.len(),
        "parsed script"
    );
    Ok(script)
}
