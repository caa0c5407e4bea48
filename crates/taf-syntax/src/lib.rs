//! # taf-syntax
//!
//! Contextual tokenizer, grammar validator and syntax tree for taf test
//! scripts.
//!
//! ## Overview
//!
//! A taf script is a YAML document describing one test case:
//!
//! ```text
//! issue: login-42
//! markers: smoke ui
//! steps:
//!   open login page:
//!     use: browser.open
//!     input:
//!       url: /login
//!   submit:
//!     flaky: 3
//!     use: form.submit
//! ```
//!
//! - **Document**: loads the YAML text into an ordered tree with a position on every key
//! - **Lexer**: walks the tree and emits a flat token stream; a key is a keyword only
//!   at the indentation depths that keyword is defined for
//! - **Parser**: validates the stream against the script grammar and builds the AST
//! - **Compile**: chains the stages and reports the first failure as a [`PositionedError`]
//!
//! ## Architecture
//!
//! ```text
//! Source text
//!     ↓
//! document::load
//!     ↓
//! Document (ordered tree, positions per key)
//!     ↓
//! lexer::tokenize
//!     ↓
//! Vec<Token>
//!     ↓
//! parser::parse
//!     ↓
//! Script (AST)
//! ```
//!
//! ## Grammar
//!
//! ```text
//! script      := ISSUE VALUE markers? before? after? STEPS step+
//! markers     := MARKERS VALUE*
//! before      := BEFORE step*
//! after       := AFTER step*
//! step        := ID skip_env? skip? markers? flaky? parameterize?
//!                before? after? use? input? output?
//! skip_env    := SKIP_ENV VALUE
//! skip        := SKIP VALUE*
//! flaky       := FLAKY VALUE
//! parameterize:= (PARAMETERIZE | FOREACH) OBJECT
//! use         := USE VALUE
//! input       := INPUT param+
//! output      := OUTPUT param+
//! param       := OBJECT
//! ```
//!
//! ## Example
//!
//! ```rust
//! use taf_syntax::compile;
//!
//! let script = compile("issue: t1\nsteps:\n  s1:\n    use: call\n").expect("valid script");
//! assert_eq!(script.issue.id, "t1");
//! assert_eq!(script.steps[0].id, "s1");
//!
//! let err = compile("steps:\n  s1:\n").unwrap_err();
//! assert_eq!(err.to_string(), "line 0 column 0: parse error, unexpected keyword 'steps', expected ISSUE");
//! ```

pub mod ast;
pub mod compile;
pub mod document;
pub mod error;
pub mod lexer;
pub mod parser;

pub use ast::*;
pub use compile::{compile, compile_batch, compile_file, compile_with, tokens_with};
pub use document::{Document, Node, load};
pub use error::{LexError, LoadError, ParseError, Position, PositionedError, Stage};
pub use lexer::{Keyword, LexerConfig, Token, TokenKind, classify, tokenize, tokenize_with};
pub use parser::parse;
