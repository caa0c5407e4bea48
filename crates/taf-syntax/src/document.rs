//! Ordered key/value tree loaded from the YAML surface syntax.
//!
//! Every mapping key keeps the position of its first character so that the
//! tokenizer can derive indentation depth and diagnostics can point at the
//! exact source location. Keys stay in document order.

use crate::error::{LoadError, Position};
use serde_json::{Map, Number, Value};
use tracing::trace;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, ScanError, TScalarStyle};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Mapping(Mapping),
    Sequence(Sequence),
    Scalar(Scalar),
    Null(Position),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    pub entries: Vec<Entry>,
    pub position: Position,
    /// Written inline as `{k: v}` rather than as an indented block.
    pub flow: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: String,
    pub position: Position,
    pub value: Node,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub items: Vec<Node>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
    pub text: String,
    pub quoted: bool,
    pub position: Position,
}

impl Node {
    pub fn position(&self) -> Position {
        match self {
            Node::Mapping(m) => m.position,
            Node::Sequence(s) => s.position,
            Node::Scalar(s) => s.position,
            Node::Null(p) => *p,
        }
    }

    /// Short human name of the node shape, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Mapping(_) => "a mapping",
            Node::Sequence(_) => "a list",
            Node::Scalar(_) => "a scalar",
            Node::Null(_) => "nothing",
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Node::Mapping(m) => m.entries.is_empty(),
            Node::Sequence(s) => s.items.is_empty(),
            Node::Scalar(_) => false,
            Node::Null(_) => true,
        }
    }

    /// Converts the subtree into an order-preserving JSON value.
    ///
    /// Plain scalars that read as integers, floats or booleans become JSON
    /// numbers and booleans; quoted scalars always stay strings.
    pub fn to_json(&self) -> Value {
        match self {
            Node::Mapping(m) => {
                let mut map = Map::with_capacity(m.entries.len());
                for entry in &m.entries {
                    map.insert(entry.key.clone(), entry.value.to_json());
                }
                Value::Object(map)
            }
            Node::Sequence(s) => Value::Array(s.items.iter().map(Node::to_json).collect()),
            Node::Scalar(s) => s.to_json(),
            Node::Null(_) => Value::Null,
        }
    }
}

impl Scalar {
    fn to_json(&self) -> Value {
        if self.quoted {
            return Value::String(self.text.clone());
        }
        if let Ok(int) = self.text.parse::<i64>() {
            return Value::Number(int.into());
        }
        if let Ok(uint) = self.text.parse::<u64>() {
            return Value::Number(uint.into());
        }
        // integers wider than u64 would lose digits as floats
        if !is_integer_literal(&self.text)
            && let Ok(float) = self.text.parse::<f64>()
            && let Some(number) = Number::from_f64(float)
        {
            return Value::Number(number);
        }
        match self.text.as_str() {
            "true" | "True" | "TRUE" => Value::Bool(true),
            "false" | "False" | "FALSE" => Value::Bool(false),
            _ => Value::String(self.text.clone()),
        }
    }
}

/// A loaded script document. Owns the root node.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Node,
}

impl Document {
    pub fn root(&self) -> &Node {
        &self.root
    }
}

/// Loads `text` into a [`Document`].
///
/// The stream must hold a single YAML document. Aliases, non-scalar keys and
/// duplicate keys are rejected.
pub fn load(text: &str) -> Result<Document, LoadError> {
    let mut builder = TreeBuilder::default();
    let mut parser = Parser::new_from_str(text);
    parser
        .load(&mut builder, true)
        .map_err(|err| scan_error(&err))?;

    if let Some(err) = builder.error {
        return Err(err);
    }

    let root = builder
        .root
        .unwrap_or_else(|| Node::Null(Position::default()));
    trace!(kind = root.kind_name(), "document loaded");
    Ok(Document { root })
}

fn position_of(mark: &Marker) -> Position {
    Position::new(mark.line().saturating_sub(1), mark.col())
}

fn scan_error(err: &ScanError) -> LoadError {
    LoadError::new(err.info().to_string(), position_of(err.marker()))
}

fn is_integer_literal(text: &str) -> bool {
    let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn is_null(text: &str, plain: bool) -> bool {
    plain && matches!(text, "" | "~" | "null" | "Null" | "NULL")
}

enum Frame {
    Mapping {
        entries: Vec<Entry>,
        position: Position,
        flow: bool,
        pending_key: Option<(String, Position)>,
    },
    Sequence {
        items: Vec<Node>,
        position: Position,
    },
}

#[derive(Default)]
struct TreeBuilder {
    stack: Vec<Frame>,
    root: Option<Node>,
    documents: usize,
    error: Option<LoadError>,
}

impl TreeBuilder {
    fn fail(&mut self, message: impl Into<String>, position: Position) {
        if self.error.is_none() {
            self.error = Some(LoadError::new(message, position));
        }
    }

    fn awaiting_key(&self) -> bool {
        matches!(
            self.stack.last(),
            Some(Frame::Mapping {
                pending_key: None,
                ..
            })
        )
    }

    fn push_key(&mut self, key: String, position: Position) {
        let duplicate = match self.stack.last() {
            Some(Frame::Mapping { entries, .. }) => entries.iter().any(|entry| entry.key == key),
            _ => false,
        };
        if duplicate {
            self.fail(format!("duplicate key '{}'", key), position);
            return;
        }
        if let Some(Frame::Mapping {
            entries,
            position: start,
            flow,
            pending_key,
        }) = self.stack.last_mut()
        {
            // A block mapping is marked after its first key, a flow mapping at its `{`.
            if entries.is_empty() {
                if position <= *start {
                    *start = position;
                } else {
                    *flow = true;
                }
            }
            *pending_key = Some((key, position));
        }
    }

    fn push_node(&mut self, node: Node) {
        match self.stack.last_mut() {
            None => self.root = Some(node),
            Some(Frame::Sequence { items, .. }) => items.push(node),
            Some(Frame::Mapping {
                entries,
                pending_key,
                ..
            }) => {
                if let Some((key, position)) = pending_key.take() {
                    entries.push(Entry {
                        key,
                        position,
                        value: node,
                    });
                }
            }
        }
    }

    fn open(&mut self, frame: Frame, position: Position) {
        if self.awaiting_key() {
            self.fail("mapping keys must be scalars", position);
            return;
        }
        self.stack.push(frame);
    }

    fn close(&mut self) {
        let node = match self.stack.pop() {
            Some(Frame::Mapping {
                entries,
                position,
                flow,
                ..
            }) => Node::Mapping(Mapping {
                entries,
                position,
                flow,
            }),
            Some(Frame::Sequence { items, position }) => {
                Node::Sequence(Sequence { items, position })
            }
            None => return,
        };
        self.push_node(node);
    }
}

impl MarkedEventReceiver for TreeBuilder {
    fn on_event(&mut self, event: Event, mark: Marker) {
        if self.error.is_some() {
            return;
        }
        let position = position_of(&mark);

        match event {
            Event::DocumentStart { .. } => {
                self.documents += 1;
                if self.documents > 1 {
                    self.fail("a script must contain exactly one document", position);
                }
            }
            Event::Scalar(text, style, ..) => {
                let plain = matches!(style, TScalarStyle::Plain);
                if self.awaiting_key() {
                    self.push_key(text, position);
                } else if is_null(&text, plain) {
                    self.push_node(Node::Null(position));
                } else {
                    self.push_node(Node::Scalar(Scalar {
                        text,
                        quoted: !plain,
                        position,
                    }));
                }
            }
            Event::MappingStart(..) => self.open(
                Frame::Mapping {
                    entries: Vec::new(),
                    position,
                    flow: false,
                    pending_key: None,
                },
                position,
            ),
            Event::SequenceStart(..) => self.open(
                Frame::Sequence {
                    items: Vec::new(),
                    position,
                },
                position,
            ),
            Event::MappingEnd | Event::SequenceEnd => self.close(),
            Event::Alias(..) => self.fail("aliases are not supported in scripts", position),
            _ => {}
        }
    }
}
