//! The scope chain `#each` loops push and pop frames onto (spec.md §4.D).
//!
//! Nothing here ever mutates the caller's data: a frame borrows a
//! [`Value`] by clone-on-push, and lookups only ever read.

use crate::value::{Record, Value};
use dtx_directive::{Path, PathSegment};

#[derive(Debug, Clone)]
struct Frame {
    this: Value,
    /// `Some` only for frames pushed by `#each`.
    loop_meta: Option<LoopMeta>,
}

#[derive(Debug, Clone, Copy)]
struct LoopMeta {
    index: usize,
    first: bool,
    last: bool,
    count: usize,
}

pub struct Scope {
    frames: Vec<Frame>,
}

impl Scope {
    pub fn new(root: Record) -> Self {
        Self {
            frames: vec![Frame {
                this: Value::Record(root),
                loop_meta: None,
            }],
        }
    }

    /// Pushes a loop iteration frame. Call [`Scope::pop`] when the
    /// iteration's body has been walked.
    pub fn push_iteration(&mut self, item: Value, index: usize, count: usize) {
        self.frames.push(Frame {
            this: item,
            loop_meta: Some(LoopMeta {
                index,
                first: index == 0,
                last: index + 1 == count,
                count,
            }),
        });
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    /// Resolves a parsed path against the current scope chain, returning
    /// [`Value::Null`] for anything unresolved rather than erroring —
    /// missing data renders as empty text, per spec.md's closed-grammar
    /// design note.
    pub fn resolve(&self, path: &Path) -> Value {
        if path.segments.is_empty() {
            return Value::Null;
        }

        let innermost = match self.frames.last() {
            Some(f) => f,
            None => return Value::Null,
        };

        match &path.segments[0] {
            PathSegment::Field(name) if name == "this" => {
                follow(innermost.this.clone(), &path.segments[1..])
            }
            PathSegment::Field(name) if name == "parent" => {
                let parent = self.frames.get(self.frames.len().saturating_sub(2));
                match parent {
                    Some(f) => follow(f.this.clone(), &path.segments[1..]),
                    None => Value::Null,
                }
            }
            PathSegment::Field(name) if is_loop_meta_name(name) => {
                match innermost.loop_meta {
                    Some(meta) => loop_meta_value(&meta, name),
                    None => Value::Null,
                }
            }
            PathSegment::Field(name) => {
                for frame in self.frames.iter().rev() {
                    if let Value::Record(rec) = &frame.this {
                        if let Some(v) = rec.get(name) {
                            return follow(v.clone(), &path.segments[1..]);
                        }
                    }
                }
                Value::Null
            }
            PathSegment::Index(_) => follow(innermost.this.clone(), &path.segments),
        }
    }
}

fn is_loop_meta_name(name: &str) -> bool {
    matches!(name, "index" | "first" | "last" | "count")
}

fn loop_meta_value(meta: &LoopMeta, name: &str) -> Value {
    match name {
        "index" => Value::Number(meta.index as f64),
        "first" => Value::Bool(meta.first),
        "last" => Value::Bool(meta.last),
        "count" => Value::Number(meta.count as f64),
        _ => Value::Null,
    }
}

/// Resolves a dotted field path (e.g. `"amount"` or `"address.zip"`)
/// against a single value, independent of any scope chain — used by the
/// aggregate formatters (`sum:field`, `avg:field`, ...) to reach into each
/// list element before coercing it to a number.
pub fn resolve_field_path(value: Value, path: &str) -> Value {
    if path.is_empty() {
        return value;
    }
    let segments: Vec<PathSegment> = path
        .split('.')
        .map(|s| PathSegment::Field(s.to_string()))
        .collect();
    follow(value, &segments)
}

fn follow(mut value: Value, segments: &[PathSegment]) -> Value {
    for segment in segments {
        value = match (&value, segment) {
            (Value::Record(rec), PathSegment::Field(name)) => {
                rec.get(name).cloned().unwrap_or(Value::Null)
            }
            (Value::List(items), PathSegment::Index(i)) => index_into(items, *i),
            (Value::Styled(inner, _), _) => follow((**inner).clone(), std::slice::from_ref(segment)),
            _ => Value::Null,
        };
    }
    value
}

fn index_into(items: &[Value], i: i64) -> Value {
    if i < 0 {
        return Value::Null;
    }
    items.get(i as usize).cloned().unwrap_or(Value::Null)
}
