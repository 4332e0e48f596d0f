//! Explanations for filled defaults, rendered as comments.

use serde_json::Value;

use crate::config_descriptor::OptionDescriptor;
use crate::config_types::{NESTED_KEY, Region};

const INDENT: &str = "  ";

/// Which branch a single rule took while computing a default. Borrows from
/// the rule it explains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultReason<'a> {
    Literal,
    Defined { option: &'a str },
    NotDefined { option: &'a str },
    Matched { option: &'a str, value: &'a Value },
    /// `tried` holds the `[match, result]` pairs that all missed.
    Otherwise { option: &'a str, tried: &'a [(Value, Value)] },
    NoValue { option: &'a str },
}

impl DefaultReason<'_> {
    fn explain(&self) -> Option<String> {
        let text = match self {
            DefaultReason::Literal => "Default value.".to_string(),
            DefaultReason::Defined { option } => format!("Default because `{option}` is defined."),
            DefaultReason::NotDefined { option } => {
                format!("Default because `{option}` is not defined.")
            }
            DefaultReason::Matched { option, value } => {
                format!("Default because `{option}` is {value}.")
            }
            DefaultReason::Otherwise { option, tried } => {
                let tried: Vec<String> = tried.iter().map(|(matched, _)| matched.to_string()).collect();
                format!("Default because `{option}` is none of {}.", tried.join(", "))
            }
            DefaultReason::NoValue { .. } => return None,
        };
        Some(text)
    }
}

/// A default the resolver wrote, with one reason per rule of its policy.
#[derive(Debug, Clone, Copy)]
pub struct AppliedDefault<'a> {
    pub descriptor: &'a OptionDescriptor,
    pub value: &'a Value,
    pub reasons: &'a [DefaultReason<'a>],
}

pub trait Annotator {
    /// Called once for every option the resolver fills.
    fn record_default(&mut self, applied: &AppliedDefault<'_>);

    /// Produces the annotated variant of a rendered document.
    fn annotate(&self, rendered: &str) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAnnotator;

impl Annotator for NoopAnnotator {
    fn record_default(&mut self, _applied: &AppliedDefault<'_>) {}

    fn annotate(&self, rendered: &str) -> String {
        rendered.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Note {
    region: Region,
    // JSON-quoted key followed by ':' as it appears in pretty output
    key_prefix: String,
    text: String,
}

/// Inserts a `//` comment above every filled key of a pretty-printed document.
#[derive(Debug, Clone, Default)]
pub struct CommentAnnotator {
    notes: Vec<Note>,
}

impl CommentAnnotator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    fn note_for(&self, region: Region, line: &str) -> Option<&Note> {
        self.notes
            .iter()
            .find(|note| note.region == region && line.starts_with(&note.key_prefix))
    }
}

impl Annotator for CommentAnnotator {
    fn record_default(&mut self, applied: &AppliedDefault<'_>) {
        let text: Vec<String> = applied.reasons.iter().filter_map(|reason| reason.explain()).collect();
        if text.is_empty() {
            return;
        }
        self.notes.push(Note {
            region: applied.descriptor.region(),
            key_prefix: format!("{}:", Value::from(applied.descriptor.name.as_str())),
            text: text.join(" "),
        });
    }

    fn annotate(&self, rendered: &str) -> String {
        let root_indent = INDENT;
        let nested_indent = INDENT.repeat(2);
        let nested_open = format!("{}: {{", Value::from(NESTED_KEY));

        let mut out = String::with_capacity(rendered.len());
        let mut in_nested = false;

        for line in rendered.lines() {
            let note = if let Some(rest) = line.strip_prefix(&nested_indent) {
                if in_nested && rest.starts_with('"') {
                    self.note_for(Region::Nested, rest).map(|note| (nested_indent.as_str(), note))
                } else {
                    None
                }
            } else if let Some(rest) = line.strip_prefix(root_indent) {
                if rest.starts_with(&nested_open) {
                    in_nested = !rest.ends_with('}') && !rest.ends_with("},");
                } else if rest.starts_with('}') {
                    in_nested = false;
                }
                if rest.starts_with('"') {
                    self.note_for(Region::Root, rest).map(|note| (root_indent, note))
                } else {
                    None
                }
            } else {
                None
            };

            if let Some((indent, note)) = note {
                out.push_str(indent);
                out.push_str("// ");
                out.push_str(&note.text);
                out.push('\n');
            }
            out.push_str(line);
            out.push('\n');
        }

        if !rendered.ends_with('\n') {
            out.pop();
        }
        out
    }
}
