//! Brace template parsing and substitution.
//!
//! Generator commands, descriptions and output names are templates evaluated
//! against a [`Resolver`] when the generator runs.
//!
//! # Placeholder Formats
//!
//! - `{name}` - a named value
//! - `{name.attr}` or `{name[attr]}` - an attribute of a named value
//!
//! # Escaping
//!
//! `{{` and `}}` produce literal braces, so shell constructs such as
//! `${HOME}` are written `${{HOME}}`.
//!
//! # Example
//!
//! ```
//! use simba_lib::template::{parse, Placeholder, Segment};
//!
//! let segments = parse("{exe} -c {in} {env.CFLAGS}").unwrap();
//! assert_eq!(segments[0], Segment::Placeholder(Placeholder::new("exe")));
//! assert_eq!(segments[4], Segment::Placeholder(Placeholder::with_attr("env", "CFLAGS")));
//! ```

use std::fmt;

use thiserror::Error;

/// A parsed placeholder reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
  pub name: String,
  pub attr: Option<String>,
}

impl Placeholder {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      attr: None,
    }
  }

  pub fn with_attr(name: impl Into<String>, attr: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      attr: Some(attr.into()),
    }
  }
}

impl fmt::Display for Placeholder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.attr {
      Some(attr) => write!(f, "{{{}.{}}}", self.name, attr),
      None => write!(f, "{{{}}}", self.name),
    }
  }
}

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no placeholders)
  Literal(String),

  /// A placeholder to be resolved
  Placeholder(Placeholder),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
  #[error("unclosed placeholder at position {0}")]
  Unclosed(usize),

  #[error("single '}}' encountered at position {0}")]
  UnmatchedClose(usize),

  #[error("malformed placeholder: {0}")]
  Malformed(String),

  #[error("unknown placeholder: {0}")]
  Unknown(String),
}

/// Trait for resolving placeholder values.
pub trait Resolver {
  fn resolve(&self, placeholder: &Placeholder) -> Result<String, TemplateError>;
}

/// Parse a template into literal and placeholder segments.
pub fn parse(input: &str) -> Result<Vec<Segment>, TemplateError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    match ch {
      '{' => {
        if let Some((_, '{')) = chars.peek() {
          chars.next();
          literal.push('{');
          continue;
        }

        if !literal.is_empty() {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }

        let mut content = String::new();
        let mut found_close = false;
        for (_, c) in chars.by_ref() {
          if c == '}' {
            found_close = true;
            break;
          }
          content.push(c);
        }

        if !found_close {
          return Err(TemplateError::Unclosed(pos));
        }

        segments.push(Segment::Placeholder(parse_placeholder(&content)?));
      }
      '}' => match chars.peek() {
        Some((_, '}')) => {
          chars.next();
          literal.push('}');
        }
        _ => return Err(TemplateError::UnmatchedClose(pos)),
      },
      _ => literal.push(ch),
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Parse the content between `{` and `}`.
fn parse_placeholder(content: &str) -> Result<Placeholder, TemplateError> {
  let malformed = || TemplateError::Malformed(format!("'{{{content}}}'"));

  if let Some((name, rest)) = content.split_once('[') {
    let attr = rest.strip_suffix(']').ok_or_else(malformed)?;
    if !is_identifier(name) || attr.is_empty() || attr.contains(['[', ']']) {
      return Err(malformed());
    }
    return Ok(Placeholder::with_attr(name, attr));
  }

  match content.split_once('.') {
    Some((name, attr)) if is_identifier(name) && is_identifier(attr) => Ok(Placeholder::with_attr(name, attr)),
    Some(_) => Err(malformed()),
    None if is_identifier(content) => Ok(Placeholder::new(content)),
    None => Err(malformed()),
  }
}

fn is_identifier(s: &str) -> bool {
  let mut chars = s.chars();
  matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_') && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Parse and substitute in one step.
pub fn substitute(input: &str, resolver: &impl Resolver) -> Result<String, TemplateError> {
  let segments = parse(input)?;
  substitute_segments(&segments, resolver)
}

/// Substitute placeholders in pre-parsed segments.
pub fn substitute_segments(segments: &[Segment], resolver: &impl Resolver) -> Result<String, TemplateError> {
  let mut result = String::new();

  for segment in segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Placeholder(p) => result.push_str(&resolver.resolve(p)?),
    }
  }

  Ok(result)
}
