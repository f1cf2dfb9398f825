//! Template source → [`Node`] list.
//!
//! Recognized markup:
//!
//! | Markup                  | Node                 |
//! |-------------------------|----------------------|
//! | `{{ user.name }}`       | [`Node::Output`]     |
//! | `{% include 'header' %}`| [`Node::Include`]    |
//! | anything else           | [`Node::Text`]       |

use thiserror::Error;

/// Errors produced while parsing template source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("output opened at byte {offset} is not closed with `}}}}`")]
    UnterminatedOutput { offset: usize },

    #[error("tag opened at byte {offset} is not closed with `%}}`")]
    UnterminatedTag { offset: usize },

    #[error("unknown tag `{name}`")]
    UnknownTag { name: String },

    #[error("invalid include markup `{markup}`: expected a quoted template name")]
    InvalidInclude { markup: String },

    #[error("invalid variable `{markup}`")]
    InvalidVariable { markup: String },
}

/// A parsed piece of template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Output(Variable),
    Include(IncludeTag),
}

/// A variable reference such as `user.address.city`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    name: String,
    lookups: Vec<String>,
}

impl Variable {
    fn parse(markup: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::InvalidVariable {
            markup: markup.to_owned(),
        };

        let mut segments = markup.split('.');
        let name = segments.next().filter(|s| is_identifier(s)).ok_or_else(invalid)?;
        let lookups = segments
            .map(|s| if is_identifier(s) { Ok(s.to_owned()) } else { Err(invalid()) })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.to_owned(),
            lookups,
        })
    }

    /// Top-level variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member lookups applied after the top-level name, in order.
    pub fn lookups(&self) -> &[String] {
        &self.lookups
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '?'))
}

/// An `{% include '<name>' %}` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeTag {
    // Quoted exactly as written, e.g. `'header'`.
    template_name: String,
    markup: String,
}

impl IncludeTag {
    fn parse(markup: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::InvalidInclude {
            markup: markup.to_owned(),
        };

        let quoted = markup
            .strip_prefix("include")
            .map(str::trim)
            .ok_or_else(invalid)?;

        let mut chars = quoted.chars();
        let (Some(open), Some(close)) = (chars.next(), chars.next_back()) else {
            return Err(invalid());
        };
        let inner = chars.as_str();
        if !matches!(open, '\'' | '"') || open != close || inner.is_empty() || inner.contains(open) {
            return Err(invalid());
        }

        Ok(Self {
            template_name: quoted.to_owned(),
            markup: markup.to_owned(),
        })
    }

    /// Template name with the quotes stripped.
    pub fn template_key(&self) -> &str {
        &self.template_name[1..self.template_name.len() - 1]
    }

    /// The tag re-emitted as template source, e.g. `{% include 'header' %}`.
    pub fn directive(&self) -> String {
        format!("{{% {} %}}", self.markup.trim())
    }
}

/// Parses template source into nodes.
///
/// # Errors
///
/// Any [`ParseError`]; unterminated markup reports the byte offset it opened at.
pub fn parse(source: &str) -> Result<Vec<Node>, ParseError> {
    let mut nodes = Vec::new();
    let mut pos = 0;

    while pos < source.len() {
        let rest = &source[pos..];
        let Some(start) = next_markup(rest) else {
            nodes.push(Node::Text(rest.to_owned()));
            break;
        };

        if start > 0 {
            nodes.push(Node::Text(rest[..start].to_owned()));
        }

        let offset = pos + start;
        let opened = &rest[start..];
        if opened.starts_with("{{") {
            let end = opened[2..]
                .find("}}")
                .ok_or(ParseError::UnterminatedOutput { offset })?;
            let markup = opened[2..2 + end].trim();
            nodes.push(Node::Output(Variable::parse(markup)?));
            pos = offset + 2 + end + 2;
        } else {
            let end = opened[2..]
                .find("%}")
                .ok_or(ParseError::UnterminatedTag { offset })?;
            let markup = opened[2..2 + end].trim();
            nodes.push(parse_tag(markup)?);
            pos = offset + 2 + end + 2;
        }
    }

    Ok(nodes)
}

// Byte index of the next `{{` or `{%`, whichever comes first.
fn next_markup(s: &str) -> Option<usize> {
    match (s.find("{{"), s.find("{%")) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn parse_tag(markup: &str) -> Result<Node, ParseError> {
    let name = markup.split_whitespace().next().unwrap_or_default();
    match name {
        "include" => Ok(Node::Include(IncludeTag::parse(markup)?)),
        _ => Err(ParseError::UnknownTag {
            name: name.to_owned(),
        }),
    }
}
