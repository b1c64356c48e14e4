//! Resource URI templates
//!
//! A template such as `kanban://boards/{board_id}/cards` compiles to an
//! anchored regex where every `{name}` placeholder captures exactly one
//! path segment. Optional segments, wildcards and query strings are not
//! supported.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use thiserror::Error;

/// Parameters extracted from a concrete URI, keyed by placeholder name.
pub type UriParams = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriTemplateError {
    #[error("unbalanced brace at byte {0} in URI template")]
    UnbalancedBrace(usize),

    #[error("invalid placeholder name {0:?} in URI template")]
    InvalidPlaceholder(String),

    #[error("failed to compile URI template: {0}")]
    Compile(String),
}

#[derive(Clone)]
pub struct UriTemplate {
    raw: String,
    regex: Regex,
    names: Vec<String>,
}

impl UriTemplate {
    pub fn parse(template: &str) -> Result<Self, UriTemplateError> {
        let mut pattern = String::with_capacity(template.len() + 8);
        let mut names = Vec::new();
        let mut literal = String::new();
        pattern.push('^');

        let mut chars = template.char_indices();
        while let Some((pos, c)) = chars.next() {
            match c {
                '{' => {
                    pattern.push_str(&regex::escape(&literal));
                    literal.clear();

                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(UriTemplateError::UnbalancedBrace(pos)),
                            c => name.push(c),
                        }
                    }
                    if !closed {
                        return Err(UriTemplateError::UnbalancedBrace(pos));
                    }
                    if !is_valid_name(&name) {
                        return Err(UriTemplateError::InvalidPlaceholder(name));
                    }

                    pattern.push_str("([^/]+)");
                    names.push(name);
                }
                '}' => return Err(UriTemplateError::UnbalancedBrace(pos)),
                c => literal.push(c),
            }
        }
        pattern.push_str(&regex::escape(&literal));
        pattern.push('$');

        let regex = Regex::new(&pattern).map_err(|e| UriTemplateError::Compile(e.to_string()))?;

        Ok(Self {
            raw: template.to_string(),
            regex,
            names,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn param_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_params(&self) -> bool {
        !self.names.is_empty()
    }

    pub fn is_match(&self, uri: &str) -> bool {
        self.regex.is_match(uri)
    }

    /// Match `uri` against the template and return the captured parameters.
    pub fn extract(&self, uri: &str) -> Option<UriParams> {
        let captures = self.regex.captures(uri)?;
        let params = self
            .names
            .iter()
            .enumerate()
            .filter_map(|(i, name)| {
                captures
                    .get(i + 1)
                    .map(|m| (name.clone(), m.as_str().to_string()))
            })
            .collect();
        Some(params)
    }
}

impl fmt::Debug for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UriTemplate").field(&self.raw).finish()
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for UriTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for UriTemplate {}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
