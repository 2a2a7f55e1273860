//! Command template parser.
//!
//! Matches one free-text command line (`Verb Key=Value ...`) against an ordered
//! set of templates and resolves it into a [`FieldMap`]. Template tokens are:
//! - `Name`: one input token (`Name=value` or a bare value)
//! - `<Name>`: one token validated against the enumeration `Name` (market, provider),
//!   accepting comma separated values
//! - `[Name]`: optional free text, may be bracketed to span several tokens
//!
//! Errors carry the character offset of the offending token.

use std::collections::HashMap;
use std::str::FromStr;

use crate::domain::error::ParseError;
use crate::domain::market::{legal_values, MarketId, ProviderId};

/// Key under which the matched verb is stored.
pub const CMD_KEY: &str = "cmd";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumKind {
    Market,
    Provider,
}

impl EnumKind {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "market" => Some(EnumKind::Market),
            "provider" => Some(EnumKind::Provider),
            _ => None,
        }
    }

    fn legal(self) -> String {
        match self {
            EnumKind::Market => legal_values::<MarketId>(),
            EnumKind::Provider => legal_values::<ProviderId>(),
        }
    }

    /// Canonical spelling of one value, `None` when it is not a member.
    fn canonical(self, value: &str) -> Option<String> {
        match self {
            EnumKind::Market => MarketId::from_str(value).ok().map(|v| v.to_string()),
            EnumKind::Provider => ProviderId::from_str(value).ok().map(|v| v.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateToken {
    Field(String),
    Enum { name: String, kind: EnumKind },
    FreeText(String),
}

impl TemplateToken {
    pub fn name(&self) -> &str {
        match self {
            TemplateToken::Field(name)
            | TemplateToken::Enum { name, .. }
            | TemplateToken::FreeText(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdTemplate {
    pub verb: String,
    pub tokens: Vec<TemplateToken>,
}

impl CmdTemplate {
    pub fn parse(template: &str) -> Result<Self, ParseError> {
        let mut parts = template.split_whitespace();
        let verb = parts
            .next()
            .ok_or_else(|| ParseError::new("empty template", 0))?
            .to_string();

        let mut tokens = Vec::new();
        for part in parts {
            let token = if let Some(name) = part.strip_prefix('<').and_then(|p| p.strip_suffix('>')) {
                let kind = EnumKind::from_name(name).ok_or_else(|| {
                    ParseError::new(format!("template '{verb}': unknown enumeration <{name}>"), 0)
                })?;
                TemplateToken::Enum {
                    name: name.to_string(),
                    kind,
                }
            } else if let Some(name) = part.strip_prefix('[').and_then(|p| p.strip_suffix(']')) {
                TemplateToken::FreeText(name.to_string())
            } else {
                TemplateToken::Field(part.to_string())
            };
            tokens.push(token);
        }

        Ok(CmdTemplate { verb, tokens })
    }
}

/// Ordered template table. Declaration order decides ties between verbs sharing a prefix.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    templates: Vec<CmdTemplate>,
}

impl TemplateSet {
    pub fn new(templates: &[&str]) -> Result<Self, ParseError> {
        let templates = templates
            .iter()
            .map(|t| CmdTemplate::parse(t))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TemplateSet { templates })
    }

    pub fn templates(&self) -> &[CmdTemplate] {
        &self.templates
    }

    pub fn verbs(&self) -> Vec<&str> {
        self.templates.iter().map(|t| t.verb.as_str()).collect()
    }

    /// First template whose verb starts with `verb` (case-insensitive).
    pub fn find(&self, verb: &str) -> Option<&CmdTemplate> {
        if verb.is_empty() {
            return None;
        }
        let verb = verb.to_ascii_lowercase();
        self.templates
            .iter()
            .find(|t| t.verb.to_ascii_lowercase().starts_with(&verb))
    }
}

/// Parsed command fields keyed by template field name, plus [`CMD_KEY`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    fields: HashMap<String, String>,
}

impl FieldMap {
    pub fn cmd(&self) -> &str {
        self.get(CMD_KEY).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: &str, value: String) {
        self.fields.insert(key.to_string(), value);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.remaining().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    /// Next whitespace delimited token and its start offset.
    fn next_token(&mut self) -> Option<(usize, &'a str)> {
        self.skip_whitespace();
        let rest = self.remaining();
        if rest.is_empty() {
            return None;
        }
        let len = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let start = self.pos;
        self.pos += len;
        Some((start, &rest[..len]))
    }

    /// Reads a bracketed value whose opening `[` is at `open`. The raw text
    /// between the brackets is returned with its internal whitespace intact.
    fn read_bracketed(&mut self, open: usize, first: &str) -> Result<String, ParseError> {
        if first.len() > 1 && first.ends_with(']') {
            return Ok(first[1..first.len() - 1].to_string());
        }
        loop {
            match self.next_token() {
                Some((_, token)) if token.ends_with(']') => {
                    let close = self.pos - 1;
                    return Ok(self.input[open + 1..close].to_string());
                }
                Some(_) => continue,
                None => {
                    return Err(ParseError::new("unterminated '[' in value", open));
                }
            }
        }
    }
}

fn missing_field(token: &TemplateToken, position: usize) -> ParseError {
    match token {
        TemplateToken::Enum { name, kind } => ParseError::new(
            format!("missing field '{name}' (one of: {})", kind.legal()),
            position,
        ),
        _ => ParseError::new(format!("missing field '{}'", token.name()), position),
    }
}

fn unknown_verb(verb: &str, templates: &TemplateSet, position: usize) -> ParseError {
    let known = templates.verbs().join(", ");
    if verb.is_empty() {
        ParseError::new(format!("empty command; known commands: {known}"), position)
    } else {
        ParseError::new(
            format!("unknown command '{verb}'; known commands: {known}"),
            position,
        )
    }
}

fn resolve_enum(
    name: &str,
    kind: EnumKind,
    value: &str,
    position: usize,
) -> Result<String, ParseError> {
    let mut canonical = Vec::new();
    for part in value.split(',') {
        match kind.canonical(part.trim()) {
            Some(v) => canonical.push(v),
            None => {
                return Err(ParseError::new(
                    format!(
                        "invalid value '{}' for {name} (one of: {})",
                        part.trim(),
                        kind.legal()
                    ),
                    position,
                ));
            }
        }
    }
    Ok(canonical.join(","))
}

pub fn parse(input: &str, templates: &TemplateSet) -> Result<FieldMap, ParseError> {
    let mut tokenizer = Tokenizer::new(input);

    let (verb_pos, verb) = tokenizer.next_token().unwrap_or((0, ""));
    let template = templates
        .find(verb)
        .ok_or_else(|| unknown_verb(verb, templates, verb_pos))?;

    let mut fields = FieldMap::default();
    fields.insert(CMD_KEY, template.verb.clone());

    for token in &template.tokens {
        let Some((start, raw)) = tokenizer.next_token() else {
            if let TemplateToken::FreeText(name) = token {
                fields.insert(name, String::new());
                continue;
            }
            return Err(missing_field(token, input.len()));
        };

        let (value_pos, value) = match raw.split_once('=') {
            Some((key, value)) if !raw.starts_with('[') => {
                if !key.eq_ignore_ascii_case(token.name()) {
                    return Err(ParseError::new(
                        format!("expected field '{}', found '{key}'", token.name()),
                        start,
                    ));
                }
                (start + key.len() + 1, value)
            }
            _ => (start, raw),
        };

        let value = if value.starts_with('[') {
            tokenizer.read_bracketed(value_pos, value)?
        } else {
            value.to_string()
        };

        let value = match token {
            TemplateToken::Enum { name, kind } => resolve_enum(name, *kind, &value, value_pos)?,
            _ => value,
        };
        fields.insert(token.name(), value);
    }

    if let Some((start, _)) = tokenizer.next_token() {
        return Err(ParseError::new(
            format!(
                "unexpected input after {}: '{}'",
                template.verb,
                &input[start..].trim_end()
            ),
            start,
        ));
    }

    Ok(fields)
}
