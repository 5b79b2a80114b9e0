//! Stand-in for the structured-document value framework.
//!
//! The real value framework — typed values, catalogs, canonical text
//! serialization, and parsing — is an external collaborator that the rest of
//! this crate depends on only through the types in this module. What's here
//! is deliberately small: a closed `Value` enum and an insertion-ordered
//! `Catalog`, with a textual canonical encoding: bracketed `$key: value`
//! pairs, so two catalogs with the same logical content always serialize to
//! the same string regardless of what produced them, and a human can read a
//! persisted key or certificate file directly.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ErrorKind, NotaryError, Result};

/// A stable identifier for a notary key, unchanged across rotations.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag(String);

impl Tag {
    /// Generate a fresh random tag (20 random bytes, base-32 encoded).
    pub fn random() -> Self {
        let mut bytes = [0u8; 20];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let encoded = base32::encode(base32::Alphabet::RFC4648 { padding: false }, &bytes);
        Tag(format!("#{encoded}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A monotonically increasing version counter.
///
/// Richer version strings (`v1`, `v1.2`, ...) are possible; the notary core
/// only ever needs "did version increase across a rotation", so a single
/// increasing component is sufficient and keeps the ordering trivial to
/// reason about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version(pub u32);

impl Version {
    pub fn initial() -> Self {
        Version(1)
    }

    pub fn next(self) -> Self {
        Version(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A UTC instant, millisecond resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Moment(pub i64);

impl Moment {
    pub fn now() -> Self {
        Moment(chrono::Utc::now().timestamp_millis())
    }
}

/// A binary attribute. Canonical text wraps the base-32 form in single
/// quotes; callers that need the bare text form use [`Binary::to_base32`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binary(pub Vec<u8>);

impl Binary {
    pub fn to_base32(&self) -> String {
        base32::encode(base32::Alphabet::RFC4648 { padding: false }, &self.0)
    }

    pub fn from_base32(text: &str) -> Option<Self> {
        base32::decode(base32::Alphabet::RFC4648 { padding: false }, text).map(Binary)
    }
}

/// A parameterized type name, e.g. `/bali/notary/Certificate/v1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Name(pub String);

impl Name {
    pub fn new(s: impl Into<String>) -> Self {
        Name(s.into())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The closed set of typed values a notary artifact's attributes can hold.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    None,
    Text(String),
    Tag(Tag),
    Moment(Moment),
    Binary(Binary),
    Name(Name),
    Version(Version),
    Catalog(Catalog),
}

impl Value {
    /// `NONE`, the sentinel used for the first certificate's `$previous`
    /// slot and for an unsigned document's `$certificate` slot.
    pub const NONE: Value = Value::None;

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_tag(&self) -> Option<&Tag> {
        match self {
            Value::Tag(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_version(&self) -> Option<Version> {
        match self {
            Value::Version(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_moment(&self) -> Option<Moment> {
        match self {
            Value::Moment(m) => Some(*m),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&Binary> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Value::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_catalog(&self) -> Option<&Catalog> {
        match self {
            Value::Catalog(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Deterministic canonical textual form: `none`, a quoted string, a
    /// `#`-prefixed tag, a `<...>` RFC-3339 moment, a `'...'` base-32 binary,
    /// a bare `/...` name, a `v`-prefixed version, or a bracketed catalog.
    pub fn canonical_text(&self) -> String {
        match self {
            Value::None => "none".to_string(),
            Value::Text(s) => format!("\"{}\"", escape_text(s)),
            Value::Tag(t) => t.0.clone(),
            Value::Moment(m) => format!("<{}>", format_moment(*m)),
            Value::Binary(b) => format!("'{}'", b.to_base32()),
            Value::Name(n) => n.0.clone(),
            Value::Version(v) => v.to_string(),
            Value::Catalog(c) => c.canonical_text(),
        }
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.canonical_text().into_bytes()
    }

    /// Parse one value from the front of `input`, returning it along with
    /// whatever text follows it. The inverse of [`Value::canonical_text`].
    fn parse_prefix(input: &str) -> Option<(Value, &str)> {
        match input.chars().next()? {
            'n' => input.strip_prefix("none").map(|rest| (Value::None, rest)),
            '"' => parse_text(input),
            '#' => parse_tag(input),
            '<' => parse_moment(input),
            '\'' => parse_binary(input),
            '/' => parse_name(input),
            'v' => parse_version(input),
            '[' => Catalog::parse_prefix(input).map(|(c, rest)| (Value::Catalog(c), rest)),
            _ => None,
        }
    }

    /// Parse a single value that consumes the whole of `bytes` exactly.
    pub fn parse(bytes: &[u8]) -> Result<Value> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| NotaryError::new("value", "parse", ErrorKind::MalformedComponent))?;
        match Value::parse_prefix(text) {
            Some((value, rest)) if rest.is_empty() => Ok(value),
            _ => Err(NotaryError::new("value", "parse", ErrorKind::MalformedComponent)),
        }
    }
}

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape_text(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                '"' => out.push('"'),
                '\\' => out.push('\\'),
                'n' => out.push('\n'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

fn format_moment(m: Moment) -> String {
    Utc.timestamp_millis_opt(m.0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap())
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_text(input: &str) -> Option<(Value, &str)> {
    let rest = input.strip_prefix('"')?;
    let mut end = None;
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            chars.next()?;
        } else if c == '"' {
            end = Some(i);
            break;
        }
    }
    let end = end?;
    let text = unescape_text(&rest[..end])?;
    Some((Value::Text(text), &rest[end + 1..]))
}

fn is_base32_char(c: char) -> bool {
    c.is_ascii_uppercase() || ('2'..='7').contains(&c)
}

fn parse_tag(input: &str) -> Option<(Value, &str)> {
    let rest = input.strip_prefix('#')?;
    let end = rest.find(|c: char| !is_base32_char(c)).unwrap_or(rest.len());
    let (tag_text, after) = rest.split_at(end);
    Some((Value::Tag(Tag(format!("#{tag_text}"))), after))
}

fn parse_moment(input: &str) -> Option<(Value, &str)> {
    let rest = input.strip_prefix('<')?;
    let end = rest.find('>')?;
    let (text, after) = rest.split_at(end);
    let dt = DateTime::parse_from_rfc3339(text).ok()?;
    Some((Value::Moment(Moment(dt.timestamp_millis())), &after[1..]))
}

fn parse_binary(input: &str) -> Option<(Value, &str)> {
    let rest = input.strip_prefix('\'')?;
    let end = rest.find('\'')?;
    let (text, after) = rest.split_at(end);
    Binary::from_base32(text).map(|b| (Value::Binary(b), &after[1..]))
}

fn parse_name(input: &str) -> Option<(Value, &str)> {
    let end = input.find([',', ']']).unwrap_or(input.len());
    let (text, after) = input.split_at(end);
    Some((Value::Name(Name(text.to_string())), after))
}

fn parse_version(input: &str) -> Option<(Value, &str)> {
    let rest = input.strip_prefix('v')?;
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let (digits, after) = rest.split_at(end);
    if digits.is_empty() {
        return None;
    }
    let n: u32 = digits.parse().ok()?;
    Some((Value::Version(Version(n)), after))
}

/// An insertion-ordered mapping from symbolic attribute name (e.g.
/// `$protocol`) to [`Value`]. Canonical order is declaration order, not
/// sorted order: two catalogs built with attributes in a different order are
/// different documents.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Catalog {
    entries: Vec<(String, Value)>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog { entries: Vec::new() }
    }

    /// Append an attribute, preserving insertion order. Does not deduplicate;
    /// callers build each catalog from scratch so this never matters in
    /// practice, but `with` returns an owned builder-style value for it.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.entries.push((key.into(), value));
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// A copy of this catalog with every entry matching `key` removed. Used
    /// to strip `$signature` before verifying.
    pub fn without(&self, key: &str) -> Catalog {
        Catalog {
            entries: self.entries.iter().filter(|(k, _)| k != key).cloned().collect(),
        }
    }

    /// `[$key: value, $key: value, ...]`, keys and values in insertion order.
    pub fn canonical_text(&self) -> String {
        let mut out = String::from("[");
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(key);
            out.push_str(": ");
            out.push_str(&value.canonical_text());
        }
        out.push(']');
        out
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.canonical_text().into_bytes()
    }

    /// Parse a bracketed catalog off the front of `input`, returning it and
    /// whatever text follows. The inverse of [`Catalog::canonical_text`].
    fn parse_prefix(input: &str) -> Option<(Catalog, &str)> {
        let mut rest = input.strip_prefix('[')?;
        if let Some(after) = rest.strip_prefix(']') {
            return Some((Catalog { entries: Vec::new() }, after));
        }
        let mut entries = Vec::new();
        loop {
            rest = rest.strip_prefix('$')?;
            let colon = rest.find(':')?;
            let key = format!("${}", &rest[..colon]);
            rest = rest[colon + 1..].strip_prefix(' ')?;
            let (value, after) = Value::parse_prefix(rest)?;
            entries.push((key, value));
            rest = after;
            if let Some(after_comma) = rest.strip_prefix(", ") {
                rest = after_comma;
                continue;
            }
            let after_close = rest.strip_prefix(']')?;
            return Some((Catalog { entries }, after_close));
        }
    }

    /// Parse a whole-file catalog serialization.
    pub fn parse(bytes: &[u8]) -> Result<Catalog> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| NotaryError::new("value", "parse", ErrorKind::MalformedComponent))?;
        match Catalog::parse_prefix(text.trim_end_matches('\n')) {
            Some((catalog, rest)) if rest.is_empty() => Ok(catalog),
            _ => Err(NotaryError::new("value", "parse", ErrorKind::MalformedComponent)),
        }
    }
}
