//! Distinguished name parsing and identity resolution
//!
//! Parses string DNs (RFC 4514, with the legacy `;` separator and quoted
//! values still accepted) and extracts the login name a bind DN carries.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors raised while resolving the identity of a bind DN
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnError {
    #[error("DN {dn:?} is not under base DN {base:?}")]
    OutOfScope { dn: String, base: String },

    #[error("Malformed DN at position {position}: {reason}")]
    Parse { position: usize, reason: String },

    #[error("No {0} attribute in DN")]
    AttributeNotFound(String),

    #[error("Empty {0} attribute value in DN")]
    EmptyValue(String),

    #[error("Multiple {0} attributes in one RDN")]
    Ambiguous(String),
}

/// One `type=value` pair of an RDN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeTypeAndValue {
    pub attr_type: String,
    pub value: String,
}

/// A relative distinguished name; more than one attribute when multi-valued
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelativeDn {
    pub attributes: Vec<AttributeTypeAndValue>,
}

/// A parsed distinguished name, most specific RDN first
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DistinguishedName {
    pub rdns: Vec<RelativeDn>,
}

impl DistinguishedName {
    pub fn parse(input: &str) -> Result<Self, DnError> {
        Parser::new(input).parse()
    }

    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }
}

impl FromStr for DistinguishedName {
    type Err = DnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Login name extracted from a bind DN.
///
/// Only produced by [`resolve_identity`], so it is always non-empty and
/// belongs to a DN under the provider's base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity(String);

impl ResolvedIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ResolvedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the value of `identity_attribute` from `dn`.
///
/// The scope check is a plain string suffix test against `base_dn`; no DN
/// normalization takes place. RDNs are scanned most specific first and the
/// first one carrying the attribute wins.
pub fn resolve_identity(
    dn: &str,
    base_dn: &str,
    identity_attribute: &str,
) -> Result<ResolvedIdentity, DnError> {
    if !dn.ends_with(base_dn) {
        return Err(DnError::OutOfScope {
            dn: dn.to_string(),
            base: base_dn.to_string(),
        });
    }

    let parsed = DistinguishedName::parse(dn)?;

    for rdn in &parsed.rdns {
        let mut matching = rdn
            .attributes
            .iter()
            .filter(|a| a.attr_type.eq_ignore_ascii_case(identity_attribute));

        match (matching.next(), matching.next()) {
            (Some(_), Some(_)) => {
                return Err(DnError::Ambiguous(identity_attribute.to_string()));
            }
            (Some(attr), None) if attr.value.is_empty() => {
                return Err(DnError::EmptyValue(identity_attribute.to_string()));
            }
            (Some(attr), None) => return Ok(ResolvedIdentity(attr.value.clone())),
            (None, _) => continue,
        }
    }

    Err(DnError::AttributeNotFound(identity_attribute.to_string()))
}

// ============================================================================
// Parser
// ============================================================================

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

/// What ended an attribute value
enum Terminator {
    /// `+`: another attribute of the same RDN follows
    Plus,
    /// `,` or `;`: a new RDN follows
    Separator,
    End,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> DnError {
        DnError::Parse {
            position: self.pos,
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(' ') {
            self.pos += 1;
        }
    }

    fn parse(mut self) -> Result<DistinguishedName, DnError> {
        let mut dn = DistinguishedName::default();

        self.skip_spaces();
        if self.peek().is_none() {
            return Ok(dn);
        }

        let mut rdn = RelativeDn::default();
        loop {
            let attr_type = self.parse_type()?;
            self.skip_spaces();
            let (value, terminator) = self.parse_value()?;
            rdn.attributes.push(AttributeTypeAndValue { attr_type, value });

            match terminator {
                Terminator::Plus => {}
                Terminator::Separator => dn.rdns.push(std::mem::take(&mut rdn)),
                Terminator::End => {
                    dn.rdns.push(rdn);
                    return Ok(dn);
                }
            }
        }
    }

    fn parse_type(&mut self) -> Result<String, DnError> {
        self.skip_spaces();
        let start = self.pos;

        let mut attr_type = String::new();
        loop {
            match self.peek() {
                Some('=') => break,
                Some(',') | Some(';') | Some('+') | None => {
                    return Err(self.error("expected '=' after attribute type"));
                }
                Some(c) => {
                    attr_type.push(c);
                    self.pos += 1;
                }
            }
        }
        // consume '='
        self.pos += 1;

        let attr_type = attr_type.trim_end().to_string();
        if !is_valid_type(&attr_type) {
            return Err(DnError::Parse {
                position: start,
                reason: format!("invalid attribute type {:?}", attr_type),
            });
        }
        Ok(attr_type)
    }

    fn parse_value(&mut self) -> Result<(String, Terminator), DnError> {
        match self.peek() {
            Some('#') => self.parse_hex_value(),
            Some('"') => self.parse_quoted_value(),
            _ => self.parse_string_value(),
        }
    }

    fn terminator(&mut self) -> Result<Terminator, DnError> {
        match self.peek() {
            None => Ok(Terminator::End),
            Some('+') => {
                self.pos += 1;
                Ok(Terminator::Plus)
            }
            Some(',') | Some(';') => {
                self.pos += 1;
                Ok(Terminator::Separator)
            }
            Some(c) => Err(self.error(format!("unexpected character {:?}", c))),
        }
    }

    fn parse_string_value(&mut self) -> Result<(String, Terminator), DnError> {
        let mut bytes = Vec::new();
        // unescaped spaces at the end of the value are not part of it
        let mut trailing_spaces = 0;

        while let Some(c) = self.peek() {
            match c {
                ',' | ';' | '+' => break,
                '\\' => {
                    self.pos += 1;
                    self.parse_escape(&mut bytes)?;
                    trailing_spaces = 0;
                }
                ' ' => {
                    bytes.push(b' ');
                    trailing_spaces += 1;
                    self.pos += 1;
                }
                _ => {
                    let mut buf = [0u8; 4];
                    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    trailing_spaces = 0;
                    self.pos += 1;
                }
            }
        }

        bytes.truncate(bytes.len() - trailing_spaces);
        let value = String::from_utf8(bytes).map_err(|_| self.error("value is not valid UTF-8"))?;
        let terminator = self.terminator()?;
        Ok((value, terminator))
    }

    fn parse_quoted_value(&mut self) -> Result<(String, Terminator), DnError> {
        // opening quote
        self.pos += 1;
        let mut bytes = Vec::new();

        loop {
            match self.peek() {
                None => return Err(self.error("unterminated quoted value")),
                Some('"') => {
                    self.pos += 1;
                    break;
                }
                Some('\\') => {
                    self.pos += 1;
                    self.parse_escape(&mut bytes)?;
                }
                Some(c) => {
                    let mut buf = [0u8; 4];
                    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    self.pos += 1;
                }
            }
        }

        self.skip_spaces();
        let value = String::from_utf8(bytes).map_err(|_| self.error("value is not valid UTF-8"))?;
        let terminator = self.terminator()?;
        Ok((value, terminator))
    }

    /// `#` followed by the hex encoding of a BER value
    fn parse_hex_value(&mut self) -> Result<(String, Terminator), DnError> {
        let start = self.pos;
        // '#'
        self.pos += 1;

        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if !c.is_ascii_hexdigit() {
                break;
            }
            digits.push(c);
            self.pos += 1;
        }
        self.skip_spaces();

        let ber = hex::decode(&digits).map_err(|e| DnError::Parse {
            position: start,
            reason: format!("invalid hex value: {}", e),
        })?;
        let value = decode_ber_string(&ber).ok_or_else(|| DnError::Parse {
            position: start,
            reason: "invalid BER encoded value".to_string(),
        })?;

        let terminator = self.terminator()?;
        Ok((value, terminator))
    }

    /// Decode the character(s) after a backslash into `out`
    fn parse_escape(&mut self, out: &mut Vec<u8>) -> Result<(), DnError> {
        let Some(first) = self.peek() else {
            return Err(self.error("dangling escape at end of DN"));
        };

        if first.is_ascii_hexdigit() {
            let second = self
                .chars
                .get(self.pos + 1)
                .copied()
                .filter(|c| c.is_ascii_hexdigit());
            if let Some(second) = second {
                let pair: String = [first, second].iter().collect();
                let byte = u8::from_str_radix(&pair, 16)
                    .map_err(|_| self.error("invalid hex escape"))?;
                out.push(byte);
                self.pos += 2;
                return Ok(());
            }
        }

        // any other escaped character stands for itself
        let mut buf = [0u8; 4];
        out.extend_from_slice(first.encode_utf8(&mut buf).as_bytes());
        self.pos += 1;
        Ok(())
    }
}

/// Attribute types are descriptors (`cn`, `sAMAccountName`) or numeric OIDs
fn is_valid_type(attr_type: &str) -> bool {
    let mut chars = attr_type.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {
            attr_type.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        }
        Some(c) if c.is_ascii_digit() => {
            !attr_type.ends_with('.')
                && !attr_type.contains("..")
                && attr_type.chars().all(|c| c.is_ascii_digit() || c == '.')
        }
        _ => false,
    }
}

/// Content of a primitive BER TLV interpreted as UTF-8
fn decode_ber_string(ber: &[u8]) -> Option<String> {
    let (&_tag, rest) = ber.split_first()?;
    let (&len_byte, rest) = rest.split_first()?;

    let (len, content) = if len_byte & 0x80 == 0 {
        (len_byte as usize, rest)
    } else {
        let count = (len_byte & 0x7f) as usize;
        if count == 0 || count > 4 || rest.len() < count {
            return None;
        }
        let len = rest[..count]
            .iter()
            .fold(0usize, |acc, b| (acc << 8) | *b as usize);
        (len, &rest[count..])
    };

    if content.len() != len {
        return None;
    }
    String::from_utf8(content.to_vec()).ok()
}
