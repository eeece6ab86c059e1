//! Distinguished names.
//!
//! A [`Dn`] is a sequence of RDNs, most specific first
//! (`cn=jdoe,ou=people,dc=example,dc=com`). Parsing understands backslash
//! escapes (`\,` and hex pairs such as `\2C`), quoted values and multi-valued
//! RDNs joined with `+`. Equality, hashing and ancestry use a normalized form:
//! attribute types and values are lower-cased, trimmed and unescaped.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, DirectoryResult};

// ============================================================================
// RDN
// ============================================================================

/// One component of a distinguished name.
#[derive(Debug, Clone)]
pub struct Rdn {
    raw: String,
    normalized: String,
    attr: String,
    value: String,
}

impl Rdn {
    fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        let mut avas = Vec::new();
        let mut first: Option<(String, String)> = None;

        for part in split_unescaped(raw, &['+'])? {
            let (attr, value) = split_ava(part)?;
            let value = unescape_value(value.trim())?;
            if first.is_none() {
                first = Some((attr.to_string(), value.clone()));
            }
            avas.push(format!(
                "{}={}",
                attr.to_ascii_lowercase(),
                value.trim().to_lowercase()
            ));
        }
        avas.sort();

        let (attr, value) = first.ok_or_else(|| format!("empty RDN in '{raw}'"))?;
        Ok(Self {
            raw: raw.to_string(),
            normalized: avas.join("+"),
            attr,
            value,
        })
    }

    /// Attribute type of the (first) value, as written.
    #[must_use]
    pub fn attr(&self) -> &str {
        &self.attr
    }

    /// Unescaped (first) value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Normalized form used for comparisons.
    #[must_use]
    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}

impl PartialEq for Rdn {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for Rdn {}

impl Hash for Rdn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// ============================================================================
// DN
// ============================================================================

/// A distinguished name. The empty DN is the directory root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dn {
    rdns: Vec<Rdn>,
}

impl Dn {
    /// The root (empty) DN.
    #[must_use]
    pub const fn root() -> Self {
        Self { rdns: Vec::new() }
    }

    /// Parses a DN. A blank string is the root DN.
    pub fn parse(s: &str) -> DirectoryResult<Self> {
        if s.trim().is_empty() {
            return Ok(Self::root());
        }
        let rdns = split_unescaped(s, &[',', ';'])
            .and_then(|parts| parts.into_iter().map(Rdn::parse).collect::<Result<Vec<_>, _>>())
            .map_err(|reason| DirectoryError::InvalidDn {
                dn: s.to_string(),
                reason,
            })?;
        Ok(Self { rdns })
    }

    /// Returns true for the root DN.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.rdns.is_empty()
    }

    /// Number of RDNs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rdns.len()
    }

    /// Returns true for the root DN.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    /// The most specific RDN.
    #[must_use]
    pub fn rdn(&self) -> Option<&Rdn> {
        self.rdns.first()
    }

    /// RDNs, most specific first.
    pub fn rdns(&self) -> impl Iterator<Item = &Rdn> {
        self.rdns.iter()
    }

    /// The parent entry, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            rdns: self.rdns[1..].to_vec(),
        })
    }

    /// Checks whether this DN equals `ancestor` or lies below it.
    ///
    /// Every DN is a descendant of the root DN.
    #[must_use]
    pub fn is_descendant_of(&self, ancestor: &Self) -> bool {
        ancestor.rdns.len() <= self.rdns.len()
            && self.rdns[self.rdns.len() - ancestor.rdns.len()..] == ancestor.rdns[..]
    }

    /// Returns this DN if it already lies under `base`, otherwise this DN
    /// appended to `base` (treating it as relative).
    #[must_use]
    pub fn rebase_onto(&self, base: &Self) -> Self {
        if self.is_descendant_of(base) {
            return self.clone();
        }
        let mut rdns = self.rdns.clone();
        rdns.extend(base.rdns.iter().cloned());
        Self { rdns }
    }

    /// Creates a child of this DN from a single RDN string such as `ou=eng`.
    pub fn join(&self, child_rdn: &str) -> DirectoryResult<Self> {
        let rdn = Rdn::parse(child_rdn).map_err(|reason| DirectoryError::InvalidDn {
            dn: child_rdn.to_string(),
            reason,
        })?;
        let mut rdns = Vec::with_capacity(self.rdns.len() + 1);
        rdns.push(rdn);
        rdns.extend(self.rdns.iter().cloned());
        Ok(Self { rdns })
    }

    /// Creates the child `attr=value`, escaping `value`.
    pub fn child(&self, attr: &str, value: &str) -> DirectoryResult<Self> {
        self.join(&format!("{attr}={}", escape_rdn_value(value)))
    }

    /// The trailing `DC=` components, which name the naming context.
    #[must_use]
    pub fn domain_root(&self) -> Self {
        let start = self
            .rdns
            .iter()
            .rposition(|rdn| !rdn.attr.eq_ignore_ascii_case("dc"))
            .map_or(0, |i| i + 1);
        Self {
            rdns: self.rdns[start..].to_vec(),
        }
    }
}

/// Escapes an attribute value for use in a DN string (RFC 4514).
#[must_use]
pub fn escape_rdn_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '#' if i == 0 => escaped.push_str("\\#"),
            ' ' if i == 0 || i == last => escaped.push_str("\\ "),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(c),
        }
    }
    escaped
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rdn) in self.rdns.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{rdn}")?;
        }
        Ok(())
    }
}

impl FromStr for Dn {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Dn {
    type Error = DirectoryError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Dn> for String {
    fn from(dn: Dn) -> Self {
        dn.to_string()
    }
}

// ============================================================================
// Parsing helpers
// ============================================================================

/// Splits on any separator that is neither escaped nor quoted.
fn split_unescaped<'a>(s: &'a str, separators: &[char]) -> Result<Vec<&'a str>, String> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    let mut quoted = false;

    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => quoted = !quoted,
            c if !quoted && separators.contains(&c) => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if escaped {
        return Err("trailing backslash".to_string());
    }
    if quoted {
        return Err("unterminated quoted value".to_string());
    }
    parts.push(&s[start..]);
    Ok(parts)
}

fn split_ava(ava: &str) -> Result<(&str, &str), String> {
    let (attr, value) = ava
        .split_once('=')
        .ok_or_else(|| format!("missing '=' in '{}'", ava.trim()))?;
    let attr = attr.trim();
    if attr.is_empty() {
        return Err(format!("missing attribute type in '{}'", ava.trim()));
    }
    Ok((attr, value))
}

fn unescape_value(value: &str) -> Result<String, String> {
    if let Some(inner) = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    {
        return unescape_value(inner);
    }

    let mut bytes = Vec::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        let Some(next) = chars.next() else {
            return Err("trailing backslash".to_string());
        };
        match chars.peek().copied() {
            Some(second) if next.is_ascii_hexdigit() && second.is_ascii_hexdigit() => {
                let pair = format!("{next}{second}");
                let byte = u8::from_str_radix(&pair, 16).map_err(|e| e.to_string())?;
                bytes.push(byte);
                chars.next();
            }
            _ => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(next.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    String::from_utf8(bytes).map_err(|_| "escaped value is not valid UTF-8".to_string())
}
