//! Tagged value and ordered multimap shared by every other crate in this
//! workspace. `Variant` is the sole value-carrier; `Arguments` is the
//! ordered `(name, Variant)` store the CLI engine, harvester and repository
//! pass values through.

use std::fmt;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("packed buffer truncated at offset {offset}")]
    Truncated { offset: usize },
    #[error("packed entry name is not valid utf-8")]
    InvalidName,
    #[error("unknown packed value tag {0}")]
    UnknownTag(u8),
}

/// A tagged value. `View` holds a cheaply-cloned shared string, standing in
/// for the "borrowed-view" kind in the original design — Rust's borrow
/// checker makes a real zero-copy lifetime impractical to thread through an
/// owned `Arguments` store, so an `Arc<str>` gives the same "don't copy on
/// clone" property without a lifetime parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bytes(Vec<u8>),
    Str(String),
    View(Arc<str>),
}

impl Default for Variant {
    fn default() -> Self {
        Variant::Null
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Null => write!(f, ""),
            Variant::Bool(b) => write!(f, "{b}"),
            Variant::Int(i) => write!(f, "{i}"),
            Variant::UInt(u) => write!(f, "{u}"),
            Variant::Float(v) => write!(f, "{v}"),
            Variant::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Variant::Str(s) => write!(f, "{s}"),
            Variant::View(s) => write!(f, "{s}"),
        }
    }
}

impl Variant {
    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Variant::Bool(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Variant::Int(_) | Variant::UInt(_) | Variant::Float(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Variant::Str(_) | Variant::View(_))
    }

    /// Coercing accessor: numbers stringify, bool becomes "true"/"false",
    /// null becomes an empty string.
    pub fn as_string(&self) -> String {
        self.to_string()
    }

    /// Coercing accessor to an unsigned integer. Negative ints saturate to 0,
    /// floats truncate, non-numeric values yield 0.
    pub fn as_uint(&self) -> u64 {
        match self {
            Variant::Null => 0,
            Variant::Bool(b) => *b as u64,
            Variant::Int(i) => (*i).max(0) as u64,
            Variant::UInt(u) => *u,
            Variant::Float(v) => v.max(0.0) as u64,
            Variant::Bytes(_) => 0,
            Variant::Str(s) => s.trim().parse::<u64>().unwrap_or(0),
            Variant::View(s) => s.trim().parse::<u64>().unwrap_or(0),
        }
    }

    /// Coercing accessor to bool. Non-zero numbers and non-empty, non-"false"
    /// strings are true.
    pub fn as_bool(&self) -> bool {
        match self {
            Variant::Null => false,
            Variant::Bool(b) => *b,
            Variant::Int(i) => *i != 0,
            Variant::UInt(u) => *u != 0,
            Variant::Float(v) => *v != 0.0,
            Variant::Bytes(b) => !b.is_empty(),
            Variant::Str(s) => !s.is_empty() && s != "false" && s != "0",
            Variant::View(s) => !s.is_empty() && s.as_ref() != "false" && s.as_ref() != "0",
        }
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::Str(v.to_string())
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::Str(v)
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Bool(v)
    }
}

impl From<i64> for Variant {
    fn from(v: i64) -> Self {
        Variant::Int(v)
    }
}

impl From<u64> for Variant {
    fn from(v: u64) -> Self {
        Variant::UInt(v)
    }
}

/// Ordered `(name, Variant)` pairs allowing duplicate names. Insertion order
/// is preserved; lookups for a missing name yield `Variant::Null` rather than
/// an `Option`, matching the contract's "coercing" style.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    pairs: Vec<(String, Variant)>,
}

impl Arguments {
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<Variant>) {
        self.pairs.push((name.into(), value.into()));
    }

    /// Overwrites the first pair named `name`, or appends if none exists.
    pub fn set_first(&mut self, name: &str, value: impl Into<Variant>) {
        if let Some(pair) = self.pairs.iter_mut().find(|(n, _)| n == name) {
            pair.1 = value.into();
        } else {
            self.append(name.to_string(), value);
        }
    }

    /// The first variant bound to `name`, or `Variant::Null` if absent.
    pub fn get_first(&self, name: &str) -> &Variant {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .unwrap_or(&Variant::Null)
    }

    /// Returns the k-th (0-based) pair whose name equals `name`.
    pub fn find_argument(&self, name: &str, k: usize) -> &Variant {
        self.pairs
            .iter()
            .filter(|(n, _)| n == name)
            .nth(k)
            .map(|(_, v)| v)
            .unwrap_or(&Variant::Null)
    }

    /// All variants bound to `name`, in insertion order.
    pub fn iterate_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Variant> + 'a {
        self.pairs
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iterate_all(&self) -> impl Iterator<Item = (&str, &Variant)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pairs.iter().any(|(n, _)| n == name)
    }

    /// Removes every pair named `name`; returns the number removed.
    pub fn remove_by_name(&mut self, name: &str) -> usize {
        let before = self.pairs.len();
        self.pairs.retain(|(n, _)| n != name);
        before - self.pairs.len()
    }

    /// Appends every pair of `other` after this one's existing pairs,
    /// preserving `other`'s internal order.
    pub fn merge(&mut self, other: &Arguments) {
        self.pairs.extend(other.pairs.iter().cloned());
    }

    /// Packs into a flat byte buffer: `u32` pair count, then for each pair a
    /// length-prefixed name, a one-byte type tag, and a length-prefixed (or
    /// fixed-width, for numbers) payload. Used for zero-copy handoff across
    /// an IPC boundary external to this workspace.
    pub fn to_packed_buffer(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.pairs.len() as u32).to_le_bytes());
        for (name, value) in &self.pairs {
            write_lp_bytes(&mut out, name.as_bytes());
            write_variant(&mut out, value);
        }
        out
    }

    pub fn from_packed_buffer(buf: &[u8]) -> Result<Arguments, Error> {
        let mut cursor = 0usize;
        let count = read_u32(buf, &mut cursor)? as usize;
        let mut pairs = Vec::with_capacity(count);
        for _ in 0..count {
            let name_bytes = read_lp_bytes(buf, &mut cursor)?;
            let name = String::from_utf8(name_bytes).map_err(|_| Error::InvalidName)?;
            let value = read_variant(buf, &mut cursor)?;
            pairs.push((name, value));
        }
        Ok(Arguments { pairs })
    }
}

fn write_lp_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

fn write_variant(out: &mut Vec<u8>, value: &Variant) {
    match value {
        Variant::Null => out.push(0),
        Variant::Bool(b) => {
            out.push(1);
            out.push(*b as u8);
        }
        Variant::Int(i) => {
            out.push(2);
            out.extend_from_slice(&i.to_le_bytes());
        }
        Variant::UInt(u) => {
            out.push(3);
            out.extend_from_slice(&u.to_le_bytes());
        }
        Variant::Float(v) => {
            out.push(4);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Variant::Bytes(b) => {
            out.push(5);
            write_lp_bytes(out, b);
        }
        Variant::Str(s) => {
            out.push(6);
            write_lp_bytes(out, s.as_bytes());
        }
        Variant::View(s) => {
            out.push(6);
            write_lp_bytes(out, s.as_bytes());
        }
    }
}

fn read_u32(buf: &[u8], cursor: &mut usize) -> Result<u32, Error> {
    let bytes = buf.get(*cursor..*cursor + 4).ok_or(Error::Truncated { offset: *cursor })?;
    *cursor += 4;
    Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
}

fn read_lp_bytes(buf: &[u8], cursor: &mut usize) -> Result<Vec<u8>, Error> {
    let len = read_u32(buf, cursor)? as usize;
    let bytes = buf.get(*cursor..*cursor + len).ok_or(Error::Truncated { offset: *cursor })?.to_vec();
    *cursor += len;
    Ok(bytes)
}

fn read_variant(buf: &[u8], cursor: &mut usize) -> Result<Variant, Error> {
    let tag = *buf.get(*cursor).ok_or(Error::Truncated { offset: *cursor })?;
    *cursor += 1;
    match tag {
        0 => Ok(Variant::Null),
        1 => {
            let b = *buf.get(*cursor).ok_or(Error::Truncated { offset: *cursor })?;
            *cursor += 1;
            Ok(Variant::Bool(b != 0))
        }
        2 => {
            let bytes = buf.get(*cursor..*cursor + 8).ok_or(Error::Truncated { offset: *cursor })?;
            *cursor += 8;
            Ok(Variant::Int(i64::from_le_bytes(bytes.try_into().unwrap())))
        }
        3 => {
            let bytes = buf.get(*cursor..*cursor + 8).ok_or(Error::Truncated { offset: *cursor })?;
            *cursor += 8;
            Ok(Variant::UInt(u64::from_le_bytes(bytes.try_into().unwrap())))
        }
        4 => {
            let bytes = buf.get(*cursor..*cursor + 8).ok_or(Error::Truncated { offset: *cursor })?;
            *cursor += 8;
            Ok(Variant::Float(f64::from_le_bytes(bytes.try_into().unwrap())))
        }
        5 => Ok(Variant::Bytes(read_lp_bytes(buf, cursor)?)),
        6 => {
            let bytes = read_lp_bytes(buf, cursor)?;
            Ok(Variant::Str(String::from_utf8(bytes).map_err(|_| Error::InvalidName)?))
        }
        _ => Err(Error::UnknownTag(tag)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_lookup_preserve_order() {
        let mut args = Arguments::new();
        args.append("source", "./src");
        args.append("pattern", "TODO");
        args.append("pattern", "FIXME");

        assert_eq!(args.get_first("pattern").as_string(), "TODO");
        assert_eq!(args.find_argument("pattern", 1).as_string(), "FIXME");
        assert!(args.get_first("missing").is_null());

        let named: Vec<_> = args.iterate_named("pattern").map(|v| v.as_string()).collect();
        assert_eq!(named, vec!["TODO", "FIXME"]);
    }

    #[test]
    fn remove_and_merge() {
        let mut a = Arguments::new();
        a.append("x", 1i64);
        a.append("x", 2i64);
        a.append("y", true);
        assert_eq!(a.remove_by_name("x"), 2);
        assert!(!a.contains("x"));

        let mut b = Arguments::new();
        b.append("z", "hi");
        a.merge(&b);
        assert_eq!(a.get_first("z").as_string(), "hi");
    }

    #[test]
    fn packed_buffer_roundtrip() {
        let mut args = Arguments::new();
        args.append("flag", true);
        args.append("count", 42u64);
        args.append("name", "cleaner");
        let packed = args.to_packed_buffer();
        let restored = Arguments::from_packed_buffer(&packed).unwrap();
        assert_eq!(args, restored);
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let mut args = Arguments::new();
        args.append("name", "cleaner");
        let packed = args.to_packed_buffer();
        let result = Arguments::from_packed_buffer(&packed[..packed.len() - 2]);
        assert!(matches!(result, Err(Error::Truncated { .. })));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u32.to_le_bytes());
        write_lp_bytes(&mut buf, b"x");
        buf.push(200);
        let result = Arguments::from_packed_buffer(&buf);
        assert!(matches!(result, Err(Error::UnknownTag(200))));
    }

    #[test]
    fn variant_coercion() {
        assert_eq!(Variant::Str("7".into()).as_uint(), 7);
        assert!(Variant::Int(-3).as_bool());
        assert_eq!(Variant::Int(-3).as_uint(), 0);
        assert!(!Variant::Str("".into()).as_bool());
    }
}
