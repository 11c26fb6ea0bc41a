//! PDF object types.
//!
//! The object model is a closed sum type. Dictionaries keep insertion order so
//! that a file written back out keeps the key layout it was read with.
//! References are plain `{id, gen}` data; dereferencing goes through a
//! [`Session`](crate::document::Session).

use std::fmt;

/// Dictionary representation: name keys in insertion order.
pub type Dict = indexmap::IndexMap<String, Object>;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// Literal or hexadecimal string
    String(PdfString),
    /// Name (starting with /)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (key-value pairs)
    Dictionary(Dict),
    /// Stream (dictionary + raw, still filtered data)
    Stream {
        /// Stream dictionary
        dict: Dict,
        /// Stream data
        data: bytes::Bytes,
    },
    /// Indirect object reference
    Reference(ObjectRef),
    /// Indirect object: a numbered top-level record
    Indirect {
        /// Object number and generation
        id: ObjectRef,
        /// Object content
        object: Box<Object>,
    },
    /// Legacy container holding several objects back to back
    ObjectStreams(Vec<Object>),
}

/// String bytes plus the lexical form they were read from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PdfString {
    /// Decoded bytes
    pub bytes: Vec<u8>,
    /// Written as `<hex>` rather than `(literal)`
    pub hex: bool,
}

impl PdfString {
    /// A literal string.
    pub fn literal(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            hex: false,
        }
    }

    /// A hexadecimal string.
    pub fn hex(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            hex: true,
        }
    }
}

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

impl Object {
    /// Literal string object from bytes.
    pub fn string(bytes: impl Into<Vec<u8>>) -> Self {
        Object::String(PdfString::literal(bytes))
    }

    /// Hex string object from bytes.
    pub fn hex_string(bytes: impl Into<Vec<u8>>) -> Self {
        Object::String(PdfString::hex(bytes))
    }

    /// Name object.
    pub fn name(name: impl Into<String>) -> Self {
        Object::Name(name.into())
    }

    /// Get the type name of this object (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream { .. } => "Stream",
            Object::Reference(_) => "Reference",
            Object::Indirect { .. } => "Indirect",
            Object::ObjectStreams(_) => "ObjectStreams",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to cast to real number. Integers are widened.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Object::Real(r) => Some(*r),
            Object::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to cast to boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to string (bytes).
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(&s.bytes),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Strip an `Indirect` wrapper, returning the content.
    pub fn into_direct(self) -> Object {
        match self {
            Object::Indirect { object, .. } => *object,
            other => other,
        }
    }

    /// Content of an `Indirect` wrapper, or `self`.
    pub fn direct(&self) -> &Object {
        match self {
            Object::Indirect { object, .. } => object,
            other => other,
        }
    }

    /// Serialize to the on-disk lexical form.
    pub fn to_pdf_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write(&mut out);
        out
    }

    /// Append the on-disk lexical form to `out`.
    ///
    /// Streams are written with a `/Length` matching their data. Indirect
    /// objects are written as a complete `N G obj ... endobj` frame.
    pub fn write(&self, out: &mut Vec<u8>) {
        match self {
            Object::Null => out.extend_from_slice(b"null"),
            Object::Boolean(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
            Object::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
            Object::Real(r) => out.extend_from_slice(format_real(*r).as_bytes()),
            Object::String(s) => write_string(s, out),
            Object::Name(n) => write_name(n, out),
            Object::Array(items) => {
                out.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(b' ');
                    }
                    item.write(out);
                }
                out.push(b']');
            },
            Object::Dictionary(dict) => write_dict(dict, out),
            Object::Stream { dict, data } => {
                let mut dict = dict.clone();
                dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
                write_dict(&dict, out);
                out.extend_from_slice(b"\nstream\n");
                out.extend_from_slice(data);
                out.extend_from_slice(b"\nendstream");
            },
            Object::Reference(r) => out.extend_from_slice(r.to_string().as_bytes()),
            Object::Indirect { id, object } => {
                out.extend_from_slice(format!("{} {} obj\n", id.id, id.gen).as_bytes());
                object.write(out);
                out.extend_from_slice(b"\nendobj\n");
            },
            Object::ObjectStreams(objects) => {
                for (i, object) in objects.iter().enumerate() {
                    if i > 0 {
                        out.push(b' ');
                    }
                    object.write(out);
                }
            },
        }
    }
}

fn format_real(r: f64) -> String {
    if !r.is_finite() {
        return "0.0".to_string();
    }
    let s = r.to_string();
    // Keep a decimal point so the value reads back as a real
    if s.contains('.') {
        s
    } else {
        format!("{}.0", s)
    }
}

fn write_string(s: &PdfString, out: &mut Vec<u8>) {
    if s.hex {
        out.push(b'<');
        for b in &s.bytes {
            out.extend_from_slice(format!("{:02x}", b).as_bytes());
        }
        out.push(b'>');
        return;
    }
    out.push(b'(');
    for &b in &s.bytes {
        match b {
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x08 => out.extend_from_slice(b"\\b"),
            0x0C => out.extend_from_slice(b"\\f"),
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            },
            _ => out.push(b),
        }
    }
    out.push(b')');
}

/// Bytes that must be `#xx` escaped inside a name.
pub(crate) fn is_name_escaped(b: u8) -> bool {
    !(0x21..=0x7E).contains(&b)
        || matches!(b, b'#' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn write_name(name: &str, out: &mut Vec<u8>) {
    out.push(b'/');
    for &b in name.as_bytes() {
        if is_name_escaped(b) {
            out.extend_from_slice(format!("#{:02x}", b).as_bytes());
        } else {
            out.push(b);
        }
    }
}

fn write_dict(dict: &Dict, out: &mut Vec<u8>) {
    out.extend_from_slice(b"<<");
    for (key, value) in dict {
        write_name(key, out);
        // Names, strings, arrays and dicts are self-delimiting
        if !matches!(
            value,
            Object::Name(_) | Object::String(_) | Object::Array(_) | Object::Dictionary(_)
        ) {
            out.push(b' ');
        }
        value.write(out);
    }
    out.extend_from_slice(b">>");
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Null => write!(f, "null"),
            Object::Boolean(b) => write!(f, "{}", b),
            Object::Integer(i) => write!(f, "{}", i),
            Object::Real(r) => write!(f, "{}", format_real(*r)),
            Object::String(s) if s.hex => {
                write!(f, "<")?;
                for b in &s.bytes {
                    write!(f, "{:02x}", b)?;
                }
                write!(f, ">")
            },
            Object::String(s) => write!(f, "{:?}", String::from_utf8_lossy(&s.bytes)),
            Object::Name(n) => write!(f, "/{}", n),
            Object::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            },
            Object::Dictionary(dict) => {
                write!(f, "Dict(")?;
                for (k, v) in dict {
                    write!(f, "{:?}: {}, ", k, v)?;
                }
                write!(f, ")")
            },
            Object::Stream { dict, data } => {
                write!(f, "Stream(")?;
                for (k, v) in dict {
                    write!(f, "{:?}: {}, ", k, v)?;
                }
                write!(f, "{} bytes)", data.len())
            },
            Object::Reference(r) => write!(f, "Ref({} {})", r.id, r.gen),
            Object::Indirect { id, .. } => write!(f, "IObject:{}", id.id),
            Object::ObjectStreams(objects) => write!(f, "ObjStm({} objects)", objects.len()),
        }
    }
}
