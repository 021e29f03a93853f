//! In-memory image of the record tree

use std::fmt;

/// Separator between an object's name and its class in `S` properties
/// (`"Body\x00\x01Model"`)
pub(crate) const NAME_CLASS_SEPARATOR: &str = "\u{0}\u{1}";

/// One typed property value
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Raw(Vec<u8>),
    BoolArray(Vec<bool>),
    I32Array(Vec<i32>),
    I64Array(Vec<i64>),
    F32Array(Vec<f32>),
    F64Array(Vec<f64>),
}

impl Property {
    /// Type code byte used on disk
    pub fn type_code(&self) -> u8 {
        match self {
            Self::Bool(_) => b'C',
            Self::I16(_) => b'Y',
            Self::I32(_) => b'I',
            Self::I64(_) => b'L',
            Self::F32(_) => b'F',
            Self::F64(_) => b'D',
            Self::String(_) => b'S',
            Self::Raw(_) => b'R',
            Self::BoolArray(_) => b'b',
            Self::I32Array(_) => b'i',
            Self::I64Array(_) => b'l',
            Self::F32Array(_) => b'f',
            Self::F64Array(_) => b'd',
        }
    }

    /// Any scalar integer (or bool) widened to `i64`
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Bool(v) => Some(v as i64),
            Self::I16(v) => Some(v as i64),
            Self::I32(v) => Some(v as i64),
            Self::I64(v) => Some(v),
            _ => None,
        }
    }

    /// Any numeric scalar widened to `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::F32(v) => Some(v as f64),
            Self::F64(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i32_slice(&self) -> Option<&[i32]> {
        match self {
            Self::I32Array(v) => Some(v),
            _ => None,
        }
    }

    /// Numeric array widened to `f64`
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            Self::F64Array(v) => Some(v.clone()),
            Self::F32Array(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Self::I32Array(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Self::I64Array(v) => Some(v.iter().map(|&x| x as f64).collect()),
            _ => None,
        }
    }

    /// Integer array widened to `i64`
    pub fn to_i64_vec(&self) -> Option<Vec<i64>> {
        match self {
            Self::I32Array(v) => Some(v.iter().map(|&x| x as i64).collect()),
            Self::I64Array(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// Element count for array properties
    pub fn array_len(&self) -> Option<usize> {
        match self {
            Self::BoolArray(v) => Some(v.len()),
            Self::I32Array(v) => Some(v.len()),
            Self::I64Array(v) => Some(v.len()),
            Self::F32Array(v) => Some(v.len()),
            Self::F64Array(v) => Some(v.len()),
            _ => None,
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{:?}", s.replace(NAME_CLASS_SEPARATOR, "::")),
            Self::Raw(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Self::BoolArray(v) => write!(f, "[bool; {}]", v.len()),
            Self::I32Array(v) => write!(f, "[i32; {}]", v.len()),
            Self::I64Array(v) => write!(f, "[i64; {}]", v.len()),
            Self::F32Array(v) => write!(f, "[f32; {}]", v.len()),
            Self::F64Array(v) => write!(f, "[f64; {}]", v.len()),
        }
    }
}

/// One record: name, ordered properties, ordered children
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub name: String,
    pub properties: Vec<Property>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn property(&self, index: usize) -> Option<&Property> {
        self.properties.get(index)
    }

    /// First child with the given name
    pub fn find_child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First property of the named child, e.g. `Vertices: *n { a: ... }`
    pub fn child_property(&self, name: &str) -> Option<&Property> {
        self.find_child(name)?.property(0)
    }

    /// Total record count of this subtree, including `self`
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Node::subtree_len).sum::<usize>()
    }

    /// Write an indented outline of the subtree
    pub fn write_outline(&self, out: &mut impl fmt::Write, depth: usize) -> fmt::Result {
        write!(out, "{:indent$}{}:", "", self.name, indent = depth * 2)?;
        for (i, property) in self.properties.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(out, "{sep}{property}")?;
        }
        writeln!(out)?;
        for child in &self.children {
            child.write_outline(out, depth + 1)?;
        }
        Ok(())
    }
}

/// Whole file: version plus top-level records
#[derive(Debug, Clone, PartialEq)]
pub struct FbxDocument {
    pub version: u32,
    pub nodes: Vec<Node>,
}

impl FbxDocument {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            nodes: Vec::new(),
        }
    }

    /// First top-level record with the given name
    pub fn find(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn record_count(&self) -> usize {
        self.nodes.iter().map(Node::subtree_len).sum()
    }

    pub fn outline(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            // Writing into a String cannot fail
            let _ = node.write_outline(&mut out, 0);
        }
        out
    }
}

impl Default for FbxDocument {
    fn default() -> Self {
        Self::new(crate::DEFAULT_VERSION)
    }
}

/// Split `"Name\x00\x01Class"` into its name part
pub(crate) fn object_name(raw: &str) -> &str {
    raw.split(NAME_CLASS_SEPARATOR).next().unwrap_or(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_widening() {
        assert_eq!(Property::I16(-3).as_i64(), Some(-3));
        assert_eq!(Property::F32(0.5).as_f64(), Some(0.5));
        assert_eq!(Property::I32(7).as_f64(), Some(7.0));
        assert_eq!(Property::String("x".into()).as_f64(), None);
        assert_eq!(
            Property::F32Array(vec![1.0, 2.0]).to_f64_vec(),
            Some(vec![1.0, 2.0])
        );
        assert_eq!(Property::I32Array(vec![1, -2]).to_i64_vec(), Some(vec![1, -2]));
    }

    #[test]
    fn test_object_name() {
        assert_eq!(object_name("Body\u{0}\u{1}Model"), "Body");
        assert_eq!(object_name("Plain"), "Plain");
    }

    #[test]
    fn test_outline() {
        let doc = FbxDocument {
            version: 7400,
            nodes: vec![Node::new("Objects").with_child(
                Node::new("Geometry")
                    .with_property(Property::I64(10))
                    .with_property(Property::F64Array(vec![0.0; 3])),
            )],
        };
        assert_eq!(doc.outline(), "Objects:\n  Geometry: 10, [f64; 3]\n");
        assert_eq!(doc.record_count(), 2);
    }
}
