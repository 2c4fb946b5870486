use std::fmt;

/// Opaque id of an entry in the engine's object store.
///
/// Ids are issued by the engine, strictly increasing from `0`, and never reused within a
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u64);

impl ObjectId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for ObjectId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// The recursive wire value exchanged between driver and engine.
///
/// `Data` never carries object *contents*, only ids; the invariant that every `Object`
/// id is live at the moment of transmission is a cross-process contract the codec
/// cannot enforce on its own (see module docs of [`crate::codec_async`] /
/// [`crate::codec_sync`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Data {
    /// A 64-bit signed integer.
    Int(i64),
    /// UTF-8 text. Decoding never rejects malformed bytes (the wire format only
    /// requires the length prefix to be honest); invalid sequences are replaced per
    /// `String::from_utf8_lossy`.
    String(String),
    /// An ordered, finite sequence of `Data`.
    List(Vec<Data>),
    /// A reference to a live entry in the engine's object store.
    Object(ObjectId),
}

impl Data {
    #[must_use]
    pub fn unit() -> Self {
        Self::List(Vec::new())
    }

    #[must_use]
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Self::Object(id) => Some(*id),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Data]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "Int",
            Self::String(_) => "String",
            Self::List(_) => "List",
            Self::Object(_) => "Object",
        }
    }
}

impl From<i64> for Data {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<String> for Data {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<ObjectId> for Data {
    fn from(v: ObjectId) -> Self {
        Self::Object(v)
    }
}

impl From<Vec<Data>> for Data {
    fn from(v: Vec<Data>) -> Self {
        Self::List(v)
    }
}
