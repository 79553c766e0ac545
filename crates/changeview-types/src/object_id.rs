use std::str::FromStr;

use git2::Oid;

/// Length of a hex-encoded SHA-1 object id.
pub const OBJECT_ID_HEX_LENGTH: usize = 40;

/// Content hash of a blob, tree or commit.
///
/// [`ObjectId::zero`] is the all-zero sentinel used by the object store to say
/// "this path does not exist on this side".
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ObjectId(Oid);

impl ObjectId {
    pub fn zero() -> ObjectId {
        ObjectId(Oid::zero())
    }

    pub fn oid(self) -> Oid {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// `None` for the zero sentinel, `Some(self)` otherwise.
    pub fn non_zero(self) -> Option<ObjectId> {
        if self.is_zero() { None } else { Some(self) }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Oid> for ObjectId {
    fn from(oid: Oid) -> Self {
        Self(oid)
    }
}

impl From<ObjectId> for Oid {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl FromStr for ObjectId {
    type Err = git2::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Oid::from_str(s).map(Self)
    }
}

/// An object id as handed to model consumers.
///
/// The full id is kept so two abbreviations of different objects never compare
/// equal; `short` only affects rendering.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct AbbreviatedObjectId(ObjectId);

impl AbbreviatedObjectId {
    pub fn object_id(self) -> ObjectId {
        self.0
    }

    /// Full hex name.
    pub fn name(&self) -> String {
        self.0.to_string()
    }

    /// First `len` hex digits, clamped to the full length.
    pub fn short(&self, len: usize) -> String {
        let mut name = self.name();
        name.truncate(len.min(OBJECT_ID_HEX_LENGTH));
        name
    }

    /// Whether `prefix` (hex, any case) is a prefix of this id.
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.name().starts_with(&prefix.to_ascii_lowercase())
    }
}

impl From<ObjectId> for AbbreviatedObjectId {
    fn from(id: ObjectId) -> Self {
        Self(id)
    }
}

impl From<Oid> for AbbreviatedObjectId {
    fn from(oid: Oid) -> Self {
        Self(ObjectId::from(oid))
    }
}

impl std::fmt::Debug for AbbreviatedObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for AbbreviatedObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ObjectId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ObjectId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Oid::from_str(&s)
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for AbbreviatedObjectId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}
