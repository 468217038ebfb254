use crate::errors::CompileError;
use bson::oid::ObjectId;
use std::borrow::Cow;
use std::fmt;

/// Name of the identifier field every stored document carries.
pub const ID_FIELD: &str = "_id";

/// A type-safe document field identifier.
///
/// Query builder methods accept any `FieldKey` rather than bare strings, so the set of
/// queryable fields of a model can be pinned down by a type (see [`field_keys!`]).
pub trait FieldKey {
    /// The field path as it appears in stored documents (dotted for nested fields).
    fn name(&self) -> &str;
}

impl<K: FieldKey + ?Sized> FieldKey for &K {
    fn name(&self) -> &str {
        (**self).name()
    }
}

/// A free-standing field key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Field(Cow<'static, str>);

impl Field {
    /// The `_id` field.
    pub const ID: Self = Self(Cow::Borrowed(ID_FIELD));

    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }
}

impl FieldKey for Field {
    fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declares a `Copy` enum of field keys for a model.
///
/// ```
/// docrepo::field_keys! {
///     pub enum UserField {
///         Id => "_id",
///         Status => "status",
///         City => "address.city",
///     }
/// }
/// use docrepo::FieldKey;
/// assert_eq!(UserField::City.name(), "address.city");
/// ```
#[macro_export]
macro_rules! field_keys {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($variant:ident => $path:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name { $($variant),+ }

        impl $crate::types::FieldKey for $name {
            fn name(&self) -> &str {
                match self { $(Self::$variant => $path),+ }
            }
        }
    };
}

/// Parses a 24-character hex string into an `ObjectId`.
///
/// # Errors
/// Returns `CompileError::InvalidIdentifier` when the string is not a valid object id.
pub fn parse_object_id(hex: &str) -> Result<ObjectId, CompileError> {
    ObjectId::parse_str(hex).map_err(|e| CompileError::InvalidIdentifier {
        value: hex.to_string(),
        reason: e.to_string(),
    })
}
