//! Macros for defining typed ID types.

/// Macro to define a typed numeric ID.
///
/// This generates a newtype wrapper around an integer with:
/// - A `KIND` constant used in error messages and logs
/// - `new()` and `value()` conversions
/// - `UNASSIGNED` for the server's `0`
/// - A `Display` implementation (the decimal integer)
/// - Transparent `Serialize` and `Deserialize` (the bare integer)
/// - `Ord`, `Hash`, and other standard traits
///
/// # Example
///
/// ```ignore
/// define_id!(NodeId, u64, "node");
///
/// let node = NodeId::new(42);
/// assert_eq!(node.to_string(), "42");
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident, $repr:ty, $kind:literal) => {
        /// A typed ID for this resource type.
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name($repr);

        impl $name {
            /// Human readable resource kind.
            pub const KIND: &'static str = $kind;

            /// The server's "not assigned" value.
            pub const UNASSIGNED: Self = Self(0);

            /// Creates an ID from the raw server value.
            #[must_use]
            pub const fn new(id: $repr) -> Self {
                Self(id)
            }

            /// Returns the raw server value.
            #[must_use]
            pub const fn value(&self) -> $repr {
                self.0
            }

            /// Returns true when the server has not assigned this ID.
            #[must_use]
            pub const fn is_unassigned(&self) -> bool {
                self.0 == 0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$repr> for $name {
            fn from(id: $repr) -> Self {
                Self(id)
            }
        }

        impl From<$name> for $repr {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                <$repr as serde::Serialize>::serialize(&self.0, serializer)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                <$repr as serde::Deserialize>::deserialize(deserializer).map(Self)
            }
        }
    };
}
