//! Shared domain types for the Dhruv coaching backend.
//!
//! Every enum here is persisted as its lowercase string form and parsed back
//! with [`std::str::FromStr`], so the store, the tools and the HTTP layer all
//! agree on one spelling.

pub mod chat;
pub mod config;
pub mod intake;
pub mod memory;

pub use chat::{ChatRole, UserKind, Visibility};
pub use config::defaults as config_defaults;
pub use intake::{CalorieSource, MealType, WaterSource, WaterUnit};
pub use memory::{MEMORY_TAGS, MemorySource, MemoryType};

/// Error returned when a string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    /// The enum being parsed (e.g. "meal type").
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Defines a unit-only enum backed by fixed lowercase strings.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal, default = $default:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

pub(crate) use string_enum;
