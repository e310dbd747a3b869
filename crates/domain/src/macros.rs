//! Macro for implementing Display and FromStr for string-backed domain enums
//!
//! Entity kinds, metric families, resolutions and value kinds are all stored
//! as short text codes in durable storage and configuration files. This macro
//! keeps the code-to-variant mapping in one place per enum.
//!
//! # Example
//!
//! ```rust
//! use mtr_domain::impl_domain_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Quality {
//!     Good,
//!     Suspect,
//! }
//!
//! impl_domain_enum_conversions!(Quality {
//!     Good => "good",
//!     Suspect => "suspect",
//! });
//! ```

/// Implements Display, FromStr and `as_str` for string-backed enums
///
/// Parsing is case-insensitive; display always yields the canonical
/// lowercase code.
#[macro_export]
macro_rules! impl_domain_enum_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Canonical storage code for this variant.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = $crate::MtrError;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err($crate::MtrError::Validation(format!(
                        "invalid {}: {:?}",
                        stringify!($enum_name),
                        s
                    ))),
                }
            }
        }
    };
}
