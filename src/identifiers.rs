//! Strongly-typed identifier newtypes for domain concepts.
//!
//! All types implement `From<&str>`, `From<String>`, and `Into<String>` for
//! easy conversion. They also serialize/deserialize as plain strings.
//!
//! ```ignore
//! use sahara_dashboard::{PluginName, PluginVersion};
//!
//! let plugin: PluginName = "vanilla".into();
//! let version: PluginVersion = "2.7.1".into();
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Macro to generate string wrapper newtypes with consistent implementations.
///
/// Each generated type:
/// - Trims whitespace from input values
/// - Implements `From<&str>`, `From<String>`, `Into<String>`
/// - Implements `Display` for string formatting
/// - Serializes/deserializes as a plain string
macro_rules! string_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from any string-like value.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into().trim().to_string())
            }

            /// Get the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }

            /// Check if the identifier is empty (after trimming).
            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                $name::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                $name::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self(String::new())
            }
        }
    };
}

string_id_type!(
    PluginName,
    "Plugin identifier (e.g., \"vanilla\", \"hdp\", \"spark\")."
);

string_id_type!(
    PluginVersion,
    "Plugin version string as reported by the service (e.g., \"2.7.1\")."
);

string_id_type!(
    ServiceName,
    "Service a configuration parameter applies to (e.g., \"HDFS\", \"YARN\")."
);
