//! Typed ID wrappers so node ids, server names, and tool names can't be
//! mixed up at a call site — they're all just strings underneath, no
//! format requirement is imposed.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new typed id from anything that converts to `String`.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

typed_id!(NodeId, "Identifier of a node within one tool's graph.");
typed_id!(ToolName, "Unique name of a tool exposed by the engine.");
typed_id!(ServerName, "Name of a downstream tool-server entry.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_inner_string() {
        assert_eq!(NodeId::from("entry").to_string(), "entry");
    }

    #[test]
    fn borrows_as_str_for_hashmap_lookup() {
        use std::collections::HashMap;
        let mut map: HashMap<ServerName, u32> = HashMap::new();
        map.insert(ServerName::new("filesystem"), 1);
        assert_eq!(map.get("filesystem"), Some(&1));
    }
}
