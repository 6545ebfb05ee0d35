//! Method signature descriptors produced by discovery.
//!
//! Wire shape (stable contract, shared with the other language runtimes):
//!
//! ```json
//! {
//!   "static": true,
//!   "returnType": "int",
//!   "method": "minus",
//!   "name": "minus",
//!   "types": ["int", "int"],
//!   "names": ["a", "b"]
//! }
//! ```
//!
//! For instance methods the receiver never appears in `types`/`names`;
//! registered entries declare non-receiver parameters only.

use crate::entry::FunctionEntry;
use serde::{Deserialize, Serialize};

/// One callable member as reported by the listing engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    /// Whether the member binds without a receiver.
    #[serde(rename = "static")]
    pub is_static: bool,

    /// Declared return type name; unannotated targets report `"any"`.
    #[serde(rename = "returnType")]
    pub return_type: String,

    /// Member name (kept equal to `name` for wire compatibility).
    pub method: String,

    /// Member name.
    pub name: String,

    /// Parameter type names, receiver excluded.
    pub types: Vec<String>,

    /// Parameter names, receiver excluded.
    pub names: Vec<String>,
}

impl From<&FunctionEntry> for MethodDescriptor {
    fn from(entry: &FunctionEntry) -> Self {
        Self {
            is_static: entry.is_static(),
            return_type: entry.return_type().to_string(),
            method: entry.name().to_string(),
            name: entry.name().to_string(),
            types: entry
                .params()
                .iter()
                .map(|p| p.type_name.clone())
                .collect(),
            names: entry.params().iter().map(|p| p.name.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unicall_types::Value;

    #[test]
    fn descriptor_from_entry() {
        let entry = FunctionEntry::builder("minus")
            .param("a", "int")
            .param("b", "int")
            .returns("int")
            .sync(|_| Ok(Value::Null));

        let desc = MethodDescriptor::from(&entry);
        assert!(desc.is_static);
        assert_eq!(desc.method, "minus");
        assert_eq!(desc.name, "minus");
        assert_eq!(desc.types, vec!["int", "int"]);
        assert_eq!(desc.names, vec!["a", "b"]);
    }

    #[test]
    fn wire_keys() {
        let entry = FunctionEntry::builder("get_id")
            .instance()
            .returns("int")
            .sync(|_| Ok(Value::Null));
        let json = serde_json::to_value(MethodDescriptor::from(&entry)).unwrap();
        assert_eq!(json["static"], serde_json::json!(false));
        assert_eq!(json["returnType"], serde_json::json!("int"));
        assert!(json.get("is_static").is_none());
    }
}
