//! JSON form of a node tree.
//!
//! Shape: `{"type", "id"?, "token"?, "props"?, "roles"?, "pos", "children"?}`.
//! Optional keys are left out when empty; `pos` is always present and
//! written as zeros when the node has no position.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{Node, Positions};
use crate::Result;

pub(crate) fn positions_or_zero<S: Serializer>(
    pos: &Option<Positions>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    pos.unwrap_or_default().serialize(serializer)
}

pub(crate) fn zero_as_none<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Positions>, D::Error> {
    let pos = Option::<Positions>::deserialize(deserializer)?;
    Ok(pos.filter(|p| *p != Positions::default()))
}

impl Node {
    /// Convert to a JSON value
    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(self.serialize(serde_stacker::Serializer::new(serde_json::value::Serializer))?)
    }

    /// Serialize to compact JSON
    pub fn to_json(&self) -> Result<String> {
        let mut out = Vec::new();
        let mut serializer = serde_json::Serializer::new(&mut out);
        self.serialize(serde_stacker::Serializer::new(&mut serializer))?;
        Ok(into_string(out))
    }

    /// Serialize to indented JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        let mut out = Vec::new();
        let mut serializer = serde_json::Serializer::pretty(&mut out);
        self.serialize(serde_stacker::Serializer::new(&mut serializer))?;
        Ok(into_string(out))
    }

    /// Parse a node tree from JSON.
    ///
    /// Nesting depth is unbounded: the stack grows on the heap as needed.
    pub fn from_json(json: &str) -> Result<Node> {
        let mut deserializer = serde_json::Deserializer::from_str(json);
        deserializer.disable_recursion_limit();
        let node = Node::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
        deserializer.end()?;
        Ok(node)
    }
}

// serde_json only ever writes UTF-8
fn into_string(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into())
}
