/*!
# JSON structure tree (L4b)

The JSON parser itself is an external interface (`serde_json`); this module
picks up from a parsed [`serde_json::Value`] and builds the schema tree used
to discover tabular ranges for mapping.
*/
pub mod structure_tree;

pub use structure_tree::{Node, NodeType, StructureTree, TableRange};
