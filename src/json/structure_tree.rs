/*!
JSON structure tree (L4b): infers a schema tree from one or more parsed JSON
documents, then extracts tabular ranges from it.

Grounded in `json_structure_tree.hpp`'s `structure_tree`/`walker` interface
and `json_structure_tree.cpp`'s merge algorithm: each push of a child under
an existing parent reuses a structurally-equal sibling rather than
duplicating it, and array children additionally track, per array index,
whether that index always held a scalar.
*/
use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{Error, Result};

/// The four shapes a JSON node can take, plus the merged tree's placeholder
/// for a node that has never been populated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeType {
	Unknown,
	Array,
	Object,
	ObjectKey,
	Value,
}

fn classify(value: &Value) -> NodeType {
	match value {
		Value::Object(_) => NodeType::Object,
		Value::Array(_) => NodeType::Array,
		_ => NodeType::Value,
	}
}

/// One node in the merged structure tree.
#[derive(Clone, Debug)]
pub struct Node {
	pub node_type: NodeType,
	/// Present only for `ObjectKey` nodes: the key name.
	pub name: Option<String>,
	pub children: Vec<Node>,
	/// Set once a repeated occurrence of this node is observed under an
	/// array parent.
	pub repeat: bool,
	/// Running maximum of how many children an occurrence of this node has
	/// had, across every occurrence seen so far.
	pub max_child_count: usize,
	/// For a `Value` node that is a child of an array: the set of array
	/// indices at which this value shape has been observed, and whether
	/// that index is still known to hold only scalars (`true`) or has since
	/// been seen holding a non-scalar too (`false`).
	pub value_positions: BTreeMap<usize, bool>,
}

impl Node {
	fn new(node_type: NodeType, name: Option<String>) -> Self {
		Node {
			node_type,
			name,
			children: Vec::new(),
			repeat: false,
			max_child_count: 0,
			value_positions: BTreeMap::new(),
		}
	}
}

fn find_or_insert(parent: &mut Node, node_type: NodeType, name: Option<String>) -> (usize, bool) {
	if let Some(i) = parent
		.children
		.iter()
		.position(|c| c.node_type == node_type && c.name == name)
	{
		(i, true)
	} else {
		parent.children.push(Node::new(node_type, name));
		(parent.children.len() - 1, false)
	}
}

/// A tabular range discovered by [`StructureTree::process_ranges`]: the
/// field paths that make up its columns, and the row-group paths that
/// anchor when a new row begins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableRange {
	pub paths: Vec<String>,
	pub row_groups: Vec<String>,
}

/// Infers a schema tree from repeated JSON documents sharing a root shape.
#[derive(Clone, Debug, Default)]
pub struct StructureTree {
	root: Option<Node>,
}

impl StructureTree {
	pub fn new() -> Self {
		Self::default()
	}

	/// Merge one parsed JSON document into the tree.
	pub fn parse(&mut self, value: &Value) -> Result<()> {
		let root_type = classify(value);
		match &self.root {
			Some(root) if root.node_type != root_type => {
				return Err(Error::JsonStructure(format!(
					"root shape changed from {:?} to {:?} across documents",
					root.node_type, root_type
				)))
			}
			Some(_) => {}
			None => self.root = Some(Node::new(root_type, None)),
		}
		let root = self.root.as_mut().unwrap();
		populate(root, value, None);
		Ok(())
	}

	/// Recursively sort every node's children by `(type, name)`.
	pub fn normalize_tree(&mut self) {
		if let Some(root) = self.root.as_mut() {
			normalize_node(root);
		}
	}

	pub fn root(&self) -> Option<&Node> {
		self.root.as_ref()
	}

	/// Walk the tree and emit one [`TableRange`] per maximal repeating
	/// region, in the order their outermost repeat ancestor closes.
	pub fn process_ranges(&self) -> Vec<TableRange> {
		let mut out = Vec::new();
		if let Some(root) = &self.root {
			let mut walker = Walker::default();
			walker.walk(root, &mut out);
		}
		out
	}
}

fn normalize_node(node: &mut Node) {
	node.children
		.sort_by(|a, b| (a.node_type as u8, a.name.as_deref()).cmp(&(b.node_type as u8, b.name.as_deref())));
	for child in &mut node.children {
		normalize_node(child);
	}
}

fn mark_non_value_pushed(parent: &mut Node, array_index: usize) {
	for sibling in &mut parent.children {
		if sibling.node_type == NodeType::Value {
			sibling.value_positions.insert(array_index, false);
		}
	}
}

/// Push `value` as a child of `parent`, reusing a structurally-equal
/// existing child if one is present, then recurse into its contents.
/// `array_index` is `Some` exactly when `parent` is an `Array` node.
fn populate(parent: &mut Node, value: &Value, array_index: Option<usize>) {
	let node_type = classify(value);
	if let (Some(idx), NodeType::Array) = (array_index, parent.node_type) {
		if node_type == NodeType::Value {
			// Inserted below; validity is recorded against the Value child itself.
			let _ = idx;
		} else {
			mark_non_value_pushed(parent, idx);
		}
	}
	let (child_idx, reused) = find_or_insert(parent, node_type, None);
	if reused && parent.node_type == NodeType::Array {
		parent.children[child_idx].repeat = true;
	}
	if let (Some(idx), NodeType::Array) = (array_index, parent.node_type) {
		if node_type == NodeType::Value {
			parent.children[child_idx].value_positions.insert(idx, true);
		}
	}

	match value {
		Value::Object(map) => {
			let node = &mut parent.children[child_idx];
			let mut count = 0;
			for (key, val) in map {
				count += 1;
				let (key_idx, key_reused) = find_or_insert(node, NodeType::ObjectKey, Some(key.clone()));
				if key_reused && node.node_type == NodeType::Array {
					node.children[key_idx].repeat = true;
				}
				populate(&mut node.children[key_idx], val, None);
			}
			node.max_child_count = node.max_child_count.max(count);
		}
		Value::Array(items) => {
			let node = &mut parent.children[child_idx];
			for (i, item) in items.iter().enumerate() {
				populate(node, item, Some(i));
			}
			node.max_child_count = node.max_child_count.max(items.len());
		}
		_ => {}
	}
}

#[derive(Debug, Clone)]
enum PathSegment {
	Key(String),
	ArrayStep,
}

fn format_path(segments: &[PathSegment], trailing_index: Option<usize>) -> String {
	let mut s = String::from("$");
	for seg in segments {
		match seg {
			PathSegment::Key(k) => {
				s.push_str("['");
				s.push_str(k);
				s.push_str("']");
			}
			PathSegment::ArrayStep => s.push_str("[]"),
		}
	}
	if let Some(idx) = trailing_index {
		s.push('[');
		s.push_str(&idx.to_string());
		s.push(']');
	}
	s
}

#[derive(Default)]
struct Walker {
	path: Vec<PathSegment>,
	row_groups: Vec<String>,
	repeat_depth: usize,
	current_fields: Vec<String>,
}

impl Walker {
	fn walk(&mut self, node: &Node, out: &mut Vec<TableRange>) {
		match node.node_type {
			NodeType::Value => {
				if self.repeat_depth > 0 {
					if node.value_positions.is_empty() {
						self.current_fields.push(format_path(&self.path, None));
					} else {
						for (idx, valid) in &node.value_positions {
							if *valid {
								self.current_fields.push(format_path(&self.path, Some(*idx)));
							}
						}
					}
				}
			}
			NodeType::ObjectKey => {
				let name = node.name.clone().unwrap_or_default();
				self.path.push(PathSegment::Key(name));
				for child in &node.children {
					self.walk(child, out);
				}
				self.path.pop();
			}
			NodeType::Object => {
				let entering_repeat = node.repeat && self.repeat_depth == 0;
				if entering_repeat {
					self.row_groups.push(format_path(&self.path, None));
					self.repeat_depth += 1;
				} else if node.repeat {
					self.repeat_depth += 1;
				}
				for child in &node.children {
					self.walk(child, out);
				}
				if node.repeat {
					self.repeat_depth -= 1;
				}
				if entering_repeat {
					self.close_range(out);
				}
			}
			NodeType::Array => {
				let entering_repeat = self.repeat_depth == 0;
				if entering_repeat {
					self.row_groups.push(format_path(&self.path, None));
				}
				self.repeat_depth += 1;
				self.path.push(PathSegment::ArrayStep);
				for child in &node.children {
					self.walk(child, out);
				}
				self.path.pop();
				self.repeat_depth -= 1;
				if entering_repeat {
					self.close_range(out);
				}
			}
			NodeType::Unknown => {}
		}
	}

	fn close_range(&mut self, out: &mut Vec<TableRange>) {
		if self.current_fields.is_empty() {
			self.row_groups.pop();
			return;
		}
		let mut paths = std::mem::take(&mut self.current_fields);
		paths.sort();
		paths.dedup();
		let mut row_groups = std::mem::take(&mut self.row_groups);
		row_groups.reverse();
		out.push(TableRange { paths, row_groups });
	}
}
