/*!
XML-map tree (L4c): a tree of linked elements/attributes built from XPath-lite
expressions, used to drive the import/export mapping engine.

Grounded in `xml_map_tree.hpp`'s `set_cell_link`/range accumulation
operations and error conditions. The tree is an index arena
(`Vec<ElementNode>`) rather than an owned recursive structure, since several
operations (deepest-common-ancestor, fill-down bookkeeping) need to hold
more than one mutable path into the tree at once.
*/
use std::collections::HashMap;

use crate::error::{Error, Result};

use super::xpath::{Segment, XPath};

pub type ElementId = usize;

/// What a linked element or attribute writes its value to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sink {
	/// A single fixed cell.
	Cell { sheet: String, row: usize, column: usize },
	/// One column of a range, relative to the range's row position.
	RangeField { range: usize, column: usize },
}

#[derive(Clone, Debug, Default)]
pub struct ElementNode {
	pub name: String,
	pub ns: Option<String>,
	parent: Option<ElementId>,
	children: Vec<ElementId>,
	pub attributes: HashMap<String, Sink>,
	pub sink: Option<Sink>,
	/// Columns to fill down from the previous row, recorded here when this
	/// element is a range's row-group.
	pub fill_down_columns: Vec<usize>,
}

/// One accumulated range: its header position, its parent element, and the
/// columns contributed by its fields.
#[derive(Clone, Debug)]
pub struct RangeInfo {
	pub sheet: String,
	pub header_row: usize,
	pub header_column: usize,
	pub parent: ElementId,
	pub fields: Vec<ElementId>,
}

impl RangeInfo {
	pub fn column_count(&self) -> usize {
		self.fields.len()
	}
}

struct PendingRange {
	sheet: String,
	header_row: usize,
	header_column: usize,
	fields: Vec<ElementId>,
	row_groups: Vec<ElementId>,
}

#[derive(Default)]
pub struct XmlMapTree {
	nodes: Vec<ElementNode>,
	root: Option<ElementId>,
	aliases: HashMap<String, String>,
	default_ns: Option<String>,
	ranges: Vec<RangeInfo>,
	pending: Option<PendingRange>,
	/// Every row-group element that was registered during `commit_range`,
	/// mapped to the ranges whose row position it advances when it closes.
	row_group_ranges: HashMap<ElementId, Vec<usize>>,
}

impl XmlMapTree {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a namespace prefix. If `default` is true, subsequent
	/// unprefixed path segments resolve against `uri`.
	pub fn set_namespace_alias(&mut self, alias: &str, uri: &str, default: bool) {
		self.aliases.insert(alias.to_string(), uri.to_string());
		if default {
			self.default_ns = Some(uri.to_string());
		}
	}

	fn resolve_ns(&self, segment: &Segment) -> Option<String> {
		match &segment.prefix {
			Some(prefix) => self.aliases.get(prefix).cloned(),
			None => self.default_ns.clone(),
		}
	}

	pub fn node(&self, id: ElementId) -> &ElementNode {
		&self.nodes[id]
	}

	fn ancestor_chain(&self, id: ElementId) -> Vec<ElementId> {
		let mut chain = vec![id];
		let mut cur = id;
		while let Some(parent) = self.nodes[cur].parent {
			chain.push(parent);
			cur = parent;
		}
		chain.reverse();
		chain
	}

	/// Walk (creating as needed) the element chain named by `path.elements`,
	/// returning the terminal element's id. Fails if an intermediate element
	/// is already a terminal sink (cell or range field), since that element
	/// cannot also have children.
	fn ensure_elements(&mut self, path: &XPath) -> Result<ElementId> {
		let mut segments = path.elements.iter();
		let first = segments.next().expect("xpath has at least one element");
		let root_id = match self.root {
			Some(root) => {
				if self.nodes[root].name != first.name {
					return Err(Error::XPath(format!(
						"root element mismatch: tree root is '{}', path names '{}'",
						self.nodes[root].name, first.name
					)));
				}
				root
			}
			None => {
				let id = self.push_node(first, None);
				self.root = Some(id);
				id
			}
		};
		let mut current = root_id;
		for segment in segments {
			current = self.ensure_child(current, segment)?;
		}
		Ok(current)
	}

	fn push_node(&mut self, segment: &Segment, parent: Option<ElementId>) -> ElementId {
		let ns = self.resolve_ns(segment);
		self.nodes.push(ElementNode {
			name: segment.name.clone(),
			ns,
			parent,
			children: Vec::new(),
			attributes: HashMap::new(),
			sink: None,
			fill_down_columns: Vec::new(),
		});
		self.nodes.len() - 1
	}

	fn ensure_child(&mut self, parent: ElementId, segment: &Segment) -> Result<ElementId> {
		if self.nodes[parent].sink.is_some() {
			return Err(Error::InvalidMap(format!(
				"cannot add a child under already-linked element '{}'",
				self.nodes[parent].name
			)));
		}
		let ns = self.resolve_ns(segment);
		if let Some(&existing) = self.nodes[parent]
			.children
			.iter()
			.find(|&&c| self.nodes[c].name == segment.name && self.nodes[c].ns == ns)
		{
			return Ok(existing);
		}
		let id = self.push_node(segment, Some(parent));
		self.nodes[parent].children.push(id);
		Ok(id)
	}

	/// Link a single cell to the element or attribute named by `path`.
	pub fn set_cell_link(&mut self, path: &XPath, sheet: &str, row: usize, column: usize) -> Result<()> {
		let element = self.ensure_elements(path)?;
		let sink = Sink::Cell { sheet: sheet.to_string(), row, column };
		self.attach_sink(element, path, sink)
	}

	fn attach_sink(&mut self, element: ElementId, path: &XPath, sink: Sink) -> Result<()> {
		match &path.attribute {
			Some(attr) => {
				if self.nodes[element].attributes.contains_key(&attr.name) {
					return Err(Error::XPath(format!(
						"attribute '{}' on '{}' is already linked",
						attr.name, self.nodes[element].name
					)));
				}
				self.nodes[element].attributes.insert(attr.name.clone(), sink);
			}
			None => {
				if self.nodes[element].sink.is_some() {
					return Err(Error::XPath(format!(
						"element '{}' is already linked",
						self.nodes[element].name
					)));
				}
				self.nodes[element].sink = Some(sink);
			}
		}
		Ok(())
	}

	/// Begin accumulating a new range at `(sheet, header_row, header_column)`.
	pub fn start_range(&mut self, sheet: &str, header_row: usize, header_column: usize) {
		self.pending = Some(PendingRange {
			sheet: sheet.to_string(),
			header_row,
			header_column,
			fields: Vec::new(),
			row_groups: Vec::new(),
		});
	}

	/// Add one field to the range currently being accumulated.
	pub fn append_range_field_link(&mut self, path: &XPath) -> Result<()> {
		if path.len() < 2 {
			return Err(Error::XPath("a range field path needs at least two segments".into()));
		}
		let pending = self
			.pending
			.as_ref()
			.ok_or_else(|| Error::InvalidMap("append_range_field_link called with no open range".into()))?;
		if let Some(&first_field) = pending.fields.first() {
			let existing_first = &self.nodes[self.ancestor_chain(first_field)[0]].name;
			if existing_first != &path.elements[0].name {
				return Err(Error::XPath("range fields do not share the same first path segment".into()));
			}
		}
		let element = self.ensure_elements(path)?;
		let column = self.pending.as_ref().unwrap().fields.len();
		self.attach_sink(element, path, Sink::RangeField { range: self.ranges.len(), column })?;
		self.pending.as_mut().unwrap().fields.push(element);
		Ok(())
	}

	/// Mark `path` as the row-group anchor for the range currently being
	/// accumulated.
	pub fn set_range_row_group(&mut self, path: &XPath) -> Result<()> {
		let element = self.ensure_elements(path)?;
		let pending = self
			.pending
			.as_mut()
			.ok_or_else(|| Error::InvalidMap("set_range_row_group called with no open range".into()))?;
		pending.row_groups.push(element);
		Ok(())
	}

	/// Finalize the range currently being accumulated: compute the deepest
	/// common ancestor of its fields as the range parent, and for every
	/// registered row-group record which field columns should be filled
	/// down when that group closes.
	pub fn commit_range(&mut self) -> Result<usize> {
		let pending = self
			.pending
			.take()
			.ok_or_else(|| Error::InvalidMap("commit_range called with no open range".into()))?;
		if pending.fields.is_empty() {
			return Err(Error::InvalidMap("a range must have at least one field".into()));
		}
		let chains: Vec<Vec<ElementId>> = pending.fields.iter().map(|&f| self.ancestor_chain(f)).collect();
		let min_len = chains.iter().map(|c| c.len()).min().unwrap();
		let mut common_len = 0;
		'outer: for i in 0..min_len {
			let candidate = chains[0][i];
			for chain in &chains[1..] {
				if chain[i] != candidate {
					break 'outer;
				}
			}
			common_len = i + 1;
		}
		let range_parent = chains[0][common_len - 1];

		let range_id = self.ranges.len();
		self.ranges.push(RangeInfo {
			sheet: pending.sheet,
			header_row: pending.header_row,
			header_column: pending.header_column,
			parent: range_parent,
			fields: pending.fields.clone(),
		});

		for &group in &pending.row_groups {
			self.row_group_ranges.entry(group).or_default().push(range_id);
		}

		// A row-group only needs to fill a column down when it sits *above*
		// the field's own immediate container -- a group that directly
		// contains the field is the field's normal per-row slot, not a
		// propagated outer key.
		for (column, &field) in pending.fields.iter().enumerate() {
			let field_chain = self.ancestor_chain(field);
			if field_chain.len() < 2 {
				continue;
			}
			let field_parent = field_chain[field_chain.len() - 2];
			if let Some(&deepest_group) = pending
				.row_groups
				.iter()
				.filter(|&&g| g != field_parent && field_chain.contains(&g))
				.max_by_key(|&&g| field_chain.iter().position(|&x| x == g).unwrap_or(0))
			{
				self.nodes[deepest_group].fill_down_columns.push(column);
			}
		}

		Ok(range_id)
	}

	pub fn range(&self, id: usize) -> &RangeInfo {
		&self.ranges[id]
	}

	/// The ranges whose row position this element advances when it closes,
	/// if it was registered as a row-group via [`Self::set_range_row_group`].
	pub fn row_groups_for(&self, element: ElementId) -> &[usize] {
		self.row_group_ranges.get(&element).map(Vec::as_slice).unwrap_or(&[])
	}

	/// The root element id, if any path has been linked yet.
	pub fn root(&self) -> Option<ElementId> {
		self.root
	}

	/// The child of `parent` matching `(ns, name)`, if any.
	pub fn find_child(&self, parent: ElementId, ns: Option<&str>, name: &str) -> Option<ElementId> {
		self.nodes[parent]
			.children
			.iter()
			.copied()
			.find(|&c| self.nodes[c].name == name && self.nodes[c].ns.as_deref() == ns)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::xmlmap::xpath::parse;

	#[test]
	fn links_a_single_cell_and_rejects_double_linking() {
		let mut tree = XmlMapTree::new();
		let path = parse("/data/header/title").unwrap();
		tree.set_cell_link(&path, "Sheet1", 0, 0).unwrap();
		let path2 = parse("/data/header/title").unwrap();
		assert!(tree.set_cell_link(&path2, "Sheet1", 1, 1).is_err());
	}

	#[test]
	fn adding_child_under_linked_element_is_an_error() {
		let mut tree = XmlMapTree::new();
		tree.set_cell_link(&parse("/data/title").unwrap(), "Sheet1", 0, 0).unwrap();
		assert!(tree.set_cell_link(&parse("/data/title/sub").unwrap(), "Sheet1", 1, 1).is_err());
	}

	#[test]
	fn mismatched_roots_are_rejected() {
		let mut tree = XmlMapTree::new();
		tree.set_cell_link(&parse("/data/a").unwrap(), "Sheet1", 0, 0).unwrap();
		assert!(tree.set_cell_link(&parse("/other/a").unwrap(), "Sheet1", 0, 0).is_err());
	}

	#[test]
	fn range_with_row_group_records_columns_and_parent() {
		let mut tree = XmlMapTree::new();
		tree.start_range("Sheet1", 0, 0);
		tree.append_range_field_link(&parse("/data/rows/row/a").unwrap()).unwrap();
		tree.append_range_field_link(&parse("/data/rows/row/b").unwrap()).unwrap();
		tree.set_range_row_group(&parse("/data/rows/row").unwrap()).unwrap();
		let range_id = tree.commit_range().unwrap();

		let range = tree.range(range_id);
		assert_eq!(range.column_count(), 2);
		assert_eq!(tree.node(range.parent).name, "row");
	}

	#[test]
	fn short_range_field_path_is_rejected() {
		let mut tree = XmlMapTree::new();
		tree.start_range("Sheet1", 0, 0);
		assert!(tree.append_range_field_link(&parse("/a").unwrap()).is_err());
	}
}
