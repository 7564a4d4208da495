/*!
# XML mapping engine (L5)

Drives [`crate::parser::Parser`] (L2a) over an XML stream using an
[`crate::xmlmap::XmlMapTree`] to decide, for every element and attribute,
whether it feeds a fixed cell or a range field, and writes the matched
values through an [`ImportFactory`].

Grounded in `orcus_xml.hpp`'s `read_file`/`set_cell_link` driving loop: a
walker descends the map tree in lock-step with the parser, diverging onto an
"unlinked" depth counter whenever the document visits structure the map
doesn't name, and resuming linked descent only once that subtree is fully
popped.
*/
use std::collections::{HashMap, HashSet};
use std::io;

use bytes::BufMut;

use crate::error::Result;
use crate::parser::{Event, LexerAdapter, NamespaceName, Parse};
use crate::strings::{CData, NCName};
use crate::writer::{Encoder, Item};
use crate::xmlmap::{tree::Sink, ElementId, XmlMapTree};

/// A single spreadsheet-like sheet a mapped value can be written to.
pub trait Sheet {
	/// Write `value` at `(row, column)`, inferring its type the way the
	/// source column formatting would (numbers, booleans, or plain text).
	fn set_auto(&mut self, row: usize, column: usize, value: &str);

	/// Re-write the value already present at `(row, column)` into each of
	/// the next `count` rows in the same column, propagating an outer key
	/// down into rows that didn't restate it.
	fn fill_down_cells(&mut self, row: usize, column: usize, count: usize);
}

/// Resolves sheet names to a mutable [`Sheet`], creating sheets on demand
/// the way the original import factory's `append_sheet`/`get_sheet` pair
/// does.
pub trait ImportFactory {
	fn get_sheet(&mut self, name: &str) -> &mut dyn Sheet;
}

#[derive(Default)]
struct RangeRuntime {
	row: usize,
	written_this_row: HashSet<usize>,
	last_values: HashMap<usize, String>,
}

/// Drive `source` through `tree`, writing every linked element/attribute
/// value through `factory`.
pub fn import_xml<R: io::BufRead>(tree: &XmlMapTree, adapter: &mut LexerAdapter<R>, factory: &mut dyn ImportFactory) -> Result<()> {
	let mut parser = crate::parser::Parser::new();
	let mut linked_stack: Vec<ElementId> = Vec::new();
	let mut unlinked_depth: usize = 0;
	let mut text_stack: Vec<String> = Vec::new();
	let mut ranges: HashMap<usize, RangeRuntime> = HashMap::new();

	while let Some(event) = parser.parse(adapter)? {
		match event {
			Event::XMLDeclaration(..) => {}
			Event::StartElement(_, (ns, name), attrs) => {
				let ns_str = ns.as_ref().map(|n| n.as_str().to_string());
				let matched = if unlinked_depth > 0 {
					None
				} else if linked_stack.is_empty() {
					tree.root().filter(|&r| {
						tree_node_matches(tree, r, ns_str.as_deref(), name.as_str())
					})
				} else {
					tree.find_child(*linked_stack.last().unwrap(), ns_str.as_deref(), name.as_str())
				};

				match matched {
					Some(id) => {
						linked_stack.push(id);
						text_stack.push(String::new());
						for range_id in tree.row_groups_for(id) {
							ranges.entry(*range_id).or_default().written_this_row.clear();
						}
						for (aname, sink) in attribute_sinks(tree, id, &attrs) {
							write_sink(tree, factory, &mut ranges, sink, &aname);
						}
					}
					None => unlinked_depth += 1,
				}
			}
			Event::EndElement(_) => {
				if unlinked_depth > 0 {
					unlinked_depth -= 1;
					continue;
				}
				let Some(id) = linked_stack.pop() else { continue };
				let text = text_stack.pop().unwrap_or_default();
				let trimmed = text.trim().to_string();
				if let Some(sink) = tree.node(id).sink.clone() {
					write_sink(tree, factory, &mut ranges, sink, &trimmed);
				}
				for &range_id in tree.row_groups_for(id) {
					close_row_group(tree, factory, &mut ranges, id, range_id);
				}
			}
			Event::Text(_, data) => {
				if let Some(buf) = text_stack.last_mut() {
					buf.push_str(data.as_str());
				}
			}
		}
	}
	Ok(())
}

fn tree_node_matches(tree: &XmlMapTree, id: ElementId, ns: Option<&str>, name: &str) -> bool {
	let node = tree.node(id);
	node.name == name && node.ns.as_deref() == ns
}

fn attribute_sinks(
	tree: &XmlMapTree,
	element: ElementId,
	attrs: &HashMap<(Option<crate::parser::NamespaceName>, crate::strings::NCName), crate::strings::CData>,
) -> Vec<(String, Sink)> {
	let node = tree.node(element);
	let mut out = Vec::new();
	for (local_name, sink) in &node.attributes {
		if let Some(((_, name), value)) = attrs.iter().find(|((_, n), _)| n.as_str() == local_name) {
			let _ = name;
			out.push((value.as_str().trim().to_string(), sink.clone()));
		}
	}
	out
}

fn write_sink(
	tree: &XmlMapTree,
	factory: &mut dyn ImportFactory,
	ranges: &mut HashMap<usize, RangeRuntime>,
	sink: Sink,
	value: &str,
) {
	match sink {
		Sink::Cell { sheet, row, column } => {
			factory.get_sheet(&sheet).set_auto(row, column, value);
		}
		Sink::RangeField { range: range_id, column } => {
			let range = tree.range(range_id);
			let runtime = ranges.entry(range_id).or_default();
			runtime.written_this_row.insert(column);
			runtime.last_values.insert(column, value.to_string());
			let row = range.header_row + 1 + runtime.row;
			factory.get_sheet(&range.sheet).set_auto(row, range.header_column + column, value);
		}
	}
}

fn close_row_group(
	tree: &XmlMapTree,
	factory: &mut dyn ImportFactory,
	ranges: &mut HashMap<usize, RangeRuntime>,
	row_group: ElementId,
	range_id: usize,
) {
	let range = tree.range(range_id);
	let fill_down: Vec<usize> = tree.node(row_group).fill_down_columns.clone();
	let runtime = ranges.entry(range_id).or_default();
	let row = range.header_row + 1 + runtime.row;
	for column in fill_down {
		if !runtime.written_this_row.contains(&column) {
			if let Some(value) = runtime.last_values.get(&column).cloned() {
				factory.get_sheet(&range.sheet).set_auto(row, range.header_column + column, &value);
			}
		}
	}
	runtime.row += 1;
}

/// A sheet as seen by [`export_xml`]: read-only access to the cells an
/// earlier import pass (or some other producer) has populated.
pub trait ExportSheet {
	/// The current value at `(row, column)`, or `None` if nothing was ever
	/// written there.
	fn get_auto(&self, row: usize, column: usize) -> Option<String>;
}

/// Resolves sheet names to a read-only [`ExportSheet`] for [`export_xml`].
pub trait ExportFactory {
	fn get_sheet(&self, name: &str) -> Option<&dyn ExportSheet>;
}

/// One step of a captured row-group template, replayed once per data row
/// with `Field` slots substituted from the sheet.
enum TemplateOp {
	StartElement(Option<NamespaceName>, NCName, Vec<AttrOp>),
	EndElement,
	Literal(String),
	Field(usize),
}

enum AttrOp {
	Literal(Option<NamespaceName>, NCName, CData),
	Field(Option<NamespaceName>, NCName, usize),
}

/// Render `source` against `tree`, substituting every linked cell and range
/// field with its current sheet value, and writing the result to `output`.
///
/// Unlinked structure -- anything the map tree does not name -- is copied
/// through unchanged. A range's row-group subtree is captured the first time
/// it is encountered in `source` and then replayed once per row present in
/// the destination sheet, substituting each field's text from
/// `(sheet, header_row + 1 + row, header_column + field_column)`.
pub fn export_xml<R: io::BufRead, O: BufMut>(
	tree: &XmlMapTree,
	adapter: &mut LexerAdapter<R>,
	factory: &dyn ExportFactory,
	output: &mut O,
) -> Result<()> {
	let mut parser = crate::parser::Parser::new();
	let mut encoder = Encoder::new();
	let mut linked_stack: Vec<ElementId> = Vec::new();
	let mut unlinked_depth: usize = 0;
	let mut replayed_ranges: HashSet<usize> = HashSet::new();
	let mut skip_depth: Option<usize> = None;

	while let Some(event) = parser.parse(adapter)? {
		if let Some(base) = skip_depth {
			match &event {
				Event::StartElement(..) => skip_depth = Some(base + 1),
				Event::EndElement(_) => {
					if base == 0 {
						skip_depth = None;
					} else {
						skip_depth = Some(base - 1);
					}
				}
				Event::Text(..) | Event::XMLDeclaration(..) => {}
			}
			continue;
		}

		match &event {
			Event::XMLDeclaration(_, version) => {
				encoder.encode(Item::XMLDeclaration(*version), output).map_err(|e| crate::error::Error::Value(e.to_string()))?;
			}
			Event::StartElement(_, (ns, name), attrs) => {
				let ns_str = ns.as_ref().map(|n| n.as_str().to_string());
				let matched = if unlinked_depth > 0 {
					None
				} else if linked_stack.is_empty() {
					tree.root().filter(|&r| tree_node_matches(tree, r, ns_str.as_deref(), name.as_str()))
				} else {
					tree.find_child(*linked_stack.last().unwrap(), ns_str.as_deref(), name.as_str())
				};

				let row_groups = matched.map(|id| tree.row_groups_for(id)).unwrap_or(&[]);
				match matched {
					Some(id) if !row_groups.is_empty() && row_groups.iter().all(|r| replayed_ranges.contains(r)) => {
						// Later occurrences of an already-replayed row-group in the
						// source are sample data; they do not correspond to a new
						// destination row and are dropped.
						skip_depth = Some(0);
					}
					Some(id) if !row_groups.is_empty() => {
						let range_ids: Vec<usize> = row_groups.to_vec();
						let ops = capture_template(tree, &mut parser, adapter, id, ns.clone(), name.clone(), attrs)?;
						for range_id in &range_ids {
							replay_range(tree, *range_id, &ops, factory, &mut encoder, output)?;
							replayed_ranges.insert(*range_id);
						}
					}
					Some(id) => {
						linked_stack.push(id);
						encode_start(&mut encoder, output, factory, ns.clone(), name.clone(), attrs, tree, Some(id))?;
					}
					None => {
						unlinked_depth += 1;
						encode_start(&mut encoder, output, factory, ns.clone(), name.clone(), attrs, tree, None)?;
					}
				}
			}
			Event::EndElement(_) => {
				if unlinked_depth > 0 {
					unlinked_depth -= 1;
				} else {
					linked_stack.pop();
				}
				encoder.encode(Item::ElementFoot, output).map_err(|e| crate::error::Error::Value(e.to_string()))?;
			}
			Event::Text(_, data) => {
				let sink = linked_stack.last().and_then(|&id| tree.node(id).sink.clone());
				let rendered = match sink {
					Some(Sink::Cell { sheet, row, column }) => factory
						.get_sheet(&sheet)
						.and_then(|s| s.get_auto(row, column))
						.unwrap_or_default(),
					_ => data.as_str().to_string(),
				};
				encoder
					.encode(Item::Text(rendered.as_str().try_into().unwrap()), output)
					.map_err(|e| crate::error::Error::Value(e.to_string()))?;
			}
		}
	}
	Ok(())
}

/// Encode a non-range element's head, substituting any attribute that the
/// map tree links to a fixed cell.
fn encode_start<O: BufMut>(
	encoder: &mut Encoder<crate::writer::SimpleNamespaces>,
	output: &mut O,
	factory: &dyn ExportFactory,
	ns: Option<NamespaceName>,
	name: NCName,
	attrs: &HashMap<(Option<NamespaceName>, NCName), CData>,
	tree: &XmlMapTree,
	id: Option<ElementId>,
) -> Result<()> {
	encoder
		.encode(Item::ElementHeadStart(ns, name.as_ref()), output)
		.map_err(|e| crate::error::Error::Value(e.to_string()))?;
	for ((attr_ns, attr_name), value) in attrs.iter() {
		let sink = id.and_then(|id| tree.node(id).attributes.get(attr_name.as_str()).cloned());
		let rendered = match sink {
			Some(Sink::Cell { sheet, row, column }) => factory
				.get_sheet(&sheet)
				.and_then(|s| s.get_auto(row, column))
				.unwrap_or_else(|| value.as_str().to_string()),
			_ => value.as_str().to_string(),
		};
		encoder
			.encode(Item::Attribute(attr_ns.clone(), attr_name.as_ref(), rendered.as_str().try_into().unwrap()), output)
			.map_err(|e| crate::error::Error::Value(e.to_string()))?;
	}
	encoder.encode(Item::ElementHeadEnd, output).map_err(|e| crate::error::Error::Value(e.to_string()))?;
	Ok(())
}

/// Consume one full element subtree from `parser`, turning it into a flat
/// list of [`TemplateOp`]s. Elements/attributes the map tree links as range
/// fields become `Field` slots; everything else is copied as a literal.
fn capture_template<R: io::BufRead>(
	tree: &XmlMapTree,
	parser: &mut crate::parser::Parser,
	adapter: &mut LexerAdapter<R>,
	root_id: ElementId,
	root_ns: Option<NamespaceName>,
	root_name: NCName,
	root_attrs: &HashMap<(Option<NamespaceName>, NCName), CData>,
) -> Result<Vec<TemplateOp>> {
	let mut ops = Vec::new();
	push_template_start(&mut ops, tree, root_id, root_ns, root_name, root_attrs);
	let mut stack = vec![root_id];
	let mut unlinked = 0usize;

	while let Some(event) = parser.parse(adapter)? {
		match event {
			Event::XMLDeclaration(..) => {}
			Event::StartElement(_, (ns, name), attrs) => {
				let ns_str = ns.as_ref().map(|n| n.as_str().to_string());
				let matched = if unlinked > 0 {
					None
				} else {
					tree.find_child(*stack.last().unwrap(), ns_str.as_deref(), name.as_str())
				};
				match matched {
					Some(id) => {
						stack.push(id);
						push_template_start(&mut ops, tree, id, ns, name, &attrs);
					}
					None => unlinked += 1,
				}
			}
			Event::EndElement(_) => {
				if unlinked > 0 {
					unlinked -= 1;
					ops.push(TemplateOp::EndElement);
				} else {
					stack.pop();
					ops.push(TemplateOp::EndElement);
					if stack.is_empty() {
						break;
					}
				}
			}
			Event::Text(_, data) => {
				let field_column = stack.last().and_then(|&id| match tree.node(id).sink.clone() {
					Some(Sink::RangeField { column, .. }) => Some(column),
					_ => None,
				});
				match field_column {
					Some(column) => ops.push(TemplateOp::Field(column)),
					None => ops.push(TemplateOp::Literal(data.as_str().to_string())),
				}
			}
		}
	}
	Ok(ops)
}

fn push_template_start(
	ops: &mut Vec<TemplateOp>,
	tree: &XmlMapTree,
	id: ElementId,
	ns: Option<NamespaceName>,
	name: NCName,
	attrs: &HashMap<(Option<NamespaceName>, NCName), CData>,
) {
	let mut attr_ops = Vec::new();
	for ((attr_ns, attr_name), value) in attrs.iter() {
		match tree.node(id).attributes.get(attr_name.as_str()).cloned() {
			Some(Sink::RangeField { column, .. }) => attr_ops.push(AttrOp::Field(attr_ns.clone(), attr_name.clone(), column)),
			_ => attr_ops.push(AttrOp::Literal(attr_ns.clone(), attr_name.clone(), value.clone())),
		}
	}
	ops.push(TemplateOp::StartElement(ns, name, attr_ops));
}

/// Replay a captured row-group template once per row present in
/// `range_id`'s destination sheet, substituting each `Field` slot.
fn replay_range<O: BufMut>(
	tree: &XmlMapTree,
	range_id: usize,
	ops: &[TemplateOp],
	factory: &dyn ExportFactory,
	encoder: &mut Encoder<crate::writer::SimpleNamespaces>,
	output: &mut O,
) -> Result<()> {
	let range = tree.range(range_id);
	let mut row = 0usize;
	loop {
		let Some(sheet) = factory.get_sheet(&range.sheet) else { break };
		if sheet.get_auto(range.header_row + 1 + row, range.header_column).is_none() {
			break;
		}
		for op in ops {
			match op {
				TemplateOp::StartElement(ns, name, attr_ops) => {
					encoder
						.encode(Item::ElementHeadStart(ns.clone(), name.as_ref()), output)
						.map_err(|e| crate::error::Error::Value(e.to_string()))?;
					for attr_op in attr_ops {
						let (ns, name, value) = match attr_op {
							AttrOp::Literal(ns, name, value) => (ns.clone(), name.clone(), value.as_str().to_string()),
							AttrOp::Field(ns, name, column) => {
								let value = sheet
									.get_auto(range.header_row + 1 + row, range.header_column + *column)
									.unwrap_or_default();
								(ns.clone(), name.clone(), value)
							}
						};
						encoder
							.encode(Item::Attribute(ns, name.as_ref(), value.as_str().try_into().unwrap()), output)
							.map_err(|e| crate::error::Error::Value(e.to_string()))?;
					}
					encoder.encode(Item::ElementHeadEnd, output).map_err(|e| crate::error::Error::Value(e.to_string()))?;
				}
				TemplateOp::EndElement => {
					encoder.encode(Item::ElementFoot, output).map_err(|e| crate::error::Error::Value(e.to_string()))?;
				}
				TemplateOp::Literal(text) => {
					encoder.encode(Item::Text(text.as_str().try_into().unwrap()), output).map_err(|e| crate::error::Error::Value(e.to_string()))?;
				}
				TemplateOp::Field(column) => {
					let value = sheet.get_auto(range.header_row + 1 + row, range.header_column + column).unwrap_or_default();
					encoder.encode(Item::Text(value.as_str().try_into().unwrap()), output).map_err(|e| crate::error::Error::Value(e.to_string()))?;
				}
			}
		}
		row += 1;
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::lexer::Lexer;
	use crate::xmlmap::parse_xpath;
	use std::collections::BTreeMap;
	use std::io::BufReader;

	#[derive(Default)]
	struct RecordingSheet {
		cells: BTreeMap<(usize, usize), String>,
	}

	impl Sheet for RecordingSheet {
		fn set_auto(&mut self, row: usize, column: usize, value: &str) {
			self.cells.insert((row, column), value.to_string());
		}

		fn fill_down_cells(&mut self, _row: usize, _column: usize, _count: usize) {}
	}

	#[derive(Default)]
	struct RecordingFactory {
		sheets: HashMap<String, RecordingSheet>,
	}

	impl ImportFactory for RecordingFactory {
		fn get_sheet(&mut self, name: &str) -> &mut dyn Sheet {
			self.sheets.entry(name.to_string()).or_default()
		}
	}

	fn run_import(tree: &XmlMapTree, xml: &'static [u8]) -> HashMap<String, RecordingSheet> {
		let mut adapter = LexerAdapter::new(Lexer::new(), BufReader::new(xml));
		let mut factory = RecordingFactory::default();
		import_xml(tree, &mut adapter, &mut factory).unwrap();
		factory.sheets
	}

	#[test]
	fn single_cell_link_writes_one_value() {
		let mut tree = XmlMapTree::new();
		tree.set_cell_link(&parse_xpath("/data/header/title").unwrap(), "Sheet1", 0, 0).unwrap();

		let sheets = run_import(&tree, b"<data><header><title>Hi</title></header></data>");
		let sheet = &sheets["Sheet1"];
		assert_eq!(sheet.cells.get(&(0, 0)).map(String::as_str), Some("Hi"));
		assert_eq!(sheet.cells.len(), 1);
	}

	#[test]
	fn range_with_row_group_writes_each_row() {
		let mut tree = XmlMapTree::new();
		tree.start_range("Sheet1", 0, 0);
		tree.append_range_field_link(&parse_xpath("/data/rows/row/a").unwrap()).unwrap();
		tree.append_range_field_link(&parse_xpath("/data/rows/row/b").unwrap()).unwrap();
		tree.set_range_row_group(&parse_xpath("/data/rows/row").unwrap()).unwrap();
		tree.commit_range().unwrap();

		let sheets = run_import(
			&tree,
			b"<data><rows><row><a>1</a><b>2</b></row><row><a>3</a></row></rows></data>",
		);
		let sheet = &sheets["Sheet1"];
		assert_eq!(sheet.cells.get(&(1, 0)).map(String::as_str), Some("1"));
		assert_eq!(sheet.cells.get(&(1, 1)).map(String::as_str), Some("2"));
		assert_eq!(sheet.cells.get(&(2, 0)).map(String::as_str), Some("3"));
		assert!(!sheet.cells.contains_key(&(2, 1)), "b has no fill-down source here");
	}
}
