/*!
CSS document tree (L4a): a mapping from `(selector, pseudo-element-mask)` to
a property map, populated by repeatedly loading CSS text.

Grounded in `css_document_tree.hpp`'s `load`/`insert_properties`/
`get_properties`/`get_all_properties` operations.
*/
use std::collections::HashMap;

use crate::error::Result;

use super::parser;
use super::selector::{Properties, Selector};
use super::types::PseudoElementMask;

/// Owns every selector -> properties mapping parsed so far.
#[derive(Clone, Debug, Default)]
pub struct DocumentTree {
	entries: HashMap<(Selector, PseudoElementMask), Properties>,
}

impl DocumentTree {
	pub fn new() -> Self {
		Self::default()
	}

	/// Parse `css` and merge every rule's declarations into the tree,
	/// keyed by `(selector, selector.pseudo_element)`. A selector list
	/// shares its declaration block across every selector it names.
	pub fn load(&mut self, css: &str) -> Result<()> {
		for rule in parser::parse(css)? {
			for selector in rule.selectors {
				self.insert_properties(selector, rule.properties.clone());
			}
		}
		Ok(())
	}

	/// Insert or replace the properties recorded for `selector`. The
	/// selector's own `pseudo_element` field selects the bucket; callers
	/// wanting a specific pseudo-element mask should set it on `selector`
	/// before calling this.
	pub fn insert_properties(&mut self, selector: Selector, properties: Properties) {
		let pseudo_element = selector.pseudo_element;
		self.entries.insert((selector, pseudo_element), properties);
	}

	/// Look up the properties recorded for `(selector, pseudo_element)`.
	/// A selector with no pseudo-element uses mask 0.
	pub fn get_properties(&self, selector: &Selector, pseudo_element: PseudoElementMask) -> Option<&Properties> {
		let mut key_selector = selector.clone();
		key_selector.pseudo_element = pseudo_element;
		self.entries.get(&(key_selector, pseudo_element))
	}

	/// Every `(pseudo_element, properties)` pair recorded for selectors
	/// that are structurally equal to `selector` once the pseudo-element
	/// mask is ignored.
	pub fn get_all_properties(&self, selector: &Selector) -> Vec<(PseudoElementMask, &Properties)> {
		self.entries
			.iter()
			.filter_map(|((sel, pe), props)| {
				let mut bare = sel.clone();
				bare.pseudo_element = 0;
				let mut target = selector.clone();
				target.pseudo_element = 0;
				if bare == target {
					Some((*pe, props))
				} else {
					None
				}
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::css::selector::SimpleSelector;

	fn selector_named(name: &str) -> Selector {
		Selector::new(SimpleSelector {
			name: Some(name.to_string()),
			..Default::default()
		})
	}

	#[test]
	fn parse_and_lookup_type_and_class_selectors() {
		let mut tree = DocumentTree::new();
		tree.load("p { color: #112233; } p.big { font-size: 12pt; }").unwrap();

		let p = selector_named("p");
		let props = tree.get_properties(&p, 0).unwrap();
		assert_eq!(props.len(), 1);
		assert_eq!(props["color"][0].as_str(), Some("#112233"));

		let mut p_big = selector_named("p");
		p_big.head.classes.insert("big".to_string());
		let props = tree.get_properties(&p_big, 0).unwrap();
		assert_eq!(props["font-size"][0].as_str(), Some("12pt"));
	}

	#[test]
	fn missing_selector_returns_none() {
		let tree = DocumentTree::new();
		assert!(tree.get_properties(&selector_named("nope"), 0).is_none());
	}

	#[test]
	fn get_all_properties_collects_every_pseudo_element_variant() {
		let mut tree = DocumentTree::new();
		tree.load("p { color: red; } p::before { content: \"x\"; }").unwrap();
		let all = tree.get_all_properties(&selector_named("p"));
		assert_eq!(all.len(), 2);
	}
}
