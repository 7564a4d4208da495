/*!
CSS selectors and property values.

Grounded in `css_selector.hpp`'s `css_simple_selector_t`,
`css_chained_simple_selector_t`, `css_selector_t`, and
`css_property_value_t`; `css_selector.cpp` for the hashing/equality
semantics (class-set order does not affect equality or hash).
*/
use std::collections::BTreeSet;

use super::types::{Combinator, PropertyValueKind, PseudoClassMask, PseudoElementMask, RgbaColor, HslaColor};

/// One compound selector: an optional type name, optional id, an unordered
/// set of classes, and a pseudo-class bitfield.
///
/// Classes are kept in a `BTreeSet` so that equality and hashing are
/// insensitive to the order classes appeared in the source, matching the
/// source's `unordered_set`-based equality.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SimpleSelector {
	pub name: Option<String>,
	pub id: Option<String>,
	pub classes: BTreeSet<String>,
	pub pseudo_classes: PseudoClassMask,
}

impl SimpleSelector {
	pub fn is_empty(&self) -> bool {
		self.name.is_none() && self.id.is_none() && self.classes.is_empty() && self.pseudo_classes == 0
	}
}

/// A simple selector together with the combinator that chains it onto the
/// previous simple selector in a [`Selector`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChainedSimpleSelector {
	pub combinator: Combinator,
	pub selector: SimpleSelector,
}

/// A full CSS selector: a head simple selector plus zero or more chained
/// simple selectors, and the pseudo-element mask attached to the selector as
/// a whole (the source attaches pseudo-elements to the last simple
/// selector; since only one pseudo-element position is meaningful per
/// selector, this crate stores it once on [`Selector`] rather than
/// threading it through the chain).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Selector {
	pub head: SimpleSelector,
	pub chained: Vec<ChainedSimpleSelector>,
	pub pseudo_element: PseudoElementMask,
}

impl Selector {
	pub fn new(head: SimpleSelector) -> Self {
		Selector {
			head,
			chained: Vec::new(),
			pseudo_element: 0,
		}
	}
}

/// A single CSS property value: a tagged union over string/rgba/hsla/url,
/// with a `None` variant for absent values.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
	None,
	String(String),
	Rgba(RgbaColor),
	Hsla(HslaColor),
	Url(String),
}

impl PropertyValue {
	pub fn kind(&self) -> PropertyValueKind {
		match self {
			Self::None => PropertyValueKind::None,
			Self::String(_) => PropertyValueKind::String,
			Self::Rgba(_) => PropertyValueKind::Rgba,
			Self::Hsla(_) => PropertyValueKind::Hsla,
			Self::Url(_) => PropertyValueKind::Url,
		}
	}

	/// The string payload, if this value is a plain or quoted string.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(s) => Some(s.as_str()),
			_ => None,
		}
	}
}

/// An ordered map from property name to its (possibly multi-valued) values,
/// as they appeared in a single declaration block.
pub type Properties = std::collections::HashMap<String, Vec<PropertyValue>>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn selectors_with_reordered_classes_are_equal() {
		let mut a = SimpleSelector::default();
		a.classes.insert("big".into());
		a.classes.insert("red".into());
		let mut b = SimpleSelector::default();
		b.classes.insert("red".into());
		b.classes.insert("big".into());
		assert_eq!(a, b);
	}
}
