/*!
A restricted XPath grammar: `/seg(/seg)*(/@attr)?` where `seg` is
`(prefix:)?localname`. Attributes may only appear as the final segment.

Grounded in `xpath_parser.hpp`'s `token`/`next()` tokenizer, which yields one
`(namespace, name, is_attribute)` token per call; this module collects those
tokens into a single parsed path up front instead, since the whole path is
always needed together by [`super::tree::XmlMapTree`].
*/
use crate::error::{Error, Result};

/// One `(prefix, local name)` step in a path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
	pub prefix: Option<String>,
	pub name: String,
}

/// A fully parsed XPath-lite expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XPath {
	pub elements: Vec<Segment>,
	pub attribute: Option<Segment>,
}

impl XPath {
	/// Total number of segments, counting a trailing attribute.
	pub fn len(&self) -> usize {
		self.elements.len() + if self.attribute.is_some() { 1 } else { 0 }
	}
}

/// Parse `/seg(/seg)*(/@attr)?` into an [`XPath`].
pub fn parse(input: &str) -> Result<XPath> {
	let input = input
		.strip_prefix('/')
		.ok_or_else(|| Error::XPath(format!("xpath '{}' must start with '/'", input)))?;
	if input.is_empty() {
		return Err(Error::XPath("xpath has no segments".into()));
	}
	let raw_segments: Vec<&str> = input.split('/').collect();
	let total = raw_segments.len();
	let mut elements = Vec::new();
	let mut attribute = None;
	for (i, raw) in raw_segments.into_iter().enumerate() {
		if raw.is_empty() {
			return Err(Error::XPath("xpath contains an empty segment".into()));
		}
		if let Some(attr_name) = raw.strip_prefix('@') {
			if i + 1 != total {
				return Err(Error::XPath("attribute step must be the last segment".into()));
			}
			attribute = Some(parse_segment(attr_name)?);
		} else {
			if attribute.is_some() {
				return Err(Error::XPath("element step found after an attribute step".into()));
			}
			elements.push(parse_segment(raw)?);
		}
	}
	if elements.is_empty() {
		return Err(Error::XPath("xpath must name at least one element".into()));
	}
	Ok(XPath { elements, attribute })
}

fn parse_segment(raw: &str) -> Result<Segment> {
	match raw.split_once(':') {
		Some((prefix, name)) if !prefix.is_empty() && !name.is_empty() => Ok(Segment {
			prefix: Some(prefix.to_string()),
			name: name.to_string(),
		}),
		Some(_) => Err(Error::XPath(format!("malformed qualified name '{}'", raw))),
		None => Ok(Segment { prefix: None, name: raw.to_string() }),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_plain_element_path() {
		let p = parse("/data/header/title").unwrap();
		assert_eq!(p.elements.len(), 3);
		assert!(p.attribute.is_none());
		assert_eq!(p.elements[2].name, "title");
	}

	#[test]
	fn parses_trailing_attribute() {
		let p = parse("/a/b/@id").unwrap();
		assert_eq!(p.elements.len(), 2);
		assert_eq!(p.attribute.as_ref().unwrap().name, "id");
	}

	#[test]
	fn rejects_attribute_in_the_middle() {
		assert!(parse("/a/@id/b").is_err());
	}

	#[test]
	fn rejects_missing_leading_slash() {
		assert!(parse("a/b").is_err());
	}

	#[test]
	fn parses_prefixed_segments() {
		let p = parse("/ns:root/ns:child").unwrap();
		assert_eq!(p.elements[0].prefix.as_deref(), Some("ns"));
	}
}
