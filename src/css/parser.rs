/*!
CSS parser (L1b): turns a raw CSS stream into selector/property-block pairs.

Grounded in `css_parser.hpp`/`css_parser_base.hpp`'s grammar description:
selector lists separated by commas, combinators (whitespace, `>`, `+`),
simple selectors (`type`, `#id`, `.class`, `:pseudo-class`,
`::pseudo-element`), declaration blocks, and the four recognized function
values. `/* ... */` comments are skipped wherever whitespace is allowed.
*/
use std::iter::Peekable;
use std::str::Chars;

use crate::error::{Error, Result};

use super::selector::{ChainedSimpleSelector, PropertyValue, Properties, Selector, SimpleSelector};
use super::types::{to_pseudo_class, to_pseudo_element, Combinator, HslaColor, PropertyFunction, RgbaColor};

/// One parsed CSS rule: a selector list sharing one declaration block.
#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
	pub selectors: Vec<Selector>,
	pub properties: Properties,
}

struct Scanner<'a> {
	chars: Peekable<Chars<'a>>,
}

impl<'a> Scanner<'a> {
	fn new(src: &'a str) -> Self {
		Scanner { chars: src.chars().peekable() }
	}

	fn peek(&mut self) -> Option<char> {
		self.chars.peek().copied()
	}

	fn bump(&mut self) -> Option<char> {
		self.chars.next()
	}

	fn skip_ws_and_comments(&mut self) -> bool {
		let mut saw_ws = false;
		loop {
			match self.peek() {
				Some(c) if c.is_whitespace() => {
					saw_ws = true;
					self.bump();
				}
				Some('/') => {
					let mut clone = self.chars.clone();
					clone.next();
					if clone.peek() == Some(&'*') {
						self.bump();
						self.bump();
						while let Some(c) = self.bump() {
							if c == '*' && self.peek() == Some('/') {
								self.bump();
								break;
							}
						}
						saw_ws = true;
					} else {
						break;
					}
				}
				_ => break,
			}
		}
		saw_ws
	}

	fn take_ident(&mut self) -> String {
		let mut s = String::new();
		while let Some(c) = self.peek() {
			if c.is_alphanumeric() || c == '-' || c == '_' {
				s.push(c);
				self.bump();
			} else {
				break;
			}
		}
		s
	}
}

/// Parse a full CSS stylesheet (a sequence of `selector-list { properties }`
/// rules) into [`Rule`]s.
pub fn parse(src: &str) -> Result<Vec<Rule>> {
	let mut sc = Scanner::new(src);
	let mut rules = Vec::new();
	loop {
		sc.skip_ws_and_comments();
		if sc.peek().is_none() {
			break;
		}
		let selectors = parse_selector_list(&mut sc)?;
		sc.skip_ws_and_comments();
		match sc.bump() {
			Some('{') => {}
			other => {
				return Err(Error::Css(format!(
					"expected '{{' to open a declaration block, found {:?}",
					other
				)))
			}
		}
		let properties = parse_declaration_block(&mut sc)?;
		rules.push(Rule { selectors, properties });
	}
	Ok(rules)
}

fn parse_selector_list(sc: &mut Scanner) -> Result<Vec<Selector>> {
	let mut out = Vec::new();
	loop {
		out.push(parse_selector(sc)?);
		sc.skip_ws_and_comments();
		if sc.peek() == Some(',') {
			sc.bump();
			sc.skip_ws_and_comments();
			continue;
		}
		break;
	}
	Ok(out)
}

fn parse_selector(sc: &mut Scanner) -> Result<Selector> {
	let (head, pseudo_element) = parse_simple_selector(sc)?;
	let mut selector = Selector::new(head);
	selector.pseudo_element = pseudo_element;
	loop {
		let had_ws = sc.skip_ws_and_comments();
		let combinator = match sc.peek() {
			Some('>') => {
				sc.bump();
				sc.skip_ws_and_comments();
				Some(Combinator::DirectChild)
			}
			Some('+') => {
				sc.bump();
				sc.skip_ws_and_comments();
				Some(Combinator::NextSibling)
			}
			Some(c) if is_simple_selector_start(c) && had_ws => Some(Combinator::Descendant),
			_ => None,
		};
		let Some(combinator) = combinator else { break };
		let (simple, pe) = parse_simple_selector(sc)?;
		if simple.is_empty() {
			return Err(Error::Css("expected a simple selector after combinator".into()));
		}
		selector.pseudo_element = pe;
		selector.chained.push(ChainedSimpleSelector { combinator, selector: simple });
	}
	Ok(selector)
}

fn is_simple_selector_start(c: char) -> bool {
	c.is_alphabetic() || matches!(c, '*' | '.' | '#' | ':')
}

fn parse_simple_selector(sc: &mut Scanner) -> Result<(SimpleSelector, super::types::PseudoElementMask)> {
	let mut selector = SimpleSelector::default();
	let mut pseudo_element = 0;
	if sc.peek() == Some('*') {
		sc.bump();
	} else if sc.peek().map(|c| c.is_alphabetic() || c == '_').unwrap_or(false) {
		selector.name = Some(sc.take_ident());
	}
	loop {
		match sc.peek() {
			Some('#') => {
				sc.bump();
				selector.id = Some(sc.take_ident());
			}
			Some('.') => {
				sc.bump();
				selector.classes.insert(sc.take_ident());
			}
			Some(':') => {
				sc.bump();
				if sc.peek() == Some(':') {
					sc.bump();
					let name = sc.take_ident();
					pseudo_element = to_pseudo_element(&name);
				} else {
					let name = sc.take_ident();
					if sc.peek() == Some('(') {
						sc.bump();
						while let Some(c) = sc.bump() {
							if c == ')' {
								break;
							}
						}
					}
					selector.pseudo_classes |= to_pseudo_class(&name);
				}
			}
			_ => break,
		}
	}
	Ok((selector, pseudo_element))
}

fn parse_declaration_block(sc: &mut Scanner) -> Result<Properties> {
	let mut props = Properties::new();
	loop {
		sc.skip_ws_and_comments();
		if sc.peek() == Some('}') {
			sc.bump();
			break;
		}
		if sc.peek().is_none() {
			return Err(Error::Css("unterminated declaration block".into()));
		}
		let name = sc.take_ident();
		if name.is_empty() {
			return Err(Error::Css("expected a property name".into()));
		}
		sc.skip_ws_and_comments();
		if sc.bump() != Some(':') {
			return Err(Error::Css(format!("expected ':' after property name '{}'", name)));
		}
		sc.skip_ws_and_comments();
		let mut values = Vec::new();
		loop {
			sc.skip_ws_and_comments();
			match sc.peek() {
				Some(';') | Some('}') | None => break,
				_ => values.push(parse_value(sc)?),
			}
			sc.skip_ws_and_comments();
		}
		if sc.peek() == Some(';') {
			sc.bump();
		}
		props.entry(name).or_insert_with(Vec::new).extend(values);
	}
	Ok(props)
}

fn parse_value(sc: &mut Scanner) -> Result<PropertyValue> {
	match sc.peek() {
		Some('"') | Some('\'') => Ok(PropertyValue::String(parse_quoted_string(sc)?)),
		Some(c) if c.is_alphabetic() || c == '-' || c == '_' || c == '#' => parse_ident_or_function(sc),
		Some(c) => Err(Error::Css(format!("unexpected character '{}' in property value", c))),
		None => Err(Error::Css("unexpected end of input in property value".into())),
	}
}

fn parse_quoted_string(sc: &mut Scanner) -> Result<String> {
	let quote = sc.bump().unwrap();
	let mut s = String::new();
	loop {
		match sc.bump() {
			Some(c) if c == quote => break,
			Some(c) => s.push(c),
			None => return Err(Error::Css("unterminated quoted string".into())),
		}
	}
	Ok(s)
}

fn parse_ident_or_function(sc: &mut Scanner) -> Result<PropertyValue> {
	if sc.peek() == Some('#') {
		sc.bump();
		let mut s = String::from("#");
		while let Some(c) = sc.peek() {
			if c.is_alphanumeric() {
				s.push(c);
				sc.bump();
			} else {
				break;
			}
		}
		return Ok(PropertyValue::String(s));
	}
	let ident = sc.take_ident();
	if sc.peek() == Some('(') {
		sc.bump();
		let args = parse_function_args(sc)?;
		sc.skip_ws_and_comments();
		if sc.bump() != Some(')') {
			return Err(Error::Css(format!("unterminated function call '{}('", ident)));
		}
		build_function_value(&ident, &args)
	} else {
		Ok(PropertyValue::String(ident))
	}
}

fn parse_function_args(sc: &mut Scanner) -> Result<Vec<String>> {
	let mut args = Vec::new();
	loop {
		sc.skip_ws_and_comments();
		if sc.peek() == Some(')') {
			break;
		}
		if sc.peek() == Some('"') || sc.peek() == Some('\'') {
			args.push(parse_quoted_string(sc)?);
		} else {
			let mut s = String::new();
			while let Some(c) = sc.peek() {
				if c == ',' || c == ')' || c.is_whitespace() {
					break;
				}
				s.push(c);
				sc.bump();
			}
			args.push(s);
		}
		sc.skip_ws_and_comments();
		if sc.peek() == Some(',') {
			sc.bump();
		}
	}
	Ok(args)
}

fn parse_num(s: &str) -> Result<f64> {
	s.trim_end_matches('%')
		.trim_end_matches("deg")
		.parse::<f64>()
		.map_err(|_| Error::Css(format!("'{}' is not a valid number", s)))
}

fn build_function_value(name: &str, args: &[String]) -> Result<PropertyValue> {
	match PropertyFunction::from_name(name) {
		PropertyFunction::Rgb | PropertyFunction::Rgba => {
			if args.len() < 3 {
				return Err(Error::Css(format!("'{}' requires at least 3 arguments", name)));
			}
			let r = parse_num(&args[0])?;
			let g = parse_num(&args[1])?;
			let b = parse_num(&args[2])?;
			let a = args.get(3).map(|s| parse_num(s)).transpose()?.unwrap_or(1.0);
			Ok(PropertyValue::Rgba(RgbaColor::clamped(r, g, b, a)))
		}
		PropertyFunction::Hsl | PropertyFunction::Hsla => {
			if args.len() < 3 {
				return Err(Error::Css(format!("'{}' requires at least 3 arguments", name)));
			}
			let h = parse_num(&args[0])?;
			let s = parse_num(&args[1])?;
			let l = parse_num(&args[2])?;
			let a = args.get(3).map(|s| parse_num(s)).transpose()?.unwrap_or(1.0);
			Ok(PropertyValue::Hsla(HslaColor::clamped(h, s, l, a)))
		}
		PropertyFunction::Url => {
			Ok(PropertyValue::Url(args.get(0).cloned().unwrap_or_default()))
		}
		PropertyFunction::Unknown => Err(Error::Css(format!("unknown function '{}'", name))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_type_and_class_selectors_with_properties() {
		let rules = parse("p { color: #112233; } p.big { font-size: 12pt; }").unwrap();
		assert_eq!(rules.len(), 2);
		assert_eq!(rules[0].selectors[0].head.name.as_deref(), Some("p"));
		let color = &rules[0].properties["color"];
		assert_eq!(color, &[PropertyValue::String("#112233".into())]);
		assert!(rules[1].selectors[0].head.classes.contains("big"));
	}

	#[test]
	fn parses_rgb_and_clamps() {
		let rules = parse("a { color: rgb(300, -10, 100); }").unwrap();
		match &rules[0].properties["color"][0] {
			PropertyValue::Rgba(c) => {
				assert_eq!(c.red, 255);
				assert_eq!(c.green, 0);
				assert_eq!(c.blue, 100);
			}
			other => panic!("expected rgba, got {:?}", other),
		}
	}

	#[test]
	fn descendant_and_direct_child_combinators() {
		let rules = parse("div p { x: y; } div > p { x: y; }").unwrap();
		assert_eq!(rules[0].selectors[0].chained[0].combinator, Combinator::Descendant);
		assert_eq!(rules[1].selectors[0].chained[0].combinator, Combinator::DirectChild);
	}

	#[test]
	fn skips_comments_between_rules() {
		let rules = parse("/* hello */ p { /* inline */ color: red; }").unwrap();
		assert_eq!(rules.len(), 1);
	}

	#[test]
	fn pseudo_element_and_pseudo_class() {
		let rules = parse("p:hover::before { content: \"x\"; }").unwrap();
		let sel = &rules[0].selectors[0];
		assert_ne!(sel.head.pseudo_classes & super::super::types::PSEUDO_CLASS_HOVER, 0);
		assert_eq!(sel.pseudo_element, super::super::types::PSEUDO_ELEMENT_BEFORE);
	}
}
