/*!
# XML parser layers (L1a/L2a)

This module wires the raw, non-namespace-aware event parser ([`raw::RawParser`])
to the namespace resolver ([`namespaces::NamespaceResolver`]), exposing the
combination as a single [`Parser`] implementing [`common::Parse`].
*/
pub mod common;
pub mod namespaces;
pub mod raw;

pub use common::{EventMetrics, LexerAdapter, Parse, RcPtr, TokenRead, WithContext, XMLNS_XML, XMLNS_XMLNS, XMLVersion, ZERO_METRICS};
pub use namespaces::{NamespaceName, ResolvedEvent as Event, ResolvedQName as QName};
pub use raw::{RawEvent, RawParser, RawQName};

use crate::error::Result;
use crate::namespace::Context;
use namespaces::NamespaceResolver;

/// Drives a [`RawParser`] and feeds its output through a [`NamespaceResolver`],
/// producing namespace-resolved [`Event`]s directly from a token source.
///
/// This is the L2a layer from the system overview: plain SAX layered with
/// namespace resolution, packaged as a single [`Parse`] implementor so it can
/// be driven the same way [`RawParser`] alone can.
pub struct Parser {
	raw: RawParser,
	ns: NamespaceResolver,
}

impl Parser {
	/// Create a parser with its own, unshared namespace context.
	pub fn new() -> Self {
		Self {
			raw: RawParser::new(),
			ns: NamespaceResolver::new(),
		}
	}

	/// Access the namespace context this parser resolves against.
	pub fn context(&self) -> &RcPtr<Context> {
		self.ns.context()
	}
}

impl Default for Parser {
	fn default() -> Self {
		Self::new()
	}
}

impl WithContext for Parser {
	fn with_context(ctx: RcPtr<Context>) -> Self {
		Self {
			raw: RawParser::new(),
			ns: NamespaceResolver::with_context(ctx),
		}
	}
}

impl Parse for Parser {
	type Output = Event;

	fn parse<R: TokenRead>(&mut self, r: &mut R) -> Result<Option<Self::Output>> {
		let raw = &mut self.raw;
		self.ns.next(move || raw.parse(r))
	}

	fn release_temporaries(&mut self) {
		self.raw.release_temporaries();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::lexer::{Lexer, LexerOptions};
	use std::io::BufReader;

	fn run(doc: &'static [u8]) -> Vec<Event> {
		let mut parser = Parser::new();
		let mut adapter = LexerAdapter::new(Lexer::with_options(LexerOptions::defaults()), BufReader::new(doc));
		let mut out = Vec::new();
		while let Some(ev) = parser.parse(&mut adapter).unwrap() {
			out.push(ev);
		}
		out
	}

	#[test]
	fn parses_simple_element_with_namespace() {
		let events = run(b"<?xml version='1.0'?><a:r xmlns:a='urn:x'>hi</a:r>");
		assert!(events.iter().any(|e| matches!(e, Event::Text(_, _))));
		assert!(events.iter().any(|e| matches!(e, Event::EndElement(_))));
	}
}
