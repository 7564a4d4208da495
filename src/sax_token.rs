/*!
# Token-resolving SAX parser (L2b)

Wraps [`crate::parser::namespaces::NamespaceResolver`] and additionally looks
up the local name of every element and attribute against a caller-supplied
[`Tokens`] table, producing a [`TokenEvent`] whose `token` field is
[`crate::tokens::TOKEN_UNKNOWN`] when the name is absent from the table. The
raw name is always preserved alongside the token.
*/
use std::collections::HashMap;

use crate::error::Result;
use crate::parser::common::EventMetrics;
use crate::parser::namespaces::{NamespaceName, ResolvedEvent, ResolvedQName};
use crate::strings::{CData, NCName};
use crate::tokens::{Tokens, TOKEN_UNKNOWN};

/// A resolved, tokenized name: the namespace identity (if any), the raw
/// local name, and the token looked up for that local name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenName {
	pub ns: Option<NamespaceName>,
	pub name: NCName,
	pub token: u32,
}

impl TokenName {
	fn resolve(tokens: &Tokens, qn: ResolvedQName) -> Self {
		let (ns, name) = qn;
		let token = tokens.get_token(name.as_ref());
		TokenName { ns, name, token }
	}

	/// Whether this name was found in the token table.
	pub fn is_known(&self) -> bool {
		self.token != TOKEN_UNKNOWN
	}
}

/// Events emitted by [`TokenParser`], mirroring [`ResolvedEvent`] but with
/// element and attribute names tokenized.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenEvent {
	XMLDeclaration(EventMetrics, crate::parser::common::XMLVersion),
	StartElement(EventMetrics, TokenName, HashMap<TokenName, CData>),
	EndElement(EventMetrics),
	Text(EventMetrics, CData),
}

impl TokenEvent {
	pub fn metrics(&self) -> &EventMetrics {
		match self {
			Self::XMLDeclaration(m, ..) => m,
			Self::StartElement(m, ..) => m,
			Self::EndElement(m, ..) => m,
			Self::Text(m, ..) => m,
		}
	}
}

// `TokenName` participates as a `HashMap` key for attributes; it is
// compared/hashed purely on the resolved (ns, name) pair, matching
// `ResolvedQName`'s own semantics -- two attributes with equal namespace and
// local name collide even if one happened to tokenize and the other didn't.
impl std::hash::Hash for TokenName {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.ns.hash(state);
		self.name.hash(state);
	}
}

/**
Layers token resolution on top of a [`NamespaceResolver`](crate::parser::namespaces::NamespaceResolver).
*/
pub struct TokenParser {
	inner: crate::parser::namespaces::NamespaceResolver,
	tokens: Tokens,
}

impl TokenParser {
	/// Create a token parser with its own unshared namespace context.
	pub fn new(tokens: Tokens) -> Self {
		Self {
			inner: crate::parser::namespaces::NamespaceResolver::new(),
			tokens,
		}
	}

	/// Create a token parser sharing a namespace context with other parsers.
	pub fn with_context(tokens: Tokens, ctx: crate::parser::RcPtr<crate::namespace::Context>) -> Self {
		Self {
			inner: crate::parser::namespaces::NamespaceResolver::with_context(ctx),
			tokens,
		}
	}

	fn tokenize(&self, ev: ResolvedEvent) -> TokenEvent {
		match ev {
			ResolvedEvent::XMLDeclaration(m, v) => TokenEvent::XMLDeclaration(m, v),
			ResolvedEvent::StartElement(m, qn, attrs) => {
				let name = TokenName::resolve(&self.tokens, qn);
				let mut out = HashMap::with_capacity(attrs.len());
				for (aqn, value) in attrs {
					out.insert(TokenName::resolve(&self.tokens, aqn), value);
				}
				TokenEvent::StartElement(m, name, out)
			}
			ResolvedEvent::EndElement(m) => TokenEvent::EndElement(m),
			ResolvedEvent::Text(m, v) => TokenEvent::Text(m, v),
		}
	}

	/// Read [`crate::parser::raw::RawEvent`]s from `f` until a [`TokenEvent`]
	/// can be produced or the source is exhausted.
	pub fn next<F: FnMut() -> Result<Option<crate::parser::raw::RawEvent>>>(
		&mut self,
		f: F,
	) -> Result<Option<TokenEvent>> {
		Ok(self.inner.next(f)?.map(|ev| self.tokenize(ev)))
	}

	/// The token table this parser was constructed with.
	pub fn tokens(&self) -> &Tokens {
		&self.tokens
	}
}
