/*!
# Token tables

A [`Tokens`] table maps short element/attribute local names to small
integers so that a [`crate::sax_token::TokenParser`] can dispatch on an
integer comparison instead of a string comparison in the hot path. Token `0`
is reserved and always means "name not found in this table" -- the original
name is never lost, it is simply not tokenized.
*/
use std::collections::HashMap;

use crate::strings::NCNameStr;

/// Reserved token value meaning "not present in the table".
pub const TOKEN_UNKNOWN: u32 = 0;

/**
An immutable name-to-integer table, built once and shared across parses.

Construct with [`Tokens::new`] from an ordered list of names; the name at
index `i` (0-based) is assigned token value `i + 1`, keeping `0` free for
[`TOKEN_UNKNOWN`].
*/
#[derive(Debug, Clone)]
pub struct Tokens {
	by_name: HashMap<String, u32>,
	by_token: Vec<String>,
}

impl Tokens {
	/// Build a token table from an ordered set of names.
	///
	/// # Panics
	///
	/// Panics if `names` contains a duplicate, since that would make
	/// [`Tokens::get_token_name`] ambiguous.
	pub fn new<I, S>(names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut by_name = HashMap::new();
		let mut by_token = Vec::new();
		for name in names {
			let name = name.into();
			let token = (by_token.len() as u32) + 1;
			if by_name.insert(name.clone(), token).is_some() {
				panic!("duplicate token name: {}", name);
			}
			by_token.push(name);
		}
		Tokens { by_name, by_token }
	}

	/// Look up the token for a local name, or [`TOKEN_UNKNOWN`] if absent.
	pub fn get_token(&self, name: &NCNameStr) -> u32 {
		self.by_name
			.get(name.as_str())
			.copied()
			.unwrap_or(TOKEN_UNKNOWN)
	}

	/// Look up the token for a plain string local name.
	pub fn get_token_str(&self, name: &str) -> u32 {
		self.by_name.get(name).copied().unwrap_or(TOKEN_UNKNOWN)
	}

	/// Recover the original name for a token value, if valid.
	pub fn get_token_name(&self, token: u32) -> Option<&str> {
		if token == TOKEN_UNKNOWN || token as usize > self.by_token.len() {
			return None;
		}
		Some(&self.by_token[(token - 1) as usize])
	}

	/// Whether `token` is a value this table actually produced.
	pub fn is_valid_token(&self, token: u32) -> bool {
		token != TOKEN_UNKNOWN && (token as usize) <= self.by_token.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unknown_names_map_to_zero() {
		let t = Tokens::new(vec!["row", "col"]);
		assert_eq!(t.get_token_str("nope"), TOKEN_UNKNOWN);
	}

	#[test]
	fn known_names_round_trip() {
		let t = Tokens::new(vec!["row", "col"]);
		let tok = t.get_token_str("col");
		assert_ne!(tok, TOKEN_UNKNOWN);
		assert_eq!(t.get_token_name(tok), Some("col"));
	}

	#[test]
	fn is_valid_token_rejects_unknown_and_out_of_range() {
		let t = Tokens::new(vec!["row"]);
		assert!(!t.is_valid_token(TOKEN_UNKNOWN));
		assert!(!t.is_valid_token(99));
		assert!(t.is_valid_token(t.get_token_str("row")));
	}

	#[test]
	#[should_panic(expected = "duplicate token name")]
	fn duplicate_names_panic() {
		Tokens::new(vec!["row", "row"]);
	}
}
