/*!
# Threaded SAX parser (L3)

A producer thread drives [`crate::sax_token::TokenParser`] over a byte
source; the consumer receives batches of [`ParseToken`]s through a bounded
FIFO. This is the only layer in the stack that spawns its own thread -- none
of the lower layers touch concurrency at all.

Grounded in the producer/consumer handoff described for
`threaded_sax_token_parser`: exactly one producer, one consumer, two
watermarks, and a single abort flag. The teacher crate has no equivalent (its
`async` feature models single-task cooperative yielding, not two OS threads
trading batch ownership), so this is built directly on `std::thread` and a
hand-rolled bounded queue rather than adapted from existing teacher code.
*/
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crate::sax_token::{TokenEvent, TokenParser};
use crate::strings::CData;
use crate::tokens::Tokens;

/// One item in the token stream handed from producer to consumer.
///
/// Unlike [`TokenEvent`], every string here is independently owned: the
/// producer thread copies any transient content into its own string pool
/// before publishing, since the pool itself does not cross the thread
/// boundary.
#[derive(Clone, Debug, PartialEq)]
pub enum ParseToken {
	StartElement(TokenEvent),
	EndElement(TokenEvent),
	Characters(CData),
	/// The producer encountered a fatal error; no further tokens follow.
	ParseError(String),
}

/// Tunable sizes for the bounded handoff buffer.
///
/// `low_watermark` is the occupancy the consumer must drain the queue to
/// before the producer, having filled it past `high_watermark`, resumes
/// publishing.
#[derive(Clone, Copy, Debug)]
pub struct Watermarks {
	pub low_watermark: usize,
	pub high_watermark: usize,
}

impl Default for Watermarks {
	fn default() -> Self {
		Watermarks {
			low_watermark: 64,
			high_watermark: 256,
		}
	}
}

struct Shared {
	queue: Mutex<QueueState>,
	not_full: Condvar,
	not_empty: Condvar,
}

struct QueueState {
	items: VecDeque<ParseToken>,
	done: bool,
	abort: bool,
}

impl Shared {
	fn new() -> Self {
		Shared {
			queue: Mutex::new(QueueState {
				items: VecDeque::new(),
				done: false,
				abort: false,
			}),
			not_full: Condvar::new(),
			not_empty: Condvar::new(),
		}
	}
}

/// Consumer-side handle to a running threaded parse.
///
/// Dropping this handle without calling [`ThreadedParser::abort`] or
/// draining to completion will still join the producer thread (its queue
/// simply fills to the high watermark and it blocks there, which is
/// harmless but means the thread outlives the handle until the process
/// exits or someone aborts a *different* handle -- callers that want a
/// prompt shutdown should call [`ThreadedParser::abort`] explicitly).
pub struct ThreadedParser {
	shared: Arc<Shared>,
	watermarks: Watermarks,
	handle: Option<JoinHandle<()>>,
}

impl ThreadedParser {
	/// Spawn a producer thread that reads `data` (already fully buffered;
	/// this layer does not itself manage partial reads) using `tokens` as
	/// the token table.
	pub fn spawn(data: Vec<u8>, tokens: Tokens, watermarks: Watermarks) -> Self {
		let shared = Arc::new(Shared::new());
		let producer_shared = Arc::clone(&shared);
		let handle = thread::spawn(move || {
			Self::run_producer(producer_shared, data, tokens, watermarks);
		});
		ThreadedParser {
			shared,
			watermarks,
			handle: Some(handle),
		}
	}

	fn publish(shared: &Shared, watermarks: &Watermarks, item: ParseToken) -> bool {
		let mut state = shared.queue.lock().unwrap();
		while state.items.len() >= watermarks.high_watermark && !state.abort {
			state = shared.not_full.wait(state).unwrap();
		}
		if state.abort {
			return false;
		}
		state.items.push_back(item);
		shared.not_empty.notify_one();
		true
	}

	fn run_producer(shared: Arc<Shared>, data: Vec<u8>, tokens: Tokens, watermarks: Watermarks) {
		let mut token_parser = TokenParser::new(tokens);
		let mut raw = crate::parser::RawParser::new();
		let mut adapter =
			crate::parser::LexerAdapter::new(crate::lexer::Lexer::new(), io::BufReader::new(&data[..]));

		loop {
			{
				let state = shared.queue.lock().unwrap();
				if state.abort {
					break;
				}
			}
			let result = token_parser.next(|| raw.parse(&mut adapter));
			match result {
				Ok(Some(ev)) => {
					let token = match &ev {
						TokenEvent::StartElement(..) => ParseToken::StartElement(ev),
						TokenEvent::EndElement(..) => ParseToken::EndElement(ev),
						TokenEvent::Text(_, data) => ParseToken::Characters(data.clone()),
						TokenEvent::XMLDeclaration(..) => continue,
					};
					if !Self::publish(&shared, &watermarks, token) {
						break;
					}
				}
				Ok(None) => break,
				Err(e) => {
					Self::publish(&shared, &watermarks, ParseToken::ParseError(e.to_string()));
					break;
				}
			}
		}
		let mut state = shared.queue.lock().unwrap();
		state.done = true;
		shared.not_empty.notify_all();
	}

	/// Request that the producer stop as soon as possible.
	///
	/// The producer observes this the next time it would block to publish a
	/// full batch, or the next time it checks between tokens; it then winds
	/// down without emitting further tokens.
	pub fn abort(&self) {
		let mut state = self.shared.queue.lock().unwrap();
		state.abort = true;
		self.shared.not_full.notify_all();
		self.shared.not_empty.notify_all();
	}

	/// Drain available tokens into `out`, blocking if none are available yet
	/// and the producer has not finished. Returns `true` once the producer
	/// has signalled completion and no more tokens remain.
	pub fn next_tokens(&self, out: &mut Vec<ParseToken>) -> bool {
		let mut state = self.shared.queue.lock().unwrap();
		while state.items.is_empty() && !state.done {
			state = self.shared.not_empty.wait(state).unwrap();
		}
		out.extend(state.items.drain(..));
		let finished = state.done && state.items.is_empty();
		drop(state);
		self.shared.not_full.notify_all();
		finished
	}
}

impl Drop for ThreadedParser {
	fn drop(&mut self) {
		self.abort();
		if let Some(handle) = self.handle.take() {
			let _ = handle.join();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn drains_elements_from_a_small_document() {
		let tokens = Tokens::new(vec!["root", "child"]);
		let parser = ThreadedParser::spawn(
			b"<root><child>hi</child></root>".to_vec(),
			tokens,
			Watermarks::default(),
		);
		let mut seen = Vec::new();
		loop {
			let mut batch = Vec::new();
			let done = parser.next_tokens(&mut batch);
			seen.extend(batch);
			if done {
				break;
			}
		}
		assert!(seen
			.iter()
			.any(|t| matches!(t, ParseToken::StartElement(_))));
		assert!(seen.iter().any(|t| matches!(t, ParseToken::EndElement(_))));
		assert!(!seen.iter().any(|t| matches!(t, ParseToken::ParseError(_))));
	}

	#[test]
	fn abort_stops_the_producer_without_hanging() {
		let tokens = Tokens::new(vec!["root"]);
		let parser = ThreadedParser::spawn(
			b"<root>some text that keeps the parser briefly busy</root>".to_vec(),
			tokens,
			Watermarks {
				low_watermark: 1,
				high_watermark: 2,
			},
		);
		parser.abort();
		let mut batch = Vec::new();
		// Draining after abort must terminate rather than block forever.
		parser.next_tokens(&mut batch);
	}
}
