use std::fmt;
use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(all(feature = "shared_ns", feature = "mt"))]
use std::sync::{Weak, Mutex, MutexGuard};
#[cfg(all(feature = "shared_ns", not(feature = "mt")))]
use std::rc::Weak;
#[cfg(all(feature = "shared_ns", not(feature = "mt")))]
use std::cell::{RefCell, RefMut};

use crate::strings;
use crate::parser::RcPtr;

#[cfg(feature = "shared_ns")]
use weak_table;

#[cfg(feature = "shared_ns")]
type CDataWeakSet = weak_table::WeakHashSet<Weak<strings::CData>>;

static NEXT_NAMESPACE_INDEX: AtomicUsize = AtomicUsize::new(1);

/**
# Repository of interned namespace URIs, shared by multiple parsers

This is the `Context` from which [`super::parser::namespaces::NamespaceResolver`]
instances draw their namespace identities. Interning a URI through
[`Context::intern_cdata`] is how this crate implements the specification's
notion of a namespace repository: the returned [`RcPtr<CData>`] is a stable,
pointer-comparable identity for that URI, and two calls with equal string
content return the same pointer as long as a live reference to it still
exists anywhere.

Beyond interning, this repository hands out a process-unique numeric index
and a deterministic short name (`ns0`, `ns1`, ...) per distinct URI, purely
for diagnostics; these are not meaningful outside the process that assigned
them and are not guaranteed stable across repository instances.

Even though the context is internally mutable, it can safely be shared with
an immutable reference between parsers. If the crate is built with the `mt`
feature, the Context is Send and Sync, otherwise it is neither.
*/
pub struct Context {
	#[cfg(all(feature = "shared_ns", feature = "mt"))]
	nss: Mutex<CDataWeakSet>,
	#[cfg(all(feature = "shared_ns", not(feature = "mt")))]
	nss: RefCell<CDataWeakSet>,
	#[cfg(all(feature = "shared_ns", feature = "mt"))]
	indices: Mutex<Vec<(RcPtr<strings::CData>, usize)>>,
	#[cfg(all(feature = "shared_ns", not(feature = "mt")))]
	indices: RefCell<Vec<(RcPtr<strings::CData>, usize)>>,
}

impl Context {
	#[cfg(all(feature = "shared_ns", feature = "mt"))]
	fn wrap_nss(nss: CDataWeakSet) -> Mutex<CDataWeakSet> {
		return Mutex::new(nss)
	}

	#[cfg(all(feature = "shared_ns", not(feature = "mt")))]
	fn wrap_nss(nss: CDataWeakSet) -> RefCell<CDataWeakSet> {
		return RefCell::new(nss)
	}

	/// Create a new, empty repository.
	pub fn new() -> Context {
		Context{
			#[cfg(feature = "shared_ns")]
			nss: Self::wrap_nss(weak_table::WeakHashSet::new()),
			#[cfg(all(feature = "shared_ns", feature = "mt"))]
			indices: Mutex::new(Vec::new()),
			#[cfg(all(feature = "shared_ns", not(feature = "mt")))]
			indices: RefCell::new(Vec::new()),
		}
	}

	#[cfg(all(feature = "shared_ns", feature = "mt"))]
	fn lock_nss<'a>(&'a self) -> MutexGuard<'a, CDataWeakSet> {
		self.nss.lock().unwrap()
	}

	#[cfg(all(feature = "shared_ns", not(feature = "mt")))]
	fn lock_nss<'a>(&'a self) -> RefMut<'a, CDataWeakSet> {
		self.nss.borrow_mut()
	}

	/// Intern a namespace URI.
	///
	/// The given cdata is interned in the context and a refcounted pointer
	/// is returned. When the last reference to that pointer expires, the
	/// string will be lazily removed from the internal storage.
	///
	/// The optimal course is taken depending on whether the Cow is borrowed
	/// or owned.
	///
	/// To force expiry, call [`Context::release_temporaries`], although that
	/// should only rarely be necessary and may be detrimental to performance.
	pub fn intern_cdata<'a, T: Into<Cow<'a, strings::CDataStr>>>(&self, ns: T) -> RcPtr<strings::CData> {
		let ns = ns.into();
		#[cfg(feature = "shared_ns")]
		{
			let mut nss = self.lock_nss();
			return match nss.get(&*ns) {
				Some(ptr) => ptr.clone(),
				None => {
					let ptr = RcPtr::new(ns.into_owned());
					nss.insert(ptr.clone());
					ptr
				},
			}
		}
		#[cfg(not(feature = "shared_ns"))]
		return RcPtr::new(ns.into_owned())
	}

	#[cfg(all(feature = "shared_ns", feature = "mt"))]
	fn lock_indices<'a>(&'a self) -> MutexGuard<'a, Vec<(RcPtr<strings::CData>, usize)>> {
		self.indices.lock().unwrap()
	}

	#[cfg(all(feature = "shared_ns", not(feature = "mt")))]
	fn lock_indices<'a>(&'a self) -> RefMut<'a, Vec<(RcPtr<strings::CData>, usize)>> {
		self.indices.borrow_mut()
	}

	/// Return the process-unique numeric index assigned to this URI,
	/// assigning a fresh one on first sight.
	///
	/// Requires the `shared_ns` feature; without it every call returns a
	/// freshly allocated index since no identity table is kept.
	pub fn index_of(&self, uri: &RcPtr<strings::CData>) -> usize {
		#[cfg(feature = "shared_ns")]
		{
			let mut indices = self.lock_indices();
			for (known, idx) in indices.iter() {
				if RcPtr::ptr_eq(known, uri) {
					return *idx;
				}
			}
			let idx = NEXT_NAMESPACE_INDEX.fetch_add(1, Ordering::Relaxed);
			indices.push((uri.clone(), idx));
			idx
		}
		#[cfg(not(feature = "shared_ns"))]
		NEXT_NAMESPACE_INDEX.fetch_add(1, Ordering::Relaxed)
	}

	/// Return a deterministic short diagnostic name (`ns0`, `ns1`, ...) for
	/// this URI, derived from [`Context::index_of`].
	pub fn short_name_of(&self, uri: &RcPtr<strings::CData>) -> String {
		format!("ns{}", self.index_of(uri))
	}

	/// Remove all unreferenced strings from storage and shrink the storage to
	/// fit the requirements.
	///
	/// This should rarely be necessary to call. The internal storage will
	/// prefer expiring unused strings over reallocating and will only
	/// reallocate if necessary.
	pub fn release_temporaries(&self) {
		#[cfg(feature = "shared_ns")]
		{
			let mut nss = self.lock_nss();
			nss.remove_expired();
			nss.shrink_to_fit();
			let mut indices = self.lock_indices();
			indices.retain(|(ptr, _)| RcPtr::strong_count(ptr) > 1);
		}
	}

	/// Return the number of CData strings interned.
	///
	/// Returns zero if built without `shared_ns`. This count includes strings
	/// which are unreferenced and which would be removed before the next
	/// reallocation.
	pub fn cdatas(&self) -> usize {
		#[cfg(feature = "shared_ns")]
		{
			let nss = self.lock_nss();
			nss.len()
		}
		#[cfg(not(feature = "shared_ns"))]
		0
	}
}

impl fmt::Debug for Context {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		let mut f = f.debug_struct("Context");
		f.field("instance", &(self as *const Context));
		#[cfg(feature = "shared_ns")]
		{
			let nss = self.lock_nss();
			f.field("nss.capacity()", &nss.capacity()).field("nss.length()", &nss.len());
		}
		f.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn index_of_is_stable_for_same_pointer() {
		let ctx = Context::new();
		let uri = ctx.intern_cdata(strings::CDataStr::from_str("urn:example").unwrap());
		let a = ctx.index_of(&uri);
		let b = ctx.index_of(&uri);
		assert_eq!(a, b);
	}

	#[test]
	fn index_of_differs_across_uris() {
		let ctx = Context::new();
		let a = ctx.intern_cdata(strings::CDataStr::from_str("urn:a").unwrap());
		let b = ctx.intern_cdata(strings::CDataStr::from_str("urn:b").unwrap());
		assert_ne!(ctx.index_of(&a), ctx.index_of(&b));
	}

	#[test]
	fn short_name_has_expected_shape() {
		let ctx = Context::new();
		let uri = ctx.intern_cdata(strings::CDataStr::from_str("urn:example").unwrap());
		assert!(ctx.short_name_of(&uri).starts_with("ns"));
	}
}
