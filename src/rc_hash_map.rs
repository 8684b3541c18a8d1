//! A hash map with a reference count per entry.
//!
//! Entries whose count reached zero stay in place (so a quick re-increment can revive them) until
//! [`drain_weak`](`RcHashMap::drain_weak`) collects them.

use core::{
	borrow::Borrow,
	fmt::{self, Debug, Display, Formatter},
	hash::{BuildHasher, Hash},
};
use hashbrown::{
	hash_map::{DefaultHashBuilder, DrainFilter, Entry},
	HashMap,
};
use num_traits::{CheckedAdd, CheckedSub, One, Zero};

pub struct RcHashMap<K, C, V, S = DefaultHashBuilder>(HashMap<K, (C, V), S>)
where
	K: Hash + Eq,
	C: CheckedAdd + CheckedSub + One + Zero,
	S: BuildHasher;
impl<K, C, V, S> Default for RcHashMap<K, C, V, S>
where
	K: Hash + Eq,
	C: CheckedAdd + CheckedSub + One + Zero,
	S: Default + BuildHasher,
{
	fn default() -> Self {
		Self::new()
	}
}
impl<K, C, V, S> RcHashMap<K, C, V, S>
where
	K: Hash + Eq,
	C: CheckedAdd + CheckedSub + One + Zero,
	S: BuildHasher,
{
	#[must_use]
	pub fn new() -> Self
	where
		S: Default,
	{
		Self(HashMap::with_hasher(S::default()))
	}

	/// Increments the count of `k`, inserting `v(&k)` with a count of one if it is absent.
	///
	/// # Errors
	///
	/// Iff the count would overflow `C`. The count is left unchanged in that case.
	pub fn increment_or_insert_with<F: FnOnce(&K) -> V>(&mut self, k: K, v: F) -> Result<&mut V, CountSaturatedError> {
		match self.0.entry(k) {
			Entry::Occupied(occupied) => {
				let (c, v) = occupied.into_mut();
				*c = c.checked_add(&C::one()).ok_or(CountSaturatedError)?;
				Ok(v)
			}
			Entry::Vacant(vacant) => {
				let value = v(vacant.key());
				let (_, v) = vacant.insert((C::one(), value));
				Ok(v)
			}
		}
	}

	/// Decrements the count of `k` without removing the entry.
	///
	/// # Errors
	///
	/// Iff the count was zero already.
	pub fn weak_decrement<Q: ?Sized>(&mut self, k: &Q) -> Result<Option<&mut V>, CountSaturatedError>
	where
		K: Borrow<Q>,
		Q: Eq + Hash,
	{
		match self.0.get_mut(k) {
			Some((c, v)) => {
				*c = c.checked_sub(&C::one()).ok_or(CountSaturatedError)?;
				Ok(Some(v))
			}
			None => Ok(None),
		}
	}

	pub fn get<Q: ?Sized>(&self, k: &Q) -> Option<&V>
	where
		K: Borrow<Q>,
		Q: Eq + Hash,
	{
		self.0.get(k).map(|(_, v)| v)
	}

	/// Removes and yields all entries with a count of zero.
	pub fn drain_weak(&mut self) -> DrainWeak<'_, K, C, V> {
		DrainWeak(self.0.drain_filter(DrainWeak::weak_filter))
	}

	/// Includes entries with a count of zero that weren't drained yet.
	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	#[must_use]
	pub fn capacity(&self) -> usize {
		self.0.capacity()
	}
}
impl<K, C, V, S> Debug for RcHashMap<K, C, V, S>
where
	K: Hash + Eq + Debug,
	C: CheckedAdd + CheckedSub + One + Zero + Debug,
	S: BuildHasher,
{
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_map().entries(self.0.iter().map(|(k, (c, _))| (k, c))).finish()
	}
}

pub struct DrainWeak<'a, K, C, V>(DrainFilter<'a, K, (C, V), fn(&K, &mut (C, V)) -> bool>);
impl<'a, K, C, V> DrainWeak<'a, K, C, V>
where
	C: Zero,
{
	fn weak_filter(_: &K, (c, _): &mut (C, V)) -> bool {
		c.is_zero()
	}
}
impl<'a, K, C, V> Iterator for DrainWeak<'a, K, C, V> {
	type Item = (K, V);

	fn next(&mut self) -> Option<Self::Item> {
		self.0.next().map(|(k, (_, v))| (k, v))
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		self.0.size_hint()
	}
}

/// A reference count over- or underflowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountSaturatedError;
impl Display for CountSaturatedError {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str("reference count saturated")
	}
}
impl std::error::Error for CountSaturatedError {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn shared_values_are_created_once() {
		let mut map = RcHashMap::<&str, u16, String>::new();
		let mut created = 0;
		for _ in 0..3 {
			map.increment_or_insert_with("click", |key| {
				created += 1;
				format!("listener for {}", key)
			})
			.unwrap();
		}
		assert_eq!(created, 1);
		assert_eq!(map.get("click").map(String::as_str), Some("listener for click"));
	}

	#[test]
	fn only_released_entries_are_drained() {
		let mut map = RcHashMap::<u8, u8, ()>::new();
		map.increment_or_insert_with(1, |_| ()).unwrap();
		map.increment_or_insert_with(1, |_| ()).unwrap();
		map.increment_or_insert_with(2, |_| ()).unwrap();

		map.weak_decrement(&1).unwrap();
		map.weak_decrement(&2).unwrap();
		let drained: Vec<_> = map.drain_weak().map(|(k, ())| k).collect();
		assert_eq!(drained, vec![2]);
		assert_eq!(map.len(), 1);

		map.weak_decrement(&1).unwrap();
		assert_eq!(map.weak_decrement(&1), Err(CountSaturatedError));
		assert_eq!(map.weak_decrement(&3), Ok(None));
	}

	#[test]
	fn saturated_counts_are_reported() {
		let mut map = RcHashMap::<u8, u8, ()>::new();
		for _ in 0..u8::MAX {
			map.increment_or_insert_with(0, |_| ()).unwrap();
		}
		assert!(map.increment_or_insert_with(0, |_| ()).is_err());
	}
}
