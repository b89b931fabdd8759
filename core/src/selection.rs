use std::collections::BTreeSet;

/// Hashes of the rows currently selected in a grid.
///
/// Membership in the active collection is enforced by the owner
/// ([`crate::view::ViewState`]), which resets the set whenever the collection
/// is replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
	hashes: BTreeSet<String>,
	/// Selection as it was before the last `toggle_all`, restored by the next
	/// `toggle_all` when nothing else changed in between.
	before_toggle_all: Option<BTreeSet<String>>,
}

impl SelectionSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.hashes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.hashes.is_empty()
	}

	pub fn contains(&self, hash: &str) -> bool {
		self.hashes.contains(hash)
	}

	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.hashes.iter().map(String::as_str)
	}

	/// The only selected hash when exactly one row is selected.
	pub fn single(&self) -> Option<&str> {
		if self.hashes.len() == 1 {
			self.iter().next()
		} else {
			None
		}
	}

	/// Flips one row. Returns whether it is selected afterwards.
	pub fn toggle(&mut self, hash: &str) -> bool {
		self.before_toggle_all = None;
		if self.hashes.remove(hash) {
			false
		} else {
			self.hashes.insert(hash.to_string());
			true
		}
	}

	/// Header checkbox. Selects exactly the visible rows unless they are all
	/// selected already, in which case the selection is cleared. A second call
	/// right after undoes the first.
	pub fn toggle_all<'a, I>(&mut self, visible: I)
	where
		I: IntoIterator<Item = &'a str>,
	{
		if let Some(previous) = self.before_toggle_all.take() {
			self.hashes = previous;
			return;
		}
		let visible: BTreeSet<String> = visible.into_iter().map(str::to_string).collect();
		let all_selected = !visible.is_empty() && visible.iter().all(|hash| self.hashes.contains(hash));
		let next = if all_selected {
			BTreeSet::new()
		} else {
			visible
		};
		self.before_toggle_all = Some(std::mem::replace(&mut self.hashes, next));
	}

	pub fn clear(&mut self) {
		self.hashes.clear();
		self.before_toggle_all = None;
	}

	/// Forgets the pending `toggle_all` undo without touching the selection.
	pub fn settle(&mut self) {
		self.before_toggle_all = None;
	}
}
