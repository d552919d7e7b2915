//! Drag-and-drop reordering over ordered records.
//!
//! All functions are pure: they take a slice and return a new vector.
use super::{Category, Directory, Prompt};

/// A record with an id and a sort position among its siblings.
pub trait Ordered: Clone {
    fn id(&self) -> &str;
    fn order(&self) -> i64;
    fn set_order(&mut self, order: i64);

    /// Tiebreak between equal `order`s in display order.
    fn created_at(&self) -> i64 {
        0
    }
}

macro_rules! impl_ordered {
    ($($ty:ty),*) => {
        $(impl Ordered for $ty {
            fn id(&self) -> &str {
                &self.id
            }
            fn order(&self) -> i64 {
                self.order
            }
            fn set_order(&mut self, order: i64) {
                self.order = order;
            }
        })*
    };
}

impl_ordered!(Category, Directory);

impl Ordered for Prompt {
    fn id(&self) -> &str {
        &self.id
    }
    fn order(&self) -> i64 {
        self.order
    }
    fn set_order(&mut self, order: i64) {
        self.order = order;
    }
    fn created_at(&self) -> i64 {
        self.create_time
    }
}

/// Move the element at `from` to `to` and renumber every element's `order`
/// to its new index. Returns `None` when either index is out of bounds.
pub fn reindex<T: Ordered>(items: &[T], from: usize, to: usize) -> Option<Vec<T>> {
    if from >= items.len() || to >= items.len() {
        return None;
    }

    let mut out = items.to_vec();
    let moved = out.remove(from);
    out.insert(to, moved);
    for (index, item) in out.iter_mut().enumerate() {
        item.set_order(index as i64);
    }
    Some(out)
}

/// Reorder only the elements matching `in_scope`, moving `from_id` onto the
/// position of `to_id` within that partition.
///
/// Positions are taken from display order (`order`, then `created_at`), not
/// from slots in `all`. The partition is renumbered `0..n` and written back
/// into its slots in that order; out-of-scope elements keep both their
/// `order` and their slots in the returned vector. When either id is missing
/// from the partition the input is returned unchanged.
pub fn scoped_reindex<T, P>(all: &[T], in_scope: P, from_id: &str, to_id: &str) -> Vec<T>
where
    T: Ordered,
    P: Fn(&T) -> bool,
{
    let mut scoped: Vec<T> = all.iter().filter(|item| in_scope(item)).cloned().collect();
    scoped.sort_by_key(|item| (item.order(), item.created_at()));

    let from = scoped.iter().position(|item| item.id() == from_id);
    let to = scoped.iter().position(|item| item.id() == to_id);
    let (Some(from), Some(to)) = (from, to) else {
        return all.to_vec();
    };

    let Some(reordered) = reindex(&scoped, from, to) else {
        return all.to_vec();
    };

    let mut reordered = reordered.into_iter();
    all.iter()
        .map(|item| {
            if in_scope(item) {
                reordered.next().unwrap_or_else(|| item.clone())
            } else {
                item.clone()
            }
        })
        .collect()
}

/// Position for appending to a group: one past the highest `order`, or `0`
/// for an empty group.
pub fn next_order<'a, T, I>(items: I) -> i64
where
    T: Ordered + 'a,
    I: IntoIterator<Item = &'a T>,
{
    items
        .into_iter()
        .map(Ordered::order)
        .max()
        .map_or(0, |max| max + 1)
}
