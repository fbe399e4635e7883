use core::{iter::FusedIterator, ptr};

use crate::{AvlTree, Node};

/// An in-order iterator over the entries of an [`AvlTree`].
///
/// The iterator follows parent links instead of keeping a stack, so it needs no allocation.
pub struct Iter<'tree, K, V> {
    front: Option<&'tree Node<K, V>>,
    back: Option<&'tree Node<K, V>>,

    len: usize,
}

impl<'tree, K, V> Iter<'tree, K, V> {
    pub(crate) fn new(tree: &'tree AvlTree<K, V>) -> Self {
        Iter {
            front: tree.root().map(leftmost),
            back: tree.root().map(rightmost),
            len: tree.len(),
        }
    }
}

fn leftmost<K, V>(mut cur: &Node<K, V>) -> &Node<K, V> {
    while let Some(left) = cur.left() {
        cur = left;
    }

    cur
}

fn rightmost<K, V>(mut cur: &Node<K, V>) -> &Node<K, V> {
    while let Some(right) = cur.right() {
        cur = right;
    }

    cur
}

// Returns the node visited after `cur` by an in-order walk.
fn next_in_order<K, V>(cur: &Node<K, V>) -> Option<&Node<K, V>> {
    // If the right subtree is not empty, its minimum is next.
    if let Some(right) = cur.right() {
        return Some(leftmost(right));
    }

    // Otherwise, ascend until we arrive from a left child.
    let mut cur = cur;
    while let Some(parent) = cur.parent() {
        if parent.left().is_some_and(|left| ptr::eq(left, cur)) {
            return Some(parent);
        }

        cur = parent;
    }

    None
}

// Returns the node visited before `cur` by an in-order walk.
fn prev_in_order<K, V>(cur: &Node<K, V>) -> Option<&Node<K, V>> {
    if let Some(left) = cur.left() {
        return Some(rightmost(left));
    }

    let mut cur = cur;
    while let Some(parent) = cur.parent() {
        if parent.right().is_some_and(|right| ptr::eq(right, cur)) {
            return Some(parent);
        }

        cur = parent;
    }

    None
}

impl<'tree, K, V> Iterator for Iter<'tree, K, V> {
    type Item = (&'tree K, &'tree V);

    fn next(&mut self) -> Option<Self::Item> {
        // The front and back ends meet once `len` runs out.
        if self.len == 0 {
            return None;
        }

        let cur = self.front?;
        self.front = next_in_order(cur);
        self.len -= 1;

        Some((cur.key(), cur.value()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<'tree, K, V> DoubleEndedIterator for Iter<'tree, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }

        let cur = self.back?;
        self.back = prev_in_order(cur);
        self.len -= 1;

        Some((cur.key(), cur.value()))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Iter {
            front: self.front,
            back: self.back,
            len: self.len,
        }
    }
}
