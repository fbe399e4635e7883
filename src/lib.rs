//! An AVL tree built from intrusively linked nodes.
//!
//! Every node carries a key, a value, links to its parent and both children, and the cached height
//! of the subtree it roots. Insertion and removal recurse down to the affected slot and, while
//! unwinding, refresh each ancestor's height and rebalance it with single or double rotations.

// Conventions used in comments:
// - The height of an absent subtree is -1; a leaf has height 0.
// - The balance factor of a node `x` is `h(left(x)) - h(right(x))`.
// - `x` is left-heavy if its balance factor is above 1, right-heavy if it is below -1.
//
// The invariants that hold between public operations are:
// 1. Every child's parent link points at the node holding the child; the root has no parent.
// 2. Every cached height equals `max(h(left), h(right)) + 1`.
// 3. Every balance factor is -1, 0 or 1.
// 4. An in-order walk visits keys in non-decreasing order. Equal keys are inserted to the right of
//    each other but may end up on either side after rotations.
// 5. `len` equals the number of nodes reachable from the root.

use core::{
    borrow::Borrow, cell::UnsafeCell, cmp::Ordering, mem, ops::Not, ptr, ptr::NonNull,
};

use cordyceps::Linked;

mod debug;
mod iter;
#[cfg(any(test, feature = "model"))]
pub mod model;
mod node;

#[cfg(test)]
mod tests;

pub use iter::Iter;
pub use node::Node;

/// An ordered map backed by an AVL tree.
///
/// Duplicate keys are allowed: [`insert`](AvlTree::insert) never replaces an existing entry. Use
/// [`insert_or_replace`](AvlTree::insert_or_replace) for map-like update semantics.
///
/// The tree does no internal locking. It is `Send`/`Sync` whenever `K` and `V` are, so concurrent
/// users wrap the whole tree in a lock of their choice.
pub struct AvlTree<K, V> {
    root: Link<Node<K, V>>,
    len: usize,
}

/// Parent, child and height bookkeeping embedded in every [`Node`].
pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    height: i8,
}

type Link<T> = Option<NonNull<T>>;

// SAFETY: The tree exclusively owns its nodes; shared access only hands out `&K` and `&V`.
unsafe impl<K: Send, V: Send> Send for AvlTree<K, V> {}
unsafe impl<K: Sync, V: Sync> Sync for AvlTree<K, V> {}

impl<K, V> AvlTree<K, V> {
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<K, V> {
        AvlTree { root: None, len: 0 }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the height of the tree, or `-1` if it is empty.
    pub fn height(&self) -> i8 {
        self.root().map_or(-1, Node::height)
    }

    /// Returns the root node, for callers that want to inspect or draw the tree's shape.
    pub fn root(&self) -> Option<&Node<K, V>> {
        // SAFETY: The root is owned by `self` and outlives the borrow.
        self.root.map(|root| unsafe { root.as_ref() })
    }

    /// Returns the value associated with the minimum key.
    pub fn min(&self) -> Option<&V> {
        self.min_key_value().map(|(_, value)| value)
    }

    /// Returns the value associated with the maximum key.
    pub fn max(&self) -> Option<&V> {
        self.max_key_value().map(|(_, value)| value)
    }

    /// Returns the minimum key and its value.
    pub fn min_key_value(&self) -> Option<(&K, &V)> {
        let mut cur = self.root()?;

        while let Some(left) = cur.left() {
            cur = left;
        }

        Some((cur.key(), cur.value()))
    }

    /// Returns the maximum key and its value.
    pub fn max_key_value(&self) -> Option<(&K, &V)> {
        let mut cur = self.root()?;

        while let Some(right) = cur.right() {
            cur = right;
        }

        Some((cur.key(), cur.value()))
    }

    /// Returns an iterator over the entries of the tree, in ascending key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(self)
    }

    /// Returns a snapshot of every value in ascending key order.
    ///
    /// The returned vector is independent of the tree and stays valid across later mutations.
    pub fn in_order(&self) -> Vec<V>
    where
        V: Clone,
    {
        fn walk<K, V: Clone>(node: Option<&Node<K, V>>, values: &mut Vec<V>) {
            if let Some(node) = node {
                walk(node.left(), values);
                values.push(node.value().clone());
                walk(node.right(), values);
            }
        }

        let mut values = Vec::with_capacity(self.len);
        walk(self.root(), &mut values);
        values
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let (cur, parent) = Self::leftmost(cur);
                let parent = parent.or_else(|| Node::links(cur).as_ref().parent());

                let right = Node::links(cur).as_ref().right();

                // Elevate the node's right child (which may be None).
                self.replace_child_or_set_root(parent, cur, right);
                if let Some(right) = right {
                    Node::links(right).as_mut().set_parent(parent);
                }

                // Drop the node.
                drop(Node::from_ptr(cur));
                self.len -= 1;

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    // Returns the minimum node in the subtree.
    //
    // If the subtree root is not the minimum, also returns the minimum node's parent.
    #[inline]
    unsafe fn leftmost(root: NonNull<Node<K, V>>) -> (NonNull<Node<K, V>>, Link<Node<K, V>>) {
        let mut parent = None;
        let mut cur = root;

        while let Some(left) = unsafe { Node::links(cur).as_ref().left() } {
            parent = Some(cur);
            cur = left;
        }

        (cur, parent)
    }

    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<Node<K, V>>,
        old_child: NonNull<Node<K, V>>,
        new_child: Link<Node<K, V>>,
    ) {
        match parent {
            Some(parent) => unsafe { Node::replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    // Unlinks `node`, which has at most one child, and elevates `child` into its place.
    //
    // The parent's child pointer and `child`'s parent pointer are both repointed, and `node` is
    // returned fully detached.
    unsafe fn splice_out(
        &mut self,
        node: NonNull<Node<K, V>>,
        child: Link<Node<K, V>>,
    ) -> Box<Node<K, V>> {
        unsafe {
            debug_assert!(
                Node::links(node).as_ref().left().is_none()
                    || Node::links(node).as_ref().right().is_none(),
                "only nodes with at most one child can be spliced out"
            );

            let parent = Node::links(node).as_ref().parent();

            if let Some(child) = child {
                Node::links(child).as_mut().set_parent(parent);
            }

            if let Some(parent) = parent {
                Node::replace_child(parent, node, child);
            }

            let links = Node::links(node).as_mut();
            links.set_parent(None);
            links.set_left(None);
            links.set_right(None);

            self.len -= 1;
            log::debug!(
                "spliced out a node with {} child, {} left",
                if child.is_some() { "one" } else { "no" },
                self.len
            );

            Node::from_ptr(node)
        }
    }
}

impl<K: Ord, V> AvlTree<K, V> {
    /// Returns `true` if the tree contains an element with the given key.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    /// Returns a reference to the value associated with `key`.
    ///
    /// With duplicate keys, this is the first match met on the way down from the root.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(ptr.as_ref().value()) }
    }

    /// Returns a mutable reference to the value associated with `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut ptr = self.get_raw(key)?;
        unsafe { Some(ptr.as_mut().value_mut()) }
    }

    fn get_raw<Q>(&self, key: &Q) -> Link<Node<K, V>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;

        loop {
            let cur = opt_cur?;

            unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => opt_cur = Node::links(cur).as_ref().left(),
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => opt_cur = Node::links(cur).as_ref().right(),
                }
            }
        }
    }

    /// Inserts an element into the tree.
    ///
    /// An existing element with an equal key is kept; the new one is placed after it in key order.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, key: K, value: V) {
        let root = unsafe { self.insert_at(self.root, key, value) };

        debug_assert!(unsafe { Node::links(root).as_ref().parent() }.is_none());
        self.root = Some(root);
    }

    /// Replaces the value of the element with an equal key, or inserts a new element if there is
    /// none.
    ///
    /// Returns the replaced value.
    pub fn insert_or_replace(&mut self, key: K, value: V) -> Option<V> {
        if let Some(slot) = self.get_mut(&key) {
            return Some(mem::replace(slot, value));
        }

        self.insert(key, value);
        None
    }

    // Inserts below `opt_node` and returns the new root of that subtree.
    unsafe fn insert_at(
        &mut self,
        opt_node: Link<Node<K, V>>,
        key: K,
        value: V,
    ) -> NonNull<Node<K, V>> {
        let Some(node) = opt_node else {
            self.len += 1;
            return Node::into_ptr(Node::new(key, value));
        };

        unsafe {
            // Ties descend to the right.
            let dir = match key.cmp(node.as_ref().key()) {
                Ordering::Less => Dir::Left,
                Ordering::Equal | Ordering::Greater => Dir::Right,
            };

            let child = self.insert_at(Node::links(node).as_ref().child(dir), key, value);
            Node::attach(node, dir, Some(child));

            Node::update_height(node);
            Node::rebalance(node)
        }
    }

    /// Removes the element with the given key and returns its value.
    ///
    /// Removing a key that is not present leaves the tree untouched and returns `None`.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (root, removed) = unsafe { self.remove_at(self.root, key) };
        self.root = root;
        removed
    }

    // Removes `key` from the subtree rooted at `opt_node`.
    //
    // Returns the new root of the subtree and the removed value. There are four cases once the
    // descent stops:
    //
    // 1. The node has two children. It stays where it is and takes over the key and value of its
    //    predecessor, which is removed structurally from the left subtree.
    // 2. The node has one child, which is spliced into its place.
    // 3. The node is a leaf and is unlinked from its parent.
    // 4. The slot is empty, so the key is absent and nothing changes.
    unsafe fn remove_at<Q>(
        &mut self,
        opt_node: Link<Node<K, V>>,
        key: &Q,
    ) -> (Link<Node<K, V>>, Option<V>)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let Some(mut node) = opt_node else {
            return (None, None);
        };

        unsafe {
            let left = Node::links(node).as_ref().left();
            let right = Node::links(node).as_ref().right();

            let (subtree, removed) = match key.cmp(node.as_ref().key().borrow()) {
                Ordering::Less => {
                    let (left, removed) = self.remove_at(left, key);
                    Node::attach(node, Dir::Left, left);
                    Node::update_height(node);
                    (Some(node), removed)
                }

                Ordering::Greater => {
                    let (right, removed) = self.remove_at(right, key);
                    Node::attach(node, Dir::Right, right);
                    Node::update_height(node);
                    (Some(node), removed)
                }

                Ordering::Equal => match (left, right) {
                    (Some(left), Some(_)) => {
                        let predecessor = node.as_ref().predecessor().map(NonNull::from);

                        let (left, max) = self.remove_max(left);
                        debug_assert_eq!(predecessor, Some(NonNull::from(&*max)));
                        Node::attach(node, Dir::Left, left);

                        let (key, value) = max.into_entry();
                        let (_, removed) = node.as_mut().replace_entry(key, value);

                        Node::update_height(node);
                        (Some(node), Some(removed))
                    }

                    (Some(child), None) | (None, Some(child)) => {
                        let (_, removed) = self.splice_out(node, Some(child)).into_entry();
                        (Some(child), Some(removed))
                    }

                    (None, None) => {
                        let (_, removed) = self.splice_out(node, None).into_entry();
                        (None, Some(removed))
                    }
                },
            };

            match subtree {
                Some(subtree) => (Some(Node::rebalance(subtree)), removed),
                None => (None, removed),
            }
        }
    }

    // Structurally removes the maximum node of the subtree rooted at `node`.
    //
    // Returns the new root of the subtree and the detached node.
    unsafe fn remove_max(
        &mut self,
        node: NonNull<Node<K, V>>,
    ) -> (Link<Node<K, V>>, Box<Node<K, V>>) {
        unsafe {
            match Node::links(node).as_ref().right() {
                Some(right) => {
                    let (right, max) = self.remove_max(right);
                    Node::attach(node, Dir::Right, right);
                    Node::update_height(node);
                    (Some(Node::rebalance(node)), max)
                }

                None => {
                    let left = Node::links(node).as_ref().left();
                    let max = self.splice_out(node, left);
                    (left.map(|left| Node::rebalance(left)), max)
                }
            }
        }
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        let mut count = 0;

        if let Some(root) = self.root() {
            assert!(root.parent().is_none(), "root must not have a parent");
            Self::assert_invariants_at(root, &mut count);
        }

        assert_eq!(count, self.len, "len does not match the number of reachable nodes");
        assert_eq!(self.iter().count(), self.len);

        let mut keys = self.iter().map(|(key, _)| key);
        if let Some(mut prev) = keys.next() {
            for key in keys {
                assert!(prev <= key, "in-order walk is not sorted");
                prev = key;
            }
        }
    }

    // Checks the subtree rooted at `node` and returns its actual height.
    fn assert_invariants_at(node: &Node<K, V>, count: &mut usize) -> i8 {
        *count += 1;

        let mut heights = [-1; 2];
        for (height, child) in heights.iter_mut().zip([node.left(), node.right()]) {
            if let Some(child) = child {
                // Ensure child's parent link points to this node.
                let parent = child.parent().expect("child parent pointer not set");
                assert!(ptr::eq(parent, node), "child parent pointer is wrong");

                *height = Self::assert_invariants_at(child, count);
            }
        }

        let [left, right] = heights;
        let height = left.max(right) + 1;
        assert_eq!(node.height(), height, "cached height is stale");
        assert!((left - right).abs() <= 1, "AVL balance violated");

        height
    }
}

impl<K, V> Default for AvlTree<K, V> {
    fn default() -> Self {
        AvlTree::new()
    }
}

impl<K, V> Drop for AvlTree<K, V> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<'tree, K, V> IntoIterator for &'tree AvlTree<K, V> {
    type Item = (&'tree K, &'tree V);
    type IntoIter = Iter<'tree, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                height: 0,
            }),
        }
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.left().is_none() && self.right().is_none()
    }

    #[inline]
    fn height(&self) -> i8 {
        unsafe { (*self.inner.get()).height }
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_left(&mut self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    fn set_right(&mut self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    fn set_height(&mut self, height: i8) {
        self.inner.get_mut().height = height;
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}
