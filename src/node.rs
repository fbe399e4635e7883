use core::{fmt, ptr::NonNull};

use cordyceps::Linked;

use crate::{Dir, Link, Links};

/// A single entry of an [`AvlTree`](crate::AvlTree).
///
/// Nodes are owned by their tree. Callers only ever see shared references to them, starting from
/// [`AvlTree::root`](crate::AvlTree::root), which is enough to walk and draw the tree's shape.
#[repr(C)]
pub struct Node<K, V> {
    links: Links<Node<K, V>>,
    key: K,
    value: V,
}

unsafe impl<K, V> Linked<Links<Node<K, V>>> for Node<K, V> {
    type Handle = Box<Self>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<Node<K, V>>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl<K, V> Node<K, V> {
    pub(crate) fn new(key: K, value: V) -> Box<Self> {
        Box::new(Node {
            links: Links::new(),
            key,
            value,
        })
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub(crate) fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    /// Returns the cached height of the subtree rooted at this node. A leaf has height 0.
    pub fn height(&self) -> i8 {
        self.links.height()
    }

    pub fn parent(&self) -> Option<&Node<K, V>> {
        // SAFETY: Linked nodes belong to the same tree, which outlives `&self`.
        self.links.parent().map(|parent| unsafe { parent.as_ref() })
    }

    pub fn left(&self) -> Option<&Node<K, V>> {
        self.child(Dir::Left)
    }

    pub fn right(&self) -> Option<&Node<K, V>> {
        self.child(Dir::Right)
    }

    fn child(&self, dir: Dir) -> Option<&Node<K, V>> {
        // SAFETY: Linked nodes belong to the same tree, which outlives `&self`.
        self.links.child(dir).map(|child| unsafe { child.as_ref() })
    }

    pub fn is_leaf(&self) -> bool {
        self.links.is_leaf()
    }

    /// Returns the height of the left subtree, or `-1` if it is empty.
    pub fn left_height(&self) -> i8 {
        self.left().map_or(-1, Node::height)
    }

    /// Returns the height of the right subtree, or `-1` if it is empty.
    pub fn right_height(&self) -> i8 {
        self.right().map_or(-1, Node::height)
    }

    /// Returns the height of the left subtree minus the height of the right subtree.
    ///
    /// Between tree operations this is always -1, 0 or 1.
    pub fn balance_factor(&self) -> i8 {
        self.left_height() - self.right_height()
    }

    pub fn is_left_heavy(&self) -> bool {
        self.balance_factor() > 1
    }

    pub fn is_right_heavy(&self) -> bool {
        self.balance_factor() < -1
    }

    /// Returns the rightmost node of the left subtree, if there is a left subtree.
    pub fn predecessor(&self) -> Option<&Node<K, V>> {
        let mut cur = self.left()?;

        while let Some(right) = cur.right() {
            cur = right;
        }

        Some(cur)
    }

    pub(crate) fn replace_entry(&mut self, key: K, value: V) -> (K, V) {
        (
            core::mem::replace(&mut self.key, key),
            core::mem::replace(&mut self.value, value),
        )
    }

    pub(crate) fn into_entry(self: Box<Self>) -> (K, V) {
        let Node { key, value, .. } = *self;
        (key, value)
    }

    // Recomputes the cached height of `node` from its children.
    //
    // Must run after any change to a child pointer, before the balance factor is read.
    pub(crate) unsafe fn update_height(node: NonNull<Self>) {
        unsafe {
            let height = node.as_ref().left_height().max(node.as_ref().right_height()) + 1;
            Self::links(node).as_mut().set_height(height);
        }
    }

    // Returns which child of `parent` the node `child` is.
    unsafe fn which_child(parent: NonNull<Self>, child: NonNull<Self>) -> Dir {
        unsafe {
            if Self::links(parent).as_ref().left() == Some(child) {
                Dir::Left
            } else {
                debug_assert_eq!(
                    Self::links(parent).as_ref().right(),
                    Some(child),
                    "`child` must be a child of `parent`"
                );
                Dir::Right
            }
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // `old_child` must be a child node of `parent`.
    pub(crate) unsafe fn replace_child(
        parent: NonNull<Self>,
        old_child: NonNull<Self>,
        new_child: Link<Self>,
    ) {
        unsafe {
            let dir = Self::which_child(parent, old_child);
            Self::links(parent).as_mut().set_child(dir, new_child);
        }
    }

    // Links `child` as the `dir` child of `node`, pointing the child back at `node`.
    pub(crate) unsafe fn attach(node: NonNull<Self>, dir: Dir, child: Link<Self>) {
        unsafe {
            Self::links(node).as_mut().set_child(dir, child);

            if let Some(child) = child {
                Self::links(child).as_mut().set_parent(Some(node));
            }
        }
    }

    // Rotates the subtree rooted at `node` towards `dir` and returns the new subtree root.
    //
    // The child of `node` opposite to `dir` moves up, `node` moves down into the `dir` slot of that
    // child, and the inner grandchild crosses over into the slot `node` vacated. If `node` had a
    // parent, the parent's child pointer follows the new subtree root. Heights are refreshed for
    // `node` first, then for the node that moved up.
    pub(crate) unsafe fn rotate(node: NonNull<Self>, dir: Dir) -> NonNull<Self> {
        unsafe {
            let up = Self::links(node)
                .as_ref()
                .child(!dir)
                .expect("rotation needs a child to pivot on");

            let across = Self::links(up).as_ref().child(dir);
            Self::links(node).as_mut().set_child(!dir, across);
            if let Some(across) = across {
                Self::links(across).as_mut().set_parent(Some(node));
            }

            Self::links(up).as_mut().set_child(dir, Some(node));
            let parent = Self::links(node).as_mut().set_parent(Some(up));
            Self::links(up).as_mut().set_parent(parent);

            if let Some(parent) = parent {
                Self::replace_child(parent, node, Some(up));
            }

            Self::update_height(node);
            Self::update_height(up);

            log::trace!(
                "rotated {dir:?}: subtree height now {}",
                Self::links(up).as_ref().height()
            );

            up
        }
    }

    #[inline]
    pub(crate) unsafe fn rotate_left(node: NonNull<Self>) -> NonNull<Self> {
        unsafe { Self::rotate(node, Dir::Left) }
    }

    #[inline]
    pub(crate) unsafe fn rotate_right(node: NonNull<Self>) -> NonNull<Self> {
        unsafe { Self::rotate(node, Dir::Right) }
    }

    // Restores the AVL invariant at `node` and returns the (possibly new) subtree root.
    //
    // The children of `node` must already be balanced and `node`'s height must be current.
    pub(crate) unsafe fn rebalance(node: NonNull<Self>) -> NonNull<Self> {
        unsafe {
            let root = if node.as_ref().is_left_heavy() {
                let left = Self::links(node)
                    .as_ref()
                    .left()
                    .expect("left-heavy node has a left child");

                if left.as_ref().left_height() < left.as_ref().right_height() {
                    log::trace!("rebalance: left-right case");
                    Self::rotate_left(left);
                }

                Self::rotate_right(node)
            } else if node.as_ref().is_right_heavy() {
                let right = Self::links(node)
                    .as_ref()
                    .right()
                    .expect("right-heavy node has a right child");

                if right.as_ref().right_height() < right.as_ref().left_height() {
                    log::trace!("rebalance: right-left case");
                    Self::rotate_right(right);
                }

                Self::rotate_left(node)
            } else {
                node
            };

            Self::update_height(root);
            root
        }
    }
}

impl<K: fmt::Display, V: fmt::Display> fmt::Display for Node<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(key={};data={};height={})",
            self.key,
            self.value,
            self.height()
        )
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Node<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("height", &self.height())
            .field("balance_factor", &self.balance_factor())
            .finish()
    }
}
