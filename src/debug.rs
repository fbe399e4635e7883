use std::{collections::VecDeque, fmt};

use crate::{AvlTree, Node};

impl<K, V> AvlTree<K, V> {
    /// Writes the tree as a Graphviz digraph.
    ///
    /// Each node is labelled with its key and balance factor, and nodes of equal depth share a
    /// rank. Missing children are drawn as points so the left/right shape stays visible.
    pub fn dotgraph<W>(&self, name: &str, mut w: W) -> fmt::Result
    where
        W: fmt::Write,
        K: fmt::Display,
    {
        let root = match self.root() {
            Some(r) => r,
            None => return write!(w, "digraph \"graph-{name}\" {{}}"),
        };

        enum Item<'a, K, V> {
            Node(&'a Node<K, V>, usize),
            Missing(usize),
        }

        let mut queue = VecDeque::new();
        queue.push_back(Item::Node(root, 0));

        write!(
            w,
            "digraph \"graph-{name}\" {{\n subgraph \"subgraph-{name}\" {{"
        )?;

        // Present and missing nodes draw ids from the same counter.
        let mut next_id = 1;
        let mut links = String::new();

        loop {
            use fmt::Write;
            let remaining = queue.len();
            if remaining == 0 {
                break;
            }

            write!(w, "{{rank=same; ")?;

            for _ in 0..remaining {
                let Some(item) = queue.pop_front() else {
                    break;
                };

                let (node, id) = match item {
                    Item::Node(node, id) => (node, id),
                    Item::Missing(id) => {
                        write!(w, "\"graph{name}-{id}\" [shape=point]; ")?;
                        continue;
                    }
                };

                let key = node.key();
                let balance = node.balance_factor();
                write!(w, "\"graph{name}-{id}\" [label=\"{key}:{balance:+}\"]; ")?;

                for child in [node.left(), node.right()] {
                    let child_id = next_id;
                    next_id += 1;

                    queue.push_back(match child {
                        Some(child) => Item::Node(child, child_id),
                        None => Item::Missing(child_id),
                    });

                    writeln!(links, "\"graph{name}-{id}\" -> \"graph{name}-{child_id}\";")?;
                }
            }

            writeln!(w, "}}")?;
        }

        w.write_str(&links)?;

        w.write_str(" }\n}")
    }
}

/// Renders the whole tree, recursively.
///
/// A leaf is printed as its node, `(key=K;data=E;height=H)`. An inner node is printed as
/// `[left node right]`, with `-` standing in for a missing child. An empty tree prints `(empty)`.
impl<K: fmt::Display, V: fmt::Display> fmt::Display for AvlTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn subtree<K: fmt::Display, V: fmt::Display>(
            f: &mut fmt::Formatter<'_>,
            node: Option<&Node<K, V>>,
        ) -> fmt::Result {
            match node {
                None => f.write_str("-"),
                Some(node) if node.is_leaf() => write!(f, "{node}"),
                Some(node) => {
                    f.write_str("[")?;
                    subtree(f, node.left())?;
                    write!(f, " {node} ")?;
                    subtree(f, node.right())?;
                    f.write_str("]")
                }
            }
        }

        match self.root() {
            None => f.write_str("(empty)"),
            root => subtree(f, root),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for AvlTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
