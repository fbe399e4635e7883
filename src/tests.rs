use std::{cell::Cell, ops::Range, rc::Rc};

use proptest::prelude::*;

use crate::model;

use super::*;

fn keys_of<V>(tree: &AvlTree<u32, V>) -> Vec<u32> {
    tree.iter().map(|(&k, _)| k).collect()
}

fn insert_find_all(keys: &[u32]) {
    let mut tree: AvlTree<u32, u32> = AvlTree::new();

    for &key in keys {
        tree.insert(key, key * 10);
        tree.assert_invariants();
    }

    for key in keys {
        assert!(tree.contains(key), "item not found");
        assert_eq!(tree.get(key), Some(&(key * 10)));
    }
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn two_elems_find() {
    insert_find_all(&[0, 1]);
    insert_find_all(&[1, 0]);
}

#[test]
fn three_elems_find() {
    insert_find_all(&[0, 1, 2]);
    insert_find_all(&[0, 2, 1]);
    insert_find_all(&[1, 0, 2]);
    insert_find_all(&[1, 2, 0]);
    insert_find_all(&[2, 0, 1]);
    insert_find_all(&[2, 1, 0]);
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree: AvlTree<u32, u32> = AvlTree::new();

    for &key in keys {
        tree.insert(key, key);
        tree.assert_invariants();
    }

    for key in keys {
        assert_eq!(tree.remove(key), Some(*key));
        assert!(!tree.contains(key));
        tree.assert_invariants();
    }

    assert!(tree.is_empty());

    for &key in keys {
        tree.insert(key, key);
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        assert_eq!(tree.remove(key), Some(*key));
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn remove_two() {
    insert_remove_all(&[0, 1]);
    insert_remove_all(&[1, 0]);
}

#[test]
fn remove_three() {
    insert_remove_all(&[0, 1, 2]);
    insert_remove_all(&[0, 2, 1]);
    insert_remove_all(&[1, 0, 2]);
    insert_remove_all(&[1, 2, 0]);
    insert_remove_all(&[2, 0, 1]);
    insert_remove_all(&[2, 1, 0]);
}

#[test]
fn remove_four() {
    insert_remove_all(&[0, 1, 2, 3]);
    insert_remove_all(&[0, 1, 3, 2]);
    insert_remove_all(&[0, 2, 1, 3]);
    insert_remove_all(&[0, 2, 3, 1]);
    insert_remove_all(&[0, 3, 1, 2]);
    insert_remove_all(&[0, 3, 2, 1]);

    insert_remove_all(&[1, 0, 2, 3]);
    insert_remove_all(&[1, 0, 3, 2]);
    insert_remove_all(&[1, 2, 0, 3]);
    insert_remove_all(&[1, 2, 3, 0]);
    insert_remove_all(&[1, 3, 0, 2]);
    insert_remove_all(&[1, 3, 2, 0]);

    insert_remove_all(&[2, 0, 1, 3]);
    insert_remove_all(&[2, 0, 3, 1]);
    insert_remove_all(&[2, 1, 0, 3]);
    insert_remove_all(&[2, 1, 3, 0]);
    insert_remove_all(&[2, 3, 0, 1]);
    insert_remove_all(&[2, 3, 1, 0]);

    insert_remove_all(&[3, 0, 1, 2]);
    insert_remove_all(&[3, 0, 2, 1]);
    insert_remove_all(&[3, 1, 0, 2]);
    insert_remove_all(&[3, 1, 2, 0]);
    insert_remove_all(&[3, 2, 0, 1]);
    insert_remove_all(&[3, 2, 1, 0]);
}

#[test]
fn remove_many_interleaved() {
    let keys: Vec<u32> = (0..200).map(|i| (i * 73) % 200).collect();
    insert_remove_all(&keys);
}

fn scenario_a() -> AvlTree<u32, &'static str> {
    let mut tree = AvlTree::new();
    for (key, value) in [
        (5, "five"),
        (3, "three"),
        (8, "eight"),
        (1, "one"),
        (4, "four"),
        (7, "seven"),
        (9, "nine"),
    ] {
        tree.insert(key, value);
    }
    tree
}

#[test]
fn balanced_insertion_order() {
    let tree = scenario_a();
    tree.assert_invariants();

    assert_eq!(
        tree.in_order(),
        ["one", "three", "four", "five", "seven", "eight", "nine"]
    );
    assert_eq!(tree.len(), 7);

    let root = tree.root().expect("tree is not empty");
    assert!((-1..=1).contains(&root.balance_factor()));
    assert_eq!(*root.key(), 5);
    assert_eq!(tree.height(), 2);
}

#[test]
fn ascending_insertion_rebalances() {
    let mut tree = AvlTree::new();
    for key in 1..=7u32 {
        tree.insert(key, key);
        tree.assert_invariants();
    }

    assert_eq!(tree.height(), 2);
    assert_eq!(tree.root().map(Node::key), Some(&4));
    assert_eq!(keys_of(&tree), [1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn descending_insertion_rebalances() {
    let mut tree = AvlTree::new();
    for key in (1..=15u32).rev() {
        tree.insert(key, ());
        tree.assert_invariants();
    }

    assert_eq!(tree.height(), 3);
}

#[test]
fn remove_node_with_two_children() {
    let mut tree = scenario_a();

    // 3 has children 1 and 4; its predecessor 1 moves into its slot.
    let three = tree.root().and_then(Node::left).expect("3 is the left child");
    assert_eq!(*three.key(), 3);
    let predecessor = three.predecessor().expect("3 has a left subtree");
    assert_eq!(*predecessor.key(), 1);
    let slot: *const Node<u32, &str> = three;

    assert_eq!(tree.remove(&3), Some("three"));
    tree.assert_invariants();

    assert!(!tree.contains(&3));
    assert!(tree.contains(&1));
    assert_eq!(keys_of(&tree), [1, 4, 5, 7, 8, 9]);
    assert_eq!(tree.in_order(), ["one", "four", "five", "seven", "eight", "nine"]);
    assert_eq!(tree.len(), 6);

    // The node keeps its position and takes over the predecessor's entry.
    let moved = tree.root().and_then(Node::left).expect("slot still occupied");
    assert!(core::ptr::eq(moved, slot));
    assert_eq!((*moved.key(), *moved.value()), (1, "one"));
    assert!(moved.left().is_none());
}

#[test]
fn remove_node_with_one_child() {
    let mut tree = AvlTree::new();
    for key in [2, 1, 3, 4] {
        tree.insert(key, key);
    }

    assert_eq!(tree.remove(&3), Some(3));
    tree.assert_invariants();

    let root = tree.root().expect("tree is not empty");
    let four = root.right().expect("4 spliced into 3's place");
    assert_eq!(*four.key(), 4);
    assert!(core::ptr::eq(four.parent().expect("4 has a parent"), root));
    assert_eq!(tree.len(), 3);
}

#[test]
fn remove_root_leaf() {
    let mut tree = AvlTree::new();
    tree.insert(10, "ten");

    assert_eq!(tree.remove(&10), Some("ten"));
    tree.assert_invariants();

    assert!(tree.root().is_none());
    assert_eq!(tree.min(), None);
    assert_eq!(tree.max(), None);
    assert!(tree.is_empty());
}

#[test]
fn remove_root_with_one_child() {
    let mut tree = AvlTree::new();
    tree.insert(1, 'a');
    tree.insert(2, 'b');

    assert_eq!(tree.remove(&1), Some('a'));
    tree.assert_invariants();

    let root = tree.root().expect("2 became the root");
    assert_eq!(*root.key(), 2);
    assert!(root.parent().is_none());
}

#[test]
fn remove_from_empty_tree() {
    let mut tree: AvlTree<u32, u32> = AvlTree::new();

    assert_eq!(tree.remove(&7), None);
    assert_eq!(tree.len(), 0);
    assert!(tree.is_empty());
    tree.assert_invariants();
}

#[test]
fn remove_absent_key_twice() {
    let mut tree = scenario_a();
    let before = tree.to_string();

    assert_eq!(tree.remove(&6), None);
    assert_eq!(tree.to_string(), before);
    assert_eq!(tree.remove(&6), None);
    assert_eq!(tree.to_string(), before);
    assert_eq!(tree.len(), 7);
}

#[test]
fn insert_then_remove_restores_contents() {
    let mut tree = scenario_a();
    let before = tree.in_order();

    tree.insert(6, "six");
    tree.assert_invariants();
    assert_eq!(tree.remove(&6), Some("six"));
    tree.assert_invariants();

    assert_eq!(tree.in_order(), before);
    assert_eq!(keys_of(&tree), [1, 3, 4, 5, 7, 8, 9]);
}

#[test]
fn empty_queries() {
    let tree: AvlTree<u32, u32> = AvlTree::default();

    assert!(!tree.contains(&0));
    assert_eq!(tree.get(&0), None);
    assert_eq!(tree.min(), None);
    assert_eq!(tree.max(), None);
    assert!(tree.in_order().is_empty());
    assert_eq!(tree.iter().next(), None);
    assert_eq!(tree.height(), -1);
}

#[test]
fn min_and_max() {
    let tree = scenario_a();

    assert_eq!(tree.min(), Some(&"one"));
    assert_eq!(tree.max(), Some(&"nine"));
    assert_eq!(tree.min_key_value(), Some((&1, &"one")));
    assert_eq!(tree.max_key_value(), Some((&9, &"nine")));
}

#[test]
fn duplicates_are_kept() {
    let mut tree = AvlTree::new();
    tree.insert(1, "first");
    tree.insert(1, "second");
    tree.insert(1, "third");
    tree.assert_invariants();

    assert_eq!(tree.len(), 3);
    assert_eq!(tree.in_order(), ["first", "second", "third"]);

    assert!(tree.remove(&1).is_some());
    assert!(tree.remove(&1).is_some());
    tree.assert_invariants();
    assert_eq!(tree.len(), 1);

    assert!(tree.remove(&1).is_some());
    assert_eq!(tree.remove(&1), None);
    assert!(tree.is_empty());
}

#[test]
fn duplicate_predecessor_is_removed_exactly() {
    // Build a tree where a two-child node's left subtree holds another copy of the predecessor
    // key, and check no value is duplicated or lost.
    let mut tree = AvlTree::new();
    for (key, value) in [(4, 'a'), (2, 'b'), (6, 'c'), (2, 'd'), (5, 'e'), (2, 'f')] {
        tree.insert(key, value);
        tree.assert_invariants();
    }

    let mut before: Vec<char> = tree.in_order();
    assert_eq!(tree.remove(&4), Some('a'));
    tree.assert_invariants();

    let mut after = tree.in_order();
    before.retain(|&v| v != 'a');
    before.sort_unstable();
    after.sort_unstable();
    assert_eq!(before, after);
}

#[test]
fn insert_or_replace_updates_in_place() {
    let mut tree = scenario_a();

    assert_eq!(tree.insert_or_replace(4, "FOUR"), Some("four"));
    assert_eq!(tree.get(&4), Some(&"FOUR"));
    assert_eq!(tree.len(), 7);

    assert_eq!(tree.insert_or_replace(6, "six"), None);
    assert_eq!(tree.len(), 8);
    tree.assert_invariants();
}

#[test]
fn get_mut_changes_value() {
    let mut tree = scenario_a();

    *tree.get_mut(&8).expect("8 is present") = "ocho";
    assert_eq!(tree.get(&8), Some(&"ocho"));
    assert_eq!(tree.get_mut(&2), None);
}

#[test]
fn in_order_is_a_snapshot() {
    let mut tree = scenario_a();
    let snapshot = tree.in_order();

    tree.remove(&5);
    tree.insert(0, "zero");

    assert_eq!(snapshot.len(), 7);
    assert_eq!(snapshot[3], "five");
    assert_eq!(tree.in_order()[0], "zero");
}

#[test]
fn iter_both_ends() {
    let tree = scenario_a();

    let iter = tree.iter();
    assert_eq!(iter.len(), 7);

    let rev: Vec<u32> = tree.iter().rev().map(|(&k, _)| k).collect();
    assert_eq!(rev, [9, 8, 7, 5, 4, 3, 1]);

    let mut iter = tree.iter();
    assert_eq!(iter.next(), Some((&1, &"one")));
    assert_eq!(iter.next_back(), Some((&9, &"nine")));
    assert_eq!(iter.len(), 5);
    let middle: Vec<u32> = iter.map(|(&k, _)| k).collect();
    assert_eq!(middle, [3, 4, 5, 7, 8]);

    let mut count = 0;
    for (key, value) in &tree {
        assert_eq!(tree.get(key), Some(value));
        count += 1;
    }
    assert_eq!(count, tree.len());
}

struct DropCounter(Rc<Cell<usize>>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

#[test]
fn clear_and_drop_free_every_node() {
    let drops = Rc::new(Cell::new(0));

    let mut tree = AvlTree::new();
    for key in 0..50u32 {
        tree.insert(key, DropCounter(drops.clone()));
    }

    tree.clear();
    assert_eq!(drops.get(), 50);
    assert!(tree.is_empty());
    tree.assert_invariants();

    for key in 0..20u32 {
        tree.insert(key % 7, DropCounter(drops.clone()));
    }
    drop(tree.remove(&3));
    assert_eq!(drops.get(), 51);

    drop(tree);
    assert_eq!(drops.get(), 70);
}

#[test]
fn root_exposes_structure() {
    let tree = scenario_a();
    let root = tree.root().expect("tree is not empty");

    fn check(node: &Node<u32, &str>) -> usize {
        assert!((-1..=1).contains(&node.balance_factor()));
        assert!(!node.is_left_heavy() && !node.is_right_heavy());
        1 + node.left().map_or(0, check) + node.right().map_or(0, check)
    }

    assert_eq!(check(root), tree.len());
}

#[test]
fn borrowed_key_lookup() {
    let mut tree: AvlTree<String, usize> = AvlTree::new();
    for word in ["pear", "apple", "fig"] {
        tree.insert(word.to_owned(), word.len());
    }

    assert!(tree.contains("fig"));
    assert_eq!(tree.get("apple"), Some(&5));
    assert_eq!(tree.remove("pear"), Some(4));
    assert!(!tree.contains("pear"));
}

#[test]
fn send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AvlTree<u32, String>>();
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn model_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_model_equivalence(ops);
    }

    #[test]
    fn any_insertion_order_stays_balanced(keys in proptest::collection::vec(0u32..500, 0..300)) {
        let mut tree = AvlTree::new();
        for &key in &keys {
            tree.insert(key, key);
        }
        tree.assert_invariants();

        // An AVL tree with n nodes has height below 1.45 * log2(n + 2).
        let bound = 1.45 * ((keys.len() + 2) as f64).log2();
        prop_assert!(f64::from(tree.height()) < bound);

        let mut sorted = keys.clone();
        sorted.sort_unstable();
        prop_assert_eq!(tree.in_order(), sorted);
    }
}
