//! Model-based testing support: runs operation sequences against an [`AvlTree`] and a sorted
//! `Vec` holding the same multiset of keys, checking every result and the tree invariants.

use arbitrary::Arbitrary;
use proptest::strategy::{Just, Strategy};

use crate::AvlTree;

/// The value stored with every key, so that duplicate keys carry identical values.
pub fn value_for(key: u32) -> u64 {
    u64::from(key) * 3 + 1
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum ItemValue {
    Index(usize),
    Random(u32),
}

proptest::prop_compose! {
    fn index_strategy()(
        index in 0usize..1000,
    ) -> ItemValue {
        ItemValue::Index(index)
    }
}

proptest::prop_compose! {
    fn random_strategy()(
        random in 0u32..1000,
    ) -> ItemValue {
        ItemValue::Random(random)
    }
}

fn value_strategy() -> impl Strategy<Value = ItemValue> {
    proptest::prop_oneof![index_strategy(), random_strategy()]
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    Insert(ItemValue),
    InsertOrReplace(ItemValue),
    Contains(ItemValue),
    Get(ItemValue),
    Remove(ItemValue),
    Min,
    Max,
    InOrder,
}

impl Op {
    fn finalize(self, sorted: &[u32]) -> FinalOp {
        // `Index` picks a key already in the tree when there is one.
        fn get_value(v: &[u32], i: ItemValue) -> u32 {
            match i {
                ItemValue::Index(idx) => {
                    if v.is_empty() {
                        idx as u32
                    } else {
                        v[idx % v.len()]
                    }
                }
                ItemValue::Random(v) => v,
            }
        }

        match self {
            Op::Insert(item) => FinalOp::Insert(get_value(sorted, item)),
            Op::InsertOrReplace(item) => FinalOp::InsertOrReplace(get_value(sorted, item)),
            Op::Contains(item) => FinalOp::Contains(get_value(sorted, item)),
            Op::Get(item) => FinalOp::Get(get_value(sorted, item)),
            Op::Remove(item) => FinalOp::Remove(get_value(sorted, item)),
            Op::Min => FinalOp::Min,
            Op::Max => FinalOp::Max,
            Op::InOrder => FinalOp::InOrder,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum FinalOp {
    Insert(u32),
    InsertOrReplace(u32),
    Contains(u32),
    Get(u32),
    Remove(u32),
    Min,
    Max,
    InOrder,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        value_strategy().prop_map(Op::Insert),
        value_strategy().prop_map(Op::InsertOrReplace),
        value_strategy().prop_map(Op::Contains),
        value_strategy().prop_map(Op::Get),
        value_strategy().prop_map(Op::Remove),
        Just(Op::Min),
        Just(Op::Max),
        Just(Op::InOrder),
    ]
}

pub fn run_model_equivalence(ops: Vec<Op>) {
    let mut sorted_keys: Vec<u32> = Vec::with_capacity(ops.len());
    let mut tree: AvlTree<u32, u64> = AvlTree::new();

    fn insert_sorted(v: &mut Vec<u32>, key: u32) {
        // Duplicates land after their equals, like in the tree.
        let idx = v.partition_point(|&k| k <= key);
        v.insert(idx, key);
    }

    fn remove_sorted(v: &mut Vec<u32>, key: u32) -> bool {
        match v.binary_search(&key) {
            Ok(idx) => {
                v.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    for (op_id, op) in ops.into_iter().enumerate() {
        let final_op = op.finalize(&sorted_keys);

        match final_op {
            FinalOp::Insert(key) => {
                insert_sorted(&mut sorted_keys, key);
                tree.insert(key, value_for(key));
            }

            FinalOp::InsertOrReplace(key) => {
                let from_model = if sorted_keys.binary_search(&key).is_ok() {
                    Some(value_for(key))
                } else {
                    insert_sorted(&mut sorted_keys, key);
                    None
                };
                let from_tree = tree.insert_or_replace(key, value_for(key));

                assert_eq!(from_model, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Contains(key) => {
                let from_model = sorted_keys.binary_search(&key).is_ok();
                let from_tree = tree.contains(&key);

                assert_eq!(from_model, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Get(key) => {
                let from_model = sorted_keys
                    .binary_search(&key)
                    .ok()
                    .map(|_| value_for(key));
                let from_tree = tree.get(&key).copied();

                assert_eq!(from_model, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Remove(key) => {
                let from_model = remove_sorted(&mut sorted_keys, key).then(|| value_for(key));
                let from_tree = tree.remove(&key);

                assert_eq!(from_model, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Min => {
                let from_model = sorted_keys.first().map(|&k| value_for(k));
                let from_tree = tree.min().copied();

                assert_eq!(from_model, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Max => {
                let from_model = sorted_keys.last().map(|&k| value_for(k));
                let from_tree = tree.max().copied();

                assert_eq!(from_model, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::InOrder => {
                let from_model: Vec<u64> = sorted_keys.iter().map(|&k| value_for(k)).collect();
                let from_tree = tree.in_order();

                assert_eq!(from_model, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }
        }

        tree.assert_invariants();
        assert_eq!(sorted_keys.len(), tree.len());
        assert!(sorted_keys.iter().eq(tree.iter().map(|(k, _)| k)));
        assert!(tree.iter().all(|(&k, &v)| v == value_for(k)));
    }
}
