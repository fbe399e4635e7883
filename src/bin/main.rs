use std::env;

use cordyceps_avl::AvlTree;

const DEFAULT_KEYS: [i64; 7] = [5, 3, 8, 1, 4, 7, 9];

fn report(tree: &AvlTree<i64, String>) {
    println!("in order: {:?}", tree.in_order());
    println!("tree:     {tree}");

    let balance = tree.root().map_or(0, |root| root.balance_factor());
    println!(
        "count={} height={} root balance={balance:+}",
        tree.len(),
        tree.height()
    );
}

fn main() {
    env_logger::init();

    let mut keys: Vec<i64> = env::args()
        .skip(1)
        .filter_map(|arg| match arg.parse() {
            Ok(key) => Some(key),
            Err(err) => {
                log::warn!("skipping {arg:?}: {err}");
                None
            }
        })
        .collect();

    if keys.is_empty() {
        keys.extend(DEFAULT_KEYS);
    }

    let mut tree = AvlTree::new();
    for &key in &keys {
        tree.insert(key, key.to_string());
    }
    report(&tree);

    let first = keys[0];
    match tree.remove(&first) {
        Some(value) => println!("\nremoved {first} ({value})"),
        None => println!("\n{first} was not present"),
    }
    report(&tree);

    let mut dot = String::new();
    if let Err(err) = tree.dotgraph("avl", &mut dot) {
        log::error!("failed to render dotgraph: {err}");
        return;
    }
    println!("\n{dot}");
}
