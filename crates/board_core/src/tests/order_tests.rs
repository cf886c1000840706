use super::*;
use shared::domain::{GroupId, Item};

use crate::materialize::{item_set, materialize};

fn key(value: &str) -> NodeKey {
    NodeKey::from(value)
}

fn order(links: &[(&str, &str)]) -> OrderIndex {
    links.iter().map(|(k, v)| (key(k), key(v))).collect()
}

fn two_columns() -> OrderIndex {
    order(&[("A", "1"), ("1", "2"), ("2", "A"), ("B", "3"), ("3", "B")])
}

fn column_ids(order: &OrderIndex, group: &str) -> Vec<String> {
    let items = item_set(["1", "2", "3", "4"].map(|id| Item::new(id, id)));
    materialize(&items, order, &GroupId::from(group))
        .expect("materialize")
        .into_iter()
        .map(|item| item.id.0)
        .collect()
}

fn assert_minimal(order: &OrderIndex, patch: &Patch) {
    for (node, next) in patch.iter() {
        assert_ne!(
            order.next_of(node),
            next.as_ref(),
            "patch entry for {node} does not change anything"
        );
    }
}

#[test]
fn cross_group_move_rewrites_three_links() {
    let before = two_columns();
    let patch = try_build_move_patch(&before, &key("3"), Some(&key("1"))).expect("patch");

    assert_eq!(patch.len(), 3);
    assert_eq!(patch.get(&key("B")), Some(&Some(key("B"))));
    assert_eq!(patch.get(&key("3")), Some(&Some(key("2"))));
    assert_eq!(patch.get(&key("1")), Some(&Some(key("3"))));

    let mut after = before.clone();
    after.merge(&patch);
    assert_eq!(
        after,
        order(&[("A", "1"), ("1", "3"), ("3", "2"), ("2", "A"), ("B", "B")])
    );
    assert_eq!(column_ids(&after, "A"), vec!["1", "3", "2"]);
    assert!(column_ids(&after, "B").is_empty());
}

#[test]
fn moving_after_current_predecessor_is_empty() {
    let before = two_columns();
    assert!(try_build_move_patch(&before, &key("2"), Some(&key("1")))
        .expect("patch")
        .is_empty());
    assert!(try_build_move_patch(&before, &key("1"), Some(&key("A")))
        .expect("patch")
        .is_empty());
}

#[test]
fn moving_after_itself_is_empty() {
    let before = two_columns();
    assert!(try_build_move_patch(&before, &key("1"), Some(&key("1")))
        .expect("patch")
        .is_empty());
}

#[test]
fn moving_after_own_successor_swaps_neighbours() {
    let before = two_columns();
    let patch = try_build_move_patch(&before, &key("1"), Some(&key("2"))).expect("patch");
    assert_minimal(&before, &patch);

    let mut after = before.clone();
    after.merge(&patch);
    assert_eq!(column_ids(&after, "A"), vec!["2", "1"]);
    assert_eq!(column_ids(&after, "B"), vec!["3"]);
}

#[test]
fn moving_to_front_of_group_targets_the_sentinel() {
    let before = two_columns();
    let patch = try_build_move_patch(&before, &key("2"), Some(&key("A"))).expect("patch");
    assert_minimal(&before, &patch);

    let mut after = before.clone();
    after.merge(&patch);
    assert_eq!(column_ids(&after, "A"), vec!["2", "1"]);
}

#[test]
fn move_round_trip_restores_order() {
    let before = two_columns();
    let original_predecessor = before.predecessor_of(&key("2")).cloned().expect("pred");

    let mut moved = before.clone();
    moved.merge(&try_build_move_patch(&before, &key("2"), Some(&key("3"))).expect("patch"));
    assert_eq!(column_ids(&moved, "A"), vec!["1"]);
    assert_eq!(column_ids(&moved, "B"), vec!["3", "2"]);

    let back = try_build_move_patch(&moved, &key("2"), Some(&original_predecessor)).expect("patch");
    moved.merge(&back);
    assert_eq!(moved, before);
}

#[test]
fn unlink_only_patch_closes_the_gap() {
    let before = order(&[("A", "1"), ("1", "2"), ("2", "A")]);
    let patch = try_build_move_patch(&before, &key("2"), None).expect("patch");

    assert_eq!(patch.len(), 1);
    assert_eq!(patch.get(&key("1")), Some(&Some(key("A"))));
}

#[test]
fn inserting_a_self_loop_after_an_empty_sentinel() {
    let mut seeded = order(&[("C", "C")]);
    seeded.set(key("n"), key("n"));

    let patch = try_build_move_patch(&seeded, &key("n"), Some(&key("C"))).expect("patch");
    seeded.merge(&patch);
    assert_eq!(seeded, order(&[("C", "n"), ("n", "C")]));
}

#[test]
fn patches_are_minimal_for_every_pair() {
    let before = order(&[
        ("A", "1"),
        ("1", "2"),
        ("2", "A"),
        ("B", "3"),
        ("3", "4"),
        ("4", "B"),
    ]);
    let nodes = ["A", "B", "1", "2", "3", "4"];
    for subject in ["1", "2", "3", "4"] {
        for target in nodes {
            let patch =
                try_build_move_patch(&before, &key(subject), Some(&key(target))).expect("patch");
            assert_minimal(&before, &patch);
            assert!(patch.len() <= 3);

            let mut after = before.clone();
            after.merge(&patch);
            let total = column_ids(&after, "A").len() + column_ids(&after, "B").len();
            assert_eq!(total, 4, "moving {subject} after {target} lost an item");
        }
    }
}

#[test]
fn untracked_subject_yields_empty_lenient_patch() {
    let before = two_columns();
    assert!(matches!(
        try_build_move_patch(&before, &key("9"), Some(&key("1"))),
        Err(OrderError::UnknownNode { .. })
    ));
    assert!(build_move_patch(&before, &key("9"), Some(&key("1"))).is_empty());
}

#[test]
fn subject_without_predecessor_is_reported() {
    let broken = order(&[("A", "A"), ("1", "A")]);
    let err = try_build_move_patch(&broken, &key("1"), Some(&key("A"))).expect_err("no pred");
    assert_eq!(err, OrderError::PredecessorNotFound { node: key("1") });
    assert!(err.is_corruption());
    assert!(build_move_patch(&broken, &key("1"), Some(&key("A"))).is_empty());
}

#[test]
fn untracked_target_is_reported() {
    let before = two_columns();
    let err = try_build_move_patch(&before, &key("1"), Some(&key("gone"))).expect_err("target");
    assert!(!err.is_corruption());
}

#[test]
fn validate_accepts_consistent_index() {
    let groups = vec![Group::new("A", "a"), Group::new("B", "b")];
    let items = item_set(["1", "2", "3"].map(|id| Item::new(id, id)));
    two_columns().validate(&groups, &items).expect("valid");
}

#[test]
fn validate_reports_orphans_and_missing_heads() {
    let groups = vec![Group::new("A", "a"), Group::new("B", "b")];
    let items = item_set(["1", "2", "3"].map(|id| Item::new(id, id)));

    let missing_head = order(&[("A", "1"), ("1", "2"), ("2", "A")]);
    assert!(matches!(
        missing_head.validate(&groups, &items),
        Err(OrderError::MissingHead { .. })
    ));

    let orphan = order(&[("A", "1"), ("1", "2"), ("2", "A"), ("B", "B"), ("3", "B")]);
    assert_eq!(
        orphan.validate(&groups, &items),
        Err(OrderError::OrphanItem { item: "3".into() })
    );
}

#[test]
fn validate_reports_crossed_groups() {
    let groups = vec![Group::new("A", "a"), Group::new("B", "b")];
    let items = item_set(["1"].map(|id| Item::new(id, id)));
    let crossed = order(&[("A", "1"), ("1", "B"), ("B", "A")]);
    assert!(matches!(
        crossed.validate(&groups, &items),
        Err(OrderError::CrossedGroups { .. })
    ));
}
