//! Scope-based donor filtering (the semantic check)

use mendel::config::{Config, SemanticCheck};
use mendel::context::CoreContext;
use mendel::localization::WeightedPath;
use mendel::rep::patch::PatchRep;
use mendel::rep::Variant;
use mendel::store::AtomStore;

// Two blocks in one function; `y` is visible only inside the second.
//
//   1: x = x + 1;
//   2: if (x) { 3: int y = 2; 4: x = y; } else { 5: <dummy> }
//   6: return x;
const TWO_BLOCKS: &str = "int f(int x) {\n    x = x + 1;\n    if (x) {\n        int y = 2;\n        x = y;\n    }\n    return x;\n}\n";

fn variant(check: SemanticCheck) -> PatchRep {
    let store = AtomStore::load_sources(vec![("test.c".into(), TWO_BLOCKS.into())]).unwrap();
    let mut config = Config::default();
    config.semantic_check = check;
    let ctx = CoreContext::shared(store, config);
    let mut v = PatchRep::new(ctx);
    let fault = WeightedPath::from_pairs((1..=6).map(|sid| (sid, 1.0)));
    let fix = WeightedPath::from_pairs((1..=6).map(|sid| (sid, 1.0)));
    v.set_localization(fault, fix);
    v
}

#[test]
fn scope_check_excludes_inner_locals() {
    let v = variant(SemanticCheck::Scope);
    // Statement 4 uses the block-local y, so it may not move to the
    // function's top level.
    let sources = v.append_sources(1);
    assert!(!sources.ids().contains(&4));
    // Statement 1 only touches the parameter; it can go anywhere.
    assert!(sources.ids().contains(&1));
    assert!(sources.ids().contains(&6));
}

#[test]
fn no_check_admits_everything() {
    let v = variant(SemanticCheck::None);
    let sources = v.append_sources(1);
    assert_eq!(sources.len(), v.fix_localization().len());
    assert!(sources.ids().contains(&4));
}

#[test]
fn inner_destination_accepts_inner_donors() {
    let v = variant(SemanticCheck::Scope);
    // At statement 4, y is in scope, so 4 itself qualifies elsewhere in
    // its block: the donor filter is about the destination's scope.
    let sources = v.append_sources(4);
    assert!(sources.ids().contains(&4));
    assert!(sources.ids().contains(&1));
}

#[test]
fn swap_needs_both_directions() {
    let v = variant(SemanticCheck::Scope);
    // 1 ↔ 4 fails because y is not in scope at 1.
    assert!(!v.swap_sources(1).ids().contains(&4));
    assert!(!v.swap_sources(4).ids().contains(&1));
    // 1 ↔ 6 is fine in both directions.
    assert!(v.swap_sources(1).ids().contains(&6));
    assert!(v.swap_sources(6).ids().contains(&1));
}

#[test]
fn swap_and_replace_exclude_self() {
    let v = variant(SemanticCheck::None);
    assert!(!v.swap_sources(3).ids().contains(&3));
    assert!(!v.replace_sources(3).ids().contains(&3));
    // Append may duplicate a statement after itself.
    assert!(v.append_sources(3).ids().contains(&3));
}

#[test]
fn weights_pass_through_the_filter() {
    let store = AtomStore::load_sources(vec![("test.c".into(), TWO_BLOCKS.into())]).unwrap();
    let ctx = CoreContext::shared(store, Config::default());
    let mut v = PatchRep::new(ctx);
    v.set_localization(
        WeightedPath::from_pairs([(1, 0.4)]),
        WeightedPath::from_pairs([(6, 0.7), (4, 0.2)]),
    );
    let sources = v.append_sources(1);
    assert_eq!(sources.weight_of(6), 0.7);
    assert_eq!(sources.weight_of(4), 0.0);
}
