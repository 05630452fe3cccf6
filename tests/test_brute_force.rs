//! Brute-force worklist engine

use mendel::config::Config;
use mendel::context::CoreContext;
use mendel::edit::Edit;
use mendel::fitness::{CachedFitness, SourceTestFitness};
use mendel::localization::WeightedPath;
use mendel::rep::patch::PatchRep;
use mendel::rep::Variant;
use mendel::search::brute;
use mendel::store::AtomStore;

const BUGGY: &str =
    "int main() {\n    int a = 0;\n    a = a + 1;\n    return a;\n}\n";

fn variant(fault: &[(usize, f64)], config: Config) -> PatchRep {
    let store = AtomStore::load_sources(vec![("test.c".into(), BUGGY.into())]).unwrap();
    let ctx = CoreContext::shared(store, config);
    let mut v = PatchRep::new(ctx);
    let fix = v.fix_localization().clone();
    v.set_localization(WeightedPath::from_pairs(fault.iter().copied()), fix);
    v
}

#[test]
fn worklist_weights_follow_the_operator_discounts() {
    let v = variant(&[(2, 1.0), (3, 0.5)], Config::default());
    let items = brute::worklist(&v);

    let weight_of = |edit: &Edit| {
        items
            .iter()
            .find(|(_, e)| e == edit)
            .map(|(w, _)| *w)
            .unwrap_or_else(|| panic!("{edit} not enumerated"))
    };

    assert_eq!(weight_of(&Edit::Delete(2)), 1.0);
    assert_eq!(weight_of(&Edit::Delete(3)), 0.5);
    // Append: fault(2) · fix(1) · 0.9
    assert_eq!(weight_of(&Edit::Append(2, 1)), 0.9);
    // Swap: fault(2) · fault(3) · 0.8, enumerated once with x < y
    assert_eq!(weight_of(&Edit::Swap(2, 3)), 0.4);
    assert!(!items.iter().any(|(_, e)| matches!(e, Edit::Swap(3, 2))));
}

#[test]
fn worklist_order_is_reproducible() {
    let v = variant(&[(1, 0.5), (2, 0.5), (3, 0.5)], Config::default());
    let a = brute::worklist(&v);
    let b = brute::worklist(&v);
    assert_eq!(a.len(), b.len());
    assert!(a.iter().zip(&b).all(|(x, y)| x.1 == y.1 && x.0 == y.0));
}

#[test]
fn subatom_candidates_appear_when_enabled() {
    let mut config = Config::default();
    config.use_subatoms = true;
    let v = variant(&[(2, 1.0)], config);
    let items = brute::worklist(&v);

    // Zero-substitution on the rhs of `a = a + 1;`
    assert!(items.iter().any(|(w, e)| {
        *w == 0.9
            && matches!(
                e,
                Edit::ReplaceSubatom {
                    dest: 2,
                    index: 0,
                    expr: mendel::ast::Expr::Const(0),
                }
            )
    }));
    // Donor-copy substitutions exist too.
    assert!(items.iter().any(|(_, e)| {
        matches!(e, Edit::ReplaceSubatom { dest: 2, expr, .. } if *expr != mendel::ast::Expr::Const(0))
    }));
}

#[test]
fn sweep_repairs_the_counter() {
    // The suite wants main to return 0; deleting the increment does it.
    let v = variant(&[(2, 1.0), (1, 0.3), (3, 0.3)], Config::default());
    let mut fitness = CachedFitness::new(SourceTestFitness::new(vec![
        Box::new(|s: &str| s.contains("int a = 0;")),
        Box::new(|s: &str| s.contains("return a;")),
        Box::new(|s: &str| !s.contains("a + 1")),
    ]));

    let outcome = brute::search(&v, &mut fitness);
    let repair = outcome.repair().expect("sweep should find the deletion");
    assert_eq!(repair.history(), &[Edit::Delete(2)]);
    // Delete(2) carries the top weight, so it is evaluated first.
    assert_eq!(outcome.stats().variants_evaluated, 1);
}

#[test]
fn unsolvable_suite_exhausts_with_a_best() {
    let v = variant(&[(2, 1.0)], Config::default());
    let mut fitness = SourceTestFitness::new(vec![
        Box::new(|s: &str| s.contains("return a;")),
        Box::new(|_: &str| false),
    ]);

    let outcome = brute::search(&v, &mut fitness);
    assert!(!outcome.is_repaired());
    match outcome {
        mendel::search::RepairOutcome::Exhausted { best, stats } => {
            assert!(stats.variants_evaluated > 0);
            let (_, score) = best.expect("something was evaluated");
            assert!(score >= 1.0, "the always-true predicate passes");
        }
        _ => unreachable!(),
    }
}
