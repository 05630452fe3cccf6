//! Genetic search: termination, seeding, crossover

use mendel::config::Config;
use mendel::context::CoreContext;
use mendel::edit::Edit;
use mendel::fitness::{CachedFitness, SourceTestFitness};
use mendel::localization::WeightedPath;
use mendel::rep::patch::PatchRep;
use mendel::rep::tree::TreeRep;
use mendel::rep::Variant;
use mendel::search::ga::GeneticSearch;
use mendel::store::AtomStore;

const BUGGY: &str =
    "int main() {\n    int a = 0;\n    a = a + 1;\n    return a;\n}\n";

fn fitness() -> CachedFitness<SourceTestFitness> {
    CachedFitness::new(SourceTestFitness::new(vec![
        Box::new(|s: &str| s.contains("int a = 0;")),
        Box::new(|s: &str| s.contains("return a;")),
        Box::new(|s: &str| !s.contains("a + 1")),
    ]))
}

fn patch_original(config: Config) -> PatchRep {
    let store = AtomStore::load_sources(vec![("test.c".into(), BUGGY.into())]).unwrap();
    let ctx = CoreContext::shared(store, config);
    let mut v = PatchRep::new(ctx);
    let fix = v.fix_localization().clone();
    v.set_localization(
        WeightedPath::from_pairs([(1, 0.2), (2, 1.0), (3, 0.2)]),
        fix,
    );
    v
}

#[test]
fn seeded_exact_fix_survives_one_generation() {
    // Seed population of 4 including the exact fix, one generation: the
    // engine must report success with fitness at the positive-test count.
    let mut config = Config::default();
    config.ga.generations = 1;
    config.ga.pop_size = 4;
    let original = patch_original(config);

    let mut exact_fix = original.clone();
    exact_fix.delete(2);
    let seeds = vec![exact_fix, original.clone(), original.clone()];

    let mut engine = GeneticSearch::new(original.context(), 1);
    let mut fitness = fitness();
    let outcome = engine.run(&original, seeds, &mut fitness).unwrap();

    let repair = outcome.repair().expect("the seeded fix must be surfaced");
    assert!(repair.history().contains(&Edit::Delete(2)));
    assert_eq!(repair.cached_fitness(), Some(3.0));
    assert_eq!(outcome.stats().generations, 1);
}

#[test]
fn tree_flavor_runs_the_same_search() {
    let mut config = Config::default();
    config.ga.generations = 1;
    config.ga.pop_size = 4;
    let store = AtomStore::load_sources(vec![("test.c".into(), BUGGY.into())]).unwrap();
    let ctx = CoreContext::shared(store, config);
    let mut original = TreeRep::new(ctx);
    let fix = original.fix_localization().clone();
    original.set_localization(WeightedPath::from_pairs([(2, 1.0)]), fix);

    let mut exact_fix = original.clone();
    exact_fix.delete(2);

    let mut engine = GeneticSearch::new(original.context(), 1);
    let mut fitness = fitness();
    let outcome = engine
        .run(&original, vec![exact_fix], &mut fitness)
        .unwrap();
    assert!(outcome.is_repaired());
}

#[test]
fn evolved_repair_without_seeding() {
    // With the increment as the only hot statement and delete among the
    // operators, a few generations find the repair on their own.
    let mut config = Config::default();
    config.ga.generations = 15;
    config.ga.pop_size = 12;
    config.ga.mut_rate = 0.5;
    config.seed = 7;
    let original = patch_original(config);

    let mut engine = GeneticSearch::new(original.context(), 1);
    let mut fitness = fitness();
    let outcome = engine.run(&original, Vec::new(), &mut fitness).unwrap();
    assert!(
        outcome.is_repaired(),
        "expected a repair within 15 generations"
    );
}

#[test]
fn crossover_moves_donor_edits_onto_the_prefix() {
    let original = patch_original(Config::default());

    let mut p1 = original.clone();
    p1.delete(1); // on the prefix
    p1.append(3, 1); // off the prefix
    let mut p2 = original.clone();
    p2.delete(2);

    // Fault path ids are [1, 2, 3]; exchange the prefix [1, 2].
    let mut child = p1.clone();
    child.crossover_prefix(&p2, &[1, 2], &[1, 2]);

    let history = child.history();
    assert!(
        !history.contains(&Edit::Delete(1)),
        "own prefix edit is dropped"
    );
    assert!(
        history.contains(&Edit::Delete(2)),
        "donor prefix edit is adopted"
    );
    assert!(
        history.contains(&Edit::Append(3, 1)),
        "off-prefix edit survives"
    );
    assert!(history
        .iter()
        .any(|e| matches!(e, Edit::Crossover(_, _))));
}

#[test]
fn crossover_marker_is_not_replayed() {
    let original = patch_original(Config::default());
    let mut child = original.clone();
    child.crossover_prefix(&original, &[1], &[1]);

    // The marker shows up in the history but has no effect on the tree.
    assert_eq!(child.pretty_print(), original.pretty_print());
}
