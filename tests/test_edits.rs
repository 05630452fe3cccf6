//! Edit application semantics on both representation flavors

use mendel::ast::visitor::{walk_stmt, AstVisitor};
use mendel::ast::{AtomId, Stmt};
use mendel::config::Config;
use mendel::context::CoreContext;
use mendel::rep::patch::PatchRep;
use mendel::rep::tree::TreeRep;
use mendel::rep::Variant;
use mendel::store::AtomStore;

fn context(src: &str, config: Config) -> std::sync::Arc<CoreContext> {
    let store = AtomStore::load_sources(vec![("test.c".into(), src.into())]).unwrap();
    CoreContext::shared(store, config)
}

fn patch(src: &str) -> PatchRep {
    PatchRep::new(context(src, Config::default()))
}

fn tree(src: &str) -> TreeRep {
    TreeRep::new(context(src, Config::default()))
}

const COUNTER: &str = "int main() {\n    int a = 0;\n    a = a + 1;\n    return a;\n}\n";

#[test]
fn delete_removes_the_increment() {
    // [1: int a = 0; 2: a = a + 1; 3: return a;]
    let mut v = patch(COUNTER);
    v.delete(2);
    let text = v.pretty_print();
    assert!(!text.contains("a + 1"), "increment must be gone:\n{text}");
    assert!(text.contains("int a = 0;"));
    assert!(text.contains("return a;"));
}

#[test]
fn append_inlines_the_early_return() {
    // After `int a = 0;`, inline a clone of `return a;`; the original
    // increment and return become unreachable tail code.
    let mut v = patch(COUNTER);
    v.append(1, 3);
    let text = v.pretty_print();

    let first_return = text.find("return a;").unwrap();
    let increment = text.find("a = a + 1;").unwrap();
    assert!(
        first_return < increment,
        "cloned return must precede the increment:\n{text}"
    );
    assert_eq!(text.matches("return a;").count(), 2);
}

const TWO_ASSIGNS: &str = "int main() {\n    int x = 9;\n    x = 1;\n    x = 2;\n    return x;\n}\n";

fn assert_order(text: &str, earlier: &str, later: &str) {
    let a = text.find(earlier).unwrap_or_else(|| panic!("`{earlier}` missing:\n{text}"));
    let b = text.find(later).unwrap_or_else(|| panic!("`{later}` missing:\n{text}"));
    assert!(a < b, "expected `{earlier}` before `{later}`:\n{text}");
}

#[test]
fn swap_is_self_inverse_in_patch_form() {
    // [2: x = 1; 3: x = 2;]
    let mut v = patch(TWO_ASSIGNS);
    v.swap(2, 3);
    assert_order(&v.pretty_print(), "x = 2;", "x = 1;");

    v.swap(2, 3);
    assert_order(&v.pretty_print(), "x = 1;", "x = 2;");
}

#[test]
fn swap_is_self_inverse_in_tree_form() {
    let mut v = tree(TWO_ASSIGNS);
    v.swap(2, 3);
    assert_order(&v.pretty_print(), "x = 2;", "x = 1;");

    v.swap(2, 3);
    assert_order(&v.pretty_print(), "x = 1;", "x = 2;");
}

#[test]
fn legacy_swap_bug_mode_appends_at_the_smaller_id() {
    let mut config = Config::default();
    config.swap_bug = true;
    let mut v = PatchRep::new(context(TWO_ASSIGNS, config));
    v.swap(2, 3);
    let text = v.pretty_print();

    // Historical behavior: statement 2 is deleted and statement 3's body
    // is appended in its place, so `x = 2;` now appears twice.
    assert_eq!(text.matches("x = 2;").count(), 2);
    assert_eq!(text.matches("x = 1;").count(), 0);
}

#[test]
fn replace_is_last_write_wins() {
    let mut a = patch(TWO_ASSIGNS);
    a.replace(2, 3);
    a.replace(2, 4);

    let mut b = patch(TWO_ASSIGNS);
    b.replace(2, 4);

    assert_eq!(a.pretty_print(), b.pretty_print());
}

#[test]
fn subatom_replacement_targets_one_slot() {
    let mut v = patch(COUNTER);
    // Statement 2 is `a = a + 1;`; its single subatom is the rhs.
    v.replace_subatom(2, 0, mendel::ast::Expr::zero());
    let text = v.pretty_print();
    assert!(text.contains("a = 0;"));
    assert!(!text.contains("a + 1"));
}

const NESTED: &str = "int f(int n) {\n    if (n > 0) {\n        n = n - 1;\n    }\n    if (n < 0) {\n        n = n + 1;\n    }\n    return n;\n}\n";

struct SidCollector(Vec<AtomId>);

impl AstVisitor for SidCollector {
    fn on_stmt(&mut self, stmt: &Stmt) {
        if stmt.sid != 0 {
            self.0.push(stmt.sid);
        }
    }
}

fn assert_unique_sids<R: Variant>(v: &R) {
    let mut collector = SidCollector(Vec::new());
    for (_, unit) in v.program() {
        for func in &unit.functions {
            for stmt in &func.body.stmts {
                walk_stmt(stmt, &mut collector);
            }
        }
    }
    let mut sids = collector.0;
    let before = sids.len();
    sids.sort_unstable();
    sids.dedup();
    assert_eq!(before, sids.len(), "duplicate non-zero sids in the tree");
}

#[test]
fn no_duplicate_sids_after_nested_swaps() {
    // Swapping two if-statements clones whole subtrees; the fix-up pass
    // must zero the second occurrence of every nested sid.
    let mut p = patch(NESTED);
    p.swap(1, 4);
    assert_unique_sids(&p);

    let mut t = tree(NESTED);
    t.swap(1, 4);
    assert_unique_sids(&t);
}

#[test]
fn no_duplicate_sids_after_append_chains() {
    let mut v = patch(NESTED);
    v.append(7, 1);
    v.append(3, 4);
    v.delete(6);
    assert_unique_sids(&v);
}

#[test]
fn both_flavors_print_the_same_patch() {
    let edits: &[(&str, AtomId, AtomId)] = &[("delete", 2, 0), ("append", 3, 6), ("swap", 3, 6)];
    for (op, x, y) in edits {
        let mut p = patch(NESTED);
        let mut t = tree(NESTED);
        match *op {
            "delete" => {
                p.delete(*x);
                t.delete(*x);
            }
            "append" => {
                p.append(*x, *y);
                t.append(*x, *y);
            }
            "swap" => {
                p.swap(*x, *y);
                t.swap(*x, *y);
            }
            _ => unreachable!(),
        }
        assert_eq!(
            p.pretty_print(),
            t.pretty_print(),
            "flavors diverged on {op}({x}, {y})"
        );
    }
}
