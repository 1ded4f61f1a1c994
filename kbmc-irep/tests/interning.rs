use std::sync::Arc;

use kbmc_irep::{BinaryOp, Expr, IrepPool, Type};
use proptest::{
    prelude::{any, prop},
    test_runner::{Config, TestCaseError, TestRunner},
};

/// Small arithmetic shape: a left-leaning chain of adds/muls over `x` and constants.
fn build(ops: &[(bool, i8)]) -> Expr {
    let int = Type::signed_bv(32).unwrap();
    let mut acc = Expr::symbol("x", int.clone()).unwrap();
    for (mul, c) in ops {
        let k = Expr::int(i128::from(*c), int.clone()).unwrap();
        let op = if *mul { BinaryOp::Mul } else { BinaryOp::Add };
        acc = Expr::binary(op, int.clone(), acc, k).unwrap();
    }
    acc
}

#[test]
fn interning_is_canonical_for_structurally_equal_inputs() {
    let mut runner = TestRunner::new(Config {
        cases: 64,
        ..Config::default()
    });

    runner
        .run(&prop::collection::vec((any::<bool>(), any::<i8>()), 0..12), |ops| {
            let pool = IrepPool::new();
            let a = pool.intern_expr(build(&ops));
            let b = pool.intern_expr(build(&ops));
            if !a.ptr_eq(&b) {
                return Err(TestCaseError::fail("equal inputs produced distinct handles"));
            }
            if a != build(&ops) {
                return Err(TestCaseError::fail("interning changed the structure"));
            }
            Ok(())
        })
        .unwrap();
}

#[test]
fn pool_is_shareable_across_threads() {
    let pool = Arc::new(IrepPool::new());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || pool.intern_expr(build(&[(false, 1), (true, 3)])))
        })
        .collect();

    let results: Vec<Expr> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for r in &results[1..] {
        assert!(r.ptr_eq(&results[0]));
    }
    let stats = pool.stats();
    assert!(stats.hits >= 3);
}
