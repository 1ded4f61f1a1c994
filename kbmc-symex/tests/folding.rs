use kbmc_irep::{BinaryOp, Expr, Type};
use kbmc_symex::{SimplifyingSolver, Solver, SolverResult, simplify};
use proptest::{
    prelude::{any, prop},
    test_runner::{Config, TestCaseError, TestRunner},
};

fn ops() -> [BinaryOp; 6] {
    [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::BitAnd,
        BinaryOp::BitOr,
        BinaryOp::BitXor,
    ]
}

fn reference(op: BinaryOp, a: i8, b: i8) -> i8 {
    match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        _ => a ^ b,
    }
}

#[test]
fn constant_folding_matches_machine_arithmetic() {
    let mut runner = TestRunner::new(Config {
        cases: 128,
        ..Config::default()
    });
    let s8 = Type::signed_bv(8).unwrap();

    runner
        .run(&(0..ops().len(), any::<i8>(), any::<i8>()), |(i, a, b)| {
            let op = ops()[i];
            let e = Expr::binary(
                op,
                s8.clone(),
                Expr::int(i128::from(a), s8.clone()).unwrap(),
                Expr::int(i128::from(b), s8.clone()).unwrap(),
            )
            .unwrap();
            let folded = simplify(&e).unwrap();
            if folded.as_int() != Some(i128::from(reference(op, a, b))) {
                return Err(TestCaseError::fail(format!("{e} folded to {folded}")));
            }
            Ok(())
        })
        .unwrap();
}

#[test]
fn enumeration_agrees_with_brute_force() {
    let mut runner = TestRunner::new(Config {
        cases: 32,
        ..Config::default()
    });
    let u4 = Type::unsigned_bv(4).unwrap();

    runner
        .run(&prop::collection::vec(0u8..16, 1..4), |forbidden| {
            // x + 1 avoids every forbidden value.
            let x = Expr::symbol("x#0", u4.clone()).unwrap();
            let next = Expr::binary(BinaryOp::Add, u4.clone(), x, Expr::int(1, u4.clone()).unwrap()).unwrap();
            let mut query = Expr::true_expr();
            for v in &forbidden {
                let ne = Expr::not(Expr::eq(next.clone(), Expr::int(i128::from(*v), u4.clone()).unwrap()).unwrap())
                    .unwrap();
                query = Expr::and(query, ne).unwrap();
            }

            let mut solver = SimplifyingSolver::default();
            let got = solver.check(&[query]).unwrap();
            if got != SolverResult::Sat {
                return Err(TestCaseError::fail(format!("{got:?} for {forbidden:?}")));
            }
            let x = solver.model().and_then(|m| m.get("x#0").and_then(Expr::as_int));
            if let Some(x) = x {
                if forbidden.contains(&(((x + 1) % 16) as u8)) {
                    return Err(TestCaseError::fail("model hits a forbidden value"));
                }
            }
            Ok(())
        })
        .unwrap();
}
