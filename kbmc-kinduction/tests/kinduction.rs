use std::sync::Arc;

use kbmc_goto::{GotoFunction, GotoProgram, InstrKind, Property, PropertySet};
use kbmc_irep::{BinaryOp, Expr, IrepPool, SourceLocation, Type};
use kbmc_kinduction::{KInduction, KInductionConfig, Step, StepOutcome, StepRunner, Verdict};
use kbmc_symex::SimplifyingSolverFactory;

fn u8t() -> Type {
    Type::unsigned_bv(8).unwrap()
}

fn i() -> Expr {
    Expr::symbol("main::i", u8t()).unwrap()
}

fn k(v: i128) -> Expr {
    Expr::int(v, u8t()).unwrap()
}

fn at(line: u32) -> SourceLocation {
    SourceLocation::new("loop.c", line, 1, "main")
}

/// `i = 0; while (i < 10) { assert(prop); i = i + 1; }`
fn counting(prop: Expr) -> GotoProgram {
    let mut f = GotoFunction::new("main", Vec::new());
    f.push(InstrKind::Assign { lhs: i(), rhs: k(0) }, at(1));
    let head = f.fresh_id();
    let exit = f.fresh_id();
    let in_loop = Expr::predicate(BinaryOp::Lt, i(), k(10)).unwrap();
    f.push_with_id(
        head,
        InstrKind::CondGoto {
            cond: Expr::not(in_loop).unwrap(),
            target: exit,
        },
        at(2),
    );
    f.push(
        InstrKind::Assert {
            cond: prop,
            property: Property::user("main.1", "loop invariant"),
        },
        at(3),
    );
    f.push(
        InstrKind::Assign {
            lhs: i(),
            rhs: Expr::binary(BinaryOp::Add, u8t(), i(), k(1)).unwrap(),
        },
        at(4),
    );
    f.push(InstrKind::Goto { target: head }, at(5));
    f.push_with_id(exit, InstrKind::EndFunction, at(6));

    let mut p = GotoProgram::new("main");
    p.insert(f);
    p
}

fn straight_line() -> GotoProgram {
    let mut f = GotoFunction::new("main", Vec::new());
    f.push(InstrKind::Assign { lhs: i(), rhs: k(7) }, at(1));
    f.push(
        InstrKind::Assert {
            cond: Expr::eq(i(), k(7)).unwrap(),
            property: Property::user("main.1", "i is 7"),
        },
        at(2),
    );
    let mut p = GotoProgram::new("main");
    p.insert(f);
    p
}

fn j() -> Expr {
    Expr::symbol("main::j", u8t()).unwrap()
}

/// `while (1) { j = 0; while (j < n) j = j + 1; assert(prop); }`
fn nested(n: i128, prop: Expr) -> GotoProgram {
    let mut f = GotoFunction::new("main", Vec::new());
    let head = f.fresh_id();
    let inner = f.fresh_id();
    let after = f.fresh_id();
    f.push_with_id(head, InstrKind::Assign { lhs: j(), rhs: k(0) }, at(1));
    let in_loop = Expr::predicate(BinaryOp::Lt, j(), k(n)).unwrap();
    f.push_with_id(
        inner,
        InstrKind::CondGoto {
            cond: Expr::not(in_loop).unwrap(),
            target: after,
        },
        at(2),
    );
    f.push(
        InstrKind::Assign {
            lhs: j(),
            rhs: Expr::binary(BinaryOp::Add, u8t(), j(), k(1)).unwrap(),
        },
        at(3),
    );
    f.push(InstrKind::Goto { target: inner }, at(4));
    f.push_with_id(
        after,
        InstrKind::Assert {
            cond: prop,
            property: Property::user("main.1", "after inner loop"),
        },
        at(5),
    );
    f.push(InstrKind::Goto { target: head }, at(6));
    f.push(InstrKind::EndFunction, at(7));

    let mut p = GotoProgram::new("main");
    p.insert(f);
    p
}

fn d() -> Expr {
    Expr::symbol("d", u8t()).unwrap()
}

fn call_f(args: Vec<Expr>) -> InstrKind {
    InstrKind::FunctionCall {
        lhs: None,
        function: "f".into(),
        args,
    }
}

/// `main() { d = 0; f(); }` with `f() { d = d + 1; assert(d < 100); f(); }`
fn endless_recursion() -> GotoProgram {
    let mut main = GotoFunction::new("main", Vec::new());
    main.push(InstrKind::Assign { lhs: d(), rhs: k(0) }, at(1));
    main.push(call_f(Vec::new()), at(2));
    main.push(InstrKind::EndFunction, at(3));

    let mut f = GotoFunction::new("f", Vec::new());
    f.push(
        InstrKind::Assign {
            lhs: d(),
            rhs: Expr::binary(BinaryOp::Add, u8t(), d(), k(1)).unwrap(),
        },
        at(10),
    );
    f.push(
        InstrKind::Assert {
            cond: Expr::predicate(BinaryOp::Lt, d(), k(100)).unwrap(),
            property: Property::user("f.1", "d below 100"),
        },
        at(11),
    );
    f.push(call_f(Vec::new()), at(12));
    f.push(InstrKind::EndFunction, at(13));

    let mut p = GotoProgram::new("main");
    p.insert(main);
    p.insert(f);
    p
}

/// `main() { d = 0; f(3); assert(d == 3); }` with
/// `f(a) { if (a != 0) { d = d + 1; f(a - 1); } }`
fn countdown() -> GotoProgram {
    let mut main = GotoFunction::new("main", Vec::new());
    main.push(InstrKind::Assign { lhs: d(), rhs: k(0) }, at(1));
    main.push(call_f(vec![k(3)]), at(2));
    main.push(
        InstrKind::Assert {
            cond: Expr::eq(d(), k(3)).unwrap(),
            property: Property::user("main.1", "three calls"),
        },
        at(3),
    );
    main.push(InstrKind::EndFunction, at(4));

    let a = Expr::symbol("f::a", u8t()).unwrap();
    let mut f = GotoFunction::new("f", vec![a.clone()]);
    let end = f.fresh_id();
    f.push(
        InstrKind::CondGoto {
            cond: Expr::eq(a.clone(), k(0)).unwrap(),
            target: end,
        },
        at(10),
    );
    f.push(
        InstrKind::Assign {
            lhs: d(),
            rhs: Expr::binary(BinaryOp::Add, u8t(), d(), k(1)).unwrap(),
        },
        at(11),
    );
    f.push(
        call_f(vec![Expr::binary(BinaryOp::Sub, u8t(), a, k(1)).unwrap()]),
        at(12),
    );
    f.push_with_id(end, InstrKind::EndFunction, at(13));

    let mut p = GotoProgram::new("main");
    p.insert(main);
    p.insert(f);
    p
}

fn checker(program: GotoProgram, parallel: bool) -> KInduction {
    checker_with(
        program,
        KInductionConfig {
            parallel,
            ..KInductionConfig::default()
        },
    )
}

fn checker_with(program: GotoProgram, config: KInductionConfig) -> KInduction {
    KInduction::new(
        Arc::new(program),
        Arc::new(IrepPool::new()),
        Arc::new(SimplifyingSolverFactory::default()),
        config,
    )
}

fn runner(program: GotoProgram) -> StepRunner {
    StepRunner::new(
        Arc::new(program),
        Arc::new(IrepPool::new()),
        Arc::new(SimplifyingSolverFactory::default()),
        PropertySet::All,
        64,
    )
}

fn upper_bound() -> Expr {
    Expr::predicate(BinaryOp::Le, i(), k(10)).unwrap()
}

fn skips_three() -> Expr {
    Expr::not(Expr::eq(i(), k(3)).unwrap()).unwrap()
}

#[test]
fn steps_at_bound_one() {
    let r = runner(counting(upper_bound()));
    assert_eq!(r.run(Step::BaseCase, 1).unwrap(), StepOutcome::Success);
    assert!(matches!(r.run(Step::ForwardCondition, 1).unwrap(), StepOutcome::Failure(_)));
    assert_eq!(r.run(Step::InductiveStep, 1).unwrap(), StepOutcome::Success);
}

#[test]
fn inductive_invariant_is_proved() {
    for parallel in [false, true] {
        let v = checker(counting(upper_bound()), parallel)
            .run(&PropertySet::All, 20)
            .unwrap();
        assert_eq!(
            v,
            Verdict::Proved {
                k: 1,
                step: Step::InductiveStep,
            }
        );
    }
}

#[test]
fn reachable_violation_is_refuted_at_first_failing_bound() {
    for parallel in [false, true] {
        let v = checker(counting(skips_three()), parallel)
            .run(&PropertySet::All, 20)
            .unwrap();
        let Verdict::Refuted { k, counterexample } = v else {
            panic!("expected a refutation, got {v:?}");
        };
        assert_eq!(k, 4);
        assert_eq!(counterexample.property.id, "main.1");
        assert_eq!(counterexample.location.line, 3);
    }
}

#[test]
fn loop_free_program_is_proved_by_forward_condition() {
    let v = checker(straight_line(), false).run(&PropertySet::All, 5).unwrap();
    assert_eq!(
        v,
        Verdict::Proved {
            k: 1,
            step: Step::ForwardCondition,
        }
    );
}

#[test]
fn small_bound_is_inconclusive() {
    let v = checker(counting(skips_three()), false)
        .run(&PropertySet::All, 3)
        .unwrap();
    assert_eq!(v, Verdict::Unknown { max_k: 3 });
}

#[test]
fn unselected_property_is_not_checked() {
    let v = checker(counting(skips_three()), false)
        .run(&PropertySet::only(["main.other"]), 20)
        .unwrap();
    assert!(matches!(v, Verdict::Proved { .. }));
}

#[test]
fn inner_loop_bound_keeps_the_base_case_incomplete() {
    let r = runner(nested(5, Expr::not(Expr::eq(j(), k(5)).unwrap()).unwrap()));
    assert_eq!(r.run(Step::BaseCase, 5).unwrap(), StepOutcome::Incomplete);
    assert!(matches!(r.run(Step::InductiveStep, 1).unwrap(), StepOutcome::Failure(_)));
    let StepOutcome::Failure(cex) = r.run(Step::BaseCase, 6).unwrap() else {
        panic!("expected the base case to fail once the inner loop fits");
    };
    assert_eq!(cex.property.id, "main.1");
}

#[test]
fn violation_after_nested_loop_is_refuted() {
    for parallel in [false, true] {
        let v = checker(nested(5, Expr::not(Expr::eq(j(), k(5)).unwrap()).unwrap()), parallel)
            .run(&PropertySet::All, 20)
            .unwrap();
        let Verdict::Refuted { k, counterexample } = v else {
            panic!("expected a refutation, got {v:?}");
        };
        assert_eq!(k, 6);
        assert_eq!(counterexample.location.line, 5);
    }
}

#[test]
fn nested_loop_invariant_waits_for_the_inner_loop() {
    for parallel in [false, true] {
        let v = checker(nested(3, Expr::eq(j(), k(3)).unwrap()), parallel)
            .run(&PropertySet::All, 20)
            .unwrap();
        assert_eq!(
            v,
            Verdict::Proved {
                k: 4,
                step: Step::InductiveStep,
            }
        );
    }
}

#[test]
fn cut_recursion_is_never_proved() {
    for parallel in [false, true] {
        let v = checker(endless_recursion(), parallel)
            .run(&PropertySet::All, 3)
            .unwrap();
        assert_eq!(v, Verdict::Unknown { max_k: 3 });
    }
}

#[test]
fn bounded_recursion_is_proved_by_forward_condition() {
    let v = checker(countdown(), false).run(&PropertySet::All, 5).unwrap();
    assert_eq!(
        v,
        Verdict::Proved {
            k: 1,
            step: Step::ForwardCondition,
        }
    );
}

#[test]
fn recursion_deeper_than_the_call_limit_is_inconclusive() {
    let config = KInductionConfig {
        parallel: false,
        max_call_depth: 3,
        ..KInductionConfig::default()
    };
    let v = checker_with(countdown(), config).run(&PropertySet::All, 3).unwrap();
    assert_eq!(v, Verdict::Unknown { max_k: 3 });
}
