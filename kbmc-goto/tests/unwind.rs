use kbmc_goto::{
    GotoError, GotoFunction, GotoProgram, InstrId, InstrKind, Property, PropertyClass, UnwindOptions, havoc_loops,
    unwind, unwind_program, unwind_program_by, unwind_with,
};
use kbmc_irep::{BinaryOp, Expr, IrepPool, SourceLocation, Type};

fn int() -> Type {
    Type::signed_bv(32).unwrap()
}

fn i() -> Expr {
    Expr::symbol("main::i", int()).unwrap()
}

fn lt(n: i128) -> Expr {
    Expr::predicate(BinaryOp::Lt, i(), Expr::int(n, int()).unwrap()).unwrap()
}

fn at(line: u32) -> SourceLocation {
    SourceLocation::new("loop.c", line, 1, "main")
}

/// `i = 0; while (i < 10) { assert(i < 10); i = i + 1; }`
fn counting_loop() -> GotoFunction {
    let mut f = GotoFunction::new("main", Vec::new());
    f.push(
        InstrKind::Assign {
            lhs: i(),
            rhs: Expr::int(0, int()).unwrap(),
        },
        at(1),
    );
    let head = f.fresh_id();
    let exit = f.fresh_id();
    let not_lt = Expr::not(lt(10)).unwrap();
    f.push_with_id(head, InstrKind::CondGoto { cond: not_lt, target: exit }, at(2));
    f.push(
        InstrKind::Assert {
            cond: lt(10),
            property: Property::user("main.1", "i in range"),
        },
        at(3),
    );
    f.push(
        InstrKind::Assign {
            lhs: i(),
            rhs: Expr::binary(BinaryOp::Add, int(), i(), Expr::int(1, int()).unwrap()).unwrap(),
        },
        at(4),
    );
    f.push(InstrKind::Goto { target: head }, at(5));
    f.push_with_id(exit, InstrKind::EndFunction, at(6));
    f
}

fn count(f: &GotoFunction, pred: impl Fn(&InstrKind) -> bool) -> usize {
    f.body.iter().filter(|i| pred(&i.kind)).count()
}

fn unwinding_asserts(f: &GotoFunction) -> usize {
    count(f, |k| matches!(k, InstrKind::Assert { property, .. } if property.class == PropertyClass::UnwindingAssertion))
}

fn user_asserts(f: &GotoFunction) -> usize {
    count(f, |k| matches!(k, InstrKind::Assert { property, .. } if property.class == PropertyClass::User))
}

#[test]
fn loop_becomes_bound_copies_and_one_unwinding_assertion() {
    let f = counting_loop();
    let u = unwind(&f, 3).unwrap();

    u.validate().unwrap();
    assert!(u.unwound);
    assert!(u.loops().is_empty());
    assert_eq!(user_asserts(&u), 3);
    assert_eq!(unwinding_asserts(&u), 1);
    // 4 loop instructions per copy, plus assertion; setup and end unchanged.
    assert_eq!(u.body.len(), 2 + 3 * 4 + 1);
}

#[test]
fn last_copy_jumps_to_unwinding_assertion() {
    let u = unwind(&counting_loop(), 2).unwrap();
    let assert_id = u
        .body
        .iter()
        .find(|i| matches!(&i.kind, InstrKind::Assert { property, .. } if property.is_unwinding()))
        .map(|i| i.id)
        .unwrap();

    let back_edges: Vec<InstrId> = u
        .body
        .iter()
        .filter_map(|i| match i.kind {
            InstrKind::Goto { target } => Some(target),
            _ => None,
        })
        .collect();
    assert_eq!(back_edges.len(), 2);
    assert_eq!(back_edges[1], assert_id);
    // The first copy continues at the second copy's head.
    let second_head = back_edges[0];
    let pos = u.position(second_head).unwrap();
    assert!(matches!(u.body[pos].kind, InstrKind::CondGoto { .. }));
    assert!(pos > u.position(InstrId(1)).unwrap());
}

#[test]
fn exits_keep_their_target() {
    let u = unwind(&counting_loop(), 3).unwrap();
    let exit = InstrId(2);
    let exits = count(&u, |k| matches!(k, InstrKind::CondGoto { target, .. } if *target == exit));
    assert_eq!(exits, 3);
    assert!(matches!(u.get(exit).unwrap().kind, InstrKind::EndFunction));
}

#[test]
fn loop_free_function_is_unchanged() {
    let mut f = GotoFunction::new("straight", Vec::new());
    f.push(InstrKind::Skip, SourceLocation::default());
    f.push(InstrKind::EndFunction, SourceLocation::default());
    assert_eq!(unwind(&f, 5).unwrap(), f);
}

#[test]
fn unwinding_twice_is_rejected() {
    let u = unwind(&counting_loop(), 2).unwrap();
    assert!(matches!(unwind(&u, 2), Err(GotoError::AlreadyUnwound { .. })));
    assert!(matches!(unwind(&counting_loop(), 0), Err(GotoError::ZeroBound)));
}

#[test]
fn hypothesis_copies_assume_user_assertions() {
    let opts = UnwindOptions::new(3).with_hypotheses(2);
    let u = unwind_with(&counting_loop(), &opts).unwrap();
    assert_eq!(user_asserts(&u), 1);
    assert_eq!(count(&u, |k| matches!(k, InstrKind::Assume { .. })), 2);
    assert_eq!(unwinding_asserts(&u), 1);
}

/// `while (a) { while (b) {} }`
fn nested() -> GotoFunction {
    let a = Expr::symbol("a", Type::bool()).unwrap();
    let b = Expr::symbol("b", Type::bool()).unwrap();
    let mut f = GotoFunction::new("main", Vec::new());
    let outer = f.fresh_id();
    let inner = f.fresh_id();
    let exit = f.fresh_id();
    let inner_exit = f.fresh_id();
    f.push_with_id(outer, InstrKind::CondGoto { cond: Expr::not(a).unwrap(), target: exit }, at(1));
    f.push_with_id(inner, InstrKind::CondGoto { cond: Expr::not(b).unwrap(), target: inner_exit }, at(2));
    f.push(InstrKind::Goto { target: inner }, at(3));
    f.push_with_id(inner_exit, InstrKind::Goto { target: outer }, at(4));
    f.push_with_id(exit, InstrKind::EndFunction, at(5));
    f
}

#[test]
fn nested_loops_unwind_outer_first() {
    let f = nested();
    assert_eq!(f.outermost_loops().unwrap().len(), 1);
    let u = unwind(&f, 2).unwrap();
    u.validate().unwrap();
    assert!(u.loops().is_empty());
    // One outer assertion plus one for the inner loop in each outer copy.
    assert_eq!(unwinding_asserts(&u), 3);
}

fn false_assumes(f: &GotoFunction) -> usize {
    count(f, |k| matches!(k, InstrKind::Assume { cond } if cond.is_false()))
}

#[test]
fn assumed_outer_bound_keeps_inner_unwinding_assertions() {
    let opts = UnwindOptions::new(2).with_outer_bound_assumed();
    let u = unwind_with(&nested(), &opts).unwrap();
    u.validate().unwrap();
    assert_eq!(false_assumes(&u), 1);
    assert_eq!(unwinding_asserts(&u), 2);

    let flat = unwind_with(&counting_loop(), &opts).unwrap();
    assert_eq!(false_assumes(&flat), 1);
    assert_eq!(unwinding_asserts(&flat), 0);
}

#[test]
fn conditional_back_edge_gets_explicit_exit() {
    // do { i = i + 1; } while (i < 10);
    let mut f = GotoFunction::new("main", Vec::new());
    let head = f.fresh_id();
    f.push_with_id(
        head,
        InstrKind::Assign {
            lhs: i(),
            rhs: Expr::binary(BinaryOp::Add, int(), i(), Expr::int(1, int()).unwrap()).unwrap(),
        },
        at(1),
    );
    f.push(InstrKind::CondGoto { cond: lt(10), target: head }, at(2));
    let end = f.push(InstrKind::EndFunction, at(3));

    let u = unwind(&f, 2).unwrap();
    let gotos_to_end = count(&u, |k| matches!(k, InstrKind::Goto { target } if *target == end));
    assert_eq!(gotos_to_end, 2);
}

#[test]
fn havoc_redirects_entry_but_not_back_edges() {
    let pool = IrepPool::new();
    let f = counting_loop();
    let h = havoc_loops(&f, &pool).unwrap();
    h.validate().unwrap();
    assert!(!h.unwound);

    let havoc = &h.body[1];
    match &havoc.kind {
        InstrKind::Assign { lhs, rhs } => {
            assert_eq!(lhs.as_symbol(), Some("main::i"));
            assert!(rhs.as_symbol().unwrap().starts_with("nondet$"));
        }
        other => panic!("expected havoc assignment, got {other:?}"),
    }
    // The back-edge still targets the loop head.
    let back = h.body.iter().rev().find(|i| matches!(i.kind, InstrKind::Goto { .. })).unwrap();
    assert_eq!(back.kind.targets(), vec![InstrId(1)]);
    assert_eq!(h.loops().len(), 1);
}

#[test]
fn unwind_program_covers_every_function() {
    let mut p = GotoProgram::new("main");
    p.insert(counting_loop());
    let mut g = nested();
    g.name = "g".into();
    p.insert(g);

    let u = unwind_program(&p, &UnwindOptions::new(2)).unwrap();
    u.validate().unwrap();
    assert!(!u.has_loops());
    assert!(u.functions.values().all(|f| f.unwound));
}

#[test]
fn per_function_options() {
    let mut p = GotoProgram::new("main");
    p.insert(counting_loop());
    let mut g = counting_loop();
    g.name = "g".into();
    p.insert(g);

    let u = unwind_program_by(&p, |f| {
        let opts = UnwindOptions::new(2);
        if f.name == "main" {
            opts.with_outer_bound_assumed()
        } else {
            opts
        }
    })
    .unwrap();
    assert_eq!(false_assumes(&u.functions["main"]), 1);
    assert_eq!(unwinding_asserts(&u.functions["main"]), 0);
    assert_eq!(unwinding_asserts(&u.functions["g"]), 1);
}
