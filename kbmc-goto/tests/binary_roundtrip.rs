use std::fs::File;
use std::io::BufReader;

use kbmc_goto::{
    GotoError, GotoFunction, GotoProgram, InstrId, InstrKind, Property, from_bytes, read_goto_binary, to_bytes,
    write_goto_binary,
};
use kbmc_irep::{BinaryOp, Expr, SourceLocation, Type};

fn int() -> Type {
    Type::signed_bv(32).unwrap()
}

fn var(name: &str) -> Expr {
    Expr::symbol(name, int()).unwrap()
}

fn loc(line: u32) -> SourceLocation {
    SourceLocation::new("all.c", line, 1, "main")
}

/// One instance of every instruction kind.
fn every_kind() -> GotoProgram {
    let mut main = GotoFunction::new("main", Vec::new());
    let x = var("main::x");
    let zero = Expr::int(0, int()).unwrap();
    let positive = Expr::predicate(BinaryOp::Gt, x.clone(), zero.clone()).unwrap();

    let handler = InstrId(100);
    main.push(
        InstrKind::CatchPush {
            exceptions: vec!["E".into()],
            targets: vec![handler],
        },
        loc(1),
    );
    main.push(
        InstrKind::Assign {
            lhs: x.clone(),
            rhs: Expr::binary(BinaryOp::Add, int(), x.clone(), Expr::int(1, int()).unwrap()).unwrap(),
        },
        loc(2),
    );
    main.push(
        InstrKind::FunctionCall {
            lhs: Some(x.clone()),
            function: "f".into(),
            args: vec![x.clone()],
        },
        loc(3),
    );
    main.push(InstrKind::Assume { cond: positive.clone() }, loc(4));
    main.push(
        InstrKind::Assert {
            cond: positive.clone(),
            property: Property::user("main.1", "x stays positive"),
        },
        loc(5),
    );
    main.push(InstrKind::CondGoto { cond: positive, target: handler }, loc(6));
    main.push(InstrKind::Throw { exceptions: vec!["E".into()] }, loc(7));
    main.push_with_id(handler, InstrKind::CatchPop, loc(8));
    main.push(InstrKind::Goto { target: InstrId(0) }, loc(9));
    main.push(InstrKind::Skip, loc(10));
    main.push(InstrKind::EndFunction, loc(11));

    let mut f = GotoFunction::new("f", vec![var("f::a")]);
    f.push(InstrKind::Return { value: Some(var("f::a")) }, loc(20));
    f.push(InstrKind::EndFunction, loc(21));

    let mut p = GotoProgram::new("main");
    p.insert(main);
    p.insert(f);
    p.insert(GotoFunction::new("external", Vec::new()));
    p
}

#[test]
fn every_instruction_kind_round_trips() {
    let p = every_kind();
    p.validate().unwrap();
    let bytes = to_bytes(&p).unwrap();
    assert_eq!(&bytes[..4], b"GBF\x01");
    assert_eq!(from_bytes(&bytes).unwrap(), p);
}

#[test]
fn round_trips_through_a_file() {
    let p = every_kind();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prog.gbf");
    write_goto_binary(&p, File::create(&path).unwrap()).unwrap();
    let back = read_goto_binary(BufReader::new(File::open(&path).unwrap())).unwrap();
    assert_eq!(back, p);
    assert_eq!(back.to_string(), p.to_string());
}

#[test]
fn reader_rejects_dangling_targets() {
    let mut p = GotoProgram::new("main");
    let mut main = GotoFunction::new("main", Vec::new());
    main.push(InstrKind::Goto { target: InstrId(7) }, SourceLocation::default());
    p.insert(main);

    // Encode without validating, as a corrupted file would be.
    let mut bytes = b"GBF\x01".to_vec();
    bytes.extend(bincode::serialize(&p).unwrap());
    assert!(matches!(from_bytes(&bytes), Err(GotoError::UnresolvedTarget { .. })));
}

#[test]
fn show_lists_one_instruction_per_line() {
    let text = every_kind().to_string();
    assert!(text.contains("CATCH-PUSH [E->L100]"));
    assert!(text.contains("ASSERT (main::x > 0) // main.1: x stays positive"));
    assert!(text.contains("CALL main::x := f(main::x)"));
    assert!(text.contains("external()"));
    assert!(text.contains("<no body>"));
}
