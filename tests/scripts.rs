use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use test_case::test_case;

use hookscript::prelude::*;

/// `(out) <- (a, b)` parser with the standard operation set.
fn binary_parser() -> Parser<(i64,), (i64, i64)> {
    let global = Arc::new(ScriptGlobal::new());
    let mut parser =
        Parser::<(i64,), (i64, i64)>::new(&global, "test", &["out"], &["a", "b"]).unwrap();
    ops::install(&mut parser);

    parser
}

/// `(out) <- (n)` parser with the standard operation set.
fn counter_parser() -> Parser<(i64,), (i64,)> {
    let global = Arc::new(ScriptGlobal::new());
    let mut parser = Parser::<(i64,), (i64,)>::new(&global, "test", &["out"], &["n"]).unwrap();
    ops::install(&mut parser);

    parser
}

fn run_binary(parser: &Parser<(i64,), (i64, i64)>, container: &Container, a: i64, b: i64) -> i64 {
    let mut out = (0i64,);
    parser.worker((a, b)).execute(container, &mut out).unwrap();

    out.0
}

#[test]
fn arithmetic_and_return() {
    let parser = binary_parser();
    let container = parser.parse("s1", "out add a b; return out;").unwrap();

    assert_eq!(run_binary(&parser, &container, 3, 4), 7);
}

#[test_case(5, 2 => 5)]
#[test_case(2, 5 => 5)]
#[test_case(4, 4 => 4)]
fn conditional_picks_maximum(a: i64, b: i64) -> i64 {
    let parser = binary_parser();
    let container = parser
        .parse(
            "s2",
            "if gt a b; out set a; else; out set b; end; return out;",
        )
        .unwrap();

    run_binary(&parser, &container, a, b)
}

#[test_case(5 => 15)]
#[test_case(0 => 0)]
#[test_case(1 => 1)]
fn loop_with_break_sums_downward(n: i64) -> i64 {
    let parser = counter_parser();
    let container = parser
        .parse(
            "s3",
            "out set 0; \
             loop; \
               if le n 0; break; end; \
               out add out n; \
               n sub n 1; \
             end; \
             return out;",
        )
        .unwrap();

    let mut out = (0i64,);
    parser.worker((n,)).execute(&container, &mut out).unwrap();

    out.0
}

#[test]
fn braced_blocks_compile_like_keyword_blocks() {
    let parser = binary_parser();
    let keyword = parser
        .parse("kw", "if gt a b; out set a; else; out set b; end; return out;")
        .unwrap();
    let braced = parser
        .parse("br", "if gt a b { out set a; } else { out set b; } return out;")
        .unwrap();

    assert_eq!(run_binary(&parser, &keyword, 9, 4), 9);
    assert_eq!(run_binary(&parser, &braced, 9, 4), 9);
    assert_eq!(run_binary(&parser, &braced, 4, 9), 9);
}

#[test]
fn continue_skips_to_next_iteration() {
    let parser = counter_parser();
    // `var` initializers use `=`, not positional values.
    let err = parser
        .parse("evens", "out set 0; var int rem 0; return out;")
        .unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::Syntax);

    let container = parser
        .parse(
            "evens",
            "out set 0; \
             var int rem = 0; \
             loop; \
               if le n 0; break; end; \
               rem set n; rem mod rem 2; \
               if neq rem 0; n sub n 1; continue; end; \
               out add out n; \
               n sub n 1; \
             end; \
             return out;",
        )
        .unwrap();

    let mut out = (0i64,);
    parser.worker((6,)).execute(&container, &mut out).unwrap();

    assert_eq!(out.0, 6 + 4 + 2);
}

#[test]
fn comments_and_hex_literals() {
    let parser = counter_parser();
    let container = parser
        .parse(
            "hex",
            "# mask off the low nibble\nout and n 0xf0; return out;",
        )
        .unwrap();

    let mut out = (0i64,);
    parser.worker((0xabi64,)).execute(&container, &mut out).unwrap();

    assert_eq!(out.0, 0xa0);
}

#[test]
fn const_declarations_fold_at_compile_time() {
    let parser = counter_parser();
    let container = parser
        .parse("fold", "const third mul 7 3; out set third; return out;")
        .unwrap();

    let mut out = (0i64,);
    parser.worker((0,)).execute(&container, &mut out).unwrap();

    assert_eq!(out.0, 21);
}

#[test]
fn folding_rejects_division_by_zero() {
    let parser = counter_parser();
    let err = parser
        .parse("fold", "const broken div 1 0; out set broken; return out;")
        .unwrap_err();

    assert_eq!(err.kind, CompileErrorKind::Syntax);
}

#[test]
fn block_locals_are_reclaimed_and_scoped() {
    let parser = counter_parser();

    // A local declared inside a block is unknown after it closes.
    let err = parser
        .parse(
            "scope",
            "if gt n 0; var int t = 5; end; out set t; return out;",
        )
        .unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::UnknownIdentifier);
    assert_eq!(err.token, "t");

    // Inner declarations shadow outer ones and disappear with their block.
    let container = parser
        .parse(
            "shadow",
            "var int x = 1; \
             if gt n 0; var int x = 2; out set x; end; \
             out add out x; \
             return out;",
        )
        .unwrap();

    let mut out = (0i64,);
    parser.worker((1,)).execute(&container, &mut out).unwrap();
    assert_eq!(out.0, 3);
}

#[test]
fn duplicate_local_in_same_block_is_rejected() {
    let parser = counter_parser();
    let err = parser
        .parse("dup", "var int x = 1; var int x = 2; return out;")
        .unwrap_err();

    assert_eq!(err.kind, CompileErrorKind::DuplicateLocal);
    assert_eq!((err.line, err.token.as_str()), (1, "x"));
}

#[test]
fn inlined_functions_expand_at_call_sites() {
    let mut parser = counter_parser();
    parser
        .add_function("scale_up", &[("int", "x"), ("int", "k")], "x mul x k;")
        .unwrap();

    let container = parser
        .parse("inline", "out set n; scale_up out 3; scale_up out 2; return out;")
        .unwrap();

    let mut out = (0i64,);
    parser.worker((7,)).execute(&container, &mut out).unwrap();

    assert_eq!(out.0, 42);
}

#[test]
fn compile_failure_falls_back_to_default() {
    let global = Arc::new(ScriptGlobal::new());
    let mut parser = Parser::<(i64,), (i64,)>::new(&global, "test", &["out"], &["a"]).unwrap();
    ops::install(&mut parser);
    parser.set_default_script("return a;");

    // The broken source surfaces a structured error through `parse`.
    let err = parser.parse("s6", "this is not valid;").unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::UnknownIdentifier);
    assert_eq!(err.parent, "s6");

    // And `parse_or_default` substitutes the default script.
    let container = parser.parse_or_default("s6", "this is not valid;");
    assert!(!container.is_empty());

    let mut out = (0i64,);
    parser.worker((42,)).execute(&container, &mut out).unwrap();
    assert_eq!(out.0, 42);
}

#[test]
fn failing_default_yields_an_empty_container() {
    let global = Arc::new(ScriptGlobal::new());
    let mut parser = Parser::<(i64,), (i64,)>::new(&global, "test", &["out"], &["a"]).unwrap();
    ops::install(&mut parser);
    parser.set_default_script("also broken");

    let container = parser.parse_or_default("bad", "this is not valid;");
    assert!(container.is_empty());

    // Executing an empty container is a no-op.
    let mut out = (5i64,);
    parser.worker((1,)).execute(&container, &mut out).unwrap();
    assert_eq!(out.0, 5);
}

#[test]
fn runaway_scripts_hit_the_instruction_budget() {
    let parser = counter_parser();
    let container = parser
        .parse("spin", "loop; out add out 1; end; return out;")
        .unwrap();

    let mut out = (0i64,);
    let err = parser
        .worker((0,))
        .execute(&container, &mut out)
        .unwrap_err();

    assert_eq!(
        err,
        RuntimeError::InstructionBudgetExceeded(DEFAULT_INSTRUCTION_BUDGET)
    );

    // A custom budget trips sooner.
    let err = parser
        .worker((0,))
        .with_budget(16)
        .execute(&container, &mut out)
        .unwrap_err();
    assert_eq!(err, RuntimeError::InstructionBudgetExceeded(16));
}

#[test]
fn division_by_zero_is_a_handler_failure() {
    let parser = binary_parser();
    let container = parser.parse("div", "out div a b; return out;").unwrap();

    let mut out = (0i64,);
    let err = parser
        .worker((1, 0))
        .execute(&container, &mut out)
        .unwrap_err();

    assert!(matches!(err, RuntimeError::HandlerFailure(_)));
}

#[test]
fn pure_scripts_are_deterministic() {
    let parser = binary_parser();
    let container = parser
        .parse(
            "det",
            "out mul a 31; out add out b; out xor out a; if gt out 1000; out mod out 1000; end; return out;",
        )
        .unwrap();

    let rng = &mut StdRng::seed_from_u64(0x5eed);

    for _ in 0..64 {
        let a = rng.gen_range(-1_000_000..1_000_000);
        let b = rng.gen_range(-1_000_000..1_000_000);

        let first = run_binary(&parser, &container, a, b);
        let second = run_binary(&parser, &container, a, b);

        assert_eq!(first, second);
    }
}

#[test]
fn return_checks_output_arity() {
    let parser = binary_parser();
    let err = parser.parse("arity", "return a b;").unwrap_err();

    assert_eq!(err.kind, CompileErrorKind::TypeMismatch);
}

#[test]
fn registers_overflow_is_reported() {
    let parser = counter_parser();

    // 64 words are available; outputs and inputs take two.
    let mut source = String::new();
    for i in 0..63 {
        source.push_str(&format!("var int local_{i} = 0; "));
    }
    source.push_str("return out;");

    let err = parser.parse("overflow", &source).unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::RegisterFileOverflow);
}
