use std::sync::Arc;

use hookscript::prelude::*;

/// `(out) <- (a)` events parser with the standard operation set.
fn events_parser() -> EventsParser<(i64,), (i64,)> {
    let global = Arc::new(ScriptGlobal::new());
    let mut parser =
        EventsParser::<(i64,), (i64,)>::new(&global, "events", &["out"], &["a"]).unwrap();
    ops::install(&mut parser);

    parser
}

/// Each script appends one decimal digit to the output, so the final value
/// reads as the execution order.
fn digit(marker: i64) -> String {
    format!("out offset 10 {marker};")
}

#[test]
fn events_flank_the_main_script_by_priority() {
    let mut parser = events_parser();

    // Registered in reverse priority order on purpose.
    parser.add_event("late", 100, &digit(3)).unwrap();
    parser.add_event("early", -100, &digit(1)).unwrap();
    parser.freeze().unwrap();

    let container = parser.parse("main", &digit(2)).unwrap();

    let mut out = (0i64,);
    parser
        .parser()
        .worker((0,))
        .execute_events(&container, &mut out)
        .unwrap();

    assert_eq!(out.0, 123);
}

#[test]
fn equal_priorities_preserve_registration_order() {
    let mut parser = events_parser();

    parser.add_event("first", -50, &digit(1)).unwrap();
    parser.add_event("second", -50, &digit(2)).unwrap();
    parser.add_event("third", 50, &digit(4)).unwrap();
    parser.add_event("fourth", 50, &digit(5)).unwrap();
    parser.freeze().unwrap();

    let container = parser.parse("main", &digit(3)).unwrap();

    let mut out = (0i64,);
    parser
        .parser()
        .worker((0,))
        .execute_events(&container, &mut out)
        .unwrap();

    assert_eq!(out.0, 12345);
}

#[test]
fn priority_zero_runs_right_after_main() {
    let mut parser = events_parser();

    parser.add_event("after", 100, &digit(4)).unwrap();
    parser.add_event("at_zero", 0, &digit(3)).unwrap();
    parser.add_event("before", -100, &digit(1)).unwrap();
    parser.freeze().unwrap();

    let container = parser.parse("main", &digit(2)).unwrap();

    let mut out = (0i64,);
    parser
        .parser()
        .worker((0,))
        .execute_events(&container, &mut out)
        .unwrap();

    assert_eq!(out.0, 1234);
}

#[test]
fn inputs_reset_between_chain_runs() {
    let mut parser = events_parser();

    // The event mutates its input copy; the main script must still see the
    // caller's value.
    parser
        .add_event("mutator", -10, "a add a 1; out set a;")
        .unwrap();
    parser.freeze().unwrap();

    let container = parser.parse("main", "out add out a;").unwrap();

    let mut out = (0i64,);
    parser
        .parser()
        .worker((10,))
        .execute_events(&container, &mut out)
        .unwrap();

    // Event: out = 11. Main (with a reset to 10): out = 21.
    assert_eq!(out.0, 21);
}

#[test]
fn outputs_carry_across_the_chain() {
    let mut parser = events_parser();

    parser.add_event("seed", -1, "out set 40;").unwrap();
    parser.add_event("bump", 1, "out add out 2;").unwrap();
    parser.freeze().unwrap();

    // An empty main script still runs its chains.
    let container = parser.parse("main", "").unwrap();

    let mut out = (0i64,);
    parser
        .parser()
        .worker((0,))
        .execute_events(&container, &mut out)
        .unwrap();

    assert_eq!(out.0, 42);
}

#[test]
fn priorities_are_range_checked_and_freeze_is_final() {
    let mut parser = events_parser();

    assert!(matches!(
        parser.add_event("too_high", 101, "out set 1;"),
        Err(ConfigError::EventPriorityRange(101))
    ));

    parser.add_event("fine", 5, "out set 1;").unwrap();
    parser.freeze().unwrap();

    assert!(matches!(
        parser.add_event("late", 5, "out set 1;"),
        Err(ConfigError::EventsFrozen(_))
    ));
}

#[test]
fn broken_event_scripts_fail_the_freeze() {
    let mut parser = events_parser();

    parser.add_event("broken", -5, "not a script;").unwrap();

    let err = parser.freeze().unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::UnknownIdentifier);
    assert_eq!(err.parent, "broken");
}
