use std::sync::Arc;

use quickcheck_macros::quickcheck;

use hookscript::prelude::*;
use hookscript::types::{ArgFlags, TYPE_INT};

#[derive(Debug, Default)]
struct Unit {
    hp: i64,
}

fn global_with_unit() -> Arc<ScriptGlobal> {
    let mut global = ScriptGlobal::new();
    global.register_type::<Unit>("Unit").unwrap();

    Arc::new(global)
}

fn int_reg() -> ArgKind {
    ArgKind::INT.decorate(ArgFlags::REGISTER)
}

fn unit_ptr(global: &ScriptGlobal, editable: bool) -> ArgKind {
    let mut flags = ArgFlags::REGISTER | ArgFlags::PTR;
    if editable {
        flags |= ArgFlags::PTR_EDITABLE;
    }

    ArgKind::new(global.types().id_of::<Unit>().unwrap()).decorate(flags)
}

/// Register `foo(int)` and `foo(ptr Unit)`, each writing a distinct marker
/// into the first output register.
fn register_foo(parser: &mut ParserCore) {
    let ptr = unit_ptr(parser.global(), false);

    parser.register_op(
        "foo",
        OverloadSpec::new(vec![int_reg()], |worker, cur| {
            let _ = cur.read_reg()?;
            worker.set_word(0, 1);
            Ok(Flow::Continue)
        }),
    );
    parser.register_op(
        "foo",
        OverloadSpec::new(vec![ptr], |worker, cur| {
            let _ = cur.read_reg()?;
            worker.set_word(0, 2);
            Ok(Flow::Continue)
        }),
    );
}

#[test]
fn overloads_dispatch_on_argument_kind() {
    let global = global_with_unit();

    // An int argument picks foo(int)...
    let mut parser =
        Parser::<(i64,), (i64,)>::new(&global, "ints", &["out"], &["x"]).unwrap();
    ops::install(&mut parser);
    register_foo(&mut parser);

    let container = parser.parse("s4", "foo x; return out;").unwrap();
    let mut out = (0i64,);
    parser.worker((9,)).execute(&container, &mut out).unwrap();
    assert_eq!(out.0, 1);

    // ...and a pointer argument picks foo(ptr Unit).
    let mut parser =
        Parser::<(i64,), (Ref<Unit>,)>::new(&global, "ptrs", &["out"], &["x"]).unwrap();
    ops::install(&mut parser);
    register_foo(&mut parser);

    let container = parser.parse("s4", "foo x; return out;").unwrap();
    let unit = Unit::default();
    let mut out = (0i64,);
    parser.worker((&unit,)).execute(&container, &mut out).unwrap();
    assert_eq!(out.0, 2);
}

#[test]
fn editable_pointer_satisfies_readonly_overload() {
    let global = global_with_unit();

    let mut parser =
        Parser::<(i64,), (Mut<Unit>,)>::new(&global, "ptrs", &["out"], &["x"]).unwrap();
    ops::install(&mut parser);
    register_foo(&mut parser);

    // `x` is editable, the overload wants read-only: accepted, penalized.
    let container = parser.parse("s4", "foo x; return out;").unwrap();
    let mut unit = Unit::default();
    let mut out = (0i64,);
    parser
        .worker((&mut unit,))
        .execute(&container, &mut out)
        .unwrap();
    assert_eq!(out.0, 2);
}

#[test]
fn readonly_pointer_cannot_reach_editable_overload() {
    let global = global_with_unit();

    let mut parser =
        Parser::<(i64,), (Ref<Unit>,)>::new(&global, "ptrs", &["out"], &["x"]).unwrap();
    ops::install(&mut parser);

    // Only the editable-pointer overload exists.
    let ptre = unit_ptr(&global, true);
    parser.register_op(
        "poke",
        OverloadSpec::new(vec![ptre], |worker, cur| {
            let obj = cur.read_reg()?;
            worker.ref_unique::<Unit>(obj)?.hp += 1;
            Ok(Flow::Continue)
        }),
    );

    let err = parser.parse("s4", "poke x; return out;").unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::NoMatchingOverload);
}

#[test]
fn identical_qualified_and_plain_overloads_are_ambiguous() {
    let global = Arc::new(ScriptGlobal::new());
    let mut parser = Parser::<(i64,), (i64,)>::new(&global, "amb", &["out"], &["x"]).unwrap();

    let nop = |_: &mut Worker<'_>, cur: &mut Cursor<'_>| -> Result<Flow, RuntimeError> {
        let _ = cur.read_reg()?;
        Ok(Flow::Continue)
    };
    parser.register_op("int.bump", OverloadSpec::new(vec![int_reg()], nop));
    parser.register_op("bump", OverloadSpec::new(vec![int_reg()], nop));

    let err = parser.parse("amb", "x bump; return out;").unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::AmbiguousOverload);
}

#[test]
fn constant_destination_reports_invalid_lvalue() {
    let parser = {
        let global = Arc::new(ScriptGlobal::new());
        let mut parser =
            Parser::<(i64,), (i64,)>::new(&global, "lv", &["out"], &["x"]).unwrap();
        ops::install(&mut parser);
        parser
    };

    let err = parser.parse("lv", "5 set 3; return out;").unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::InvalidLValue);
}

#[test]
fn failed_parses_leave_the_parser_untouched() {
    let global = Arc::new(ScriptGlobal::new());
    let mut parser = Parser::<(i64,), (i64,)>::new(&global, "tx", &["out"], &["x"]).unwrap();
    ops::install(&mut parser);
    parser.add_const("seven", 7).unwrap();

    for broken in [
        "out add x nonsense; return out;",
        "const seven 8; \u{7d};",
        "if gt x 0; out set 1;",
        "var int seven = 1; var int seven = 2;",
    ] {
        assert!(parser.parse("tx", broken).is_err());
    }

    // The declared symbols still resolve exactly as before.
    let container = parser.parse("tx", "out add x seven; return out;").unwrap();
    let mut out = (0i64,);
    parser.worker((1,)).execute(&container, &mut out).unwrap();
    assert_eq!(out.0, 8);
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Shade(u8);

impl RegValue for Shade {
    const SIZE: usize = 1;

    fn store(self, buf: &mut [u8]) {
        buf[0] = self.0;
    }

    fn load(buf: &[u8]) -> Self {
        Shade(buf[0])
    }
}

hookscript::impl_script_value!(Shade);

#[test]
fn host_value_types_live_in_registers() {
    let mut global = ScriptGlobal::new();
    global.register_type::<Shade>("Shade").unwrap();
    let global = Arc::new(global);

    let mut parser =
        Parser::<(i64,), (Shade,)>::new(&global, "shades", &["out"], &["shade"]).unwrap();
    ops::install(&mut parser);
    parser.bind_type::<Shade>().unwrap();

    // A host operation reading the one-byte value out of its register.
    let shade_base = global.types().id_of::<Shade>().unwrap();
    let shade_reg = ArgKind::new(shade_base).decorate(ArgFlags::REGISTER);
    parser.register_op(
        "widen",
        OverloadSpec::new(vec![int_reg(), shade_reg], |worker, cur| {
            let dst = cur.read_reg()?;
            let src = cur.read_reg()?;

            let shade = worker.regs().read::<Shade>(src);
            worker.set_word(dst, shade.0 as i64);

            Ok(Flow::Continue)
        }),
    );

    let container = parser.parse("shades", "out widen shade; return out;").unwrap();

    let mut out = (0i64,);
    parser
        .worker((Shade(200),))
        .execute(&container, &mut out)
        .unwrap();

    assert_eq!(out.0, 200);
}

#[quickcheck]
fn compat_is_reflexive_at_full_score(base: u16, bits: u8) -> bool {
    let kind = ArgKind::new(base).decorate(ArgFlags::from_bits_truncate(bits));

    compat(kind, kind, 0) == 255
}

#[quickcheck]
fn compat_rejects_disjoint_bases(a: u16, b: u16, bits_a: u8, bits_b: u8) -> bool {
    if a == b {
        return true;
    }

    let ka = ArgKind::new(a).decorate(ArgFlags::from_bits_truncate(bits_a));
    let kb = ArgKind::new(b).decorate(ArgFlags::from_bits_truncate(bits_b));

    compat(ka, kb, 0) == 0 && compat(kb, ka, 0) == 0
}

#[quickcheck]
fn compat_ordinal_only_breaks_ties(ordinal: usize) -> bool {
    let kind = ArgKind::new(TYPE_INT).decorate(ArgFlags::REGISTER);
    let score = compat(kind, kind, ordinal);

    score >= 247 && score <= 255
}
