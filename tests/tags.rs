use std::sync::Arc;

use hookscript::prelude::*;

#[derive(Debug, Default)]
struct Unit {
    values: ScriptValues<Unit>,
}

impl Tagged for Unit {
    fn script_values(&self) -> &ScriptValues<Unit> {
        &self.values
    }

    fn script_values_mut(&mut self) -> &mut ScriptValues<Unit> {
        &mut self.values
    }
}

#[derive(Debug, Default)]
struct Item;

fn int_value_type(global: &mut ScriptGlobal) {
    global
        .register_value_type("int", |text| text.parse().ok(), |value| value.to_string())
        .unwrap();
}

fn tagged_global() -> Arc<ScriptGlobal> {
    let mut global = ScriptGlobal::new();
    global.register_type::<Unit>("Unit").unwrap();
    global.register_type::<Item>("Item").unwrap();
    int_value_type(&mut global);

    global.add_tag_kind::<Unit>("Unit", 255).unwrap();
    global.add_tag::<Unit>("STUN", "int").unwrap();
    global.add_tag::<Unit>("MORALE", "int").unwrap();
    global.add_tag::<Unit>("OVERKILL", "int").unwrap();

    Arc::new(global)
}

#[test]
fn script_values_round_trip() {
    let global = tagged_global();

    let stun = global.tag::<Unit>("STUN").unwrap();
    let overkill = global.tag::<Unit>("OVERKILL").unwrap();

    let mut unit = Unit::default();
    unit.values.set(stun, 12);
    unit.values.set(overkill, -3);

    let saved = unit.values.save(&global);
    // Only non-zero slots persist, in index order.
    assert_eq!(
        saved,
        vec![
            ("STUN".to_string(), "12".to_string()),
            ("OVERKILL".to_string(), "-3".to_string()),
        ]
    );

    let mut restored = Unit::default();
    restored
        .values
        .load(&global, saved.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .unwrap();

    assert_eq!(restored.values.get(stun), 12);
    assert_eq!(restored.values.get(overkill), -3);
    assert_eq!(restored.values.get(global.tag::<Unit>("MORALE").unwrap()), 0);
}

#[test]
fn unknown_tag_names_are_skipped_on_load() {
    let global = tagged_global();

    let mut unit = Unit::default();
    unit.values
        .load(&global, [("STUN", "5"), ("NO_SUCH_TAG", "9")])
        .unwrap();

    assert_eq!(unit.values.get(global.tag::<Unit>("STUN").unwrap()), 5);
}

#[test]
fn malformed_payloads_are_rejected() {
    let global = tagged_global();

    let mut unit = Unit::default();
    let err = unit.values.load(&global, [("STUN", "not-a-number")]).unwrap_err();

    assert!(matches!(err, ConfigError::InvalidTagValue { .. }));
}

#[test]
fn tag_registration_is_validated() {
    let mut global = ScriptGlobal::new();
    global.register_type::<Unit>("Unit").unwrap();
    int_value_type(&mut global);

    global.add_tag_kind::<Unit>("Unit", 2).unwrap();

    // Unknown value type.
    assert!(matches!(
        global.add_tag::<Unit>("STUN", "float"),
        Err(ConfigError::UnknownTagValueType(_))
    ));

    // Duplicate name.
    global.add_tag::<Unit>("STUN", "int").unwrap();
    assert!(matches!(
        global.add_tag::<Unit>("STUN", "int"),
        Err(ConfigError::DuplicateTagName(_))
    ));

    // Index limit.
    global.add_tag::<Unit>("MORALE", "int").unwrap();
    assert!(matches!(
        global.add_tag::<Unit>("OVERKILL", "int"),
        Err(ConfigError::TagCapacity { .. })
    ));

    // Undeclared kind.
    assert!(matches!(
        global.add_tag::<Item>("STUN", "int"),
        Err(ConfigError::UnknownTagKind(_))
    ));
}

#[test]
fn scripts_read_and_write_tags() {
    let global = tagged_global();

    let mut parser =
        Parser::<(i64,), (Mut<Unit>,)>::new(&global, "tags", &["out"], &["unit"]).unwrap();
    ops::install(&mut parser);
    parser.bind_type::<Unit>().unwrap();
    ops::install_tag_ops::<Unit>(&mut parser).unwrap();
    parser.add_tag_consts::<Unit>("Tag").unwrap();

    let container = parser
        .parse(
            "tags",
            "unit.setTag Tag.STUN 7; \
             var int tmp = 0; \
             unit.getTag tmp Tag.STUN; \
             out add tmp 1; \
             return out;",
        )
        .unwrap();

    let mut unit = Unit::default();
    let mut out = (0i64,);
    parser
        .worker((&mut unit,))
        .execute(&container, &mut out)
        .unwrap();

    assert_eq!(out.0, 8);
    assert_eq!(unit.values.get(global.tag::<Unit>("STUN").unwrap()), 7);
}

#[test]
fn quoted_tag_names_resolve_at_compile_time() {
    let global = tagged_global();

    let mut parser =
        Parser::<(i64,), (Mut<Unit>,)>::new(&global, "tags", &["out"], &["unit"]).unwrap();
    ops::install(&mut parser);
    parser.bind_type::<Unit>().unwrap();
    ops::install_tag_ops::<Unit>(&mut parser).unwrap();

    let mut unit = Unit::default();
    unit.values.set(global.tag::<Unit>("MORALE").unwrap(), 55);

    let container = parser
        .parse("tags", "unit.getTag out \"MORALE\"; return out;")
        .unwrap();

    let mut out = (0i64,);
    parser
        .worker((&mut unit,))
        .execute(&container, &mut out)
        .unwrap();
    assert_eq!(out.0, 55);

    // A quoted name that was never registered fails the compile.
    let err = parser
        .parse("tags", "unit.getTag out \"NO_SUCH_TAG\"; return out;")
        .unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::UnknownIdentifier);
}

#[test]
fn pointer_getters_and_setters() {
    #[derive(Debug, Default)]
    struct Soldier {
        hp: i64,
    }

    let mut global = ScriptGlobal::new();
    global.register_type::<Soldier>("Soldier").unwrap();
    let global = Arc::new(global);

    let mut parser =
        Parser::<(i64,), (Mut<Soldier>,)>::new(&global, "fields", &["out"], &["actor"]).unwrap();
    ops::install(&mut parser);
    parser.bind_type::<Soldier>().unwrap();
    ops::register_getter::<Soldier>(&mut parser, "hp", |s| s.hp).unwrap();
    ops::register_setter::<Soldier>(&mut parser, "setHp", |s, v| s.hp = v).unwrap();

    let container = parser
        .parse(
            "fields",
            "var int cur = 0; actor.hp cur; actor.setHp 50; out set cur; return out;",
        )
        .unwrap();

    let mut soldier = Soldier { hp: 35 };
    let mut out = (0i64,);
    parser
        .worker((&mut soldier,))
        .execute(&container, &mut out)
        .unwrap();

    assert_eq!(out.0, 35);
    assert_eq!(soldier.hp, 50);
}

#[test]
fn wrong_host_type_surfaces_invalid_cast() {
    let global = tagged_global();

    let mut parser =
        Parser::<(i64,), (Ref<Unit>,)>::new(&global, "cast", &["out"], &["unit"]).unwrap();
    ops::install(&mut parser);
    parser.bind_type::<Unit>().unwrap();

    // A handler that downcasts the pointer at the wrong host type.
    let unit_base = global.types().id_of::<Unit>().unwrap();
    let ptr = ArgKind::new(unit_base)
        .decorate(ArgFlags::REGISTER | ArgFlags::PTR);
    parser.register_op(
        "misread",
        OverloadSpec::new(vec![ptr], |worker, cur| {
            let obj = cur.read_reg()?;
            let _ = worker.ref_shared::<Item>(obj)?;
            Ok(Flow::Continue)
        }),
    );

    let container = parser.parse("cast", "misread unit; return out;").unwrap();

    let unit = Unit::default();
    let mut out = (0i64,);
    let err = parser
        .worker((&unit,))
        .execute(&container, &mut out)
        .unwrap_err();

    assert!(matches!(err, RuntimeError::InvalidCast { .. }));
}
