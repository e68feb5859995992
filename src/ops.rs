//! Standard operation set
//!
//! A compact baseline catalog: data movement, wrapping integer arithmetic,
//! bitwise operations, accumulator transforms, condition operations for
//! `if`, and tag access for host object types. Hosts are free to ignore
//! [`install`] and register their own catalog; everything here goes through
//! the same public registration surface.
//!
//! Division by zero is a runtime failure; arithmetic otherwise wraps, and
//! shift amounts are masked to the word width.

use std::any::Any;

use crate::catalog::OverloadSpec;
use crate::compiler::{Operand, ParserWriter};
use crate::error::{CompileErrorKind, ConfigError, RuntimeError};
use crate::parser::ParserCore;
use crate::tags::{Tag, Tagged};
use crate::types::{ArgFlags, ArgKind};
use crate::vm::{Cursor, Flow, Worker};

fn int_reg() -> ArgKind {
    ArgKind::INT.decorate(ArgFlags::REGISTER)
}

fn operand_kind(register: bool) -> ArgKind {
    if register {
        int_reg()
    } else {
        ArgKind::INT
    }
}

fn read_int(
    worker: &Worker<'_>,
    cur: &mut Cursor<'_>,
    register: bool,
) -> Result<i64, RuntimeError> {
    if register {
        Ok(worker.word(cur.read_reg()?))
    } else {
        cur.read_word()
    }
}

fn div_checked(a: i64, b: i64) -> Result<i64, RuntimeError> {
    if b == 0 {
        return Err(RuntimeError::HandlerFailure("division by zero".to_string()));
    }

    Ok(a.wrapping_div(b))
}

/// Register the four register/constant source combinations of a pure
/// binary operation `dest = f(a, b)`, folding enabled.
fn pure_binary(
    parser: &mut ParserCore,
    name: &str,
    f: fn(i64, i64) -> Result<i64, RuntimeError>,
) {
    for (a_reg, b_reg) in [(true, true), (true, false), (false, true), (false, false)] {
        parser.register_op(
            name,
            OverloadSpec::new(
                vec![int_reg(), operand_kind(a_reg), operand_kind(b_reg)],
                move |worker, cur| {
                    let dst = cur.read_reg()?;
                    let a = read_int(worker, cur, a_reg)?;
                    let b = read_int(worker, cur, b_reg)?;

                    let value = f(a, b)?;
                    worker.set_word(dst, value);

                    Ok(Flow::Continue)
                },
            ),
        );
    }

    parser.set_fold(name, move |args| match *args {
        [a, b] => f(a, b).ok(),
        _ => None,
    });
}

/// Register an accumulator transform `dest = f(dest, a, b)`.
fn accumulator(
    parser: &mut ParserCore,
    name: &str,
    f: fn(i64, i64, i64) -> Result<i64, RuntimeError>,
) {
    for (a_reg, b_reg) in [(true, true), (true, false), (false, true), (false, false)] {
        parser.register_op(
            name,
            OverloadSpec::new(
                vec![int_reg(), operand_kind(a_reg), operand_kind(b_reg)],
                move |worker, cur| {
                    let dst = cur.read_reg()?;
                    let a = read_int(worker, cur, a_reg)?;
                    let b = read_int(worker, cur, b_reg)?;

                    let value = f(worker.word(dst), a, b)?;
                    worker.set_word(dst, value);

                    Ok(Flow::Continue)
                },
            ),
        );
    }
}

/// Register an in-place unary operation `dest = f(dest)`.
fn unary(parser: &mut ParserCore, name: &str, f: fn(i64) -> i64) {
    parser.register_op(
        name,
        OverloadSpec::new(vec![int_reg()], move |worker, cur| {
            let dst = cur.read_reg()?;

            let value = f(worker.word(dst));
            worker.set_word(dst, value);

            Ok(Flow::Continue)
        }),
    );
}

/// Register a condition operation for `if`: compare, then transfer control
/// to one of the two appended jump targets.
fn condition(parser: &mut ParserCore, name: &str, f: fn(i64, i64) -> bool) {
    for (a_reg, b_reg) in [(true, true), (true, false), (false, true), (false, false)] {
        parser.register_op(
            name,
            OverloadSpec::new(
                vec![
                    operand_kind(a_reg),
                    operand_kind(b_reg),
                    ArgKind::LABEL,
                    ArgKind::LABEL,
                ],
                move |worker, cur| {
                    let a = read_int(worker, cur, a_reg)?;
                    let b = read_int(worker, cur, b_reg)?;
                    let on_true = cur.read_target()?;
                    let on_false = cur.read_target()?;

                    cur.jump(if f(a, b) { on_true } else { on_false })?;

                    Ok(Flow::Continue)
                },
            ),
        );
    }
}

/// Install the standard operation set on a parser.
pub fn install(parser: &mut ParserCore) {
    // Data movement.
    for src_reg in [true, false] {
        parser.register_op(
            "set",
            OverloadSpec::new(
                vec![int_reg(), operand_kind(src_reg)],
                move |worker, cur| {
                    let dst = cur.read_reg()?;
                    let value = read_int(worker, cur, src_reg)?;

                    worker.set_word(dst, value);

                    Ok(Flow::Continue)
                },
            ),
        );
    }

    parser.register_op(
        "swap",
        OverloadSpec::new(vec![int_reg(), int_reg()], |worker, cur| {
            let a = cur.read_reg()?;
            let b = cur.read_reg()?;

            let left = worker.word(a);
            let right = worker.word(b);
            worker.set_word(a, right);
            worker.set_word(b, left);

            Ok(Flow::Continue)
        }),
    );

    unary(parser, "clear", |_| 0);
    unary(parser, "abs", i64::wrapping_abs);
    unary(parser, "neg", i64::wrapping_neg);

    // Arithmetic.
    pure_binary(parser, "add", |a, b| Ok(a.wrapping_add(b)));
    pure_binary(parser, "sub", |a, b| Ok(a.wrapping_sub(b)));
    pure_binary(parser, "mul", |a, b| Ok(a.wrapping_mul(b)));
    pure_binary(parser, "div", div_checked);
    pure_binary(parser, "mod", |a, b| {
        if b == 0 {
            Err(RuntimeError::HandlerFailure("division by zero".to_string()))
        } else {
            Ok(a.wrapping_rem(b))
        }
    });
    pure_binary(parser, "min", |a, b| Ok(a.min(b)));
    pure_binary(parser, "max", |a, b| Ok(a.max(b)));

    // Bitwise.
    pure_binary(parser, "and", |a, b| Ok(a & b));
    pure_binary(parser, "or", |a, b| Ok(a | b));
    pure_binary(parser, "xor", |a, b| Ok(a ^ b));
    pure_binary(parser, "shl", |a, b| Ok(a.wrapping_shl(b as u32 & 63)));
    pure_binary(parser, "shr", |a, b| Ok(a.wrapping_shr(b as u32 & 63)));

    // Accumulator transforms.
    accumulator(parser, "muldiv", |dest, mul, div| {
        div_checked(dest.wrapping_mul(mul), div)
    });
    accumulator(parser, "offset", |dest, mul, add| {
        Ok(dest.wrapping_mul(mul).wrapping_add(add))
    });
    accumulator(parser, "limit", |dest, lo, hi| Ok(dest.clamp(lo.min(hi), hi.max(lo))));

    // Conditions.
    condition(parser, "eq", |a, b| a == b);
    condition(parser, "neq", |a, b| a != b);
    condition(parser, "lt", |a, b| a < b);
    condition(parser, "le", |a, b| a <= b);
    condition(parser, "gt", |a, b| a > b);
    condition(parser, "ge", |a, b| a >= b);

    // Diagnostics.
    for src_reg in [true, false] {
        parser.register_op(
            "debug_log",
            OverloadSpec::new(vec![operand_kind(src_reg)], move |worker, cur| {
                let value = read_int(worker, cur, src_reg)?;
                tracing::debug!(value, "script debug_log");

                Ok(Flow::Continue)
            }),
        );
    }
}

/// Register `Type.getTag` / `Type.setTag` for a tagged host type.
///
/// The tag argument is a tag constant, an integer register, or a quoted
/// tag name resolved at compile time through a parse hook.
pub fn install_tag_ops<T: Tagged>(parser: &mut ParserCore) -> Result<(), ConfigError> {
    let base = parser
        .global()
        .types()
        .id_of::<T>()
        .ok_or_else(|| ConfigError::UnknownType(std::any::type_name::<T>().to_string()))?;
    let type_name = parser.global().types().name(base).to_string();

    let ptr = ArgKind::new(base).decorate(ArgFlags::REGISTER | ArgFlags::PTR);
    let ptre = ptr.decorate(ArgFlags::PTR_EDITABLE);

    let get_name = format!("{type_name}.getTag");
    let set_name = format!("{type_name}.setTag");

    for tag_reg in [false, true] {
        parser.register_op(
            &get_name,
            OverloadSpec::new(
                vec![ptr, int_reg(), operand_kind(tag_reg)],
                move |worker, cur| {
                    let obj = cur.read_reg()?;
                    let dst = cur.read_reg()?;
                    let tag = read_int(worker, cur, tag_reg)?;

                    let value = {
                        let obj = worker.ref_shared::<T>(obj)?;
                        Tag::<T>::from_raw(tag)
                            .map(|tag| obj.script_values().get(tag))
                            .unwrap_or(0)
                    };
                    worker.set_word(dst, value);

                    Ok(Flow::Continue)
                },
            ),
        );

        for value_reg in [false, true] {
            parser.register_op(
                &set_name,
                OverloadSpec::new(
                    vec![ptre, operand_kind(tag_reg), operand_kind(value_reg)],
                    move |worker, cur| {
                        let obj = cur.read_reg()?;
                        let tag = read_int(worker, cur, tag_reg)?;
                        let value = read_int(worker, cur, value_reg)?;

                        if let Some(tag) = Tag::<T>::from_raw(tag) {
                            worker.ref_unique::<T>(obj)?.script_values_mut().set(tag, value);
                        }

                        Ok(Flow::Continue)
                    },
                ),
            );
        }
    }

    // Quoted tag names resolve to their index at compile time, then reuse
    // the inline-constant encoding.
    let named_get = OverloadSpec::new(
        vec![ptr, int_reg(), ArgKind::TEXT],
        move |worker, cur| {
            let obj = cur.read_reg()?;
            let dst = cur.read_reg()?;
            let tag = cur.read_word()?;

            let value = {
                let obj = worker.ref_shared::<T>(obj)?;
                Tag::<T>::from_raw(tag)
                    .map(|tag| obj.script_values().get(tag))
                    .unwrap_or(0)
            };
            worker.set_word(dst, value);

            Ok(Flow::Continue)
        },
    )
    .with_parse(|writer: &mut ParserWriter<'_>, overload, operands: &[Operand], at| {
        let Some(Operand::Text { value: name }) = operands.last() else {
            return Ok(false);
        };

        let index = writer
            .parser()
            .global()
            .tag::<T>(name)
            .map(|tag| tag.index() as i64)
            .ok_or_else(|| {
                writer.err(at, CompileErrorKind::UnknownIdentifier, "unknown tag name")
            })?;

        let mut operands = operands.to_vec();
        *operands.last_mut().expect("checked non-empty") = Operand::Const {
            value: index,
            kind: ArgKind::INT,
        };

        writer.emit_default(overload, &operands, at)?;

        Ok(true)
    });
    parser.register_op(&get_name, named_get);

    Ok(())
}

/// Register a pointer-field load `Type.name dest;` backed by a plain
/// accessor.
pub fn register_getter<T: Any>(
    parser: &mut ParserCore,
    name: &str,
    get: fn(&T) -> i64,
) -> Result<(), ConfigError> {
    let base = parser
        .global()
        .types()
        .id_of::<T>()
        .ok_or_else(|| ConfigError::UnknownType(std::any::type_name::<T>().to_string()))?;
    let type_name = parser.global().types().name(base).to_string();
    let ptr = ArgKind::new(base).decorate(ArgFlags::REGISTER | ArgFlags::PTR);

    parser.register_op(
        &format!("{type_name}.{name}"),
        OverloadSpec::new(vec![ptr, int_reg()], move |worker, cur| {
            let obj = cur.read_reg()?;
            let dst = cur.read_reg()?;

            let value = get(worker.ref_shared::<T>(obj)?);
            worker.set_word(dst, value);

            Ok(Flow::Continue)
        }),
    );

    Ok(())
}

/// Register a pointer-field store `Type.name value;` backed by a plain
/// mutator.
pub fn register_setter<T: Any>(
    parser: &mut ParserCore,
    name: &str,
    set: fn(&mut T, i64),
) -> Result<(), ConfigError> {
    let base = parser
        .global()
        .types()
        .id_of::<T>()
        .ok_or_else(|| ConfigError::UnknownType(std::any::type_name::<T>().to_string()))?;
    let type_name = parser.global().types().name(base).to_string();
    let ptre = ArgKind::new(base)
        .decorate(ArgFlags::REGISTER | ArgFlags::PTR | ArgFlags::PTR_EDITABLE);

    for value_reg in [true, false] {
        parser.register_op(
            &format!("{type_name}.{name}"),
            OverloadSpec::new(
                vec![ptre, operand_kind(value_reg)],
                move |worker, cur| {
                    let obj = cur.read_reg()?;
                    let value = read_int(worker, cur, value_reg)?;

                    set(worker.ref_unique::<T>(obj)?, value);

                    Ok(Flow::Continue)
                },
            ),
        );
    }

    Ok(())
}
