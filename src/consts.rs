//! Engine parameters

use std::mem;

/* REGISTER FILE */

/// Width of one machine word in the register file, in bytes.
pub const WORD_SIZE: usize = mem::size_of::<u64>();

/// Register file capacity, in words.
pub const VM_REGISTER_COUNT: usize = 64;

/// Register file capacity, in bytes. All register offsets are below this.
pub const VM_REGISTER_FILE_SIZE: usize = VM_REGISTER_COUNT * WORD_SIZE;

/// Maximum number of output registers a script kind may declare.
pub const VM_OUTPUT_REGISTERS_MAX: usize = 4;

/* BYTECODE */

/// Encoded width of an opcode handle in bytecode.
pub const OPCODE_SIZE: usize = mem::size_of::<u16>();

/// Encoded width of a register-offset immediate.
pub const REG_IMM_SIZE: usize = mem::size_of::<u16>();

/// Encoded width of an inline constant immediate.
pub const CONST_IMM_SIZE: usize = mem::size_of::<i64>();

/// Encoded width of a label-target immediate.
pub const LABEL_IMM_SIZE: usize = mem::size_of::<u32>();

/* EXECUTION */

/// Default per-execute instruction budget.
///
/// Scripts are expected to be short frame-level kernels; the budget is a
/// watchdog against accidental infinite loops, not a scheduling device.
pub const DEFAULT_INSTRUCTION_BUDGET: usize = 16 * 1024;

/// Maximum nesting depth of inlined function bodies during compilation.
pub const MAX_INLINE_DEPTH: usize = 16;

/* EVENTS */

/// Scale applied to event priorities so that registration order fits in the
/// remainder of the key space and a plain sort is total and stable.
pub const EVENT_OFFSET_SCALE: i64 = 100;

/// Event priorities are accepted in `[-EVENT_OFFSET_MAX, EVENT_OFFSET_MAX]`.
pub const EVENT_OFFSET_MAX: i64 = 100;
