//! Operation catalog
//!
//! Maps operation names to overload sets and owns the frozen dispatch
//! table. Bytecode identifies a runtime routine by a `u16` handle into the
//! table, which keeps containers position-independent and serializable;
//! dispatch stays a single indirect call.

use std::collections::HashMap;

use crate::compiler::{Operand, ParserWriter, Token};
use crate::error::{CompileError, RuntimeError};
use crate::types::{compat, ArgKind};
use crate::vm::{Cursor, Flow, Worker};

/// A runtime routine invoked by the dispatch loop. Reads its own immediates
/// through the cursor; everything it touches beyond the register file is its
/// own responsibility.
pub type OpHandler =
    Box<dyn Fn(&mut Worker<'_>, &mut Cursor<'_>) -> Result<Flow, RuntimeError> + Send + Sync>;

/// Custom overload scorer: `(declared, supplied, ordinal)` to a summed
/// score, `0` rejecting the overload.
pub type ScoreFn = fn(&[ArgKind], &[ArgKind], usize) -> u32;

/// Compile-time evaluator for fold-enabled operations, applied to the
/// source arguments of a `const` declaration. `None` declines the fold.
pub type FoldFn = Box<dyn Fn(&[i64]) -> Option<i64> + Send + Sync>;

/// Compile hook invoked for the winning overload, with the call-site token
/// for diagnostics. May emit bytecode through the writer directly (for
/// variable-length immediates); returning `Ok(false)` falls through to the
/// default emitter.
pub type ParseHook = Box<
    dyn Fn(&mut ParserWriter<'_>, &Overload, &[Operand], &Token) -> Result<bool, CompileError>
        + Send
        + Sync,
>;

/// One alternative signature of a named operation.
pub struct Overload {
    /// Declared argument kinds, positional.
    pub args: Vec<ArgKind>,
    /// Handle of the interned runtime routine.
    pub opcode: u16,
    pub(crate) parse: Option<ParseHook>,
}

impl std::fmt::Debug for Overload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overload")
            .field("args", &self.args)
            .field("opcode", &self.opcode)
            .field("parse", &self.parse.is_some())
            .finish()
    }
}

/// Specification of one overload at registration time.
pub struct OverloadSpec {
    /// Declared argument kinds, positional.
    pub args: Vec<ArgKind>,
    /// Runtime routine.
    pub handler: OpHandler,
    /// Compile hook, for operations that emit custom immediates.
    pub parse: Option<ParseHook>,
}

impl OverloadSpec {
    /// Overload with the default emitter.
    pub fn new(
        args: Vec<ArgKind>,
        handler: impl Fn(&mut Worker<'_>, &mut Cursor<'_>) -> Result<Flow, RuntimeError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            args,
            handler: Box::new(handler),
            parse: None,
        }
    }

    /// Attach a compile hook.
    pub fn with_parse(
        mut self,
        parse: impl Fn(&mut ParserWriter<'_>, &Overload, &[Operand], &Token) -> Result<bool, CompileError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.parse = Some(Box::new(parse));
        self
    }
}

/// Runtime descriptor of one operation name.
pub struct ProcDesc {
    name: String,
    scorer: Option<ScoreFn>,
    fold: Option<FoldFn>,
    overloads: Vec<Overload>,
}

impl ProcDesc {
    /// Operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared overloads, in registration order.
    pub fn overloads(&self) -> &[Overload] {
        &self.overloads
    }

    /// Compile-time evaluator, when the operation opts into folding.
    pub fn fold(&self) -> Option<&(dyn Fn(&[i64]) -> Option<i64> + Send + Sync)> {
        self.fold.as_deref()
    }
}

/// Operation name to overload set mapping plus the frozen dispatch table.
#[derive(Default)]
pub struct Catalog {
    procs: HashMap<String, ProcDesc>,
    table: Vec<OpHandler>,
}

impl Catalog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register one overload under `name`, creating the descriptor on first
    /// use. Returns the interned opcode handle.
    pub fn register(&mut self, name: &str, spec: OverloadSpec) -> u16 {
        let opcode = self.intern(spec.handler);

        let desc = self
            .procs
            .entry(name.to_string())
            .or_insert_with(|| ProcDesc {
                name: name.to_string(),
                scorer: None,
                fold: None,
                overloads: Vec::new(),
            });

        desc.overloads.push(Overload {
            args: spec.args,
            opcode,
            parse: spec.parse,
        });

        opcode
    }

    /// Replace the default summed-compat scorer for `name`.
    pub fn set_scorer(&mut self, name: &str, scorer: ScoreFn) {
        if let Some(desc) = self.procs.get_mut(name) {
            desc.scorer = Some(scorer);
        }
    }

    /// Opt the operation into compile-time constant folding.
    pub fn set_fold(
        &mut self,
        name: &str,
        fold: impl Fn(&[i64]) -> Option<i64> + Send + Sync + 'static,
    ) {
        if let Some(desc) = self.procs.get_mut(name) {
            desc.fold = Some(Box::new(fold));
        }
    }

    /// Intern a routine outside any named operation. Used for the control
    /// instructions the compiler emits itself.
    pub(crate) fn intern(&mut self, handler: OpHandler) -> u16 {
        let opcode = self.table.len() as u16;
        self.table.push(handler);

        opcode
    }

    /// Whether `name` has at least one registered overload.
    pub fn contains(&self, name: &str) -> bool {
        self.procs.contains_key(name)
    }

    /// Descriptor registered under `name`.
    pub fn proc(&self, name: &str) -> Option<&ProcDesc> {
        self.procs.get(name)
    }

    pub(crate) fn handler(&self, opcode: u16) -> Option<&OpHandler> {
        self.table.get(opcode as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResolveFailure {
    NoMatch,
    Ambiguous,
}

fn default_score(declared: &[ArgKind], supplied: &[ArgKind], ordinal: usize) -> u32 {
    if declared.len() != supplied.len() {
        return 0;
    }

    let mut total = 0u32;

    for (&d, &s) in declared.iter().zip(supplied) {
        match compat(d, s, ordinal) {
            0 => return 0,
            score => total += score as u32,
        }
    }

    total
}

/// Pick the winning overload across the candidate descriptors.
///
/// Candidates are offered in lookup-priority order (type-qualified sets
/// before plain ones); each overload keeps its declaration ordinal within
/// its own descriptor, so merged sets can tie and surface as ambiguity.
pub(crate) fn resolve<'a>(
    candidates: &[&'a ProcDesc],
    supplied: &[ArgKind],
) -> Result<&'a Overload, ResolveFailure> {
    let mut best: Option<(&'a Overload, u32, usize)> = None;
    let mut ambiguous = false;

    for desc in candidates {
        let scorer = desc.scorer.unwrap_or(default_score);

        for (ordinal, overload) in desc.overloads.iter().enumerate() {
            let score = scorer(&overload.args, supplied, ordinal);
            if score == 0 {
                continue;
            }

            match best {
                None => best = Some((overload, score, ordinal)),
                Some((_, best_score, best_ordinal)) => {
                    if score > best_score || (score == best_score && ordinal < best_ordinal) {
                        best = Some((overload, score, ordinal));
                        ambiguous = false;
                    } else if score == best_score && ordinal == best_ordinal {
                        ambiguous = true;
                    }
                }
            }
        }
    }

    match best {
        Some(_) if ambiguous => Err(ResolveFailure::Ambiguous),
        Some((overload, ..)) => Ok(overload),
        None => Err(ResolveFailure::NoMatch),
    }
}
