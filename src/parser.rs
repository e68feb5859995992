//! Script-kind declarations and the strongly-typed façade
//!
//! [`ParserCore`] is the fully type-erased declaration of one script kind:
//! its symbol table, operation catalog and register layout. The generic
//! [`Parser`] wrapper binds a compile-time output/input tuple to the core;
//! its sole job is marshalling host values into and out of the register
//! file at the declared offsets.

use std::any::Any;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::catalog::{Catalog, Overload, OverloadSpec, ScoreFn};
use crate::compiler::{Operand, ParserWriter, Token};
use crate::consts::*;
use crate::container::{Container, ContainerEvents};
use crate::error::{CompileError, ConfigError, RuntimeError};
use crate::global::ScriptGlobal;
use crate::symbols::SymbolTable;
use crate::types::{ArgFlags, ArgKind, TypeId, TYPE_INT};
use crate::vm::{Flow, RegValue, Worker};

/// Opcode handles of the control instructions the compiler emits itself.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CtlOps {
    pub(crate) jump: u16,
    pub(crate) exit: u16,
    pub(crate) copy: u16,
    pub(crate) store: u16,
}

/// Type-erased declaration of one script kind.
///
/// Built during host init (types, operations, constants, functions,
/// default script), then frozen; `parse` only reads it.
pub struct ParserCore {
    id: u32,
    name: String,
    global: Arc<ScriptGlobal>,
    symbols: SymbolTable,
    catalog: Catalog,
    ctl: CtlOps,
    default_script: Option<String>,
}

impl ParserCore {
    /// A fresh script-kind declaration bound to the shared context.
    pub fn new(global: Arc<ScriptGlobal>, name: &str) -> Self {
        let mut catalog = Catalog::new();

        let ctl = CtlOps {
            jump: catalog.intern(Box::new(|_, cur| {
                let target = cur.read_target()?;
                cur.jump(target)?;
                Ok(Flow::Continue)
            })),
            exit: catalog.intern(Box::new(|_, _| Ok(Flow::End))),
            copy: catalog.intern(Box::new(|worker, cur| {
                let dst = cur.read_reg()?;
                let src = cur.read_reg()?;
                let len = cur.read_reg()?;
                worker.regs_mut().copy(dst, src, len);
                Ok(Flow::Continue)
            })),
            store: catalog.intern(Box::new(|worker, cur| {
                let dst = cur.read_reg()?;
                let value = cur.read_word()?;
                let len = cur.read_reg()?;
                worker.regs_mut().store_truncated(dst, value, len);
                Ok(Flow::Continue)
            })),
        };

        let mut symbols = SymbolTable::new();
        symbols
            .bind_type("int", TYPE_INT)
            .expect("fresh symbol table");

        Self {
            id: global.next_parser_id(),
            name: name.to_string(),
            global,
            symbols,
            catalog,
            ctl,
            default_script: None,
        }
    }

    /// Unique id of this script kind; containers record it.
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Host-facing name of the script kind.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shared context this parser was declared against.
    pub fn global(&self) -> &ScriptGlobal {
        &self.global
    }

    /// The frozen symbol table.
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// The operation catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub(crate) const fn ctl(&self) -> &CtlOps {
        &self.ctl
    }

    /// Make the registered host type `T` visible to scripts of this kind
    /// under its registered name.
    pub fn bind_type<T: 'static>(&mut self) -> Result<TypeId, ConfigError> {
        let id = self
            .global
            .types()
            .id_of::<T>()
            .ok_or_else(|| ConfigError::UnknownType(std::any::type_name::<T>().to_string()))?;
        let name = self.global.types().name(id).to_string();

        self.symbols.bind_type(&name, id)?;

        Ok(id)
    }

    /// Register one overload of a named operation.
    pub fn register_op(&mut self, name: &str, spec: OverloadSpec) -> u16 {
        self.catalog.register(name, spec)
    }

    /// Opt an operation into compile-time constant folding.
    pub fn set_fold(
        &mut self,
        name: &str,
        fold: impl Fn(&[i64]) -> Option<i64> + Send + Sync + 'static,
    ) {
        self.catalog.set_fold(name, fold);
    }

    /// Replace the default overload scorer of an operation.
    pub fn set_scorer(&mut self, name: &str, scorer: ScoreFn) {
        self.catalog.set_scorer(name, scorer);
    }

    /// Add a parser-local integer constant.
    pub fn add_const(&mut self, name: &str, value: i64) -> Result<(), ConfigError> {
        self.symbols.add_const(name, value)
    }

    /// Import the tag names of kind `T` as `PREFIX.NAME` constants, so
    /// scripts can pass tags to the tag operations.
    pub fn add_tag_consts<T: 'static>(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let kind = self
            .global
            .tag_kind::<T>()
            .ok_or_else(|| ConfigError::UnknownTagKind(std::any::type_name::<T>().to_string()))?;

        let names: Vec<(String, i64)> = (1..=kind.len())
            .filter_map(|index| {
                kind.name(index)
                    .map(|name| (format!("{prefix}.{name}"), index as i64))
            })
            .collect();

        for (name, value) in names {
            self.symbols.add_const(&name, value)?;
        }

        Ok(())
    }

    /// Register a script function, inlined at every call site.
    ///
    /// `params` pairs a type spelling (`"int"`, `"ptr Unit"`, `"ptre Unit"`)
    /// with the parameter name visible inside `body`. Integer parameters
    /// also accept constant arguments; every combination is declared as its
    /// own overload.
    pub fn add_function(
        &mut self,
        name: &str,
        params: &[(&str, &str)],
        body: &str,
    ) -> Result<(), ConfigError> {
        let mut kinds = Vec::with_capacity(params.len());
        let mut int_positions = Vec::new();

        for (position, (spelling, _)) in params.iter().enumerate() {
            let (flags, type_name) = match spelling.split_once(' ') {
                Some(("ptr", rest)) => (ArgFlags::REGISTER | ArgFlags::PTR, rest.trim()),
                Some(("ptre", rest)) => (
                    ArgFlags::REGISTER | ArgFlags::PTR | ArgFlags::PTR_EDITABLE,
                    rest.trim(),
                ),
                _ => (ArgFlags::REGISTER, spelling.trim()),
            };

            let base = self
                .symbols
                .type_by_name(type_name)
                .ok_or_else(|| ConfigError::UnknownType(type_name.to_string()))?;
            let kind = ArgKind::new(base).decorate(flags);

            if base == TYPE_INT && !kind.is_ptr() && int_positions.len() < 3 {
                int_positions.push(position);
            }

            kinds.push(kind);
        }

        let names: Vec<String> = params.iter().map(|(_, name)| name.to_string()).collect();
        let body = body.to_string();

        for mask in 0..(1u32 << int_positions.len()) {
            let mut args = kinds.clone();
            for (bit, &position) in int_positions.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    args[position] = ArgKind::INT;
                }
            }

            let hook_names = names.clone();
            let hook_body = body.clone();

            let spec = OverloadSpec::new(args, |_, _| {
                Err(RuntimeError::HandlerFailure(
                    "inlined function reached at runtime".to_string(),
                ))
            })
            .with_parse(
                move |writer: &mut ParserWriter<'_>,
                      _overload: &Overload,
                      operands: &[Operand],
                      at: &Token| {
                    writer.compile_inline(at, &hook_names, operands, &hook_body)?;
                    Ok(true)
                },
            );

            self.catalog.register(name, spec);
        }

        Ok(())
    }

    /// Set the script substituted when a source fails to compile.
    pub fn set_default_script(&mut self, source: &str) {
        self.default_script = Some(source.to_string());
    }

    pub(crate) fn declare_output(
        &mut self,
        name: &str,
        kind: ArgKind,
        size: usize,
    ) -> Result<u16, ConfigError> {
        self.symbols.declare_output(name, kind, size)
    }

    pub(crate) fn declare_input(
        &mut self,
        name: &str,
        kind: ArgKind,
        size: usize,
    ) -> Result<u16, ConfigError> {
        self.symbols.declare_input(name, kind, size)
    }

    /// Compile a script source against this declaration.
    pub fn parse(&self, parent: &str, source: &str) -> Result<Container, CompileError> {
        ParserWriter::new(self, parent).compile(source)
    }

    /// Compile with fallback: a failing source is replaced by the default
    /// script, and a failing default by an empty container.
    pub fn parse_or_default(&self, parent: &str, source: &str) -> Container {
        match self.parse(parent, source) {
            Ok(container) => container,
            Err(error) => {
                tracing::warn!(%error, parent, "script failed to compile; using default");

                let Some(default) = self.default_script.as_deref() else {
                    return Container::empty(self.id);
                };

                match self.parse(parent, default) {
                    Ok(container) => container,
                    Err(error) => {
                        tracing::warn!(%error, parent, "default script failed to compile");
                        Container::empty(self.id)
                    }
                }
            }
        }
    }
}

/* TYPED FAÇADE */

/// Declared shape and size of one register, as derived from a host type.
#[derive(Debug, Clone, Copy)]
pub struct DeclInfo {
    /// Shape offered to the compiler.
    pub kind: ArgKind,
    /// In-register size, in bytes.
    pub size: usize,
}

/// A host type usable as a plain in-register script value.
pub trait ScriptValue: RegValue + Any {
    /// The engine identity of the type.
    fn base_type(global: &ScriptGlobal) -> Result<TypeId, ConfigError>;
}

impl ScriptValue for i64 {
    fn base_type(_: &ScriptGlobal) -> Result<TypeId, ConfigError> {
        Ok(TYPE_INT)
    }
}

/// One declared script input: a plain value, or a pointer marker
/// ([`Ref`]/[`Mut`]).
pub trait ArgDecl: 'static {
    /// The host-side value bound into a worker living for `'h`.
    type Runtime<'h>;

    /// Declared shape and size.
    fn info(global: &ScriptGlobal) -> Result<DeclInfo, ConfigError>;

    /// Marshal the value into the register file at `offset`.
    fn bind<'h>(value: Self::Runtime<'h>, worker: &mut Worker<'h>, offset: u16);
}

impl ArgDecl for i64 {
    type Runtime<'h> = i64;

    fn info(_: &ScriptGlobal) -> Result<DeclInfo, ConfigError> {
        Ok(DeclInfo {
            kind: ArgKind::INT.decorate(ArgFlags::REGISTER),
            size: <i64 as RegValue>::SIZE,
        })
    }

    fn bind<'h>(value: i64, worker: &mut Worker<'h>, offset: u16) {
        worker.regs_mut().write(offset, value);
    }
}

/// Declaration marker for a read-only pointer input over `T`.
pub struct Ref<T>(PhantomData<fn() -> T>);

impl<T: Any> ArgDecl for Ref<T> {
    type Runtime<'h> = &'h T;

    fn info(global: &ScriptGlobal) -> Result<DeclInfo, ConfigError> {
        let base = global
            .types()
            .id_of::<T>()
            .ok_or_else(|| ConfigError::UnknownType(std::any::type_name::<T>().to_string()))?;

        Ok(DeclInfo {
            kind: ArgKind::new(base).decorate(ArgFlags::REGISTER | ArgFlags::PTR),
            size: WORD_SIZE,
        })
    }

    fn bind<'h>(value: &'h T, worker: &mut Worker<'h>, offset: u16) {
        let handle = worker.bind_shared(value);
        worker.regs_mut().write(offset, handle);
    }
}

/// Declaration marker for a writable pointer input over `T`.
pub struct Mut<T>(PhantomData<fn() -> T>);

impl<T: Any> ArgDecl for Mut<T> {
    type Runtime<'h> = &'h mut T;

    fn info(global: &ScriptGlobal) -> Result<DeclInfo, ConfigError> {
        let base = global
            .types()
            .id_of::<T>()
            .ok_or_else(|| ConfigError::UnknownType(std::any::type_name::<T>().to_string()))?;

        Ok(DeclInfo {
            kind: ArgKind::new(base)
                .decorate(ArgFlags::REGISTER | ArgFlags::PTR | ArgFlags::PTR_EDITABLE),
            size: WORD_SIZE,
        })
    }

    fn bind<'h>(value: &'h mut T, worker: &mut Worker<'h>, offset: u16) {
        let handle = worker.bind_unique(value);
        worker.regs_mut().write(offset, handle);
    }
}

/// The declared input tuple of a script kind.
pub trait ArgsDecl: 'static {
    /// Host-side values bound at execution.
    type Runtime<'h>;

    /// Tuple arity.
    const LEN: usize;

    /// Declared shapes and sizes, positional.
    fn infos(global: &ScriptGlobal) -> Result<Vec<DeclInfo>, ConfigError>;

    /// Marshal the values into the register file at the declared offsets.
    fn bind<'h>(values: Self::Runtime<'h>, worker: &mut Worker<'h>, offsets: &[u16]);
}

macro_rules! impl_args_decl {
    ($len:expr; $($name:ident : $idx:tt),*) => {
        impl<$($name: ArgDecl),*> ArgsDecl for ($($name,)*) {
            type Runtime<'h> = ($($name::Runtime<'h>,)*);

            const LEN: usize = $len;

            fn infos(global: &ScriptGlobal) -> Result<Vec<DeclInfo>, ConfigError> {
                let _ = global;
                Ok(vec![$($name::info(global)?),*])
            }

            #[allow(unused_variables)]
            fn bind<'h>(values: Self::Runtime<'h>, worker: &mut Worker<'h>, offsets: &[u16]) {
                $($name::bind(values.$idx, worker, offsets[$idx]);)*
            }
        }
    };
}

impl_args_decl!(0;);
impl_args_decl!(1; A: 0);
impl_args_decl!(2; A: 0, B: 1);
impl_args_decl!(3; A: 0, B: 1, C: 2);
impl_args_decl!(4; A: 0, B: 1, C: 2, D: 3);
impl_args_decl!(5; A: 0, B: 1, C: 2, D: 3, E: 4);
impl_args_decl!(6; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
impl_args_decl!(7; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
impl_args_decl!(8; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);

/// The declared output tuple of a script kind; outputs are always plain
/// values.
pub trait OutsDecl: 'static {
    /// Host-side tuple copied in before and out after a run.
    type Runtime: Clone;

    /// Tuple arity.
    const LEN: usize;

    /// Declared shapes and sizes, positional.
    fn infos(global: &ScriptGlobal) -> Result<Vec<DeclInfo>, ConfigError>;

    /// Copy the caller's output values into the output region.
    fn store(values: &Self::Runtime, worker: &mut Worker<'_>, offsets: &[u16]);

    /// Copy the output region back out.
    fn fetch(worker: &Worker<'_>, offsets: &[u16]) -> Self::Runtime;
}

macro_rules! impl_outs_decl {
    ($len:expr; $($name:ident : $idx:tt),*) => {
        impl<$($name: ScriptValue),*> OutsDecl for ($($name,)*) {
            type Runtime = ($($name,)*);

            const LEN: usize = $len;

            fn infos(global: &ScriptGlobal) -> Result<Vec<DeclInfo>, ConfigError> {
                let _ = global;
                Ok(vec![$(
                    DeclInfo {
                        kind: ArgKind::new($name::base_type(global)?)
                            .decorate(ArgFlags::REGISTER | ArgFlags::VAR),
                        size: <$name as RegValue>::SIZE,
                    }
                ),*])
            }

            #[allow(unused_variables)]
            fn store(values: &Self::Runtime, worker: &mut Worker<'_>, offsets: &[u16]) {
                $(worker.regs_mut().write(offsets[$idx], values.$idx);)*
            }

            #[allow(unused_variables, clippy::unused_unit)]
            fn fetch(worker: &Worker<'_>, offsets: &[u16]) -> Self::Runtime {
                ($(worker.regs().read::<$name>(offsets[$idx]),)*)
            }
        }
    };
}

impl_outs_decl!(0;);
impl_outs_decl!(1; A: 0);
impl_outs_decl!(2; A: 0, B: 1);
impl_outs_decl!(3; A: 0, B: 1, C: 2);
impl_outs_decl!(4; A: 0, B: 1, C: 2, D: 3);

/// A script-kind declaration with a compile-time output/input signature.
pub struct Parser<Out, Args> {
    core: ParserCore,
    output_offsets: Vec<u16>,
    input_offsets: Vec<u16>,
    _marker: PhantomData<(Out, Args)>,
}

impl<Out: OutsDecl, Args: ArgsDecl> Parser<Out, Args> {
    /// Declare a script kind: output registers first, inputs after, named
    /// in declaration order.
    pub fn new(
        global: &Arc<ScriptGlobal>,
        name: &str,
        output_names: &[&str],
        input_names: &[&str],
    ) -> Result<Self, ConfigError> {
        let mut core = ParserCore::new(Arc::clone(global), name);

        let out_infos = Out::infos(global)?;
        if out_infos.len() != output_names.len() {
            return Err(ConfigError::NameCountMismatch {
                expected: out_infos.len(),
                got: output_names.len(),
            });
        }

        let mut output_offsets = Vec::with_capacity(out_infos.len());
        for (info, name) in out_infos.iter().zip(output_names) {
            output_offsets.push(core.declare_output(name, info.kind, info.size)?);
        }

        let in_infos = Args::infos(global)?;
        if in_infos.len() != input_names.len() {
            return Err(ConfigError::NameCountMismatch {
                expected: in_infos.len(),
                got: input_names.len(),
            });
        }

        let mut input_offsets = Vec::with_capacity(in_infos.len());
        for (info, name) in in_infos.iter().zip(input_names) {
            input_offsets.push(core.declare_input(name, info.kind, info.size)?);
        }

        Ok(Self {
            core,
            output_offsets,
            input_offsets,
            _marker: PhantomData,
        })
    }

    /// The type-erased core.
    pub fn core(&self) -> &ParserCore {
        &self.core
    }

    /// Construct a worker with the declared inputs bound.
    pub fn worker<'h>(&self, inputs: Args::Runtime<'h>) -> TypedWorker<'_, 'h, Out, Args> {
        let mut worker = Worker::new();

        Args::bind(inputs, &mut worker, &self.input_offsets);
        worker.snapshot_inputs(self.core.symbols().input_span());

        TypedWorker {
            parser: self,
            worker,
        }
    }
}

impl<Out, Args> Deref for Parser<Out, Args> {
    type Target = ParserCore;

    fn deref(&self) -> &ParserCore {
        &self.core
    }
}

impl<Out, Args> DerefMut for Parser<Out, Args> {
    fn deref_mut(&mut self) -> &mut ParserCore {
        &mut self.core
    }
}

/// A worker bound to its parser's typed signature.
pub struct TypedWorker<'p, 'h, Out: OutsDecl, Args: ArgsDecl> {
    parser: &'p Parser<Out, Args>,
    worker: Worker<'h>,
}

impl<'p, 'h, Out: OutsDecl, Args: ArgsDecl> TypedWorker<'p, 'h, Out, Args> {
    /// Replace the default instruction budget.
    pub fn with_budget(mut self, budget: usize) -> Self {
        self.worker = self.worker.with_budget(budget);
        self
    }

    /// Run one container: copy the caller's output values in, execute, copy
    /// the output region back out.
    pub fn execute(
        &mut self,
        container: &Container,
        outputs: &mut Out::Runtime,
    ) -> Result<(), RuntimeError> {
        debug_assert_eq!(container.parser_id(), self.parser.core.id());

        Out::store(outputs, &mut self.worker, &self.parser.output_offsets);

        let mut budget = self.worker.budget();
        self.worker
            .execute_container(self.parser.core.catalog(), container, &mut budget)?;

        *outputs = Out::fetch(&self.worker, &self.parser.output_offsets);

        Ok(())
    }

    /// Run an events container: the before chain, the main script, then the
    /// after chain, resetting the input region before every run so events
    /// communicate only through outputs. The instruction budget spans the
    /// whole pass.
    pub fn execute_events(
        &mut self,
        events: &ContainerEvents,
        outputs: &mut Out::Runtime,
    ) -> Result<(), RuntimeError> {
        let catalog = self.parser.core.catalog();

        Out::store(outputs, &mut self.worker, &self.parser.output_offsets);

        let mut budget = self.worker.budget();

        for container in events.before() {
            self.worker.reset_inputs();
            self.worker.execute_container(catalog, container, &mut budget)?;
        }

        self.worker.reset_inputs();
        self.worker
            .execute_container(catalog, events.main(), &mut budget)?;

        for container in events.after() {
            self.worker.reset_inputs();
            self.worker.execute_container(catalog, container, &mut budget)?;
        }

        *outputs = Out::fetch(&self.worker, &self.parser.output_offsets);

        Ok(())
    }

    /// The underlying type-erased worker.
    pub fn raw(&mut self) -> &mut Worker<'h> {
        &mut self.worker
    }
}

/// Implement [`ScriptValue`] and [`ArgDecl`] for a registered host value
/// type.
#[macro_export]
macro_rules! impl_script_value {
    ($ty:ty) => {
        impl $crate::parser::ScriptValue for $ty {
            fn base_type(
                global: &$crate::global::ScriptGlobal,
            ) -> Result<$crate::types::TypeId, $crate::error::ConfigError> {
                global.types().id_of::<$ty>().ok_or_else(|| {
                    $crate::error::ConfigError::UnknownType(stringify!($ty).to_string())
                })
            }
        }

        impl $crate::parser::ArgDecl for $ty {
            type Runtime<'h> = $ty;

            fn info(
                global: &$crate::global::ScriptGlobal,
            ) -> Result<$crate::parser::DeclInfo, $crate::error::ConfigError> {
                Ok($crate::parser::DeclInfo {
                    kind: $crate::types::ArgKind::new(
                        <$ty as $crate::parser::ScriptValue>::base_type(global)?,
                    )
                    .decorate($crate::types::ArgFlags::REGISTER),
                    size: <$ty as $crate::vm::RegValue>::SIZE,
                })
            }

            fn bind<'h>(value: $ty, worker: &mut $crate::vm::Worker<'h>, offset: u16) {
                worker.regs_mut().write(offset, value);
            }
        }
    };
}
