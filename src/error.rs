//! Compile, runtime and configuration error implementation

use std::fmt;

use thiserror::Error;

/// Classification of a compile failure.
///
/// Every variant maps to one rejection rule of the compiler; the surrounding
/// [`CompileError`] record carries the source location and offending token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileErrorKind {
    /// The token stream doesn't form a valid statement.
    Syntax,
    /// A name resolved neither to a local, a parser symbol, a global shared
    /// constant, nor an operation.
    UnknownIdentifier,
    /// An argument's kind is incompatible with the declared kind.
    TypeMismatch,
    /// No overload of the operation accepts the supplied argument kinds.
    NoMatchingOverload,
    /// Two overloads scored identically for the supplied argument kinds.
    AmbiguousOverload,
    /// A local with the same name already exists in the enclosing scope.
    DuplicateLocal,
    /// The destination of an operation is not a writable register.
    InvalidLValue,
    /// Local declarations exceeded the register file capacity.
    RegisterFileOverflow,
    /// A jump target was never placed before the end of the script.
    UnresolvedLabel,
    /// A constant or function name collides with an existing declaration.
    DuplicateDeclaration,
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Syntax => "syntax error",
            Self::UnknownIdentifier => "unknown identifier",
            Self::TypeMismatch => "type mismatch",
            Self::NoMatchingOverload => "no matching overload",
            Self::AmbiguousOverload => "ambiguous overload",
            Self::DuplicateLocal => "duplicate local",
            Self::InvalidLValue => "invalid lvalue",
            Self::RegisterFileOverflow => "register file overflow",
            Self::UnresolvedLabel => "unresolved label",
            Self::DuplicateDeclaration => "duplicate declaration",
        };

        f.write_str(text)
    }
}

/// Structured compile failure record.
///
/// Compilation is transactional; when a `CompileError` is returned the
/// partially built container is discarded and the parser is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} in `{parent}` at {line}:{column} near `{token}`: {message}")]
pub struct CompileError {
    /// Rejection rule that fired.
    pub kind: CompileErrorKind,
    /// 1-indexed source line.
    pub line: u32,
    /// 1-indexed source column.
    pub column: u32,
    /// The offending token, verbatim.
    pub token: String,
    /// Human-readable detail.
    pub message: String,
    /// Name of the script being compiled, for diagnostics.
    pub parent: String,
}

/// Script runtime error variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// A pointer or tagged value was accessed at the wrong base type.
    #[error("invalid cast: expected `{expected}`, got `{actual}`")]
    InvalidCast {
        /// Type the handler asked for.
        expected: String,
        /// Type actually bound at the slot.
        actual: String,
    },
    /// The per-execute instruction counter was exhausted.
    #[error("instruction budget of {0} exceeded")]
    InstructionBudgetExceeded(usize),
    /// A registered operation handler reported a failure.
    #[error("operation failure: {0}")]
    HandlerFailure(String),
    /// The opcode handle doesn't index the dispatch table. Indicates a
    /// container executed against a foreign or stale catalog.
    #[error("invalid opcode handle {0:#06x}")]
    InvalidOpcode(u16),
    /// An instruction's immediates run past the end of the bytecode.
    #[error("bytecode truncated at offset {0}")]
    TruncatedCode(usize),
}

/// Host configuration error variants, raised during the init/freeze phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A tag references a value type that was never registered.
    #[error("unknown tag value type `{0}`")]
    UnknownTagValueType(String),
    /// A tag name was registered twice for the same kind.
    #[error("duplicate tag name `{0}`")]
    DuplicateTagName(String),
    /// A type, constant or register name was registered twice.
    #[error("duplicate declaration of `{0}`")]
    DuplicateDeclaration(String),
    /// The tag kind reached its declared index limit.
    #[error("tag capacity {limit} exhausted for kind `{kind}`")]
    TagCapacity {
        /// Display name of the tag kind.
        kind: String,
        /// Declared index limit.
        limit: u32,
    },
    /// A host type was used before being registered.
    #[error("unregistered type `{0}`")]
    UnknownType(String),
    /// The tag kind of the host object was never declared.
    #[error("unknown tag kind `{0}`")]
    UnknownTagKind(String),
    /// Declared outputs and inputs exceed the register file capacity.
    #[error("register file overflow declaring `{0}`")]
    RegisterFileOverflow(String),
    /// More output registers than the engine supports.
    #[error("too many output registers ({0})")]
    TooManyOutputs(usize),
    /// A persisted tag value couldn't be decoded by its adapter.
    #[error("invalid value `{value}` for tag `{name}`")]
    InvalidTagValue {
        /// Tag name from the persisted mapping.
        name: String,
        /// Rejected payload, verbatim.
        value: String,
    },
    /// An event was registered with a priority outside the accepted range.
    #[error("event priority {0} out of range")]
    EventPriorityRange(i64),
    /// The events parser was mutated after freeze.
    #[error("events already frozen for `{0}`")]
    EventsFrozen(String),
    /// A declared name doesn't fit the identifier grammar.
    #[error("invalid name `{0}`")]
    InvalidName(String),
    /// The declared register names don't match the script kind's arity.
    #[error("expected {expected} register names, got {got}")]
    NameCountMismatch {
        /// Arity of the declared tuple.
        expected: usize,
        /// Number of names supplied.
        got: usize,
    },
    /// The parser's signature doesn't fit the blit worker's conventions.
    #[error("parser `{0}` doesn't match the blit signature")]
    BlitSignature(String),
}
