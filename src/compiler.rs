//! Script compiler ([`ParserWriter`]) implementation
//!
//! A single pass over the token stream: statements resolve symbols against
//! the writer's scope stack and the parser's frozen symbol table, pick an
//! operation overload by compatibility score, and emit bytecode with label
//! fixups patched at block close. All mutable compile state lives in the
//! writer, so a failed parse leaves the parser untouched and the partial
//! container is simply dropped.

use crate::catalog::{resolve, Overload, ProcDesc, ResolveFailure};
use crate::container::Container;
use crate::error::{CompileError, CompileErrorKind};
use crate::parser::ParserCore;
use crate::symbols::RegisterDecl;
use crate::types::{ArgKind, TYPE_NULL};

mod lexer;
mod writer;

pub use lexer::{lex, Token, TokenKind};
pub(crate) use writer::{Binding, Scope};

/// Reserved statement keywords; locals and constants may not shadow them.
const RESERVED: &[&str] = &[
    "var", "const", "if", "else", "end", "loop", "break", "continue", "return", "ptr", "ptre",
    "null",
];

/// A resolved operation argument, as offered to overload resolution and the
/// emitters.
#[derive(Debug, Clone)]
pub enum Operand {
    /// A declared register at a fixed offset.
    Reg {
        /// Byte offset into the register file.
        offset: u16,
        /// Declared shape.
        kind: ArgKind,
        /// Stored size in bytes.
        size: u16,
    },
    /// A compile-time integer constant.
    Const {
        /// The constant's value.
        value: i64,
        /// Shape, normally the plain int kind.
        kind: ArgKind,
    },
    /// A jump label, introduced by the compiler for control flow.
    Label {
        /// Writer-local label id.
        id: u32,
    },
    /// A string literal; only operations with custom hooks accept these.
    Text {
        /// Literal content, quotes stripped.
        value: String,
    },
}

impl Operand {
    /// The operand's shape, as offered to overload resolution.
    pub fn kind(&self) -> ArgKind {
        match self {
            Self::Reg { kind, .. } => *kind,
            Self::Const { kind, .. } => *kind,
            Self::Label { .. } => ArgKind::LABEL,
            Self::Text { .. } => ArgKind::TEXT,
        }
    }
}

/// Token cursor over one source unit (a script or an inlined body).
pub(crate) struct Tokens {
    toks: Vec<Token>,
    pos: usize,
}

impl Tokens {
    fn new(toks: Vec<Token>) -> Self {
        Self { toks, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let tok = self.toks.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// The last consumed token, for end-of-input diagnostics.
    fn last(&self) -> Option<&Token> {
        self.toks.get(self.pos.saturating_sub(1)).or(self.toks.last())
    }
}

/// Which closing tokens end the current block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stop {
    /// Top level; only the end of input closes it.
    TopLevel,
    /// `end;` closes, `else;` splits.
    Keyword,
    /// `}` closes.
    Brace,
}

/// How a block was terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Term {
    Eof,
    End,
    Else,
    RBrace,
}

/// Single-pass compiler for one script source.
///
/// Borrows the parser immutably; everything mutable (bytecode, labels,
/// scopes, the local register allocator) lives here.
pub struct ParserWriter<'p> {
    parser: &'p ParserCore,
    parent: String,
    code: Vec<u8>,
    labels: Vec<Option<u32>>,
    fixups: Vec<writer::Fixup>,
    scopes: Vec<Scope>,
    loops: Vec<(u32, u32)>,
    reg_top: u16,
    inline_depth: usize,
}

impl<'p> ParserWriter<'p> {
    pub(crate) fn new(parser: &'p ParserCore, parent: &str) -> Self {
        Self {
            parser,
            parent: parent.to_string(),
            code: Vec::new(),
            labels: Vec::new(),
            fixups: Vec::new(),
            scopes: Vec::new(),
            loops: Vec::new(),
            reg_top: parser.symbols().reg_top(),
            inline_depth: 0,
        }
    }

    /// The parser this writer compiles against.
    pub fn parser(&self) -> &'p ParserCore {
        self.parser
    }

    /// Name of the script being compiled, for diagnostics.
    pub fn parent(&self) -> &str {
        &self.parent
    }

    pub(crate) fn compile(mut self, source: &str) -> Result<Container, CompileError> {
        let toks = lex(source, &self.parent)?;
        let mut toks = Tokens::new(toks);

        self.push_scope();
        let term = self.block(&mut toks, Stop::TopLevel)?;
        debug_assert_eq!(term, Term::Eof);
        self.pop_scope();

        self.emit_opcode(self.parser.ctl().exit);
        self.patch_fixups()?;

        tracing::debug!(
            parent = %self.parent,
            bytes = self.code.len(),
            "script compiled"
        );

        Ok(Container::new(self.code, self.parser.id()))
    }

    pub(crate) fn block(&mut self, toks: &mut Tokens, stop: Stop) -> Result<Term, CompileError> {
        loop {
            let Some(tok) = toks.peek() else {
                return match stop {
                    Stop::TopLevel => Ok(Term::Eof),
                    _ => Err(self.err_eof(toks, "unterminated block")),
                };
            };
            let tok = tok.clone();

            match &tok.kind {
                TokenKind::Semi => {
                    toks.next();
                }
                TokenKind::RBrace if stop == Stop::Brace => {
                    toks.next();
                    return Ok(Term::RBrace);
                }
                TokenKind::Ident(name) if name == "end" && stop == Stop::Keyword => {
                    toks.next();
                    self.expect_semi(toks)?;
                    return Ok(Term::End);
                }
                TokenKind::Ident(name) if name == "else" && stop == Stop::Keyword => {
                    toks.next();
                    self.expect_semi(toks)?;
                    return Ok(Term::Else);
                }
                TokenKind::Ident(name) if name == "end" || name == "else" => {
                    return Err(self.err(&tok, CompileErrorKind::Syntax, "no open block here"));
                }
                TokenKind::Ident(name) => match name.as_str() {
                    "var" => self.var_stmt(toks)?,
                    "const" => self.const_stmt(toks)?,
                    "if" => self.if_stmt(toks)?,
                    "loop" => self.loop_stmt(toks)?,
                    "break" => self.break_stmt(toks)?,
                    "continue" => self.continue_stmt(toks)?,
                    "return" => self.return_stmt(toks)?,
                    _ => self.op_stmt(toks)?,
                },
                TokenKind::Int(_) | TokenKind::Str(_) => {
                    return Err(self.err(
                        &tok,
                        CompileErrorKind::InvalidLValue,
                        "a statement begins with a register or an operation",
                    ));
                }
                TokenKind::LBrace | TokenKind::RBrace | TokenKind::Assign => {
                    return Err(self.err(&tok, CompileErrorKind::Syntax, "unexpected token"));
                }
            }
        }
    }

    /// Collect argument tokens until one of the stop kinds, consuming the
    /// stop token. Returns the collected tokens and the stop that fired.
    fn collect_args(
        &self,
        toks: &mut Tokens,
        brace_stops: bool,
    ) -> Result<(Vec<Token>, TokenKind), CompileError> {
        let mut args = Vec::new();

        loop {
            let Some(tok) = toks.next().cloned() else {
                return Err(self.err_eof(toks, "expected `;`"));
            };

            match tok.kind {
                TokenKind::Semi => return Ok((args, TokenKind::Semi)),
                TokenKind::LBrace if brace_stops => return Ok((args, TokenKind::LBrace)),
                TokenKind::Ident(_) | TokenKind::Int(_) | TokenKind::Str(_) => args.push(tok),
                _ => {
                    return Err(self.err(&tok, CompileErrorKind::Syntax, "unexpected token"));
                }
            }
        }
    }

    fn expect_semi(&self, toks: &mut Tokens) -> Result<(), CompileError> {
        match toks.next().cloned() {
            Some(tok) if tok.kind == TokenKind::Semi => Ok(()),
            Some(tok) => Err(self.err(&tok, CompileErrorKind::Syntax, "expected `;`")),
            None => Err(self.err_eof(toks, "expected `;`")),
        }
    }

    fn expect_ident(&self, toks: &mut Tokens, what: &str) -> Result<Token, CompileError> {
        match toks.next().cloned() {
            Some(tok) if matches!(tok.kind, TokenKind::Ident(_)) => Ok(tok),
            Some(tok) => Err(self.err(&tok, CompileErrorKind::Syntax, what)),
            None => Err(self.err_eof(toks, what)),
        }
    }

    fn check_not_reserved(&self, tok: &Token, name: &str) -> Result<(), CompileError> {
        if RESERVED.contains(&name) {
            return Err(self.err(tok, CompileErrorKind::Syntax, "reserved word"));
        }

        Ok(())
    }

    /* STATEMENTS */

    fn var_stmt(&mut self, toks: &mut Tokens) -> Result<(), CompileError> {
        toks.next();

        let mut ptr = false;
        let mut editable = false;

        let mut type_tok = self.expect_ident(toks, "expected a type name")?;
        while let Some(name) = type_tok.ident() {
            match name {
                "ptr" if !ptr => ptr = true,
                "ptre" if !ptr => {
                    ptr = true;
                    editable = true;
                }
                _ => break,
            }
            type_tok = self.expect_ident(toks, "expected a type name")?;
        }

        let type_name = type_tok.ident().unwrap_or_default().to_string();
        let base = self
            .parser
            .symbols()
            .type_by_name(&type_name)
            .ok_or_else(|| {
                self.err(&type_tok, CompileErrorKind::UnknownIdentifier, "unknown type")
            })?;

        let mut flags = crate::types::ArgFlags::REGISTER;
        if ptr {
            flags |= crate::types::ArgFlags::PTR;
        }
        if editable {
            flags |= crate::types::ArgFlags::PTR_EDITABLE;
        }
        let kind = ArgKind::new(base).decorate(flags);

        let size = if ptr {
            crate::consts::WORD_SIZE
        } else {
            self.parser.global().types().size(base)
        };
        if size == 0 {
            return Err(self.err(
                &type_tok,
                CompileErrorKind::TypeMismatch,
                "type has no in-register representation",
            ));
        }

        let name_tok = self.expect_ident(toks, "expected a register name")?;
        let name = name_tok.ident().unwrap_or_default().to_string();
        self.check_not_reserved(&name_tok, &name)?;

        let offset = self.alloc_local(size, &name_tok)?;
        let decl = RegisterDecl {
            name: name.clone(),
            kind,
            offset,
            size: size as u16,
        };
        self.declare_local(&name_tok, &name, Binding::Reg(decl.clone()))?;

        match toks.peek().map(|t| t.kind.clone()) {
            Some(TokenKind::Assign) => {
                toks.next();
                let Some(value_tok) = toks.next().cloned() else {
                    return Err(self.err_eof(toks, "expected a value"));
                };
                let src = self.operand(&value_tok)?;
                self.emit_assign(&decl, &src, &value_tok)?;
                self.expect_semi(toks)
            }
            _ => self.expect_semi(toks),
        }
    }

    fn const_stmt(&mut self, toks: &mut Tokens) -> Result<(), CompileError> {
        toks.next();

        let name_tok = self.expect_ident(toks, "expected a constant name")?;
        let name = name_tok.ident().unwrap_or_default().to_string();
        self.check_not_reserved(&name_tok, &name)?;

        let (args, _) = self.collect_args(toks, false)?;
        if args.is_empty() {
            return Err(self.err(&name_tok, CompileErrorKind::Syntax, "expected a value"));
        }

        let value = if args.len() == 1 {
            match self.operand(&args[0])? {
                Operand::Const { value, .. } => value,
                _ => {
                    return Err(self.err(
                        &args[0],
                        CompileErrorKind::TypeMismatch,
                        "constant expression required",
                    ))
                }
            }
        } else {
            self.fold_call(&args)?
        };

        self.declare_const(&name_tok, &name, value)
    }

    /// Evaluate a fold-enabled operation over constant arguments.
    fn fold_call(&mut self, args: &[Token]) -> Result<i64, CompileError> {
        let op_tok = &args[0];
        let op_name = op_tok
            .ident()
            .ok_or_else(|| self.err(op_tok, CompileErrorKind::Syntax, "expected an operation"))?;

        let desc = self.parser.catalog().proc(op_name).ok_or_else(|| {
            self.err(op_tok, CompileErrorKind::UnknownIdentifier, "unknown operation")
        })?;

        let fold = desc.fold().ok_or_else(|| {
            self.err(
                op_tok,
                CompileErrorKind::NoMatchingOverload,
                "operation cannot be evaluated at compile time",
            )
        })?;

        let mut values = Vec::with_capacity(args.len() - 1);
        for tok in &args[1..] {
            match self.operand(tok)? {
                Operand::Const { value, .. } => values.push(value),
                _ => {
                    return Err(self.err(
                        tok,
                        CompileErrorKind::TypeMismatch,
                        "constant expression required",
                    ))
                }
            }
        }

        fold(&values).ok_or_else(|| {
            self.err(
                op_tok,
                CompileErrorKind::Syntax,
                "constant folding failed for these operands",
            )
        })
    }

    fn if_stmt(&mut self, toks: &mut Tokens) -> Result<(), CompileError> {
        let if_tok = toks.next().cloned();

        let (cond, reached) = self.collect_args(toks, true)?;
        let Some(first) = cond.first().cloned() else {
            let tok = if_tok.unwrap_or_else(|| Token {
                kind: TokenKind::Semi,
                line: 0,
                column: 0,
            });
            return Err(self.err(&tok, CompileErrorKind::Syntax, "expected a condition"));
        };

        let true_lbl = self.new_label();
        let false_lbl = self.new_label();
        let end_lbl = self.new_label();

        self.op_call(
            &first,
            &cond[1..],
            &[Operand::Label { id: true_lbl }, Operand::Label { id: false_lbl }],
        )?;
        self.place_label(true_lbl);

        let stop = if reached == TokenKind::LBrace {
            Stop::Brace
        } else {
            Stop::Keyword
        };

        self.push_scope();
        let term = self.block(toks, stop)?;
        self.pop_scope();

        match term {
            Term::Else => {
                self.emit_goto(end_lbl);
                self.place_label(false_lbl);

                self.push_scope();
                let term = self.block(toks, Stop::Keyword)?;
                self.pop_scope();

                if term != Term::End {
                    return Err(self.err_eof(toks, "else block must close with `end;`"));
                }
                self.place_label(end_lbl);
            }
            Term::End => {
                self.place_label(false_lbl);
                self.place_label(end_lbl);
            }
            Term::RBrace => {
                if toks.peek().and_then(|t| t.ident()) == Some("else") {
                    toks.next();
                    match toks.next().cloned() {
                        Some(tok) if tok.kind == TokenKind::LBrace => (),
                        Some(tok) => {
                            return Err(self.err(&tok, CompileErrorKind::Syntax, "expected `{`"));
                        }
                        None => return Err(self.err_eof(toks, "expected `{`")),
                    }

                    self.emit_goto(end_lbl);
                    self.place_label(false_lbl);

                    self.push_scope();
                    let term = self.block(toks, Stop::Brace)?;
                    self.pop_scope();
                    debug_assert_eq!(term, Term::RBrace);

                    self.place_label(end_lbl);
                } else {
                    self.place_label(false_lbl);
                    self.place_label(end_lbl);
                }
            }
            Term::Eof => unreachable!("top-level stop inside a block"),
        }

        Ok(())
    }

    fn loop_stmt(&mut self, toks: &mut Tokens) -> Result<(), CompileError> {
        toks.next();

        let stop = match toks.next().cloned() {
            Some(tok) if tok.kind == TokenKind::Semi => Stop::Keyword,
            Some(tok) if tok.kind == TokenKind::LBrace => Stop::Brace,
            Some(tok) => {
                return Err(self.err(&tok, CompileErrorKind::Syntax, "expected `;` or `{`"));
            }
            None => return Err(self.err_eof(toks, "expected `;` or `{`")),
        };

        let start_lbl = self.new_label();
        let end_lbl = self.new_label();
        self.place_label(start_lbl);

        self.loops.push((start_lbl, end_lbl));
        self.push_scope();
        let term = self.block(toks, stop)?;
        self.pop_scope();
        self.loops.pop();

        if term == Term::Else {
            return Err(self.err_eof(toks, "`else` outside of `if`"));
        }

        self.emit_goto(start_lbl);
        self.place_label(end_lbl);

        Ok(())
    }

    fn break_stmt(&mut self, toks: &mut Tokens) -> Result<(), CompileError> {
        let tok = toks.next().cloned();
        self.expect_semi(toks)?;

        let Some(&(_, end_lbl)) = self.loops.last() else {
            let tok = tok.unwrap_or_else(|| Token {
                kind: TokenKind::Semi,
                line: 0,
                column: 0,
            });
            return Err(self.err(&tok, CompileErrorKind::Syntax, "`break` outside of a loop"));
        };

        self.emit_goto(end_lbl);

        Ok(())
    }

    fn continue_stmt(&mut self, toks: &mut Tokens) -> Result<(), CompileError> {
        let tok = toks.next().cloned();
        self.expect_semi(toks)?;

        let Some(&(start_lbl, _)) = self.loops.last() else {
            let tok = tok.unwrap_or_else(|| Token {
                kind: TokenKind::Semi,
                line: 0,
                column: 0,
            });
            return Err(self.err(&tok, CompileErrorKind::Syntax, "`continue` outside of a loop"));
        };

        self.emit_goto(start_lbl);

        Ok(())
    }

    fn return_stmt(&mut self, toks: &mut Tokens) -> Result<(), CompileError> {
        let ret_tok = toks.next().cloned();
        let (args, _) = self.collect_args(toks, false)?;

        if !args.is_empty() {
            let outputs = self.parser.symbols().outputs().to_vec();

            if args.len() != outputs.len() {
                let tok = ret_tok.unwrap_or_else(|| args[0].clone());
                return Err(self.err(
                    &tok,
                    CompileErrorKind::TypeMismatch,
                    "return value count doesn't match the declared outputs",
                ));
            }

            for (decl, tok) in outputs.iter().zip(&args) {
                let src = self.operand(tok)?;
                self.emit_assign(decl, &src, tok)?;
            }
        }

        self.emit_opcode(self.parser.ctl().exit);

        Ok(())
    }

    fn op_stmt(&mut self, toks: &mut Tokens) -> Result<(), CompileError> {
        let Some(first) = toks.next().cloned() else {
            return Err(self.err_eof(toks, "expected a statement"));
        };
        let (args, _) = self.collect_args(toks, false)?;

        self.op_call(&first, &args, &[])
    }

    /* OPERATION CALLS */

    /// Resolve and emit one operation call. `extra` carries the
    /// compiler-introduced label arguments of conditions.
    pub(crate) fn op_call(
        &mut self,
        first: &Token,
        args: &[Token],
        extra: &[Operand],
    ) -> Result<(), CompileError> {
        let name = first
            .ident()
            .ok_or_else(|| {
                self.err(
                    first,
                    CompileErrorKind::InvalidLValue,
                    "a statement begins with a register or an operation",
                )
            })?
            .to_string();

        let mut operands: Vec<Operand> = Vec::with_capacity(args.len() + extra.len() + 1);
        let mut keys: Vec<String> = Vec::new();
        let mut arg_toks = args;
        let op_tok: Token;

        if self.parser.catalog().contains(&name) && self.lookup_symbol(&name).is_none() {
            // Plain operation-first form: `foo x y;`
            keys.push(name.clone());
            op_tok = first.clone();
        } else if let Some(leading) = self.lookup_symbol(&name) {
            // Destination-first form: `out add a b;`
            let type_name = self
                .parser
                .global()
                .types()
                .name(leading.kind().base)
                .to_string();
            operands.push(leading);

            let op = self.expect_first_arg_ident(first, args)?;
            op_tok = op.clone();
            let op_name = op.ident().unwrap_or_default();

            keys.push(format!("{type_name}.{op_name}"));
            keys.push(op_name.to_string());
            arg_toks = &args[1..];
        } else if let Some((head, suffix)) = name.split_once('.') {
            // Method form: the prefix is the leading argument, the suffix
            // qualifies the operation lookup by the prefix's type.
            let leading = self.lookup_symbol(head).ok_or_else(|| {
                self.err(first, CompileErrorKind::UnknownIdentifier, "unknown identifier")
            })?;
            let type_name = self
                .parser
                .global()
                .types()
                .name(leading.kind().base)
                .to_string();
            operands.push(leading);

            let glued = args.first().and_then(|t| t.ident()).and_then(|next| {
                let key = format!("{type_name}.{suffix}.{next}");
                self.parser.catalog().contains(&key).then_some(key)
            });

            match glued {
                Some(key) => {
                    keys.push(key);
                    op_tok = args[0].clone();
                    arg_toks = &args[1..];
                }
                None => {
                    let key = format!("{type_name}.{suffix}");
                    if !self.parser.catalog().contains(&key) {
                        return Err(self.err(
                            first,
                            CompileErrorKind::UnknownIdentifier,
                            "no such operation on this type",
                        ));
                    }
                    keys.push(key);
                    op_tok = first.clone();
                }
            }
        } else {
            return Err(self.err(
                first,
                CompileErrorKind::UnknownIdentifier,
                "unknown identifier",
            ));
        }

        for tok in arg_toks {
            let operand = self.operand(tok)?;
            operands.push(operand);
        }
        operands.extend_from_slice(extra);

        let kinds: Vec<ArgKind> = operands.iter().map(Operand::kind).collect();

        let candidates: Vec<&ProcDesc> = keys
            .iter()
            .filter_map(|key| self.parser.catalog().proc(key))
            .collect();

        if candidates.is_empty() {
            return Err(self.err(
                &op_tok,
                CompileErrorKind::UnknownIdentifier,
                "unknown operation",
            ));
        }

        let overload: &Overload = match resolve(&candidates, &kinds) {
            Ok(overload) => overload,
            Err(ResolveFailure::Ambiguous) => {
                return Err(self.err(
                    &op_tok,
                    CompileErrorKind::AmbiguousOverload,
                    "multiple overloads score identically",
                ));
            }
            Err(ResolveFailure::NoMatch) => {
                // When the destination can never be written, report the
                // lvalue rather than a generic resolution failure.
                let dest_is_value = matches!(
                    operands.first(),
                    Some(Operand::Const { .. } | Operand::Text { .. })
                );
                let all_want_register = candidates.iter().all(|desc| {
                    desc.overloads()
                        .iter()
                        .all(|ov| ov.args.first().is_some_and(ArgKind::is_register))
                });

                let (kind, message) = if dest_is_value && all_want_register {
                    (
                        CompileErrorKind::InvalidLValue,
                        "destination is not a writable register",
                    )
                } else {
                    (
                        CompileErrorKind::NoMatchingOverload,
                        "no overload accepts these arguments",
                    )
                };

                return Err(self.err(&op_tok, kind, message));
            }
        };

        if let Some(hook) = overload.parse.as_ref() {
            if hook(self, overload, &operands, &op_tok)? {
                return Ok(());
            }
        }

        self.emit_default(overload, &operands, &op_tok)
    }

    fn expect_first_arg_ident<'t>(
        &self,
        first: &Token,
        args: &'t [Token],
    ) -> Result<&'t Token, CompileError> {
        match args.first() {
            Some(tok) if matches!(tok.kind, TokenKind::Ident(_)) => Ok(tok),
            Some(tok) => Err(self.err(tok, CompileErrorKind::Syntax, "expected an operation name")),
            None => Err(self.err(
                first,
                CompileErrorKind::Syntax,
                "expected an operation name",
            )),
        }
    }

    /* OPERAND RESOLUTION */

    /// Resolve a single token to an operand.
    pub(crate) fn operand(&self, tok: &Token) -> Result<Operand, CompileError> {
        match &tok.kind {
            TokenKind::Int(value) => Ok(Operand::Const {
                value: *value,
                kind: ArgKind::INT,
            }),
            TokenKind::Str(value) => Ok(Operand::Text {
                value: value.clone(),
            }),
            TokenKind::Ident(name) if name == "null" => Ok(Operand::Const {
                value: 0,
                kind: ArgKind::new(TYPE_NULL),
            }),
            TokenKind::Ident(name) => self.lookup_symbol(name).ok_or_else(|| {
                self.err(tok, CompileErrorKind::UnknownIdentifier, "unknown identifier")
            }),
            _ => Err(self.err(tok, CompileErrorKind::Syntax, "expected a value")),
        }
    }

    /// Resolve a name: writer locals innermost-first, then the parser's
    /// registers and constants, then global shared constants.
    pub(crate) fn lookup_symbol(&self, name: &str) -> Option<Operand> {
        for scope in self.scopes.iter().rev() {
            if let Some(binding) = scope.names.get(name) {
                return Some(match binding {
                    Binding::Reg(decl) => Operand::Reg {
                        offset: decl.offset,
                        kind: decl.kind,
                        size: decl.size,
                    },
                    Binding::Const(value) => Operand::Const {
                        value: *value,
                        kind: ArgKind::INT,
                    },
                    Binding::Operand(operand) => operand.clone(),
                });
            }
        }

        if let Some(decl) = self.parser.symbols().find_register(name) {
            return Some(Operand::Reg {
                offset: decl.offset,
                kind: decl.kind,
                size: decl.size,
            });
        }

        if let Some(value) = self.parser.symbols().const_value(name) {
            return Some(Operand::Const {
                value,
                kind: ArgKind::INT,
            });
        }

        self.parser
            .global()
            .const_value(name)
            .map(|value| Operand::Const {
                value,
                kind: ArgKind::INT,
            })
    }
}
