//! Bytecode emission, label fixups, scopes and the local register allocator

use std::collections::HashMap;

use super::{lex, Operand, ParserWriter, Stop, Term, Token, Tokens};
use crate::catalog::Overload;
use crate::consts::*;
use crate::error::{CompileError, CompileErrorKind};
use crate::symbols::RegisterDecl;

/// A name binding inside one writer scope.
#[derive(Debug, Clone)]
pub(crate) enum Binding {
    /// A block-local register.
    Reg(RegisterDecl),
    /// A block-local constant.
    Const(i64),
    /// An alias to a caller operand, used for inlined function parameters.
    Operand(Operand),
}

/// One block scope: its bindings and the allocator watermark to restore
/// when the block closes.
#[derive(Debug, Default)]
pub(crate) struct Scope {
    pub(crate) names: HashMap<String, Binding>,
    pub(crate) reg_mark: u16,
}

/// A forward label reference awaiting its target.
#[derive(Debug)]
pub(crate) struct Fixup {
    pub(crate) pos: usize,
    pub(crate) label: u32,
    pub(crate) line: u32,
    pub(crate) column: u32,
}

impl ParserWriter<'_> {
    /* ERRORS */

    /// Build a compile error at a token's position.
    pub fn err(&self, tok: &Token, kind: CompileErrorKind, message: &str) -> CompileError {
        CompileError {
            kind,
            line: tok.line,
            column: tok.column,
            token: tok.text(),
            message: message.to_string(),
            parent: self.parent.clone(),
        }
    }

    pub(crate) fn err_eof(&self, toks: &Tokens, message: &str) -> CompileError {
        let (line, column, token) = toks
            .last()
            .map(|t| (t.line, t.column, t.text()))
            .unwrap_or((1, 1, String::new()));

        CompileError {
            kind: CompileErrorKind::Syntax,
            line,
            column,
            token,
            message: message.to_string(),
            parent: self.parent.clone(),
        }
    }

    /* SCOPES */

    pub(crate) fn push_scope(&mut self) {
        self.scopes.push(Scope {
            names: HashMap::new(),
            reg_mark: self.reg_top,
        });
    }

    /// Close the innermost scope, reclaiming its local registers.
    pub(crate) fn pop_scope(&mut self) {
        if let Some(scope) = self.scopes.pop() {
            self.reg_top = scope.reg_mark;
        }
    }

    pub(crate) fn declare_local(
        &mut self,
        tok: &Token,
        name: &str,
        binding: Binding,
    ) -> Result<(), CompileError> {
        let duplicate = self
            .scopes
            .last()
            .is_some_and(|scope| scope.names.contains_key(name));

        if duplicate {
            let kind = match binding {
                Binding::Reg(_) => CompileErrorKind::DuplicateLocal,
                _ => CompileErrorKind::DuplicateDeclaration,
            };
            return Err(self.err(tok, kind, "name already declared in this block"));
        }

        self.scopes
            .last_mut()
            .expect("a scope is always open")
            .names
            .insert(name.to_string(), binding);

        Ok(())
    }

    pub(crate) fn declare_const(
        &mut self,
        tok: &Token,
        name: &str,
        value: i64,
    ) -> Result<(), CompileError> {
        self.declare_local(tok, name, Binding::Const(value))
    }

    /// Bump-allocate a block-local register.
    pub(crate) fn alloc_local(&mut self, size: usize, tok: &Token) -> Result<u16, CompileError> {
        let offset = self.reg_top;
        let top = offset as usize + size;

        if top > VM_REGISTER_FILE_SIZE {
            return Err(self.err(
                tok,
                CompileErrorKind::RegisterFileOverflow,
                "local registers exceed the register file",
            ));
        }

        self.reg_top = top as u16;

        Ok(offset)
    }

    /* LABELS */

    /// Create an unplaced label.
    pub fn new_label(&mut self) -> u32 {
        self.labels.push(None);

        self.labels.len() as u32 - 1
    }

    /// Place a label at the current bytecode position.
    pub fn place_label(&mut self, label: u32) {
        self.labels[label as usize] = Some(self.code.len() as u32);
    }

    /* EMISSION */

    /// Append an opcode handle.
    pub fn emit_opcode(&mut self, opcode: u16) {
        self.code.extend_from_slice(&opcode.to_le_bytes());
    }

    /// Append a register-offset immediate.
    pub fn emit_reg(&mut self, offset: u16) {
        self.code.extend_from_slice(&offset.to_le_bytes());
    }

    /// Append an inline constant immediate.
    pub fn emit_word(&mut self, value: i64) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a label-target immediate. Backward references resolve
    /// immediately; forward references are recorded for the fixup pass.
    pub fn emit_label_ref(&mut self, label: u32) {
        self.emit_label_at(label, 0, 0);
    }

    fn emit_label_at(&mut self, label: u32, line: u32, column: u32) {
        match self.labels[label as usize] {
            Some(target) => self.code.extend_from_slice(&target.to_le_bytes()),
            None => {
                self.fixups.push(Fixup {
                    pos: self.code.len(),
                    label,
                    line,
                    column,
                });
                self.code.extend_from_slice(&0u32.to_le_bytes());
            }
        }
    }

    /// Emit an unconditional jump to `label`.
    pub fn emit_goto(&mut self, label: u32) {
        self.emit_opcode(self.parser.ctl().jump);
        self.emit_label_ref(label);
    }

    /// Default emitter: opcode plus positional immediates in declared
    /// order. Registers emit by offset, constants by inline value, labels
    /// by fixup slot.
    pub fn emit_default(
        &mut self,
        overload: &Overload,
        operands: &[Operand],
        at: &Token,
    ) -> Result<(), CompileError> {
        self.emit_opcode(overload.opcode);

        for operand in operands {
            match operand {
                Operand::Reg { offset, .. } => self.emit_reg(*offset),
                Operand::Const { value, .. } => self.emit_word(*value),
                Operand::Label { id } => self.emit_label_at(*id, at.line, at.column),
                Operand::Text { .. } => {
                    return Err(self.err(
                        at,
                        CompileErrorKind::TypeMismatch,
                        "string arguments require an operation with a custom hook",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Emit a typed copy into a declared register: register sources become
    /// in-file copies, constants become truncated immediate stores.
    pub(crate) fn emit_assign(
        &mut self,
        dst: &RegisterDecl,
        src: &Operand,
        at: &Token,
    ) -> Result<(), CompileError> {
        let src_kind = src.kind();

        if src_kind.base != dst.kind.base || src_kind.is_ptr() != dst.kind.is_ptr() {
            return Err(self.err(
                at,
                CompileErrorKind::TypeMismatch,
                "value kind doesn't match the destination register",
            ));
        }

        match src {
            Operand::Reg { offset, .. } => {
                self.emit_opcode(self.parser.ctl().copy);
                self.emit_reg(dst.offset);
                self.emit_reg(*offset);
                self.emit_reg(dst.size);
            }
            Operand::Const { value, .. } => {
                self.emit_opcode(self.parser.ctl().store);
                self.emit_reg(dst.offset);
                self.emit_word(*value);
                self.emit_reg(dst.size);
            }
            _ => {
                return Err(self.err(
                    at,
                    CompileErrorKind::TypeMismatch,
                    "value kind doesn't match the destination register",
                ));
            }
        }

        Ok(())
    }

    /// Patch all recorded forward references.
    pub(crate) fn patch_fixups(&mut self) -> Result<(), CompileError> {
        for fixup in &self.fixups {
            let Some(target) = self.labels[fixup.label as usize] else {
                return Err(CompileError {
                    kind: CompileErrorKind::UnresolvedLabel,
                    line: fixup.line,
                    column: fixup.column,
                    token: String::new(),
                    message: "jump target never placed".to_string(),
                    parent: self.parent.clone(),
                });
            };

            self.code[fixup.pos..fixup.pos + LABEL_IMM_SIZE]
                .copy_from_slice(&target.to_le_bytes());
        }

        self.fixups.clear();

        Ok(())
    }

    /* INLINING */

    /// Expand a registered function body at the call site: parameters bind
    /// as aliases of the caller's operands in a fresh scope, and the body's
    /// statements compile into the current bytecode stream.
    pub fn compile_inline(
        &mut self,
        at: &Token,
        params: &[String],
        operands: &[Operand],
        body: &str,
    ) -> Result<(), CompileError> {
        if self.inline_depth == MAX_INLINE_DEPTH {
            return Err(self.err(
                at,
                CompileErrorKind::Syntax,
                "inlined function nesting too deep",
            ));
        }
        debug_assert_eq!(params.len(), operands.len());

        let toks = lex(body, &self.parent)?;
        let mut toks = Tokens::new(toks);

        self.inline_depth += 1;
        self.push_scope();

        let mut bind = || -> Result<(), CompileError> {
            for (param, operand) in params.iter().zip(operands) {
                self.declare_local(at, param, Binding::Operand(operand.clone()))?;
            }
            self.block(&mut toks, Stop::TopLevel).map(|term| {
                debug_assert_eq!(term, Term::Eof);
            })
        };
        let result = bind();

        self.pop_scope();
        self.inline_depth -= 1;

        result
    }
}
