//! Bytecode execution loop

use super::{Flow, Worker};
use crate::catalog::Catalog;
use crate::consts::*;
use crate::container::Container;
use crate::error::RuntimeError;

/// Read cursor over a container's bytecode.
///
/// Handlers decode their own immediates through this cursor and advance it;
/// the dispatch loop only reads opcode handles. Jumps are plain program
/// counter assignment.
pub struct Cursor<'c> {
    code: &'c [u8],
    pc: usize,
}

impl<'c> Cursor<'c> {
    pub(crate) const fn new(code: &'c [u8]) -> Self {
        Self { code, pc: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], RuntimeError> {
        let end = self.pc + N;
        let bytes = self
            .code
            .get(self.pc..end)
            .ok_or(RuntimeError::TruncatedCode(self.pc))?;

        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.pc = end;

        Ok(out)
    }

    pub(crate) fn read_opcode(&mut self) -> Result<u16, RuntimeError> {
        debug_assert_eq!(OPCODE_SIZE, 2);

        self.take::<2>().map(u16::from_le_bytes)
    }

    /// Read a register-offset immediate.
    pub fn read_reg(&mut self) -> Result<u16, RuntimeError> {
        debug_assert_eq!(REG_IMM_SIZE, 2);

        self.take::<2>().map(u16::from_le_bytes)
    }

    /// Read an inline constant immediate.
    pub fn read_word(&mut self) -> Result<i64, RuntimeError> {
        debug_assert_eq!(CONST_IMM_SIZE, 8);

        self.take::<8>().map(i64::from_le_bytes)
    }

    /// Read a label-target immediate.
    pub fn read_target(&mut self) -> Result<u32, RuntimeError> {
        debug_assert_eq!(LABEL_IMM_SIZE, 4);

        self.take::<4>().map(u32::from_le_bytes)
    }

    /// Transfer control to a label target.
    pub fn jump(&mut self, target: u32) -> Result<(), RuntimeError> {
        let target = target as usize;

        if target > self.code.len() {
            return Err(RuntimeError::TruncatedCode(target));
        }

        self.pc = target;

        Ok(())
    }

    /// Whether the cursor reached the end of the bytecode.
    pub const fn at_end(&self) -> bool {
        self.pc >= self.code.len()
    }
}

impl<'h> Worker<'h> {
    /// Run a container's bytecode to completion against this worker.
    ///
    /// `budget` is shared across chained runs of one execute call; it is
    /// decremented per instruction and exhaustion halts the script.
    pub(crate) fn execute_container(
        &mut self,
        catalog: &Catalog,
        container: &Container,
        budget: &mut usize,
    ) -> Result<(), RuntimeError> {
        if container.is_empty() {
            return Ok(());
        }

        let mut cursor = Cursor::new(container.code());

        while !cursor.at_end() {
            if *budget == 0 {
                return Err(RuntimeError::InstructionBudgetExceeded(self.budget));
            }
            *budget -= 1;

            let opcode = cursor.read_opcode()?;
            let handler = catalog
                .handler(opcode)
                .ok_or(RuntimeError::InvalidOpcode(opcode))?;

            match handler(self, &mut cursor)? {
                Flow::Continue => (),
                Flow::End => break,
            }
        }

        Ok(())
    }
}
