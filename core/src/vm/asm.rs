use super::arg::encode_arg;
use super::error::InstructionError;
use crate::op::Opcode;

/// Append-only instruction stream builder used by code generators.
#[derive(Debug, Default, Clone)]
pub struct CodeWriter {
    code: Vec<u8>,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current length of the stream, i.e. the offset of the next instruction.
    #[inline]
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    /// Emit an opcode that takes no operand.
    pub fn emit(&mut self, op: Opcode) -> &mut Self {
        debug_assert!(!op.has_arg(), "{op} requires an operand");
        self.code.push(op as u8);
        self
    }

    /// Emit an opcode followed by its encoded operand.
    pub fn emit_arg(&mut self, op: Opcode, arg: u64) -> Result<&mut Self, InstructionError> {
        debug_assert!(op.has_arg(), "{op} takes no operand");
        let start = self.code.len();
        self.code.push(op as u8);
        if let Err(err) = encode_arg(arg, &mut self.code) {
            self.code.truncate(start);
            return Err(err);
        }
        Ok(self)
    }

    pub fn finish(self) -> Vec<u8> {
        self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_opcode_and_operand_bytes() {
        let mut w = CodeWriter::new();
        w.emit_arg(Opcode::LoadConst, 0).unwrap();
        w.emit_arg(Opcode::LoadConst, 0x181).unwrap();
        w.emit(Opcode::Return);
        assert_eq!(w.offset(), 6);
        assert_eq!(w.finish(), vec![0x40, 0x00, 0x40, 0x81, 0x02, 0x04]);
    }

    #[test]
    fn failed_operand_leaves_stream_untouched() {
        let mut w = CodeWriter::new();
        w.emit(Opcode::Nop);
        assert!(w.emit_arg(Opcode::LoadConst, u64::MAX).is_err());
        assert_eq!(w.finish(), vec![0x00]);
    }
}
