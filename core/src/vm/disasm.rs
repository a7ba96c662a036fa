use std::fmt::{self, Write as _};

use super::analysis::next_instruction;
use super::bytecode::ByteCode;
use super::error::InstructionError;
use crate::op::Opcode;

const MARKER: &str = " ===> ";

/// One decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub offset: usize,
    pub opcode: Opcode,
    pub arg: Option<u64>,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.opcode.mnemonic())?;
        if let Some(arg) = self.arg {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Iterator over the instructions of a stream. After yielding an error it is
/// exhausted.
#[derive(Debug, Clone)]
pub struct Disassemble<'a> {
    code: &'a [u8],
    pos: usize,
}

impl Iterator for Disassemble<'_> {
    type Item = Result<Instruction, InstructionError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.code.len() {
            return None;
        }
        let offset = self.pos;
        match next_instruction(self.code, offset) {
            Ok((opcode, arg, next)) => {
                self.pos = next;
                Some(Ok(Instruction { offset, opcode, arg }))
            }
            Err(err) => {
                self.pos = self.code.len();
                Some(Err(err))
            }
        }
    }
}

pub fn disassemble(code: &[u8]) -> Disassemble<'_> {
    Disassemble { code, pos: 0 }
}

/// Render `code` one instruction per line. The instruction at `marker`, if
/// any, gets an arrow in place of its offset.
pub fn dump(code: &[u8], marker: Option<usize>) -> String {
    let mut out = String::new();
    for (i, item) in disassemble(code).enumerate() {
        if i > 0 {
            out.push('\n');
        }
        match item {
            Ok(ins) => {
                if marker == Some(ins.offset) {
                    out.push_str(MARKER);
                } else {
                    let _ = write!(out, "{:>4}  ", ins.offset);
                }
                let _ = write!(out, "{ins}");
            }
            Err(err) => {
                let _ = write!(out, "<malformed: {err}>");
            }
        }
    }
    out
}

impl ByteCode {
    pub fn dump(&self) -> String {
        dump(self.code(), None)
    }

    pub fn dump_with_marker(&self, offset: usize) -> String {
        dump(self.code(), Some(offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::val::Val;
    use crate::vm::{ByteCodeParts, CodeWriter};

    fn add_block() -> ByteCode {
        let mut w = CodeWriter::new();
        w.emit_arg(Opcode::LoadConst, 0).unwrap();
        w.emit_arg(Opcode::LoadConst, 1).unwrap();
        w.emit(Opcode::BinaryAdd).emit(Opcode::Return);
        ByteCode::new(ByteCodeParts {
            code: w.finish(),
            consts: vec![Val::Int(2), Val::Int(3)],
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn one_line_per_instruction() {
        let text = add_block().dump();
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            ["   0  LOAD_CONST 0", "   2  LOAD_CONST 1", "   4  BINARY_ADD", "   5  RETURN"]
        );
    }

    #[test]
    fn marker_replaces_offset() {
        let text = add_block().dump_with_marker(4);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[2], " ===> BINARY_ADD");
        assert_eq!(lines[3], "   5  RETURN");
    }

    #[test]
    fn wide_operands_and_offsets() {
        let mut w = CodeWriter::new();
        for _ in 0..1000 {
            w.emit(Opcode::Nop);
        }
        w.emit_arg(Opcode::JumpBackward, 0x181).unwrap();
        let text = dump(&w.finish(), None);
        assert_eq!(text.lines().last(), Some("1000  JUMP_BACKWARD 385"));
    }

    #[test]
    fn structured_instructions() {
        let ins: Vec<_> = disassemble(add_block().code()).collect::<Result<_, _>>().unwrap();
        assert_eq!(ins.len(), 4);
        assert_eq!(
            ins[1],
            Instruction {
                offset: 2,
                opcode: Opcode::LoadConst,
                arg: Some(1),
            }
        );
        assert_eq!(ins[3].arg, None);
    }

    #[test]
    fn malformed_tail_is_rendered() {
        let code = [Opcode::Nop as u8, Opcode::LoadConst as u8, 0x80];
        let text = dump(&code, None);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "   0  NOP");
        assert!(lines[1].starts_with("<malformed: "), "{}", lines[1]);
        assert_eq!(disassemble(&code).filter(Result::is_err).count(), 1);
    }

    #[test]
    fn empty_stream_dumps_nothing() {
        assert_eq!(dump(&[], None), "");
    }
}
