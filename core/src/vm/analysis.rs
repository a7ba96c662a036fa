//! Static operand-stack verification.
//!
//! A single linear walk over the instruction stream. Jumps are not followed:
//! the code generator keeps the stack height identical on every path into a
//! jump target and marks the places where it relies on this with
//! `CHECKSTACK`, so a straight scan is enough to bound the height.

use tracing::trace;

use super::arg::decode_arg;
use super::error::{BuildError, InstructionError, StackError};
use crate::op::Opcode;

/// Decode the opcode at `pos` and its operand, if any. Returns the opcode,
/// the operand (0 when absent) and the offset of the next instruction.
#[inline]
pub(crate) fn next_instruction(code: &[u8], pos: usize) -> Result<(Opcode, Option<u64>, usize), InstructionError> {
    let byte = code[pos];
    let op = Opcode::from_byte(byte).ok_or(InstructionError::UnknownOpcode {
        offset: pos,
        opcode: byte,
    })?;
    if op.has_arg() {
        let (next, arg) = decode_arg(code, pos + 1)?;
        Ok((op, Some(arg), next))
    } else {
        Ok((op, None, pos + 1))
    }
}

/// Compute the maximum operand-stack height reached by `code`.
///
/// Fails if the height would ever drop below zero, if a `CHECKSTACK`
/// operand disagrees with the running height, or if the stream does not end
/// with an empty stack.
pub fn count_stack_depth(code: &[u8]) -> Result<usize, BuildError> {
    let mut pos = 0usize;
    let mut depth: i64 = 0;
    let mut max_depth: i64 = 0;

    while pos < code.len() {
        let offset = pos;
        let (op, arg, next) = next_instruction(code, pos)?;
        pos = next;

        let arg = arg.unwrap_or(0);
        if op == Opcode::Checkstack && depth != arg as i64 {
            return Err(StackError::CheckpointMismatch {
                offset,
                expected: arg,
                actual: depth,
            }
            .into());
        }

        depth += op.stack_effect().apply(arg);
        if depth < 0 {
            return Err(StackError::Underflow {
                offset,
                opcode: op.mnemonic(),
                depth,
            }
            .into());
        }
        max_depth = max_depth.max(depth);
    }

    if depth != 0 {
        return Err(StackError::Unbalanced { depth }.into());
    }

    trace!(len = code.len(), max_depth, "computed stack depth");
    Ok(max_depth as usize)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::vm::CodeWriter;

    fn assemble(ops: &[(Opcode, Option<u64>)]) -> Vec<u8> {
        let mut w = CodeWriter::new();
        for &(op, arg) in ops {
            match arg {
                Some(arg) => w.emit_arg(op, arg).expect("encodable"),
                None => w.emit(op),
            };
        }
        w.finish()
    }

    /// Pops and pushes as an executor performs them, for the opcodes the
    /// tests below use.
    fn pops_pushes(op: Opcode, arg: u64) -> (u64, u64) {
        match op {
            Opcode::LoadConst | Opcode::LoadName | Opcode::LoadNull => (0, 1),
            Opcode::BinaryAdd => (2, 1),
            Opcode::Echo | Opcode::DiscardTop | Opcode::Return => (1, 0),
            Opcode::Call => (arg + 1, 1),
            Opcode::MakeArray => (arg, 1),
            Opcode::MakeHash => (2 * arg, 1),
            Opcode::Checkstack => (0, 0),
            other => panic!("no reference semantics for {other}"),
        }
    }

    /// Run the stream against a literal stack and report the peak height.
    fn simulate(code: &[u8]) -> usize {
        let mut stack: Vec<()> = Vec::new();
        let mut peak = 0;
        let mut pos = 0;
        while pos < code.len() {
            let (op, arg, next) = next_instruction(code, pos).expect("valid stream");
            pos = next;
            let arg = arg.unwrap_or(0);
            if matches!(op, Opcode::Checkstack) {
                assert_eq!(stack.len() as u64, arg, "{op}");
            }
            let (pops, pushes) = pops_pushes(op, arg);
            assert_eq!(pushes as i64 - pops as i64, op.stack_effect().apply(arg), "{op}");
            for _ in 0..pops {
                stack.pop().expect("simulated underflow");
            }
            for _ in 0..pushes {
                stack.push(());
            }
            peak = peak.max(stack.len());
        }
        assert!(stack.is_empty());
        peak
    }

    #[test]
    fn add_two_constants() {
        let code = assemble(&[
            (Opcode::LoadConst, Some(0)),
            (Opcode::LoadConst, Some(1)),
            (Opcode::BinaryAdd, None),
            (Opcode::Return, None),
        ]);
        assert_eq!(count_stack_depth(&code), Ok(2));
    }

    /// A random stream that never underflows and ends with an empty stack.
    /// Operands of the variadic opcodes are drawn from what is on the stack.
    fn balanced_stream(rng: &mut StdRng, len: usize) -> Vec<(Opcode, Option<u64>)> {
        let mut ops = Vec::with_capacity(len);
        let mut height: u64 = 0;
        for _ in 0..len {
            match rng.gen_range(0..9) {
                0 => {
                    ops.push((Opcode::LoadConst, Some(rng.gen_range(0..300))));
                    height += 1;
                }
                1 => {
                    ops.push((Opcode::LoadName, Some(rng.gen_range(0..8))));
                    height += 1;
                }
                3 if height >= 2 => {
                    ops.push((Opcode::BinaryAdd, None));
                    height -= 1;
                }
                4 if height >= 1 => {
                    let op = if rng.gen_bool(0.5) { Opcode::Echo } else { Opcode::DiscardTop };
                    ops.push((op, None));
                    height -= 1;
                }
                5 => {
                    let n = rng.gen_range(0..=height);
                    ops.push((Opcode::MakeArray, Some(n)));
                    height = height - n + 1;
                }
                6 => {
                    let n = rng.gen_range(0..=height / 2);
                    ops.push((Opcode::MakeHash, Some(n)));
                    height = height - 2 * n + 1;
                }
                7 if height >= 1 => {
                    let n = rng.gen_range(0..height);
                    ops.push((Opcode::Call, Some(n)));
                    height -= n;
                }
                8 => ops.push((Opcode::Checkstack, Some(height))),
                _ => {
                    ops.push((Opcode::LoadNull, None));
                    height += 1;
                }
            }
        }
        for _ in 0..height {
            ops.push((Opcode::DiscardTop, None));
        }
        ops
    }

    #[test]
    fn generated_streams_match_simulation() {
        for seed in 0..64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let len = rng.gen_range(1..200);
            let code = assemble(&balanced_stream(&mut rng, len));
            assert_eq!(count_stack_depth(&code), Ok(simulate(&code)), "seed {seed}");
        }
    }

    #[test]
    fn empty_stream_has_zero_depth() {
        assert_eq!(count_stack_depth(&[]), Ok(0));
    }

    #[test]
    fn operand_driven_effects() {
        // f(a, b, c) with the call result echoed
        let code = assemble(&[
            (Opcode::LoadName, Some(0)),
            (Opcode::LoadConst, Some(0)),
            (Opcode::LoadConst, Some(1)),
            (Opcode::LoadConst, Some(2)),
            (Opcode::Call, Some(3)),
            (Opcode::Echo, None),
            // ['a' => 1, 'b' => 2]
            (Opcode::LoadConst, Some(0)),
            (Opcode::LoadConst, Some(1)),
            (Opcode::LoadConst, Some(2)),
            (Opcode::LoadConst, Some(3)),
            (Opcode::MakeHash, Some(2)),
            (Opcode::LoadNull, None),
            (Opcode::MakeArray, Some(2)),
            (Opcode::DiscardTop, None),
        ]);
        assert_eq!(count_stack_depth(&code), Ok(4));
        assert_eq!(simulate(&code), 4);
    }

    #[test]
    fn empty_array_literal_pushes_one() {
        let code = assemble(&[(Opcode::MakeArray, Some(0)), (Opcode::Return, None)]);
        assert_eq!(count_stack_depth(&code), Ok(1));
    }

    #[test]
    fn underflow_is_reported_at_offending_instruction() {
        let code = assemble(&[(Opcode::LoadConst, Some(0)), (Opcode::BinaryAdd, None), (Opcode::Return, None)]);
        let err = count_stack_depth(&code).unwrap_err();
        assert_eq!(
            err,
            BuildError::Stack(StackError::Underflow {
                offset: 3,
                opcode: "RETURN",
                depth: -1,
            })
        );
    }

    #[test]
    fn leftover_values_are_rejected() {
        let code = assemble(&[(Opcode::LoadConst, Some(0)), (Opcode::LoadConst, Some(0))]);
        assert_eq!(
            count_stack_depth(&code),
            Err(BuildError::Stack(StackError::Unbalanced { depth: 2 }))
        );
    }

    #[test]
    fn checkstack_matches_running_depth() {
        let code = assemble(&[
            (Opcode::Checkstack, Some(0)),
            (Opcode::LoadTrue, None),
            (Opcode::Checkstack, Some(1)),
            (Opcode::JumpIfFalse, Some(3)),
            (Opcode::Checkstack, Some(0)),
        ]);
        assert_eq!(count_stack_depth(&code), Ok(1));
    }

    #[test]
    fn checkstack_mismatch_fails() {
        let code = assemble(&[
            (Opcode::LoadTrue, None),
            (Opcode::Checkstack, Some(2)),
            (Opcode::DiscardTop, None),
        ]);
        assert_eq!(
            count_stack_depth(&code),
            Err(BuildError::Stack(StackError::CheckpointMismatch {
                offset: 1,
                expected: 2,
                actual: 1,
            }))
        );
    }

    #[test]
    fn malformed_operand_fails_construction() {
        let code = [Opcode::LoadConst as u8, 0x80, 0x80, 0x80, 0x80, 0x80];
        assert_eq!(
            count_stack_depth(&code),
            Err(BuildError::Instruction(InstructionError::OperandTooLong { offset: 1 }))
        );
    }

    #[test]
    fn unknown_opcode_fails_construction() {
        assert_eq!(
            count_stack_depth(&[0xee]),
            Err(BuildError::Instruction(InstructionError::UnknownOpcode {
                offset: 0,
                opcode: 0xee,
            }))
        );
    }

    #[test]
    fn wide_operands_advance_correctly() {
        // DISCARD_N with a 2-byte operand of 0x80
        let mut code = Vec::new();
        for _ in 0..0x80 {
            code.push(Opcode::LoadNull as u8);
        }
        let tail = assemble(&[(Opcode::DiscardN, Some(0x80))]);
        assert_eq!(tail.len(), 3);
        code.extend_from_slice(&tail);
        assert_eq!(count_stack_depth(&code), Ok(0x80));
    }
}
