//! Variable-width instruction operands.
//!
//! The first byte is taken whole. If it has the high bit set, up to four more
//! bytes follow; each is XOR-ed into the accumulator at bit offsets 7, 14, 21
//! and 28, and the first one below 0x80 terminates the operand.

use super::error::InstructionError;

/// Longest legal operand encoding in bytes.
pub const MAX_ARG_LEN: usize = 5;

const CONTINUATION_SHIFTS: [u32; MAX_ARG_LEN - 1] = [7, 14, 21, 28];

/// Decode the operand starting at `pos`, returning the position just past it
/// and the operand value.
#[inline(always)]
pub fn decode_arg(code: &[u8], pos: usize) -> Result<(usize, u64), InstructionError> {
    let Some(&first) = code.get(pos) else {
        return Err(InstructionError::TruncatedOperand { offset: pos });
    };
    let mut i = pos + 1;
    let mut arg = first as u64;
    if first < 0x80 {
        return Ok((i, arg));
    }
    for shift in CONTINUATION_SHIFTS {
        let Some(&byte) = code.get(i) else {
            return Err(InstructionError::TruncatedOperand { offset: pos });
        };
        i += 1;
        arg ^= (byte as u64) << shift;
        if byte < 0x80 {
            return Ok((i, arg));
        }
    }
    Err(InstructionError::OperandTooLong { offset: pos })
}

/// Append the encoding of `value` to `out`. Exact inverse of [`decode_arg`].
pub fn encode_arg(value: u64, out: &mut Vec<u8>) -> Result<(), InstructionError> {
    let mut buf = [0u8; MAX_ARG_LEN];
    let mut rest = value;
    for (len, slot) in buf.iter_mut().enumerate() {
        if rest < 0x80 {
            *slot = rest as u8;
            out.extend_from_slice(&buf[..=len]);
            return Ok(());
        }
        let byte = (rest & 0x7f) as u8 | 0x80;
        *slot = byte;
        rest = (rest ^ byte as u64) >> 7;
    }
    Err(InstructionError::OperandTooLarge { value })
}
