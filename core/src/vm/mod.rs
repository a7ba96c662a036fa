//! Bytecode blocks and everything that reads or writes them.
//!
//! A block is built once (by a code generator or by [`deserialize`]), checked
//! by the static stack analyzer, and then shared immutably. The disassembler
//! and the binary writer only ever read it.

mod analysis;
mod arg;
mod asm;
mod bytecode;
mod disasm;
mod error;
mod function;
mod klass;
mod runtime;
mod serial;

pub use analysis::count_stack_depth;
pub use arg::*;
pub use asm::*;
pub use bytecode::*;
pub use disasm::*;
pub use error::*;
pub use function::*;
pub use klass::*;
pub use runtime::*;
pub use serial::*;
