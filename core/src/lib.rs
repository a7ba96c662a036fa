pub mod op;
pub mod util;
pub mod val;
pub mod vm;
