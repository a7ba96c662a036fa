use std::fmt;
use std::sync::{Arc, Weak};

use super::analysis::count_stack_depth;
use super::error::BuildError;
use super::function::Function;
use super::klass::UserClass;
use crate::util::fast_map::{FastHashMap, position_map};
use crate::val::Val;

/// Function or class declared inside a block, in source order.
#[derive(Debug, Clone)]
pub enum Declaration {
    Function(Function),
    Class(Arc<UserClass>),
}

impl Declaration {
    /// Wire discriminator.
    pub const FUNCTION_TAG: u8 = b'f';
    pub const CLASS_TAG: u8 = b'u';

    pub fn tag(&self) -> u8 {
        match self {
            Declaration::Function(_) => Self::FUNCTION_TAG,
            Declaration::Class(_) => Self::CLASS_TAG,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Declaration::Function(func) => func.name(),
            Declaration::Class(class) => class.name(),
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Declaration::Function(func) => Some(func),
            Declaration::Class(_) => None,
        }
    }

    pub fn as_class(&self) -> Option<&Arc<UserClass>> {
        match self {
            Declaration::Class(class) => Some(class),
            Declaration::Function(_) => None,
        }
    }
}

/// Everything a code generator (or the block reader) supplies to build a
/// [`ByteCode`]. Derived state is computed by [`ByteCode::new`].
#[derive(Debug, Clone)]
pub struct ByteCodeParts {
    pub code: Vec<u8>,
    pub consts: Vec<Val>,
    pub names: Vec<String>,
    pub varnames: Vec<String>,
    pub user_functions: Vec<Declaration>,
    pub superglobals: Vec<usize>,
    /// Slot in `varnames` holding `$this`; `None` outside method bodies.
    pub this_var_num: Option<usize>,
    pub method_of_class: Option<Weak<UserClass>>,
    pub name: String,
    pub filename: String,
    pub startlineno: usize,
    pub sourcelines: Vec<String>,
    pub bc_mapping: Vec<usize>,
}

impl Default for ByteCodeParts {
    fn default() -> Self {
        Self {
            code: Vec::new(),
            consts: Vec::new(),
            names: Vec::new(),
            varnames: Vec::new(),
            user_functions: Vec::new(),
            superglobals: Vec::new(),
            this_var_num: None,
            method_of_class: None,
            name: ByteCode::MAIN_NAME.to_string(),
            filename: String::new(),
            startlineno: 0,
            sourcelines: Vec::new(),
            bc_mapping: Vec::new(),
        }
    }
}

/// One compiled code block: instructions, constant and name tables, nested
/// declarations and debug metadata.
///
/// A block is immutable once built. Its stack depth and name lookups are
/// computed by [`ByteCode::new`] and never change afterwards, so a block can
/// be shared behind an `Arc` by any number of executors.
#[derive(Debug)]
pub struct ByteCode {
    code: Box<[u8]>,
    consts: Vec<Val>,
    names: Vec<String>,
    varnames: Vec<String>,
    user_functions: Vec<Declaration>,
    superglobals: Vec<usize>,
    this_var_num: Option<usize>,
    method_of_class: Option<Weak<UserClass>>,
    name: String,
    filename: String,
    startlineno: usize,
    sourcelines: Vec<String>,
    bc_mapping: Vec<usize>,
    stackdepth: usize,
    names_to_pos: FastHashMap<Box<str>, usize>,
    var_to_pos: FastHashMap<Box<str>, usize>,
}

impl ByteCode {
    pub const MAIN_NAME: &'static str = "<main>";

    /// Build a block, verifying its instruction stream.
    ///
    /// If `names` or `varnames` contain duplicates, lookups resolve to the
    /// last occurrence.
    pub fn new(parts: ByteCodeParts) -> Result<Self, BuildError> {
        let ByteCodeParts {
            code,
            consts,
            names,
            varnames,
            user_functions,
            superglobals,
            this_var_num,
            method_of_class,
            name,
            filename,
            startlineno,
            sourcelines,
            bc_mapping,
        } = parts;

        let stackdepth = count_stack_depth(&code)?;
        let names_to_pos = position_map(&names);
        let var_to_pos = position_map(&varnames);

        Ok(Self {
            code: code.into_boxed_slice(),
            consts,
            names,
            varnames,
            user_functions,
            superglobals,
            this_var_num,
            method_of_class,
            name,
            filename,
            startlineno,
            sourcelines,
            bc_mapping,
            stackdepth,
            names_to_pos,
            var_to_pos,
        })
    }

    #[inline]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    #[inline]
    pub fn consts(&self) -> &[Val] {
        &self.consts
    }

    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[inline]
    pub fn varnames(&self) -> &[String] {
        &self.varnames
    }

    #[inline]
    pub fn user_functions(&self) -> &[Declaration] {
        &self.user_functions
    }

    #[inline]
    pub fn superglobals(&self) -> &[usize] {
        &self.superglobals
    }

    #[inline]
    pub fn this_var_num(&self) -> Option<usize> {
        self.this_var_num
    }

    /// Owning class when this block is a method body and the class is alive.
    pub fn method_of_class(&self) -> Option<Arc<UserClass>> {
        self.method_of_class.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_method(&self) -> bool {
        self.method_of_class.is_some()
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[inline]
    pub fn startlineno(&self) -> usize {
        self.startlineno
    }

    #[inline]
    pub fn sourcelines(&self) -> &[String] {
        &self.sourcelines
    }

    #[inline]
    pub fn bc_mapping(&self) -> &[usize] {
        &self.bc_mapping
    }

    /// Operand-stack slots an executor must reserve to run this block.
    #[inline]
    pub fn stackdepth(&self) -> usize {
        self.stackdepth
    }

    /// Slot of a global or property name in `names`.
    #[inline]
    pub fn lookup_pos(&self, name: &str) -> Option<usize> {
        self.names_to_pos.get(name).copied()
    }

    /// Slot of a local variable in `varnames`.
    #[inline]
    pub fn lookup_var(&self, name: &str) -> Option<usize> {
        self.var_to_pos.get(name).copied()
    }

    /// Source text of 1-based line `no`.
    pub fn getline(&self, no: usize) -> Option<&str> {
        no.checked_sub(1)
            .and_then(|idx| self.sourcelines.get(idx))
            .map(String::as_str)
    }

    /// Source line recorded for the instruction at byte `offset`.
    pub fn line_for_offset(&self, offset: usize) -> Option<usize> {
        self.bc_mapping.get(offset).copied()
    }
}

impl fmt::Display for ByteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<ByteCode {} ({}:{})>", self.name, self.filename, self.startlineno)
    }
}
