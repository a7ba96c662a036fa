use std::sync::Arc;

use super::bytecode::ByteCode;
use crate::val::Val;

/// How an argument is bound to its parameter. Serialized as one character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamKind {
    #[default]
    Value,
    Reference,
    Variadic,
}

impl ParamKind {
    pub const fn tag(self) -> u8 {
        match self {
            ParamKind::Value => b'v',
            ParamKind::Reference => b'r',
            ParamKind::Variadic => b'*',
        }
    }

    pub const fn from_tag(tag: u8) -> Option<ParamKind> {
        match tag {
            b'v' => Some(ParamKind::Value),
            b'r' => Some(ParamKind::Reference),
            b'*' => Some(ParamKind::Variadic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    /// Folded default value. Not persisted by the block format.
    pub default: Option<Val>,
    /// Declared type hint (class or builtin name). Not persisted.
    pub type_hint: Option<String>,
}

impl Param {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            type_hint: None,
        }
    }
}

/// A user-defined function: parameters plus its body block.
#[derive(Debug, Clone)]
pub struct Function {
    pub params: Vec<Param>,
    /// Names of variables captured by a closure (`use ($a, &$b)`). Not persisted.
    pub closure_decls: Vec<String>,
    pub bytecode: Arc<ByteCode>,
}

impl Function {
    pub fn new(params: Vec<Param>, bytecode: Arc<ByteCode>) -> Self {
        Self {
            params,
            closure_decls: Vec::new(),
            bytecode,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.bytecode.name()
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }
}
