//! Binary block-tree format.
//!
//! Every integer is a native-width, native-endian `isize`, so a buffer is only
//! readable on a machine with the same word size and byte order as the writer.
//! Strings are a length followed by raw bytes, lists a count followed by their
//! items. A block record lists, in order: code, consts, name, filename,
//! startlineno, sourcelines, names, varnames, superglobals, this_var_num (`-1`
//! for none), nested declarations and bc_mapping.
//!
//! Only what a block needs to execute is persisted. Parameter defaults, type
//! hints, closure captures and class-level declarations other than methods are
//! dropped by the writer.

use std::mem::size_of;
use std::sync::{Arc, Weak};

use tracing::{debug, trace};

use super::bytecode::{ByteCode, ByteCodeParts, Declaration};
use super::error::{SerializeError, UnserializeError};
use super::function::{Function, Param, ParamKind};
use super::klass::{AccessFlags, Method, UserClass};
use super::runtime::Runtime;
use crate::val::Val;

const INT_SIZE: usize = size_of::<isize>();
const INT_CONST_TAG: u8 = b'i';

/// Deepest block nesting the reader accepts. The top-level block counts as
/// one level; every nested function or method body adds one.
pub const MAX_NESTING: usize = 128;

impl ByteCode {
    /// Encode this block and everything nested in it.
    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        let mut ser = Serializer::new();
        ser.write_bytecode(self)?;
        Ok(ser.finish())
    }
}

#[derive(Debug, Default)]
pub struct Serializer {
    out: Vec<u8>,
}

impl Serializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_bytecode(&mut self, bc: &ByteCode) -> Result<&mut Self, SerializeError> {
        let out = &mut self.out;
        write_bytes(out, bc.code());
        write_int(out, bc.consts().len() as isize);
        for val in bc.consts() {
            write_const(out, val)?;
        }
        write_bytes(out, bc.name().as_bytes());
        write_bytes(out, bc.filename().as_bytes());
        write_int(out, bc.startlineno() as isize);
        write_list_of_str(out, bc.sourcelines());
        write_list_of_str(out, bc.names());
        write_list_of_str(out, bc.varnames());
        write_list_of_int(out, bc.superglobals());
        write_int(out, bc.this_var_num().map_or(-1, |n| n as isize));
        write_int(out, bc.user_functions().len() as isize);
        for decl in bc.user_functions() {
            self.write_declaration(decl)?;
        }
        write_list_of_int(&mut self.out, bc.bc_mapping());
        Ok(self)
    }

    fn write_declaration(&mut self, decl: &Declaration) -> Result<(), SerializeError> {
        self.out.push(decl.tag());
        match decl {
            Declaration::Function(func) => self.write_function(func),
            Declaration::Class(class) => self.write_class(class),
        }
    }

    fn write_function(&mut self, func: &Function) -> Result<(), SerializeError> {
        self.write_bytecode(&func.bytecode)?;
        write_int(&mut self.out, func.params.len() as isize);
        for param in &func.params {
            write_bytes(&mut self.out, param.name.as_bytes());
        }
        write_int(&mut self.out, func.params.len() as isize);
        self.out.extend(func.params.iter().map(|p| p.kind.tag()));
        Ok(())
    }

    fn write_class(&mut self, class: &UserClass) -> Result<(), SerializeError> {
        write_bytes(&mut self.out, class.name().as_bytes());
        write_int(&mut self.out, class.methods().len() as isize);
        for (name, method) in class.methods() {
            write_bytes(&mut self.out, name.as_bytes());
            write_int(&mut self.out, method.access_flags.bits() as isize);
            self.write_function(&method.func)?;
        }
        Ok(())
    }

    pub fn finish(self) -> Vec<u8> {
        self.out
    }
}

fn write_int(out: &mut Vec<u8>, value: isize) {
    out.extend_from_slice(&value.to_ne_bytes());
}

fn write_bytes(out: &mut Vec<u8>, value: &[u8]) {
    write_int(out, value.len() as isize);
    out.extend_from_slice(value);
}

fn write_list_of_str(out: &mut Vec<u8>, items: &[String]) {
    write_int(out, items.len() as isize);
    for item in items {
        write_bytes(out, item.as_bytes());
    }
}

fn write_list_of_int(out: &mut Vec<u8>, items: &[usize]) {
    write_int(out, items.len() as isize);
    for &item in items {
        write_int(out, item as isize);
    }
}

fn write_const(out: &mut Vec<u8>, val: &Val) -> Result<(), SerializeError> {
    match val {
        Val::Int(i) => {
            out.push(INT_CONST_TAG);
            write_int(out, *i as isize);
            Ok(())
        }
        other => Err(SerializeError::UnsupportedConstant { kind: other.type_name() }),
    }
}

/// Rebuild a block tree written by [`ByteCode::serialize`].
///
/// Constants are created through `runtime`. Classes are handed to
/// `runtime.declare_class` in the order they were completed, and only once
/// the whole buffer has been read successfully; a failed read registers
/// nothing.
///
/// The buffer must hold exactly one top-level block: anything after it is
/// rejected with [`UnserializeError::TrailingBytes`], so concatenated buffers
/// have to be split by the caller. Trees nested deeper than [`MAX_NESTING`]
/// fail with [`UnserializeError::TooDeep`].
pub fn deserialize<R: Runtime + ?Sized>(bytes: &[u8], runtime: &mut R) -> Result<Arc<ByteCode>, UnserializeError> {
    debug!(len = bytes.len(), "deserialize block tree");
    let mut reader = Unserializer::new(bytes);
    let bc = reader.read_bytecode(runtime, None)?;
    let rest = reader.remaining();
    if rest != 0 {
        return Err(UnserializeError::TrailingBytes(rest));
    }
    for class in reader.classes {
        runtime.declare_class(class);
    }
    Ok(Arc::new(bc))
}

#[derive(Debug)]
struct Unserializer<'a> {
    bytes: &'a [u8],
    cursor: usize,
    depth: usize,
    /// Completed classes, registered by [`deserialize`] after a full read.
    classes: Vec<Arc<UserClass>>,
}

impl<'a> Unserializer<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            cursor: 0,
            depth: 0,
            classes: Vec::new(),
        }
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.bytes.len() - self.cursor
    }

    /// Read one block. `owner` is set when the block is the body of a method.
    fn read_bytecode<R: Runtime + ?Sized>(
        &mut self,
        runtime: &mut R,
        owner: Option<&Weak<UserClass>>,
    ) -> Result<ByteCode, UnserializeError> {
        if self.depth >= MAX_NESTING {
            return Err(UnserializeError::TooDeep { offset: self.cursor });
        }
        self.depth += 1;
        let bc = self.read_block_fields(runtime, owner);
        self.depth -= 1;
        bc
    }

    fn read_block_fields<R: Runtime + ?Sized>(
        &mut self,
        runtime: &mut R,
        owner: Option<&Weak<UserClass>>,
    ) -> Result<ByteCode, UnserializeError> {
        let code = self.read_bytes("code")?.to_vec();
        let nconsts = self.read_len("constant count")?;
        let mut consts = Vec::with_capacity(nconsts.min(self.remaining()));
        for _ in 0..nconsts {
            consts.push(self.read_const(runtime)?);
        }
        let name = self.read_string("block name")?;
        let filename = self.read_string("filename")?;
        let startlineno = self.read_len("start line")?;
        let sourcelines = self.read_list_of_str("source line")?;
        let names = self.read_list_of_str("name")?;
        let varnames = self.read_list_of_str("variable name")?;
        let superglobals = self.read_list_of_int("superglobal slot")?;
        let this_var_num = self.read_this_var_num()?;
        let ndecls = self.read_len("declaration count")?;
        let mut user_functions = Vec::with_capacity(ndecls.min(self.remaining()));
        for _ in 0..ndecls {
            user_functions.push(self.read_declaration(runtime)?);
        }
        let bc_mapping = self.read_list_of_int("line mapping")?;

        trace!(name = %name, code_len = code.len(), "read block");
        let bc = ByteCode::new(ByteCodeParts {
            code,
            consts,
            names,
            varnames,
            user_functions,
            superglobals,
            this_var_num,
            method_of_class: owner.cloned(),
            name,
            filename,
            startlineno,
            sourcelines,
            bc_mapping,
        })?;
        Ok(bc)
    }

    fn read_declaration<R: Runtime + ?Sized>(&mut self, runtime: &mut R) -> Result<Declaration, UnserializeError> {
        match self.read_u8("declaration tag")? {
            Declaration::FUNCTION_TAG => Ok(Declaration::Function(self.read_function(runtime, None)?)),
            Declaration::CLASS_TAG => Ok(Declaration::Class(self.read_class(runtime)?)),
            tag => Err(UnserializeError::UnknownDeclaration { tag: tag as char }),
        }
    }

    fn read_function<R: Runtime + ?Sized>(
        &mut self,
        runtime: &mut R,
        owner: Option<&Weak<UserClass>>,
    ) -> Result<Function, UnserializeError> {
        let bytecode = self.read_bytecode(runtime, owner)?;
        let names = self.read_list_of_str("parameter name")?;
        let tags = self.read_bytes("parameter tags")?;
        if names.len() != tags.len() {
            return Err(UnserializeError::ParamCountMismatch {
                names: names.len(),
                tags: tags.len(),
            });
        }
        let params = names
            .into_iter()
            .zip(tags)
            .map(|(name, &tag)| {
                ParamKind::from_tag(tag)
                    .map(|kind| Param::new(name, kind))
                    .ok_or(UnserializeError::UnknownParamTag { tag: tag as char })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Function::new(params, Arc::new(bytecode)))
    }

    fn read_class<R: Runtime + ?Sized>(&mut self, runtime: &mut R) -> Result<Arc<UserClass>, UnserializeError> {
        let name = self.read_string("class name")?;
        let nmethods = self.read_len("method count")?;
        let class = UserClass::builder(name).build(|this| -> Result<Vec<(String, Method)>, UnserializeError> {
            let mut methods = Vec::with_capacity(nmethods.min(self.remaining()));
            for _ in 0..nmethods {
                let name = self.read_string("method name")?;
                let access_flags = AccessFlags::from_bits(self.read_int("access flags")? as i64);
                let func = self.read_function(runtime, Some(this))?;
                methods.push((name, Method { access_flags, func }));
            }
            Ok(methods)
        })?;
        debug!(
            class = class.name(),
            methods = nmethods,
            has_constructor = class.constructor().is_some(),
            "read class"
        );
        self.classes.push(Arc::clone(&class));
        Ok(class)
    }

    fn read_const<R: Runtime + ?Sized>(&mut self, runtime: &mut R) -> Result<Val, UnserializeError> {
        match self.read_u8("constant tag")? {
            INT_CONST_TAG => {
                let value = self.read_int("integer constant")?;
                Ok(runtime.wrap_int(value as i64))
            }
            tag => Err(UnserializeError::UnknownConstant { tag: tag as char }),
        }
    }

    fn read_this_var_num(&mut self) -> Result<Option<usize>, UnserializeError> {
        let offset = self.cursor;
        match self.read_int("this slot")? {
            -1 => Ok(None),
            value if value < 0 => Err(UnserializeError::Negative {
                what: "this slot",
                value,
                offset,
            }),
            value => Ok(Some(value as usize)),
        }
    }

    fn read_u8(&mut self, what: &'static str) -> Result<u8, UnserializeError> {
        let Some(&value) = self.bytes.get(self.cursor) else {
            return Err(self.eof(what));
        };
        self.cursor += 1;
        Ok(value)
    }

    fn read_int(&mut self, what: &'static str) -> Result<isize, UnserializeError> {
        let Some(raw) = self.bytes.get(self.cursor..self.cursor + INT_SIZE) else {
            return Err(self.eof(what));
        };
        let mut buf = [0u8; INT_SIZE];
        buf.copy_from_slice(raw);
        self.cursor += INT_SIZE;
        Ok(isize::from_ne_bytes(buf))
    }

    /// A length, count or index: an integer that must not be negative.
    fn read_len(&mut self, what: &'static str) -> Result<usize, UnserializeError> {
        let offset = self.cursor;
        let value = self.read_int(what)?;
        usize::try_from(value).map_err(|_| UnserializeError::Negative { what, value, offset })
    }

    fn read_bytes(&mut self, what: &'static str) -> Result<&'a [u8], UnserializeError> {
        let len = self.read_len(what)?;
        if len > self.remaining() {
            return Err(self.eof(what));
        }
        let bytes = self.bytes;
        let slice = &bytes[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(slice)
    }

    fn read_string(&mut self, what: &'static str) -> Result<String, UnserializeError> {
        let raw = self.read_bytes(what)?;
        String::from_utf8(raw.to_vec()).map_err(|_| UnserializeError::InvalidUtf8 { what })
    }

    fn read_list_of_str(&mut self, what: &'static str) -> Result<Vec<String>, UnserializeError> {
        let len = self.read_len(what)?;
        let mut items = Vec::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            items.push(self.read_string(what)?);
        }
        Ok(items)
    }

    fn read_list_of_int(&mut self, what: &'static str) -> Result<Vec<usize>, UnserializeError> {
        let len = self.read_len(what)?;
        let mut items = Vec::with_capacity(len.min(self.remaining() / INT_SIZE));
        for _ in 0..len {
            items.push(self.read_len(what)?);
        }
        Ok(items)
    }

    fn eof(&self, what: &'static str) -> UnserializeError {
        UnserializeError::UnexpectedEof {
            what,
            offset: self.cursor,
        }
    }
}
