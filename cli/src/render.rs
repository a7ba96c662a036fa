//! Human- and machine-readable views of a block tree.

use std::fmt::Write as _;

use hvm_core::{
    val::Val,
    vm::{ByteCode, Declaration, Function, ParamKind, UserClass, disassemble},
};
use serde::Serialize;

const INDENT: &str = "    ";

pub fn render_text(bc: &ByteCode) -> String {
    let mut out = String::new();
    write_block(&mut out, bc, 0);
    out
}

fn write_block(out: &mut String, bc: &ByteCode, depth: usize) {
    let pad = INDENT.repeat(depth);
    let _ = writeln!(out, "{pad}{bc} stackdepth={}", bc.stackdepth());
    if !bc.consts().is_empty() {
        let consts: Vec<String> = bc.consts().iter().map(Val::to_string).collect();
        let _ = writeln!(out, "{pad}consts: [{}]", consts.join(", "));
    }
    if !bc.names().is_empty() {
        let _ = writeln!(out, "{pad}names: [{}]", bc.names().join(", "));
    }
    if !bc.varnames().is_empty() {
        let _ = writeln!(out, "{pad}varnames: [{}]", bc.varnames().join(", "));
    }
    for line in bc.dump().lines() {
        let _ = writeln!(out, "{pad}{line}");
    }
    for decl in bc.user_functions() {
        match decl {
            Declaration::Function(func) => {
                let _ = writeln!(out, "{pad}function {}({})", func.name(), signature(func));
                write_block(out, &func.bytecode, depth + 1);
            }
            Declaration::Class(class) => {
                let _ = writeln!(out, "{pad}class {}", class.name());
                for (name, method) in class.methods() {
                    let _ = writeln!(
                        out,
                        "{pad}{INDENT}method {name}({}) flags={}",
                        signature(&method.func),
                        method.access_flags.bits()
                    );
                    write_block(out, &method.func.bytecode, depth + 2);
                }
            }
        }
    }
}

fn signature(func: &Function) -> String {
    func.params
        .iter()
        .map(|p| match p.kind {
            ParamKind::Value => format!("${}", p.name),
            ParamKind::Reference => format!("&${}", p.name),
            ParamKind::Variadic => format!("...${}", p.name),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Serialize)]
pub struct BlockView {
    pub name: String,
    pub filename: String,
    pub startlineno: usize,
    pub stackdepth: usize,
    pub consts: Vec<serde_json::Value>,
    pub names: Vec<String>,
    pub varnames: Vec<String>,
    pub superglobals: Vec<usize>,
    pub this_var_num: Option<usize>,
    pub instructions: Vec<InstructionView>,
    pub declarations: Vec<DeclarationView>,
}

#[derive(Debug, Serialize)]
pub struct InstructionView {
    pub offset: usize,
    pub opcode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DeclarationView {
    Function(FunctionView),
    Class {
        name: String,
        constructor: Option<String>,
        methods: Vec<MethodView>,
    },
}

#[derive(Debug, Serialize)]
pub struct FunctionView {
    pub name: String,
    pub params: Vec<ParamView>,
    pub body: BlockView,
}

#[derive(Debug, Serialize)]
pub struct ParamView {
    pub name: String,
    pub kind: char,
}

#[derive(Debug, Serialize)]
pub struct MethodView {
    pub name: String,
    pub access_flags: i64,
    pub function: FunctionView,
}

impl BlockView {
    /// Instructions that fail to decode end the listing; blocks that went
    /// through verification never have any.
    pub fn new(bc: &ByteCode) -> Self {
        let instructions = disassemble(bc.code())
            .map_while(Result::ok)
            .map(|ins| InstructionView {
                offset: ins.offset,
                opcode: ins.opcode.mnemonic(),
                arg: ins.arg,
                line: bc.line_for_offset(ins.offset),
            })
            .collect();
        Self {
            name: bc.name().to_string(),
            filename: bc.filename().to_string(),
            startlineno: bc.startlineno(),
            stackdepth: bc.stackdepth(),
            consts: bc.consts().iter().map(const_json).collect(),
            names: bc.names().to_vec(),
            varnames: bc.varnames().to_vec(),
            superglobals: bc.superglobals().to_vec(),
            this_var_num: bc.this_var_num(),
            instructions,
            declarations: bc.user_functions().iter().map(DeclarationView::new).collect(),
        }
    }
}

impl DeclarationView {
    fn new(decl: &Declaration) -> Self {
        match decl {
            Declaration::Function(func) => DeclarationView::Function(FunctionView::new(func)),
            Declaration::Class(class) => class_view(class),
        }
    }
}

impl FunctionView {
    fn new(func: &Function) -> Self {
        Self {
            name: func.name().to_string(),
            params: func
                .params
                .iter()
                .map(|p| ParamView {
                    name: p.name.clone(),
                    kind: p.kind.tag() as char,
                })
                .collect(),
            body: BlockView::new(&func.bytecode),
        }
    }
}

fn class_view(class: &UserClass) -> DeclarationView {
    DeclarationView::Class {
        name: class.name().to_string(),
        constructor: class.constructor().map(|m| m.func.name().to_string()),
        methods: class
            .methods()
            .iter()
            .map(|(name, method)| MethodView {
                name: name.clone(),
                access_flags: method.access_flags.bits(),
                function: FunctionView::new(&method.func),
            })
            .collect(),
    }
}

fn const_json(val: &Val) -> serde_json::Value {
    match val {
        Val::Null => serde_json::Value::Null,
        Val::Bool(b) => (*b).into(),
        Val::Int(i) => (*i).into(),
        Val::Float(x) => (*x).into(),
        Val::Str(s) => serde_json::Value::from(&**s),
    }
}
