//! `.hasm` text assembler.
//!
//! One directive or instruction per line; `;` starts a comment.
//!
//! ```text
//! .name  <main>
//! .file  add.php
//! .const 2
//! .const 3
//! LOAD_CONST 0
//! LOAD_CONST 1
//! BINARY_ADD
//! RETURN
//! ```

use anyhow::{Context, bail};
use hvm_core::{
    op::Opcode,
    val::Val,
    vm::{ByteCode, ByteCodeParts, CodeWriter},
};

/// Assemble `src` into a single verified block. `default_filename` is used
/// unless the source sets `.file`.
pub fn assemble(src: &str, default_filename: &str) -> anyhow::Result<ByteCode> {
    let mut parts = ByteCodeParts {
        filename: default_filename.to_string(),
        startlineno: 1,
        ..Default::default()
    };
    let mut w = CodeWriter::new();

    for (idx, raw) in src.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw.split(';').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        if let Some(directive) = head.strip_prefix('.') {
            apply_directive(&mut parts, directive, rest).with_context(|| format!("line {lineno}"))?;
            continue;
        }

        let Some(op) = Opcode::from_mnemonic(head) else {
            bail!("line {lineno}: unknown mnemonic '{head}'");
        };
        match (op.has_arg(), rest) {
            (false, "") => {
                w.emit(op);
            }
            (false, _) => bail!("line {lineno}: {op} takes no operand"),
            (true, "") => bail!("line {lineno}: {op} requires an operand"),
            (true, arg) => {
                let arg: u64 = arg
                    .parse()
                    .with_context(|| format!("line {lineno}: invalid operand '{arg}'"))?;
                w.emit_arg(op, arg).with_context(|| format!("line {lineno}"))?;
            }
        }
    }

    parts.code = w.finish();
    ByteCode::new(parts).context("assembled block failed verification")
}

fn apply_directive(parts: &mut ByteCodeParts, directive: &str, value: &str) -> anyhow::Result<()> {
    if value.is_empty() {
        bail!(".{directive} requires a value");
    }
    match directive {
        "name" => parts.name = value.to_string(),
        "file" => parts.filename = value.to_string(),
        "const" => {
            let int: i64 = value.parse().with_context(|| format!("invalid integer constant '{value}'"))?;
            parts.consts.push(Val::Int(int));
        }
        "global" => parts.names.push(value.to_string()),
        "var" => parts.varnames.push(value.to_string()),
        other => bail!("unknown directive '.{other}'"),
    }
    Ok(())
}
