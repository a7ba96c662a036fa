use criterion::{Criterion, criterion_group, criterion_main};
use hvm_core::{
    op::Opcode,
    val::Val,
    vm::{ByteCode, ByteCodeParts, ClassTable, CodeWriter, Declaration, Function, Param, ParamKind, count_stack_depth, deserialize},
};
use std::hint::black_box;
use std::sync::Arc;

// Straight-line code summing `n` constants, with a hash literal every 64 terms
// so operand-driven effects and wide operands are exercised too.
fn long_stream(n: u64) -> Vec<u8> {
    let mut w = CodeWriter::new();
    w.emit_arg(Opcode::LoadConst, 0).unwrap();
    for i in 1..n {
        w.emit_arg(Opcode::LoadConst, i).unwrap();
        w.emit(Opcode::BinaryAdd);
        if i % 64 == 0 {
            for k in 0..8 {
                w.emit_arg(Opcode::LoadConst, k).unwrap();
            }
            w.emit_arg(Opcode::MakeHash, 4).unwrap();
            w.emit(Opcode::DiscardTop);
        }
    }
    w.emit(Opcode::Return);
    w.finish()
}

fn nested_program(functions: usize) -> Vec<u8> {
    let body = |name: String| {
        let mut w = CodeWriter::new();
        w.emit_arg(Opcode::LoadFast, 0).unwrap();
        w.emit(Opcode::Return);
        let bc = ByteCode::new(ByteCodeParts {
            code: w.finish(),
            name,
            varnames: vec!["x".into()],
            ..Default::default()
        })
        .unwrap();
        Function::new(vec![Param::new("x", ParamKind::Value)], Arc::new(bc))
    };
    let main = ByteCode::new(ByteCodeParts {
        code: long_stream(512),
        consts: (0..512).map(Val::Int).collect(),
        user_functions: (0..functions).map(|i| Declaration::Function(body(format!("f{i}")))).collect(),
        ..Default::default()
    })
    .unwrap();
    main.serialize().unwrap()
}

// Benchmark 1: static stack-depth analysis over a long stream
fn bench_stack_depth(c: &mut Criterion) {
    let code = long_stream(10_000);
    c.bench_function("count_stack_depth_10k", |b| {
        b.iter(|| {
            let depth = count_stack_depth(black_box(&code)).unwrap();
            black_box(depth);
        })
    });
}

// Benchmark 2: rebuilding a block tree from its binary form
fn bench_deserialize(c: &mut Criterion) {
    let bytes = nested_program(64);
    c.bench_function("deserialize_64_functions", |b| {
        b.iter(|| {
            let mut table = ClassTable::new();
            let bc = deserialize(black_box(&bytes), &mut table).unwrap();
            black_box(bc);
        })
    });
}

criterion_group!(benches, bench_stack_depth, bench_deserialize);
criterion_main!(benches);
