use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chaotone_engine::{FormulaId, Patch, Session, Slot, StageKind};
use strum::IntoEnumIterator;

const BLOCK: usize = 512;

fn single_formula(c: &mut Criterion) {
    let mut group = c.benchmark_group("formula");
    for id in FormulaId::iter() {
        let patch = Patch::default().with_formula(id.name(), Slot::on());
        let mut session = Session::from_patch(48_000.0, &patch);
        let mut out = vec![0.0f32; BLOCK];
        group.bench_with_input(BenchmarkId::from_parameter(id), &id, |b, _| {
            b.iter(|| {
                session.process_block(&mut out);
                black_box(out[BLOCK - 1])
            })
        });
    }
    group.finish();
}

fn full_chain(c: &mut Criterion) {
    let mut patch = Patch::default();
    for id in FormulaId::iter() {
        patch = patch.with_formula(id.name(), Slot::on().with("gain", 0.05));
    }
    for k in StageKind::CANONICAL {
        patch = patch.with_effect(k.name(), Slot::on());
    }
    let mut session = Session::from_patch(48_000.0, &patch);
    let mut out = vec![0.0f32; BLOCK];
    c.bench_function("all_formulas_all_stages", |b| {
        b.iter(|| {
            session.process_block(&mut out);
            black_box(out[BLOCK - 1])
        })
    });
}

criterion_group!(benches, single_formula, full_chain);
criterion_main!(benches);
