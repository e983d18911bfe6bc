use chip::{
    chip8::ChipSet,
    resources::Rom,
    settings::Settings,
    timer::{NoCallback, Worker},
};
use criterion::{criterion_group, criterion_main, Criterion};

/// a small counting loop that never draws or faults
fn looping_chip() -> ChipSet<Worker, NoCallback> {
    let rom = Rom::new("loop", vec![0x60, 0x01, 0x70, 0x01, 0x12, 0x00])
        .expect("the bench rom fits the program region");
    ChipSet::new(rom, Settings::default())
}

pub fn step_bench(c: &mut Criterion) {
    let mut chip = looping_chip();
    c.bench_function("step_bench", |b| {
        b.iter(|| {
            chip.step().expect("the bench program never faults");
        });
    });
}

pub fn print_bench(c: &mut Criterion) {
    let chip = looping_chip();
    c.bench_function("print_bench", |b| {
        b.iter(|| {
            let _ = format!("{}", chip);
        });
    });
}

criterion_group!(benches, step_bench, print_bench);
criterion_main!(benches);
