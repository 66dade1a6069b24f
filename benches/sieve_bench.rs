use criterion::{black_box, criterion_group, criterion_main, Criterion};

use primecount_rs::mu_lpf::MuLpf;
use primecount_rs::pi_table::PiTable;
use primecount_rs::primes::PrimeList;
use primecount_rs::sieve::Sieve;

fn bench_generate_primes_1m(c: &mut Criterion) {
    c.bench_function("PrimeList::new(1_000_000)", |b| {
        b.iter(|| PrimeList::new(black_box(1_000_000)));
    });
}

fn bench_pre_sieve_segment(c: &mut Criterion) {
    let primes = PrimeList::new(1_000_000);
    c.bench_function("Sieve::pre_sieve(1<<23 segment)", |b| {
        b.iter(|| Sieve::pre_sieve(&primes, 7, black_box(0), black_box(1 << 23)));
    });
}

fn bench_sieve_count_full_segment(c: &mut Criterion) {
    let primes = PrimeList::new(1_000_000);
    let mut sieve = Sieve::pre_sieve(&primes, 7, 0, 1 << 20);
    c.bench_function("Sieve::count(full segment)", |b| {
        b.iter(|| sieve.count(black_box(1 << 20)));
    });
}

fn bench_mu_lpf_build(c: &mut Criterion) {
    c.bench_function("MuLpf::build(1_000_000)", |b| {
        b.iter(|| MuLpf::build(black_box(1_000_000)));
    });
}

fn bench_pi_table_build(c: &mut Criterion) {
    let primes = PrimeList::new(1_000_000);
    c.bench_function("PiTable::new(1_000_000)", |b| {
        b.iter(|| PiTable::new(&primes, black_box(1_000_000), 1 << 22).unwrap());
    });
}

criterion_group!(
    benches,
    bench_generate_primes_1m,
    bench_pre_sieve_segment,
    bench_sieve_count_full_segment,
    bench_mu_lpf_build,
    bench_pi_table_build,
);
criterion_main!(benches);
