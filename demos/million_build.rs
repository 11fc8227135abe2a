use cascade_mph::{BuildConfig, Builder, MphError};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::collections::HashSet;
use std::time::Instant;

const N_KEYS: usize = 1_000_000;
const GEN_SEED: u64 = 42;

fn main() -> Result<(), MphError> {
    println!("--- cascade_mph test ---");
    println!("n = {N_KEYS}");

    // 1) Generate unique keys
    let t0 = Instant::now();
    let keys = gen_unique_keys(N_KEYS, GEN_SEED);
    let gen_s = t0.elapsed().as_secs_f64();
    println!(
        "gen:    {:>8.3} s   ({:.1} M keys/s)",
        gen_s,
        N_KEYS as f64 / gen_s / 1e6
    );

    // 2) Build serially, then on the global rayon pool
    let cfg = BuildConfig {
        gamma: 2.0,
        ..Default::default()
    };

    let t1 = Instant::now();
    let mph = Builder::new()
        .with_config(cfg.clone())
        .build(keys.iter().copied())?;
    let build_s = t1.elapsed().as_secs_f64();
    println!(
        "build:  {:>8.3} s   ({:.1} M keys/s)",
        build_s,
        N_KEYS as f64 / build_s / 1e6
    );

    let t2 = Instant::now();
    let par = Builder::new()
        .with_config(cfg)
        .with_threads(0)
        .build(keys.iter().copied())?;
    let par_s = t2.elapsed().as_secs_f64();
    println!(
        "build∥: {:>8.3} s   ({:.1} M keys/s)",
        par_s,
        N_KEYS as f64 / par_s / 1e6
    );

    // 3) Lookup all keys
    let t3 = Instant::now();
    let mut acc: u64 = 0;
    for chunk in keys.chunks(32_768) {
        for &k in chunk {
            acc ^= mph.index(k);
        }
    }
    let lookup_s = t3.elapsed().as_secs_f64();
    println!(
        "lookup: {:>8.3} s   ({:.1} M lookups/s)   (acc={acc})",
        lookup_s,
        N_KEYS as f64 / lookup_s / 1e6
    );

    let mismatches = keys.iter().filter(|&&k| mph.index(k) != par.index(k)).count();
    let stats = mph.stats();
    println!("----------------------------------------------");
    println!(
        "levels: {}   bits/key: {:.2}   terminal: {}   serial/parallel mismatches: {}",
        stats.levels, stats.bits_per_key, stats.terminal_keys, mismatches
    );

    Ok(())
}

/// Generate N unique u64 keys, deterministically.
fn gen_unique_keys(n: usize, seed: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut set = HashSet::with_capacity(n * 2);
    let mut keys = Vec::with_capacity(n);
    while keys.len() < n {
        let k = rng.next_u64();
        if set.insert(k) {
            keys.push(k);
        }
    }
    keys
}
