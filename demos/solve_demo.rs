use hardlock::{Dispatcher, HashBackend, OsContext, Puzzle, ThreadDelegate};
use hex::encode as hex_encode;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn usage() -> String {
    "Usage: cargo run --release --example solve_demo -- \
      [--difficulty <usize>] [--salt <str>] [--key <str>] [--backend sha256-hex|blake2b] [--inline]\n\
     Defaults: --difficulty 4 --salt demo-salt --key demo-key --backend sha256-hex\n"
        .to_string()
}

fn main() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let mut difficulty: usize = 4;
    let mut salt = String::from("demo-salt");
    let mut key = String::from("demo-key");
    let mut backend = HashBackend::Sha256Hex;
    let mut inline = false;

    while let Some(a) = args.next() {
        match a.as_str() {
            "--difficulty" => {
                difficulty = args
                    .next()
                    .ok_or_else(usage)?
                    .parse()
                    .map_err(|_| usage())?
            }
            "--salt" => salt = args.next().ok_or_else(usage)?,
            "--key" => key = args.next().ok_or_else(usage)?,
            "--backend" => {
                backend = match args.next().ok_or_else(usage)?.as_str() {
                    "sha256-hex" => HashBackend::Sha256Hex,
                    "blake2b" => HashBackend::Blake2b,
                    _ => return Err(usage()),
                }
            }
            "--inline" => inline = true,
            "-h" | "--help" => {
                print!("{}", usage());
                return Ok(());
            }
            _ => return Err(usage()),
        }
    }

    let puzzle = Puzzle::builder()
        .difficulty(difficulty)
        .salt(salt.as_bytes())
        .key(key.as_bytes())
        .backend(backend)
        .build_validated()
        .map_err(|e| e.to_string())?;

    let context = if inline {
        OsContext::inline()
    } else {
        OsContext::delegating()
    };
    let dispatcher = Dispatcher::builder()
        .puzzle(puzzle.clone())
        .context(Arc::new(context))
        .delegate(Arc::new(ThreadDelegate::new()))
        .build_validated()
        .map_err(|e| e.to_string())?;

    println!(
        "solve_demo: difficulty={} {}, backend={:?}, salt_len={}, key_len={}",
        difficulty,
        backend.unit(),
        backend,
        salt.len(),
        key.len()
    );

    let t0 = Instant::now();
    let mut handle = dispatcher.solve();
    println!("delegated={}, state={:?}", handle.is_delegated(), handle.state());
    let solution = handle.wait().map_err(|e| e.to_string())?;
    let dt_ms = t0.elapsed().as_millis();
    println!(
        "solve_time_ms={}, draws={}, state={:?}",
        dt_ms,
        solution
            .draws
            .map(|d| d.to_string())
            .unwrap_or_else(|| "unknown".into()),
        handle.state()
    );

    // Server-side verification of the transport form.
    let ok = puzzle.verify(&solution.encoded);
    println!("verified={}", ok);
    println!("digest={}", solution.digest);
    println!("nonce_a={}", hex_encode(solution.proof.a));
    println!("nonce_b={}", hex_encode(solution.proof.b));
    println!("encoded={}", solution.encoded);

    if ok {
        Ok(())
    } else {
        Err("solution failed verification".into())
    }
}
