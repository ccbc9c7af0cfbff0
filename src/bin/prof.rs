//! NDJSON scanning throughput probe, for flamegraphs and quick soak tests.
//!
//! Feed newline-delimited JSON on stdin:
//!
//! ```text
//! zcat citylots.jlines.gz | cargo run --release --bin prof
//! ```

use std::io;
use std::time::Instant;

use jscan::{read_json_nl, Action};

fn main() {
    let start = Instant::now();
    let mut records = 0u64;
    let mut events = 0u64;
    let result = read_json_nl(io::stdin().lock(), |_t, _k, _v, line| {
        events += 1;
        records = records.max(line + 1);
        Action::Continue
    });
    let elapsed = start.elapsed();

    if let Err(err) = result {
        eprintln!("scan failed at record {records}: {err}");
        std::process::exit(1);
    }

    eprintln!("{records} records, {events} events in {elapsed:?}");
    if records > 0 {
        eprintln!("{} ns/record", elapsed.as_nanos() / u128::from(records));
    }
}
