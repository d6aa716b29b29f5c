//! Processing an in-memory slice
//!
//! Formats ten structs on one worker per CPU and prints the results in
//! completion order.
//!
//! Run with: RUST_LOG=debug cargo run --example from_slice

use fanout_pool::prelude::*;

#[derive(Debug, Clone)]
struct MyStruct {
    value: u32,
}

fn main() -> Result<()> {
    env_logger::init();

    println!("=== fanout_pool - From Slice Example ===\n");

    let data: Vec<MyStruct> = (1..=10).map(|value| MyStruct { value }).collect();
    let token = CancellationToken::new();

    let stream = run_from_slice(
        &token,
        data,
        |_: &CancellationToken, item: MyStruct| Some(JobResult::success(item.value.to_string())),
        num_cpus::get(),
    )?;

    println!("Run {} on {} worker(s)", stream.run_id(), stream.worker_count());

    for result in stream {
        match result.into_result() {
            Ok(text) => println!("  {}", text),
            Err(e) => eprintln!("  failed: {}", e),
        }
    }

    Ok(())
}
