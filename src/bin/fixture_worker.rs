//! A minimal worker fixture implementing the Worker Runtime Contract
//! (spec §4.F) well enough to exercise the supervisor end to end.
//!
//! This is test scaffolding, not a reference host-language interpreter: it
//! never parses or runs real test code. Behavior is entirely keyed off the
//! requested function name, mirroring `original_source/src/worker.py`'s
//! `main()` loop (read a length-prefixed request, dispatch on its kind,
//! write a length-prefixed response) but with deterministic canned
//! outcomes instead of an actual test framework underneath:
//!
//! - a function name containing `fail` reports `passed: false`
//! - a function name containing `crash` exits the process without replying
//! - a function name containing `hang` sleeps far longer than any sane
//!   per-item timeout, to exercise the supervisor's timeout path
//! - a function name containing `count` reports, in `stdout`, how many
//!   `run` requests this process has handled so far (itself included) —
//!   this is what lets an integration test tell a reused `process-per-run`
//!   worker apart from a fresh one spawned per item under `process-per-test`
//! - everything else passes

use std::collections::BTreeMap;
use std::time::Instant;

use taut::protocol::{Request, Response, TestError, read_frame, write_frame};
use tokio::io::{BufReader, Stdin, Stdout, stdin, stdout};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("fixture-worker: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), taut::error::ProtocolError> {
    let mut input = BufReader::new(stdin());
    let mut output = stdout();
    let mut requests_handled: u64 = 0;

    loop {
        let request: Request = match read_frame::<Request, BufReader<Stdin>>(&mut input).await {
            Ok(request) => request,
            Err(taut::error::ProtocolError::Eof) => return Ok(()),
            Err(err) => return Err(err),
        };

        match request {
            Request::Ping { id } => {
                write_frame::<Response, Stdout>(&mut output, &Response::pong(id)).await?;
            }
            Request::Shutdown { .. } => return Ok(()),
            Request::Run {
                id,
                function,
                collect_coverage,
                file,
                ..
            } => {
                requests_handled += 1;
                let response = run_fixture(id, &function, &file, collect_coverage, requests_handled).await;
                write_frame::<Response, Stdout>(&mut output, &response).await?;
            }
        }
    }
}

async fn run_fixture(id: u64, function: &str, file: &str, collect_coverage: bool, requests_handled: u64) -> Response {
    let started = Instant::now();

    if function.contains("crash") {
        std::process::exit(1);
    }
    if function.contains("hang") {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
    }

    let passed = !function.contains("fail");
    let duration_sec = started.elapsed().as_secs_f64();

    let coverage = collect_coverage.then(|| BTreeMap::from([(file.to_string(), vec![1, 2, 3])]));
    let stdout = if function.contains("count") {
        requests_handled.to_string()
    } else {
        String::new()
    };

    Response {
        id,
        passed,
        error: (!passed).then(|| TestError {
            message: format!("{function} failed"),
            traceback: format!("Traceback (most recent call last):\n  ...\nAssertionError: {function} failed"),
        }),
        stdout,
        stderr: String::new(),
        duration_sec,
        coverage,
        pong: false,
    }
}
