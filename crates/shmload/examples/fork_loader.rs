//! Canonical fork topology: the parent initializes the loader, forks one
//! worker child, then runs the loader loops. The child inherits the shared
//! region, pushes a request per command-line path, and prints the first
//! bytes of each payload as it lands.
//!
//! Run with: cargo run --example fork_loader -- /etc/hostname /etc/os-release

use shmload_rs::{Loader, LoaderConfig};
use std::time::{Duration, Instant};

fn main() {
    env_logger::init();

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("usage: fork_loader <file> [<file> ...]");
        std::process::exit(2);
    }

    let config = LoaderConfig::new(16, 1, 4).with_max_idle_iters(64);
    let loader = match Loader::init(config) {
        Ok(loader) => loader,
        Err(err) => {
            eprintln!("loader init failed: {err} (errno {})", err.to_errno());
            std::process::exit(1);
        }
    };
    println!(
        "loader up: {} bytes shared, queue depth {}, dispatch {}",
        loader.shared_bytes(),
        config.queue_depth,
        config.dispatch_n
    );

    // The fork must happen after init so the child inherits the region.
    let child = unsafe { libc::fork() };
    assert!(child >= 0, "fork failed");

    if child == 0 {
        worker_main(&loader, &paths);
        std::process::exit(0);
    }

    // Parent: run the engine until the child is done, then wind down.
    std::thread::scope(|s| {
        s.spawn(|| loader.run_reader());
        s.spawn(|| loader.run_responder());

        let mut status = 0;
        unsafe { libc::waitpid(child, &mut status, 0) };
        loader.request_stop();
    });
    println!("loader done");
}

fn worker_main(loader: &Loader, paths: &[String]) {
    let worker = loader.worker(0);
    let mut pending = 0usize;

    for path in paths {
        while !worker.try_request(path) {
            // Queue full: consume a completion to make room.
            pending -= drain_one(&worker);
        }
        pending += 1;
    }

    let deadline = Instant::now() + Duration::from_secs(30);
    while pending > 0 && Instant::now() < deadline {
        pending -= drain_one(&worker);
    }
}

fn drain_one(worker: &shmload_rs::Worker<'_>) -> usize {
    loop {
        if let Some(fetched) = worker.try_get() {
            let preview = fetched.data()[..fetched.size().min(32)]
                .iter()
                .take_while(|&&b| (0x20..0x7f).contains(&b))
                .map(|&b| b as char)
                .collect::<String>();
            println!(
                "{}: payload {} bytes, starts {:?}",
                fetched.path(),
                fetched.size(),
                preview
            );
            fetched.release();
            return 1;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}
