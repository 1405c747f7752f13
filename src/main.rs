use pulse_runner::{core, signals, status::ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};

/// Installs the Ctrl+C handler and hands over to `core::run`
fn main() -> ExitStatus {
    // The first Ctrl+C lets the request in flight finish and the reports
    // get written; the second one exits immediately
    ctrlc::set_handler(move || {
        static ALREADY_INTERRUPTED: AtomicBool = AtomicBool::new(false);
        if ALREADY_INTERRUPTED.swap(true, Ordering::SeqCst) {
            std::process::exit(ExitStatus::Interrupted.code());
        }
        signals::set_interrupted();
        eprintln!("\nInterrupted, finishing the current request");
    })
    .ok();

    let status = core::run(std::env::args().collect());
    if signals::was_interrupted() {
        ExitStatus::Interrupted
    } else {
        status
    }
}
