//! Ctrl+C handling for the command-line tools.
//!
//! The first interrupt cancels whatever move or sweep is running, which then
//! stops at its next tick and releases every relay. A second interrupt exits.
use std::io;
use std::process;
use std::thread;

use log::{info, warn};
use tokio::runtime;

use crate::controller::CancelToken;

/// Exit status a shell reports for a process ended by SIGINT.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Interrupt {
    Cancel,
    Exit,
}

/// Listens for Ctrl+C on a background thread and cancels `token` when it arrives.
pub fn cancel_on_interrupt(token: CancelToken) -> io::Result<()> {
    let rt = runtime::Builder::new_current_thread().enable_all().build()?;

    thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            rt.block_on(async {
                let mut count: u32 = 0;
                loop {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!("Failed to listen for Ctrl+C: {}", e);
                        return;
                    }
                    count += 1;
                    if on_interrupt(&token, count) == Interrupt::Exit {
                        process::exit(INTERRUPTED_EXIT_CODE);
                    }
                }
            });
        })?;

    Ok(())
}

fn on_interrupt(token: &CancelToken, count: u32) -> Interrupt {
    if count == 1 {
        info!("Received Ctrl+C, stopping. Press Ctrl+C again to exit immediately");
        token.cancel();
        Interrupt::Cancel
    } else {
        warn!("Received Ctrl+C again, exiting");
        Interrupt::Exit
    }
}
