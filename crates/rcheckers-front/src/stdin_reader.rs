//! stdin reader thread
//!
//! Reads lines from stdin and forwards them through a channel so the
//! main loop can multiplex user input with everything else. The thread
//! ends when stdin closes or the receiving side goes away.

use std::io::BufRead;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use crossbeam_channel::Sender;

pub fn spawn_stdin_reader(tx: Sender<String>) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        log::error!("stdin read error: {e}");
                        break;
                    }
                }
            }
            log::debug!("stdin reader finished");
        })
        .context("failed to spawn stdin reader thread")
}
