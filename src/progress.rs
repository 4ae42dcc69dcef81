//! Terminal spinner shown while a restart cycle waits on the journal.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const FRAMES: [&str; 8] = ["⢿", "⣻", "⣽", "⣾", "⣷", "⣯", "⣟", "⡿"];
const FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Animates `desc` plus a spinner frame on stdout until stopped.
/// Display only; measurements never pass through here.
pub struct Spinner {
    desc: String,
    done: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Spinner {
    pub fn start(desc: impl Into<String>) -> Self {
        let desc = desc.into();
        let done = Arc::new(AtomicBool::new(false));
        let handle = {
            let desc = desc.clone();
            let done = Arc::clone(&done);
            thread::Builder::new()
                .name("progress".to_string())
                .spawn(move || {
                    for frame in FRAMES.iter().cycle() {
                        if done.load(Ordering::Relaxed) {
                            break;
                        }
                        print!("\r{desc} {frame}");
                        let _ = io::stdout().flush();
                        thread::sleep(FRAME_INTERVAL);
                    }
                })
                .ok()
        };
        Self { desc, done, handle }
    }

    /// Stops the animation and replaces the spinner line with `end`.
    pub fn stop(mut self, end: &str) {
        self.finish();
        print!("\r{:width$}\r", "", width = self.desc.chars().count() + 2);
        println!("{} {}", self.desc, end);
        let _ = io::stdout().flush();
    }

    fn finish(&mut self) {
        self.done.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.finish();
    }
}
