//! Cancellable periodic timer backed by a dedicated thread.

use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Sender, bounded, select, tick};

/// Runs `callback` every `interval` until stopped or dropped.
pub struct PeriodicTimer {
    interval: Duration,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTimer {
    pub fn start<F>(interval: Duration, mut callback: F) -> std::io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ticker = tick(interval);

        let handle = std::thread::Builder::new()
            .name("transport-clock".into())
            .spawn(move || {
                loop {
                    select! {
                        recv(ticker) -> _ => callback(),
                        // Fires on an explicit stop and when the sender is dropped.
                        recv(stop_rx) -> _ => break,
                    }
                }
            })?;

        Ok(Self {
            interval,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop the timer and wait for the worker thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::error!("Transport clock thread panicked");
        }
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
