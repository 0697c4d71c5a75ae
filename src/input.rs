use std::io::BufRead;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, warn};

const HISTORY_LEN: usize = 20;

/// Console lines read on a background thread, polled once per tick.
pub struct CommandInput {
    thread_stopper: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
    line_receiver: Receiver<String>,
    history: Vec<String>,
}

impl Drop for CommandInput {
    fn drop(&mut self) {
        if self.thread_stopper.send(()).is_err() {
            debug!("Input thread already stopped");
        }
        // A thread blocked on stdin is left to exit with the process
        if let Some(handle) = self.thread_handle.take().filter(|h| h.is_finished()) {
            let _ = handle.join();
        }
    }
}

impl CommandInput {
    pub fn stdin() -> Self {
        Self::from_reader(std::io::BufReader::new(std::io::stdin()))
    }

    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        let (stop_tx, stop_rx) = unbounded::<()>();
        let (line_tx, line_rx) = unbounded();
        let handle = std::thread::spawn(move || {
            for line in reader.lines() {
                if stop_rx.try_recv().is_ok() {
                    break;
                }
                match line {
                    Ok(line) if line.trim().is_empty() => continue,
                    Ok(line) => {
                        if line_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Console input closed: {e}");
                        break;
                    }
                }
            }
            debug!("Input thread stopped");
        });
        Self {
            thread_stopper: stop_tx,
            thread_handle: Some(handle),
            line_receiver: line_rx,
            history: Vec::new(),
        }
    }

    fn remember(&mut self, line: &str) {
        self.history.push(line.to_string());
        if self.history.len() > HISTORY_LEN {
            self.history.remove(0);
        }
    }

    /// Every line received since the last call, without blocking.
    pub fn drain(&mut self) -> Vec<String> {
        let lines: Vec<String> = self.line_receiver.try_iter().collect();
        lines.iter().for_each(|l| self.remember(l));
        lines
    }

    pub fn wait_line(&mut self, timeout: Duration) -> Option<String> {
        let line = self.line_receiver.recv_timeout(timeout).ok()?;
        self.remember(&line);
        Some(line)
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn lines_arrive_in_order_and_blank_lines_are_skipped() {
        let mut input = CommandInput::from_reader(Cursor::new("fx 1 on\n\n  \nlist\n"));
        let timeout = Duration::from_secs(2);
        assert_eq!(input.wait_line(timeout).as_deref(), Some("fx 1 on"));
        assert_eq!(input.wait_line(timeout).as_deref(), Some("list"));
        assert_eq!(input.wait_line(Duration::from_millis(50)), None);
        assert_eq!(input.history(), ["fx 1 on", "list"]);
    }

    #[test]
    fn history_is_bounded() {
        let text: String = (0..30).map(|i| format!("fx {i} on\n")).collect();
        let mut input = CommandInput::from_reader(Cursor::new(text));
        for _ in 0..30 {
            input.wait_line(Duration::from_secs(2));
        }
        assert_eq!(input.history().len(), HISTORY_LEN);
        assert_eq!(input.history()[0], "fx 10 on");
        assert!(input.drain().is_empty());
    }
}
