use std::io::{stdout, Write};

use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use futures_util::{Stream, StreamExt};
use tokio::task::JoinHandle;

use crate::download::progress::{ProgressEvent, ProgressSnapshot};

/// Single status line on stdout, redrawn in place.
///
/// Drawing is best effort: when stdout is gone or not a terminal the errors
/// are swallowed and the download carries on.
pub struct ProgressBar {
    buf: String,
    drawn: bool,
}

impl ProgressBar {
    pub fn new() -> Self {
        Self { buf: String::new(), drawn: false }
    }

    /// Draw every event of `events` until the stream ends.
    pub fn spawn(events: impl Stream<Item = ProgressEvent> + Send + 'static) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut bar = ProgressBar::new();
            let mut events = Box::pin(events);

            while let Some(event) = events.next().await {
                bar.print(&event);
            }
            bar.finish_line();
        })
    }

    pub fn print(&mut self, event: &ProgressEvent) {
        self.buf.clear();
        if !status_line(event, &mut self.buf) {
            return;
        }

        let mut out = stdout();
        let _ = queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine), Print(&self.buf));
        let _ = out.flush();
        self.drawn = true;
    }

    /// Move below the status line so the next message starts on a fresh line.
    pub fn finish_line(&mut self) {
        if self.drawn {
            let mut out = stdout();
            let _ = writeln!(out);
            let _ = out.flush();
            self.drawn = false;
        }
    }

    /// Human readable size, e.g. `(1.50, "MB")`.
    pub fn byte_unit(bytes_count: u64) -> (f32, &'static str) {
        const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

        let mut i = 0;
        let mut bytes_count = bytes_count as f32;
        while bytes_count >= 1024.0 && i < UNITS.len() - 1 {
            i += 1;
            bytes_count /= 1024.0;
        }
        (bytes_count, UNITS[i])
    }
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self::new()
    }
}

/// Render `event` into `buf`. Returns `false` when there is nothing to show.
pub fn status_line(event: &ProgressEvent, buf: &mut String) -> bool {
    use std::fmt::Write;

    match event {
        ProgressEvent::Idle => false,
        ProgressEvent::Preallocating { written, total } => {
            let pct = if *total == 0 { 100.0 } else { 100.0 * *written as f64 / *total as f64 };
            write!(buf, "Preallocating... {pct:.2}%").is_ok()
        }
        ProgressEvent::Transferring(snapshot) | ProgressEvent::Finished(snapshot) => {
            transfer_line(snapshot, buf)
        }
    }
}

fn transfer_line(snapshot: &ProgressSnapshot, buf: &mut String) -> bool {
    use std::fmt::Write;

    write!(
        buf,
        "{:.2}% ({:.3} MiB) @ {:.3} MiB/s, {:.2}% buffer usage",
        snapshot.percentage(),
        snapshot.mib_transferred(),
        snapshot.rate_mib_per_sec(),
        snapshot.queue_occupancy(),
    )
    .is_ok()
}
