use std::io::{self, BufRead};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use crossterm::event::{self, KeyEvent, KeyEventKind};
use tracing::debug;

/// How often the terminal thread checks whether the app has gone away.
const TERMINAL_POLL: Duration = Duration::from_millis(250);

pub enum Event {
    /// One input record, possibly malformed.
    Line(String),
    /// End of the input stream.
    InputClosed,
    Key(KeyEvent),
    Resize(u16, u16),
    /// No event within one frame interval.
    Tick,
}

pub struct EventHandler {
    tx: Sender<Event>,
    rx: mpsc::Receiver<Event>,
    tick_rate: Duration,
}

fn spawn_input_reader<R: BufRead + Send + 'static>(mut reader: R, tx: Sender<Event>) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    if tx.send(Event::Line(line)).is_err() {
                        return;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(error = %e, "input stream failed");
                    break;
                }
            }
        }
        let _ = tx.send(Event::InputClosed);
    });
}

/// Keys and resizes. Without a usable terminal the thread just ends, which
/// leaves the rest of the app running with those features off.
fn spawn_terminal_reader(tx: Sender<Event>) {
    thread::spawn(move || loop {
        match event::poll(TERMINAL_POLL) {
            Ok(true) => {
                let forwarded = match event::read() {
                    Ok(crossterm::event::Event::Key(key)) if key.kind == KeyEventKind::Press => {
                        tx.send(Event::Key(key))
                    }
                    Ok(crossterm::event::Event::Resize(cols, rows)) => {
                        tx.send(Event::Resize(cols, rows))
                    }
                    Ok(_) => Ok(()),
                    Err(e) => {
                        debug!(error = %e, "terminal events unavailable");
                        return;
                    }
                };
                if forwarded.is_err() {
                    return;
                }
            }
            Ok(false) => {}
            Err(e) => {
                debug!(error = %e, "terminal events unavailable");
                return;
            }
        }
    });
}

impl EventHandler {
    /// Read records from stdin and terminal events from the tty.
    pub fn new(tick_rate: Duration) -> Self {
        Self::from_reader(io::BufReader::new(io::stdin()), tick_rate).with_terminal_events()
    }

    /// Records from any reader; no terminal events.
    pub fn from_reader<R: BufRead + Send + 'static>(reader: R, tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        spawn_input_reader(reader, tx.clone());
        Self { tx, rx, tick_rate }
    }

    pub fn with_terminal_events(self) -> Self {
        spawn_terminal_reader(self.tx.clone());
        self
    }

    #[cfg(test)]
    pub fn sender(&self) -> Sender<Event> {
        self.tx.clone()
    }

    /// Blocks for at most one tick; a quiet stream yields `Event::Tick`.
    pub fn next(&self) -> Event {
        match self.rx.recv_timeout(self.tick_rate) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => Event::Tick,
            Err(RecvTimeoutError::Disconnected) => Event::InputClosed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn drain(handler: &EventHandler) -> Vec<Event> {
        let mut events = Vec::new();
        loop {
            let event = handler.next();
            let closed = matches!(event, Event::InputClosed);
            events.push(event);
            if closed {
                return events;
            }
        }
    }

    #[test]
    fn test_lines_then_close() {
        let input = Cursor::new(b"aa,-40,0\n\xff\xfe,-50,1\nbb,-60,0".to_vec());
        let handler = EventHandler::from_reader(input, Duration::from_millis(500));
        let lines: Vec<String> = drain(&handler)
            .into_iter()
            .filter_map(|e| match e {
                Event::Line(l) => Some(l),
                _ => None,
            })
            .collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "aa,-40,0\n");
        assert!(lines[1].ends_with(",-50,1\n"));
        assert_eq!(lines[2], "bb,-60,0");
    }

    #[cfg(unix)]
    #[test]
    fn test_quiet_stream_ticks() {
        let (reader, _writer) = std::os::unix::net::UnixStream::pair().unwrap();
        let handler = EventHandler::from_reader(io::BufReader::new(reader), Duration::from_millis(10));
        assert!(matches!(handler.next(), Event::Tick));
    }
}
