//! Single-character commands from the serial console.

use std::io::{self, ErrorKind, Read};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use log::*;

use crate::playback::CommandSource;

/// Back-off while a non-blocking stdin has nothing buffered.
const IDLE_READ: Duration = Duration::from_millis(20);

/// Starts a thread that forwards every non-whitespace character read from
/// stdin. The channel closes when stdin does.
pub fn spawn_console() -> io::Result<Receiver<char>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("console".into())
        .stack_size(4096)
        .spawn(move || forward(io::stdin().lock(), tx))?;
    Ok(rx)
}

fn forward(mut input: impl Read, tx: Sender<char>) {
    let mut buf = [0u8; 64];
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            // the UART VFS without a driver reports an empty FIFO this way
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                thread::sleep(IDLE_READ);
                continue;
            }
            Err(e) => {
                warn!("Console read failed: {}", e);
                break;
            }
        };
        let symbols = buf[..n].iter().map(|b| char::from(*b)).filter(|c| !c.is_whitespace());
        for symbol in symbols {
            if tx.send(symbol).is_err() {
                return;
            }
        }
    }
    info!("Console input closed");
}

impl CommandSource for Receiver<char> {
    fn poll(&mut self) -> Option<char> {
        match self.try_recv() {
            Ok(symbol) => Some(symbol),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    fn next(&mut self) -> Option<char> {
        self.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn whitespace_is_skipped() {
        let (tx, mut rx) = mpsc::channel();
        forward(Cursor::new("c\n n  p\r\nq"), tx);

        let mut seen = Vec::new();
        while let Some(symbol) = CommandSource::next(&mut rx) {
            seen.push(symbol);
        }
        assert_eq!(seen, vec!['c', 'n', 'p', 'q']);
    }

    /// A stdin with an empty FIFO for the first few reads.
    struct Idle<'a> {
        empty_reads: usize,
        data: &'a [u8],
    }

    impl Read for Idle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.empty_reads > 0 {
                self.empty_reads -= 1;
                return Err(io::Error::new(ErrorKind::WouldBlock, "fifo empty"));
            }
            self.data.read(buf)
        }
    }

    #[test]
    fn empty_reads_do_not_close_the_console() {
        let (tx, mut rx) = mpsc::channel();
        forward(
            Idle {
                empty_reads: 3,
                data: b"c\n",
            },
            tx,
        );

        assert_eq!(CommandSource::next(&mut rx), Some('c'));
        assert_eq!(CommandSource::next(&mut rx), None);
    }

    #[test]
    fn poll_does_not_block() {
        let (tx, mut rx) = mpsc::channel::<char>();
        assert_eq!(rx.poll(), None);
        tx.send('s').unwrap();
        assert_eq!(rx.poll(), Some('s'));
        drop(tx);
        assert_eq!(rx.poll(), None);
    }
}
