//! One TCP link to another peer.
//!
//! Each connection runs two tasks. The reader turns incoming lines into
//! [`NetEvent`]s for the node and reports when the link closes. The writer
//! drains a queue of encoded lines so that sending never blocks the game loop.

use crate::network::NetEvent;
use crate::session::ConnId;
use log::{debug, error, warn};
use shared::Message;
use std::net::SocketAddr;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, OwnedSemaphorePermit};
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug)]
pub struct Connection {
    pub id: ConnId,
    pub addr: SocketAddr,
    pub opened_at: Instant,
    outgoing: mpsc::UnboundedSender<String>,
    reader: JoinHandle<()>,
    /// Held for as long as the connection counts against the host's capacity.
    _permit: Option<OwnedSemaphorePermit>,
}

impl Connection {
    /// Splits `stream` and starts its reader and writer tasks.
    pub fn spawn(
        id: ConnId,
        stream: TcpStream,
        addr: SocketAddr,
        permit: Option<OwnedSemaphorePermit>,
        events: mpsc::UnboundedSender<NetEvent>,
    ) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle on connection {}: {}", id, e);
        }
        let (read_half, write_half) = stream.into_split();
        let (outgoing, queue) = mpsc::unbounded_channel();

        let reader = tokio::spawn(read_lines(id, read_half, events.clone()));
        tokio::spawn(write_lines(id, write_half, queue, events));

        Self {
            id,
            addr,
            opened_at: Instant::now(),
            outgoing,
            reader,
            _permit: permit,
        }
    }

    /// Queues `message` for sending. Returns false if the writer has stopped.
    pub fn send(&self, message: &Message) -> bool {
        self.send_line(message.encode())
    }

    pub fn send_line(&self, line: String) -> bool {
        self.outgoing.send(line).is_ok()
    }
}

impl Drop for Connection {
    // The writer flushes what is queued and exits once the sender is gone.
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Longest line accepted from a peer, newline included.
const MAX_LINE_BYTES: u64 = 64 * 1024;

async fn read_lines<R>(id: ConnId, read_half: R, events: mpsc::UnboundedSender<NetEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::new();
    // Set while the rest of an oversized line is skipped.
    let mut discarding = false;

    loop {
        buf.clear();
        match (&mut reader)
            .take(MAX_LINE_BYTES)
            .read_until(b'\n', &mut buf)
            .await
        {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                error!("Read error on connection {}: {}", id, e);
                break;
            }
        }

        let complete = buf.last() == Some(&b'\n');
        if discarding {
            discarding = !complete;
            continue;
        }
        if !complete && buf.len() as u64 >= MAX_LINE_BYTES {
            warn!("Dropping oversized line from connection {}", id);
            discarding = true;
            continue;
        }

        let Ok(line) = std::str::from_utf8(&buf) else {
            warn!("Dropping line from connection {}: not UTF-8", id);
            continue;
        };
        if line.trim().is_empty() {
            continue;
        }
        match Message::decode(line) {
            Ok(message) => {
                if events.send(NetEvent::Line { conn: id, message }).is_err() {
                    return;
                }
            }
            Err(e) => warn!("Dropping line from connection {}: {} ({:?})", id, e, line.trim_end()),
        }
    }

    debug!("Connection {} closed by peer", id);
    if events.send(NetEvent::Closed { conn: id }).is_err() {
        debug!("Node gone before connection {} closed", id);
    }
}

async fn write_lines<W>(
    id: ConnId,
    mut write_half: W,
    mut queue: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<NetEvent>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(mut line) = queue.recv().await {
        line.push('\n');
        if let Err(e) = write_half.write_all(line.as_bytes()).await {
            error!("Write error on connection {}: {}", id, e);
            if events.send(NetEvent::Closed { conn: id }).is_err() {
                debug!("Node gone before connection {} failed", id);
            }
            return;
        }
    }
    if let Err(e) = write_half.shutdown().await {
        debug!("Shutdown of connection {} failed: {}", id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<NetEvent>) -> NetEvent {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_reader_skips_non_utf8_lines() {
        let input = tokio_test::io::Builder::new()
            .read(b"\xff\xfe\n1 4\n")
            .build();
        let (tx, mut rx) = mpsc::unbounded_channel();

        read_lines(5, input, tx).await;

        match next_event(&mut rx).await {
            NetEvent::Line { conn, message } => {
                assert_eq!(conn, 5);
                assert_eq!(message, Message::Level { level: 4 });
            }
            other => panic!("Unexpected event {:?}", other),
        }
        assert!(matches!(next_event(&mut rx).await, NetEvent::Closed { conn: 5 }));
    }

    #[tokio::test]
    async fn test_reader_skips_oversized_lines() {
        let mut long = vec![b'7'; MAX_LINE_BYTES as usize * 2];
        long.extend_from_slice(b"\n1 2\n");
        let input = tokio_test::io::Builder::new().read(&long).build();
        let (tx, mut rx) = mpsc::unbounded_channel();

        read_lines(6, input, tx).await;

        match next_event(&mut rx).await {
            NetEvent::Line { message, .. } => assert_eq!(message, Message::Level { level: 2 }),
            other => panic!("Unexpected event {:?}", other),
        }
        assert!(matches!(next_event(&mut rx).await, NetEvent::Closed { conn: 6 }));
    }

    #[tokio::test]
    async fn test_reader_accepts_last_line_without_newline() {
        let input = tokio_test::io::Builder::new().read(b"0 true true").build();
        let (tx, mut rx) = mpsc::unbounded_channel();

        read_lines(2, input, tx).await;

        match next_event(&mut rx).await {
            NetEvent::Line { message, .. } => assert_eq!(
                message,
                Message::Game {
                    started: true,
                    paused: true
                }
            ),
            other => panic!("Unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_writer_reports_failed_link() {
        let output = tokio_test::io::Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (outgoing, queue) = mpsc::unbounded_channel();

        outgoing.send("1 3".to_string()).unwrap();
        write_lines(8, output, queue, tx).await;

        assert!(matches!(next_event(&mut rx).await, NetEvent::Closed { conn: 8 }));
    }

    #[tokio::test]
    async fn test_writer_terminates_each_line() {
        let output = tokio_test::io::Builder::new()
            .write(b"1 3\n")
            .write(b"0 false false\n")
            .build();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (outgoing, queue) = mpsc::unbounded_channel();

        outgoing.send("1 3".to_string()).unwrap();
        outgoing.send("0 false false".to_string()).unwrap();
        drop(outgoing);
        write_lines(9, output, queue, tx).await;

        assert!(rx.try_recv().is_err());
    }
}
