//! Test chat client.
//!
//! Speaks the line protocol over a real TCP connection and offers helpers
//! for the login dialogue and for waiting on specific lines.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

/// Default wait for a single line.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A test chat client.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl TestClient {
    /// Connect to a test server.
    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        })
    }

    /// Send one line.
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Send raw bytes as-is, with no terminator added.
    pub async fn send_bytes(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Receive one line with trailing whitespace removed.
    pub async fn recv(&mut self) -> anyhow::Result<String> {
        self.recv_timeout(RECV_TIMEOUT).await
    }

    /// Receive one line, failing after `dur` or on EOF.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<String> {
        let mut line = String::new();
        let n = timeout(dur, self.reader.read_line(&mut line)).await??;
        if n == 0 {
            anyhow::bail!("connection closed");
        }
        Ok(line.trim_end().to_string())
    }

    /// Receive lines until `predicate` matches; returns everything read.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<String>>
    where
        F: FnMut(&str) -> bool,
    {
        let mut lines = Vec::new();
        loop {
            let line = self.recv().await?;
            let done = predicate(&line);
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }

    /// Wait for an exact line.
    pub async fn expect(&mut self, expected: &str) -> anyhow::Result<Vec<String>> {
        self.recv_until(|l| l == expected).await
    }

    /// Wait until the server closes the connection, returning the lines read.
    pub async fn recv_until_closed(&mut self, dur: Duration) -> anyhow::Result<Vec<String>> {
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            let n = timeout(dur, self.reader.read_line(&mut line)).await??;
            if n == 0 {
                return Ok(lines);
            }
            lines.push(line.trim_end().to_string());
        }
    }

    /// Run the login dialogue. Returns the nickname the server assigned.
    pub async fn login(&mut self, username: &str, password: &str) -> anyhow::Result<String> {
        let banner = self.recv().await?;
        if !banner.ends_with("Please enter your username:") {
            anyhow::bail!("unexpected banner: {banner}");
        }
        self.send_raw(username).await?;
        self.expect("Please enter your password:").await?;
        self.send_raw(password).await?;

        let line = self.recv().await?;
        let Some(rest) = line.strip_prefix("Welcome to ") else {
            anyhow::bail!("login failed: {line}");
        };
        let nick = rest
            .split("You are now known as ")
            .nth(1)
            .and_then(|n| n.strip_suffix('.'))
            .ok_or_else(|| anyhow::anyhow!("unexpected welcome: {line}"))?
            .to_string();

        // Our own join notice.
        self.expect(&format!("{nick} has joined the chat")).await?;
        Ok(nick)
    }
}
