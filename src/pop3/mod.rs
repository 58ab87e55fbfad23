//! Minimal blocking POP3 client (RFC 1939): greeting, USER/PASS, STAT,
//! LIST, RETR and QUIT over plain TCP or TLS.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use native_tls::{TlsConnector, TlsStream};

use crate::config::Pop3Config;
use crate::error::{BackupError, Result};

/// One entry of a LIST reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageInfo {
    /// Message number, 1-based, valid for this session only.
    pub id: u32,
    /// Size in octets as reported by the server.
    pub size: u64,
}

/// Something messages can be drawn from: a live POP3 session, or a
/// canned list in tests.
pub trait MessageSource {
    /// Message count and total size in octets.
    fn stat(&mut self) -> Result<(usize, u64)>;
    /// Every message number with its size.
    fn list(&mut self) -> Result<Vec<MessageInfo>>;
    /// The full raw message, line endings preserved.
    fn retrieve(&mut self, id: u32) -> Result<Vec<u8>>;
}

/// Transport under a [`Pop3Client`].
pub enum Stream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Stream::Plain(s) => s.read(buf),
            Stream::Tls(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Stream::Plain(s) => s.write(buf),
            Stream::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Stream::Plain(s) => s.flush(),
            Stream::Tls(s) => s.flush(),
        }
    }
}

/// Open a session to the configured server and read its greeting.
///
/// Does not authenticate; call [`Pop3Client::login`] next.
pub fn connect(config: &Pop3Config) -> Result<Pop3Client<Stream>> {
    let connect_err = |source| BackupError::Connect {
        host: config.host.clone(),
        port: config.port,
        source,
    };

    let timeout = Duration::from_secs(config.timeout_secs.max(1));
    let addr = (config.host.as_str(), config.port)
        .to_socket_addrs()
        .map_err(connect_err)?
        .next()
        .ok_or_else(|| {
            connect_err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "host did not resolve",
            ))
        })?;

    tracing::debug!(host = %config.host, port = config.port, tls = config.tls, "Connecting");
    let tcp = TcpStream::connect_timeout(&addr, timeout).map_err(connect_err)?;
    tcp.set_read_timeout(Some(timeout)).map_err(connect_err)?;
    tcp.set_write_timeout(Some(timeout)).map_err(connect_err)?;

    let stream = if config.tls {
        let connector = TlsConnector::new().map_err(|e| BackupError::Tls(e.to_string()))?;
        let tls = connector
            .connect(&config.host, tcp)
            .map_err(|e| BackupError::Tls(e.to_string()))?;
        Stream::Tls(Box::new(tls))
    } else {
        Stream::Plain(tcp)
    };

    Pop3Client::new(stream)
}

/// A POP3 session over any byte stream.
pub struct Pop3Client<S: Read + Write> {
    stream: BufReader<S>,
    greeting: String,
}

impl<S: Read + Write> Pop3Client<S> {
    /// Wrap `stream` and consume the server greeting.
    pub fn new(stream: S) -> Result<Self> {
        let mut client = Self {
            stream: BufReader::new(stream),
            greeting: String::new(),
        };
        client.greeting = client.read_status("greeting")?;
        tracing::debug!(greeting = %client.greeting, "Server ready");
        Ok(client)
    }

    /// Text after `+OK` in the greeting.
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// Authenticate with USER/PASS.
    pub fn login(&mut self, username: &str, password: &str) -> Result<()> {
        self.command(&format!("USER {username}"), "USER")?;
        self.command(&format!("PASS {password}"), "PASS")?;
        tracing::info!(user = %username, "Logged in");
        Ok(())
    }

    /// End the session. The server commits deletions only on QUIT.
    pub fn quit(mut self) -> Result<()> {
        self.command("QUIT", "QUIT")?;
        Ok(())
    }

    /// Send one command and return the status text after `+OK`.
    ///
    /// `label` stands in for the command in logs and errors, so arguments
    /// such as the password never leave this function.
    fn command(&mut self, line: &str, label: &str) -> Result<String> {
        tracing::trace!(command = %label, "POP3 >");
        let stream = self.stream.get_mut();
        stream.write_all(line.as_bytes())?;
        stream.write_all(b"\r\n")?;
        stream.flush()?;
        self.read_status(label)
    }

    fn read_status(&mut self, label: &str) -> Result<String> {
        let mut raw = Vec::new();
        if self.stream.read_until(b'\n', &mut raw)? == 0 {
            return Err(BackupError::Protocol(format!(
                "connection closed while waiting for {label} reply"
            )));
        }
        let line = String::from_utf8_lossy(&raw);
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(rest) = line.strip_prefix("+OK") {
            Ok(rest.trim_start().to_string())
        } else if line.starts_with("-ERR") {
            Err(BackupError::Pop3 {
                command: label.to_string(),
                response: line.to_string(),
            })
        } else {
            Err(BackupError::Protocol(format!(
                "unexpected reply to {label}: {line}"
            )))
        }
    }

    /// Read a dot-terminated multi-line block, undoing byte-stuffing.
    /// Line endings are kept as sent.
    fn read_multiline(&mut self, label: &str) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut line = Vec::new();
        loop {
            line.clear();
            if self.stream.read_until(b'\n', &mut line)? == 0 {
                return Err(BackupError::Protocol(format!(
                    "connection closed inside {label} data"
                )));
            }
            if line == b".\r\n" || line == b".\n" {
                return Ok(data);
            }
            let content = if line.starts_with(b"..") {
                &line[1..]
            } else {
                &line[..]
            };
            data.extend_from_slice(content);
        }
    }
}

impl<S: Read + Write> MessageSource for Pop3Client<S> {
    fn stat(&mut self) -> Result<(usize, u64)> {
        let status = self.command("STAT", "STAT")?;
        let mut fields = status.split_whitespace();
        let parsed = (
            fields.next().and_then(|n| n.parse().ok()),
            fields.next().and_then(|n| n.parse().ok()),
        );
        match parsed {
            (Some(count), Some(size)) => Ok((count, size)),
            _ => Err(BackupError::Protocol(format!("malformed STAT reply: {status}"))),
        }
    }

    fn list(&mut self) -> Result<Vec<MessageInfo>> {
        self.command("LIST", "LIST")?;
        let data = self.read_multiline("LIST")?;
        String::from_utf8_lossy(&data)
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(parse_list_line)
            .collect()
    }

    fn retrieve(&mut self, id: u32) -> Result<Vec<u8>> {
        let label = format!("RETR {id}");
        self.command(&label, &label)?;
        let data = self.read_multiline(&label)?;
        tracing::debug!(id, bytes = data.len(), "Retrieved message");
        Ok(data)
    }
}

fn parse_list_line(line: &str) -> Result<MessageInfo> {
    let mut fields = line.split_whitespace();
    let id = fields.next().and_then(|n| n.parse().ok());
    let size = fields.next().and_then(|n| n.parse().ok());
    match (id, size) {
        (Some(id), Some(size)) => Ok(MessageInfo { id, size }),
        _ => Err(BackupError::Protocol(format!("malformed LIST line: {line}"))),
    }
}
