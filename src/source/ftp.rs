//! FTP transport for `ftp://` locators.
//!
//! Downloads use a passive-mode binary transfer on a fresh control
//! connection per locator:
//!
//! 1. `USER`/`PASS` (credentials from the locator, otherwise `anonymous`)
//! 2. `TYPE I`
//! 3. `EPSV` (falling back to `PASV` on IPv4), then connect the data channel
//! 4. `RETR <path>`
//!
//! The returned stream reads the data channel to its end, then checks the
//! transfer-complete reply on the control channel. Every read after `RETR`
//! is bounded by the read timeout.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use futures_util::StreamExt;
use futures_util::stream;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use super::constants::FTP_DEFAULT_PORT;
use super::{ByteStream, CHUNK_SIZE, StreamSource, TransportSettings};
use crate::error::FetchError;
use crate::locator::Locator;

const ANONYMOUS_USER: &str = "anonymous";
const ANONYMOUS_PASSWORD: &str = "anonymous@";

/// Passive-mode FTP download source.
#[derive(Debug, Clone, Copy)]
pub struct FtpSource {
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl FtpSource {
    /// Creates an FTP source.
    ///
    /// `connect_timeout_secs` bounds the whole session setup up to the `RETR`
    /// reply; `read_timeout_secs` bounds each data read and the completion reply.
    #[must_use]
    pub fn new(settings: TransportSettings) -> Self {
        Self {
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            read_timeout: Duration::from_secs(settings.read_timeout_secs),
        }
    }

    async fn start_transfer(&self, locator: &Locator) -> Result<Transfer, FetchError> {
        let url = locator.url();
        let host = url
            .host_str()
            .ok_or_else(|| FetchError::unreachable(locator.as_str(), "missing host"))?;
        let port = url.port().unwrap_or(FTP_DEFAULT_PORT);

        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| FetchError::unreachable(locator.as_str(), e))?;
        let peer_ip = stream
            .peer_addr()
            .map_err(|e| FetchError::unreachable(locator.as_str(), e))?
            .ip();
        let mut control = ControlConnection::new(stream, locator.to_string());

        control.expect_reply(&[220]).await?;
        control.login(url.username(), url.password()).await?;
        control.command("TYPE I", &[200]).await?;

        let data_port = control.passive_port(peer_ip).await?;
        // Only the advertised port is used; the data channel targets the control peer.
        let data_addr = SocketAddr::new(peer_ip, data_port);
        let data = TcpStream::connect(data_addr)
            .await
            .map_err(|e| FetchError::unreachable(locator.as_str(), e))?;
        debug!(%data_addr, "data channel connected");

        let path = retr_path(locator)?;
        control.command(&format!("RETR {path}"), &[125, 150]).await?;

        Ok(Transfer::Streaming {
            data,
            control,
            read_timeout: self.read_timeout,
        })
    }
}

#[async_trait]
impl StreamSource for FtpSource {
    #[instrument(skip(self), fields(locator = %locator))]
    async fn open(&self, locator: &Locator) -> Result<ByteStream, FetchError> {
        let transfer = tokio::time::timeout(self.connect_timeout, self.start_transfer(locator))
            .await
            .map_err(|_| FetchError::unreachable(locator.as_str(), "FTP session setup timed out"))??;
        Ok(transfer_stream(transfer))
    }
}

/// A parsed FTP server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Reply {
    code: u16,
    text: String,
}

struct ControlConnection {
    stream: BufReader<TcpStream>,
    locator: String,
}

impl ControlConnection {
    fn new(stream: TcpStream, locator: String) -> Self {
        Self {
            stream: BufReader::new(stream),
            locator,
        }
    }

    async fn login(&mut self, username: &str, password: Option<&str>) -> Result<(), FetchError> {
        let user = if username.is_empty() {
            ANONYMOUS_USER.to_string()
        } else {
            urlencoding::decode(username)
                .map_or_else(|_| username.to_string(), |u| u.into_owned())
        };
        let reply = self.command(&format!("USER {user}"), &[230, 331]).await?;
        if reply.code == 230 {
            return Ok(());
        }

        let password = password
            .map(|p| urlencoding::decode(p).map_or_else(|_| p.to_string(), |p| p.into_owned()))
            .unwrap_or_else(|| ANONYMOUS_PASSWORD.to_string());
        self.send(&format!("PASS {password}"), "PASS ****").await?;
        self.expect_reply(&[202, 230]).await?;
        Ok(())
    }

    /// Negotiates the passive data port.
    ///
    /// `EPSV` works over both address families; `PASV` is only tried on IPv4.
    async fn passive_port(&mut self, peer_ip: IpAddr) -> Result<u16, FetchError> {
        self.send("EPSV", "EPSV").await?;
        let reply = self
            .read_reply()
            .await
            .map_err(|e| FetchError::unreachable(self.locator.as_str(), e))?;
        if reply.code == 229 {
            return parse_epsv_port(&reply.text).ok_or_else(|| {
                FetchError::unreachable(
                    self.locator.as_str(),
                    format!("malformed EPSV reply: {}", reply.text),
                )
            });
        }
        if peer_ip.is_ipv6() {
            return Err(FetchError::unreachable(
                self.locator.as_str(),
                format!("FTP {} {} (EPSV required over IPv6)", reply.code, reply.text),
            ));
        }

        debug!(code = reply.code, "EPSV refused, falling back to PASV");
        let pasv = self.command("PASV", &[227]).await?;
        parse_pasv_port(&pasv.text).ok_or_else(|| {
            FetchError::unreachable(
                self.locator.as_str(),
                format!("malformed PASV reply: {}", pasv.text),
            )
        })
    }

    /// Sends a command and requires one of the `expected` reply codes.
    async fn command(&mut self, command: &str, expected: &[u16]) -> Result<Reply, FetchError> {
        self.send(command, command).await?;
        self.expect_reply(expected).await
    }

    async fn send(&mut self, command: &str, logged: &str) -> Result<(), FetchError> {
        debug!(command = logged, "ftp command");
        self.stream
            .get_mut()
            .write_all(format!("{command}\r\n").as_bytes())
            .await
            .map_err(|e| FetchError::unreachable(self.locator.as_str(), e))
    }

    async fn expect_reply(&mut self, expected: &[u16]) -> Result<Reply, FetchError> {
        let reply = self
            .read_reply()
            .await
            .map_err(|e| FetchError::unreachable(self.locator.as_str(), e))?;
        if expected.contains(&reply.code) {
            Ok(reply)
        } else {
            Err(FetchError::unreachable(
                self.locator.as_str(),
                format!("FTP {} {}", reply.code, reply.text),
            ))
        }
    }

    /// Reads one reply, following `NNN-` continuation lines to the final `NNN ` line.
    async fn read_reply(&mut self) -> io::Result<Reply> {
        let first = self.read_line().await?;
        let code = parse_reply_code(&first).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, format!("malformed FTP reply: {first}"))
        })?;

        let mut text = first.get(4..).unwrap_or_default().to_string();
        if first.as_bytes().get(3) == Some(&b'-') {
            let terminator = format!("{code} ");
            loop {
                let line = self.read_line().await?;
                if line.starts_with(&terminator) || line == code.to_string() {
                    text = line.get(4..).unwrap_or_default().to_string();
                    break;
                }
            }
        }

        Ok(Reply { code, text })
    }

    async fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        let read = self.stream.read_line(&mut line).await?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "control connection closed",
            ));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn quit(&mut self) {
        if self.send("QUIT", "QUIT").await.is_ok() {
            let _ = self.read_reply().await;
        }
    }
}

enum Transfer {
    Streaming {
        data: TcpStream,
        control: ControlConnection,
        read_timeout: Duration,
    },
    Done,
}

fn transfer_stream(transfer: Transfer) -> ByteStream {
    stream::unfold(transfer, |state| async move {
        let Transfer::Streaming {
            mut data,
            mut control,
            read_timeout,
        } = state
        else {
            return None;
        };

        let mut buffer = BytesMut::with_capacity(CHUNK_SIZE);
        let outcome = match timeout(read_timeout, data.read_buf(&mut buffer)).await {
            Ok(read) => read,
            Err(_) => {
                warn!(timeout_secs = read_timeout.as_secs(), "data channel stalled");
                return Some((Err(timed_out(&control)), Transfer::Done));
            }
        };

        match outcome {
            Ok(0) => {
                drop(data);
                finish_transfer(&mut control, read_timeout)
                    .await
                    .err()
                    .map(|error| (Err(error), Transfer::Done))
            }
            Ok(_) => Some((
                Ok(buffer.freeze()),
                Transfer::Streaming {
                    data,
                    control,
                    read_timeout,
                },
            )),
            Err(e) => {
                let error = FetchError::stream_read(control.locator.as_str(), e);
                Some((Err(error), Transfer::Done))
            }
        }
    })
    .boxed()
}

/// Reads the transfer-complete reply and closes the session.
async fn finish_transfer(
    control: &mut ControlConnection,
    read_timeout: Duration,
) -> Result<(), FetchError> {
    let reply = match timeout(read_timeout, control.read_reply()).await {
        Ok(Ok(reply)) => reply,
        Ok(Err(e)) => return Err(FetchError::stream_read(control.locator.as_str(), e)),
        Err(_) => {
            warn!(timeout_secs = read_timeout.as_secs(), "no transfer-complete reply");
            return Err(timed_out(control));
        }
    };

    if !matches!(reply.code, 226 | 250) {
        warn!(code = reply.code, text = %reply.text, "transfer failed");
        return Err(FetchError::stream_read(
            control.locator.as_str(),
            format!("FTP {} {}", reply.code, reply.text),
        ));
    }

    debug!(code = reply.code, "transfer complete");
    let _ = timeout(read_timeout, control.quit()).await;
    Ok(())
}

fn timed_out(control: &ControlConnection) -> FetchError {
    FetchError::stream_read(control.locator.as_str(), "FTP transfer timed out")
}

fn parse_reply_code(line: &str) -> Option<u16> {
    let digits = line.get(..3)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match line.as_bytes().get(3) {
        None | Some(b' ' | b'-') => digits.parse().ok(),
        Some(_) => None,
    }
}

/// Extracts the data port from a `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)` reply.
fn parse_pasv_port(text: &str) -> Option<u16> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let fields: Vec<u8> = text[start..]
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .take(6)
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    if fields.len() != 6 {
        return None;
    }
    Some((u16::from(fields[4]) << 8) | u16::from(fields[5]))
}

/// Extracts the data port from a `229 Entering Extended Passive Mode (|||port|)` reply.
fn parse_epsv_port(text: &str) -> Option<u16> {
    let inner = text.get(text.find('(')? + 1..text.rfind(')')?)?;
    let delimiter = inner.chars().next()?;
    let port: u16 = inner.split(delimiter).nth(3)?.parse().ok()?;
    (port != 0).then_some(port)
}

/// Path sent with `RETR`: the URL path without its leading slash, percent-decoded.
fn retr_path(locator: &Locator) -> Result<String, FetchError> {
    let raw = locator.url().path().trim_start_matches('/');
    if raw.is_empty() {
        return Err(FetchError::unreachable(locator.as_str(), "missing file path"));
    }
    urlencoding::decode(raw)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| FetchError::unreachable(locator.as_str(), e))
}
