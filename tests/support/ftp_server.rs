//! Minimal passive-mode FTP server on localhost for transport tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// How the server ends a `RETR` after the data has been sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// `226 Transfer complete`.
    Complete,
    /// `426 Connection closed; transfer aborted`.
    Aborted,
    /// Sends nothing on the open data channel and never replies.
    Stall,
}

pub struct FakeFtpServer {
    addr: SocketAddr,
    users: Arc<Mutex<Vec<String>>>,
    verbs: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

#[derive(Clone)]
struct Session {
    files: Arc<HashMap<String, Vec<u8>>>,
    users: Arc<Mutex<Vec<String>>>,
    verbs: Arc<Mutex<Vec<String>>>,
    completion: Completion,
    epsv: bool,
}

impl FakeFtpServer {
    /// Serves `files` (keyed by path without leading slash) until dropped.
    ///
    /// `EPSV` is refused, so clients must fall back to `PASV`.
    pub async fn start(files: &[(&str, &str)], completion: Completion) -> Self {
        Self::spawn(files, completion, false).await
    }

    /// Like [`start`](Self::start), but also answers `EPSV`.
    pub async fn start_with_epsv(files: &[(&str, &str)], completion: Completion) -> Self {
        Self::spawn(files, completion, true).await
    }

    async fn spawn(files: &[(&str, &str)], completion: Completion, epsv: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake ftp listener");
        let addr = listener.local_addr().expect("listener address");
        let files: Arc<HashMap<String, Vec<u8>>> = Arc::new(
            files
                .iter()
                .map(|(path, body)| ((*path).to_string(), body.as_bytes().to_vec()))
                .collect(),
        );
        let users = Arc::new(Mutex::new(Vec::new()));
        let verbs = Arc::new(Mutex::new(Vec::new()));
        let session = Session {
            files,
            users: Arc::clone(&users),
            verbs: Arc::clone(&verbs),
            completion,
            epsv,
        };

        let task = tokio::spawn(async move {
            while let Ok((control, _)) = listener.accept().await {
                let session = session.clone();
                tokio::spawn(async move {
                    let _ = serve_session(control, &session).await;
                });
            }
        });

        Self {
            addr,
            users,
            verbs,
            task,
        }
    }

    /// Builds an `ftp://` locator string for `path` on this server.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("ftp://{}/{path}", self.addr)
    }

    /// Builds an `ftp://` locator string with credentials.
    #[must_use]
    pub fn url_with_credentials(&self, user: &str, password: &str, path: &str) -> String {
        format!("ftp://{user}:{password}@{}/{path}", self.addr)
    }

    /// User names received by `USER`, in order.
    #[must_use]
    pub fn users(&self) -> Vec<String> {
        self.users.lock().expect("users lock").clone()
    }

    /// Command verbs received, in order, across all sessions.
    #[must_use]
    pub fn verbs(&self) -> Vec<String> {
        self.verbs.lock().expect("verbs lock").clone()
    }
}

impl Drop for FakeFtpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_session(control: TcpStream, session: &Session) -> std::io::Result<()> {
    let (read_half, mut write_half) = control.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let mut passive: Option<TcpListener> = None;

    write_half
        .write_all(b"220-fake ftp\r\n220 ready\r\n")
        .await?;

    while let Some(line) = lines.next_line().await? {
        let (verb, argument) = line.split_once(' ').unwrap_or((line.as_str(), ""));
        session.verbs.lock().expect("verbs lock").push(verb.to_string());
        match verb {
            "USER" => {
                session.users.lock().expect("users lock").push(argument.to_string());
                write_half.write_all(b"331 password required\r\n").await?;
            }
            "PASS" => write_half.write_all(b"230 logged in\r\n").await?,
            "TYPE" => write_half.write_all(b"200 type set\r\n").await?,
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await?;
                let port = listener.local_addr()?.port();
                passive = Some(listener);
                let reply = format!(
                    "227 Entering Passive Mode (127,0,0,1,{},{})\r\n",
                    port >> 8,
                    port & 0xFF
                );
                write_half.write_all(reply.as_bytes()).await?;
            }
            "EPSV" if session.epsv => {
                let listener = TcpListener::bind("127.0.0.1:0").await?;
                let port = listener.local_addr()?.port();
                passive = Some(listener);
                let reply = format!("229 Entering Extended Passive Mode (|||{port}|)\r\n");
                write_half.write_all(reply.as_bytes()).await?;
            }
            "RETR" => {
                let Some(body) = session.files.get(argument) else {
                    passive = None;
                    write_half.write_all(b"550 file not found\r\n").await?;
                    continue;
                };
                let Some(listener) = passive.take() else {
                    write_half.write_all(b"425 use PASV first\r\n").await?;
                    continue;
                };
                write_half.write_all(b"150 opening data connection\r\n").await?;
                let (mut data, _) = listener.accept().await?;
                if session.completion == Completion::Stall {
                    // Hold the data channel open until the client gives up.
                    let mut sink = [0u8; 1];
                    let _ = data.read(&mut sink).await;
                    return Ok(());
                }
                data.write_all(body).await?;
                data.shutdown().await?;
                drop(data);
                match session.completion {
                    Completion::Complete => {
                        write_half.write_all(b"226 transfer complete\r\n").await?;
                    }
                    Completion::Aborted => {
                        write_half
                            .write_all(b"426 connection closed; transfer aborted\r\n")
                            .await?;
                    }
                    Completion::Stall => {}
                }
            }
            "QUIT" => {
                write_half.write_all(b"221 bye\r\n").await?;
                break;
            }
            _ => write_half.write_all(b"502 not implemented\r\n").await?,
        }
    }
    Ok(())
}
