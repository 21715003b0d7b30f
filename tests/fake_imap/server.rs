//! In-process IMAP server speaking just enough of RFC 3501 for the
//! fetch service:
//!
//! ```text
//!   greeting -> STARTTLS -> TLS handshake -> LOGIN
//!     -> EXAMINE -> UID SEARCH -> UID FETCH ... -> CLOSE -> LOGOUT
//! ```
//!
//! Every decoded command is appended to a log the test can inspect, so
//! cleanup (CLOSE, LOGOUT) can be asserted even when an earlier
//! command failed.

use super::handlers::{
    OpenMode, handle_close, handle_login, handle_logout, handle_open, handle_uid_fetch,
    handle_uid_search,
};
use super::io::write_line;
use super::mailbox::Mailbox;
use imap_codec::CommandCodec;
use imap_codec::decode::Decoder;
use imap_codec::imap_types::command::CommandBody;
use imap_codec::imap_types::mailbox::Mailbox as ImapMailbox;
use rcgen::generate_simple_self_signed;
use rustls::pki_types::PrivatePkcs8KeyDer;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

type CommandLog = Arc<Mutex<Vec<String>>>;

/// A fake IMAP server on `127.0.0.1` with an OS-assigned port and a
/// freshly generated self-signed certificate. Stops when dropped.
pub struct FakeImapServer {
    port: u16,
    mailbox: Arc<Mutex<Mailbox>>,
    commands: CommandLog,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeImapServer {
    pub async fn start(mailbox: Mailbox) -> Self {
        // Several tests may race to install it; losing is fine.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();

        let cert = generate_simple_self_signed(vec!["127.0.0.1".to_string()])
            .expect("generate self-signed cert");
        let key_der = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());
        let tls_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert.cert.der().clone()], key_der.into())
            .expect("build server TLS config");
        let acceptor = TlsAcceptor::from(Arc::new(tls_config));

        let mailbox = Arc::new(Mutex::new(mailbox));
        let commands = CommandLog::default();

        let handle = {
            let mailbox = mailbox.clone();
            let commands = commands.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let acceptor = acceptor.clone();
                    let mailbox = mailbox.clone();
                    let commands = commands.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, acceptor, &mailbox, &commands).await;
                    });
                }
            })
        };

        Self {
            port,
            mailbox,
            commands,
            handle,
        }
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Commands received so far across all connections, e.g.
    /// `["LOGIN", "EXAMINE INBOX", "UID SEARCH", "CLOSE", "LOGOUT"]`.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Set `\Seen` on a stored message, as another client would.
    pub fn mark_seen(&self, folder: &str, uid: u32) {
        assert!(
            self.mailbox.lock().unwrap().mark_seen(folder, uid),
            "no UID {uid} in {folder}"
        );
    }
}

impl Drop for FakeImapServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Plaintext greeting and STARTTLS, then the command loop over TLS.
async fn handle_connection(
    stream: TcpStream,
    acceptor: TlsAcceptor,
    mailbox: &Mutex<Mailbox>,
    commands: &CommandLog,
) {
    let mut reader = BufReader::new(stream);
    if write_line(&mut reader, "* OK IMAP4rev1 Fake server ready\r\n")
        .await
        .is_err()
    {
        return;
    }

    let mut line = String::new();
    if reader.read_line(&mut line).await.is_err() {
        return;
    }
    let Some((tag, command)) = line.trim().split_once(' ') else {
        return;
    };
    if !command.eq_ignore_ascii_case("STARTTLS") {
        let _ = write_line(&mut reader, &format!("{tag} BAD Expected STARTTLS\r\n")).await;
        return;
    }
    if write_line(&mut reader, &format!("{tag} OK Begin TLS negotiation now\r\n"))
        .await
        .is_err()
    {
        return;
    }

    let Ok(tls_stream) = acceptor.accept(reader.into_inner()).await else {
        return;
    };
    handle_imap_session(tls_stream, mailbox, commands).await;
}

fn mailbox_name(mb: &ImapMailbox<'_>) -> String {
    match mb {
        ImapMailbox::Inbox => "INBOX".to_string(),
        ImapMailbox::Other(other) => {
            let bytes: &[u8] = other.as_ref();
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Decode each line with `imap-codec` and dispatch on the command.
/// Handlers work on a snapshot of the mailbox taken per command.
async fn handle_imap_session<S: AsyncRead + AsyncWrite + Unpin>(
    stream: S,
    mailbox: &Mutex<Mailbox>,
    commands: &CommandLog,
) {
    let mut reader = BufReader::new(stream);
    let mut selected: Option<String> = None;
    let codec = CommandCodec::default();
    let record = |entry: String| commands.lock().unwrap().push(entry);

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        if line.trim().is_empty() {
            continue;
        }

        let Ok((_, command)) = codec.decode(line.as_bytes()) else {
            let tag = line.split_whitespace().next().unwrap_or("*");
            if write_line(&mut reader, &format!("{tag} BAD Parse error\r\n"))
                .await
                .is_err()
            {
                break;
            }
            continue;
        };

        let tag = command.tag.inner();
        let snap = mailbox.lock().unwrap().clone();

        match command.body {
            CommandBody::Login { .. } => {
                record("LOGIN".to_string());
                if !handle_login(tag, snap.reject_login, &mut reader).await {
                    break;
                }
            }
            CommandBody::Select { mailbox: mb, .. } => {
                let name = mailbox_name(&mb);
                record(format!("SELECT {name}"));
                selected = handle_open(tag, OpenMode::Select, &name, &snap, &mut reader).await;
            }
            CommandBody::Examine { mailbox: mb, .. } => {
                let name = mailbox_name(&mb);
                record(format!("EXAMINE {name}"));
                selected = handle_open(tag, OpenMode::Examine, &name, &snap, &mut reader).await;
            }
            CommandBody::Search {
                criteria,
                uid: true,
                ..
            } => {
                record("UID SEARCH".to_string());
                handle_uid_search(
                    tag,
                    criteria.as_ref(),
                    &snap,
                    selected.as_deref(),
                    &mut reader,
                )
                .await;
            }
            CommandBody::Fetch {
                sequence_set,
                uid: true,
                ..
            } => {
                record("UID FETCH".to_string());
                handle_uid_fetch(tag, &sequence_set, &snap, selected.as_deref(), &mut reader)
                    .await;
            }
            CommandBody::Close => {
                record("CLOSE".to_string());
                if handle_close(tag, selected.as_deref(), &mut reader).await {
                    selected = None;
                }
            }
            CommandBody::Logout => {
                record("LOGOUT".to_string());
                handle_logout(tag, &mut reader).await;
                break;
            }
            _ => {
                if write_line(&mut reader, &format!("{tag} BAD Unsupported command\r\n"))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }
    }
}
