//! IMAP implementation of the mailbox seams
//!
//! [`ImapStore`] opens a TLS session (implicit TLS or STARTTLS), logs
//! in and hands out an [`ImapMailSession`]. Folders are opened with
//! EXAMINE, so fetching never changes flags and CLOSE never expunges.
//!
//! SEARCH and FETCH are issued as raw commands and their responses
//! read here, so a tagged `NO`/`BAD` completion is an error rather
//! than an empty result.

use crate::config::{ImapConfig, Security};
use crate::error::{Error, Result};
use crate::folder::Folder;
use crate::message::RawMessage;
use crate::search::SearchFilter;
use crate::store::{MailSession, MailStore};
use async_imap::Session;
use async_imap::imap_proto::{AttributeValue, MailboxDatum, Response, Status};
use async_trait::async_trait;
use rustls::pki_types::ServerName;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{debug, info};

type TlsSession = Session<Compat<TlsStream<TcpStream>>>;

/// Opens IMAP sessions for one account.
#[derive(Debug, Clone)]
pub struct ImapStore {
    config: ImapConfig,
}

impl ImapStore {
    #[must_use]
    pub const fn new(config: ImapConfig) -> Self {
        Self { config }
    }

    fn tls_connector(&self) -> Result<TlsConnector> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::MailboxConnect(format!("TLS setup failed: {e}")))?;

        let config = if self.config.accept_invalid_certs {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(DangerousVerifier))
                .with_no_client_auth()
        } else {
            let roots =
                rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            builder.with_root_certificates(roots).with_no_client_auth()
        };

        Ok(TlsConnector::from(Arc::new(config)))
    }

    async fn handshake(&self, tcp: TcpStream) -> Result<TlsStream<TcpStream>> {
        let server_name = ServerName::try_from(self.config.host.clone())
            .map_err(|e| Error::MailboxConnect(format!("Invalid server name: {e}")))?;

        self.tls_connector()?
            .connect(server_name, tcp)
            .await
            .map_err(|e| Error::MailboxConnect(format!("TLS handshake failed: {e}")))
    }
}

#[async_trait]
impl MailStore for ImapStore {
    type Session = ImapMailSession;

    async fn connect(&self) -> Result<ImapMailSession> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        debug!("Connecting to IMAP server at {}", addr);

        let tcp_stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| Error::MailboxConnect(format!("{addr}: {e}")))?;

        let tls_stream = match self.config.security {
            Security::Tls => self.handshake(tcp_stream).await?,
            Security::StartTls => {
                let mut client = async_imap::Client::new(tcp_stream.compat());
                client
                    .run_command_and_check_ok("STARTTLS", None)
                    .await
                    .map_err(|e| Error::MailboxConnect(format!("STARTTLS failed: {e}")))?;
                self.handshake(client.into_inner().into_inner()).await?
            }
        };

        let client = async_imap::Client::new(tls_stream.compat());
        let session = client
            .login(&self.config.username, &self.config.password)
            .await
            .map_err(|(e, _)| Error::MailboxConnect(format!("Login failed: {e}")))?;

        info!("Connected to IMAP server");
        Ok(ImapMailSession { session })
    }
}

/// An authenticated IMAP session.
pub struct ImapMailSession {
    session: TlsSession,
}

impl ImapMailSession {
    /// Send `command` and read responses up to its tagged completion,
    /// handing every untagged response to `on_data`.
    async fn exchange(
        &mut self,
        command: &str,
        mut on_data: impl FnMut(&Response<'_>) + Send,
    ) -> Result<()> {
        let tag = self
            .session
            .run_command(command)
            .await
            .map_err(|e| Error::MailboxProtocol(format!("{command} failed: {e}")))?;

        loop {
            let response = self
                .session
                .read_response()
                .await
                .map_err(|e| Error::MailboxProtocol(format!("{command} failed: {e}")))?
                .ok_or_else(|| {
                    Error::MailboxProtocol(format!("{command} failed: connection closed"))
                })?;

            match response.parsed() {
                Response::Done {
                    tag: done,
                    status,
                    information,
                    ..
                } if *done == tag => {
                    return match status {
                        Status::Ok => Ok(()),
                        other => Err(Error::MailboxProtocol(format!(
                            "{command} returned {other:?}: {}",
                            information.as_deref().unwrap_or_default()
                        ))),
                    };
                }
                other => on_data(other),
            }
        }
    }

    async fn uid_search(&mut self, filter: SearchFilter) -> Result<Vec<u32>> {
        let mut uids = Vec::new();
        self.exchange(
            &format!("UID SEARCH {}", filter.to_imap_query()),
            |response| {
                if let Response::MailboxData(MailboxDatum::Search(found)) = response {
                    uids.extend_from_slice(found);
                }
            },
        )
        .await?;

        // SEARCH results are unordered; UIDs grow with arrival.
        uids.sort_unstable();
        uids.dedup();
        debug!("Found {} messages matching {:?}", uids.len(), filter);
        Ok(uids)
    }

    async fn fetch_single(&mut self, uid: u32) -> Result<RawMessage> {
        let mut body = None;
        self.exchange(&format!("UID FETCH {uid} (BODY.PEEK[])"), |response| {
            if let Response::Fetch(_, attributes) = response {
                body = body.take().or_else(|| {
                    attributes.iter().find_map(|attribute| match attribute {
                        AttributeValue::BodySection {
                            data: Some(data), ..
                        } => Some(data.to_vec()),
                        _ => None,
                    })
                });
            }
        })
        .await?;

        body.map(|bytes| RawMessage::new(uid, bytes))
            .ok_or_else(|| Error::MailboxProtocol(format!("No body found for UID {uid}")))
    }
}

#[async_trait]
impl MailSession for ImapMailSession {
    async fn open_folder(&mut self, folder: &Folder) -> Result<()> {
        let name = folder.as_str();
        let mailbox = self
            .session
            .examine(name)
            .await
            .map_err(|e| Error::MailboxProtocol(format!("Failed to open {name}: {e}")))?;
        debug!("Opened {} read-only ({} messages)", name, mailbox.exists);
        Ok(())
    }

    async fn latest(&mut self) -> Result<Option<RawMessage>> {
        match self.uid_search(SearchFilter::All).await?.last() {
            Some(&uid) => self.fetch_single(uid).await.map(Some),
            None => Ok(None),
        }
    }

    async fn search(&mut self, filter: SearchFilter) -> Result<Vec<RawMessage>> {
        let uids = self.uid_search(filter).await?;
        let mut messages = Vec::with_capacity(uids.len());
        for uid in uids {
            messages.push(self.fetch_single(uid).await?);
        }
        Ok(messages)
    }

    async fn close_folder(&mut self) -> Result<()> {
        self.session
            .close()
            .await
            .map_err(|e| Error::MailboxProtocol(format!("Close failed: {e}")))
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.session
            .logout()
            .await
            .map_err(|e| Error::MailboxProtocol(format!("Logout failed: {e}")))
    }
}

/// Certificate verifier that accepts all certificates
/// (self-signed bridges and test servers).
#[derive(Debug)]
struct DangerousVerifier;

impl rustls::client::danger::ServerCertVerifier for DangerousVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
