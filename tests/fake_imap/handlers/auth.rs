//! LOGIN and LOGOUT handlers.
//!
//! Credentials are not checked; a mailbox built with `reject_login()`
//! refuses every LOGIN instead.

use crate::fake_imap::io::write_line;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Returns `true` if the client is now authenticated.
pub async fn handle_login<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    reject: bool,
    stream: &mut BufReader<S>,
) -> bool {
    let resp = if reject {
        format!("{tag} NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
    } else {
        format!("{tag} OK LOGIN completed\r\n")
    };
    write_line(stream, &resp).await.is_ok() && !reject
}

/// `* BYE` then the tagged OK.
pub async fn handle_logout<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    stream: &mut BufReader<S>,
) {
    let _ = write_line(stream, "* BYE Logging out\r\n").await;
    let resp = format!("{tag} OK LOGOUT completed\r\n");
    let _ = write_line(stream, &resp).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    async fn output_of<F, Fut>(handler: F) -> String
    where
        F: FnOnce(BufReader<tokio::io::DuplexStream>) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        let (client, server) = tokio::io::duplex(1024);
        handler(BufReader::new(server)).await;

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut BufReader::new(client), &mut buf)
            .await
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn login_accepts_by_default() {
        let output = output_of(|mut stream| async move {
            assert!(handle_login("A0001", false, &mut stream).await);
        })
        .await;
        assert_eq!(output, "A0001 OK LOGIN completed\r\n");
    }

    #[tokio::test]
    async fn login_can_be_refused() {
        let output = output_of(|mut stream| async move {
            assert!(!handle_login("A0001", true, &mut stream).await);
        })
        .await;
        assert!(output.starts_with("A0001 NO"));
    }

    #[tokio::test]
    async fn logout_says_bye_first() {
        let output = output_of(|mut stream| async move {
            handle_logout("X1", &mut stream).await;
        })
        .await;
        let bye = output.find("* BYE").unwrap();
        let ok = output.find("X1 OK LOGOUT").unwrap();
        assert!(bye < ok);
    }
}
