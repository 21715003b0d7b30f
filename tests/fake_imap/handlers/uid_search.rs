//! UID SEARCH handler.
//!
//! Matches the stored messages against decoded `SearchKey`s. Only
//! `\Seen` is tracked per message; the other system flags are never
//! set. Results are written in storage order:
//!
//! ```text
//! * SEARCH 1 2 3
//! A0003 OK SEARCH completed
//! ```
//!
//! With `Mailbox::fail_search` set the command is refused with `NO`.

use crate::fake_imap::io::write_line;
use crate::fake_imap::mailbox::{Mailbox, TestEmail};
use imap_codec::imap_types::search::SearchKey;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_uid_search<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    criteria: &[SearchKey<'_>],
    mailbox: &Mailbox,
    selected_folder: Option<&str>,
    stream: &mut BufReader<S>,
) {
    let Some(folder) = selected_folder.and_then(|name| mailbox.get_folder(name)) else {
        let resp = format!("{tag} BAD No folder selected\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    if mailbox.fail_search {
        let resp = format!("{tag} NO SEARCH backend unavailable\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    }

    let uids: Vec<String> = folder
        .emails
        .iter()
        .filter(|e| criteria.iter().all(|key| matches_key(e, key)))
        .map(|e| e.uid.to_string())
        .collect();

    let search_line = if uids.is_empty() {
        "* SEARCH\r\n".to_string()
    } else {
        format!("* SEARCH {}\r\n", uids.join(" "))
    };
    let _ = write_line(stream, &search_line).await;
    let resp = format!("{tag} OK SEARCH completed\r\n");
    let _ = write_line(stream, &resp).await;
}

#[allow(clippy::match_same_arms)]
fn matches_key(email: &TestEmail, key: &SearchKey<'_>) -> bool {
    match key {
        SearchKey::All => true,
        SearchKey::Seen => email.seen,
        SearchKey::Unseen => !email.seen,
        SearchKey::Answered | SearchKey::Flagged | SearchKey::Deleted | SearchKey::Draft => false,
        SearchKey::Unanswered
        | SearchKey::Unflagged
        | SearchKey::Undeleted
        | SearchKey::Undraft => true,
        SearchKey::And(keys) => keys.as_ref().iter().all(|k| matches_key(email, k)),
        SearchKey::Or(a, b) => matches_key(email, a) || matches_key(email, b),
        SearchKey::Not(k) => !matches_key(email, k),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::mailbox::MailboxBuilder;
    use tokio::io::BufReader;

    async fn run(criteria: &[SearchKey<'_>], mailbox: &Mailbox, selected: Option<&str>) -> String {
        let (client, server) = tokio::io::duplex(4096);
        let mut stream = BufReader::new(server);

        handle_uid_search("A1", criteria, mailbox, selected, &mut stream).await;
        drop(stream);

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut BufReader::new(client), &mut buf)
            .await
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn inbox() -> Mailbox {
        MailboxBuilder::new()
            .folder("INBOX")
            .email(1, true, b"a")
            .email(2, false, b"b")
            .email(5, false, b"c")
            .build()
    }

    #[tokio::test]
    async fn all_returns_every_uid_in_order() {
        let output = run(&[SearchKey::All], &inbox(), Some("INBOX")).await;
        assert!(output.contains("* SEARCH 1 2 5\r\n"));
        assert!(output.contains("A1 OK SEARCH completed"));
    }

    #[tokio::test]
    async fn unseen_skips_seen_messages() {
        let output = run(&[SearchKey::Unseen], &inbox(), Some("INBOX")).await;
        assert!(output.contains("* SEARCH 2 5\r\n"));
    }

    #[tokio::test]
    async fn unanswered_matches_everything() {
        let output = run(&[SearchKey::Unanswered], &inbox(), Some("INBOX")).await;
        assert!(output.contains("* SEARCH 1 2 5\r\n"));
    }

    #[tokio::test]
    async fn empty_result_still_sends_search_line() {
        let mailbox = MailboxBuilder::new().folder("INBOX").build();
        let output = run(&[SearchKey::All], &mailbox, Some("INBOX")).await;
        assert!(output.contains("* SEARCH\r\n"));
    }

    #[tokio::test]
    async fn injected_failure_is_no() {
        let mut mailbox = inbox();
        mailbox.fail_search = true;

        let output = run(&[SearchKey::Unseen], &mailbox, Some("INBOX")).await;

        assert!(!output.contains("* SEARCH"));
        assert!(output.starts_with("A1 NO"));
    }

    #[tokio::test]
    async fn no_folder_selected_is_bad() {
        let output = run(&[SearchKey::All], &inbox(), None).await;
        assert!(output.contains("A1 BAD No folder selected"));
    }
}
