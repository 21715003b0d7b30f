#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for fetching, extracting and replying to mail over IMAP/SMTP

use clap::{Parser, Subcommand, ValueEnum};
use mailpipe::{
    Address, ExtractionProfile, ExtractionRequest, ExtractionResult, Extractor, ExtractorConfig,
    Folder, ImapConfig, ImapStore, MailMessage, MessageFetchService, OutboundMessage, SmtpConfig,
    SmtpSender, compose_reply, flatten, reply_to_latest,
};
use tracing_subscriber::EnvFilter;

type Fetcher = MessageFetchService<ImapStore>;

#[derive(Parser)]
#[command(name = "mailpipe-cli")]
#[command(about = "Fetch, extract and reply to mail over IMAP/SMTP")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show the latest message in a folder
    Latest {
        /// Folder to read from
        #[arg(long, default_value = "INBOX")]
        folder: String,
    },

    /// List unread messages
    Unread {
        /// Folder to read from
        #[arg(long, default_value = "INBOX")]
        folder: String,

        /// Maximum number of messages to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Extract the reply content of the latest message
    Extract {
        /// Folder to read from
        #[arg(long, default_value = "INBOX")]
        folder: String,

        /// Extraction prompt to use
        #[arg(long, value_enum, default_value_t = Profile::Normal)]
        profile: Profile,
    },

    /// Reply to the latest message
    Reply {
        /// Reply text
        #[arg(long)]
        body: String,

        /// Folder to read from
        #[arg(long, default_value = "INBOX")]
        folder: String,

        /// Print the reply instead of sending it
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Profile {
    Normal,
    Booking,
    Property,
}

impl From<Profile> for ExtractionProfile {
    fn from(profile: Profile) -> Self {
        match profile {
            Profile::Normal => Self::NormalEmail,
            Profile::Booking => Self::OtaBooking,
            Profile::Property => Self::PropertyMessage,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let fetcher = MessageFetchService::new(ImapStore::new(ImapConfig::from_env()?));

    match &args.command {
        Command::Latest { folder } => {
            cmd_latest(&fetcher, &args, &Folder::from(folder.as_str())).await?;
        }
        Command::Unread { folder, limit } => {
            cmd_unread(&fetcher, &args, &Folder::from(folder.as_str()), *limit).await?;
        }
        Command::Extract { folder, profile } => {
            cmd_extract(&fetcher, &args, &Folder::from(folder.as_str()), *profile).await?;
        }
        Command::Reply {
            body,
            folder,
            dry_run,
        } => {
            cmd_reply(
                &fetcher,
                &args,
                &Folder::from(folder.as_str()),
                body,
                *dry_run,
            )
            .await?;
        }
    }

    Ok(())
}

async fn cmd_latest(fetcher: &Fetcher, args: &Args, folder: &Folder) -> anyhow::Result<()> {
    let latest = fetcher.fetch_latest(folder).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&latest)?);
    } else if let Some(message) = &latest {
        print_message_detail(message);
    } else {
        println!("No messages in {folder}.");
    }

    Ok(())
}

async fn cmd_unread(
    fetcher: &Fetcher,
    args: &Args,
    folder: &Folder,
    limit: usize,
) -> anyhow::Result<()> {
    let unread = fetcher.fetch_unread(folder).await?;
    let display: Vec<&MailMessage> = unread.iter().take(limit).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&display)?);
    } else {
        print_message_table(&display);
    }

    Ok(())
}

async fn cmd_extract(
    fetcher: &Fetcher,
    args: &Args,
    folder: &Folder,
    profile: Profile,
) -> anyhow::Result<()> {
    let Some(latest) = fetcher.fetch_latest(folder).await? else {
        println!("No messages in {folder}.");
        return Ok(());
    };

    let extractor = Extractor::new(ExtractorConfig::from_env()?);
    let request = ExtractionRequest::from_message(&latest)?;
    let result = extractor.extract(profile.into(), &request).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        match result {
            ExtractionResult::Extracted(json) => println!("{json}"),
            ExtractionResult::Fallback(json) => {
                eprintln!("Extraction service unavailable, showing local fallback");
                println!("{json}");
            }
            ExtractionResult::Unavailable => println!("Extraction unavailable."),
        }
    }

    Ok(())
}

async fn cmd_reply(
    fetcher: &Fetcher,
    args: &Args,
    folder: &Folder,
    body: &str,
    dry_run: bool,
) -> anyhow::Result<()> {
    let smtp = SmtpConfig::from_env()?;
    let from = Address::new(smtp.from_address.clone());

    let reply = if dry_run {
        match fetcher.fetch_latest(folder).await? {
            Some(latest) => Some(compose_reply(&latest, &from, body)?),
            None => None,
        }
    } else {
        let sender = SmtpSender::new(&smtp)?;
        reply_to_latest(fetcher, &sender, folder, &from, body).await?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reply)?);
    } else if let Some(reply) = &reply {
        print_outbound(reply, dry_run);
    } else {
        println!("No messages in {folder}.");
    }

    Ok(())
}

fn print_message_table(messages: &[&MailMessage]) {
    if messages.is_empty() {
        println!("No messages found.");
        return;
    }

    let header = format!("{:<8} {:<20} {:<30} {}", "UID", "Date", "From", "Subject");
    println!("{header}");
    println!("{}", "-".repeat(100));

    for message in messages {
        println!(
            "{:<8} {:<20} {:<30} {}",
            message.id,
            message
                .sent_date
                .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d %H:%M").to_string()),
            truncate(&display_address(message.sender.as_ref()), 28),
            truncate(message.subject_or_empty(), 40),
        );
    }

    println!("\n{} message(s)", messages.len());
}

fn print_message_detail(message: &MailMessage) {
    println!("UID:     {}", message.id);
    if let Some(date) = message.sent_date {
        println!("Date:    {}", date.format("%Y-%m-%d %H:%M:%S"));
    }
    println!("From:    {}", display_address(message.sender.as_ref()));
    println!(
        "To:      {}",
        message
            .recipients
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Subject: {}", message.subject_or_empty());
    println!("Msg-ID:  {}", message.message_id.as_deref().unwrap_or("-"));
    if let Some(references) = &message.references {
        println!("Refs:    {references}");
    }

    println!("\n--- Body ---\n");
    match flatten(&message.body) {
        Ok(text) => println!("{text}"),
        Err(e) => println!("[{e}]"),
    }
}

fn print_outbound(reply: &OutboundMessage, dry_run: bool) {
    println!("From:        {}", reply.from);
    println!("To:          {}", reply.to);
    println!("Subject:     {}", reply.subject);
    if let Some(in_reply_to) = &reply.in_reply_to {
        println!("In-Reply-To: {in_reply_to}");
    }
    if let Some(references) = &reply.references {
        println!("References:  {references}");
    }
    println!("\n{}", reply.body);
    if !dry_run {
        println!("\nSent.");
    }
}

fn display_address(address: Option<&Address>) -> String {
    address.map_or_else(|| "-".to_string(), ToString::to_string)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
