//! Command line surface and the output of each command.

use bytes::Bytes;
use chrono::{TimeDelta, Utc};
use clap::{Parser, Subcommand};
use mm_core::lifecycle;
use mm_core::models::{Note, UserId, UserProfile};
use mm_core::{AppError, SignInProvider};
use mm_services::Services;
use std::path::PathBuf;

/// memeow command line arguments.
#[derive(Parser, Debug)]
#[command(name = "memeow")]
#[command(about = "Short-lived notes shared with friends")]
pub struct Args {
    /// Account to act as, e.g. `apple:alice@icloud.com`
    #[arg(short, long, value_name = "PROVIDER:SUBJECT", value_parser = parse_account)]
    pub user: Account,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone)]
pub struct Account {
    pub provider: SignInProvider,
    pub subject: String,
}

fn parse_account(raw: &str) -> Result<Account, String> {
    let (provider, subject) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected PROVIDER:SUBJECT, got {raw:?}"))?;
    if subject.trim().is_empty() {
        return Err("subject must not be empty".to_string());
    }
    Ok(Account {
        provider: provider.parse()?,
        subject: subject.to_string(),
    })
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the signed-in user and where the app would open
    Whoami,
    /// Claim a nickname (once per account)
    Nickname { name: String },
    /// Check whether a nickname is still free
    CheckNickname { name: String },
    /// Upload an avatar image
    Avatar {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
    /// Publish a note
    Post {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Notes from you and your friends that are still visible
    Feed,
    /// Every note by you, or by the user with this nickname
    Notes { nickname: Option<String> },
    /// Relationship with another user
    Status { nickname: String },
    /// Send a friend request
    Request { nickname: String },
    /// Accept a friend request
    Accept { nickname: String },
    /// Decline a friend request
    Decline { nickname: String },
    /// List friends
    Friends,
    /// List incoming friend requests
    Requests,
}

/// Signs the account in and runs one command.
pub async fn run(
    services: &Services,
    account: &Account,
    command: Command,
) -> Result<(), AppError> {
    let (me, screen) = services
        .session
        .sign_in(account.provider, &account.subject)
        .await?;
    let rel = &services.relationships;

    match command {
        Command::Whoami => {
            println!("user:     {}", me.id);
            println!("nickname: {}", me.nickname.as_deref().unwrap_or("(none)"));
            println!("opens:    {screen:?}");
            match services.notes.can_post(&me).next_allowed_at() {
                None => println!("posting:  ready"),
                Some(at) => println!("posting:  again at {}", at.format("%H:%M UTC")),
            }
        }
        Command::Nickname { name } => {
            let profile = services.profiles.claim_nickname(&me.id, &name).await?;
            println!("you are now {}", profile.nickname.unwrap_or_default());
        }
        Command::CheckNickname { name } => {
            if services.profiles.is_nickname_available(&name).await? {
                println!("{} is available", name.trim());
            } else {
                println!("{} is taken", name.trim());
            }
        }
        Command::Avatar { path } => {
            let data = tokio::fs::read(&path)
                .await
                .map_err(|e| {
                    AppError::validation(format!("cannot read {}: {e}", path.display()))
                })?;
            let content_type = mime_guess::from_path(&path).first_or_octet_stream();
            let url = services
                .profiles
                .upload_avatar(&me.id, Bytes::from(data), &content_type)
                .await?;
            println!("avatar: {url}");
        }
        Command::Post { text } => {
            let note = services.notes.publish_note(&me.id, &text.join(" ")).await?;
            let until = note.created_at + lifecycle::window();
            println!("posted, visible until {}", until.format("%H:%M UTC"));
        }
        Command::Feed => {
            let friends: Vec<UserId> = me.friends.iter().cloned().collect();
            let feed = services.notes.build_feed(&me.id, &friends).await?;
            if feed.is_empty() {
                println!("nothing here yet");
            }
            for note in &feed {
                print_note(note);
            }
        }
        Command::Notes { nickname } => {
            let owner = match nickname {
                Some(name) => rel.resolve_nickname(&name).await?.id,
                None => me.id.clone(),
            };
            for note in services.notes.notes_by(&owner).await? {
                print_note(&note);
            }
        }
        Command::Status { nickname } => {
            let other = rel.resolve_nickname(&nickname).await?;
            println!("{}", rel.status_between(&me.id, &other.id).await?);
        }
        Command::Request { nickname } => {
            let other = rel.resolve_nickname(&nickname).await?;
            println!("{}", rel.send_request(&me.id, &other.id).await?);
        }
        Command::Accept { nickname } => {
            let other = rel.resolve_nickname(&nickname).await?;
            println!("{}", rel.accept_request(&me.id, &other.id).await?);
        }
        Command::Decline { nickname } => {
            let other = rel.resolve_nickname(&nickname).await?;
            println!("{}", rel.decline_request(&me.id, &other.id).await?);
        }
        Command::Friends => print_people(&rel.friends(&me.id).await?),
        Command::Requests => print_people(&rel.incoming_requests(&me.id).await?),
    }
    Ok(())
}

fn print_note(note: &Note) {
    let left = lifecycle::time_left(note.created_at, Utc::now());
    let status = if left <= TimeDelta::zero() {
        "expired".to_string()
    } else {
        format!("{}h{:02}m left", left.num_hours(), left.num_minutes() % 60)
    };
    println!(
        "{:<16} {}  [{}]",
        note.nickname.as_deref().unwrap_or("?"),
        note.text,
        status
    );
}

fn print_people(people: &[UserProfile]) {
    if people.is_empty() {
        println!("nobody yet");
    }
    for person in people {
        println!("{}", person.nickname.as_deref().unwrap_or("(no nickname)"));
    }
}
