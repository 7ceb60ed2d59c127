use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use edulive::api::{ApiClient, ApiError};
use edulive::channels::ChannelKind;
use edulive::config::{ConfigError, RealtimeConfig};
use edulive::dispatch::LiveClassListener;
use edulive::frames::{ChatMessage, Id, OnlineUser};
use edulive::progress::{ProgressStorage, SessionKey, StorageError};
use edulive::realtime::Realtime;
use edulive::transport::{TransportError, WILDCARD, handler};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing auth token; pass --token or set EDU_TOKEN")]
    MissingToken,
    #[error("unknown channel kind `{0}`")]
    UnknownChannel(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "edulive", about = "Classroom realtime channels and session progress CLI")]
struct Cli {
    #[arg(long, env = "EDU_API_BASE_URL")]
    api_base_url: Option<String>,

    #[arg(long, env = "EDU_TOKEN")]
    token: Option<String>,

    #[arg(long, env = "EDU_PROGRESS_PATH")]
    progress_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every frame on a channel as one JSON line until Ctrl-C.
    Listen { kind: String, id: String },
    /// Join a live class; stdin lines are sent as chat messages.
    LiveClass { class_id: String },
    Notifications(NotificationsCommand),
    Progress(ProgressCommand),
}

#[derive(Args, Debug)]
struct NotificationsCommand {
    #[command(subcommand)]
    command: NotificationsSubcommand,
}

#[derive(Subcommand, Debug)]
enum NotificationsSubcommand {
    Watch {
        user_id: String,
        /// Seed the inbox from the REST backlog first.
        #[arg(long, default_value_t = false)]
        backlog: bool,
    },
    List,
    Read { id: String },
    ReadAll,
}

#[derive(Args, Debug)]
struct ProgressCommand {
    #[command(subcommand)]
    command: ProgressSubcommand,
}

#[derive(Args, Debug)]
struct SessionArgs {
    cycle_id: String,
    day_id: String,
    part_id: String,
}

impl SessionArgs {
    fn key(&self) -> SessionKey {
        SessionKey::new(self.cycle_id.clone(), self.day_id.clone(), self.part_id.clone())
    }
}

#[derive(Subcommand, Debug)]
enum ProgressSubcommand {
    /// Print stored checkpoints, optionally only one session's.
    Show {
        #[arg(long)]
        cycle_id: Option<String>,
    },
    Complete {
        #[command(flatten)]
        session: SessionArgs,
        segment_id: String,
    },
    Report {
        #[command(flatten)]
        session: SessionArgs,
        /// Zero-based segment index.
        segment_index: usize,
        /// Store this JSON report instead of printing the stored one.
        #[arg(long)]
        set: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = RealtimeConfig::from_env();
    if let Some(url) = cli.api_base_url {
        config.api_base_url = url;
    }
    if let Some(path) = cli.progress_path {
        config.progress_path = path;
    }
    let rt = Realtime::from_config(config)?;
    let token = cli.token;

    match cli.command {
        Command::Listen { kind, id } => run_listen(&rt, token.as_deref(), &kind, &id).await,
        Command::LiveClass { class_id } => run_live_class(&rt, token.as_deref(), &class_id).await,
        Command::Notifications(n) => run_notifications(&rt, token.as_deref(), n.command).await,
        Command::Progress(p) => run_progress(&rt, p.command),
    }
}

fn require_token(token: Option<&str>) -> Result<&str, CliError> {
    token.filter(|t| !t.is_empty()).ok_or(CliError::MissingToken)
}

async fn run_listen(rt: &Realtime, token: Option<&str>, kind: &str, id: &str) -> Result<(), CliError> {
    let token = require_token(token)?;
    let kind = ChannelKind::parse(kind).ok_or_else(|| CliError::UnknownChannel(kind.to_owned()))?;
    let connection = rt.channel(kind, id);
    connection.on(WILDCARD, handler(|frame| println!("{frame}")));
    connection.on_disconnect(|| eprintln!("disconnected, retrying"));

    connection.connect_and_wait(token).await?;
    eprintln!("listening on {}", connection.endpoint());
    tokio::signal::ctrl_c().await?;
    connection.disconnect();
    Ok(())
}

/// Prints live-class events as JSON lines.
struct PrintListener;

impl PrintListener {
    fn emit(event: &str, data: &Value) {
        println!("{}", json!({"event": event, "data": data}));
    }
}

impl LiveClassListener for PrintListener {
    fn poll_created(&self, poll: &Value) {
        Self::emit("poll_created", poll);
    }
    fn poll_updated(&self, poll: &Value) {
        Self::emit("poll_updated", poll);
    }
    fn poll_status_changed(&self, poll: &Value) {
        Self::emit("poll_status_changed", poll);
    }
    fn new_question(&self, question: &Value) {
        Self::emit("new_question", question);
    }
    fn question_answered(&self, question: &Value) {
        Self::emit("question_answered", question);
    }
    fn question_upvoted(&self, question: &Value) {
        Self::emit("question_upvoted", question);
    }
    fn reaction(&self, reaction: &Value) {
        Self::emit("reaction", reaction);
    }
    fn chat_message(&self, message: &ChatMessage) {
        Self::emit("chat_message", &json!({"user": message.user_name, "message": message.message}));
    }
    fn presence_changed(&self, users: &[OnlineUser]) {
        Self::emit("online_users", &json!(users));
    }
    fn typing_changed(&self, users: &[OnlineUser]) {
        Self::emit("typing", &json!(users));
    }
    fn connection_changed(&self, connected: bool) {
        Self::emit("connection", &json!({"connected": connected}));
    }
}

async fn run_live_class(rt: &Realtime, token: Option<&str>, class_id: &str) -> Result<(), CliError> {
    let token = require_token(token)?;
    let mut room = rt.live_class(PrintListener);
    room.join(Some(class_id), Some(token));
    room.wait_connected().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if !line.is_empty() {
                    room.send_chat_message(line);
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }
    room.leave();
    Ok(())
}

async fn run_notifications(
    rt: &Realtime,
    token: Option<&str>,
    command: NotificationsSubcommand,
) -> Result<(), CliError> {
    let token = require_token(token)?;
    let api = ApiClient::new(&rt.config().api_base_url, token)?;

    match command {
        NotificationsSubcommand::Watch { user_id, backlog } => {
            let center = rt.notifications();
            center.start(Some(user_id.as_str()), Some(token));
            if backlog {
                center.seed(api.notifications().await?);
            }
            center.wait_connected().await?;
            eprintln!("watching notifications for {user_id} ({} unread)", center.unread_count());
            tokio::signal::ctrl_c().await?;
            center.stop();
            eprintln!("{} unread", center.unread_count());
            Ok(())
        }
        NotificationsSubcommand::List => {
            for n in api.notifications().await? {
                println!("{}", serde_json::to_string(&n)?);
            }
            Ok(())
        }
        NotificationsSubcommand::Read { id } => {
            api.mark_notification_read(&Id::from(id)).await?;
            println!("ok");
            Ok(())
        }
        NotificationsSubcommand::ReadAll => {
            api.mark_all_notifications_read().await?;
            println!("ok");
            Ok(())
        }
    }
}

fn run_progress(rt: &Realtime, command: ProgressSubcommand) -> Result<(), CliError> {
    let storage = rt.progress_storage();
    match command {
        ProgressSubcommand::Show { cycle_id } => {
            for record in storage.sessions()? {
                if cycle_id.as_ref().is_some_and(|c| *c != record.cycle_id) {
                    continue;
                }
                let completed = storage.completed_segments(&record.key())?;
                println!(
                    "{}",
                    json!({"session": record.key().to_string(), "record": record, "completed": completed})
                );
            }
            Ok(())
        }
        ProgressSubcommand::Complete { session, segment_id } => {
            let added = storage.mark_segment_complete(&session.key(), &segment_id)?;
            println!("{}", if added { "marked" } else { "already complete" });
            Ok(())
        }
        ProgressSubcommand::Report { session, segment_index, set } => {
            let report_key = session.key().report_key(segment_index);
            if let Some(raw) = set {
                let report: Value = serde_json::from_str(&raw)?;
                storage.save_report(&report_key, &report)?;
                println!("saved {report_key}");
            } else {
                let report = storage.load_report(&report_key)?.unwrap_or(Value::Null);
                println!("{report}");
            }
            Ok(())
        }
    }
}
