//! Chat command handlers for monitoring features
//!
//! Commands arrive as text (`/ping a.com b.com`, `/cancel`, ...), optionally
//! with a Telegram `@botname` suffix on the command word. Unknown commands and
//! plain chat text are ignored.

use crate::monitors::digest::format_digest;
use crate::monitors::parse_target;
use crate::tasks::{CancelOutcome, SessionId, StartOutcome, TaskRegistry};
use tokio::time::Instant;
use tracing::{debug, info};

pub const GREETING_TEXT: &str = "Hi! I check whether websites are up.\n\
Available commands:\n/ping, /cancel, /running, /help\n";

pub const HELP_TEXT: &str = "Use /ping <URL1> <URL2> ... to start monitoring sites. \
Use /cancel <URL> to stop a specific URL, or /cancel to stop all of them. \
Use /running to see active monitors.";

pub const MISSING_URLS_TEXT: &str = "Please specify the URLs to check.";

pub const STARTED_TEXT: &str = "Started monitoring the given URLs.\n\n\
Send /cancel <URL> to stop a specific monitor.\n\n\
Use /running to see active monitors.";

pub const NONE_ACTIVE_TEXT: &str = "No active monitors.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Greeting,
    Help,
    /// URLs as typed by the user (not yet normalized).
    Start(Vec<String>),
    /// `None` cancels every monitor of the session.
    Cancel(Option<String>),
    List,
}

/// Parse a chat message into a command. Returns `None` for text that is not a
/// known command.
pub fn parse_command(text: &str) -> Option<Command> {
    let mut words = text.split_whitespace();
    let head = words.next()?;
    let name = head.strip_prefix('/').or_else(|| head.strip_prefix('!'))?;
    let name = name.split('@').next().unwrap_or(name).to_lowercase();
    let args: Vec<String> = words.map(str::to_string).collect();

    match name.as_str() {
        "start" if args.is_empty() => Some(Command::Greeting),
        "start" | "ping" => Some(Command::Start(args)),
        "cancel" => Some(Command::Cancel(args.into_iter().next())),
        "list" | "running" => Some(Command::List),
        "help" => Some(Command::Help),
        _ => None,
    }
}

/// Routes parsed commands to the task registry and builds the replies.
#[derive(Clone)]
pub struct CommandHandler {
    registry: TaskRegistry,
}

impl CommandHandler {
    pub fn new(registry: TaskRegistry) -> Self {
        Self { registry }
    }

    /// Handle one message and send every reply to the session.
    pub async fn dispatch(&self, session: SessionId, text: &str) {
        for reply in self.handle(session, text).await {
            self.registry.notify(session, &reply).await;
        }
    }

    /// Handle one message and return the replies in send order.
    pub async fn handle(&self, session: SessionId, text: &str) -> Vec<String> {
        let Some(command) = parse_command(text) else {
            debug!("Command: Ignoring non-command message in session {}", session);
            return Vec::new();
        };
        info!("Command: {:?} from session {}", command, session);

        match command {
            Command::Greeting => vec![GREETING_TEXT.to_string()],
            Command::Help => vec![HELP_TEXT.to_string()],
            Command::Start(urls) => self.start(session, &urls).await,
            Command::Cancel(Some(url)) => vec![self.cancel_one(session, &url)],
            Command::Cancel(None) => vec![self.cancel_all(session)],
            Command::List => vec![self.list(session)],
        }
    }

    async fn start(&self, session: SessionId, urls: &[String]) -> Vec<String> {
        if urls.is_empty() {
            return vec![MISSING_URLS_TEXT.to_string()];
        }

        let mut replies = Vec::new();
        let mut started = 0;
        for raw in urls {
            let Some(url) = parse_target(raw) else {
                replies.push(format!("Not a valid URL: {}", raw));
                continue;
            };
            match self.registry.start(session, &url) {
                StartOutcome::Started => started += 1,
                StartOutcome::AlreadyRunning => {
                    replies.push(format!("Already being monitored: {}", url));
                }
            }
        }

        if self.registry.list(session).is_empty() {
            return replies;
        }

        let checked_from = Instant::now();
        let results = self.registry.snapshot_results(session).await;
        self.registry.reset_digest_clock(session, checked_from);
        replies.push(format_digest(&results));
        if started > 0 {
            replies.push(STARTED_TEXT.to_string());
        }
        replies
    }

    fn cancel_one(&self, session: SessionId, raw: &str) -> String {
        match self.registry.cancel(session, raw) {
            CancelOutcome::Cancelled => {
                format!("Monitoring stopped for {}", crate::monitors::normalize_url(raw))
            }
            CancelOutcome::NotFound => "No active monitor found for that URL.".to_string(),
        }
    }

    fn cancel_all(&self, session: SessionId) -> String {
        match self.registry.cancel_all(session) {
            0 => "No active monitors found.".to_string(),
            n => format!("All monitors stopped ({}).", n),
        }
    }

    fn list(&self, session: SessionId) -> String {
        let targets = self.registry.list(session);
        if targets.is_empty() {
            return NONE_ACTIVE_TEXT.to_string();
        }
        let lines: Vec<String> = targets.into_iter().collect();
        format!("Active monitors:\n{}", lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitors::digest::DIGEST_HEADER;
    use crate::tasks::testing::registry;
    use crate::tasks::MonitorSettings;
    use std::time::Duration;

    const S: SessionId = SessionId(42);

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("/start"), Some(Command::Greeting));
        assert_eq!(
            parse_command("/start a.com"),
            Some(Command::Start(vec!["a.com".to_string()]))
        );
        assert_eq!(
            parse_command("/ping@watch_bot a.com  b.com"),
            Some(Command::Start(vec!["a.com".to_string(), "b.com".to_string()]))
        );
        assert_eq!(parse_command("/ping"), Some(Command::Start(vec![])));
        assert_eq!(parse_command("/cancel"), Some(Command::Cancel(None)));
        assert_eq!(
            parse_command("!cancel a.com extra"),
            Some(Command::Cancel(Some("a.com".to_string())))
        );
        assert_eq!(parse_command("/running"), Some(Command::List));
        assert_eq!(parse_command("/LIST"), Some(Command::List));
        assert_eq!(parse_command("/help"), Some(Command::Help));
    }

    #[test]
    fn test_parse_ignores_chatter() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("hello there"), None);
        assert_eq!(parse_command("/unknown"), None);
    }

    #[tokio::test]
    async fn test_ping_without_urls_asks_for_them() {
        let (reg, _, _) = registry(MonitorSettings::default());
        let handler = CommandHandler::new(reg);
        assert_eq!(handler.handle(S, "/ping").await, vec![MISSING_URLS_TEXT.to_string()]);
    }

    #[tokio::test]
    async fn test_start_replies_with_digest_and_confirmation() {
        let (reg, prober, _) = registry(MonitorSettings::default());
        prober.script("https://down.test", &[503]);
        let handler = CommandHandler::new(reg.clone());

        let replies = handler.handle(S, "/ping up.test down.test").await;
        assert_eq!(replies.len(), 2);
        assert!(replies[0].starts_with(DIGEST_HEADER));
        let problem = replies[0].find("https://down.test").unwrap();
        let ok = replies[0].find("https://up.test").unwrap();
        assert!(problem < ok);
        assert_eq!(replies[1], STARTED_TEXT);
        reg.shutdown();
    }

    #[tokio::test]
    async fn test_duplicate_and_invalid_urls_are_reported() {
        let (reg, _, _) = registry(MonitorSettings::default());
        let handler = CommandHandler::new(reg.clone());
        handler.handle(S, "/ping a.test").await;

        let replies = handler.handle(S, "/ping https://a.test http://").await;
        assert!(replies.contains(&"Already being monitored: https://a.test".to_string()));
        assert!(replies.iter().any(|r| r.starts_with("Not a valid URL")));
        assert!(replies.iter().any(|r| r.starts_with(DIGEST_HEADER)));
        assert!(!replies.contains(&STARTED_TEXT.to_string()));
        assert_eq!(reg.list(S).len(), 1);
        reg.shutdown();
    }

    #[tokio::test]
    async fn test_cancel_and_list() {
        let (reg, _, _) = registry(MonitorSettings::default());
        let handler = CommandHandler::new(reg);

        assert_eq!(handler.handle(S, "/running").await, vec![NONE_ACTIVE_TEXT.to_string()]);
        handler.handle(S, "/ping b.test a.test").await;
        assert_eq!(
            handler.handle(S, "/list").await,
            vec!["Active monitors:\nhttps://a.test\nhttps://b.test".to_string()]
        );

        assert_eq!(
            handler.handle(S, "/cancel a.test").await,
            vec!["Monitoring stopped for https://a.test".to_string()]
        );
        assert_eq!(
            handler.handle(S, "/cancel a.test").await,
            vec!["No active monitor found for that URL.".to_string()]
        );
        assert_eq!(
            handler.handle(S, "/cancel").await,
            vec!["All monitors stopped (1).".to_string()]
        );
        assert_eq!(
            handler.handle(S, "/cancel").await,
            vec!["No active monitors found.".to_string()]
        );
    }

    fn settings(poll_secs: u64, report_secs: u64) -> MonitorSettings {
        MonitorSettings {
            poll_interval: Duration::from_secs(poll_secs),
            report_interval: Duration::from_secs(report_secs),
            alert_on_recovery: true,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_start_digest_keeps_cadence() {
        let (reg, prober, notifier) = registry(settings(60, 60));
        // First call serves the start digest; every loop check after it takes 1s.
        prober.latencies(&[Duration::from_secs(5), Duration::from_secs(1)]);
        let handler = CommandHandler::new(reg.clone());
        handler.handle(S, "/ping a.test").await;

        tokio::time::sleep(Duration::from_secs(105)).await;
        assert!(notifier.count_containing(S, DIGEST_HEADER) >= 1);
        reg.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_digest_resets_session_clock() {
        let (reg, _, notifier) = registry(settings(60, 120));
        let handler = CommandHandler::new(reg.clone());
        handler.handle(S, "/ping a.test").await;

        tokio::time::sleep(Duration::from_secs(90)).await;
        handler.handle(S, "/ping b.test").await;

        // Clock restarted at t=90, so nothing at t=120 or t=180.
        tokio::time::sleep(Duration::from_secs(110)).await;
        assert_eq!(notifier.count_containing(S, DIGEST_HEADER), 0);

        // b's check at t=210 is the first one past the interval.
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(notifier.count_containing(S, DIGEST_HEADER), 1);
        reg.shutdown();
    }

    #[tokio::test]
    async fn test_dispatch_sends_replies() {
        let (reg, _, notifier) = registry(MonitorSettings::default());
        let handler = CommandHandler::new(reg);
        handler.dispatch(S, "/help").await;
        assert_eq!(notifier.messages_for(S), vec![HELP_TEXT.to_string()]);
    }
}
