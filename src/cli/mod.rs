mod engine;
mod profiles;
mod tasks;

use std::sync::Arc;

use anyhow::Result;
use console::style;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::core::config::{self, Config};
use crate::core::storefront::{HttpStorefront, Storefront};
use crate::core::store::TaskStore;
use crate::core::terminal::{self, GuideSection, print_error};
use crate::notify::{LogNotifier, Notifier, WebhookNotifier};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Watching")
        .command("watch <url>", "Monitor a product's stock in the foreground")
        .command("track <url>", "Poll a product and print variant changes")
        .command("monitor add <url>", "Save a stock monitor for the run daemon")
        .command("monitor list", "List saved monitors")
        .command("monitor stop <id>", "Deactivate a saved monitor")
        .print();

    GuideSection::new("Buying")
        .command("checkout <url>", "Run one checkout attempt now")
        .command("hunt <url>", "Wait for stock, then check out automatically")
        .command("task add <url>", "Save a checkout task")
        .command("task run <id>", "Run a saved checkout task once")
        .command("task list", "List saved checkout tasks")
        .command("task cancel <id>", "Deactivate a saved checkout task")
        .print();

    GuideSection::new("Profiles & Alerts")
        .command("profile add <name>", "Save a shipping profile")
        .command("profile list", "List shipping profiles")
        .command("profile remove <name>", "Delete a shipping profile")
        .command("alert add <url>", "Save a price alert (--target <price>)")
        .command("alert list", "List price alerts")
        .command("alert cancel <id>", "Deactivate a price alert")
        .print();

    GuideSection::new("Daemon")
        .command("run", "Resume every active monitor, task and alert")
        .blank()
        .info("All checkouts stop at the payment step; payment is always completed manually.")
        .print();

    println!(
        "\n {} {} <command> [args]\n",
        style("Usage:").bold(),
        style("stockhawk").green()
    );
}

/// Shared handles for one CLI invocation: config plus the task store.
pub(crate) struct AppContext {
    pub config: Config,
    pub store: Arc<TaskStore>,
}

impl AppContext {
    pub async fn init() -> Result<Self> {
        let data_dir = config::data_dir();
        let config = Config::load(&data_dir).await?;
        let store = Arc::new(TaskStore::open(&data_dir)?);
        Ok(Self { config, store })
    }

    /// A fresh HTTP client per task: each monitor or checkout keeps its
    /// own cookie jar.
    pub fn storefront(&self) -> Result<Arc<dyn Storefront>> {
        Ok(Arc::new(HttpStorefront::new(self.config.http_timeout())?))
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        match &self.config.notify.webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
            None => Arc::new(LogNotifier),
        }
    }
}

/// Structured logging for the long-running commands. Management commands
/// skip this and speak through the styled terminal helpers only.
pub(crate) fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

/// Value following a `--flag`, if present.
pub(crate) fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

pub(crate) fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    match args[1].as_str() {
        "watch" => engine::watch(&args).await,
        "track" => engine::track(&args).await,
        "checkout" => engine::checkout(&args).await,
        "hunt" => engine::hunt(&args).await,
        "run" => engine::run_daemon().await,
        "profile" => profiles::dispatch(&args).await,
        "monitor" => tasks::monitor_dispatch(&args).await,
        "task" => tasks::task_dispatch(&args).await,
        "alert" => tasks::alert_dispatch(&args).await,
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        other => {
            print_error(&format!("Unknown command: {}", other));
            print_help();
            Ok(())
        }
    }
}
