//! The long-running commands: foreground watching and tracking, one-shot
//! and hunting checkouts, and the `run` daemon that resumes everything
//! still active in the store.

use anyhow::Result;
use tracing::{info, warn};

use super::{AppContext, flag_value, has_flag, init_tracing};
use crate::core::checkout::CheckoutRunner;
use crate::core::monitor::{PriceWatcher, StockMonitor};
use crate::core::registry::{RunningTask, TaskRegistry};
use crate::core::storefront::extract;
use crate::core::terminal::{print_error, print_info, print_status, print_success, print_warn};
use crate::core::tracker::VariantTracker;

/// `watch <url>`: a stock monitor in the foreground until Ctrl+C.
pub async fn watch(args: &[String]) -> Result<()> {
    let Some(url) = args.get(2).filter(|a| !a.starts_with("--")) else {
        print_error("Usage: stockhawk watch <product-url> [--no-notify]");
        return Ok(());
    };
    if let Err(e) = extract::validate_product_url(url) {
        print_error(&e.to_string());
        return Ok(());
    }

    init_tracing();
    let ctx = AppContext::init().await?;
    let monitor = StockMonitor::new(
        url,
        ctx.storefront()?,
        ctx.notifier(),
        !has_flag(args, "--no-notify"),
        ctx.config.monitor_interval(),
        ctx.config.monitor_backoff(),
    );
    let cancel = monitor.cancel_token();
    let handle = tokio::spawn(monitor.run());

    print_status("Watching", url);
    print_info("Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    cancel.cancel();
    let _ = handle.await;
    print_success("Monitor stopped.");
    Ok(())
}

/// `track <url>`: poll the variant list and print each diff as it lands.
pub async fn track(args: &[String]) -> Result<()> {
    let Some(url) = args.get(2).filter(|a| !a.starts_with("--")) else {
        print_error("Usage: stockhawk track <product-url>");
        return Ok(());
    };
    if let Err(e) = extract::validate_product_url(url) {
        print_error(&e.to_string());
        return Ok(());
    }

    init_tracing();
    let ctx = AppContext::init().await?;
    let mut tracker = VariantTracker::new(
        ctx.storefront()?,
        ctx.config.tracker_spacing(),
        ctx.config.tracker_cooldown(),
    );

    print_status("Tracking", url);
    print_info("Press Ctrl+C to stop.");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changes = tracker.track_changes(url) => {
                if let Some(diff) = changes {
                    for v in &diff.new_variants {
                        print_info(&format!("new variant: {} ({}) at {}", v.title, v.id, v.price));
                    }
                    for v in &diff.removed_variants {
                        print_info(&format!("removed variant: {} ({})", v.title, v.id));
                    }
                    for p in &diff.price_changes {
                        print_info(&format!(
                            "price change: {} {} -> {}",
                            p.title, p.old_price, p.new_price
                        ));
                    }
                    for s in &diff.stock_changes {
                        let state = if s.available { "in stock" } else { "out of stock" };
                        print_info(&format!("stock change: {} is now {}", s.title, state));
                    }
                }
                tokio::time::sleep(ctx.config.monitor_interval()).await;
            }
        }
    }
    print_success("Tracker stopped.");
    Ok(())
}

fn resolve_profile_flag(args: &[String]) -> Option<&str> {
    flag_value(args, "--profile")
}

/// `checkout <url> --profile <name>`: one attempt, right now.
pub async fn checkout(args: &[String]) -> Result<()> {
    let Some(url) = args.get(2).filter(|a| !a.starts_with("--")) else {
        print_error("Usage: stockhawk checkout <product-url> --profile <name> [--quantity N]");
        return Ok(());
    };
    let Some(profile_name) = resolve_profile_flag(args) else {
        print_error("checkout needs --profile <name>.");
        return Ok(());
    };

    init_tracing();
    let ctx = AppContext::init().await?;
    let Some(profile) = ctx.store.get_profile_by_name(profile_name).await? else {
        print_error(&format!("No profile named '{}'.", profile_name));
        return Ok(());
    };
    let quantity = flag_value(args, "--quantity")
        .and_then(|q| q.parse().ok())
        .unwrap_or(1);

    let mut runner = match CheckoutRunner::new(
        url,
        profile,
        quantity,
        ctx.storefront()?,
        ctx.notifier(),
        ctx.config.hunt_interval(),
        ctx.config.hunt_backoff(),
    ) {
        Ok(runner) => runner,
        Err(e) => {
            print_error(&e.to_string());
            return Ok(());
        }
    };

    match runner.run_once().await {
        Ok(()) => print_success(
            "Checkout is ready at the payment step. Finish the order in your browser.",
        ),
        Err(failure) => print_error(&failure.to_string()),
    }
    Ok(())
}

/// `hunt <url> --profile <name>`: wait for stock, then check out.
pub async fn hunt(args: &[String]) -> Result<()> {
    let Some(url) = args.get(2).filter(|a| !a.starts_with("--")) else {
        print_error("Usage: stockhawk hunt <product-url> --profile <name> [--quantity N]");
        return Ok(());
    };
    let Some(profile_name) = resolve_profile_flag(args) else {
        print_error("hunt needs --profile <name>.");
        return Ok(());
    };

    init_tracing();
    let ctx = AppContext::init().await?;
    let Some(profile) = ctx.store.get_profile_by_name(profile_name).await? else {
        print_error(&format!("No profile named '{}'.", profile_name));
        return Ok(());
    };
    let quantity = flag_value(args, "--quantity")
        .and_then(|q| q.parse().ok())
        .unwrap_or(1);

    let mut runner = match CheckoutRunner::new(
        url,
        profile,
        quantity,
        ctx.storefront()?,
        ctx.notifier(),
        ctx.config.hunt_interval(),
        ctx.config.hunt_backoff(),
    ) {
        Ok(runner) => runner,
        Err(e) => {
            print_error(&e.to_string());
            return Ok(());
        }
    };
    let cancel = runner.cancel_token();

    print_status("Hunting", url);
    print_info("Press Ctrl+C to stop.");
    let mut handle = tokio::spawn(async move { runner.hunt().await });
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            let _ = handle.await;
            print_success("Hunt stopped.");
        }
        result = &mut handle => {
            match result {
                Ok(true) => print_success(
                    "Checkout is ready at the payment step. Finish the order in your browser.",
                ),
                _ => print_error("Hunt ended without reaching the payment step."),
            }
        }
    }
    Ok(())
}

/// `run`: resume every active monitor, auto checkout task, and price
/// alert from the store and drive them until Ctrl+C.
pub async fn run_daemon() -> Result<()> {
    init_tracing();
    let ctx = AppContext::init().await?;
    let registry = TaskRegistry::new();
    let notifier = ctx.notifier();

    for record in ctx.store.list_monitors(true).await? {
        let monitor = StockMonitor::new(
            &record.product_url,
            ctx.storefront()?,
            notifier.clone(),
            record.notify,
            ctx.config.monitor_interval(),
            ctx.config.monitor_backoff(),
        );
        let cancel = monitor.cancel_token();
        let registry_handle = registry.clone();
        let id = record.id.clone();
        let handle = tokio::spawn(async move {
            monitor.run().await;
            registry_handle.finish(&id).await;
        });
        registry
            .insert(&record.id, RunningTask { cancel, handle })
            .await;
        info!("resumed monitor {} for {}", record.id, record.product_url);
    }

    for task in ctx.store.list_checkout_tasks(true).await? {
        if !task.auto_checkout {
            continue;
        }
        let Some(profile) = ctx.store.get_profile(&task.profile_id).await? else {
            print_warn(&format!(
                "Task {} pins profile '{}' which no longer exists; skipping it.",
                task.id, task.profile_name
            ));
            continue;
        };
        let mut runner = match CheckoutRunner::new(
            &task.product_url,
            profile,
            task.quantity,
            ctx.storefront()?,
            notifier.clone(),
            ctx.config.hunt_interval(),
            ctx.config.hunt_backoff(),
        ) {
            Ok(runner) => runner,
            Err(e) => {
                warn!("task {} has an invalid product URL: {}", task.id, e);
                continue;
            }
        };
        let cancel = runner.cancel_token();
        let registry_handle = registry.clone();
        let store = ctx.store.clone();
        let id = task.id.clone();
        let handle = tokio::spawn(async move {
            if runner.hunt().await {
                // Terminal success: the task is spent.
                if let Err(e) = store.set_task_active(&id, false).await {
                    warn!("could not mark task {} done: {}", id, e);
                }
            }
            registry_handle.finish(&id).await;
        });
        registry
            .insert(&task.id, RunningTask { cancel, handle })
            .await;
        info!("resumed checkout hunt {} for {}", task.id, task.product_url);
    }

    for alert in ctx.store.list_price_alerts(true).await? {
        let watcher = PriceWatcher::new(
            &alert.product_url,
            alert.target_price,
            ctx.storefront()?,
            notifier.clone(),
            ctx.config.alert_interval(),
        );
        let cancel = watcher.cancel_token();
        let registry_handle = registry.clone();
        let store = ctx.store.clone();
        let id = alert.id.clone();
        let handle = tokio::spawn(async move {
            if watcher.run().await {
                if let Err(e) = store.set_alert_active(&id, false).await {
                    warn!("could not mark alert {} done: {}", id, e);
                }
            }
            registry_handle.finish(&id).await;
        });
        registry
            .insert(&alert.id, RunningTask { cancel, handle })
            .await;
        info!("resumed price alert {} for {}", alert.id, alert.product_url);
    }

    let running = registry.len().await;
    if running == 0 {
        print_info("Nothing to resume: no active monitors, tasks, or alerts.");
        return Ok(());
    }
    print_success(&format!("Running {} task(s). Press Ctrl+C to stop.", running));

    tokio::signal::ctrl_c().await?;
    info!("shutting down, waiting for tasks to wind down");
    registry.stop_all().await;
    print_success("All tasks stopped.");
    Ok(())
}
