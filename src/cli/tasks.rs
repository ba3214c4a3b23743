use anyhow::Result;
use console::style;

use super::{AppContext, flag_value, has_flag};
use crate::core::storefront::extract;
use crate::core::store::types::{CheckoutTaskRecord, MonitorRecord, PriceAlertRecord};
use crate::core::terminal::{GuideSection, print_error, print_success};

// --- Monitors ---

pub async fn monitor_dispatch(args: &[String]) -> Result<()> {
    let sub = if args.len() > 2 { args[2].as_str() } else { "" };
    match sub {
        "add" => monitor_add(args).await,
        "list" => monitor_list(args).await,
        "stop" => monitor_stop(args).await,
        _ => {
            GuideSection::new("Monitors")
                .command("monitor add <url>", "Save a stock monitor [--no-notify]")
                .command("monitor list", "List monitors [--all]")
                .command("monitor stop <id>", "Deactivate a monitor")
                .print();
            Ok(())
        }
    }
}

async fn monitor_add(args: &[String]) -> Result<()> {
    let Some(url) = args.get(3) else {
        print_error("Usage: stockhawk monitor add <product-url> [--no-notify]");
        return Ok(());
    };
    if let Err(e) = extract::validate_product_url(url) {
        print_error(&e.to_string());
        return Ok(());
    }

    let record = MonitorRecord {
        id: uuid::Uuid::new_v4().to_string(),
        product_url: url.clone(),
        notify: !has_flag(args, "--no-notify"),
        active: true,
        created_at: String::new(),
    };
    let ctx = AppContext::init().await?;
    ctx.store.add_monitor(&record).await?;
    print_success(&format!("Monitor saved: {}", record.id));
    println!("   Start it with 'stockhawk run'.");
    Ok(())
}

async fn monitor_list(args: &[String]) -> Result<()> {
    let ctx = AppContext::init().await?;
    let monitors = ctx.store.list_monitors(!has_flag(args, "--all")).await?;
    if monitors.is_empty() {
        println!("No monitors. Add one with 'stockhawk monitor add <url>'.");
        return Ok(());
    }
    let mut section = GuideSection::new("Monitors");
    for m in &monitors {
        let state = if m.active { "active" } else { "stopped" };
        section = section.status(
            &m.id,
            &format!(
                "{} [{}{}]",
                m.product_url,
                state,
                if m.notify { "" } else { ", silent" }
            ),
        );
    }
    section.print();
    println!();
    Ok(())
}

async fn monitor_stop(args: &[String]) -> Result<()> {
    let Some(id) = args.get(3) else {
        print_error("Usage: stockhawk monitor stop <id>");
        return Ok(());
    };
    let ctx = AppContext::init().await?;
    if ctx.store.set_monitor_active(id, false).await? {
        print_success(&format!("Monitor {} deactivated.", id));
        println!("   A running 'stockhawk run' picks this up on its next start.");
    } else {
        print_error(&format!("No monitor with id {}.", id));
    }
    Ok(())
}

// --- Checkout tasks ---

pub async fn task_dispatch(args: &[String]) -> Result<()> {
    let sub = if args.len() > 2 { args[2].as_str() } else { "" };
    match sub {
        "add" => task_add(args).await,
        "list" => task_list(args).await,
        "cancel" => task_cancel(args).await,
        "run" => task_run(args).await,
        _ => {
            GuideSection::new("Checkout tasks")
                .command(
                    "task add <url>",
                    "--profile <name> [--quantity N] [--auto]",
                )
                .command("task run <id>", "Run a saved task once, right now")
                .command("task list", "List tasks [--all]")
                .command("task cancel <id>", "Deactivate a task")
                .print();
            Ok(())
        }
    }
}

async fn task_add(args: &[String]) -> Result<()> {
    let Some(url) = args.get(3).filter(|a| !a.starts_with("--")) else {
        print_error("Usage: stockhawk task add <product-url> --profile <name> [--quantity N] [--auto]");
        return Ok(());
    };
    if let Err(e) = extract::validate_product_url(url) {
        print_error(&e.to_string());
        return Ok(());
    }
    let Some(profile_name) = flag_value(args, "--profile") else {
        print_error("A checkout task needs --profile <name>.");
        return Ok(());
    };
    let quantity: u32 = flag_value(args, "--quantity")
        .and_then(|q| q.parse().ok())
        .unwrap_or(1)
        .max(1);

    let ctx = AppContext::init().await?;
    // Resolve the profile now and pin its id; renaming or editing the
    // profile later must not change which details this task ships with.
    let Some(profile) = ctx.store.get_profile_by_name(profile_name).await? else {
        print_error(&format!(
            "No profile named '{}'. Create it with 'stockhawk profile add'.",
            profile_name
        ));
        return Ok(());
    };

    let record = CheckoutTaskRecord {
        id: uuid::Uuid::new_v4().to_string(),
        product_url: url.clone(),
        profile_id: profile.id.clone(),
        profile_name: profile.name.clone(),
        quantity,
        auto_checkout: has_flag(args, "--auto"),
        active: true,
        created_at: String::new(),
    };
    ctx.store.add_checkout_task(&record).await?;
    print_success(&format!("Checkout task saved: {}", record.id));
    if record.auto_checkout {
        println!("   'stockhawk run' will hunt this product and check out when it stocks.");
    } else {
        println!("   Run it with 'stockhawk task run {}'.", record.id);
    }
    Ok(())
}

async fn task_list(args: &[String]) -> Result<()> {
    let ctx = AppContext::init().await?;
    let records = ctx
        .store
        .list_checkout_tasks(!has_flag(args, "--all"))
        .await?;
    if records.is_empty() {
        println!("No checkout tasks. Add one with 'stockhawk task add <url> --profile <name>'.");
        return Ok(());
    }
    let mut section = GuideSection::new("Checkout tasks");
    for t in &records {
        let mode = if t.auto_checkout { "auto" } else { "manual" };
        let state = if t.active { "active" } else { "cancelled" };
        section = section.status(
            &t.id,
            &format!(
                "{} x{} profile={} [{}, {}]",
                t.product_url, t.quantity, t.profile_name, mode, state
            ),
        );
    }
    section.print();
    println!();
    Ok(())
}

async fn task_cancel(args: &[String]) -> Result<()> {
    let Some(id) = args.get(3) else {
        print_error("Usage: stockhawk task cancel <id>");
        return Ok(());
    };
    let ctx = AppContext::init().await?;
    if ctx.store.set_task_active(id, false).await? {
        print_success(&format!("Checkout task {} cancelled.", id));
    } else {
        print_error(&format!("No checkout task with id {}.", id));
    }
    Ok(())
}

async fn task_run(args: &[String]) -> Result<()> {
    let Some(id) = args.get(3) else {
        print_error("Usage: stockhawk task run <id>");
        return Ok(());
    };
    super::init_tracing();
    let ctx = AppContext::init().await?;
    let Some(task) = ctx.store.get_checkout_task(id).await? else {
        print_error(&format!("No checkout task with id {}.", id));
        return Ok(());
    };
    let Some(profile) = ctx.store.get_profile(&task.profile_id).await? else {
        print_error(&format!(
            "Profile '{}' pinned by this task no longer exists.",
            task.profile_name
        ));
        return Ok(());
    };

    let mut runner = match crate::core::checkout::CheckoutRunner::new(
        &task.product_url,
        profile,
        task.quantity,
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
        Ok(()) => {
            ctx.store.set_task_active(id, false).await?;
            print_success("Checkout is ready at the payment step. Finish the order in your browser.");
        }
        Err(failure) => print_error(&failure.to_string()),
    }
    Ok(())
}

// --- Price alerts ---

pub async fn alert_dispatch(args: &[String]) -> Result<()> {
    let sub = if args.len() > 2 { args[2].as_str() } else { "" };
    match sub {
        "add" => alert_add(args).await,
        "list" => alert_list(args).await,
        "cancel" => alert_cancel(args).await,
        _ => {
            GuideSection::new("Price alerts")
                .command("alert add <url>", "--target <price>")
                .command("alert list", "List alerts [--all]")
                .command("alert cancel <id>", "Deactivate an alert")
                .print();
            Ok(())
        }
    }
}

async fn alert_add(args: &[String]) -> Result<()> {
    let Some(url) = args.get(3).filter(|a| !a.starts_with("--")) else {
        print_error("Usage: stockhawk alert add <product-url> --target <price>");
        return Ok(());
    };
    if let Err(e) = extract::validate_product_url(url) {
        print_error(&e.to_string());
        return Ok(());
    }
    let Some(target) = flag_value(args, "--target").and_then(|t| t.parse::<f64>().ok()) else {
        print_error("A price alert needs --target <price>, e.g. --target 59.99");
        return Ok(());
    };
    if target <= 0.0 {
        print_error("Target price must be positive.");
        return Ok(());
    }

    let record = PriceAlertRecord {
        id: uuid::Uuid::new_v4().to_string(),
        product_url: url.clone(),
        target_price: target,
        active: true,
        created_at: String::new(),
    };
    let ctx = AppContext::init().await?;
    ctx.store.add_price_alert(&record).await?;
    print_success(&format!(
        "Price alert saved: {} (fires at {:.2})",
        record.id, target
    ));
    println!("   Start it with 'stockhawk run'.");
    Ok(())
}

async fn alert_list(args: &[String]) -> Result<()> {
    let ctx = AppContext::init().await?;
    let alerts = ctx.store.list_price_alerts(!has_flag(args, "--all")).await?;
    if alerts.is_empty() {
        println!("No price alerts. Add one with 'stockhawk alert add <url> --target <price>'.");
        return Ok(());
    }
    let mut section = GuideSection::new("Price alerts");
    for a in &alerts {
        let state = if a.active { "active" } else { "done" };
        section = section.status(
            &a.id,
            &format!(
                "{} at {} [{}]",
                a.product_url,
                style(format!("{:.2}", a.target_price)).green(),
                state
            ),
        );
    }
    section.print();
    println!();
    Ok(())
}

async fn alert_cancel(args: &[String]) -> Result<()> {
    let Some(id) = args.get(3) else {
        print_error("Usage: stockhawk alert cancel <id>");
        return Ok(());
    };
    let ctx = AppContext::init().await?;
    if ctx.store.set_alert_active(id, false).await? {
        print_success(&format!("Price alert {} cancelled.", id));
    } else {
        print_error(&format!("No price alert with id {}.", id));
    }
    Ok(())
}
