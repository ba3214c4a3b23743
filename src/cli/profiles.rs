use anyhow::Result;
use console::style;

use super::{AppContext, flag_value};
use crate::core::store::types::Profile;
use crate::core::terminal::{GuideSection, print_error, print_success};

pub async fn dispatch(args: &[String]) -> Result<()> {
    let sub = if args.len() > 2 { args[2].as_str() } else { "" };
    match sub {
        "add" => add(args).await,
        "list" => list().await,
        "remove" => remove(args).await,
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    GuideSection::new("Profiles")
        .command(
            "profile add <name>",
            "--first-name --last-name --email --address1 [--address2] --city --zip --phone",
        )
        .command("profile list", "List saved shipping profiles")
        .command("profile remove <name>", "Delete a profile")
        .print();
}

async fn add(args: &[String]) -> Result<()> {
    let Some(name) = args.get(3).filter(|a| !a.starts_with("--")) else {
        print_error("Usage: stockhawk profile add <name> --first-name ... (see 'profile')");
        return Ok(());
    };

    let required = [
        "--first-name",
        "--last-name",
        "--email",
        "--address1",
        "--city",
        "--zip",
        "--phone",
    ];
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|flag| flag_value(args, flag).is_none())
        .collect();
    if !missing.is_empty() {
        print_error(&format!("Missing required flags: {}", missing.join(", ")));
        return Ok(());
    }

    let profile = Profile {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.clone(),
        first_name: flag_value(args, "--first-name").unwrap_or_default().to_string(),
        last_name: flag_value(args, "--last-name").unwrap_or_default().to_string(),
        email: flag_value(args, "--email").unwrap_or_default().to_string(),
        address1: flag_value(args, "--address1").unwrap_or_default().to_string(),
        address2: flag_value(args, "--address2").map(str::to_string),
        city: flag_value(args, "--city").unwrap_or_default().to_string(),
        zip: flag_value(args, "--zip").unwrap_or_default().to_string(),
        phone: flag_value(args, "--phone").unwrap_or_default().to_string(),
    };

    let ctx = AppContext::init().await?;
    let existed = ctx.store.get_profile_by_name(name).await?.is_some();
    ctx.store.upsert_profile(&profile).await?;
    if existed {
        print_success(&format!("Profile '{}' updated.", name));
    } else {
        print_success(&format!("Profile '{}' saved.", name));
    }
    Ok(())
}

async fn list() -> Result<()> {
    let ctx = AppContext::init().await?;
    let profiles = ctx.store.list_profiles().await?;
    if profiles.is_empty() {
        println!("No profiles saved. Add one with 'stockhawk profile add <name> ...'");
        return Ok(());
    }
    for profile in profiles {
        let address2 = profile
            .address2
            .as_deref()
            .map(|a| format!(", {}", a))
            .unwrap_or_default();
        GuideSection::new(&profile.name)
            .status("Name", &format!("{} {}", profile.first_name, profile.last_name))
            .status("Email", &profile.email)
            .status(
                "Address",
                &format!("{}{}, {} {}", profile.address1, address2, profile.city, profile.zip),
            )
            .status("Phone", &profile.phone)
            .status("Id", &style(&profile.id).dim().to_string())
            .print();
    }
    println!();
    Ok(())
}

async fn remove(args: &[String]) -> Result<()> {
    let Some(name) = args.get(3) else {
        print_error("Usage: stockhawk profile remove <name>");
        return Ok(());
    };
    let ctx = AppContext::init().await?;
    if ctx.store.remove_profile(name).await? {
        print_success(&format!("Profile '{}' removed.", name));
    } else {
        print_error(&format!("No profile named '{}'.", name));
    }
    Ok(())
}
