use console::{Emoji, style};

pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static INFO_ICON: Emoji<'_, '_> = Emoji("ℹ️  ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_info(msg: &str) {
    println!("{} {}", INFO_ICON, style(msg).blue());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_status(label: &str, msg: &str) {
    println!("  {} {}: {}", GEAR, style(label).bold().cyan(), msg);
}

pub fn print_banner() {
    let lines: &[&str] = &[
        r"      _             _    _                    _    ",
        r"  ___| |_ ___   ___| | _| |__   __ ___      _| | __",
        r" / __| __/ _ \ / __| |/ / '_ \ / _` \ \ /\ / / |/ /",
        r" \__ \ || (_) | (__|   <| | | | (_| |\ V  V /|   < ",
        r" |___/\__\___/ \___|_|\_\_| |_|\__,_| \_/\_/ |_|\_\",
    ];
    println!();
    for line in lines {
        println!("{}", style(line).cyan());
    }
    println!(
        "{}\n",
        style(" Watches the shelves so you don't have to.").dim()
    );
}

/// A titled block of aligned rows for CLI output.
pub struct GuideSection {
    title: String,
    rows: Vec<Row>,
}

enum Row {
    Command(String, String),
    Status(String, String),
    Info(String),
    Blank,
}

impl GuideSection {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            rows: Vec::new(),
        }
    }

    pub fn command(mut self, cmd: &str, description: &str) -> Self {
        self.rows
            .push(Row::Command(cmd.to_string(), description.to_string()));
        self
    }

    pub fn status(mut self, label: &str, value: &str) -> Self {
        self.rows
            .push(Row::Status(label.to_string(), value.to_string()));
        self
    }

    pub fn info(mut self, text: &str) -> Self {
        self.rows.push(Row::Info(text.to_string()));
        self
    }

    pub fn blank(mut self) -> Self {
        self.rows.push(Row::Blank);
        self
    }

    pub fn print(self) {
        println!("\n {}", style(&self.title).bold().underlined());
        let width = self
            .rows
            .iter()
            .filter_map(|row| match row {
                Row::Command(cmd, _) => Some(cmd.len()),
                Row::Status(label, _) => Some(label.len()),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        for row in &self.rows {
            match row {
                Row::Command(cmd, description) => {
                    println!(
                        "   {}  {}",
                        style(format!("{cmd:width$}")).green(),
                        description
                    );
                }
                Row::Status(label, value) => {
                    println!("   {}  {}", style(format!("{label:width$}")).cyan(), value);
                }
                Row::Info(text) => println!("   {}", text),
                Row::Blank => println!(),
            }
        }
    }
}
