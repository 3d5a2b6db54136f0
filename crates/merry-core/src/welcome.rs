//! Banner printed when the CLI runs without a command

use colored::Colorize;

pub fn banner(description: &str, version: &str) -> String {
    let m = |s: &str| s.blue().to_string();
    let e = |s: &str| s.magenta().to_string();
    let r = |s: &str| s.green().to_string();
    let r2 = |s: &str| s.bright_red().to_string();
    let y = |s: &str| s.yellow().to_string();

    [
        String::new(),
        description.dimmed().to_string(),
        String::new(),
        format!("{}   {}  {} {} {}  {}", m("88888b.d88b."), e(".d88b."), r("888d888"), r2("888d888"), y("888"), y("888")),
        format!("{} {} {}   {}   {}  {}", m("888 \"888 \"88b"), e("d8P  Y8b"), r("888P\""), r2("888P\""), y("888"), y("888")),
        format!("{} {} {}     {}     {}  {}", m("888  888  888"), e("88888888"), r("888"), r2("888"), y("888"), y("888")),
        format!("{} {}     {}     {}     {} {}", m("888  888  888"), e("Y8b."), r("888"), r2("888"), y("Y88b"), y("888")),
        format!("{}  {}  {}     {}      {}", m("888  888  888"), e("\"Y8888"), r("888"), r2("888"), y("\"Y88888")),
        format!("{}{}", " ".repeat(44), y("888")),
        format!("{}{}", " ".repeat(39), y("Y8b d88P")),
        format!("{}{}", " ".repeat(40), y("\"Y88P\"")),
        String::new(),
        version.cyan().to_string(),
        String::new(),
    ]
    .join("\n")
}

pub fn print(description: &str, version: &str) {
    println!("{}", banner(description, version));
}
