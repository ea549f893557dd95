//! Console title banner printed by the binaries at startup

use std::io::Write;

/// Render a boxed title
///
/// ```text
/// ************
/// *   Chat   *
/// ************
/// ```
/// (the asterisk row is three times the title length)
pub fn title_banner(title: &str) -> String {
    let width = title.chars().count();
    let stars = "*".repeat(width * 3);
    let spaces = " ".repeat(width.saturating_sub(1));
    format!("\n{stars}\n*{spaces}{title}{spaces}*\n{stars}\n")
}

/// Clear the terminal and move the cursor home
pub fn clear_console() -> std::io::Result<()> {
    let mut out = std::io::stdout();
    out.write_all(b"\x1B[2J\x1B[1;1H")?;
    out.flush()
}

/// Optionally clear the terminal, then print the banner
pub fn print_title(title: &str, clear: bool) {
    if clear && clear_console().is_err() {
        eprintln!("Failed to clear console");
    }
    println!("{}", title_banner(title));
}
