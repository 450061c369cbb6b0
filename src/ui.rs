use crossterm::style::Stylize;
use std::io::Write;

pub fn speaking(text: &str) {
    println!("\r{} {}", "♪".magenta(), text.magenta());
    std::io::stdout().flush().ok();
}

pub fn show_interim(text: &str) {
    print!("\r\x1b[K{}", text.dark_grey());
    std::io::stdout().flush().ok();
}

pub fn show_final(text: &str) {
    println!("\r\x1b[K> {}", text);
}

pub fn command(description: &str) {
    println!("{} {}", "⌘".cyan(), description.cyan());
}

pub fn info(message: &str) {
    println!("{}", message.dark_grey());
}

pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red(), message.red());
}

pub fn response(json: &str) {
    println!("{}", json.green());
}
