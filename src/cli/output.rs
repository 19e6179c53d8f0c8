//! Terminal output formatting with colors
//!
//! Respects NO_COLOR, CLICOLOR, CLICOLOR_FORCE automatically.

use colored::Colorize;

use crate::domain::{Node, NodePayload};

/// Print error (red bold "error:" prefix) to stderr
pub fn error(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "error".red().bold(), msg);
}

/// Print success status (green checkmark)
pub fn success(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{} {}", "✓".green(), msg);
}

/// Print completed action (green label)
pub fn action(label: &str, msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}: {}", label.green(), msg);
}

/// Print section header (cyan bold)
pub fn header(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg.to_string().cyan().bold());
}

/// Print indented detail (no color)
pub fn detail(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("  {}", msg);
}

/// Print plain output (no color, for data)
pub fn info(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg);
}

/// One-line rendering of a node: id, name, type, height and its own attributes.
pub fn node_line(node: &Node) -> String {
    let attrs = match &node.payload {
        NodePayload::Corporation => String::new(),
        NodePayload::Building { zip_code } => format!(" zip_code={zip_code}"),
        NodePayload::Property { monthly_rent } => format!(" monthly_rent={monthly_rent}"),
        NodePayload::TenancyPeriod { active } => format!(" active={active}"),
        NodePayload::Tenant {
            active,
            moved_in_date,
        } => match active {
            Some(a) => format!(" active={a} moved_in_date={moved_in_date}"),
            None => format!(" moved_in_date={moved_in_date}"),
        },
    };
    format!(
        "{} {} {}{}",
        format!("[{}]", node.id).dimmed(),
        node.name.bold(),
        format!("({}, height {})", node.kind(), node.height).cyan(),
        attrs
    )
}
