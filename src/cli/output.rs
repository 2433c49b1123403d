//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the deepsearch CLI.
//! Progress goes to stderr so the streamed answer on stdout can be piped.

use owo_colors::OwoColorize;
use std::io::{self, Write};

use crate::types::{Action, Annotation, NextAction, SourceRef};

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the deepsearch banner
    pub fn banner(&self) {
        if self.colored {
            eprintln!(
                "\n   {} {}\n",
                "deepsearch".bright_cyan().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            eprintln!("\n   deepsearch v{}\n", env!("CARGO_PKG_VERSION"));
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✓".green().bold(), message.green());
        } else {
            eprintln!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "•".blue(), message);
        } else {
            eprintln!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            eprintln!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a step message (for multi-step operations)
    pub fn step(&self, step_num: u32, total: u32, message: &str) {
        if self.colored {
            eprintln!(
                "  {} {}",
                format!("[{}/{}]", step_num, total).dimmed(),
                message.bright_white()
            );
        } else {
            eprintln!("  [{}/{}] {}", step_num, total, message);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            eprintln!("\n  {}", title.bright_white().bold().underline());
        } else {
            eprintln!("\n  === {} ===", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            eprintln!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            eprintln!("    {}: {}", key, value);
        }
    }

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        if self.colored {
            eprintln!("    {} {}", "•".blue(), item);
        } else {
            eprintln!("    - {}", item);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            eprintln!("\n  {} {}", "💡".dimmed(), message.dimmed().italic());
        } else {
            eprintln!("\n  [TIP] {}", message);
        }
    }

    /// Render a progress annotation; `step` is the 1-based decision number
    pub fn annotation(&self, step: u32, budget: u32, annotation: &Annotation) {
        match annotation {
            Annotation::NewAction { action } => self.step(step, budget, &describe_action(action)),
            Annotation::EvidenceBatch { query, sources } => self.evidence(query, sources),
        }
    }

    fn evidence(&self, query: &str, sources: &[SourceRef]) {
        if sources.is_empty() {
            self.warning(&format!("No results for \"{}\"", query));
            return;
        }
        for source in sources {
            let line = format!("{}. {} <{}>", source.rank, source.title, source.url);
            if source.scraped {
                self.list_item(&line);
            } else if self.colored {
                eprintln!("    {} {} {}", "○".yellow(), line.dimmed(), "(not scraped)".yellow());
            } else {
                eprintln!("    - {} (not scraped)", line);
            }
        }
    }

    /// Write a chunk of the answer to stdout without a newline
    pub fn answer_chunk(&self, chunk: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(chunk.as_bytes())?;
        stdout.flush()
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }
}

/// One-line description of a decision, e.g. `Search: "rust 1.80" (Release notes)`
pub fn describe_action(next: &NextAction) -> String {
    let base = match &next.action {
        Action::Search { query } => format!("Search: \"{}\"", query),
        Action::Answer => "Answer".to_string(),
    };
    match &next.title {
        Some(title) => format!("{} ({})", base, title),
        None => base,
    }
}
