//! Terminal output for the steward-server CLI
//!
//! Every line goes through [`Output`], which knows whether to color. The
//! `render_*` functions build plain text so the layout can be tested
//! without a terminal.

use owo_colors::OwoColorize;

use crate::utils::toml_config::{ConfigWarning, ConfigWarningKind};
use crate::workflows::{ApprovalType, Step, StepKind, WorkflowDefinition};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tone {
    Ok,
    Note,
    Warn,
    Fail,
}

impl Tone {
    fn tag(self) -> &'static str {
        match self {
            Tone::Ok => "[OK]",
            Tone::Note => "[INFO]",
            Tone::Warn => "[WARN]",
            Tone::Fail => "[ERROR]",
        }
    }
}

/// CLI printer, colored unless `--no-color` was given
pub struct Output {
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    pub fn new() -> Self {
        Self { colored: true }
    }

    pub fn no_color() -> Self {
        Self { colored: false }
    }

    fn status(&self, tone: Tone, message: &str) {
        if !self.colored {
            match tone {
                Tone::Fail => eprintln!("  {} {}", tone.tag(), message),
                _ => println!("  {} {}", tone.tag(), message),
            }
            return;
        }
        match tone {
            Tone::Ok => println!("  {} {}", "✓".green().bold(), message),
            Tone::Note => println!("  {} {}", "•".blue(), message),
            Tone::Warn => println!("  {} {}", "!".yellow().bold(), message.yellow()),
            Tone::Fail => eprintln!("  {} {}", "✗".red().bold(), message.red()),
        }
    }

    pub fn ok(&self, message: &str) {
        self.status(Tone::Ok, message);
    }

    pub fn note(&self, message: &str) {
        self.status(Tone::Note, message);
    }

    pub fn warn(&self, message: &str) {
        self.status(Tone::Warn, message);
    }

    /// Printed to stderr
    pub fn fail(&self, message: &str) {
        self.status(Tone::Fail, message);
    }

    /// One-line banner with the crate version
    pub fn banner(&self) {
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        if self.colored {
            println!("\n  {} {}\n", "steward".bright_cyan().bold(), version.dimmed());
        } else {
            println!("\n  steward {}\n", version);
        }
    }

    pub fn title(&self, text: &str) {
        if self.colored {
            println!("\n  {}", text.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", text);
        }
    }

    pub fn section(&self, text: &str) {
        if self.colored {
            println!("\n  {}", text.cyan().bold());
        } else {
            println!("\n  --- {} ---", text);
        }
    }

    pub fn field(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {:<14} {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {:<14} {}", key, value);
        }
    }

    /// Report a scaffolded path; `kept` is set when an existing file was
    /// left alone
    pub fn scaffolded(&self, path: &str, kept: Option<&str>) {
        match (kept, self.colored) {
            (None, true) => println!("  {} {}", "+".green().bold(), path.bright_white()),
            (None, false) => println!("  [CREATED] {}", path),
            (Some(reason), true) => println!("  {} {} ({})", "=".yellow(), path.dimmed(), reason),
            (Some(reason), false) => println!("  [KEPT] {} ({})", path, reason),
        }
    }

    /// A numbered follow-up with the command to run
    pub fn next_step(&self, n: usize, description: &str, command: &str) {
        if self.colored {
            println!("  {}. {}", n, description);
            println!("       {}", format!("$ {}", command).bright_cyan());
        } else {
            println!("  {}. {}", n, description);
            println!("       $ {}", command);
        }
    }

    pub fn workflow_table(&self, workflows: &[WorkflowDefinition]) {
        let mut rows = render_workflow_rows(workflows).into_iter();
        if let Some(header) = rows.next() {
            if self.colored {
                println!("    {}", header.bright_white().bold());
            } else {
                println!("    {}", header);
            }
        }
        for row in rows {
            println!("    {}", row);
        }
    }

    pub fn steps(&self, steps: &[Step]) {
        for (i, step) in steps.iter().enumerate() {
            let line = render_step(step);
            if self.colored {
                println!("    {} {}", format!("{:>2}.", i + 1).dimmed(), line);
            } else {
                println!("    {:>2}. {}", i + 1, line);
            }
        }
    }

    pub fn config_warnings(&self, warnings: &[ConfigWarning]) {
        for warning in warnings {
            self.warn(&render_warning(warning));
        }
    }
}

/// Header plus one row per workflow, columns sized to the widest id
pub fn render_workflow_rows(workflows: &[WorkflowDefinition]) -> Vec<String> {
    let width = workflows
        .iter()
        .map(|w| w.id.len())
        .chain(std::iter::once("ID".len()))
        .max()
        .unwrap_or(2);

    let mut rows = vec![format!("{:<width$}  {:>5}  {}", "ID", "STEPS", "NAME")];
    rows.extend(
        workflows
            .iter()
            .map(|w| format!("{:<width$}  {:>5}  {}", w.id, w.steps.len(), w.name)),
    );
    rows
}

pub fn render_step(step: &Step) -> String {
    match &step.kind {
        StepKind::Action { action_type, .. } => format!("{}  action {}", step.id, action_type),
        StepKind::Approval {
            approvers,
            approval_type,
            timeout_secs,
        } => {
            let rule = match approval_type {
                ApprovalType::Any => "any of".to_string(),
                ApprovalType::All => "all of".to_string(),
                ApprovalType::Quorum(n) => format!("{} of", n),
            };
            let approvers: Vec<&str> = approvers.iter().map(String::as_str).collect();
            format!(
                "{}  approval by {} [{}], expires after {}",
                step.id,
                rule,
                approvers.join(", "),
                render_duration(*timeout_secs)
            )
        }
    }
}

fn render_duration(secs: u64) -> String {
    match secs {
        s if s % 86_400 == 0 => format!("{}d", s / 86_400),
        s if s % 3_600 == 0 => format!("{}h", s / 3_600),
        s if s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{}s", s),
    }
}

fn render_warning(warning: &ConfigWarning) -> String {
    let label = match warning.kind {
        ConfigWarningKind::UnknownActionType => "unknown action",
        ConfigWarningKind::SweeperDisabled => "sweeper",
    };
    format!("{}: {}", label, warning.message)
}
