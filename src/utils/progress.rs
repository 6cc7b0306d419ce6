use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Numbered stages of a multi-step operation, rendered as `[n/total]`.
pub struct Steps {
    total: usize,
    current: usize,
    hidden: bool,
}

impl Steps {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            current: 0,
            hidden: false,
        }
    }

    /// Stages that draw nothing, for tests and non-interactive callers.
    pub fn hidden(total: usize) -> Self {
        Self {
            hidden: true,
            ..Self::new(total)
        }
    }

    pub fn begin(&mut self, message: impl Into<String>) -> Stage {
        self.current = (self.current + 1).min(self.total.max(1));
        let label = format!("[{}/{}]", self.current, self.total);
        let spinner = if self.hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new_spinner()
        };
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.green} {prefix:.bold.dim} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_prefix(label);
        spinner.set_message(message.into());
        spinner.enable_steady_tick(Duration::from_millis(100));
        Stage { spinner }
    }

    /// A byte progress bar for transfers.
    pub fn bar(&self) -> ProgressBar {
        let bar = if self.hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );
        bar
    }
}

pub struct Stage {
    spinner: ProgressBar,
}

impl Stage {
    pub fn succeed(self, message: impl Into<String>) {
        self.spinner
            .finish_with_message(format!("{} {}", "√".green(), message.into()));
    }

    pub fn fail(self, message: impl Into<String>) {
        self.spinner
            .abandon_with_message(format!("{} {}", "×".red(), message.into()));
    }
}
