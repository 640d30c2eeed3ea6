//! Control over non-critical status output.

use indicatif::{ProgressBar, ProgressStyle};
use lazy_static::lazy_static;
use std::fmt;

lazy_static! {
    /// Progress bar style used when progress reporting is requested.
    pub static ref DEFAULT_PROGRESS_STYLE: ProgressStyle = ProgressStyle::default_bar()
        .template("Progress: {bar:40}  {percent}% | ETA: {eta}")
        .expect("Invalid progress bar template");
}

/// How much non-critical status output to print.
#[derive(Clone)]
pub enum Verbosity {
    Quiet,
    Messages,
    Progress(ProgressStyle),
}

impl Verbosity {
    /// Creates a verbosity printing messages and progress with the default style.
    pub fn with_default_progress() -> Self {
        Self::Progress(DEFAULT_PROGRESS_STYLE.clone())
    }

    /// Whether status messages should be printed.
    pub fn print_messages(&self) -> bool {
        match self {
            Self::Quiet => false,
            Self::Messages | Self::Progress(_) => true,
        }
    }

    /// Returns the progress bar style if progress should be reported.
    pub fn progress_style(&self) -> Option<&ProgressStyle> {
        match self {
            Self::Progress(style) => Some(style),
            _ => None,
        }
    }

    /// Creates a progress bar for the given number of steps, hidden unless
    /// progress should be reported.
    pub fn create_progress_bar(&self, n_steps: usize) -> ProgressBar {
        match self {
            Self::Progress(style) => ProgressBar::new(n_steps as u64).with_style(style.clone()),
            _ => ProgressBar::hidden(),
        }
    }
}

impl Default for Verbosity {
    fn default() -> Self {
        Self::Quiet
    }
}

impl fmt::Debug for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Quiet => "Quiet",
                Self::Messages => "Messages",
                Self::Progress(_) => "Progress",
            }
        )
    }
}
