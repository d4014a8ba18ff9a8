//! Progress events and status-line observers.

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info};

/// Log target for the always-present console recipient.
pub const CONSOLE_TARGET: &str = "packsync::console";

/// Progress reported by the default asset download pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// The client bundle is being fetched.
    ClientDownload,
    /// An entry is being extracted.
    Extract {
        /// Entry name.
        name: String,
    },
    /// A file is being downloaded.
    Download {
        /// File name.
        name: String,
        /// Completion of the overall pipeline, 0-100.
        percentage: f64,
    },
    /// The pipeline finished.
    Done,
}

impl ProgressEvent {
    /// Whether this is the terminal event of the pipeline.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Done)
    }

    /// Human readable status line for the event.
    pub fn describe(&self) -> String {
        match self {
            ProgressEvent::ClientDownload => "Downloading client jar".to_string(),
            ProgressEvent::Extract { name } => format!("Extracting {name}"),
            ProgressEvent::Download { name, percentage } => {
                format!("Downloading {name} ({percentage:.1}%)")
            }
            ProgressEvent::Done => "Done!".to_string(),
        }
    }

    fn level(&self) -> StatusLevel {
        if self.is_terminal() {
            StatusLevel::Info
        } else {
            StatusLevel::Detail
        }
    }
}

/// Importance of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    /// Major transition.
    Info,
    /// Per-file progress.
    Detail,
    /// A failure the run survived.
    Error,
}

/// A status line pushed to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    /// Importance.
    pub level: StatusLevel,
    /// Message text.
    pub message: String,
}

/// A recipient of status lines.
#[derive(Debug, Clone)]
pub enum Recipient {
    /// The process console, realised as `tracing` events.
    Console,
    /// A channel, e.g. feeding a UI or a remote requester.
    Channel(UnboundedSender<StatusLine>),
}

impl Recipient {
    /// Whether this is the fixed console recipient.
    pub fn is_console(&self) -> bool {
        matches!(self, Recipient::Console)
    }

    fn deliver(&self, line: &StatusLine) {
        match self {
            Recipient::Console => match line.level {
                StatusLevel::Info => info!(target: CONSOLE_TARGET, "{}", line.message),
                StatusLevel::Detail => debug!(target: CONSOLE_TARGET, "{}", line.message),
                StatusLevel::Error => error!(target: CONSOLE_TARGET, "{}", line.message),
            },
            Recipient::Channel(sender) => {
                // A closed receiver just means nobody is listening anymore.
                let _ = sender.send(line.clone());
            }
        }
    }
}

/// Ordered set of recipients that always contains exactly one console.
#[derive(Debug, Clone)]
pub struct Observers {
    recipients: Vec<Recipient>,
}

impl Default for Observers {
    fn default() -> Self {
        Self::console()
    }
}

impl Observers {
    /// Only the console.
    pub fn console() -> Self {
        Self {
            recipients: vec![Recipient::Console],
        }
    }

    /// The given recipients, with the console appended unless already present.
    pub fn new(recipients: impl IntoIterator<Item = Recipient>) -> Self {
        let mut observers = Self {
            recipients: Vec::new(),
        };
        for recipient in recipients {
            observers.push(recipient);
        }
        if !observers.recipients.iter().any(Recipient::is_console) {
            observers.recipients.push(Recipient::Console);
        }
        observers
    }

    /// Add a recipient. A second console is ignored.
    pub fn push(&mut self, recipient: Recipient) {
        if recipient.is_console() && self.recipients.iter().any(Recipient::is_console) {
            return;
        }
        self.recipients.push(recipient);
    }

    /// Builder form of [`Observers::push`].
    pub fn with(mut self, recipient: Recipient) -> Self {
        self.push(recipient);
        self
    }

    /// Number of recipients, console included.
    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    /// Whether there are no recipients; never true, since the console is always present.
    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }

    /// Send a line to every recipient in order.
    pub fn send(&self, level: StatusLevel, message: impl Into<String>) {
        let line = StatusLine {
            level,
            message: message.into(),
        };
        for recipient in &self.recipients {
            recipient.deliver(&line);
        }
    }

    /// Send an [`StatusLevel::Info`] line.
    pub fn info(&self, message: impl Into<String>) {
        self.send(StatusLevel::Info, message);
    }

    /// Send an [`StatusLevel::Error`] line.
    pub fn error(&self, message: impl Into<String>) {
        self.send(StatusLevel::Error, message);
    }

    /// Forward a pipeline event. With `reduced` set only the terminal event passes.
    pub fn progress(&self, event: &ProgressEvent, reduced: bool) {
        if reduced && !event.is_terminal() {
            return;
        }
        self.send(event.level(), event.describe());
    }
}
