//! Queues connecting the manager to launch orchestration.
//!
//! - The launch queue carries tokens the manager accepted, in order.
//! - The software channel carries launcher state changes back into the
//!   manager: `Some(token)` when software started by `token` is running,
//!   `None` when no software is running any more.

use tapto_core::Token;
use tokio::sync::mpsc;
use tracing::warn;

/// Producer side of the launch queue.
#[derive(Debug, Clone)]
pub struct LaunchQueue {
    tx: mpsc::UnboundedSender<Token>,
}

/// Consumer side of the launch queue.
#[derive(Debug)]
pub struct LaunchReceiver {
    rx: mpsc::UnboundedReceiver<Token>,
}

/// Create a launch queue.
///
/// # Examples
///
/// ```
/// use tapto_core::{Token, TokenType};
/// use tapto_daemon::launch::launch_queue;
///
/// let (queue, mut rx) = launch_queue();
/// queue.enqueue(Token::new("04a1", TokenType::Ntag, "mock:a"));
/// assert_eq!(rx.try_recv().unwrap().uid, "04a1");
/// ```
pub fn launch_queue() -> (LaunchQueue, LaunchReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (LaunchQueue { tx }, LaunchReceiver { rx })
}

impl LaunchQueue {
    /// Append a token. Dropped with a warning when nobody consumes launches.
    pub fn enqueue(&self, token: Token) {
        if let Err(e) = self.tx.send(token) {
            warn!(token = %e.0, "Launch queue closed, dropping token");
        }
    }
}

impl LaunchReceiver {
    /// Wait for the next token.
    pub async fn recv(&mut self) -> Option<Token> {
        self.rx.recv().await
    }

    /// Take the next token if one is queued.
    pub fn try_recv(&mut self) -> Option<Token> {
        self.rx.try_recv().ok()
    }
}

/// Producer side of the software channel.
#[derive(Debug, Clone)]
pub struct SoftwareNotifier {
    tx: mpsc::UnboundedSender<Option<Token>>,
}

/// Consumer side of the software channel.
pub type SoftwareReceiver = mpsc::UnboundedReceiver<Option<Token>>;

/// Create a software channel.
pub fn software_channel() -> (SoftwareNotifier, SoftwareReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SoftwareNotifier { tx }, rx)
}

impl SoftwareNotifier {
    /// Software started by `token` is now running.
    pub fn launched(&self, token: Token) {
        self.notify(Some(token));
    }

    /// No software is running any more.
    pub fn exited(&self) {
        self.notify(None);
    }

    fn notify(&self, token: Option<Token>) {
        if self.tx.send(token).is_err() {
            warn!("Reader manager gone, dropping software notification");
        }
    }
}
