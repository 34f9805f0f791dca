//! Host platform collaborator.

use crate::error::Result;

/// Launcher control and audio feedback provided by the host platform.
///
/// Implementations are shared between the manager loop and exit timer
/// tasks, so every method takes `&self` and must not block for long.
pub trait Platform: Send + Sync {
    /// Name of the running launcher, `None` when sitting at the menu.
    fn active_launcher(&self) -> Option<String>;

    /// Terminate the running launcher.
    fn kill_launcher(&self) -> Result<()>;

    /// Audio cue for a token sent to launch.
    fn play_success_sound(&self);

    /// Audio cue for a failed read.
    fn play_fail_sound(&self);
}
