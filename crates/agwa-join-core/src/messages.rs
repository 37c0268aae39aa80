/// Trait for user-facing tool messages.
///
/// CLI implements with coloured terminal output, tests use [`SilentMessenger`]
/// or a recorder. Messages are fire-and-forget. All methods default to no-op.
pub trait Messenger {
    fn message(&self, _text: &str) {}
    fn warning(&self, _text: &str) {}
    /// Only shown when the tool's debug flag is on.
    fn debug(&self, _text: &str) {}
}

/// No-op messenger for silent operation.
pub struct SilentMessenger;

impl Messenger for SilentMessenger {}
