//! Inbound administrative commands.
//!
//! These represent overrides requested by the outside world (console,
//! network handler) that bypass the sensor pipeline.  None of them changes
//! the security mode; only remote-control events do that.

/// Overrides delivered to the engine through the input queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    /// Switch siren and strobe off; mode and events untouched.
    SilenceSiren,

    /// Return every busy event to idle without cancel responses and
    /// silence the siren.
    ForceClear,

    /// Re-publish the status snapshot.
    PublishStatus,
}
