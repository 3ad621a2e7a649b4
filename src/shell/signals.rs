use std::ffi::c_int;

use log::debug;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

extern "C" fn on_interrupt(_signal: c_int) {}

/// Keeps the shell alive on Ctrl-C.
///
/// Foreground pipelines share the shell's process group, so the terminal
/// delivers the interrupt to every stage. The shell catches it with an empty
/// handler instead of ignoring it: caught signals are reset to their default
/// action by exec, so children still die on Ctrl-C.
pub fn install_interrupt_handler() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(on_interrupt),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // SAFETY: the handler does nothing, so it is trivially async-signal-safe.
    unsafe { sigaction(Signal::SIGINT, &action) }?;
    debug!("SIGINT handler installed");
    Ok(())
}
