use log::info;
use std::sync::mpsc::{self, Receiver};

/// Installs a Ctrl-C handler and returns a channel that fires on interrupt.
///
/// The handler can only be installed once per process.
pub fn setup_shutdown_signal() -> Result<Receiver<()>, ctrlc::Error> {
    let (tx, rx) = mpsc::channel();

    ctrlc::set_handler(move || {
        info!("Interrupt received, stopping the sorting cycle");
        let _ = tx.send(());
    })?;

    Ok(rx)
}
