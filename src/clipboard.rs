//! Clipboard access for copying command output.

use anyhow::{bail, Context, Result};

/// Copies `text` to the system clipboard. Empty text is rejected.
pub fn copy_output(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        bail!("no output to copy");
    }
    let mut clipboard = arboard::Clipboard::new().context("failed to access clipboard")?;
    clipboard
        .set_text(text.to_string())
        .context("failed to set clipboard text")?;
    Ok(())
}
