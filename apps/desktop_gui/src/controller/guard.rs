//! Confirmation asked before unsaved overview edits are thrown away.

use rfd::{MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};

pub trait DiscardGuard {
    /// Blocks until the user answers. `true` means discard.
    fn confirm_discard(&mut self) -> bool;
}

/// Native yes/no dialog.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeDiscardPrompt;

impl DiscardGuard for NativeDiscardPrompt {
    fn confirm_discard(&mut self) -> bool {
        let answer = MessageDialog::new()
            .set_level(MessageLevel::Warning)
            .set_title("Fields have been changed")
            .set_description("Do you want to leave editing? Unsaved changes will be lost!")
            .set_buttons(MessageButtons::YesNo)
            .show();
        tracing::debug!(?answer, "discard prompt answered");
        matches!(answer, MessageDialogResult::Yes)
    }
}
