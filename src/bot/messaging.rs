//! Status-message helpers for the relay flow.
//!
//! The relay reports progress by editing one status message over and
//! over. Edits are cosmetic: an edit that the platform refuses with an
//! expected error ("message is not modified", "message to edit not
//! found") must never abort a running batch, so [`edit_status_safe`]
//! degrades to a log line instead of propagating.

use teloxide::prelude::*;
use teloxide::types::{ChatId, Message, MessageId};
use tracing::{debug, warn};

/// Sends the initial status message for a relay invocation.
///
/// # Errors
///
/// Returns the platform error if the message cannot be sent; without a
/// status message the relay has no feedback channel and must abort.
pub async fn send_status(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
) -> Result<Message, teloxide::RequestError> {
    bot.send_message(chat_id, text).await
}

/// Edits the status message, tolerating expected edit failures.
///
/// Returns `true` if the edit was applied, `false` if it was skipped
/// or rejected. Unexpected errors are logged at warn level.
pub async fn edit_status_safe(bot: &Bot, chat_id: ChatId, msg_id: MessageId, text: &str) -> bool {
    const ERROR_NOT_MODIFIED: &str = "message is not modified";
    const ERROR_NOT_FOUND: &str = "message to edit not found";

    match bot.edit_message_text(chat_id, msg_id, text).await {
        Ok(_) => true,
        Err(e) => {
            let err_msg = e.to_string();
            if err_msg.contains(ERROR_NOT_MODIFIED) || err_msg.contains(ERROR_NOT_FOUND) {
                debug!("Status update skipped: {err_msg}");
            } else {
                warn!("Failed to edit status message: {e}");
            }
            false
        }
    }
}
