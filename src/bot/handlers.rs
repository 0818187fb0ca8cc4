//! Command and upload handlers.

use crate::archive::{self, MediaItem, Workspace};
use crate::bot::messaging::{edit_status_safe, send_status};
use crate::bot::sessions::{ChannelRef, SessionRegistry};
use crate::config::{MediaKind, Settings, MAX_ARCHIVE_BYTES};
use crate::relay::{self, MediaPublisher};
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatId, Document, InputFile, Me, MessageId, Recipient, UserId};
use teloxide::utils::command::BotCommands;
use tokio::io::AsyncWriteExt;
use tracing::error;

/// Bot commands.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show usage instructions.
    #[command(description = "show usage instructions.")]
    Start,
    /// Link a destination channel.
    #[command(description = "link a destination channel: /connect <channel_id>")]
    Connect(String),
}

/// The sender's user id, if the update carries one.
#[must_use]
pub fn message_user_id(msg: &Message) -> Option<UserId> {
    msg.from.as_ref().map(|u| u.id)
}

/// `/start`: static instructions.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn start(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(
        msg.chat.id,
        "👋 Send /connect <channel_id> to link a channel.\n\
         Then send me a ZIP of images/videos to post to your channel.",
    )
    .await?;
    Ok(())
}

/// `/connect <channel_id>`: bind the sender to a destination channel.
///
/// The binding is recorded only if the bot's own identity appears in
/// the channel's administrator list. Repeating the command with the
/// same channel simply rewrites the same binding.
///
/// # Errors
///
/// Returns an error if a reply cannot be sent.
pub async fn connect(
    bot: Bot,
    msg: Message,
    me: Me,
    sessions: Arc<SessionRegistry>,
    args: String,
) -> Result<()> {
    let Some(user) = message_user_id(&msg) else {
        return Ok(());
    };

    let mut parts = args.split_whitespace();
    let (Some(raw), None) = (parts.next(), parts.next()) else {
        bot.send_message(msg.chat.id, "❌ Usage: /connect <channel_id>")
            .await?;
        return Ok(());
    };

    let channel = ChannelRef::new(raw);
    match bot.get_chat_administrators(channel.recipient()).await {
        Ok(admins) => {
            if admins.iter().any(|member| member.user.id == me.user.id) {
                sessions.bind(user, channel.clone()).await;
                bot.send_message(msg.chat.id, format!("✅ Connected to {channel}"))
                    .await?;
            } else {
                bot.send_message(msg.chat.id, "❌ Bot is not admin in that channel.")
                    .await?;
            }
        }
        Err(teloxide::RequestError::Api(_)) => {
            bot.send_message(
                msg.chat.id,
                "❌ Cannot access this channel. Make sure the bot is added and made admin.",
            )
            .await?;
        }
        Err(e) => {
            error!("Failed to query administrators of {channel}: {e}");
            bot.send_message(
                msg.chat.id,
                "❌ Failed to connect. Check channel ID or bot permissions.",
            )
            .await?;
        }
    }
    Ok(())
}

/// Document upload: relay the archive's media to the bound channel.
///
/// # Errors
///
/// Returns an error if a user-facing reply cannot be sent. Relay
/// failures past the initial status message are reported through the
/// status message instead of propagating.
pub async fn handle_archive(
    bot: Bot,
    msg: Message,
    sessions: Arc<SessionRegistry>,
    settings: Arc<Settings>,
) -> Result<()> {
    let Some(user) = message_user_id(&msg) else {
        return Ok(());
    };
    let username = msg
        .from
        .as_ref()
        .and_then(|u| u.username.clone())
        .unwrap_or_else(|| format!("user_{}", user.0));

    let Some(channel) = sessions.lookup(user).await else {
        bot.send_message(
            msg.chat.id,
            "❌ First use /connect <channel_id> to set your channel.",
        )
        .await?;
        return Ok(());
    };

    let policy = settings.media_policy();
    let Some((doc, archive_ext)) = msg
        .document()
        .and_then(|doc| Some((doc, policy.archive_extension(doc.file_name.as_deref()?)?)))
    else {
        bot.send_message(msg.chat.id, "❌ Please send a valid ZIP archive.")
            .await?;
        return Ok(());
    };
    if doc.file.size > MAX_ARCHIVE_BYTES {
        bot.send_message(msg.chat.id, "❌ Archive is too large (max 20 MB).")
            .await?;
        return Ok(());
    }

    let status = send_status(&bot, msg.chat.id, "📦 Extracting archive...").await?;
    let job = UploadJob {
        doc,
        user,
        username: &username,
        channel,
        archive_ext,
    };
    relay_archive(&bot, &job, &status, &settings).await;
    Ok(())
}

/// Everything known about one validated upload before extraction.
struct UploadJob<'a> {
    doc: &'a Document,
    user: UserId,
    username: &'a str,
    channel: ChannelRef,
    archive_ext: String,
}

/// Steps 4-10 of the relay: download, extract, classify, publish,
/// summarize, clean up. All failures end in a terminal status edit;
/// the workspace is removed on every path.
async fn relay_archive(bot: &Bot, job: &UploadJob<'_>, status: &Message, settings: &Settings) {
    let status_chat = status.chat.id;
    let workspace = match Workspace::create(&settings.extract_dir()) {
        Ok(ws) => ws,
        Err(e) => {
            error!("Failed to create extraction workspace: {e}");
            fail_status(bot, status, "❌ Archive extraction failed. No media posted.").await;
            return;
        }
    };

    let archive_path = workspace.archive_path(job.user.0, &job.archive_ext);
    if let Err(e) = download_document(bot, job.doc, &archive_path).await {
        error!("Archive download failed for @{}: {e:#}", job.username);
        fail_status(bot, status, "❌ Failed to download the archive.").await;
        workspace.cleanup();
        return;
    }

    if let Err(e) = archive::extract(archive_path, workspace.path().to_path_buf()).await {
        error!("Archive extraction failed for @{}: {e}", job.username);
        notify_extraction_failed(bot, &job.channel, job.username).await;
        fail_status(bot, status, "❌ Archive extraction failed. No media posted.").await;
        workspace.cleanup();
        return;
    }

    let media = match archive::collect_media(workspace.path(), &settings.media_policy()) {
        Ok(media) => media,
        Err(e) => {
            error!("Failed to enumerate extracted files: {e}");
            fail_status(bot, status, "❌ Archive extraction failed. No media posted.").await;
            workspace.cleanup();
            return;
        }
    };

    if media.is_empty() {
        fail_status(bot, status, "❌ No supported media files found in the archive.").await;
        workspace.cleanup();
        return;
    }

    edit_status_safe(
        bot,
        status_chat,
        status.id,
        &format!("🧮 Found {} media files.", media.len()),
    )
    .await;

    let publisher = ChannelPublisher {
        bot,
        channel: job.channel.recipient(),
        status_chat,
        status_id: status.id,
    };
    let report = relay::publish_all(&publisher, &media).await;

    edit_status_safe(
        bot,
        status_chat,
        status.id,
        &format!(
            "✅ Posted {} of {} media files to {}.",
            report.sent, report.total, job.channel
        ),
    )
    .await;

    workspace.cleanup();
}

async fn fail_status(bot: &Bot, status: &Message, text: &str) {
    edit_status_safe(bot, status.chat.id, status.id, text).await;
}

async fn download_document(bot: &Bot, doc: &Document, dest: &Path) -> Result<()> {
    let file = bot.get_file(doc.file.id.clone()).await?;
    let mut dst = tokio::fs::File::create(dest).await?;
    bot.download_file(&file.path, &mut dst).await?;
    dst.flush().await?;
    Ok(())
}

/// Tells the destination channel that this user's archive could not be
/// unpacked. A failed notice is logged, not surfaced.
async fn notify_extraction_failed(bot: &Bot, channel: &ChannelRef, username: &str) {
    let text = format!("❌ Error extracting archive sent by @{username}");
    if let Err(e) = bot.send_message(channel.recipient(), text).await {
        error!("Failed to notify channel about extraction failure: {e}");
    }
}

/// Publishes media to the bound channel while narrating progress
/// through the status message.
struct ChannelPublisher<'a> {
    bot: &'a Bot,
    channel: Recipient,
    status_chat: ChatId,
    status_id: MessageId,
}

#[async_trait]
impl MediaPublisher for ChannelPublisher<'_> {
    async fn progress(&self, position: usize, total: usize) {
        edit_status_safe(
            self.bot,
            self.status_chat,
            self.status_id,
            &format!("📤 Posting media {position} of {total}..."),
        )
        .await;
    }

    async fn publish(&self, item: &MediaItem) -> Result<()> {
        let file = InputFile::file(item.path.clone());
        match item.kind {
            MediaKind::Photo => {
                self.bot.send_photo(self.channel.clone(), file).await?;
            }
            MediaKind::Video => {
                self.bot.send_video(self.channel.clone(), file).await?;
            }
        }
        Ok(())
    }
}
