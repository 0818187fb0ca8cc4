//! In-memory user-to-channel session bindings.
//!
//! A binding records which destination channel a user authorized via
//! `/connect`. Bindings live for the process lifetime only; the table
//! is bounded and safe under the dispatcher's concurrent handler
//! invocations.

use moka::future::Cache;
use teloxide::types::{ChatId, Recipient, UserId};

/// Upper bound on simultaneously bound users.
const SESSION_CAPACITY: u64 = 10_000;

/// A destination channel exactly as the user supplied it: a numeric
/// chat id or an `@username`.
///
/// No well-formedness validation happens here; anything that is not a
/// number is handed to the platform as a username and rejected there
/// if invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRef(String);

impl ChannelRef {
    /// Wraps a raw `/connect` argument.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Maps the reference to a teloxide [`Recipient`].
    #[must_use]
    pub fn recipient(&self) -> Recipient {
        match self.0.parse::<i64>() {
            Ok(id) => Recipient::Id(ChatId(id)),
            Err(_) => Recipient::ChannelUsername(self.0.clone()),
        }
    }
}

impl std::fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bounded concurrent map of user id to authorized destination channel.
#[derive(Clone)]
pub struct SessionRegistry {
    bindings: Cache<UserId, ChannelRef>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bindings: Cache::builder().max_capacity(SESSION_CAPACITY).build(),
        }
    }

    /// Inserts or overwrites the binding for `user`. Last write wins.
    pub async fn bind(&self, user: UserId, channel: ChannelRef) {
        self.bindings.insert(user, channel).await;
    }

    /// Returns the channel bound for `user`, if any.
    pub async fn lookup(&self, user: UserId) -> Option<ChannelRef> {
        self.bindings.get(&user).await
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
