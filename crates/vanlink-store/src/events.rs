//! Change feed for observed collections.
//!
//! Writes to routes and chats publish a [`ChangeEvent`] after commit. Delivery
//! is best-effort: a lagging subscriber loses the oldest events.

use vanlink_core::{ChatId, RouteId};

use crate::types::{Chat, Route};

/// Default capacity of the change-feed channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// A committed change to an observed collection.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    /// A route was created or updated.
    RouteWritten {
        /// The written route.
        route_id: RouteId,
        /// The route as it was before this write, if it existed.
        before: Option<Route>,
        /// The route as written.
        after: Route,
    },
    /// A chat was created.
    ChatCreated {
        /// The new chat.
        chat_id: ChatId,
        /// The chat as created.
        chat: Chat,
    },
}
