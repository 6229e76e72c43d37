//! Discord integration for the ticket intake bot.
//!
//! - **Gateway** (`gateway`) - event pump with reconnection logic
//! - **Events** (`events`) - slash commands, button clicks, channel messages
//! - **Commands** (`commands`) - `/ticketsetup` parsing and button action ids
//! - **Embeds** (`embeds`) - message, embed and button builders
//! - **Router** (`router`) - setup, apply, view and close handling
//!
//! # Architecture
//!
//! ```text
//! Gateway → EventDispatcher → ActionRouter → PromptSequencer → AccessChannelProvisioner
//!                ↓                  ↓
//!            ReplyHub        TicketSessionRegistry
//! ```
//!
//! Everything that talks to Discord goes through the `ChatPlatform` trait, so
//! the whole flow runs against in-memory doubles in tests.

pub mod commands;
pub mod conversation;
pub mod embeds;
pub mod events;
pub mod gateway;
pub mod interview;
pub mod platform;
pub mod provisioner;
pub mod router;
