pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod lookup;
pub mod registry;

pub use domain::ids::{ChannelId, GuildId, MessageId, RoleId, SessionId, UserId, UserRef};
pub use domain::interview::{Answer, AnswerSheet, InterviewSpec, Prompt, TicketPanel};
pub use domain::profile::Profile;
pub use domain::session::Session;
pub use errors::{DomainError, TicketError};
pub use flows::{LifecycleAction, LifecycleEvent, SessionState, TransitionOutcome};
pub use lookup::{LookupError, ProfileLookup, StaticProfileLookup};
pub use registry::{RegistryError, SessionCounts, SessionHandle, TicketSessionRegistry};
