use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(UserId);
string_id!(RoleId);
string_id!(ChannelId);
string_id!(
    /// Guild ids double as the id of the guild's `@everyone` role.
    GuildId
);
string_id!(MessageId);
string_id!(SessionId);

impl GuildId {
    pub fn everyone_role(&self) -> RoleId {
        RoleId(self.0.clone())
    }
}

impl SessionId {
    pub fn generate() -> Self {
        Self(format!("TS-{}", uuid::Uuid::new_v4().simple()))
    }
}

/// A platform user as seen at the moment an event arrived.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: UserId,
    pub name: String,
}

impl UserRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: UserId(id.into()), name: name.into() }
    }

    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}
