//! Role-scoped conference capabilities.

use chama_types::Role;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub room_admin: bool,
    pub can_publish_av: bool,
    pub can_subscribe: bool,
    pub can_publish_data: bool,
}

impl Capabilities {
    /// Watch and listen only.
    pub const SUBSCRIBER: Self = Self {
        room_admin: false,
        can_publish_av: false,
        can_subscribe: true,
        can_publish_data: false,
    };

    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Chairperson => Self {
                room_admin: true,
                can_publish_av: true,
                can_subscribe: true,
                can_publish_data: true,
            },
            Role::Secretary | Role::Treasurer => Self {
                room_admin: false,
                can_publish_av: true,
                can_subscribe: true,
                can_publish_data: true,
            },
            Role::Member => Self {
                room_admin: false,
                can_publish_av: true,
                can_subscribe: true,
                can_publish_data: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_chair_administers_the_room() {
        for role in Role::ALL {
            assert_eq!(Capabilities::for_role(role).room_admin, role == Role::Chairperson);
            assert!(Capabilities::for_role(role).can_subscribe);
            assert!(Capabilities::for_role(role).can_publish_av);
        }
    }

    #[test]
    fn members_cannot_publish_data() {
        assert!(!Capabilities::for_role(Role::Member).can_publish_data);
        assert!(Capabilities::for_role(Role::Treasurer).can_publish_data);
        assert!(!Capabilities::SUBSCRIBER.can_publish_av);
    }
}
