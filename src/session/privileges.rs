//! # Privilege Bitsets
//!
//! Server-side privileges persisted with the account, and the derived
//! client-facing bitset sent over the wire. Both are independent boolean
//! permissions packed into one integer via bit flags.

use serde::{Deserialize, Serialize};
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

/// Server-side user privileges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Privileges(pub u32);

impl Privileges {
    /// Is an unbanned player. Absence of this bit is the restriction flag.
    pub const UNRESTRICTED: Privileges = Privileges(1 << 0);
    /// Has logged in to the server in-game.
    pub const VERIFIED: Privileges = Privileges(1 << 1);
    /// Bypasses low-ceiling anticheat measures (trusted).
    pub const WHITELISTED: Privileges = Privileges(1 << 2);

    // Donation tiers
    pub const SUPPORTER: Privileges = Privileges(1 << 4);
    pub const PREMIUM: Privileges = Privileges(1 << 5);

    /// Notable users, receive some extra benefits.
    pub const ALUMNI: Privileges = Privileges(1 << 7);

    // Staff permissions
    pub const TOURNEY_MANAGER: Privileges = Privileges(1 << 10);
    pub const NOMINATOR: Privileges = Privileges(1 << 11);
    pub const MODERATOR: Privileges = Privileges(1 << 12);
    pub const ADMINISTRATOR: Privileges = Privileges(1 << 13);
    pub const OWNER: Privileges = Privileges(1 << 14);

    pub const DONATOR: Privileges = Privileges(Self::SUPPORTER.0 | Self::PREMIUM.0);
    pub const STAFF: Privileges =
        Privileges(Self::MODERATOR.0 | Self::ADMINISTRATOR.0 | Self::OWNER.0);

    pub const fn empty() -> Self {
        Privileges(0)
    }

    /// True when any bit of `other` is set.
    pub const fn intersects(self, other: Privileges) -> bool {
        self.0 & other.0 != 0
    }

    /// True when every bit of `other` is set.
    pub const fn contains(self, other: Privileges) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for Privileges {
    type Output = Privileges;
    fn bitor(self, rhs: Privileges) -> Privileges {
        Privileges(self.0 | rhs.0)
    }
}

impl BitOrAssign for Privileges {
    fn bitor_assign(&mut self, rhs: Privileges) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Privileges {
    type Output = Privileges;
    fn bitand(self, rhs: Privileges) -> Privileges {
        Privileges(self.0 & rhs.0)
    }
}

impl BitAndAssign for Privileges {
    fn bitand_assign(&mut self, rhs: Privileges) {
        self.0 &= rhs.0;
    }
}

impl Not for Privileges {
    type Output = Privileges;
    fn not(self) -> Privileges {
        Privileges(!self.0)
    }
}

/// Client privileges for use in-game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientPrivileges(pub u32);

impl ClientPrivileges {
    pub const PLAYER: ClientPrivileges = ClientPrivileges(1 << 0);
    pub const MODERATOR: ClientPrivileges = ClientPrivileges(1 << 1);
    pub const SUPPORTER: ClientPrivileges = ClientPrivileges(1 << 2);
    pub const OWNER: ClientPrivileges = ClientPrivileges(1 << 3);
    pub const DEVELOPER: ClientPrivileges = ClientPrivileges(1 << 4);
    /// Not used in communications with the client.
    pub const TOURNAMENT: ClientPrivileges = ClientPrivileges(1 << 5);

    pub const fn empty() -> Self {
        ClientPrivileges(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl BitOrAssign for ClientPrivileges {
    fn bitor_assign(&mut self, rhs: ClientPrivileges) {
        self.0 |= rhs.0;
    }
}

impl From<Privileges> for ClientPrivileges {
    /// Project the server-side bitset onto the client-facing one.
    fn from(privileges: Privileges) -> Self {
        let mut out = ClientPrivileges::empty();
        if privileges.intersects(Privileges::UNRESTRICTED) {
            out |= ClientPrivileges::PLAYER;
        }
        if privileges.intersects(Privileges::DONATOR) {
            out |= ClientPrivileges::SUPPORTER;
        }
        if privileges.intersects(Privileges::MODERATOR) {
            out |= ClientPrivileges::MODERATOR;
        }
        if privileges.intersects(Privileges::ADMINISTRATOR) {
            out |= ClientPrivileges::DEVELOPER;
        }
        if privileges.intersects(Privileges::OWNER) {
            out |= ClientPrivileges::OWNER;
        }
        out
    }
}
