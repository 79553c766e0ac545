use bitflags::bitflags;
use serde::{Serialize, Serializer};

bitflags! {
    /// Direction and change type of a model node, combined bitwise.
    ///
    /// The low two bits carry the change type and the next two the direction,
    /// so `ADDITION | DELETION == CHANGE` and `LEFT | RIGHT == CONFLICTING`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Kind: u8 {
        const ADDITION = 0b0001;
        const DELETION = 0b0010;
        const CHANGE = Self::ADDITION.bits() | Self::DELETION.bits();
        const LEFT = 0b0100;
        const RIGHT = 0b1000;
        const CONFLICTING = Self::LEFT.bits() | Self::RIGHT.bits();
    }
}

impl Kind {
    pub const CHANGE_TYPE_MASK: Kind = Kind::CHANGE;
    pub const DIRECTION_MASK: Kind = Kind::CONFLICTING;
    pub const OUTGOING: Kind = Kind::LEFT;
    pub const INCOMING: Kind = Kind::RIGHT;

    pub fn new(direction: Direction, change_type: ChangeType) -> Self {
        direction.bits() | change_type.bits()
    }

    pub fn direction_bits(self) -> Kind {
        self & Self::DIRECTION_MASK
    }

    pub fn change_type_bits(self) -> Kind {
        self & Self::CHANGE_TYPE_MASK
    }

    /// `None` when no change-type bit is set.
    pub fn change_type(self) -> Option<ChangeType> {
        let bits = self.change_type_bits();
        if bits == Kind::CHANGE {
            Some(ChangeType::Modify)
        } else if bits == Kind::ADDITION {
            Some(ChangeType::Add)
        } else if bits == Kind::DELETION {
            Some(ChangeType::Delete)
        } else {
            None
        }
    }

    /// Same change seen from the other side: ADDITION and DELETION swap,
    /// LEFT and RIGHT swap, CHANGE and CONFLICTING stay.
    pub fn mirrored(self) -> Kind {
        let change = match self.change_type() {
            Some(ct) => ct.mirrored().bits(),
            None => Kind::empty(),
        };
        let direction = self.direction_bits();
        let direction = if direction == Kind::LEFT {
            Kind::RIGHT
        } else if direction == Kind::RIGHT {
            Kind::LEFT
        } else {
            direction
        };
        change | direction
    }
}

impl Serialize for Kind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.bits())
    }
}

/// Which side of a comparison a change belongs to, relative to the local side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
    Outgoing,
    Incoming,
    Conflicting,
}

impl Direction {
    pub fn bits(self) -> Kind {
        match self {
            Direction::Left | Direction::Outgoing => Kind::LEFT,
            Direction::Right | Direction::Incoming => Kind::RIGHT,
            Direction::Conflicting => Kind::CONFLICTING,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Add,
    Delete,
    Modify,
}

impl ChangeType {
    pub fn bits(self) -> Kind {
        match self {
            ChangeType::Add => Kind::ADDITION,
            ChangeType::Delete => Kind::DELETION,
            ChangeType::Modify => Kind::CHANGE,
        }
    }

    pub fn mirrored(self) -> ChangeType {
        match self {
            ChangeType::Add => ChangeType::Delete,
            ChangeType::Delete => ChangeType::Add,
            ChangeType::Modify => ChangeType::Modify,
        }
    }

    /// Classify a pair of optional ids; `None` if both sides agree.
    pub fn between<T: PartialEq>(before: Option<T>, after: Option<T>) -> Option<ChangeType> {
        match (before, after) {
            (None, Some(_)) => Some(ChangeType::Add),
            (Some(_), None) => Some(ChangeType::Delete),
            (Some(b), Some(a)) if b != a => Some(ChangeType::Modify),
            _ => None,
        }
    }
}
