use std::fmt::Display;

use crate::world::Direction;

/// The action a side takes in one round.
///
/// Agents answer with the numeric code of a move; the table is fixed:
///
/// | code | move        |
/// |------|-------------|
/// | 0-3  | go up, down, left, right |
/// | 4-7  | shoot up, down, left, right |
/// | 8    | wait        |
/// | 9    | surrender   |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Go(Direction),
    Shoot(Direction),
    Wait,
    Surrender,
}

impl Move {
    /// Every move, indexed by its code.
    pub const ALL: [Move; 10] = [
        Move::Go(Direction::Up),
        Move::Go(Direction::Down),
        Move::Go(Direction::Left),
        Move::Go(Direction::Right),
        Move::Shoot(Direction::Up),
        Move::Shoot(Direction::Down),
        Move::Shoot(Direction::Left),
        Move::Shoot(Direction::Right),
        Move::Wait,
        Move::Surrender,
    ];

    pub fn from_code(code: i64) -> Option<Move> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| Move::ALL.get(idx).copied())
    }

    pub fn code(self) -> u8 {
        fn dir_offset(d: Direction) -> u8 {
            match d {
                Direction::Up => 0,
                Direction::Down => 1,
                Direction::Left => 2,
                Direction::Right => 3,
            }
        }
        match self {
            Move::Go(d) => dir_offset(d),
            Move::Shoot(d) => 4 + dir_offset(d),
            Move::Wait => 8,
            Move::Surrender => 9,
        }
    }
}

impl Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Move::Go(d) => write!(f, "move-{}", dir_name(*d)),
            Move::Shoot(d) => write!(f, "shoot-{}", dir_name(*d)),
            Move::Wait => write!(f, "wait"),
            Move::Surrender => write!(f, "surrender"),
        }
    }
}

fn dir_name(d: Direction) -> &'static str {
    match d {
        Direction::Up => "up",
        Direction::Down => "down",
        Direction::Left => "left",
        Direction::Right => "right",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_table_order() {
        for (idx, mv) in Move::ALL.iter().enumerate() {
            assert_eq!(mv.code() as usize, idx);
            assert_eq!(Move::from_code(idx as i64), Some(*mv));
        }
    }

    #[test]
    fn out_of_range_codes_are_rejected() {
        assert_eq!(Move::from_code(-1), None);
        assert_eq!(Move::from_code(10), None);
        assert_eq!(Move::from_code(i64::MAX), None);
    }

    #[test]
    fn display_names() {
        assert_eq!(Move::Go(Direction::Right).to_string(), "move-right");
        assert_eq!(Move::Shoot(Direction::Down).to_string(), "shoot-down");
        assert_eq!(Move::Surrender.to_string(), "surrender");
    }
}
