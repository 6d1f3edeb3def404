//! Text format exchanged with agents.
//!
//! An encoded board looks like this (a 4x5 arena, red to play, round 12, one rightward
//! projectile; trailing blanks trimmed here):
//!
//! ```text
//! 4 5
//! #   #   #   #   #
//! #   R      >    #
//! #       #   B   #
//! #   #   #   #   #
//! 12
//! R
//! ```
//!
//! Each tile is four characters wide. The first slot holds the tile (`' '` or `'#'`), overwritten
//! by a player tag, overwritten by an upward projectile `^`. The other slots hold downward `v`,
//! leftward `<` and rightward `>` projectiles, so projectiles of different directions sharing a
//! tile all stay visible. The last line, naming the side the agent plays, is only present when
//! the board is addressed to an agent.
//!
//! The agent answers with one integer, the code of its [`Move`].

use std::fmt::Write;

use crate::moves::Move;
use crate::world::{Direction, Side, World};

/// Characters per tile in [`RenderMode::Full`].
pub const CELL_WIDTH: usize = 4;

const MAX_REPLY_ECHO: usize = 32;

/// How tiles are laid out on each row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Four characters per tile. The only layout agents ever receive.
    #[default]
    Full,
    /// One character per tile, keeping the first non-blank of `>`, `<`, `v` and the base slot.
    /// May hide projectiles; display only.
    Compact,
}

fn projectile_slot(direction: Direction) -> (usize, char) {
    match direction {
        Direction::Up => (0, '^'),
        Direction::Down => (1, 'v'),
        Direction::Left => (2, '<'),
        Direction::Right => (3, '>'),
    }
}

/// Renders only the grid rows, each terminated by a newline.
pub fn render_grid(world: &World, mode: RenderMode) -> String {
    let grid = world.grid();
    let width = grid.width();
    let mut cells = vec![[' '; CELL_WIDTH]; grid.height() * width];
    let index = |row: usize, col: usize| row * width + col;

    for pos in grid.positions() {
        cells[index(pos.row, pos.col)][0] = grid.tile(pos).glyph();
    }
    for player in world.players() {
        cells[index(player.position.row, player.position.col)][0] = player.side.tag();
    }
    for projectile in world.projectiles() {
        let (slot, glyph) = projectile_slot(projectile.direction);
        cells[index(projectile.position.row, projectile.position.col)][slot] = glyph;
    }

    let row_len = match mode {
        RenderMode::Full => width * CELL_WIDTH + 1,
        RenderMode::Compact => width + 1,
    };
    let mut out = String::with_capacity(grid.height() * row_len);
    for row in cells.chunks(width) {
        for cell in row {
            match mode {
                RenderMode::Full => out.extend(cell.iter()),
                RenderMode::Compact => {
                    out.push(cell.iter().rev().copied().find(|c| *c != ' ').unwrap_or(' '))
                }
            }
        }
        out.push('\n');
    }
    out
}

/// Encodes the whole board: dimensions, grid rows, round number and, when `who` is given, the
/// side the reader plays.
pub fn encode_board(world: &World, round: u32, who: Option<Side>, mode: RenderMode) -> String {
    let grid = world.grid();
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = writeln!(out, "{} {}", grid.height(), grid.width());
    out.push_str(&render_grid(world, mode));
    let _ = writeln!(out, "{round}");
    if let Some(side) = who {
        out.push(side.tag());
        out.push('\n');
    }
    out
}

/// The exact input an agent playing `side` receives.
pub fn encode_for_agent(world: &World, round: u32, side: Side) -> String {
    encode_board(world, round, Some(side), RenderMode::Full)
}

/// An agent reply that is not an integer between 0 and 9.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidReply {
    pub reply: String,
}

impl std::fmt::Display for InvalidReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut shown: String = self.reply.chars().take(MAX_REPLY_ECHO).collect();
        if self.reply.chars().count() > MAX_REPLY_ECHO {
            shown.push_str("...");
        }
        write!(f, "invalid reply {shown:?}, expected an integer between 0 and 9")
    }
}

impl std::error::Error for InvalidReply {}

/// Strict decoding: the stripped reply must be a base-10 integer naming one of the ten moves.
pub fn parse_reply(reply: &str) -> Result<Move, InvalidReply> {
    reply
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(Move::from_code)
        .ok_or_else(|| InvalidReply {
            reply: reply.to_string(),
        })
}
