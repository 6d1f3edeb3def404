//! Terminal output for human spectators. Never fed back to agents.

use std::io::Write;

use crate::board_codec::{encode_board, RenderMode};
use crate::world::{Side, World};

const RED: &str = "\x1b[91m";
const BLUE: &str = "\x1b[94m";
const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

/// Wraps both side tags in their color.
pub fn colorize(board: &str) -> String {
    let mut out = String::with_capacity(board.len() * 2);
    for c in board.chars() {
        match c {
            'R' => out.push_str(&format!("{RED}R{RESET}")),
            'B' => out.push_str(&format!("{BLUE}B{RESET}")),
            other => out.push(other),
        }
    }
    out
}

/// Board as seen by spectators: no side line, colored tags.
pub fn spectator_view(world: &World, round: u32, mode: RenderMode) -> String {
    colorize(&encode_board(world, round, None, mode))
}

pub fn clear_terminal() {
    print!("\x1b[2J\x1b[H");
}

pub fn print_board(world: &World, round: u32, mode: RenderMode, clear: bool) {
    if clear {
        clear_terminal();
    }
    println!("{}", spectator_view(world, round, mode));
    let _ = std::io::stdout().flush();
}

pub fn side_label(side: Side) -> String {
    match side {
        Side::Red => format!("{RED}Red{RESET}"),
        Side::Blue => format!("{BLUE}Blue{RESET}"),
    }
}

pub fn highlight(msg: &str) -> String {
    format!("{GREEN}{msg}{RESET}")
}
