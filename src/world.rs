//! Authoritative game state: the tile grid, the two players and the projectiles in flight.
//!
//! Nothing in here performs I/O. The grid topology is fixed once a [`World`] is built; only
//! occupancy (players and projectiles) changes afterwards, and only through
//! [`resolve`](crate::resolver::resolve).

use std::fmt::Display;

use anyhow::{bail, ensure};

/// Smallest accepted grid height and width.
pub const MIN_DIMENSION: usize = 4;

/// A cell coordinate, 0-indexed from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Position { row, col }
    }

    /// Point reflection through the grid center.
    pub fn mirrored(self, height: usize, width: usize) -> Position {
        Position::new(height - 1 - self.row, width - 1 - self.col)
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// One of the four axis directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Unit delta as `(row, col)`.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }

    pub fn reversed(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Neighbour of `from` in this direction, or `None` when it would leave a
    /// `height` x `width` grid.
    pub fn step(self, from: Position, height: usize, width: usize) -> Option<Position> {
        let (dr, dc) = self.delta();
        let row = from.row.checked_add_signed(dr)?;
        let col = from.col.checked_add_signed(dc)?;
        (row < height && col < width).then_some(Position::new(row, col))
    }

    /// Neighbour of `from` in this direction, clamped to the grid bounds.
    pub fn step_clamped(self, from: Position, height: usize, width: usize) -> Position {
        match self {
            Direction::Up => Position::new(from.row.saturating_sub(1), from.col),
            Direction::Down => Position::new((from.row + 1).min(height - 1), from.col),
            Direction::Left => Position::new(from.row, from.col.saturating_sub(1)),
            Direction::Right => Position::new(from.row, (from.col + 1).min(width - 1)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tile {
    #[default]
    Standard,
    Wall,
}

impl Tile {
    pub fn glyph(self) -> char {
        match self {
            Tile::Standard => ' ',
            Tile::Wall => '#',
        }
    }
}

/// `height` x `width` matrix of tiles, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    height: usize,
    width: usize,
    tiles: Vec<Tile>,
}

impl Grid {
    /// A grid made only of standard tiles. Used by the generator before walls are placed.
    pub(crate) fn open(height: usize, width: usize) -> Grid {
        Grid {
            height,
            width,
            tiles: vec![Tile::Standard; height * width],
        }
    }

    /// Builds a grid from text rows, `'#'` for walls and `' '` (or `'.'`) for standard tiles.
    ///
    /// # Errors
    /// Returned when rows are ragged, contain unknown characters, or the grid is smaller than
    /// [`MIN_DIMENSION`] in either direction.
    pub fn from_rows(rows: &[&str]) -> anyhow::Result<Grid> {
        let height = rows.len();
        let width = rows.first().map(|r| r.chars().count()).unwrap_or(0);
        ensure!(
            height >= MIN_DIMENSION && width >= MIN_DIMENSION,
            "grid must be at least {MIN_DIMENSION}x{MIN_DIMENSION}, got {height}x{width}"
        );

        let mut tiles = Vec::with_capacity(height * width);
        for (row, line) in rows.iter().enumerate() {
            if line.chars().count() != width {
                bail!("row {row} has {} tiles instead of {width}", line.chars().count());
            }
            for c in line.chars() {
                tiles.push(match c {
                    '#' => Tile::Wall,
                    ' ' | '.' => Tile::Standard,
                    other => bail!("unknown tile character {other:?} in row {row}"),
                });
            }
        }
        Ok(Grid {
            height,
            width,
            tiles,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.row < self.height && pos.col < self.width
    }

    /// # Panics
    /// When `pos` is outside the grid.
    pub fn tile(&self, pos: Position) -> Tile {
        assert!(self.contains(pos), "{pos} is outside a {}x{} grid", self.height, self.width);
        self.tiles[pos.row * self.width + pos.col]
    }

    pub fn is_wall(&self, pos: Position) -> bool {
        self.tile(pos) == Tile::Wall
    }

    pub(crate) fn set(&mut self, pos: Position, tile: Tile) {
        let idx = pos.row * self.width + pos.col;
        self.tiles[idx] = tile;
    }

    pub fn is_border(&self, pos: Position) -> bool {
        pos.row == 0 || pos.col == 0 || pos.row == self.height - 1 || pos.col == self.width - 1
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.height).flat_map(move |row| (0..self.width).map(move |col| Position::new(row, col)))
    }

    pub fn wall_count(&self) -> usize {
        self.tiles.iter().filter(|t| **t == Tile::Wall).count()
    }
}

/// One of the two competitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Red,
    Blue,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Red, Side::Blue];

    pub fn index(self) -> usize {
        match self {
            Side::Red => 0,
            Side::Blue => 1,
        }
    }

    pub fn opponent(self) -> Side {
        match self {
            Side::Red => Side::Blue,
            Side::Blue => Side::Red,
        }
    }

    /// Single-letter marker used on the board.
    pub fn tag(self) -> char {
        match self {
            Side::Red => 'R',
            Side::Blue => 'B',
        }
    }

    /// Spawn corner on a `height` x `width` grid.
    pub fn spawn(self, height: usize, width: usize) -> Position {
        match self {
            Side::Red => Position::new(1, 1),
            Side::Blue => Position::new(height - 2, width - 2),
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Red => write!(f, "red"),
            Side::Blue => write!(f, "blue"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub side: Side,
    pub position: Position,
    /// Last direction the player moved or shot in. Informational only.
    pub facing: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Projectile {
    pub position: Position,
    pub direction: Direction,
}

/// Sides eliminated during one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HitSet {
    hit: [bool; 2],
}

impl HitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, side: Side) {
        self.hit[side.index()] = true;
    }

    pub fn contains(&self, side: Side) -> bool {
        self.hit[side.index()]
    }

    pub fn len(&self) -> usize {
        self.hit.iter().filter(|h| **h).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Side> + '_ {
        Side::BOTH.into_iter().filter(|s| self.contains(*s))
    }
}

impl FromIterator<Side> for HitSet {
    fn from_iter<T: IntoIterator<Item = Side>>(iter: T) -> Self {
        let mut set = HitSet::new();
        for side in iter {
            set.insert(side);
        }
        set
    }
}

/// Grid, both players and every projectile in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct World {
    pub(crate) grid: Grid,
    pub(crate) players: [Player; 2],
    pub(crate) projectiles: Vec<Projectile>,
}

impl World {
    /// Places both players on their spawn corners, facing right.
    ///
    /// # Errors
    /// Returned when the grid breaks the arena invariants: a border cell that is not a wall,
    /// or a spawn cell that is a wall.
    pub fn new(grid: Grid) -> anyhow::Result<World> {
        let (height, width) = (grid.height(), grid.width());
        ensure!(
            height >= MIN_DIMENSION && width >= MIN_DIMENSION,
            "grid must be at least {MIN_DIMENSION}x{MIN_DIMENSION}, got {height}x{width}"
        );
        if let Some(pos) = grid.positions().find(|p| grid.is_border(*p) && !grid.is_wall(*p)) {
            bail!("border cell {pos} is not a wall");
        }
        for side in Side::BOTH {
            let spawn = side.spawn(height, width);
            ensure!(!grid.is_wall(spawn), "{side} spawn {spawn} is a wall");
        }

        let players = Side::BOTH.map(|side| Player {
            side,
            position: side.spawn(height, width),
            facing: Direction::Right,
        });
        Ok(World {
            grid,
            players,
            projectiles: Vec::new(),
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn player(&self, side: Side) -> &Player {
        &self.players[side.index()]
    }

    pub fn players(&self) -> &[Player; 2] {
        &self.players
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// Moves a player, bypassing the rules. For setting up positions.
    ///
    /// # Errors
    /// Returned when `pos` is outside the grid or on a wall.
    pub fn place_player(&mut self, side: Side, pos: Position) -> anyhow::Result<()> {
        ensure!(self.grid.contains(pos), "{pos} is outside the grid");
        ensure!(!self.grid.is_wall(pos), "cannot place {side} on the wall at {pos}");
        self.players[side.index()].position = pos;
        Ok(())
    }

    /// Adds a projectile, bypassing the rules. For setting up positions.
    ///
    /// # Errors
    /// Returned when `pos` is outside the grid or on a wall.
    pub fn add_projectile(&mut self, pos: Position, direction: Direction) -> anyhow::Result<()> {
        ensure!(self.grid.contains(pos), "{pos} is outside the grid");
        ensure!(!self.grid.is_wall(pos), "cannot place a projectile on the wall at {pos}");
        self.projectiles.push(Projectile {
            position: pos,
            direction,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_rows() -> Vec<&'static str> {
        vec!["#####", "#   #", "#   #", "#   #", "#####"]
    }

    #[test]
    fn world_spawns_players_in_opposite_corners() {
        let world = World::new(Grid::from_rows(&open_rows()).unwrap()).unwrap();
        assert_eq!(world.player(Side::Red).position, Position::new(1, 1));
        assert_eq!(world.player(Side::Blue).position, Position::new(3, 3));
        assert!(world.players().iter().all(|p| p.facing == Direction::Right));
        assert!(world.projectiles().is_empty());
    }

    #[test]
    fn world_rejects_open_border() {
        let rows = ["#####", "    #", "#   #", "#   #", "#####"];
        let err = World::new(Grid::from_rows(&rows).unwrap()).unwrap_err();
        assert!(err.to_string().contains("border"), "{err}");
    }

    #[test]
    fn world_rejects_walled_spawn() {
        let rows = ["#####", "##  #", "#   #", "#   #", "#####"];
        assert!(World::new(Grid::from_rows(&rows).unwrap()).is_err());
    }

    #[test]
    fn grid_rejects_tiny_or_ragged_input() {
        assert!(Grid::from_rows(&["###", "# #", "###"]).is_err());
        assert!(Grid::from_rows(&["####", "#  #", "#   #", "####"]).is_err());
        assert!(Grid::from_rows(&["####", "#x #", "#  #", "####"]).is_err());
    }

    #[test]
    fn step_stops_at_grid_edge() {
        let origin = Position::new(0, 0);
        assert_eq!(Direction::Up.step(origin, 5, 5), None);
        assert_eq!(Direction::Left.step(origin, 5, 5), None);
        assert_eq!(Direction::Down.step(origin, 5, 5), Some(Position::new(1, 0)));
        assert_eq!(Direction::Right.step(Position::new(2, 4), 5, 5), None);
    }

    #[test]
    fn step_clamped_never_leaves_grid() {
        let corner = Position::new(4, 4);
        assert_eq!(Direction::Down.step_clamped(corner, 5, 5), corner);
        assert_eq!(Direction::Right.step_clamped(corner, 5, 5), corner);
        assert_eq!(Direction::Up.step_clamped(Position::new(0, 2), 5, 5), Position::new(0, 2));
    }

    #[test]
    fn hit_set_deduplicates() {
        let hits: HitSet = [Side::Blue, Side::Blue].into_iter().collect();
        assert_eq!(hits.len(), 1);
        assert!(hits.contains(Side::Blue));
        assert!(!hits.contains(Side::Red));
        assert_eq!(hits.iter().collect::<Vec<_>>(), vec![Side::Blue]);
    }

    #[test]
    fn mirrored_is_an_involution() {
        let p = Position::new(1, 3);
        assert_eq!(p.mirrored(6, 8), Position::new(4, 4));
        assert_eq!(p.mirrored(6, 8).mirrored(6, 8), p);
    }
}
