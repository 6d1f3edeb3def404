//! Seeded procedural construction of the starting [`World`].
//!
//! Walls are placed in point-symmetric pairs so both spawn corners see the same arena. After
//! placement both spawn tiles are cleared and every border cell is forced to a wall, so the
//! effective wall count is at most the requested one.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::ensure;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::world::{Grid, Position, Side, Tile, World, MIN_DIMENSION};

/// Builds worlds of a given size. Each call to [`generate`](WorldGenerator::generate) owns its
/// own random source; nothing is shared between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldGenerator {
    height: usize,
    width: usize,
    wall_count: usize,
    seed: Option<u64>,
}

impl WorldGenerator {
    /// A generator for `height` x `width` arenas with no interior walls and a time-based seed.
    pub fn new(height: usize, width: usize) -> Self {
        WorldGenerator {
            height,
            width,
            wall_count: 0,
            seed: None,
        }
    }

    /// Approximate number of interior walls.
    pub fn with_wall_count(self, wall_count: usize) -> Self {
        Self { wall_count, ..self }
    }

    /// Fixes the seed. Without it, the seed is derived from the system clock.
    pub fn with_seed(self, seed: Option<u64>) -> Self {
        Self { seed, ..self }
    }

    /// Generates a world, returning it with the seed that produced it.
    ///
    /// # Errors
    /// Returned when height or width is below [`MIN_DIMENSION`].
    #[instrument(skip(self), fields(height = self.height, width = self.width))]
    pub fn generate(&self) -> anyhow::Result<(World, u64)> {
        let seed = self.seed.unwrap_or_else(seed_from_clock);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let world = self.generate_with(&mut rng)?;
        debug!(seed, walls = world.grid().wall_count(), "world generated");
        Ok((world, seed))
    }

    /// Generates a world drawing from `rng`.
    ///
    /// # Errors
    /// Returned when height or width is below [`MIN_DIMENSION`].
    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> anyhow::Result<World> {
        let (n, m) = (self.height, self.width);
        ensure!(
            n >= MIN_DIMENSION && m >= MIN_DIMENSION,
            "arena must be at least {MIN_DIMENSION}x{MIN_DIMENSION}, got {n}x{m}"
        );

        let mut grid = Grid::open(n, m);
        for _ in 0..self.wall_count / 2 {
            let pos = Position::new(rng.gen_range(0..n), rng.gen_range(0..m));
            grid.set(pos, Tile::Wall);
            grid.set(pos.mirrored(n, m), Tile::Wall);
        }

        for side in Side::BOTH {
            grid.set(side.spawn(n, m), Tile::Standard);
        }
        for row in 0..n {
            grid.set(Position::new(row, 0), Tile::Wall);
            grid.set(Position::new(row, m - 1), Tile::Wall);
        }
        for col in 0..m {
            grid.set(Position::new(0, col), Tile::Wall);
            grid.set(Position::new(n - 1, col), Tile::Wall);
        }

        World::new(grid)
    }
}

fn seed_from_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}
