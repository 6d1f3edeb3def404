//! Simultaneous application of both sides' moves.
//!
//! The policy runs in a fixed order:
//! 1. any surrender ends the round immediately, nothing moves;
//! 2. each side moves, shoots or waits on its own; a move into a wall is undone;
//! 3. if both sides end on the same tile, both go back where they started;
//! 4. every projectile advances one cell, bouncing off walls and vanishing off the grid;
//! 5. any player sharing a tile with a projectile is hit.
//!
//! Because step 2 never looks at the other side, the result does not depend on which side is
//! resolved first.

use tracing::trace;

use crate::moves::Move;
use crate::world::{HitSet, Projectile, Side, World};

/// Applies one round to `world` and returns the sides eliminated by it.
///
/// `moves` is indexed by [`Side::index`]: red first, blue second.
pub fn resolve(world: &mut World, moves: [Move; 2]) -> HitSet {
    let surrendered: HitSet = Side::BOTH
        .into_iter()
        .filter(|side| moves[side.index()] == Move::Surrender)
        .collect();
    if !surrendered.is_empty() {
        trace!(?surrendered, "round short-circuited by surrender");
        return surrendered;
    }

    let (height, width) = (world.grid().height(), world.grid().width());
    let before = world.players.clone().map(|p| p.position);

    for side in Side::BOTH {
        let mv = moves[side.index()];
        let player = &mut world.players[side.index()];
        match mv {
            Move::Go(direction) => {
                player.facing = direction;
                let target = direction.step_clamped(player.position, height, width);
                if !world.grid.is_wall(target) {
                    player.position = target;
                }
            }
            Move::Shoot(direction) => {
                player.facing = direction;
                world.projectiles.push(Projectile {
                    position: player.position,
                    direction,
                });
            }
            Move::Wait | Move::Surrender => {}
        }
    }

    let [red, blue] = &mut world.players;
    if red.position == blue.position {
        trace!(contested = %red.position, "both sides blocked");
        red.position = before[Side::Red.index()];
        blue.position = before[Side::Blue.index()];
    }

    step_projectiles(world);

    world
        .players
        .iter()
        .filter(|player| {
            world
                .projectiles
                .iter()
                .any(|projectile| projectile.position == player.position)
        })
        .map(|player| player.side)
        .collect()
}

/// Advances every projectile by one cell.
fn step_projectiles(world: &mut World) {
    let grid = &world.grid;
    let (height, width) = (grid.height(), grid.width());
    world.projectiles.retain_mut(|projectile| {
        match projectile.direction.step(projectile.position, height, width) {
            None => false,
            Some(next) if grid.is_wall(next) => {
                projectile.direction = projectile.direction.reversed();
                true
            }
            Some(next) => {
                projectile.position = next;
                true
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::world::{Direction, Grid, Position};

    fn open_world(n: usize, m: usize) -> World {
        let mut rows = Vec::new();
        rows.push("#".repeat(m));
        for _ in 0..n - 2 {
            rows.push(format!("#{}#", " ".repeat(m - 2)));
        }
        rows.push("#".repeat(m));
        let rows = rows.iter().map(String::as_str).collect::<Vec<_>>();
        World::new(Grid::from_rows(&rows).unwrap()).unwrap()
    }

    fn pos(row: usize, col: usize) -> Position {
        Position::new(row, col)
    }

    #[test]
    fn move_right_and_wait() {
        let mut world = open_world(5, 5);
        let hits = resolve(&mut world, [Move::Go(Direction::Right), Move::Wait]);
        assert!(hits.is_empty());
        assert_eq!(world.player(Side::Red).position, pos(1, 2));
        assert_eq!(world.player(Side::Blue).position, pos(3, 3));
    }

    #[test]
    fn shot_projectile_moves_once_in_the_same_round() {
        let mut world = open_world(5, 5);
        let hits = resolve(&mut world, [Move::Shoot(Direction::Right), Move::Wait]);
        assert!(hits.is_empty());
        assert_eq!(world.player(Side::Red).position, pos(1, 1));
        assert_eq!(
            world.projectiles(),
            &[Projectile {
                position: pos(1, 2),
                direction: Direction::Right
            }]
        );
    }

    #[test]
    fn surrender_short_circuits_everything() {
        let mut world = open_world(5, 5);
        world.add_projectile(pos(2, 2), Direction::Up).unwrap();
        let before = world.clone();
        let hits = resolve(&mut world, [Move::Shoot(Direction::Down), Move::Surrender]);
        assert_eq!(hits.iter().collect::<Vec<_>>(), vec![Side::Blue]);
        assert_eq!(world, before);
    }

    #[test]
    fn double_surrender_hits_both() {
        let mut world = open_world(5, 5);
        let hits = resolve(&mut world, [Move::Surrender, Move::Surrender]);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn walking_into_a_wall_is_a_no_op() {
        let mut world = open_world(5, 5);
        resolve(&mut world, [Move::Go(Direction::Up), Move::Go(Direction::Right)]);
        assert_eq!(world.player(Side::Red).position, pos(1, 1));
        assert_eq!(world.player(Side::Blue).position, pos(3, 3));
        // facing still follows the order
        assert_eq!(world.player(Side::Red).facing, Direction::Up);
    }

    #[test]
    fn contested_tile_blocks_both() {
        let mut world = open_world(5, 5);
        world.place_player(Side::Red, pos(2, 1)).unwrap();
        world.place_player(Side::Blue, pos(2, 3)).unwrap();
        resolve(
            &mut world,
            [Move::Go(Direction::Right), Move::Go(Direction::Left)],
        );
        assert_eq!(world.player(Side::Red).position, pos(2, 1));
        assert_eq!(world.player(Side::Blue).position, pos(2, 3));
    }

    #[test]
    fn moving_onto_a_waiting_opponent_is_undone() {
        let mut world = open_world(5, 5);
        world.place_player(Side::Blue, pos(1, 2)).unwrap();
        resolve(&mut world, [Move::Go(Direction::Right), Move::Wait]);
        assert_eq!(world.player(Side::Red).position, pos(1, 1));
        assert_eq!(world.player(Side::Blue).position, pos(1, 2));
    }

    #[test]
    fn projectile_bounces_off_wall_and_comes_back() {
        let mut world = open_world(5, 5);
        world.add_projectile(pos(2, 3), Direction::Right).unwrap();
        world.place_player(Side::Blue, pos(3, 2)).unwrap();

        resolve(&mut world, [Move::Wait, Move::Wait]);
        assert_eq!(
            world.projectiles(),
            &[Projectile {
                position: pos(2, 3),
                direction: Direction::Left
            }]
        );

        resolve(&mut world, [Move::Wait, Move::Wait]);
        assert_eq!(world.projectiles()[0].position, pos(2, 2));
    }

    #[test]
    fn projectile_leaving_the_grid_is_removed() {
        let mut world = open_world(5, 5);
        // Only reachable by construction: projectiles never sit on the border in play.
        world.projectiles.push(Projectile {
            position: pos(0, 2),
            direction: Direction::Up,
        });
        resolve(&mut world, [Move::Wait, Move::Wait]);
        assert!(world.projectiles().is_empty());
    }

    #[test]
    fn projectile_hits_player_it_lands_on() {
        let mut world = open_world(5, 5);
        world.add_projectile(pos(3, 1), Direction::Right).unwrap();
        world.add_projectile(pos(2, 2), Direction::Down).unwrap();
        let hits = resolve(&mut world, [Move::Wait, Move::Go(Direction::Left)]);
        // blue walked into (3, 2), where both projectiles arrive
        assert_eq!(world.player(Side::Blue).position, pos(3, 2));
        assert_eq!(hits.iter().collect::<Vec<_>>(), vec![Side::Blue]);
    }

    #[test]
    fn simultaneous_hits_on_both_sides() {
        let mut world = open_world(5, 5);
        world.add_projectile(pos(2, 1), Direction::Up).unwrap();
        world.add_projectile(pos(2, 3), Direction::Down).unwrap();
        let hits = resolve(&mut world, [Move::Wait, Move::Wait]);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn shooting_point_blank_does_not_hit_the_shooter() {
        let mut world = open_world(5, 5);
        let hits = resolve(&mut world, [Move::Shoot(Direction::Down), Move::Wait]);
        assert!(hits.is_empty());
        assert_eq!(world.projectiles()[0].position, pos(2, 1));
    }

    fn any_move() -> impl Strategy<Value = Move> {
        (0i64..10).prop_map(|c| Move::from_code(c).unwrap())
    }

    proptest! {
        #[test]
        fn players_never_share_a_tile(
            moves in proptest::collection::vec((any_move(), any_move()), 1..40),
        ) {
            let mut world = open_world(6, 7);
            for (red, blue) in moves {
                let hits = resolve(&mut world, [red, blue]);
                prop_assert_ne!(
                    world.player(Side::Red).position,
                    world.player(Side::Blue).position
                );
                if !hits.is_empty() {
                    break;
                }
            }
        }

        #[test]
        fn each_side_moves_one_cell_or_shoots_in_place(
            red in any_move(),
            blue in any_move(),
        ) {
            prop_assume!(red != Move::Surrender && blue != Move::Surrender);
            let mut world = open_world(7, 7);
            world.place_player(Side::Red, Position::new(2, 2)).unwrap();
            world.place_player(Side::Blue, Position::new(4, 4)).unwrap();
            let before = world.clone();
            resolve(&mut world, [red, blue]);

            for (side, mv) in [(Side::Red, red), (Side::Blue, blue)] {
                let old = before.player(side).position;
                let new = world.player(side).position;
                match mv {
                    Move::Go(d) => prop_assert_eq!(Some(new), d.step(old, 7, 7)),
                    _ => prop_assert_eq!(new, old),
                }
            }
            let shots = [red, blue].iter().filter(|m| matches!(m, Move::Shoot(_))).count();
            prop_assert_eq!(world.projectiles().len(), shots);
        }

        #[test]
        fn projectiles_stay_inside_the_grid(
            moves in proptest::collection::vec((any_move(), any_move()), 1..60),
        ) {
            let mut world = open_world(5, 8);
            for (red, blue) in moves {
                resolve(&mut world, [red, blue]);
                for p in world.projectiles() {
                    prop_assert!(world.grid().contains(p.position));
                    prop_assert!(!world.grid().is_wall(p.position));
                }
            }
        }
    }
}
