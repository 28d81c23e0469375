//! Position Integration
//!
//! Moves one player by its held direction flags. Called exactly once per
//! stored player per tick, whether or not the player had events that tick.

use crate::game::state::{Direction, Player, WorldBounds};
use crate::PLAYER_SPEED;

/// Advance a player by `dt` seconds of held movement, clamped so the full
/// footprint stays inside the world.
pub fn advance(player: &mut Player, bounds: &WorldBounds, dt: f32) {
    let mut dx = 0.0;
    let mut dy = 0.0;
    for direction in Direction::ALL {
        if player.moving[direction.index()] {
            let (vx, vy) = direction.vector();
            dx += vx;
            dy += vy;
        }
    }

    player.x = (player.x + dx * PLAYER_SPEED * dt).clamp(0.0, bounds.width - bounds.player_size);
    player.y = (player.y + dy * PLAYER_SPEED * dt).clamp(0.0, bounds.height - bounds.player_size);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player_at(x: f32, y: f32) -> Player {
        Player::new(0, x, y, "hsl(0 80% 50%)".to_string())
    }

    #[test]
    fn stationary_player_does_not_move() {
        let bounds = WorldBounds::default();
        let mut player = player_at(100.0, 100.0);
        advance(&mut player, &bounds, 1.0 / 30.0);
        assert_eq!((player.x, player.y), (100.0, 100.0));
    }

    #[test]
    fn held_direction_moves_by_speed_times_dt() {
        let bounds = WorldBounds::default();
        let mut player = player_at(100.0, 100.0);
        player.moving[Direction::Right.index()] = true;
        advance(&mut player, &bounds, 0.1);
        assert_eq!(player.x, 100.0 + PLAYER_SPEED * 0.1);
        assert_eq!(player.y, 100.0);
    }

    #[test]
    fn opposite_directions_cancel() {
        let bounds = WorldBounds::default();
        let mut player = player_at(100.0, 100.0);
        player.moving[Direction::Left.index()] = true;
        player.moving[Direction::Right.index()] = true;
        advance(&mut player, &bounds, 0.1);
        assert_eq!(player.x, 100.0);
    }

    #[test]
    fn movement_is_clamped_to_world() {
        let bounds = WorldBounds::default();
        let mut player = player_at(bounds.width - bounds.player_size - 1.0, 0.0);
        player.moving[Direction::Right.index()] = true;
        player.moving[Direction::Up.index()] = true;
        advance(&mut player, &bounds, 1.0);
        assert_eq!(player.x, bounds.width - bounds.player_size);
        assert_eq!(player.y, 0.0);
    }
}
