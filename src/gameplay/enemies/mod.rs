mod motion;

pub use motion::{EnemyBody, EnemyMotion};

use crate::config::GameConfig;
use crate::gameplay::track::ActiveTrack;
use crate::gameplay::vehicle::{CableCar, CableCarHitEvent, PlayerCableCar};
use crate::gameplay::GameplaySet;
use crate::states::GameState;
use bevy::prelude::*;

const ENEMY_Z: f32 = 8.0;

pub struct EnemyGameplayPlugin;

impl Plugin for EnemyGameplayPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(GameState::InRun), spawn_level_enemies)
            .add_systems(OnExit(GameState::Results), cleanup_enemies)
            .add_systems(
                Update,
                detect_cable_car_collisions.in_set(GameplaySet::Collide),
            )
            .add_systems(Update, update_enemy_motion.in_set(GameplaySet::Enemies))
            .add_systems(
                Update,
                sync_enemy_transforms.in_set(GameplaySet::Presentation),
            );
    }
}

#[derive(Component)]
pub struct Enemy;

#[derive(Component, Debug, Clone, Copy)]
pub struct EnemyState {
    pub body: EnemyBody,
}

fn spawn_level_enemies(
    mut commands: Commands,
    config: Res<GameConfig>,
    active_track: Option<Res<ActiveTrack>>,
    existing_enemies: Query<Entity, With<Enemy>>,
) {
    if !existing_enemies.is_empty() {
        return;
    }
    let Some(active_track) = active_track else {
        return;
    };
    let Some(level) = config.levels_by_id.get(&active_track.level_id) else {
        warn!(
            "Active level `{}` is missing from config; no enemies spawned.",
            active_track.level_id
        );
        return;
    };

    let half_extents = Vec2::from_array(config.game.enemies.half_extents);
    for (index, enemy_cfg) in level.enemies.iter().enumerate() {
        let body = EnemyBody::new(enemy_cfg.motion(), enemy_cfg.speed(), half_extents);
        let kind = body.motion.kind_label();
        commands.spawn((
            Name::new(format!("Enemy/{}/{index}", kind)),
            Enemy,
            EnemyState { body },
            Sprite::from_color(color_for_motion(&body.motion), half_extents * 2.0),
            Transform::from_translation(body.position.extend(ENEMY_Z)),
        ));
    }

    info!(
        "Spawned {} enemies for level `{}`.",
        level.enemies.len(),
        level.id
    );
}

fn cleanup_enemies(mut commands: Commands, enemy_query: Query<Entity, With<Enemy>>) {
    for entity in &enemy_query {
        commands.entity(entity).try_despawn();
    }
}

fn detect_cable_car_collisions(
    player_query: Query<&PlayerCableCar>,
    enemy_query: Query<(Entity, &EnemyState), With<Enemy>>,
    mut hit_events: MessageWriter<CableCarHitEvent>,
) {
    let Ok(player) = player_query.single() else {
        return;
    };

    for (entity, enemy) in &enemy_query {
        if enemy_overlaps_cable_car(&player.car, &enemy.body) {
            hit_events.write(CableCarHitEvent {
                enemy: entity,
                enemy_speed: enemy.body.speed,
            });
        }
    }
}

/// Strict AABB overlap between the rotated cabin's bounds and the enemy box.
pub fn enemy_overlaps_cable_car(car: &CableCar, enemy: &EnemyBody) -> bool {
    car.hitbox().intersects(&enemy.hitbox())
}

fn update_enemy_motion(time: Res<Time>, mut enemy_query: Query<&mut EnemyState, With<Enemy>>) {
    let dt = time.delta_secs();
    for mut enemy in &mut enemy_query {
        enemy.body.update(dt);
    }
}

fn sync_enemy_transforms(mut enemy_query: Query<(&EnemyState, &mut Transform), With<Enemy>>) {
    for (enemy, mut transform) in &mut enemy_query {
        transform.translation = enemy.body.position.extend(ENEMY_Z);
    }
}

fn color_for_motion(motion: &EnemyMotion) -> Color {
    match motion {
        EnemyMotion::Patrol { .. } => Color::srgb(0.86, 0.57, 0.36),
        EnemyMotion::Oscillator { .. } => Color::srgb(0.54, 0.74, 0.92),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gameplay::track::Track;
    use crate::gameplay::vehicle::CableCarParams;
    use std::sync::Arc;

    fn parked_car() -> CableCar {
        let track = Arc::new(Track::new(vec![Vec2::ZERO, Vec2::new(500.0, 0.0)]).unwrap());
        CableCar::new(
            track,
            CableCarParams {
                gravity_enabled: false,
                ..CableCarParams::default()
            },
        )
    }

    fn patrol_at(x: f32, y: f32) -> EnemyBody {
        let point = Vec2::new(x, y);
        EnemyBody::new(EnemyMotion::patrol(point, point), 0.0, Vec2::new(20.0, 10.0))
    }

    #[test]
    fn overlapping_enemy_hits_the_car() {
        // cabin spans x in [-20, 20], y in [-30, 30]
        assert!(enemy_overlaps_cable_car(&parked_car(), &patrol_at(30.0, 0.0)));
        assert!(enemy_overlaps_cable_car(&parked_car(), &patrol_at(0.0, 35.0)));
    }

    #[test]
    fn touching_or_distant_enemy_does_not_hit() {
        assert!(!enemy_overlaps_cable_car(&parked_car(), &patrol_at(40.0, 0.0)));
        assert!(!enemy_overlaps_cable_car(&parked_car(), &patrol_at(0.0, 40.0)));
        assert!(!enemy_overlaps_cable_car(&parked_car(), &patrol_at(200.0, 0.0)));
    }
}
