use super::*;
use crate::config::GameConfig;
use crate::gameplay::track::ActiveTrack;

const CABIN_COLOR: Color = Color::srgb(0.93, 0.34, 0.24);
const WINDOW_COLOR: Color = Color::srgb(0.72, 0.86, 0.95);
const GRIP_COLOR: Color = Color::srgb(0.20, 0.22, 0.26);
const GRIP_ARM_WIDTH: f32 = 4.0;
const GRIP_ARM_HEIGHT: f32 = 14.0;

pub(super) fn spawn_cable_car_scene(
    mut commands: Commands,
    config: Res<GameConfig>,
    active_track: Option<Res<ActiveTrack>>,
    existing_player: Query<Entity, With<PlayerCableCar>>,
) {
    if !existing_player.is_empty() {
        return;
    }
    let Some(active_track) = active_track else {
        warn!("No active track while entering the run; cable car not spawned.");
        return;
    };
    let Some(vehicle) = config.active_vehicle() else {
        return;
    };

    let car = CableCar::new(active_track.track.clone(), vehicle.params());
    let half_extents = car.params().half_extents;
    let body_size = half_extents * 2.0;
    let start = car.position();
    let heading = car.heading();

    info!(
        "Spawned cable car `{}` at ({:.1}, {:.1}) with {} passengers.",
        vehicle.id,
        start.x,
        start.y,
        car.passengers()
    );

    let player_entity = commands
        .spawn((
            Name::new("PlayerCableCar"),
            PlayerCableCar { car },
            CabinVisual {
                base_color: CABIN_COLOR,
            },
            Sprite::from_color(CABIN_COLOR, body_size),
            Transform::from_translation(start.extend(CABIN_Z))
                .with_rotation(Quat::from_rotation_z(heading)),
        ))
        .id();

    commands.entity(player_entity).with_children(|parent| {
        parent.spawn((
            Name::new("CabinWindow"),
            Sprite::from_color(
                WINDOW_COLOR,
                Vec2::new(body_size.x * 0.7, body_size.y * 0.28),
            ),
            Transform::from_xyz(0.0, half_extents.y * 0.35, 0.1),
        ));

        parent.spawn((
            Name::new("CabinGripArm"),
            Sprite::from_color(GRIP_COLOR, Vec2::new(GRIP_ARM_WIDTH, GRIP_ARM_HEIGHT)),
            Transform::from_xyz(0.0, half_extents.y + GRIP_ARM_HEIGHT * 0.5, -0.1),
        ));
    });
}

pub(super) fn cleanup_cable_car_scene(
    mut commands: Commands,
    player_query: Query<Entity, With<PlayerCableCar>>,
) {
    for entity in &player_query {
        commands.entity(entity).try_despawn();
    }
}
