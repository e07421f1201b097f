use super::*;
use crate::config::GameConfig;

pub(super) fn read_vehicle_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    bindings: Res<VehicleInputBindings>,
    mut input_state: ResMut<VehicleInputState>,
) {
    input_state.forward = bindings.forward.iter().any(|key| keyboard.pressed(*key));
    input_state.backward = bindings.backward.iter().any(|key| keyboard.pressed(*key));
}

pub(super) fn sync_cable_car_params_from_config(
    config: Res<GameConfig>,
    mut player_query: Query<&mut PlayerCableCar>,
) {
    if !config.is_changed() {
        return;
    }
    let Some(vehicle) = config.active_vehicle() else {
        return;
    };

    let params = vehicle.params();
    for mut player in &mut player_query {
        if *player.car.params() != params {
            player.car.set_params(params);
            info!("Applied vehicle tuning `{}` to the cable car.", vehicle.id);
        }
    }
}

pub(super) fn apply_cable_car_drive(
    time: Res<Time>,
    input_state: Res<VehicleInputState>,
    mut player_query: Query<&mut PlayerCableCar>,
) {
    let Ok(mut player) = player_query.single_mut() else {
        return;
    };
    drive_cable_car(&mut player.car, *input_state, time.delta_secs());
}

/// One frame of driver input followed by integration. Forward wins when both are held.
pub fn drive_cable_car(car: &mut CableCar, input: VehicleInputState, dt: f32) {
    if input.forward {
        car.accelerate(dt);
    } else if input.backward {
        car.decelerate(dt);
    } else {
        car.apply_friction(dt);
    }
    car.update(dt);
}

pub(super) fn apply_cable_car_hits(
    mut commands: Commands,
    mut hit_events: MessageReader<CableCarHitEvent>,
    mut telemetry: ResMut<VehicleTelemetry>,
    mut player_query: Query<(Entity, &mut PlayerCableCar)>,
) {
    let Ok((player_entity, mut player)) = player_query.single_mut() else {
        hit_events.clear();
        return;
    };

    let mut any_hit = false;
    for event in hit_events.read() {
        player.car.hit_enemy(event.enemy_speed);
        telemetry.hits_taken = telemetry.hits_taken.saturating_add(1);
        any_hit = true;
        info!(
            "Cable car hit by {:?} (enemy speed {:.1}): {} passengers left, speed now {:.1}.",
            event.enemy,
            event.enemy_speed,
            player.car.passengers(),
            player.car.speed()
        );
    }

    if any_hit {
        commands.entity(player_entity).insert(CabinHitFlash {
            remaining_s: CABIN_HIT_FLASH_DURATION_S,
        });
    }
}

pub(super) fn sync_cable_car_transform(
    mut player_query: Query<(&PlayerCableCar, &mut Transform)>,
) {
    for (player, mut transform) in &mut player_query {
        let position = player.car.position();
        transform.translation = position.extend(CABIN_Z);
        transform.rotation = Quat::from_rotation_z(player.car.heading());
    }
}

pub(super) fn update_cabin_hit_flash(
    mut commands: Commands,
    time: Res<Time>,
    mut cabin_query: Query<(Entity, &CabinVisual, &mut Sprite, Option<&mut CabinHitFlash>)>,
) {
    let dt = time.delta_secs();

    for (entity, cabin, mut sprite, hit_flash) in &mut cabin_query {
        if let Some(mut flash) = hit_flash {
            flash.remaining_s -= dt;
            sprite.color = Color::srgb(1.0, 0.32, 0.28);

            if flash.remaining_s <= 0.0 {
                commands.entity(entity).remove::<CabinHitFlash>();
                sprite.color = cabin.base_color;
            }
        } else {
            sprite.color = cabin.base_color;
        }
    }
}

pub(super) fn update_vehicle_telemetry(
    mut telemetry: ResMut<VehicleTelemetry>,
    player_query: Query<&PlayerCableCar>,
) {
    let Ok(player) = player_query.single() else {
        return;
    };
    let car = &player.car;

    telemetry.distance = car.distance_along_track();
    telemetry.total_length = car.track().total_length();
    telemetry.progress = car.progress();
    telemetry.speed = car.speed();
    telemetry.top_speed = telemetry.top_speed.max(car.speed().abs());
    telemetry.heading_rad = car.heading();
    telemetry.passengers = car.passengers();
    telemetry.bound = car.bound();
}

pub(super) fn reset_vehicle_telemetry(mut telemetry: ResMut<VehicleTelemetry>) {
    *telemetry = VehicleTelemetry::default();
}

pub(super) fn reset_camera_follow_state(mut state: ResMut<CameraFollowState>) {
    *state = CameraFollowState::default();
}

pub(super) fn configure_camera_zoom(
    config: Res<GameConfig>,
    mut camera_query: Query<&mut Projection, With<Camera2d>>,
) {
    let Ok(mut projection) = camera_query.single_mut() else {
        return;
    };

    if let Projection::Orthographic(ortho) = &mut *projection {
        ortho.scale = 1.0 / config.game.camera.zoom.max(0.01);
    }
}

pub(super) fn camera_follow_cable_car(
    time: Res<Time>,
    config: Res<GameConfig>,
    mut follow_state: ResMut<CameraFollowState>,
    player_query: Query<&PlayerCableCar>,
    mut camera_query: Query<&mut Transform, (With<Camera2d>, Without<PlayerCableCar>)>,
) {
    let Ok(player) = player_query.single() else {
        return;
    };
    let Ok(mut camera_transform) = camera_query.single_mut() else {
        return;
    };

    let car = &player.car;
    let heading = Vec2::from_angle(car.heading());
    let target_look_ahead =
        (heading * car.speed() * CAMERA_LOOK_AHEAD_FACTOR).clamp_length_max(CAMERA_LOOK_AHEAD_MAX);
    let dt = time.delta_secs().max(0.000_1);

    if !follow_state.initialized {
        follow_state.initialized = true;
        follow_state.look_ahead = target_look_ahead;
        let target = car.position() + target_look_ahead;
        camera_transform.translation = target.extend(CAMERA_Z);
        return;
    }

    follow_state.look_ahead = move_towards(
        follow_state.look_ahead,
        target_look_ahead,
        CAMERA_LOOK_AHEAD_MAX_STEP * dt,
    );
    let target = car.position() + follow_state.look_ahead;
    let blend = (config.game.camera.follow_smoothing_hz * dt).clamp(0.0, 1.0);
    let current = camera_transform.translation.truncate();
    camera_transform.translation = current.lerp(target, blend).extend(CAMERA_Z);
}

fn move_towards(current: Vec2, target: Vec2, max_delta: f32) -> Vec2 {
    let offset = target - current;
    let distance = offset.length();
    if distance <= max_delta || distance <= f32::EPSILON {
        target
    } else {
        current + offset / distance * max_delta
    }
}
