use crate::config::{validate_vehicle, GameConfig, VehicleConfig, CONFIG_DIR};
use crate::gameplay::enemies::{Enemy, EnemyState};
use crate::gameplay::track::ActiveTrack;
use crate::gameplay::vehicle::{
    CableCarSnapshot, PlayerCableCar, VehicleInputState, VehicleTelemetry,
};
use crate::states::{GameState, LevelProgress};
use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use std::fs;
use std::path::Path;

pub struct DebugOverlayPlugin;

impl Plugin for DebugOverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<KeybindOverlayState>()
            .init_resource::<DebugHitboxState>()
            .init_resource::<VehicleTuningPanelState>()
            .add_systems(Update, spawn_debug_overlay)
            .add_systems(Update, sync_debug_overlay_enabled)
            .add_systems(Update, toggle_keybind_overlay)
            .add_systems(Update, toggle_vehicle_tuning_panel)
            .add_systems(Update, sync_keybind_overlay_visibility)
            .add_systems(Update, log_cable_car_snapshot_hotkey)
            .add_systems(Update, (toggle_debug_hitboxes, draw_debug_hitboxes).chain())
            .add_systems(
                Update,
                reset_cable_car_hotkey.run_if(in_state(GameState::InRun)),
            )
            .add_systems(
                Update,
                update_debug_overlay_text
                    .run_if(in_state(GameState::InRun))
                    .run_if(resource_exists::<GameConfig>),
            )
            .add_systems(
                EguiPrimaryContextPass,
                vehicle_tuning_panel_ui
                    .run_if(in_state(GameState::InRun))
                    .run_if(resource_exists::<GameConfig>),
            );
    }
}

#[derive(Component)]
struct DebugOverlayText;

#[derive(Component)]
struct KeybindOverlayText;

#[derive(Resource, Debug, Clone, Default)]
struct KeybindOverlayState {
    visible: bool,
}

#[derive(Resource, Debug, Clone, Default)]
struct DebugHitboxState {
    visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct VehicleTuningParams {
    max_speed: f32,
    acceleration: f32,
    friction: f32,
    gravity_accel: f32,
    gravity_enabled: bool,
    dead_zone_speed: f32,
    collision_base_impulse: f32,
    collision_relative_factor: f32,
    collision_tick_seconds: f32,
    half_width: f32,
    half_height: f32,
}

impl VehicleTuningParams {
    fn from_vehicle(vehicle: &VehicleConfig) -> Self {
        Self {
            max_speed: vehicle.max_speed,
            acceleration: vehicle.acceleration,
            friction: vehicle.friction,
            gravity_accel: vehicle.gravity_accel,
            gravity_enabled: vehicle.gravity_enabled,
            dead_zone_speed: vehicle.dead_zone_speed,
            collision_base_impulse: vehicle.collision_base_impulse,
            collision_relative_factor: vehicle.collision_relative_factor,
            collision_tick_seconds: vehicle.collision_tick_seconds,
            half_width: vehicle.half_extents[0],
            half_height: vehicle.half_extents[1],
        }
    }

    fn apply_to_vehicle(&self, vehicle: &mut VehicleConfig) {
        vehicle.max_speed = self.max_speed;
        vehicle.acceleration = self.acceleration;
        vehicle.friction = self.friction;
        vehicle.gravity_accel = self.gravity_accel;
        vehicle.gravity_enabled = self.gravity_enabled;
        vehicle.dead_zone_speed = self.dead_zone_speed;
        vehicle.collision_base_impulse = self.collision_base_impulse;
        vehicle.collision_relative_factor = self.collision_relative_factor;
        vehicle.collision_tick_seconds = self.collision_tick_seconds;
        vehicle.half_extents = [self.half_width, self.half_height];
    }
}

#[derive(Resource, Debug, Default)]
struct VehicleTuningPanelState {
    visible: bool,
    source_vehicle_id: String,
    params: Option<VehicleTuningParams>,
    status: String,
}

fn spawn_debug_overlay(
    mut commands: Commands,
    keybind_overlay: Res<KeybindOverlayState>,
    config: Option<Res<GameConfig>>,
    existing_overlay: Query<Entity, With<DebugOverlayText>>,
) {
    if !existing_overlay.is_empty() {
        return;
    }

    let Some(config) = config else {
        return;
    };

    if !config.game.app.debug_overlay {
        return;
    }

    commands.spawn((
        DebugOverlayText,
        Text::new("debug overlay initializing..."),
        TextFont {
            font_size: 15.0,
            ..default()
        },
        TextColor(Color::srgb(0.92, 0.95, 0.97)),
        Node {
            position_type: PositionType::Absolute,
            right: Val::Px(12.0),
            top: Val::Px(12.0),
            ..default()
        },
        ZIndex(100),
    ));

    commands.spawn((
        KeybindOverlayText,
        Text::new(keybind_overlay_text()),
        TextFont {
            font_size: 15.0,
            ..default()
        },
        TextColor(Color::srgb(0.90, 0.94, 0.97)),
        BackgroundColor(Color::srgba(0.06, 0.08, 0.10, 0.82)),
        BorderColor::all(Color::srgba(0.60, 0.68, 0.74, 0.9)),
        Node {
            position_type: PositionType::Absolute,
            right: Val::Px(12.0),
            top: Val::Px(180.0),
            padding: UiRect::axes(Val::Px(10.0), Val::Px(8.0)),
            border: UiRect::all(Val::Px(1.0)),
            ..default()
        },
        if keybind_overlay.visible {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        },
        ZIndex(100),
    ));
}

/// Hides the stats text when a config reload turns `debug_overlay` off.
fn sync_debug_overlay_enabled(
    config: Option<Res<GameConfig>>,
    mut overlay_query: Query<&mut Visibility, With<DebugOverlayText>>,
) {
    let Some(config) = config else {
        return;
    };
    if !config.is_changed() {
        return;
    }

    let next_visibility = if config.game.app.debug_overlay {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    };
    for mut visibility in &mut overlay_query {
        *visibility = next_visibility;
    }
}

#[allow(clippy::too_many_arguments)]
fn update_debug_overlay_text(
    diagnostics: Res<DiagnosticsStore>,
    telemetry: Res<VehicleTelemetry>,
    progress: Res<LevelProgress>,
    input_state: Res<VehicleInputState>,
    active_track: Option<Res<ActiveTrack>>,
    enemy_query: Query<(), With<Enemy>>,
    player_query: Query<&PlayerCableCar>,
    mut overlay_query: Query<&mut Text, With<DebugOverlayText>>,
) {
    let Ok(mut text) = overlay_query.single_mut() else {
        return;
    };

    let fps = diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(|value| value.smoothed())
        .unwrap_or(0.0);

    let enemy_count = enemy_query.iter().count();
    let position = player_query
        .single()
        .map(|player| player.car.position())
        .unwrap_or(Vec2::ZERO);
    let (level_id, control_points, polyline_points) = active_track
        .as_ref()
        .map(|active| {
            (
                active.level_id.as_str(),
                active.track.control_points().len(),
                active.track.polyline().len(),
            )
        })
        .unwrap_or(("n/a", 0, 0));

    *text = Text::new(format!(
        "FPS: {fps:>5.1}\n\
Level: {level_id} ({control_points} ctrl / {polyline_points} poly pts)\n\
Time: {elapsed:.2}s\n\
Distance: {distance:.1} / {total:.1} ({percent:.1}%)\n\
Speed: {speed:.1} (top {top_speed:.1})\n\
Heading: {heading:.1} deg\n\
Position: ({x:.1}, {y:.1})\n\
Bound: {bound:?}\n\
Input: fwd={forward} back={backward}\n\
Passengers: {passengers} | Hits: {hits}\n\
Enemies: {enemy_count}",
        elapsed = progress.elapsed_s,
        distance = telemetry.distance,
        total = telemetry.total_length,
        percent = telemetry.progress * 100.0,
        speed = telemetry.speed,
        top_speed = telemetry.top_speed,
        heading = telemetry.heading_rad.to_degrees(),
        x = position.x,
        y = position.y,
        bound = telemetry.bound,
        forward = input_state.forward,
        backward = input_state.backward,
        passengers = telemetry.passengers,
        hits = telemetry.hits_taken,
    ));
}

fn toggle_keybind_overlay(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut state: ResMut<KeybindOverlayState>,
    config: Option<Res<GameConfig>>,
) {
    let Some(config) = config else {
        return;
    };

    if !config.game.app.debug_overlay {
        return;
    }

    if keyboard.just_pressed(KeyCode::KeyH) {
        state.visible = !state.visible;
        info!(
            "Debug keybind panel {}.",
            if state.visible { "shown" } else { "hidden" }
        );
    }
}

fn sync_keybind_overlay_visibility(
    state: Res<KeybindOverlayState>,
    mut query: Query<&mut Visibility, With<KeybindOverlayText>>,
) {
    if !state.is_changed() {
        return;
    }

    let next_visibility = if state.visible {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    };

    for mut visibility in &mut query {
        *visibility = next_visibility;
    }
}

fn log_cable_car_snapshot_hotkey(
    keyboard: Res<ButtonInput<KeyCode>>,
    player_query: Query<&PlayerCableCar>,
) {
    if !keyboard.just_pressed(KeyCode::F9) {
        return;
    }

    let Ok(player) = player_query.single() else {
        warn!("Snapshot requested, but no cable car is spawned.");
        return;
    };

    match snapshot_json(&player.car.snapshot()) {
        Ok(json) => info!("Cable car snapshot:\n{json}"),
        Err(error) => error!("Failed to serialize cable car snapshot: {error}"),
    }
}

fn reset_cable_car_hotkey(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut player_query: Query<&mut PlayerCableCar>,
) {
    if !keyboard.just_pressed(KeyCode::KeyR) {
        return;
    }

    for mut player in &mut player_query {
        player.car.reset();
        info!(
            "Cable car reset to the start station with {} passengers.",
            player.car.passengers()
        );
    }
}

fn toggle_debug_hitboxes(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut state: ResMut<DebugHitboxState>,
) {
    if keyboard.just_pressed(KeyCode::KeyB) {
        state.visible = !state.visible;
        info!(
            "Debug hitboxes {}.",
            if state.visible { "shown" } else { "hidden" }
        );
    }
}

fn draw_debug_hitboxes(
    state: Res<DebugHitboxState>,
    mut gizmos: Gizmos,
    active_track: Option<Res<ActiveTrack>>,
    player_query: Query<&PlayerCableCar>,
    enemy_query: Query<&EnemyState, With<Enemy>>,
) {
    if !state.visible {
        return;
    }

    if let Some(active_track) = active_track {
        for point in active_track.track.control_points() {
            gizmos.circle_2d(*point, 5.0, Color::srgb(0.3, 0.9, 1.0));
        }
    }

    for player in &player_query {
        let corners = player.car.hitbox_corners();
        for index in 0..corners.len() {
            gizmos.line_2d(
                corners[index],
                corners[(index + 1) % corners.len()],
                Color::srgb(1.0, 0.85, 0.2),
            );
        }
        let hitbox = player.car.hitbox();
        gizmos.rect_2d(
            Isometry2d::from_translation(hitbox.center()),
            hitbox.size(),
            Color::srgb(1.0, 0.4, 0.2),
        );
    }

    for enemy in &enemy_query {
        let hitbox = enemy.body.hitbox();
        gizmos.rect_2d(
            Isometry2d::from_translation(hitbox.center()),
            hitbox.size(),
            Color::srgb(0.9, 0.2, 0.9),
        );
    }
}

fn snapshot_json(snapshot: &CableCarSnapshot) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(snapshot)
}

fn toggle_vehicle_tuning_panel(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut panel_state: ResMut<VehicleTuningPanelState>,
    config: Option<Res<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::KeyV) {
        return;
    }

    panel_state.visible = !panel_state.visible;
    if panel_state.visible {
        if let Some(config) = config {
            if let Err(error) = sync_panel_state_from_config(&mut panel_state, &config) {
                panel_state.status = error;
            }
        }
        info!("Vehicle tuning panel shown.");
    } else {
        info!("Vehicle tuning panel hidden.");
    }
}

fn vehicle_tuning_panel_ui(
    mut egui_contexts: EguiContexts,
    mut panel_state: ResMut<VehicleTuningPanelState>,
    mut config: ResMut<GameConfig>,
) {
    if !panel_state.visible {
        return;
    }

    if panel_state.params.is_none() || panel_state.source_vehicle_id != config.game.app.vehicle {
        if let Err(error) = sync_panel_state_from_config(&mut panel_state, &config) {
            panel_state.status = error;
            return;
        }
    }

    let Some(mut params) = panel_state.params.clone() else {
        return;
    };

    let mut window_open = panel_state.visible;
    let mut params_changed = false;
    let mut reload_clicked = false;
    let mut apply_clicked = false;
    let status = panel_state.status.clone();
    let vehicle_id = panel_state.source_vehicle_id.clone();

    let Ok(ctx) = egui_contexts.ctx_mut() else {
        return;
    };
    egui::Window::new("Cable Car Tuning")
        .open(&mut window_open)
        .resizable(true)
        .default_width(520.0)
        .show(ctx, |ui| {
            ui.label(format!("Active vehicle: {vehicle_id}"));
            ui.separator();

            ui.collapsing("Drive", |ui| {
                params_changed |= tuning_slider_row(
                    ui,
                    "max_speed",
                    &mut params.max_speed,
                    1.0..=2_000.0,
                    1.0,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "acceleration",
                    &mut params.acceleration,
                    0.0..=3_000.0,
                    1.0,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "friction",
                    &mut params.friction,
                    0.0..=1_000.0,
                    0.5,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "dead_zone_speed",
                    &mut params.dead_zone_speed,
                    0.0..=20.0,
                    0.05,
                );
            });

            ui.collapsing("Gravity", |ui| {
                params_changed |= ui
                    .checkbox(&mut params.gravity_enabled, "gravity_enabled")
                    .changed();
                params_changed |= tuning_slider_row(
                    ui,
                    "gravity_accel",
                    &mut params.gravity_accel,
                    0.0..=1_000.0,
                    0.5,
                );
            });

            ui.collapsing("Collisions", |ui| {
                params_changed |= tuning_slider_row(
                    ui,
                    "collision_base_impulse",
                    &mut params.collision_base_impulse,
                    0.0..=1_000.0,
                    0.5,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "collision_relative_factor",
                    &mut params.collision_relative_factor,
                    0.0..=5.0,
                    0.01,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "collision_tick_seconds",
                    &mut params.collision_tick_seconds,
                    0.0..=2.0,
                    0.005,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "half_width",
                    &mut params.half_width,
                    1.0..=200.0,
                    0.5,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "half_height",
                    &mut params.half_height,
                    1.0..=200.0,
                    0.5,
                );
            });

            ui.separator();
            ui.horizontal(|ui| {
                if ui.button("Reload From Config").clicked() {
                    reload_clicked = true;
                }
                if ui.button("Apply To vehicles.toml").clicked() {
                    apply_clicked = true;
                }
            });

            if !status.is_empty() {
                ui.separator();
                ui.label(status);
            }
        });

    panel_state.visible = window_open;

    if reload_clicked {
        match sync_panel_state_from_config(&mut panel_state, &config) {
            Ok(()) => panel_state.status = "Reloaded values from current config.".to_string(),
            Err(error) => panel_state.status = error,
        }
        return;
    }

    panel_state.params = Some(params.clone());

    if params_changed {
        if let Err(error) = apply_vehicle_tuning_to_runtime_config(
            &mut config,
            &panel_state.source_vehicle_id,
            &params,
        ) {
            panel_state.status = error;
        } else {
            panel_state.status = "Live-tuning active (in-memory config updated).".to_string();
        }
    }

    if apply_clicked {
        match persist_vehicle_tuning_and_reload(
            &mut config,
            &panel_state.source_vehicle_id,
            &params,
        ) {
            Ok(message) => {
                panel_state.status = message;
                if let Err(error) = sync_panel_state_from_config(&mut panel_state, &config) {
                    panel_state.status = error;
                }
            }
            Err(error) => panel_state.status = error,
        }
    }
}

fn tuning_slider_row(
    ui: &mut egui::Ui,
    label: &str,
    value: &mut f32,
    slider_range: std::ops::RangeInclusive<f32>,
    drag_speed: f32,
) -> bool {
    let mut changed = false;
    let drag_range = slider_range.clone();
    ui.horizontal(|ui| {
        ui.label(label);
        changed |= ui
            .add(egui::Slider::new(value, slider_range).show_value(false))
            .changed();
        changed |= ui
            .add(
                egui::DragValue::new(value)
                    .range(drag_range)
                    .speed(drag_speed as f64),
            )
            .changed();
    });
    changed
}

fn sync_panel_state_from_config(
    panel_state: &mut VehicleTuningPanelState,
    config: &GameConfig,
) -> Result<(), String> {
    let vehicle_id = config.game.app.vehicle.clone();
    let Some(vehicle) = config.vehicles_by_id.get(&vehicle_id) else {
        return Err(format!(
            "Vehicle tuning panel: active vehicle `{vehicle_id}` not found in config."
        ));
    };

    panel_state.source_vehicle_id = vehicle_id;
    panel_state.params = Some(VehicleTuningParams::from_vehicle(vehicle));
    Ok(())
}

fn apply_vehicle_tuning_to_runtime_config(
    config: &mut GameConfig,
    vehicle_id: &str,
    params: &VehicleTuningParams,
) -> Result<(), String> {
    let Some(index) = config
        .vehicles
        .vehicles
        .iter()
        .position(|v| v.id == vehicle_id)
    else {
        return Err(format!(
            "Vehicle tuning panel: runtime vehicle `{vehicle_id}` not found in vehicles list."
        ));
    };
    let mut candidate = config.vehicles.vehicles[index].clone();
    params.apply_to_vehicle(&mut candidate);
    validate_vehicle(index, &candidate)
        .map_err(|error| format!("Rejected tuning: {error}"))?;

    let Some(vehicle) = config.vehicles_by_id.get_mut(vehicle_id) else {
        return Err(format!(
            "Vehicle tuning panel: runtime vehicle `{vehicle_id}` not found in vehicles_by_id."
        ));
    };
    *vehicle = candidate.clone();
    config.vehicles.vehicles[index] = candidate;
    Ok(())
}

fn persist_vehicle_tuning_and_reload(
    config: &mut GameConfig,
    vehicle_id: &str,
    params: &VehicleTuningParams,
) -> Result<String, String> {
    let config_dir = Path::new(CONFIG_DIR);
    let path = config_dir.join("vehicles.toml");
    let original_raw = fs::read_to_string(&path)
        .map_err(|error| format!("Failed reading `{}`: {error}", path.display()))?;
    let mut root: toml::Value = toml::from_str(&original_raw)
        .map_err(|error| format!("Failed parsing `{}`: {error}", path.display()))?;

    write_params_to_toml_value(&mut root, vehicle_id, params)?;

    let updated_raw = toml::to_string_pretty(&root)
        .map_err(|error| format!("Failed serializing vehicles TOML: {error}"))?;
    fs::write(&path, updated_raw)
        .map_err(|error| format!("Failed writing `{}`: {error}", path.display()))?;

    match GameConfig::load_from_dir(config_dir) {
        Ok(new_config) => {
            *config = new_config;
            Ok(format!("Applied tuning and saved to {}.", path.display()))
        }
        Err(error) => {
            if let Err(restore_error) = fs::write(&path, original_raw) {
                warn!("Could not restore `{}`: {restore_error}", path.display());
            }
            if let Ok(restored) = GameConfig::load_from_dir(config_dir) {
                *config = restored;
            }
            Err(format!(
                "Apply failed validation: {error}. Reverted `{}`.",
                path.display()
            ))
        }
    }
}

fn write_params_to_toml_value(
    root: &mut toml::Value,
    vehicle_id: &str,
    params: &VehicleTuningParams,
) -> Result<(), String> {
    let Some(vehicles_array) = root.get_mut("vehicles").and_then(toml::Value::as_array_mut) else {
        return Err("vehicles.toml: missing or invalid `vehicles` array".to_string());
    };

    let Some(vehicle_table) = vehicles_array.iter_mut().find_map(|vehicle_value| {
        let table = vehicle_value.as_table_mut()?;
        if table.get("id").and_then(toml::Value::as_str) == Some(vehicle_id) {
            Some(table)
        } else {
            None
        }
    }) else {
        return Err(format!(
            "vehicles.toml: could not find vehicle with id `{vehicle_id}`"
        ));
    };

    set_toml_float(vehicle_table, "max_speed", params.max_speed)?;
    set_toml_float(vehicle_table, "acceleration", params.acceleration)?;
    set_toml_float(vehicle_table, "friction", params.friction)?;
    set_toml_float(vehicle_table, "gravity_accel", params.gravity_accel)?;
    vehicle_table.insert(
        "gravity_enabled".to_string(),
        toml::Value::Boolean(params.gravity_enabled),
    );
    set_toml_float(vehicle_table, "dead_zone_speed", params.dead_zone_speed)?;
    set_toml_float(
        vehicle_table,
        "collision_base_impulse",
        params.collision_base_impulse,
    )?;
    set_toml_float(
        vehicle_table,
        "collision_relative_factor",
        params.collision_relative_factor,
    )?;
    set_toml_float(
        vehicle_table,
        "collision_tick_seconds",
        params.collision_tick_seconds,
    )?;

    for (key, value) in [
        ("half_width", params.half_width),
        ("half_height", params.half_height),
    ] {
        if !value.is_finite() {
            return Err(format!("`{key}` is not a finite number"));
        }
    }
    vehicle_table.insert(
        "half_extents".to_string(),
        toml::Value::Array(vec![
            toml::Value::Float(params.half_width as f64),
            toml::Value::Float(params.half_height as f64),
        ]),
    );

    Ok(())
}

fn set_toml_float(
    table: &mut toml::map::Map<String, toml::Value>,
    key: &str,
    value: f32,
) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!("`{key}` is not a finite number"));
    }

    table.insert(key.to_string(), toml::Value::Float(value as f64));
    Ok(())
}

fn keybind_overlay_text() -> &'static str {
    "Keybinds\n\
H - Toggle this panel\n\
V - Toggle cable car tuning panel\n\
F5 - Hot-reload config\n\
F9 - Log cable car snapshot (JSON)\n\
B - Toggle hitbox gizmos\n\
R - Reset cable car to start\n\
D / Right - Accelerate\n\
A / Left - Decelerate / reverse\n\
Esc - Pause / resume\n\
Enter - Pause -> results\n\
Space - Results -> next level\n\
Q - Quit from results"
}
