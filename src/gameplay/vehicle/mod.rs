mod kinematics;
mod runtime;
mod scene;

pub use kinematics::{CableCar, CableCarParams, CableCarSnapshot, TrackBound};

use crate::gameplay::GameplaySet;
use crate::states::GameState;
use bevy::prelude::*;
use runtime::*;
use scene::*;

const CABIN_Z: f32 = 10.0;
const CAMERA_Z: f32 = 999.9;
const CABIN_HIT_FLASH_DURATION_S: f32 = 0.18;
const CAMERA_LOOK_AHEAD_FACTOR: f32 = 0.35;
const CAMERA_LOOK_AHEAD_MAX: f32 = 160.0;
const CAMERA_LOOK_AHEAD_MAX_STEP: f32 = 240.0;

pub struct VehicleGameplayPlugin;

impl Plugin for VehicleGameplayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<VehicleInputState>()
            .init_resource::<VehicleInputBindings>()
            .init_resource::<VehicleTelemetry>()
            .init_resource::<CameraFollowState>()
            .add_message::<CableCarHitEvent>()
            .add_systems(
                OnEnter(GameState::InRun),
                (configure_camera_zoom, spawn_cable_car_scene),
            )
            .add_systems(
                OnExit(GameState::Results),
                (
                    cleanup_cable_car_scene,
                    reset_camera_follow_state,
                    reset_vehicle_telemetry,
                ),
            )
            .add_systems(Update, read_vehicle_input.in_set(GameplaySet::Input))
            .add_systems(
                Update,
                (sync_cable_car_params_from_config, apply_cable_car_drive)
                    .chain()
                    .in_set(GameplaySet::Drive),
            )
            .add_systems(Update, apply_cable_car_hits.in_set(GameplaySet::React))
            .add_systems(
                Update,
                (
                    sync_cable_car_transform,
                    update_cabin_hit_flash,
                    update_vehicle_telemetry,
                    camera_follow_cable_car,
                )
                    .chain()
                    .in_set(GameplaySet::Presentation),
            );
    }
}

/// The player's cable car. Owns the longitudinal model; the transform mirrors it.
#[derive(Component, Debug, Clone)]
pub struct PlayerCableCar {
    pub car: CableCar,
}

#[derive(Component, Debug, Clone, Copy)]
struct CabinVisual {
    base_color: Color,
}

#[derive(Component, Debug, Clone, Copy)]
struct CabinHitFlash {
    remaining_s: f32,
}

/// An enemy overlapped the cable car this frame.
#[derive(Message, Debug, Clone, Copy)]
pub struct CableCarHitEvent {
    pub enemy: Entity,
    pub enemy_speed: f32,
}

#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VehicleInputState {
    pub forward: bool,
    pub backward: bool,
}

#[derive(Resource, Debug, Clone)]
struct VehicleInputBindings {
    forward: Vec<KeyCode>,
    backward: Vec<KeyCode>,
}

impl Default for VehicleInputBindings {
    fn default() -> Self {
        Self {
            forward: vec![KeyCode::KeyD, KeyCode::ArrowRight],
            backward: vec![KeyCode::KeyA, KeyCode::ArrowLeft],
        }
    }
}

#[derive(Resource, Debug, Clone, Default)]
pub struct VehicleTelemetry {
    pub distance: f32,
    pub total_length: f32,
    pub progress: f32,
    pub speed: f32,
    pub top_speed: f32,
    pub heading_rad: f32,
    pub passengers: u32,
    pub hits_taken: u32,
    pub bound: TrackBound,
}

#[derive(Resource, Debug, Clone, Default)]
struct CameraFollowState {
    initialized: bool,
    look_ahead: Vec2,
}
