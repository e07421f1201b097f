pub mod collision;
pub mod enemies;
pub mod track;
pub mod vehicle;

use crate::config::GameConfig;
use crate::states::GameState;
use bevy::prelude::*;
use enemies::EnemyGameplayPlugin;
use track::TrackGameplayPlugin;
use vehicle::VehicleGameplayPlugin;

/// Per-frame stages of a running level, executed in declaration order.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameplaySet {
    Input,
    Drive,
    Collide,
    React,
    Enemies,
    Progress,
    Presentation,
}

pub struct GameplayPlugin;

impl Plugin for GameplayPlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            Update,
            (
                GameplaySet::Input,
                GameplaySet::Drive,
                GameplaySet::Collide,
                GameplaySet::React,
                GameplaySet::Enemies,
                GameplaySet::Progress,
                GameplaySet::Presentation,
            )
                .chain()
                .run_if(in_state(GameState::InRun))
                .run_if(resource_exists::<GameConfig>),
        )
        .add_plugins(TrackGameplayPlugin)
        .add_plugins(VehicleGameplayPlugin)
        .add_plugins(EnemyGameplayPlugin);
    }
}
