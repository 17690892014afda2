//! Ambient weather state consumed by the traffic simulation.

use bevy::prelude::*;

/// Current ambient weather. Only rain matters to the AI: it drives the wiper
/// level broadcast in every status snapshot. The session layer owns the
/// actual weather simulation and writes this resource.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct Weather {
    /// Rain intensity in [0, 1].
    pub rain_intensity: f32,
}
