//! Change of basis between the game's axes and glTF's.
//!
//! BH3 is left-handed with X left, Y back, Z up. glTF is right-handed with
//! X left, Y up, Z forward. The two differ by a quarter turn about X, and
//! the handedness flip reverses triangle winding.

use glam::Quat;
use std::f32::consts::FRAC_PI_2;

/// Rotation taking glTF root transforms into the game's frame
pub fn scene_to_game() -> Quat {
    Quat::from_rotation_x(FRAC_PI_2)
}

/// Rotation taking the game's root transforms into glTF's frame
pub fn game_to_scene() -> Quat {
    Quat::from_rotation_x(-FRAC_PI_2)
}

/// Swap the second and third corner of a triangle.
pub fn flip_winding<T: Copy>([a, b, c]: [T; 3]) -> [T; 3] {
    [a, c, b]
}
