//! Closed-form orbit functions used by the worldtube compute tags.
//!
//! Units are those of the central black hole: `G = M = 1`. The particle
//! follows a Newtonian circular orbit in the `xy` plane, so the orbital
//! angular velocity is `r^{-3/2}` and the acceleration is `-x / |x|^3`.

use anyhow::{Result, bail, ensure};

use crate::{ExcisionSphere, PositionVelocity};

fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn norm(a: &[f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

/// Distance of the sphere's center from the rotation axis.
pub fn orbital_radius(sphere: &ExcisionSphere) -> f64 {
    sphere.center[0].hypot(sphere.center[1])
}

/// Position and velocity of a circular orbit through the sphere's center at
/// `time = 0`.
pub fn circular_orbit(
    position_velocity: &mut PositionVelocity,
    sphere: &ExcisionSphere,
    time: f64,
) -> Result<()> {
    let radius = orbital_radius(sphere);
    if radius == 0.0 {
        bail!(
            "excision sphere '{}' is centered on the rotation axis",
            sphere.name
        );
    }

    let omega = radius.powf(-1.5);
    let phase = sphere.center[1].atan2(sphere.center[0]) + omega * time;
    let (sin, cos) = phase.sin_cos();

    position_velocity[0] = [radius * cos, radius * sin, sphere.center[2]];
    position_velocity[1] = [-radius * omega * sin, radius * omega * cos, 0.0];
    Ok(())
}

/// Position and velocity as evolved by the orbit integrator.
pub fn evolved_orbit(
    position_velocity: &mut PositionVelocity,
    position: &[f64; 3],
    velocity: &[f64; 3],
) {
    position_velocity[0] = *position;
    position_velocity[1] = *velocity;
}

/// Newtonian acceleration toward the origin.
pub fn geodesic_acceleration(
    acceleration: &mut [f64; 3],
    position_velocity: &PositionVelocity,
) -> Result<()> {
    let position = &position_velocity[0];
    let r = norm(position);
    ensure!(r > 0.0, "particle is at the central singularity");

    let factor = -1.0 / (r * r * r);
    for (a, x) in acceleration.iter_mut().zip(position) {
        *a = factor * x;
    }
    Ok(())
}

/// Amplitude of the scalar puncture field at the particle.
///
/// Order 0 is the Coulomb-like `q / r`. Order 1 adds the leading velocity
/// and acceleration correction, which vanishes on a circular orbit.
pub fn puncture_amplitude(
    charge: f64,
    expansion_order: usize,
    position_velocity: &PositionVelocity,
    acceleration: &[f64; 3],
) -> Result<f64> {
    let [position, velocity] = position_velocity;
    let r = norm(position);
    ensure!(r > 0.0, "particle is at the central singularity");

    let coulomb = charge / r;
    match expansion_order {
        0 => Ok(coulomb),
        1 => {
            let correction = 0.5 * (dot(velocity, velocity) + dot(position, acceleration));
            Ok(coulomb * (1.0 + correction))
        }
        order => bail!("expansion order {order} is not implemented"),
    }
}

/// Position and velocity at `initial_time` on the circular orbit.
pub fn initial_position_and_velocity(
    sphere: &ExcisionSphere,
    initial_time: f64,
) -> Result<PositionVelocity> {
    let mut position_velocity = PositionVelocity::default();
    circular_orbit(&mut position_velocity, sphere, initial_time)?;
    Ok(position_velocity)
}
