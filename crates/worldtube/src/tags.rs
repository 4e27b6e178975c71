//! Tag handles of the worldtube module.

use databox::Tag;

use crate::{ExcisionSphere, PositionVelocity};

/// The scalar charge in units of the black hole mass.
pub fn charge() -> Tag<f64> {
    Tag::new("Charge")
}

/// The mass of the scalar particle.
pub fn mass() -> Tag<f64> {
    Tag::new("Mass")
}

/// Internal expansion order of the worldtube solution.
pub fn expansion_order() -> Tag<usize> {
    Tag::new("ExpansionOrder")
}

/// The excision sphere acting as the worldtube.
pub fn excision_sphere() -> Tag<ExcisionSphere> {
    Tag::new("ExcisionSphere")
}

pub fn time() -> Tag<f64> {
    Tag::new("Time")
}

/// Particle position integrated by the singleton.
pub fn evolved_position() -> Tag<[f64; 3]> {
    Tag::new("EvolvedPosition")
}

/// Particle velocity integrated by the singleton.
pub fn evolved_velocity() -> Tag<[f64; 3]> {
    Tag::new("EvolvedVelocity")
}

pub fn initial_position_and_velocity() -> Tag<PositionVelocity> {
    Tag::new("InitialPositionAndVelocity")
}

/// Base tag: the particle's position and velocity, however obtained.
pub fn particle_position_velocity() -> Tag<PositionVelocity> {
    Tag::new("ParticlePositionVelocity")
}

/// Circular orbit evaluated at the current time (element boxes).
pub fn particle_position_velocity_compute() -> Tag<PositionVelocity> {
    Tag::new("ParticlePositionVelocityCompute")
}

/// Orbit read from the evolved variables (singleton box).
pub fn evolved_particle_position_velocity_compute() -> Tag<PositionVelocity> {
    Tag::new("EvolvedParticlePositionVelocityCompute")
}

pub fn geodesic_acceleration() -> Tag<[f64; 3]> {
    Tag::new("GeodesicAcceleration")
}

pub fn puncture_amplitude() -> Tag<f64> {
    Tag::new("PunctureAmplitude")
}

pub fn orbital_radius() -> Tag<f64> {
    Tag::new("OrbitalRadius")
}

/// Alias of whichever particle position implementation the box bound.
pub fn particle_state() -> Tag<PositionVelocity> {
    Tag::new("ParticleState")
}
