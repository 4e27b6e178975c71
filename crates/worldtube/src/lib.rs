//! Worldtube tags for a scalar charge orbiting a black hole.
//!
//! The module contributes its tag declarations to a [`Registry`] through
//! [`register`]. Two kinds of boxes use them:
//!
//! - **element boxes** read the particle's position and velocity from the
//!   default `ParticlePositionVelocityCompute`, a circular orbit evaluated at
//!   the element's current `Time`;
//! - the **singleton box** names `EvolvedParticlePositionVelocityCompute`
//!   explicitly, which binds the `ParticlePositionVelocity` base tag to the
//!   evolved variables instead.
//!
//! Everything downstream (`GeodesicAcceleration`, `PunctureAmplitude`,
//! `ParticleState`) depends on the base tag and is unaware of which
//! implementation a box bound.

use databox::{
    FromOptionValue, OptionTable, OptionTag, OptionViolation, Registry, TagDecl, TagId,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod options;
pub mod orbit;
pub mod tags;

/// Position and velocity of the particle in inertial coordinates.
pub type PositionVelocity = [[f64; 3]; 2];

/// A sphere excised from the domain, acting as the worldtube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcisionSphere {
    pub name: String,
    pub radius: f64,
    /// Center at the initial time.
    pub center: [f64; 3],
}

impl ExcisionSphere {
    pub fn new(name: impl Into<String>, radius: f64, center: [f64; 3]) -> Self {
        Self {
            name: name.into(),
            radius,
            center,
        }
    }

    /// Build the sphere from the `Worldtube.ExcisionSphere` and
    /// `Domain.ExcisionSphere.*` options.
    pub fn from_options(table: &OptionTable) -> Result<Self, OptionViolation> {
        Ok(Self {
            name: read(&options::excision_sphere_name(), table)?,
            radius: read(&options::excision_sphere_radius(), table)?,
            center: read(&options::excision_sphere_center(), table)?,
        })
    }
}

fn read<T: FromOptionValue>(option: &OptionTag, table: &OptionTable) -> Result<T, OptionViolation> {
    let value = option.validate(table)?;
    T::from_option_value(&value).ok_or_else(|| {
        OptionViolation::new(option.name(), format!("{value} does not have the expected shape"))
    })
}

/// Register every worldtube tag.
pub fn register(registry: &mut Registry) -> databox::Result<()> {
    let before = registry.len();

    registry.register(TagDecl::from_options(
        &tags::charge(),
        vec![options::charge()],
        |values| Ok(values.get::<f64>(options::CHARGE)?),
    ))?;
    registry.register(TagDecl::from_options(
        &tags::mass(),
        vec![options::mass()],
        |values| Ok(values.get::<f64>(options::MASS)?),
    ))?;
    registry.register(TagDecl::from_options(
        &tags::expansion_order(),
        vec![options::expansion_order()],
        |values| Ok(values.get::<usize>(options::EXPANSION_ORDER)?),
    ))?;

    registry.register(TagDecl::simple(&tags::excision_sphere()))?;
    registry.register(TagDecl::simple(&tags::time()))?;

    registry.register(TagDecl::from_options_and_tags(
        &tags::initial_position_and_velocity(),
        vec![options::initial_time()],
        vec![tags::excision_sphere().into()],
        |values, args| {
            let sphere = args.get(&tags::excision_sphere())?;
            let initial_time = values.get::<f64>(options::INITIAL_TIME)?;
            orbit::initial_position_and_velocity(sphere, initial_time)
        },
    ))?;
    registry.register(TagDecl::from_options_and_tags(
        &tags::evolved_position(),
        vec![],
        vec![tags::initial_position_and_velocity().into()],
        |_, args| Ok(args.get(&tags::initial_position_and_velocity())?[0]),
    ))?;
    registry.register(TagDecl::from_options_and_tags(
        &tags::evolved_velocity(),
        vec![],
        vec![tags::initial_position_and_velocity().into()],
        |_, args| Ok(args.get(&tags::initial_position_and_velocity())?[1]),
    ))?;

    registry.register(
        TagDecl::compute(
            &tags::particle_position_velocity_compute(),
            vec![tags::excision_sphere().into(), tags::time().into()],
            |position_velocity, args| {
                orbit::circular_orbit(
                    position_velocity,
                    args.get(&tags::excision_sphere())?,
                    *args.get(&tags::time())?,
                )
            },
        )
        .default_for(&tags::particle_position_velocity()),
    )?;
    registry.register(
        TagDecl::compute(
            &tags::evolved_particle_position_velocity_compute(),
            vec![tags::evolved_position().into(), tags::evolved_velocity().into()],
            |position_velocity, args| {
                orbit::evolved_orbit(
                    position_velocity,
                    args.get(&tags::evolved_position())?,
                    args.get(&tags::evolved_velocity())?,
                );
                Ok(())
            },
        )
        .implements(&tags::particle_position_velocity()),
    )?;

    registry.register(TagDecl::compute(
        &tags::geodesic_acceleration(),
        vec![tags::particle_position_velocity().into()],
        |acceleration, args| {
            orbit::geodesic_acceleration(
                acceleration,
                args.get(&tags::particle_position_velocity())?,
            )
        },
    ))?;
    registry.register(TagDecl::compute(
        &tags::puncture_amplitude(),
        vec![
            tags::charge().into(),
            tags::expansion_order().into(),
            tags::particle_position_velocity().into(),
            tags::geodesic_acceleration().into(),
        ],
        |amplitude, args| {
            *amplitude = orbit::puncture_amplitude(
                *args.get(&tags::charge())?,
                *args.get(&tags::expansion_order())?,
                args.get(&tags::particle_position_velocity())?,
                args.get(&tags::geodesic_acceleration())?,
            )?;
            Ok(())
        },
    ))?;
    registry.register(TagDecl::compute(
        &tags::orbital_radius(),
        vec![tags::excision_sphere().into()],
        |radius, args| {
            *radius = orbit::orbital_radius(args.get(&tags::excision_sphere())?);
            Ok(())
        },
    ))?;

    registry.register(TagDecl::reference(
        &tags::particle_state(),
        &tags::particle_position_velocity(),
    ))?;

    debug!(tags = registry.len() - before, "registered worldtube tags");
    Ok(())
}

/// Roots of an element box.
pub fn element_tags() -> Vec<TagId> {
    vec![
        tags::geodesic_acceleration().into(),
        tags::puncture_amplitude().into(),
        tags::particle_state().into(),
        tags::orbital_radius().into(),
    ]
}

/// Roots of the orbit-tracking singleton box.
pub fn singleton_tags() -> Vec<TagId> {
    vec![
        tags::evolved_particle_position_velocity_compute().into(),
        tags::geodesic_acceleration().into(),
        tags::particle_state().into(),
        tags::mass().into(),
        tags::time().into(),
    ]
}
