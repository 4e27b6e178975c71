//! Option descriptors consumed by the worldtube tags.

use databox::{OptionKind, OptionTag};

pub const CHARGE: &str = "Worldtube.Charge";
pub const MASS: &str = "Worldtube.SelfForce.Mass";
pub const EXPANSION_ORDER: &str = "Worldtube.ExpansionOrder";
pub const INITIAL_TIME: &str = "InitialTime";

/// Options describing the excision sphere, read by drivers that supply the
/// `ExcisionSphere` tag.
pub const EXCISION_SPHERE_NAME: &str = "Worldtube.ExcisionSphere";
pub const EXCISION_SPHERE_RADIUS: &str = "Domain.ExcisionSphere.Radius";
pub const EXCISION_SPHERE_CENTER: &str = "Domain.ExcisionSphere.Center";

pub fn charge() -> OptionTag {
    OptionTag::new(CHARGE, OptionKind::Real)
        .help("The value of the scalar charge in units of the black hole mass M.")
}

pub fn mass() -> OptionTag {
    OptionTag::new(MASS, OptionKind::Real)
        .help("The mass of the scalar particle in units of the black hole mass M.")
        .lower_bound(0.0)
}

pub fn expansion_order() -> OptionTag {
    OptionTag::new(EXPANSION_ORDER, OptionKind::Integer)
        .help("The internal expansion order of the worldtube solution. Orders 0 and 1 are implemented.")
        .lower_bound(0.0)
        .upper_bound(1.0)
}

pub fn initial_time() -> OptionTag {
    OptionTag::new(INITIAL_TIME, OptionKind::Real)
        .help("The time at which the evolution starts.")
        .with_default(0.0)
}

pub fn excision_sphere_name() -> OptionTag {
    OptionTag::new(EXCISION_SPHERE_NAME, OptionKind::Text)
        .help("The name of the excision sphere acting as the worldtube.")
        .with_default("ExcisionSphereA")
}

pub fn excision_sphere_radius() -> OptionTag {
    OptionTag::new(EXCISION_SPHERE_RADIUS, OptionKind::Real)
        .help("Radius of the excision sphere.")
        .lower_bound(0.0)
}

pub fn excision_sphere_center() -> OptionTag {
    OptionTag::new(EXCISION_SPHERE_CENTER, OptionKind::Vector)
        .help("Center of the excision sphere at the initial time.")
}
