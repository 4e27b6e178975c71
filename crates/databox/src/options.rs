//! Option values and option-tag descriptors.
//!
//! Simple tags built from configuration declare the options they consume as
//! [`OptionTag`] descriptors. A descriptor carries the option's kind, an
//! optional default and declarative lower/upper bounds. The construction
//! resolver checks every descriptor against the [`OptionTable`] in one place
//! before any construction function runs, so construction functions only see
//! values that already satisfy their declared constraints.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single configuration value.
///
/// Untagged so that option files can write plain YAML scalars and lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// A boolean flag.
    Bool(bool),
    /// A whole number.
    Integer(i64),
    /// A real number.
    Real(f64),
    /// A list of real numbers (coordinates, centers, extents).
    Vector(Vec<f64>),
    /// Free text (names, labels).
    Text(String),
}

impl OptionValue {
    /// The kind this value was written as.
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionValue::Bool(_) => OptionKind::Bool,
            OptionValue::Integer(_) => OptionKind::Integer,
            OptionValue::Real(_) => OptionKind::Real,
            OptionValue::Vector(_) => OptionKind::Vector,
            OptionValue::Text(_) => OptionKind::Text,
        }
    }

    /// Whether this value can be read as `kind`.
    ///
    /// Integers are accepted where reals are expected.
    pub fn satisfies(&self, kind: OptionKind) -> bool {
        self.kind() == kind || (kind == OptionKind::Real && self.kind() == OptionKind::Integer)
    }

    /// The numeric components checked against bounds.
    fn components(&self) -> Vec<f64> {
        match self {
            OptionValue::Integer(v) => vec![*v as f64],
            OptionValue::Real(v) => vec![*v],
            OptionValue::Vector(v) => v.clone(),
            OptionValue::Bool(_) | OptionValue::Text(_) => Vec::new(),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(v) => write!(f, "{v}"),
            OptionValue::Integer(v) => write!(f, "{v}"),
            OptionValue::Real(v) => write!(f, "{v}"),
            OptionValue::Vector(v) => write!(f, "{v:?}"),
            OptionValue::Text(v) => write!(f, "'{v}'"),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Integer(v)
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Real(v)
    }
}

impl From<Vec<f64>> for OptionValue {
    fn from(v: Vec<f64>) -> Self {
        OptionValue::Vector(v)
    }
}

impl From<[f64; 3]> for OptionValue {
    fn from(v: [f64; 3]) -> Self {
        OptionValue::Vector(v.to_vec())
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Text(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Text(v)
    }
}

/// The kind of value an option expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionKind {
    Bool,
    Integer,
    Real,
    Vector,
    Text,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptionKind::Bool => "bool",
            OptionKind::Integer => "integer",
            OptionKind::Real => "real",
            OptionKind::Vector => "vector",
            OptionKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// Flat table of named option values produced by configuration loading.
///
/// Option names are dotted group paths such as `Worldtube.Charge`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionTable {
    values: IndexMap<String, OptionValue>,
}

impl OptionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<OptionValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Builder method: insert a value.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Look up a value by option name.
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    /// Number of options in the table.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<OptionValue>> FromIterator<(K, V)> for OptionTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = OptionTable::new();
        for (name, value) in iter {
            table.insert(name, value);
        }
        table
    }
}

/// Descriptor for one option consumed by an option-constructed tag.
///
/// ```
/// use databox::{OptionKind, OptionTag};
///
/// let mass = OptionTag::new("Worldtube.SelfForce.Mass", OptionKind::Real)
///     .help("The mass of the scalar particle in units of the black hole mass.")
///     .lower_bound(0.0);
/// assert_eq!(mass.name(), "Worldtube.SelfForce.Mass");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OptionTag {
    name: String,
    kind: OptionKind,
    help: String,
    lower_bound: Option<f64>,
    upper_bound: Option<f64>,
    default: Option<OptionValue>,
}

impl OptionTag {
    /// Declare an option of the given kind.
    pub fn new(name: impl Into<String>, kind: OptionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            help: String::new(),
            lower_bound: None,
            upper_bound: None,
            default: None,
        }
    }

    /// Builder method: attach help text.
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// Builder method: reject values below `bound`.
    pub fn lower_bound(mut self, bound: f64) -> Self {
        self.lower_bound = Some(bound);
        self
    }

    /// Builder method: reject values above `bound`.
    pub fn upper_bound(mut self, bound: f64) -> Self {
        self.upper_bound = Some(bound);
        self
    }

    /// Builder method: use `value` when the table has no entry.
    pub fn with_default(mut self, value: impl Into<OptionValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// The option's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The expected kind.
    pub fn kind(&self) -> OptionKind {
        self.kind
    }

    /// Help text shown for the option.
    pub fn help_text(&self) -> &str {
        &self.help
    }

    /// Validate this option against a table and return the value to use.
    pub fn validate(&self, table: &OptionTable) -> Result<OptionValue, OptionViolation> {
        let value = table
            .get(&self.name)
            .or(self.default.as_ref())
            .ok_or_else(|| OptionViolation::new(&self.name, "no value was given"))?;

        if !value.satisfies(self.kind) {
            return Err(OptionViolation::new(
                &self.name,
                format!("expected a {} value, got {} {value}", self.kind, value.kind()),
            ));
        }

        for component in value.components() {
            if !component.is_finite() {
                return Err(OptionViolation::new(
                    &self.name,
                    format!("value {component} is not finite"),
                ));
            }
            if let Some(lower) = self.lower_bound
                && component < lower
            {
                return Err(OptionViolation::new(
                    &self.name,
                    format!("value {component} is below the lower bound {lower}"),
                ));
            }
            if let Some(upper) = self.upper_bound
                && component > upper
            {
                return Err(OptionViolation::new(
                    &self.name,
                    format!("value {component} is above the upper bound {upper}"),
                ));
            }
        }

        Ok(value.clone())
    }
}

/// An option that failed validation.
///
/// Construction functions may return this (through `anyhow`) to reject a
/// value for reasons the declarative bounds cannot express; the resolver
/// reports it as [`Error::InvalidOption`](crate::Error::InvalidOption).
#[derive(Debug, Clone, PartialEq, Error)]
#[error("option {option}: {reason}")]
pub struct OptionViolation {
    /// The offending option.
    pub option: String,
    /// What was violated.
    pub reason: String,
}

impl OptionViolation {
    /// Describe a violation of `option`.
    pub fn new(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            option: option.into(),
            reason: reason.into(),
        }
    }
}

/// Conversion from a validated option value to a Rust type.
pub trait FromOptionValue: Sized {
    /// Convert, or return `None` if the value has another shape.
    fn from_option_value(value: &OptionValue) -> Option<Self>;
}

impl FromOptionValue for bool {
    fn from_option_value(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromOptionValue for i64 {
    fn from_option_value(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Integer(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromOptionValue for usize {
    fn from_option_value(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Integer(v) => usize::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl FromOptionValue for f64 {
    fn from_option_value(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Real(v) => Some(*v),
            OptionValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl FromOptionValue for Vec<f64> {
    fn from_option_value(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Vector(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromOptionValue for [f64; 3] {
    fn from_option_value(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Vector(v) => v.as_slice().try_into().ok(),
            _ => None,
        }
    }
}

impl FromOptionValue for String {
    fn from_option_value(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Text(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// Validated option values handed to a construction function.
///
/// Holds exactly the options the tag declared, with defaults filled in.
#[derive(Debug, Clone, Default)]
pub struct OptionValues {
    values: IndexMap<String, OptionValue>,
}

impl OptionValues {
    pub(crate) fn insert(&mut self, name: &str, value: OptionValue) {
        self.values.insert(name.to_string(), value);
    }

    /// Read an option as `T`.
    ///
    /// Fails if the option was not declared by the tag or does not convert.
    pub fn get<T: FromOptionValue>(&self, name: &str) -> Result<T, OptionViolation> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| OptionViolation::new(name, "option is not declared by this tag"))?;
        T::from_option_value(value).ok_or_else(|| {
            OptionViolation::new(
                name,
                format!("{value} does not convert to {}", std::any::type_name::<T>()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mass_option() -> OptionTag {
        OptionTag::new("Worldtube.SelfForce.Mass", OptionKind::Real).lower_bound(0.0)
    }

    #[test]
    fn test_lower_bound_violation() {
        let table = OptionTable::new().with("Worldtube.SelfForce.Mass", -1.0);
        let err = mass_option().validate(&table).unwrap_err();
        assert_eq!(err.option, "Worldtube.SelfForce.Mass");
        assert!(err.reason.contains("below the lower bound 0"));
    }

    #[test]
    fn test_upper_bound_violation() {
        let order = OptionTag::new("Worldtube.ExpansionOrder", OptionKind::Integer)
            .lower_bound(0.0)
            .upper_bound(1.0);
        let table = OptionTable::new().with("Worldtube.ExpansionOrder", 2_i64);
        let err = order.validate(&table).unwrap_err();
        assert!(err.reason.contains("above the upper bound 1"));
    }

    #[test]
    fn test_missing_option_uses_default() {
        let time = OptionTag::new("InitialTime", OptionKind::Real).with_default(0.0);
        assert_eq!(time.validate(&OptionTable::new()), Ok(OptionValue::Real(0.0)));

        let err = mass_option().validate(&OptionTable::new()).unwrap_err();
        assert_eq!(err.reason, "no value was given");
    }

    #[test]
    fn test_integer_accepted_as_real() {
        let table = OptionTable::new().with("Worldtube.SelfForce.Mass", 2_i64);
        let value = mass_option().validate(&table).unwrap();
        assert_eq!(f64::from_option_value(&value), Some(2.0));
    }

    #[test]
    fn test_kind_mismatch() {
        let table = OptionTable::new().with("Worldtube.SelfForce.Mass", "heavy");
        let err = mass_option().validate(&table).unwrap_err();
        assert!(err.reason.contains("expected a real value"));
    }

    #[test]
    fn test_vector_bounds_apply_per_component() {
        let center = OptionTag::new("Domain.Center", OptionKind::Vector).lower_bound(-10.0);
        let table = OptionTable::new().with("Domain.Center", vec![0.0, -11.0, 2.0]);
        assert!(center.validate(&table).is_err());
    }

    #[test]
    fn test_option_values_reject_undeclared() {
        let mut values = OptionValues::default();
        values.insert("Worldtube.Charge", OptionValue::Real(0.5));
        assert_eq!(values.get::<f64>("Worldtube.Charge"), Ok(0.5));
        assert!(values.get::<f64>("Worldtube.Mass").is_err());
        assert!(values.get::<String>("Worldtube.Charge").is_err());
    }

    #[test]
    fn test_table_from_yaml_scalars() {
        let yaml = "Worldtube.Charge: 0.5\nWorldtube.ExpansionOrder: 1\nName: sphere\nCenter: [1.0, 2, 3]\n";
        let table: OptionTable = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(table.get("Worldtube.Charge"), Some(&OptionValue::Real(0.5)));
        assert_eq!(table.get("Worldtube.ExpansionOrder"), Some(&OptionValue::Integer(1)));
        assert_eq!(table.get("Name"), Some(&OptionValue::Text("sphere".to_string())));
        assert_eq!(
            table.get("Center"),
            Some(&OptionValue::Vector(vec![1.0, 2.0, 3.0]))
        );
    }
}
