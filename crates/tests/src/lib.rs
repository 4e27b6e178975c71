//! Integration test harness for databox.
//!
//! [`TestHarness`] builds registries whose compute tags append their id to a
//! shared [`EvaluationLog`] every time they run, so tests can assert exactly
//! which tags were evaluated, in which order, and how often. The worldtube
//! helpers build boxes from the real worldtube module.

use std::sync::{Arc, Mutex, PoisonError};

use databox::{DataBox, ExternalValues, OptionTable, Registry, Tag, TagDecl, TagId};
use databox_worldtube::{ExcisionSphere, options, tags};

/// Ordered record of compute evaluations, shared by every logged tag of a
/// harness.
#[derive(Debug, Clone, Default)]
pub struct EvaluationLog {
    entries: Arc<Mutex<Vec<TagId>>>,
}

impl EvaluationLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, id: &TagId) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id.clone());
    }

    /// Evaluated tag ids, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|id| id.as_str().to_owned())
            .collect()
    }

    /// Number of recorded evaluations of `id`.
    pub fn count(&self, id: &str) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|entry| entry.as_str() == id)
            .count()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Registry builder for scalar test graphs.
///
/// Every tag holds an `f64`. Inputs are simple tags supplied at build time;
/// derived tags are compute tags over named arguments.
pub struct TestHarness {
    registry: Registry,
    log: EvaluationLog,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            log: EvaluationLog::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn log(&self) -> &EvaluationLog {
        &self.log
    }

    /// Register a declaration built elsewhere.
    ///
    /// # Panics
    ///
    /// Panics if the registry rejects the declaration.
    pub fn declare(&mut self, decl: TagDecl) {
        let id = decl.id().clone();
        if let Err(err) = self.registry.register(decl) {
            panic!("failed to register {id}: {err}");
        }
    }

    /// Declare a simple input tag.
    pub fn input(&mut self, id: &str) -> Tag<f64> {
        let tag = Tag::new(id);
        self.declare(TagDecl::simple(&tag));
        tag
    }

    /// Declare a compute tag summing its arguments.
    pub fn sum(&mut self, id: &str, arguments: &[&str]) -> Tag<f64> {
        let tag = Tag::new(id);
        let decl = self.logged(id, arguments, |values| values.iter().sum());
        self.declare(decl);
        tag
    }

    /// A compute declaration over `f64` arguments that records each
    /// evaluation in the log.
    ///
    /// The caller registers it, typically after adding a base binding.
    pub fn logged<F>(&self, id: &str, arguments: &[&str], f: F) -> TagDecl
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        let tag: Tag<f64> = Tag::new(id);
        let argument_tags: Vec<Tag<f64>> = arguments.iter().map(|a| Tag::new(*a)).collect();
        let log = self.log.clone();

        TagDecl::compute(
            &tag,
            argument_tags.iter().map(|t| t.id().clone()).collect(),
            move |slot, args| {
                log.record(args.owner());
                let values = argument_tags
                    .iter()
                    .map(|t| args.get(t).copied())
                    .collect::<databox::Result<Vec<f64>>>()?;
                *slot = f(&values);
                Ok(())
            },
        )
    }

    /// Build a box over `roots`, supplying `inputs` as external values.
    pub fn build(&self, roots: &[&str], inputs: &[(&str, f64)]) -> databox::Result<DataBox> {
        self.build_with_options(roots, inputs, &OptionTable::new())
    }

    pub fn build_with_options(
        &self,
        roots: &[&str],
        inputs: &[(&str, f64)],
        table: &OptionTable,
    ) -> databox::Result<DataBox> {
        let roots: Vec<TagId> = roots.iter().map(|r| TagId::from(*r)).collect();
        let external = inputs
            .iter()
            .fold(ExternalValues::new(), |external, (id, value)| {
                external.with(&Tag::<f64>::new(*id), *value)
            });
        DataBox::construct(&self.registry, &roots, table, external)
    }
}

/// Registry holding every worldtube tag.
///
/// # Panics
///
/// Panics if the worldtube module fails to register.
pub fn worldtube_registry() -> Registry {
    let mut registry = Registry::new();
    if let Err(err) = databox_worldtube::register(&mut registry) {
        panic!("failed to register worldtube tags: {err}");
    }
    registry
}

/// Options of a valid worldtube run.
pub fn worldtube_options() -> OptionTable {
    OptionTable::new()
        .with(options::CHARGE, 0.5)
        .with(options::MASS, 0.1)
        .with(options::EXPANSION_ORDER, 1_i64)
}

/// The excision sphere and time every worldtube box is given.
pub fn worldtube_external(time: f64) -> ExternalValues {
    ExternalValues::new()
        .with(
            &tags::excision_sphere(),
            ExcisionSphere::new("ExcisionSphereA", 1.0, [6.0, 0.0, 0.0]),
        )
        .with(&tags::time(), time)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logged_sum_records_evaluation() {
        let mut harness = TestHarness::new();
        harness.input("A");
        harness.input("B");
        let total = harness.sum("Total", &["A", "B"]);

        let data_box = harness
            .build(&["Total"], &[("A", 1.0), ("B", 2.5)])
            .unwrap();
        assert_eq!(*data_box.get(&total).unwrap(), 3.5);
        assert_eq!(harness.log().entries(), ["Total"]);

        harness.log().clear();
        assert_eq!(harness.log().count("Total"), 0);
    }
}
