//! Databox Run - Evolves worldtube data boxes through time
//!
//! This binary loads a run file, builds one orbit-tracking singleton box and
//! a set of element boxes, and advances them with a Runge-Kutta time stepper.
//! Element boxes are driven in parallel.

mod stepper;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use databox::{
    DEFAULT_COMPRESSION_LEVEL, DataBox, ExternalValues, FromOptionValue, Registry, RunConfig,
    Snapshot, resolve,
};
use databox_worldtube::{ExcisionSphere, element_tags, options, singleton_tags, tags};
use rayon::prelude::*;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::stepper::ButcherTableau;

#[derive(Parser, Debug)]
#[command(name = "databox-run")]
#[command(about = "Evolve a scalar charge orbit with worldtube data boxes")]
struct Cli {
    /// Path to a run file
    #[arg(required_unless_present = "list_options")]
    config: Option<PathBuf>,

    /// Print the options the worldtube tags read, then exit
    #[arg(long)]
    list_options: bool,

    /// Number of element boxes (overrides the run file)
    #[arg(long)]
    elements: Option<usize>,

    /// Number of time steps (overrides the run file)
    #[arg(long)]
    steps: Option<u64>,

    /// Write a snapshot of the singleton box here after the last step
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Restore the singleton box from a snapshot before stepping
    #[arg(long)]
    resume: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "databox_run=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("Run failed: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut registry = Registry::new();
    databox_worldtube::register(&mut registry)?;

    if cli.list_options {
        for line in describe_options(&registry) {
            println!("{line}");
        }
        return Ok(());
    }

    let path = cli.config.context("a run file is required")?;
    info!("Loading run file from: {}", path.display());
    let config =
        RunConfig::load(&path).with_context(|| format!("failed to load {}", path.display()))?;
    config.validate_against_registry(
        &registry,
        &[
            options::EXCISION_SPHERE_NAME,
            options::EXCISION_SPHERE_RADIUS,
            options::EXCISION_SPHERE_CENTER,
        ],
    )?;

    let sphere = ExcisionSphere::from_options(&config.options)?;
    let initial_time = options::initial_time()
        .validate(&config.options)
        .map(|value| f64::from_option_value(&value))?
        .context("InitialTime is not a number")?;

    let element_count = cli.elements.unwrap_or(config.driver.elements);
    let steps = cli.steps.unwrap_or(config.driver.steps);
    let dt = config.driver.dt;

    info!(
        run = %config.metadata.name,
        title = config.metadata.title.as_deref().unwrap_or_default(),
        elements = element_count,
        steps,
        dt,
        "building data boxes"
    );

    let external = || {
        ExternalValues::new()
            .with(&tags::excision_sphere(), sphere.clone())
            .with(&tags::time(), initial_time)
    };

    let mut singleton =
        DataBox::construct(&registry, &singleton_tags(), &config.options, external())?;
    for level in singleton.levels() {
        debug!(depth = level.depth, tags = ?level.tags, "singleton level");
    }

    // Every element holds the same tag set, so resolve it once.
    let element_graph = resolve(&registry, &element_tags())?;
    let mut elements = (0..element_count)
        .map(|_| DataBox::from_graph(element_graph.clone(), &config.options, external()))
        .collect::<databox::Result<Vec<_>>>()?;

    if let Some(path) = &cli.resume {
        let snapshot = Snapshot::load(path)?;
        singleton.restore(&snapshot)?;
        let time = *singleton.get(&tags::time())?;
        for element in &mut elements {
            element.mutate(&tags::time(), |t| *t = time)?;
        }
        info!(path = %path.display(), time, "resumed singleton from snapshot");
    }

    let tableau = ButcherTableau::classic_rk4();
    for step in 0..steps {
        let time = *singleton.get(&tags::time())?;

        let amplitudes = elements
            .par_iter_mut()
            .map(|element| advance_element(element, &tableau, time, dt))
            .collect::<anyhow::Result<Vec<f64>>>()?;
        advance_singleton(&mut singleton, &tableau, time, dt)?;

        debug!(
            step,
            time = time + dt,
            amplitude = amplitudes.first().copied().unwrap_or_default(),
            "step complete"
        );
    }

    report(&singleton, &elements)?;

    if let Some(path) = cli.checkpoint.or(config.driver.checkpoint) {
        singleton
            .snapshot()?
            .write(&path, DEFAULT_COMPRESSION_LEVEL)?;
    }

    Ok(())
}

/// Sweep an element's time through the substeps of one step.
///
/// Returns the step-averaged puncture amplitude.
fn advance_element(
    element: &mut DataBox,
    tableau: &ButcherTableau,
    time: f64,
    dt: f64,
) -> anyhow::Result<f64> {
    let mut amplitude = 0.0;
    for (fraction, weight) in tableau.stage_times().zip(&tableau.result_coefficients) {
        element.mutate(&tags::time(), |t| *t = time + fraction * dt)?;
        amplitude += weight * element.get(&tags::puncture_amplitude())?;
    }
    element.mutate(&tags::time(), |t| *t = time + dt)?;
    Ok(amplitude)
}

/// Integrate the evolved orbit over one step.
///
/// Each substep writes the intermediate state into the evolved variables and
/// reads the acceleration the box derives from it.
fn advance_singleton(
    singleton: &mut DataBox,
    tableau: &ButcherTableau,
    time: f64,
    dt: f64,
) -> anyhow::Result<()> {
    let state = pack(
        singleton.get(&tags::evolved_position())?,
        singleton.get(&tags::evolved_velocity())?,
    );

    let next = tableau.step(&state, dt, |_, substate| {
        let (position, velocity) = unpack(substate);
        singleton.mutate(&tags::evolved_position(), |x| *x = position)?;
        singleton.mutate(&tags::evolved_velocity(), |v| *v = velocity)?;
        let acceleration = singleton.get(&tags::geodesic_acceleration())?;
        Ok(pack(&velocity, acceleration))
    })?;

    let (position, velocity) = unpack(&next);
    singleton.mutate(&tags::evolved_position(), |x| *x = position)?;
    singleton.mutate(&tags::evolved_velocity(), |v| *v = velocity)?;
    singleton.mutate(&tags::time(), |t| *t = time + dt)?;
    Ok(())
}

fn pack(first: &[f64; 3], second: &[f64; 3]) -> [f64; 6] {
    let mut state = [0.0; 6];
    state[..3].copy_from_slice(first);
    state[3..].copy_from_slice(second);
    state
}

fn unpack(state: &[f64; 6]) -> ([f64; 3], [f64; 3]) {
    (
        [state[0], state[1], state[2]],
        [state[3], state[4], state[5]],
    )
}

/// One line per option read by an option-constructed tag.
fn describe_options(registry: &Registry) -> Vec<String> {
    registry
        .iter()
        .flat_map(|decl| {
            decl.options().iter().map(move |option| {
                format!(
                    "{} ({}, read by {}): {}",
                    option.name(),
                    option.kind(),
                    decl.id(),
                    option.help_text()
                )
            })
        })
        .collect()
}

fn report(singleton: &DataBox, elements: &[DataBox]) -> anyhow::Result<()> {
    let time = *singleton.get(&tags::time())?;
    let [evolved, _] = *singleton.get(&tags::particle_state())?;

    info!(
        time,
        position = ?evolved,
        acceleration_evaluations = singleton.evaluations(&tags::geodesic_acceleration())?,
        "singleton finished"
    );

    if let Some(element) = elements.first() {
        let [circular, _] = *element.get(&tags::particle_state())?;
        let drift = evolved
            .iter()
            .zip(&circular)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt();
        info!(
            drift,
            amplitude = *element.get(&tags::puncture_amplitude())?,
            "evolved orbit compared with circular orbit"
        );
    }

    Ok(())
}
