//! Run configuration.
//!
//! Plain configuration structs grouped the way run files group them
//! (simulation, numerics, boundary conditions, ocean model). Parsing of
//! configuration files is external; this module supplies the typed surface,
//! `FromStr` for every multi-choice option, and startup validation. An
//! unknown value in a multi-choice option is fatal at startup.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use thiserror::Error;

/// Error type for configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A multi-choice option received an unrecognised value.
    #[error("unknown value '{value}' for option {option}")]
    UnknownValue {
        option: &'static str,
        value: String,
    },

    /// The time step must be positive.
    #[error("time step must be positive, got {0}")]
    NonPositiveTimeStep(f64),

    /// The release interval must be a whole number of time steps.
    #[error("release interval of {interval_seconds} s is not a multiple of the {time_step} s time step")]
    ReleaseIntervalNotDivisible {
        interval_seconds: f64,
        time_step: f64,
    },

    /// Neither an end datetime nor a duration was given.
    #[error("simulation length unspecified: set end_datetime or duration_in_days")]
    MissingSimulationLength,
}

macro_rules! config_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $option:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
        pub enum $name {
            #[default]
            $($variant),+
        }

        impl FromStr for $name {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ConfigError::UnknownValue {
                        option: $option,
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let s = match self {
                    $(Self::$variant => $text),+
                };
                write!(f, "{}", s)
            }
        }
    };
}

config_enum! {
    /// Horizontal coordinate system of the circulation model.
    CoordinateSystem, "OCEAN_CIRCULATION_MODEL.coordinate_system" {
        Cartesian => "cartesian",
        Spherical => "spherical",
    }
}

config_enum! {
    /// Interpretation of seed z-positions.
    DepthCoordinates, "SIMULATION.depth_coordinates" {
        Cartesian => "cartesian",
        Sigma => "sigma",
    }
}

config_enum! {
    /// Advection scheme.
    IntegratorScheme, "NUMERICS.num_integrator" {
        None => "none",
        Euler => "euler",
        Rk4TwoD => "rk4_2d",
        Rk4ThreeD => "rk4_3d",
        Rk4EulerSplit => "rk4_euler_split",
    }
}

config_enum! {
    /// Horizontal random-walk model.
    HorizontalRandomWalkScheme, "NUMERICS.horizontal_random_walk_model" {
        None => "none",
        Naive => "naive",
        Visser => "visser",
    }
}

config_enum! {
    /// Vertical random-walk model.
    VerticalRandomWalkScheme, "NUMERICS.vertical_random_walk_model" {
        None => "none",
        Naive => "naive",
        Visser => "visser",
        Milstein => "milstein",
    }
}

config_enum! {
    /// Horizontal boundary-condition policy at land edges.
    HorizontalBoundaryScheme, "BOUNDARY_CONDITIONS.horizontal" {
        Reflecting => "reflecting",
        Restoring => "restoring",
        None => "none",
    }
}

config_enum! {
    /// Vertical boundary-condition policy at the sea floor / free surface.
    VerticalBoundaryScheme, "BOUNDARY_CONDITIONS.vertical" {
        Reflecting => "reflecting",
        Absorbing => "absorbing",
    }
}

/// `SIMULATION` section.
#[derive(Clone, Debug)]
pub struct SimulationSection {
    /// Time step in seconds.
    pub time_step: f64,
    /// Interpretation of seed z-positions.
    pub depth_coordinates: DepthCoordinates,
    /// Start of the simulation.
    pub start_datetime: NaiveDateTime,
    /// End of the simulation (alternative to `duration_in_days`).
    pub end_datetime: Option<NaiveDateTime>,
    /// Number of particle releases (ensemble runs re-release the seed).
    pub number_of_particle_releases: u32,
    /// Interval between releases, in hours.
    pub particle_release_interval_in_hours: f64,
    /// Simulation length in days (alternative to `end_datetime`).
    pub duration_in_days: Option<f64>,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            time_step: 600.0,
            depth_coordinates: DepthCoordinates::Cartesian,
            start_datetime: NaiveDateTime::default(),
            end_datetime: None,
            number_of_particle_releases: 1,
            particle_release_interval_in_hours: 0.0,
            duration_in_days: None,
        }
    }
}

/// `NUMERICS` section.
#[derive(Clone, Copy, Debug, Default)]
pub struct NumericsSection {
    pub num_integrator: IntegratorScheme,
    pub horizontal_random_walk_model: HorizontalRandomWalkScheme,
    pub vertical_random_walk_model: VerticalRandomWalkScheme,
}

/// `BOUNDARY_CONDITIONS` section.
#[derive(Clone, Copy, Debug, Default)]
pub struct BoundarySection {
    pub horizontal: HorizontalBoundaryScheme,
    pub vertical: VerticalBoundaryScheme,
}

/// `OCEAN_CIRCULATION_MODEL` section.
#[derive(Clone, Copy, Debug, Default)]
pub struct OceanModelSection {
    pub coordinate_system: CoordinateSystem,
    /// Whether the model supplies vertical eddy diffusivities.
    pub has_kh: bool,
    /// Whether the model supplies horizontal eddy viscosities.
    pub has_ah: bool,
    /// Whether the model supplies a wet/dry mask.
    pub has_is_wet: bool,
}

/// Complete run configuration.
#[derive(Clone, Debug, Default)]
pub struct ModelConfig {
    pub simulation: SimulationSection,
    pub numerics: NumericsSection,
    pub boundary_conditions: BoundarySection,
    pub ocean_model: OceanModelSection,
}

impl ModelConfig {
    /// Validate the configuration. Fatal at startup on failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        if !(sim.time_step > 0.0) {
            return Err(ConfigError::NonPositiveTimeStep(sim.time_step));
        }
        if sim.end_datetime.is_none() && sim.duration_in_days.is_none() {
            return Err(ConfigError::MissingSimulationLength);
        }
        if sim.number_of_particle_releases > 1 {
            let interval = sim.particle_release_interval_in_hours * 3600.0;
            let steps = interval / sim.time_step;
            if interval <= 0.0 || (steps - steps.round()).abs() > 1.0e-9 {
                return Err(ConfigError::ReleaseIntervalNotDivisible {
                    interval_seconds: interval,
                    time_step: sim.time_step,
                });
            }
        }
        Ok(())
    }

    /// Simulation length in seconds.
    pub fn duration_seconds(&self) -> f64 {
        let sim = &self.simulation;
        if let Some(end) = sim.end_datetime {
            (end - sim.start_datetime).num_milliseconds() as f64 / 1000.0
        } else {
            sim.duration_in_days.unwrap_or(0.0) * 86_400.0
        }
    }
}
