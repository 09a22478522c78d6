//! # drift-rs
//!
//! An offline Lagrangian particle-tracking library for marine applications.
//!
//! Given a time-varying 3-D velocity field from an ocean circulation model
//! on an unstructured triangular mesh with terrain-following vertical
//! coordinates, drift-rs advances a population of virtual particles under:
//! - the resolved Eulerian velocity (Euler / RK4 advection schemes)
//! - stochastic sub-grid displacements from eddy-diffusivity fields
//!   (naive / Visser / Milstein random walks)
//! - boundary-condition logic at the sea floor, free surface, and
//!   closed/open lateral boundaries
//!
//! The crate provides the core building blocks:
//! - Particle state and seeding
//! - Unstructured grid topology, barycentric host search, pathline tracing
//! - Field interpolation against a mediator-buffered frame pair
//! - Numerical integrators and random-walk models
//! - Boundary-condition calculators
//! - The per-step orchestrator and an outer simulation driver
//!
//! File I/O stays outside: the [`reader::Mediator`] trait is the seam to
//! whatever supplies forcing frames (NetCDF readers, in-memory fixtures).

pub mod boundary;
pub mod config;
pub mod grid;
pub mod integrator;
pub mod interp;
pub mod model;
pub mod particle;
pub mod random_walk;
pub mod reader;
pub mod seeding;
pub mod simulation;
pub mod types;

// Re-export main types for convenience
pub use boundary::{
    HorizontalBoundary, RefHorizBoundary, VerticalBoundary, VerticalOutcome,
};
pub use config::{
    BoundarySection, ConfigError, CoordinateSystem, DepthCoordinates,
    HorizontalBoundaryScheme, HorizontalRandomWalkScheme, IntegratorScheme, ModelConfig,
    NumericsSection, OceanModelSection, SimulationSection, VerticalBoundaryScheme,
    VerticalRandomWalkScheme,
};
pub use grid::{sort_adjacency, EdgeIntersection, GridError, UnstructuredGrid};
pub use integrator::{
    AdvectionError, Delta, EulerIntegrator, NumIntegrator, Rk4EulerSplitIntegrator,
    Rk4Integrator2D, Rk4Integrator3D, StandardIntegrator,
};
pub use model::{Model, ParticleSnapshot, StepError};
pub use particle::Particle;
pub use random_walk::{
    HorizontalRandomWalk, MilsteinVertRandomWalk, ModelRng, NaiveHorizRandomWalk,
    NaiveVertRandomWalk, StandardHorizRandomWalk, StandardVertRandomWalk, VerticalRandomWalk,
    VisserHorizRandomWalk, VisserVertRandomWalk,
};
pub use reader::{
    DataReader, FieldFrame, InMemoryMediator, Mediator, MediatorError, MeshDataReader,
    ReaderError,
};
pub use seeding::{ParticleSeed, SeedError};
pub use simulation::{Simulation, SimulationResult};
pub use types::{HostStatus, TimeDirection};
