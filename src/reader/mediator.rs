//! Bracket-frame buffering and the mediator seam.
//!
//! The engine never touches files: an external *mediator* owns the two
//! consecutive forcing snapshots ("last" and "next") straddling the current
//! simulation time and refills them on request. [`InMemoryMediator`] is the
//! in-process implementation used by tests and by callers that preload
//! their forcing; file-backed mediators live outside this crate.

use std::collections::HashMap;

use thiserror::Error;

use crate::grid::UnstructuredGrid;
use crate::types::TimeDirection;

/// Error type for mediator operations.
#[derive(Debug, Error)]
pub enum MediatorError {
    /// The requested time is not covered by the available frames.
    #[error("time {time} is outside the forcing coverage [{t_first}, {t_final}]")]
    OutOfCoverage {
        time: f64,
        t_first: f64,
        t_final: f64,
    },

    /// Fewer than two frames are available.
    #[error("at least two forcing frames are required, got {0}")]
    TooFewFrames(usize),

    /// A frame's field has the wrong length.
    #[error("frame at t={time}: field {name} has length {got}, expected {expected}")]
    BadFieldShape {
        time: f64,
        name: &'static str,
        got: usize,
        expected: usize,
    },

    /// Failure in an external frame provider, propagated unchanged.
    #[error("forcing source error: {0}")]
    Source(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// One forcing snapshot.
///
/// Velocity components are layer-major on element centres
/// (`u[k * n_elems + elem]`); `kh` is level-major on nodes; `viscofh` and
/// tracers are layer-major on nodes. `w` is vertical velocity in geometric
/// coordinates (m/s), not a sigma-velocity.
#[derive(Clone, Debug, Default)]
pub struct FieldFrame {
    /// Snapshot time (seconds, simulation clock).
    pub time: f64,
    /// Free-surface elevation at nodes.
    pub zeta: Vec<f64>,
    /// Velocity components at layer midpoints, on element centres.
    pub u: Vec<f64>,
    pub v: Vec<f64>,
    pub w: Vec<f64>,
    /// Vertical eddy diffusivity at sigma levels, on nodes.
    pub kh: Vec<f64>,
    /// Horizontal eddy viscosity at layer midpoints, on nodes.
    pub viscofh: Vec<f64>,
    /// Optional wet/dry mask per element (1 = wet).
    pub wet_cells: Option<Vec<u8>>,
    /// Optional tracers (layer-major on nodes), keyed by variable name.
    pub tracers: HashMap<String, Vec<f64>>,
}

impl FieldFrame {
    /// Create a frame with all dynamic fields zeroed for the given grid.
    pub fn zeros(time: f64, grid: &UnstructuredGrid) -> Self {
        Self {
            time,
            zeta: vec![0.0; grid.n_nodes()],
            u: vec![0.0; grid.n_siglay() * grid.n_elems()],
            v: vec![0.0; grid.n_siglay() * grid.n_elems()],
            w: vec![0.0; grid.n_siglay() * grid.n_elems()],
            kh: vec![0.0; grid.n_siglev() * grid.n_nodes()],
            viscofh: vec![0.0; grid.n_siglay() * grid.n_nodes()],
            wet_cells: None,
            tracers: HashMap::new(),
        }
    }

    /// Check field shapes against the grid.
    pub fn validate(&self, grid: &UnstructuredGrid) -> Result<(), MediatorError> {
        let checks: [(&'static str, usize, usize); 6] = [
            ("zeta", self.zeta.len(), grid.n_nodes()),
            ("u", self.u.len(), grid.n_siglay() * grid.n_elems()),
            ("v", self.v.len(), grid.n_siglay() * grid.n_elems()),
            ("w", self.w.len(), grid.n_siglay() * grid.n_elems()),
            ("kh", self.kh.len(), grid.n_siglev() * grid.n_nodes()),
            ("viscofh", self.viscofh.len(), grid.n_siglay() * grid.n_nodes()),
        ];
        for (name, got, expected) in checks {
            if got != expected {
                return Err(MediatorError::BadFieldShape {
                    time: self.time,
                    name,
                    got,
                    expected,
                });
            }
        }
        if let Some(wet) = &self.wet_cells {
            if wet.len() != grid.n_elems() {
                return Err(MediatorError::BadFieldShape {
                    time: self.time,
                    name: "wet_cells",
                    got: wet.len(),
                    expected: grid.n_elems(),
                });
            }
        }
        Ok(())
    }
}

/// External provider of bracket frames.
///
/// `update_reading_frames` is the engine's only suspension point: the data
/// reader calls it at most once per step, outside the per-particle loop.
/// The frames themselves are read-only while a step is in flight, so the
/// trait requires `Sync` and the particle loop may run in parallel.
pub trait Mediator: Send + Sync {
    /// Prepare the source to serve frames covering `[t_start, t_end]`
    /// (or `[t_end, t_start]` for backward runs).
    fn setup_data_access(&mut self, t_start: f64, t_end: f64) -> Result<(), MediatorError>;

    /// Position the bracket so the given time is covered.
    fn update_reading_frames(&mut self, time: f64) -> Result<(), MediatorError>;

    /// Time of the "last" frame.
    fn t_last(&self) -> f64;

    /// Time of the "next" frame.
    fn t_next(&self) -> f64;

    /// The "last" frame.
    fn frame_last(&self) -> &FieldFrame;

    /// The "next" frame.
    fn frame_next(&self) -> &FieldFrame;
}

/// Mediator over a preloaded, time-sorted sequence of frames.
pub struct InMemoryMediator {
    frames: Vec<FieldFrame>,
    direction: TimeDirection,
    /// Indices of the current (last, next) bracket.
    last: usize,
    next: usize,
}

impl InMemoryMediator {
    /// Build from frames sorted by ascending time.
    ///
    /// For backward runs the frames stay in ascending order; the bracket
    /// indices run high-to-low instead.
    pub fn new(
        frames: Vec<FieldFrame>,
        direction: TimeDirection,
        grid: &UnstructuredGrid,
    ) -> Result<Self, MediatorError> {
        if frames.len() < 2 {
            return Err(MediatorError::TooFewFrames(frames.len()));
        }
        for frame in &frames {
            frame.validate(grid)?;
        }
        debug_assert!(
            frames.windows(2).all(|w| w[0].time < w[1].time),
            "frames must be sorted by ascending time"
        );

        let (last, next) = match direction {
            TimeDirection::Forward => (0, 1),
            TimeDirection::Backward => (frames.len() - 1, frames.len() - 2),
        };
        Ok(Self {
            frames,
            direction,
            last,
            next,
        })
    }

    fn coverage(&self) -> (f64, f64) {
        (
            self.frames[0].time,
            self.frames[self.frames.len() - 1].time,
        )
    }
}

impl Mediator for InMemoryMediator {
    fn setup_data_access(&mut self, t_start: f64, _t_end: f64) -> Result<(), MediatorError> {
        self.update_reading_frames(t_start)
    }

    fn update_reading_frames(&mut self, time: f64) -> Result<(), MediatorError> {
        let (t_first, t_final) = self.coverage();
        let out_of_coverage = MediatorError::OutOfCoverage {
            time,
            t_first,
            t_final,
        };

        match self.direction {
            TimeDirection::Forward => {
                // t_last <= time < t_next
                let i = self
                    .frames
                    .windows(2)
                    .position(|w| w[0].time <= time && time < w[1].time)
                    .ok_or(out_of_coverage)?;
                self.last = i;
                self.next = i + 1;
            }
            TimeDirection::Backward => {
                // t_next < time <= t_last
                let i = self
                    .frames
                    .windows(2)
                    .position(|w| w[0].time < time && time <= w[1].time)
                    .ok_or(out_of_coverage)?;
                self.last = i + 1;
                self.next = i;
            }
        }
        log::debug!(
            "reading frames advanced: t_last = {}, t_next = {}",
            self.t_last(),
            self.t_next()
        );
        Ok(())
    }

    fn t_last(&self) -> f64 {
        self.frames[self.last].time
    }

    fn t_next(&self) -> f64 {
        self.frames[self.next].time
    }

    fn frame_last(&self) -> &FieldFrame {
        &self.frames[self.last]
    }

    fn frame_next(&self) -> &FieldFrame {
        &self.frames[self.next]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::test_grids::unit_square;

    fn frames_at(grid: &UnstructuredGrid, times: &[f64]) -> Vec<FieldFrame> {
        times.iter().map(|&t| FieldFrame::zeros(t, grid)).collect()
    }

    #[test]
    fn test_forward_bracketing() {
        let grid = unit_square(3);
        let frames = frames_at(&grid, &[0.0, 3600.0, 7200.0]);
        let mut m = InMemoryMediator::new(frames, TimeDirection::Forward, &grid).unwrap();

        m.update_reading_frames(0.0).unwrap();
        assert_eq!((m.t_last(), m.t_next()), (0.0, 3600.0));

        m.update_reading_frames(5000.0).unwrap();
        assert_eq!((m.t_last(), m.t_next()), (3600.0, 7200.0));

        assert!(m.update_reading_frames(7200.0).is_err());
        assert!(m.update_reading_frames(-1.0).is_err());
    }

    #[test]
    fn test_backward_bracketing() {
        let grid = unit_square(3);
        let frames = frames_at(&grid, &[0.0, 3600.0, 7200.0]);
        let mut m = InMemoryMediator::new(frames, TimeDirection::Backward, &grid).unwrap();

        m.update_reading_frames(7200.0).unwrap();
        assert_eq!((m.t_last(), m.t_next()), (7200.0, 3600.0));

        m.update_reading_frames(1800.0).unwrap();
        assert_eq!((m.t_last(), m.t_next()), (3600.0, 0.0));

        assert!(m.update_reading_frames(0.0).is_err());
    }

    #[test]
    fn test_too_few_frames_rejected() {
        let grid = unit_square(3);
        let frames = frames_at(&grid, &[0.0]);
        assert!(matches!(
            InMemoryMediator::new(frames, TimeDirection::Forward, &grid),
            Err(MediatorError::TooFewFrames(1))
        ));
    }

    #[test]
    fn test_bad_shape_rejected() {
        let grid = unit_square(3);
        let mut frames = frames_at(&grid, &[0.0, 3600.0]);
        frames[1].zeta.pop();
        assert!(matches!(
            InMemoryMediator::new(frames, TimeDirection::Forward, &grid),
            Err(MediatorError::BadFieldShape { name: "zeta", .. })
        ));
    }
}
