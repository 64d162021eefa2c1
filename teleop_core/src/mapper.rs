//! Affine remapping from the glove's sensor box to the robot workspace.
//!
//! Per robot axis `i`, fed by sensor axis `s = axis_map[i]`:
//!
//! ```text
//! robot[i] = home[i] + direction[i] * (v[s] + offset[s]) * workspace[i] / span[s]
//! offset[s] = -(low[s] + high[s]) / 2
//! ```
//!
//! The offset centres the sensor range, so the midpoint of a sensor range
//! lands exactly on the home coordinate and the range ends land half a
//! workspace away on either side.
use crate::error::BuildError;
use crate::guard::SensorRange;
use crate::util::round_to;
use teleop_traits::{Orientation, Pose};

/// Deployment constants of one robot cell. Distances in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobotProfile {
    pub name: &'static str,
    pub home: [f64; 3],
    pub orientation: Orientation,
    pub workspace: [f64; 3],
    /// Robot axis `i` is driven by sensor axis `axis_map[i]`.
    pub axis_map: [usize; 3],
    pub direction: [f64; 3],
    /// Millimetres to controller units.
    pub units_scale: f64,
    pub round_decimals: u32,
}

impl RobotProfile {
    /// UR10e over RTDE: metres, rotation-vector orientation.
    pub fn ur10e() -> Self {
        Self {
            name: "ur10e",
            home: [0.0, -700.0, 515.0],
            orientation: Orientation::RotationVector([0.0, 3.142, 0.0]),
            workspace: [760.0, 400.0, 200.0],
            axis_map: [0, 2, 1],
            direction: [-1.0, -1.0, 1.0],
            units_scale: 0.001,
            round_decimals: 6,
        }
    }

    /// ABB IRB 1200 over EGM: millimetres, quaternion orientation.
    pub fn abb_irb1200() -> Self {
        Self {
            name: "abb_irb1200",
            home: [450.0, 0.0, 500.0],
            orientation: Orientation::Quaternion([0.0, 0.0, 1.0, 0.0]),
            workspace: [360.0, 360.0, 360.0],
            axis_map: [2, 0, 1],
            direction: [1.0, 1.0, 1.0],
            units_scale: 1.0,
            round_decimals: 3,
        }
    }

    /// Pose in controller units for a position in millimetres.
    pub fn to_pose(&self, mm: [f64; 3]) -> Pose {
        let position = mm.map(|v| round_to(v * self.units_scale, self.round_decimals));
        Pose::new(position, self.orientation)
    }

    pub fn home_pose(&self) -> Pose {
        self.to_pose(self.home)
    }

    /// Position in millimetres for a pose in controller units.
    pub fn to_mm(&self, pose: &Pose) -> [f64; 3] {
        pose.position.map(|v| v / self.units_scale)
    }
}

/// One robot axis fed by one sensor axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisMapping {
    pub sensor_range: SensorRange,
    pub home: f64,
    pub workspace: f64,
    pub direction: f64,
}

impl AxisMapping {
    pub fn new(
        sensor_range: SensorRange,
        home: f64,
        workspace: f64,
        direction: f64,
    ) -> Result<Self, BuildError> {
        if !(workspace.is_finite() && workspace > 0.0) {
            return Err(BuildError::InvalidConfig("workspace size must be > 0"));
        }
        if direction != 1.0 && direction != -1.0 {
            return Err(BuildError::InvalidConfig("direction must be 1 or -1"));
        }
        Ok(Self {
            sensor_range,
            home,
            workspace,
            direction,
        })
    }

    #[inline]
    pub fn offset(&self) -> f64 {
        -self.sensor_range.midpoint()
    }

    #[inline]
    pub fn factor(&self) -> f64 {
        self.workspace / self.sensor_range.span()
    }

    #[inline]
    pub fn map(&self, filtered: f64) -> f64 {
        self.home + self.direction * (filtered + self.offset()) * self.workspace
            / self.sensor_range.span()
    }
}

/// Pure function from filtered sensor coordinates to robot coordinates (mm).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkspaceMapper {
    axes: [AxisMapping; 3],
    axis_map: [usize; 3],
}

impl WorkspaceMapper {
    pub fn new(profile: &RobotProfile, sensor_ranges: [SensorRange; 3]) -> Result<Self, BuildError> {
        let mut seen = [false; 3];
        for &s in &profile.axis_map {
            if s > 2 || seen[s] {
                return Err(BuildError::InvalidConfig(
                    "axis_map must be a permutation of [0, 1, 2]",
                ));
            }
            seen[s] = true;
        }
        let axis = |i: usize| {
            AxisMapping::new(
                sensor_ranges[profile.axis_map[i]],
                profile.home[i],
                profile.workspace[i],
                profile.direction[i],
            )
        };
        Ok(Self {
            axes: [axis(0)?, axis(1)?, axis(2)?],
            axis_map: profile.axis_map,
        })
    }

    /// Mapping of robot axis `i`.
    #[inline]
    pub fn axis(&self, i: usize) -> &AxisMapping {
        &self.axes[i]
    }

    /// Map a filtered sensor triple (x, y, z) to robot (X, Y, Z).
    pub fn map(&self, sensor: [f64; 3]) -> [f64; 3] {
        [0, 1, 2].map(|i| self.axes[i].map(sensor[self.axis_map[i]]))
    }
}
