//! Collaborator boundaries for the teleoperation stack.
//!
//! The core never talks to a vendor SDK directly: the glove driver, the
//! robot motion interface and the gripper are reached through the traits
//! below. Errors cross the boundary as boxed trait objects and are mapped to
//! typed errors by `teleop_core::hw_error`.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

/// Boxed error returned across every collaborator boundary.
pub type HwResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Identifies one scalar glove channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    /// Hand position axis (0 = x, 1 = y, 2 = z).
    Position(usize),
    /// Finger bend sensor (0 = thumb .. 4 = little finger).
    Finger(usize),
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelId::Position(i) => write!(f, "position[{i}]"),
            ChannelId::Finger(i) => write!(f, "finger[{i}]"),
        }
    }
}

/// Motion-capture glove.
///
/// Implementations are shared between acquisition threads, so every accessor
/// takes `&self`. Once the device connection fails, `is_faulted` turns true
/// and stays true.
pub trait Glove: Send + Sync {
    fn read_channel(&self, id: ChannelId) -> HwResult<f64>;
    fn read_button(&self, id: usize) -> HwResult<bool>;
    fn is_faulted(&self) -> bool;

    fn position_channels(&self) -> usize {
        3
    }
    fn finger_channels(&self) -> usize {
        5
    }
    fn button_count(&self) -> usize {
        4
    }
}

impl<G: Glove + ?Sized> Glove for std::sync::Arc<G> {
    fn read_channel(&self, id: ChannelId) -> HwResult<f64> {
        (**self).read_channel(id)
    }
    fn read_button(&self, id: usize) -> HwResult<bool> {
        (**self).read_button(id)
    }
    fn is_faulted(&self) -> bool {
        (**self).is_faulted()
    }
    fn position_channels(&self) -> usize {
        (**self).position_channels()
    }
    fn finger_channels(&self) -> usize {
        (**self).finger_channels()
    }
    fn button_count(&self) -> usize {
        (**self).button_count()
    }
}

/// Tool orientation, passed through to the robot untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Orientation {
    /// Axis-angle rotation vector (rx, ry, rz) in radians.
    RotationVector([f64; 3]),
    /// Unit quaternion (q1..q4).
    Quaternion([f64; 4]),
}

/// Cartesian tool pose in robot units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: [f64; 3],
    pub orientation: Orientation,
}

impl Pose {
    pub fn new(position: [f64; 3], orientation: Orientation) -> Self {
        Self {
            position,
            orientation,
        }
    }
}

/// Parameters of one real-time servo command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoParams {
    pub velocity: f64,
    pub acceleration: f64,
    /// Blocking time of the command on the controller.
    pub period: Duration,
    /// Look-ahead time used by the controller to smooth the trajectory.
    pub lookahead: Duration,
    /// Proportional gain for following the target.
    pub gain: f64,
}

pub trait Robot {
    fn move_linear(&mut self, pose: &Pose, velocity: f64, acceleration: f64) -> HwResult<()>;
    fn servo_to(&mut self, pose: &Pose, params: &ServoParams) -> HwResult<()>;
    fn stop(&mut self) -> HwResult<()>;
    fn current_pose(&mut self) -> HwResult<Pose>;
}

pub trait Gripper {
    fn open(&mut self) -> HwResult<()>;
    fn close(&mut self) -> HwResult<()>;
    fn is_open(&self) -> bool;
    fn is_closed(&self) -> bool;
}
