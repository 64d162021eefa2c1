//! Simulated arm and gripper.
use crate::error::HwError;
use teleop_traits::{Gripper, HwResult, Pose, Robot, ServoParams};

/// Arm that follows servo targets with first-order lag and refuses motion
/// once stopped.
#[derive(Debug, Clone)]
pub struct SimulatedRobot {
    pose: Pose,
    /// Fraction of the remaining distance covered per servo command.
    follow: f64,
    stopped: bool,
    commands: u64,
}

impl SimulatedRobot {
    pub fn new(initial: Pose) -> Self {
        Self::with_follow(initial, 0.5)
    }

    pub fn with_follow(initial: Pose, follow: f64) -> Self {
        Self {
            pose: initial,
            follow: follow.clamp(0.0, 1.0),
            stopped: false,
            commands: 0,
        }
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Motion commands accepted so far.
    #[inline]
    pub fn commands(&self) -> u64 {
        self.commands
    }

    fn accept(&mut self) -> Result<(), HwError> {
        if self.stopped {
            return Err(HwError::CommandRejected("robot is stopped".into()));
        }
        self.commands += 1;
        Ok(())
    }
}

impl Robot for SimulatedRobot {
    fn move_linear(&mut self, pose: &Pose, velocity: f64, acceleration: f64) -> HwResult<()> {
        if !(velocity > 0.0 && acceleration > 0.0) {
            return Err(HwError::CommandRejected(format!(
                "move_linear needs positive velocity and acceleration, got {velocity}, {acceleration}"
            ))
            .into());
        }
        self.accept()?;
        tracing::debug!(goal = ?pose.position, velocity, "sim robot move_linear");
        self.pose = *pose;
        Ok(())
    }

    fn servo_to(&mut self, pose: &Pose, params: &ServoParams) -> HwResult<()> {
        if params.period.is_zero() {
            return Err(HwError::CommandRejected("servo period must be > 0".into()).into());
        }
        self.accept()?;
        let k = self.follow;
        for (p, t) in self.pose.position.iter_mut().zip(pose.position) {
            *p += (t - *p) * k;
        }
        self.pose.orientation = pose.orientation;
        tracing::trace!(goal = ?pose.position, actual = ?self.pose.position, "sim robot servo");
        Ok(())
    }

    fn stop(&mut self) -> HwResult<()> {
        if !self.stopped {
            tracing::debug!(commands = self.commands, "sim robot stopped");
        }
        self.stopped = true;
        Ok(())
    }

    fn current_pose(&mut self) -> HwResult<Pose> {
        Ok(self.pose)
    }
}

/// Two-finger gripper; its state is unknown until the first command.
#[derive(Debug, Clone, Default)]
pub struct SimulatedGripper {
    closed: Option<bool>,
    commands: u64,
}

impl SimulatedGripper {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn commands(&self) -> u64 {
        self.commands
    }
}

impl Gripper for SimulatedGripper {
    fn open(&mut self) -> HwResult<()> {
        self.closed = Some(false);
        self.commands += 1;
        tracing::debug!("sim gripper open");
        Ok(())
    }

    fn close(&mut self) -> HwResult<()> {
        self.closed = Some(true);
        self.commands += 1;
        tracing::debug!("sim gripper close");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.closed == Some(false)
    }

    fn is_closed(&self) -> bool {
        self.closed == Some(true)
    }
}
