//! Test and helper mocks for teleop_core

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use teleop_traits::{ChannelId, Glove, Gripper, HwResult, Pose, Robot, ServoParams};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GloveFrame {
    pub position: [f64; 3],
    pub fingers: [f64; 5],
    pub buttons: [bool; 4],
}

impl Default for GloveFrame {
    fn default() -> Self {
        Self {
            position: [0.0, 22.5, -22.5],
            fingers: [10.0; 5],
            buttons: [false; 4],
        }
    }
}

/// A glove whose readings are set directly by the test.
#[derive(Debug, Default)]
pub struct ScriptedGlove {
    frame: Mutex<GloveFrame>,
    faulted: AtomicBool,
}

impl ScriptedGlove {
    pub fn new(frame: GloveFrame) -> Self {
        Self {
            frame: Mutex::new(frame),
            faulted: AtomicBool::new(false),
        }
    }

    pub fn set(&self, frame: GloveFrame) {
        if let Ok(mut f) = self.frame.lock() {
            *f = frame;
        }
    }

    pub fn update(&self, edit: impl FnOnce(&mut GloveFrame)) {
        if let Ok(mut f) = self.frame.lock() {
            edit(&mut f);
        }
    }

    pub fn fault(&self) {
        self.faulted.store(true, Ordering::Release);
    }

    fn frame(&self) -> HwResult<GloveFrame> {
        self.frame
            .lock()
            .map(|f| *f)
            .map_err(|_| "scripted glove poisoned".into())
    }
}

fn out_of_range(kind: &str, id: usize) -> Box<dyn std::error::Error + Send + Sync> {
    format!("{kind} {id} out of range").into()
}

impl Glove for ScriptedGlove {
    fn read_channel(&self, id: ChannelId) -> HwResult<f64> {
        let f = self.frame()?;
        match id {
            ChannelId::Position(i) => f.position.get(i).copied().ok_or_else(|| out_of_range("position", i)),
            ChannelId::Finger(i) => f.fingers.get(i).copied().ok_or_else(|| out_of_range("finger", i)),
        }
    }

    fn read_button(&self, id: usize) -> HwResult<bool> {
        self.frame()?
            .buttons
            .get(id)
            .copied()
            .ok_or_else(|| out_of_range("button", id))
    }

    fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RobotCall {
    MoveLinear {
        pose: Pose,
        velocity: f64,
        acceleration: f64,
    },
    Servo(Pose),
    Stop,
}

/// Robot that records commands and reports the last commanded pose.
#[derive(Debug)]
pub struct RecordingRobot {
    pub calls: Vec<RobotCall>,
    pose: Pose,
}

impl RecordingRobot {
    pub fn new(start: Pose) -> Self {
        Self {
            calls: Vec::new(),
            pose: start,
        }
    }

    pub fn servo_targets(&self) -> Vec<Pose> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                RobotCall::Servo(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    pub fn stops(&self) -> usize {
        self.calls.iter().filter(|c| **c == RobotCall::Stop).count()
    }
}

impl Robot for RecordingRobot {
    fn move_linear(&mut self, pose: &Pose, velocity: f64, acceleration: f64) -> HwResult<()> {
        self.calls.push(RobotCall::MoveLinear {
            pose: *pose,
            velocity,
            acceleration,
        });
        self.pose = *pose;
        Ok(())
    }

    fn servo_to(&mut self, pose: &Pose, _params: &ServoParams) -> HwResult<()> {
        self.calls.push(RobotCall::Servo(*pose));
        self.pose = *pose;
        Ok(())
    }

    fn stop(&mut self) -> HwResult<()> {
        self.calls.push(RobotCall::Stop);
        Ok(())
    }

    fn current_pose(&mut self) -> HwResult<Pose> {
        Ok(self.pose)
    }
}

/// Gripper that records open/close commands.
#[derive(Debug, Default)]
pub struct RecordingGripper {
    closed: bool,
    pub commands: Vec<bool>,
}

impl RecordingGripper {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Gripper for RecordingGripper {
    fn open(&mut self) -> HwResult<()> {
        self.closed = false;
        self.commands.push(false);
        Ok(())
    }

    fn close(&mut self) -> HwResult<()> {
        self.closed = true;
        self.commands.push(true);
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
