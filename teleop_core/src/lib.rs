#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Glove-to-robot teleoperation core (hardware-agnostic).
//!
//! All hardware interactions go through the `teleop_traits::Glove`,
//! `teleop_traits::Robot` and `teleop_traits::Gripper` traits.
//!
//! ## Pipeline
//!
//! raw sample → [`guard::LimitGuard`] → {[`filter::Sma`] | [`filter::Lpf`] |
//! [`filter::Blpma`]} → [`telemetry`] → robot-side [`filter::Blpma`] →
//! [`mapper::WorkspaceMapper`] → [`teleop_traits::Robot::servo_to`]
//!
//! - **Acquisition**: one paced thread per channel group ([`acquisition`])
//! - **Discrete inputs**: [`latch::EdgeLatch`] and [`gesture::GestureRecognizer`]
//! - **Transport**: single-slot [`mailbox`] in process, UDP datagrams across hosts
//! - **Evaluation**: CSV recorders for filter stages and tracking error ([`recorder`])

pub mod acquisition;
pub mod butterworth;
pub mod collect;
pub mod config;
pub mod control;
pub mod conversions;
pub mod error;
pub mod filter;
pub mod gesture;
pub mod guard;
pub mod hw_error;
pub mod latch;
pub mod mailbox;
pub mod mapper;
pub mod mocks;
pub mod publisher;
pub mod recorder;
pub mod telemetry;
pub mod util;

pub use error::{BuildError, Report, Result, TeleopError};
pub use filter::{Blpma, Lpf, SignalFilter, Sma};
pub use guard::{LimitGuard, SensorRange};
pub use latch::EdgeLatch;
pub use mapper::{RobotProfile, WorkspaceMapper};
pub use telemetry::TelemetryMessage;
