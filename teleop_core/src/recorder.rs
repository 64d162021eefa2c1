//! CSV output for offline filter evaluation and tracking analysis.
use crate::error::{Result, TeleopError};
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub const POSITION_PREFIXES: [&str; 3] = ["X", "Y", "Z"];
/// Thumb, index, middle, ring, little.
pub const FINGER_PREFIXES: [&str; 5] = ["T", "I", "M", "R", "L"];

/// One channel at one tick: the raw sample and each evaluated stage.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageSample {
    pub raw: f64,
    pub sma: f64,
    pub lpf: f64,
    /// LPF applied to the SMA output.
    pub blpma: f64,
}

fn csv_err(e: &csv::Error) -> TeleopError {
    TeleopError::Io(format!("csv: {e}"))
}

fn create_file(path: &Path) -> Result<File> {
    File::create(path)
        .map_err(|e| TeleopError::Io(format!("create {}: {e}", path.display())).into())
}

/// Writes `{P}_DATA_RT, {P}_DATA_F1_RT, {P}_DATA_F2_RT, {P}_DATA_F3_RT` per
/// channel prefix, one row per tick.
pub struct EvaluationRecorder<W: Write> {
    writer: csv::Writer<W>,
    channels: usize,
    rows: u64,
}

impl EvaluationRecorder<File> {
    pub fn create_positions(path: &Path) -> Result<Self> {
        Self::positions(create_file(path)?)
    }

    pub fn create_fingers(path: &Path) -> Result<Self> {
        Self::fingers(create_file(path)?)
    }
}

impl<W: Write> EvaluationRecorder<W> {
    pub fn positions(out: W) -> Result<Self> {
        Self::with_prefixes(out, &POSITION_PREFIXES)
    }

    pub fn fingers(out: W) -> Result<Self> {
        Self::with_prefixes(out, &FINGER_PREFIXES)
    }

    pub fn with_prefixes(out: W, prefixes: &[&str]) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(out);
        let header: Vec<String> = prefixes
            .iter()
            .flat_map(|p| {
                [
                    format!("{p}_DATA_RT"),
                    format!("{p}_DATA_F1_RT"),
                    format!("{p}_DATA_F2_RT"),
                    format!("{p}_DATA_F3_RT"),
                ]
            })
            .collect();
        writer.write_record(&header).map_err(|e| csv_err(&e))?;
        Ok(Self {
            writer,
            channels: prefixes.len(),
            rows: 0,
        })
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Append one row; `samples` holds one entry per channel, in prefix order.
    pub fn record(&mut self, samples: &[StageSample]) -> Result<()> {
        if samples.len() != self.channels {
            return Err(TeleopError::ChannelOutOfRange {
                kind: "recorder channel",
                id: samples.len(),
                count: self.channels,
            }
            .into());
        }
        let row = samples
            .iter()
            .flat_map(|s| [s.raw, s.sma, s.lpf, s.blpma])
            .map(|v| v.to_string());
        self.writer.write_record(row).map_err(|e| csv_err(&e))?;
        self.rows += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| TeleopError::Io(format!("flush recorder: {e}")).into())
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| TeleopError::Io(format!("finish recorder: {}", e.error())).into())
    }
}

/// Desired vs. actual tool position in millimetres, robot axis order.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackSample {
    pub desired: [f64; 3],
    pub actual: [f64; 3],
}

pub trait TrackSink {
    fn record(&mut self, sample: &TrackSample) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl TrackSink for Vec<TrackSample> {
    fn record(&mut self, sample: &TrackSample) -> Result<()> {
        self.push(*sample);
        Ok(())
    }
}

/// `X_DATA_SENSOR_RT, X_DATA_ROBOT_RT, Y_…, Z_…` per control tick.
pub struct TrackRecorder<W: Write> {
    writer: csv::Writer<W>,
    rows: u64,
}

impl TrackRecorder<File> {
    pub fn create(path: &Path) -> Result<Self> {
        Self::new(create_file(path)?)
    }
}

impl<W: Write> TrackRecorder<W> {
    pub fn new(out: W) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(out);
        let header = POSITION_PREFIXES
            .iter()
            .flat_map(|p| [format!("{p}_DATA_SENSOR_RT"), format!("{p}_DATA_ROBOT_RT")]);
        writer.write_record(header).map_err(|e| csv_err(&e))?;
        Ok(Self { writer, rows: 0 })
    }

    #[inline]
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| TeleopError::Io(format!("finish tracker: {}", e.error())).into())
    }
}

impl<W: Write> TrackSink for TrackRecorder<W> {
    fn record(&mut self, s: &TrackSample) -> Result<()> {
        let row = (0..3)
            .flat_map(|i| [s.desired[i], s.actual[i]])
            .map(|v| v.to_string());
        self.writer.write_record(row).map_err(|e| csv_err(&e))?;
        self.rows += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| TeleopError::Io(format!("flush tracker: {e}")).into())
    }
}
