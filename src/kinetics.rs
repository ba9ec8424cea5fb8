//! Lookup tables for the NMDA-like rise and the exponential fall of the normalized synaptic efficacy (zBar).
use derivative::Derivative;
use itertools::Itertools;
use log::{error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use super::error::SimError;
use super::{FALL_CUTOFF, MAX_RISE_DURATION, MAX_TIME_STEP, RISE_ROW_OFFSET, ZBAR_RESOLUTION};

/// Number of columns of the rise table.
pub const RISE_COLUMNS: usize = MAX_RISE_DURATION + 1;
/// Number of rows of the rise table, one per quantized starting value.
pub const RISE_ROWS: usize = ZBAR_RESOLUTION + 1;
/// File name of the rise table dump.
pub const RISE_DUMP_FILE: &str = "ZbarRiseArray.txt";
/// File name of the fall table dump.
pub const FALL_DUMP_FILE: &str = "ZbarFallArray.txt";

/// The shape of the default rise curves.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RiseShape {
    /// Linear ramp from the starting value to one over the rise duration.
    Ramp,
    /// Starting value held until the end of the rise, then one.
    Step,
}

/// Rise and fall tables of a synapse type.
///
/// Row `i` of the rise table is the rise curve of a synapse whose efficacy was `i / 1000` when the rise
/// started; column `j` is the number of steps elapsed since the start of the rise. The fall table holds
/// `alpha^i` for the steps elapsed since the end of the rise.
#[derive(Derivative, Clone)]
#[derivative(Debug, PartialEq)]
pub struct DecayKineticsTable {
    rise_duration: usize,
    alpha: f64,
    shape: RiseShape,
    rise_curve: Option<PathBuf>,
    max_time_step: usize,
    #[derivative(Debug = "ignore")]
    rise: Vec<[f64; RISE_COLUMNS]>,
    #[derivative(Debug = "ignore")]
    fall: Vec<f64>,
}

impl DecayKineticsTable {
    /// Build the tables for the given rise duration and decay constant.
    /// If provided, the rise curve file replaces the default first row of the rise table.
    ///
    /// The function returns an error if the rise duration exceeds the table width, if alpha is not in
    /// [0, 1], or if the rise curve file is missing or malformed.
    pub fn build(
        rise_duration: usize,
        alpha: f64,
        shape: RiseShape,
        rise_curve: Option<&Path>,
    ) -> Result<Self, SimError> {
        if rise_duration > MAX_RISE_DURATION {
            let msg = format!(
                "rise duration {} exceeds the maximum of {}",
                rise_duration, MAX_RISE_DURATION
            );
            error!("{}", msg);
            return Err(SimError::InvalidParameter(msg));
        }
        if !(0.0..=1.0).contains(&alpha) {
            let msg = format!("decay constant {} is not in [0, 1]", alpha);
            error!("{}", msg);
            return Err(SimError::InvalidParameter(msg));
        }

        let rise = match rise_curve {
            Some(path) => {
                let first_row = read_rise_curve(path, rise_duration)?;
                rise_table_from_curve(&first_row)
            }
            None => default_rise_table(rise_duration, shape),
        };
        let (fall, max_time_step) = fall_table(alpha);

        info!(
            "Kinetics table built (rise duration: {}, alpha: {}, max time step: {})",
            rise_duration, alpha, max_time_step
        );

        Ok(DecayKineticsTable {
            rise_duration,
            alpha,
            shape,
            rise_curve: rise_curve.map(Path::to_path_buf),
            max_time_step,
            rise,
            fall,
        })
    }

    /// Returns the number of steps needed to reach the peak of a rise.
    pub fn rise_duration(&self) -> usize {
        self.rise_duration
    }

    /// Returns the decay constant of the fall.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn shape(&self) -> RiseShape {
        self.shape
    }

    /// Returns the rise curve file used to build the table, if any.
    pub fn rise_curve(&self) -> Option<&Path> {
        self.rise_curve.as_deref()
    }

    /// Returns the effective support of the fall, i.e., the first step at which the fall value drops below
    /// the cut-off, or the table length if it never does.
    pub fn max_time_step(&self) -> usize {
        self.max_time_step
    }

    /// Returns the rise value for a quantized starting value and a number of elapsed steps.
    /// Entries outside of the table are zero.
    pub fn rise(&self, row: usize, elapsed: usize) -> f64 {
        self.rise
            .get(row)
            .and_then(|values| values.get(elapsed))
            .copied()
            .unwrap_or(0.0)
    }

    /// Returns the fall value after the given number of steps, zero beyond the table.
    pub fn fall(&self, elapsed: usize) -> f64 {
        self.fall.get(elapsed).copied().unwrap_or(0.0)
    }

    /// Returns a full row of the rise table.
    pub fn rise_row(&self, row: usize) -> Option<&[f64]> {
        self.rise.get(row).map(|values| &values[..])
    }

    /// Returns the fall table.
    pub fn fall_values(&self) -> &[f64] {
        &self.fall[..]
    }

    /// Write the tables in the given directory, as `ZbarRiseArray.txt` (one line per row of the rise table)
    /// and `ZbarFallArray.txt` (a single line with the fall table).
    pub fn save_to<P: AsRef<Path>>(&self, dir: P) -> Result<(), SimError> {
        let rise_text = self
            .rise
            .iter()
            .map(|values| values.iter().join(" "))
            .join("\n");
        fs::write(dir.as_ref().join(RISE_DUMP_FILE), rise_text + "\n")?;
        fs::write(
            dir.as_ref().join(FALL_DUMP_FILE),
            self.fall.iter().join(" ") + "\n",
        )?;
        info!("Kinetics tables saved to {}", dir.as_ref().display());
        Ok(())
    }
}

/// The content of a kinetics dump, as read back from disk.
#[derive(Debug, PartialEq, Clone)]
pub struct KineticsDump {
    pub rise: Vec<Vec<f64>>,
    pub fall: Vec<f64>,
}

impl KineticsDump {
    /// Read the tables written by [`DecayKineticsTable::save_to`] in the given directory.
    pub fn load_from<P: AsRef<Path>>(dir: P) -> Result<Self, SimError> {
        let rise_text = fs::read_to_string(dir.as_ref().join(RISE_DUMP_FILE))?;
        let rise = rise_text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(parse_values)
            .collect::<Result<Vec<Vec<f64>>, SimError>>()?;
        let fall_text = fs::read_to_string(dir.as_ref().join(FALL_DUMP_FILE))?;
        let fall = parse_values(&fall_text)?;
        Ok(KineticsDump { rise, fall })
    }
}

fn parse_values(text: &str) -> Result<Vec<f64>, SimError> {
    text.split_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|e| SimError::IOError(format!("invalid value {}: {}", token, e)))
        })
        .collect()
}

/// The default rise table, either ramps or steps depending on the shape.
fn default_rise_table(rise_duration: usize, shape: RiseShape) -> Vec<[f64; RISE_COLUMNS]> {
    let mut rise = vec![[0.0; RISE_COLUMNS]; RISE_ROWS];
    for (i, values) in rise.iter_mut().enumerate() {
        let start = i as f64 / ZBAR_RESOLUTION as f64;
        values[0] = start;
        for (j, value) in values.iter_mut().enumerate().take(rise_duration + 1) {
            *value = if j >= rise_duration {
                1.0
            } else {
                match shape {
                    RiseShape::Ramp => start + j as f64 / rise_duration as f64,
                    RiseShape::Step => start,
                }
            };
            *value = value.min(1.0);
        }
    }
    for value in rise[ZBAR_RESOLUTION].iter_mut().take(rise_duration + 1) {
        *value = 1.0;
    }
    rise
}

/// The rise table derived from a custom first row: each row adds a constant offset to the previous one.
fn rise_table_from_curve(first_row: &[f64]) -> Vec<[f64; RISE_COLUMNS]> {
    let mut rise = vec![[0.0; RISE_COLUMNS]; RISE_ROWS];
    for (j, value) in first_row.iter().enumerate() {
        rise[0][j] = value.min(1.0);
    }
    for i in 1..RISE_ROWS {
        for j in 0..first_row.len() {
            rise[i][j] = (rise[i - 1][j] + RISE_ROW_OFFSET).min(1.0);
        }
    }
    rise
}

/// Returns the fall table and its effective support.
fn fall_table(alpha: f64) -> (Vec<f64>, usize) {
    let fall: Vec<f64> = (0..MAX_TIME_STEP).map(|i| alpha.powi(i as i32)).collect();
    let max_time_step = fall
        .iter()
        .position(|value| *value < FALL_CUTOFF)
        .unwrap_or(MAX_TIME_STEP);
    (fall, max_time_step)
}

/// Read a rise curve from a file of whitespace-separated values.
fn read_rise_curve(path: &Path, rise_duration: usize) -> Result<Vec<f64>, SimError> {
    let text = fs::read_to_string(path).map_err(|e| {
        let msg = format!("unable to open {}: {}", path.display(), e);
        error!("{}", msg);
        SimError::RiseCurve(msg)
    })?;
    parse_rise_curve(&text, rise_duration).map_err(|e| {
        error!("{} ({})", e, path.display());
        e
    })
}

/// Parse and validate a rise curve: exactly `rise_duration + 1` values, starting at 0 and ending at 1.
/// A non-monotonic curve is accepted with a warning.
pub fn parse_rise_curve(text: &str, rise_duration: usize) -> Result<Vec<f64>, SimError> {
    let values = text
        .split_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| SimError::RiseCurve(format!("invalid value {}", token)))
        })
        .collect::<Result<Vec<f64>, SimError>>()?;

    if values.len() != rise_duration + 1 {
        return Err(SimError::RiseCurve(format!(
            "expected {} values for a rise duration of {}, found {}",
            rise_duration + 1,
            rise_duration,
            values.len()
        )));
    }
    if values.first() != Some(&0.0) || values.last() != Some(&1.0) {
        return Err(SimError::RiseCurve(
            "first value must be 0 and last value must be 1".to_string(),
        ));
    }
    for (j, (prev, next)) in values.iter().tuple_windows().enumerate() {
        if next < prev {
            warn!(
                "Rise curve is non-monotonic: entry {} is {} and entry {} is {}",
                j,
                prev,
                j + 1,
                next
            );
        }
    }
    Ok(values)
}
