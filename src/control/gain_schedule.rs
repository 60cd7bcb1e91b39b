use log::{debug, warn};

use crate::{constants::MAX_GAIN_ROWS, errors::RigError, hardware::Storage};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainRow {
    pub gains: Gains,
    pub pressure_threshold: f64,
}

/// PID gains bucketed by chamber pressure, ascending by threshold.
///
/// Sortedness is trusted, not checked: the file is expected to list rows
/// from the lowest threshold to the highest.
#[derive(Debug, Clone, PartialEq)]
pub struct GainSchedule {
    rows: Vec<GainRow>,
}

impl GainSchedule {
    pub fn new(rows: Vec<GainRow>) -> Self {
        GainSchedule { rows }
    }

    pub fn load(storage: &mut impl Storage, path: &str) -> Result<Self, RigError> {
        let text = storage
            .load_table(path)
            .map_err(|e| RigError::GainScheduleLoad(e.to_string()))?;
        Self::parse(&text)
    }

    /// Parses `Kp,Ki,Kd,threshold` rows. Blank lines are skipped, rows with
    /// fewer than four numbers are dropped, and anything after the fourth
    /// field is ignored.
    pub fn parse(text: &str) -> Result<Self, RigError> {
        let mut rows = Vec::new();

        for (number, line) in text.lines().enumerate() {
            if rows.len() >= MAX_GAIN_ROWS {
                warn!("Gain schedule truncated at {} rows", MAX_GAIN_ROWS);
                break;
            }
            if line.trim().is_empty() {
                continue;
            }
            match Self::parse_row(line) {
                Some(row) => rows.push(row),
                None => warn!("Skipping malformed gain row {}: {:?}", number + 1, line),
            }
        }

        if rows.is_empty() {
            return Err(RigError::GainScheduleLoad(
                "no gain rows could be parsed".to_string(),
            ));
        }

        debug!("Loaded {} gain rows", rows.len());
        Ok(GainSchedule { rows })
    }

    fn parse_row(line: &str) -> Option<GainRow> {
        let mut fields = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|field| !field.is_empty())
            .map(str::parse::<f64>);

        let mut values = [0.0; 4];
        for value in values.iter_mut() {
            *value = fields.next()?.ok()?;
        }

        Some(GainRow {
            gains: Gains {
                kp: values[0],
                ki: values[1],
                kd: values[2],
            },
            pressure_threshold: values[3],
        })
    }

    pub fn rows(&self) -> &[GainRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Gains of the first row whose threshold is at or above `pressure`.
    /// Pressures above every threshold fall back to the highest-threshold
    /// row. An empty schedule yields zero gains.
    pub fn lookup(&self, pressure: f64) -> Gains {
        self.rows
            .iter()
            .find(|row| row.pressure_threshold >= pressure)
            .or_else(|| self.rows.last())
            .map_or(
                Gains {
                    kp: 0.0,
                    ki: 0.0,
                    kd: 0.0,
                },
                |row| row.gains,
            )
    }
}
