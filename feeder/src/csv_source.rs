//! Replay of a recorded Grab "posisi" trace.
//!
//! Expected header (any column order, extra columns ignored):
//! `trj_id,driving_mode,osname,pingtimestamp,rawlat,rawlng,speed,bearing,accuracy`
//! `pingtimestamp` is in seconds and is converted to milliseconds.

use anyhow::{bail, Context, Result};
use geotrack::report::PositionReport;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

/// Column positions resolved from the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnIndex {
    trj_id: usize,
    driving_mode: usize,
    rawlat: usize,
    rawlng: usize,
    bearing: usize,
    speed: usize,
    accuracy: usize,
    pingtimestamp: usize,
}

impl ColumnIndex {
    pub fn from_header(header: &str) -> Result<Self> {
        let names: Vec<&str> = header.split(',').map(|c| c.trim()).collect();
        let find = |name: &str| {
            names
                .iter()
                .position(|c| *c == name)
                .with_context(|| format!("CSV header is missing column '{}'", name))
        };

        Ok(Self {
            trj_id: find("trj_id")?,
            driving_mode: find("driving_mode")?,
            rawlat: find("rawlat")?,
            rawlng: find("rawlng")?,
            bearing: find("bearing")?,
            speed: find("speed")?,
            accuracy: find("accuracy")?,
            pingtimestamp: find("pingtimestamp")?,
        })
    }

    /// Turn one data row into a report.
    pub fn parse_row(&self, line: &str) -> Result<PositionReport> {
        let fields: Vec<&str> = line.split(',').map(|f| f.trim()).collect();
        let field = |index: usize, name: &str| {
            fields
                .get(index)
                .copied()
                .with_context(|| format!("row is missing '{}'", name))
        };
        let number = |index: usize, name: &str| -> Result<f64> {
            let raw = field(index, name)?;
            raw.parse::<f64>()
                .with_context(|| format!("'{}' is not a number: {}", name, raw))
        };

        let trj_id = field(self.trj_id, "trj_id")?.replace(['"', '\''], "");
        if trj_id.is_empty() {
            bail!("row has an empty trj_id");
        }

        let seconds = field(self.pingtimestamp, "pingtimestamp")?
            .parse::<i64>()
            .context("'pingtimestamp' is not an integer")?;

        Ok(PositionReport {
            agent_id: Some(trj_id),
            service_type: Some(field(self.driving_mode, "driving_mode")?.to_string()),
            latitude: Some(number(self.rawlat, "rawlat")?),
            longitude: Some(number(self.rawlng, "rawlng")?),
            heading: Some(number(self.bearing, "bearing")?),
            speed: Some(number(self.speed, "speed")?),
            accuracy: Some(number(self.accuracy, "accuracy")?),
            status: Some("ON_TASK".to_string()),
            timestamp: Some(seconds * 1000),
            ..Default::default()
        })
    }
}

/// Iterator over the reports in a trace. Blank lines are skipped.
pub struct TraceReader<R: BufRead> {
    columns: ColumnIndex,
    lines: Lines<R>,
    line_number: usize,
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(reader: R) -> Result<Self> {
        let mut lines = reader.lines();
        let header = lines
            .next()
            .context("CSV trace is empty")?
            .context("Failed to read CSV header")?;
        let columns = ColumnIndex::from_header(&header)?;

        Ok(Self {
            columns,
            lines,
            line_number: 1,
        })
    }
}

impl TraceReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open trace {}", path.display()))?;
        Self::new(BufReader::new(file))
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<PositionReport>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            let line_number = self.line_number;
            return Some(
                self.columns
                    .parse_row(&line)
                    .with_context(|| format!("line {}", line_number)),
            );
        }
    }
}
