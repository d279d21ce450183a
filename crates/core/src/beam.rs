//! Moving heat source driven by a scan path file.
//!
//! A scan path is an ordered list of segments, each either a dwell (the beam
//! parks at a point for a duration) or a traverse (the beam sweeps a line at
//! a scan speed). Loading converts each segment's parameter into an absolute
//! completion time; queries then interpolate position and power at any
//! simulated time.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Tolerance for scan path interval comparisons.
const EPS: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentMode {
    /// Line traversed at a scan speed; `parameter` is m/s.
    Traverse,
    /// Point dwell; `parameter` is a duration in seconds.
    Dwell,
}

/// One scan path segment.
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    pub mode: SegmentMode,
    /// Target position of the heat source center, meters.
    pub position: [f64; 3],
    /// Beam power over this segment, watts.
    pub power: f64,
    /// Dwell duration (s) or scan speed (m/s) depending on `mode`.
    pub parameter: f64,
    /// Absolute simulated time at which this segment completes. Derived
    /// during loading; non-decreasing along the path.
    pub time_end: f64,
}

impl Segment {
    /// Sentinel segment: a zero-length dwell at the origin with no power.
    fn sentinel() -> Self {
        Segment {
            mode: SegmentMode::Dwell,
            position: [0.0; 3],
            power: 0.0,
            parameter: 0.0,
            time_end: 0.0,
        }
    }

    /// Parse `mode x y z power parameter` from one whitespace-separated
    /// record.
    fn parse(line: &str, line_number: usize) -> Result<Self> {
        let parse_err = |reason: String| Error::ScanPathParse {
            line: line_number,
            reason,
        };

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(parse_err(format!(
                "expected 6 fields (mode x y z power parameter), found {}",
                fields.len()
            )));
        }

        let number = |field: &str| -> Result<f64> {
            field
                .parse::<f64>()
                .map_err(|_| parse_err(format!("'{field}' is not a number")))
        };

        let mode = match fields[0] {
            "0" => SegmentMode::Traverse,
            "1" => SegmentMode::Dwell,
            other => return Err(parse_err(format!("mode must be 0 or 1, got '{other}'"))),
        };

        let position = [number(fields[1])?, number(fields[2])?, number(fields[3])?];
        let power = number(fields[4])?;
        let parameter = number(fields[5])?;

        match mode {
            SegmentMode::Traverse if !(parameter > 0.0) => Err(parse_err(format!(
                "traversed segments need a positive scan speed, got {parameter}"
            ))),
            SegmentMode::Dwell if parameter < 0.0 => Err(parse_err(format!(
                "dwell segments need a non-negative duration, got {parameter}"
            ))),
            _ => Ok(Segment {
                mode,
                position,
                power,
                parameter,
                time_end: 0.0,
            }),
        }
    }
}

/// Time-parameterized beam state over a loaded scan path.
///
/// Queries are deterministic in the query time; the cached segment index
/// only accelerates the common monotonically-advancing case.
#[derive(Debug)]
pub struct MovingBeam {
    path: Vec<Segment>,
    index: usize,
    position: [f64; 3],
    power: f64,
    end_time: f64,
}

impl MovingBeam {
    /// Load a scan path file. The first line is a header and is discarded;
    /// every following non-empty line is one segment record.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| Error::ScanPathRead {
            path: path.to_path_buf(),
            source,
        })?;
        let beam = Self::parse(&contents)?;
        if beam.path.len() == 1 {
            return Err(Error::ScanPathEmpty {
                path: path.to_path_buf(),
            });
        }
        Ok(beam)
    }

    /// Parse scan path text (header line plus segment records).
    pub fn parse(contents: &str) -> Result<Self> {
        let mut path = vec![Segment::sentinel()];
        for (line_number, line) in contents.lines().enumerate().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            path.push(Segment::parse(line, line_number + 1)?);
        }

        // Accumulate absolute completion times.
        for i in 1..path.len() {
            let elapsed = match path[i].mode {
                SegmentMode::Dwell => path[i].parameter,
                SegmentMode::Traverse => {
                    distance(path[i - 1].position, path[i].position) / path[i].parameter
                }
            };
            path[i].time_end = path[i - 1].time_end + elapsed;
        }

        // The beam end time is the last time power is on.
        let end_time = path
            .iter()
            .rev()
            .find(|segment| segment.power > EPS)
            .map_or(0.0, |segment| segment.time_end);

        Ok(MovingBeam {
            path,
            index: 0,
            position: [0.0; 3],
            power: 0.0,
            end_time,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.path
    }

    /// Absolute time of the last powered segment.
    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn position(&self) -> [f64; 3] {
        self.position
    }

    pub fn power(&self) -> f64 {
        self.power
    }

    /// Update the beam state to the given simulated time. Past the end of
    /// the path the power is off and the position freezes at its last value.
    pub fn move_to(&mut self, time: f64) {
        if time - self.end_time > EPS {
            self.power = 0.0;
            return;
        }

        self.index = self.find_index(time);
        let i = self.index;
        let prev = i.saturating_sub(1);

        match self.path[i].mode {
            SegmentMode::Dwell => {
                self.position = self.path[i].position;
            }
            SegmentMode::Traverse => {
                let dt_segment = self.path[i].time_end - self.path[prev].time_end;
                let mut displacement = [0.0; 3];
                if dt_segment > 0.0 {
                    let fraction = (time - self.path[prev].time_end) / dt_segment;
                    for d in 0..3 {
                        displacement[d] =
                            (self.path[i].position[d] - self.path[prev].position[d]) * fraction;
                    }
                }
                for d in 0..3 {
                    self.position[d] = self.path[prev].position[d] + displacement[d];
                }
            }
        }

        self.power = if time - self.path[prev].time_end > EPS {
            self.path[i].power
        } else {
            self.path[prev].power
        };
    }

    /// Locate the active segment for `time`, starting from the cached index
    /// and walking backward or forward as needed, then skipping zero-length
    /// dwells.
    fn find_index(&self, time: f64) -> usize {
        let n = self.path.len() - 1;
        let mut i = self.index;

        while i > 0 && self.path[i].time_end > time {
            i -= 1;
        }
        while i < n && self.path[i].time_end < time {
            i += 1;
        }
        while i < n && self.path[i].mode == SegmentMode::Dwell && self.path[i].parameter == 0.0 {
            i += 1;
        }

        i.min(n)
    }
}

fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One-second dwell at the origin, then a 1 m traverse at 1 m/s under
    /// 100 W.
    fn dwell_then_traverse() -> MovingBeam {
        MovingBeam::parse(
            "mode x y z power parameter\n\
             1 0.0 0.0 0.0 0.0 1.0\n\
             0 1.0 0.0 0.0 100.0 1.0\n",
        )
        .unwrap()
    }

    #[test]
    fn test_segment_times_accumulate() {
        let beam = dwell_then_traverse();
        let times: Vec<f64> = beam.segments().iter().map(|s| s.time_end).collect();
        assert_eq!(times, vec![0.0, 1.0, 2.0]);
        assert!((beam.end_time() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_query_during_dwell() {
        let mut beam = dwell_then_traverse();
        beam.move_to(0.5);
        assert_eq!(beam.position(), [0.0, 0.0, 0.0]);
        assert_eq!(beam.power(), 0.0);
    }

    #[test]
    fn test_query_mid_traverse() {
        let mut beam = dwell_then_traverse();
        beam.move_to(1.5);
        assert!((beam.position()[0] - 0.5).abs() < 1e-12);
        assert_eq!(beam.power(), 100.0);
    }

    #[test]
    fn test_query_past_end() {
        let mut beam = dwell_then_traverse();
        beam.move_to(1.5);
        beam.move_to(3.0);
        assert_eq!(beam.power(), 0.0);
        // Position freezes at the last queried value.
        assert!((beam.position()[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_traverse_endpoints_are_continuous() {
        let mut beam = dwell_then_traverse();
        beam.move_to(1.0);
        assert!((beam.position()[0] - 0.0).abs() < 1e-12);
        beam.move_to(2.0);
        assert!((beam.position()[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_backward_queries_rewind() {
        let mut beam = dwell_then_traverse();
        beam.move_to(1.9);
        beam.move_to(0.4);
        assert_eq!(beam.position(), [0.0, 0.0, 0.0]);
        assert_eq!(beam.power(), 0.0);
        beam.move_to(1.25);
        assert!((beam.position()[0] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_zero_duration_dwells_are_skipped() {
        let mut beam = MovingBeam::parse(
            "header\n\
             1 0.0 0.0 0.0 50.0 1.0\n\
             1 2.0 0.0 0.0 75.0 0.0\n\
             0 1.0 0.0 0.0 100.0 1.0\n",
        )
        .unwrap();
        // Inside the dwell the zero-length jump segment is not active.
        beam.move_to(0.5);
        assert_eq!(beam.position(), [0.0, 0.0, 0.0]);
        assert_eq!(beam.power(), 50.0);
        // After the jump the traverse interpolates from the jump target.
        beam.move_to(1.5);
        assert!((beam.position()[0] - 1.5).abs() < 1e-12);
        assert_eq!(beam.power(), 100.0);
    }

    #[test]
    fn test_end_time_ignores_trailing_unpowered_segments() {
        let beam = MovingBeam::parse(
            "header\n\
             0 1.0 0.0 0.0 100.0 1.0\n\
             1 1.0 0.0 0.0 0.0 5.0\n",
        )
        .unwrap();
        assert!((beam.end_time() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_power_switches_after_interval_start() {
        let mut beam = dwell_then_traverse();
        // Exactly at the dwell end the traverse power has not engaged yet.
        beam.move_to(1.0);
        assert_eq!(beam.power(), 0.0);
        beam.move_to(1.0 + 1e-6);
        assert_eq!(beam.power(), 100.0);
    }

    #[test]
    fn test_serpentine_path_is_continuous_at_every_segment_boundary() {
        let mut beam = MovingBeam::parse(
            "mode x y z power parameter\n\
             1 0.0 0.0 0.0 0.0 0.5\n\
             0 2.0 0.0 0.0 150.0 1.0\n\
             0 2.0 1.0 0.0 0.0 2.0\n\
             0 0.0 1.0 0.0 150.0 1.0\n",
        )
        .unwrap();

        let segments: Vec<Segment> = beam.segments().to_vec();
        for i in 1..segments.len() {
            if segments[i].mode != SegmentMode::Traverse {
                continue;
            }
            // Entering the segment the beam sits at the previous target,
            // leaving it at its own target.
            beam.move_to(segments[i - 1].time_end);
            for d in 0..3 {
                assert!(
                    (beam.position()[d] - segments[i - 1].position[d]).abs() < 1e-12,
                    "segment {i} start"
                );
            }
            beam.move_to(segments[i].time_end);
            for d in 0..3 {
                assert!(
                    (beam.position()[d] - segments[i].position[d]).abs() < 1e-12,
                    "segment {i} end"
                );
            }
        }
    }

    #[test]
    fn test_malformed_lines_are_rejected() {
        let err = MovingBeam::parse("header\n2 0 0 0 1.0 1.0\n").unwrap_err();
        assert!(err.to_string().contains("line 2"), "got: {err}");

        assert!(MovingBeam::parse("header\n0 0 0 0 1.0\n").is_err());
        assert!(MovingBeam::parse("header\n0 0 0 x 1.0 1.0\n").is_err());
        // Traversal at zero speed has no finite duration.
        assert!(MovingBeam::parse("header\n0 1 0 0 1.0 0.0\n").is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = MovingBeam::from_file("/nonexistent/scan.txt").unwrap_err();
        assert!(err.to_string().contains("scan path"), "got: {err}");
    }

    #[test]
    fn test_header_only_file_is_an_error() {
        let path = std::env::temp_dir().join(format!(
            "meltsim_empty_scan_{}.txt",
            std::process::id()
        ));
        std::fs::write(&path, "mode x y z power parameter\n").unwrap();

        let err = MovingBeam::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("no segments"), "got: {err}");

        std::fs::remove_file(&path).ok();
    }
}
