//! Tiling job model and worker argument construction
//!
//! A [`TilingJob`] carries everything needed to launch one worker run. The
//! worker is opaque; the only contract is its argument grammar:
//!
//! ```text
//! <interpreter> <binary> --profile=<profile> -a <alpha> --zoom <min>[-<max>] -w none <input> [<output>]
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::SpawnerError;

/// Projection profile understood by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Mercator,
    Geodetic,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Mercator => "mercator",
            Profile::Geodetic => "geodetic",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive zoom range with `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomRange {
    min: u8,
    max: u8,
}

impl ZoomRange {
    pub fn new(min: u8, max: u8) -> Result<Self, SpawnerError> {
        if min > max {
            return Err(SpawnerError::Configuration(format!(
                "zoom range minimum {min} exceeds maximum {max}"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> u8 {
        self.min
    }

    pub fn max(&self) -> u8 {
        self.max
    }

    /// Token handed to the worker: the bare level when the range is a single
    /// zoom, `min-max` otherwise.
    pub fn arg_token(&self) -> String {
        if self.min == self.max {
            self.min.to_string()
        } else {
            format!("{}-{}", self.min, self.max)
        }
    }
}

impl FromStr for ZoomRange {
    type Err = SpawnerError;

    /// Accepts `"15"` or `"15-22"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = |s: &str| SpawnerError::Configuration(format!("malformed zoom range '{s}'"));
        let s = s.trim();
        if s.is_empty() {
            return Err(bad(s));
        }
        match s.split_once('-') {
            None => {
                let level: u8 = s.parse().map_err(|_| bad(s))?;
                ZoomRange::new(level, level)
            }
            Some((lo, hi)) => {
                let min: u8 = lo.trim().parse().map_err(|_| bad(s))?;
                let max: u8 = hi.trim().parse().map_err(|_| bad(s))?;
                ZoomRange::new(min, max).map_err(|_| bad(s))
            }
        }
    }
}

impl fmt::Display for ZoomRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.arg_token())
    }
}

/// How to invoke the worker. The defaults match the gdal2tiles fork this tool
/// was built around; both pieces are overridable for other builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub interpreter: String,
    pub binary: String,
}

impl Default for WorkerCommand {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            binary: "gdal2tiles_mp.py".to_string(),
        }
    }
}

/// One request to tile a single input image through the external worker.
#[derive(Debug, Clone)]
pub struct TilingJob {
    pub job_id: String,
    pub input: PathBuf,
    pub profile: Profile,
    pub zoom: ZoomRange,
    /// Alpha-layer specification, forwarded verbatim.
    pub alpha: String,
    /// Bound on the exit wait after the worker stops writing.
    pub timeout: Duration,
    pub output: Option<PathBuf>,
    pub worker: WorkerCommand,
}

impl TilingJob {
    /// Build the full argument vector, interpreter first, in the fixed order
    /// the worker expects. Rejects jobs with empty required fields.
    pub fn argv(&self) -> Result<Vec<String>, SpawnerError> {
        if self.job_id.is_empty() {
            return Err(SpawnerError::Configuration("job id is empty".to_string()));
        }
        if self.alpha.is_empty() {
            return Err(SpawnerError::Configuration(
                "alpha specification is empty".to_string(),
            ));
        }
        if self.input.as_os_str().is_empty() {
            return Err(SpawnerError::Configuration(
                "input path is empty".to_string(),
            ));
        }

        let mut argv = vec![
            self.worker.interpreter.clone(),
            self.worker.binary.clone(),
            format!("--profile={}", self.profile),
            "-a".to_string(),
            self.alpha.clone(),
            "--zoom".to_string(),
            self.zoom.arg_token(),
            "-w".to_string(),
            "none".to_string(),
            self.input.to_string_lossy().into_owned(),
        ];
        if let Some(output) = &self.output {
            argv.push(output.to_string_lossy().into_owned());
        }
        Ok(argv)
    }
}

impl fmt::Display for TilingJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TilingJob(job_id={}, input={})",
            self.job_id,
            self.input.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> TilingJob {
        TilingJob {
            job_id: "layer-7".to_string(),
            input: PathBuf::from("/maps/field.tif"),
            profile: Profile::Mercator,
            zoom: "15-22".parse().unwrap(),
            alpha: "0,0,0".to_string(),
            timeout: Duration::from_secs(1800),
            output: None,
            worker: WorkerCommand::default(),
        }
    }

    #[test]
    fn test_zoom_range_parses_pair_and_single() {
        let range: ZoomRange = "15-22".parse().unwrap();
        assert_eq!((range.min(), range.max()), (15, 22));
        let single: ZoomRange = "15".parse().unwrap();
        assert_eq!((single.min(), single.max()), (15, 15));
    }

    #[test]
    fn test_zoom_range_rejects_garbage() {
        for bad in ["", "abc", "22-15", "1-2-3", "-5", "15-"] {
            assert!(
                bad.parse::<ZoomRange>().is_err(),
                "'{bad}' should not parse"
            );
        }
    }

    #[test]
    fn test_argv_follows_worker_grammar() {
        let argv = job().argv().unwrap();
        assert_eq!(
            argv,
            vec![
                "python3",
                "gdal2tiles_mp.py",
                "--profile=mercator",
                "-a",
                "0,0,0",
                "--zoom",
                "15-22",
                "-w",
                "none",
                "/maps/field.tif",
            ]
        );
    }

    #[test]
    fn test_argv_zoom_collapses_degenerate_range() {
        let mut j = job();
        j.zoom = "15".parse().unwrap();
        let argv = j.argv().unwrap();
        let at = argv.iter().position(|a| a == "--zoom").unwrap();
        assert_eq!(argv[at + 1], "15");
    }

    #[test]
    fn test_argv_appends_optional_output() {
        let mut j = job();
        j.output = Some(PathBuf::from("/tiles/out"));
        j.profile = Profile::Geodetic;
        let argv = j.argv().unwrap();
        assert_eq!(argv.last().unwrap(), "/tiles/out");
        assert!(argv.contains(&"--profile=geodetic".to_string()));
    }

    #[test]
    fn test_argv_rejects_empty_required_fields() {
        let mut j = job();
        j.alpha = String::new();
        assert!(matches!(j.argv(), Err(SpawnerError::Configuration(_))));

        let mut j = job();
        j.job_id = String::new();
        assert!(matches!(j.argv(), Err(SpawnerError::Configuration(_))));
    }
}
