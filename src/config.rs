use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Aggregation protocols under evaluation
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Protocol {
    /// Hierarchical aggregation
    #[serde(rename = "hi")]
    Hidera,
    /// Flow updating
    #[serde(rename = "fu")]
    FlowUpdating,
    /// Extrema propagation
    #[serde(rename = "ep")]
    ExtremaPropagation,
    /// Digest diffusion
    #[serde(rename = "dd")]
    DigestDiffusion,
    /// Randomized reports
    #[serde(rename = "rr")]
    RandReports,
}

impl Protocol {
    pub const ALL: [Protocol; 5] = [
        Protocol::Hidera,
        Protocol::FlowUpdating,
        Protocol::ExtremaPropagation,
        Protocol::DigestDiffusion,
        Protocol::RandReports,
    ];

    /// Short identifier used in directory and output file names
    pub fn id(&self) -> &'static str {
        match self {
            Protocol::Hidera => "hi",
            Protocol::FlowUpdating => "fu",
            Protocol::ExtremaPropagation => "ep",
            Protocol::DigestDiffusion => "dd",
            Protocol::RandReports => "rr",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Protocol::Hidera => "hidera",
            Protocol::FlowUpdating => "flow_updating",
            Protocol::ExtremaPropagation => "extrema_propagation",
            Protocol::DigestDiffusion => "digest_diffusion",
            Protocol::RandReports => "rand_reports",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for Protocol {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Protocol::ALL
            .into_iter()
            .find(|p| p.id() == s || p.display_name() == s)
            .ok_or_else(|| ValidationError::UnknownProtocol(s))
    }
}

/// Which event timeline decides node exclusions during aggregation
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionTimeline {
    /// Events of the protocol's reference run apply to every repetition
    #[default]
    Reference,
    /// Each repetition is filtered by its own events
    PerRepetition,
}

/// On-disk naming of experiment inputs
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Run directory name template, `{experiment}` and `{protocol}` are substituted
    pub run_dir: String,
    pub repetition_prefix: String,
    pub node_prefix: String,
    pub metadata_file: String,
    pub value_file: String,
    pub msg_count_file: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            run_dir: "{experiment}_{protocol}".to_string(),
            repetition_prefix: "exp_".to_string(),
            node_prefix: "node_".to_string(),
            metadata_file: "metadata.json".to_string(),
            value_file: "value.csv".to_string(),
            msg_count_file: "msg_count.csv".to_string(),
        }
    }
}

pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

fn default_protocols() -> Vec<Protocol> {
    Protocol::ALL.to_vec()
}

fn default_timestamp_divisor() -> i64 {
    NANOS_PER_SECOND
}

/// Analysis configuration, passed explicitly into the pipeline entry point
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// Experiment name shared by every protocol run directory
    pub experiment: String,
    /// Directory holding the per-protocol run directories
    pub base_dir: PathBuf,
    /// Where derived series are written, `<base_dir>/<experiment>_analyzed` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(default = "default_protocols")]
    pub protocols: Vec<Protocol>,
    #[serde(default)]
    pub layout: LayoutConfig,
    /// Raw timestamp units per second
    #[serde(default = "default_timestamp_divisor")]
    pub timestamp_divisor: i64,
    #[serde(default)]
    pub exclusion_timeline: ExclusionTimeline,
    /// Abort when protocols disagree on the event timeline instead of warning
    #[serde(default)]
    pub strict_timeline: bool,
    /// Worker threads, 0 lets rayon decide
    #[serde(default)]
    pub threads: usize,
}

impl AnalysisConfig {
    pub fn new(experiment: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            experiment: experiment.into(),
            base_dir: base_dir.into(),
            output_dir: None,
            protocols: default_protocols(),
            layout: LayoutConfig::default(),
            timestamp_divisor: default_timestamp_divisor(),
            exclusion_timeline: ExclusionTimeline::default(),
            strict_timeline: false,
            threads: 0,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.experiment.trim().is_empty() {
            return Err(ValidationError::InvalidGeneral(
                "experiment name cannot be empty".to_string(),
            ));
        }
        if self.base_dir.as_os_str().is_empty() {
            return Err(ValidationError::InvalidGeneral(
                "base_dir cannot be empty".to_string(),
            ));
        }
        if self.timestamp_divisor <= 0 {
            return Err(ValidationError::InvalidGeneral(format!(
                "timestamp_divisor must be positive, got {}",
                self.timestamp_divisor
            )));
        }

        if self.protocols.is_empty() {
            return Err(ValidationError::InvalidProtocols(
                "at least one protocol must be selected".to_string(),
            ));
        }
        for (i, protocol) in self.protocols.iter().enumerate() {
            if self.protocols[..i].contains(protocol) {
                return Err(ValidationError::InvalidProtocols(format!(
                    "protocol {} listed more than once",
                    protocol
                )));
            }
        }

        self.validate_layout()
    }

    fn validate_layout(&self) -> Result<(), ValidationError> {
        let layout = &self.layout;
        if !layout.run_dir.contains("{protocol}") {
            return Err(ValidationError::InvalidLayout(format!(
                "run_dir '{}' must contain the {{protocol}} placeholder",
                layout.run_dir
            )));
        }

        let required = [
            ("repetition_prefix", &layout.repetition_prefix),
            ("node_prefix", &layout.node_prefix),
            ("metadata_file", &layout.metadata_file),
            ("value_file", &layout.value_file),
            ("msg_count_file", &layout.msg_count_file),
        ];
        for (field, value) in required {
            if value.is_empty() {
                return Err(ValidationError::InvalidLayout(format!(
                    "{} cannot be empty",
                    field
                )));
            }
        }

        Ok(())
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| {
            self.base_dir
                .join(format!("{}_analyzed", self.experiment))
        })
    }

    /// Directory holding every repetition of one protocol run
    pub fn run_dir(&self, protocol: Protocol) -> PathBuf {
        let name = self
            .layout
            .run_dir
            .replace("{experiment}", &self.experiment)
            .replace("{protocol}", protocol.id());
        self.base_dir.join(name)
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid protocol selection: {0}")]
    InvalidProtocols(String),
    #[error("Unknown protocol: {0}")]
    UnknownProtocol(String),
    #[error("Invalid input layout: {0}")]
    InvalidLayout(String),
    #[error("Invalid job plan: {0}")]
    InvalidPlan(String),
}
