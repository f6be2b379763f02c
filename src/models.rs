//! Core data models for protgraph
//!
//! These value types flow through every stage of the graph pipeline:
//! the adapter produces them, the assembler deduplicates them and the
//! merger reads them back when decorating the layout output.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A protein or functional term in the association graph.
///
/// Identity is `id` (the external id). Statistical fields are only set for
/// term nodes that went through enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fdr_rate: Option<f64>,
}

impl Node {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            category: String::new(),
            description: None,
            p_value: None,
            fdr_rate: None,
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_statistics(mut self, p_value: f64, fdr_rate: f64) -> Self {
        self.p_value = Some(p_value);
        self.fdr_rate = Some(fdr_rate);
        self
    }
}

/// An association as it comes out of the query layer, before score
/// normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRow {
    pub source: String,
    pub target: String,
    pub raw_score: f64,
}

impl EdgeRow {
    pub fn new(source: &str, target: &str, raw_score: f64) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            raw_score,
        }
    }
}

/// An assembled edge with its normalized integer score.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub score: i64,
}

impl Edge {
    pub fn new(source: &str, target: &str, score: i64) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            score,
        }
    }

    /// Order-independent identity of the endpoint pair.
    pub fn key(&self) -> (&str, &str) {
        if self.source <= self.target {
            (self.source.as_str(), self.target.as_str())
        } else {
            (self.target.as_str(), self.source.as_str())
        }
    }
}

/// Enrichment statistics for a term, keyed by the term's external id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermMetadata {
    pub id: String,
    #[serde(default)]
    pub p_value: f64,
    #[serde(default)]
    pub fdr_rate: f64,
}

/// How raw association scores map onto the integer scale shipped to the
/// layout engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScorePolicy {
    /// Combined association score, already an integer in [0, 1000].
    #[default]
    Association,
    /// Kappa overlap in [-1, 1], rounded to two decimals and scaled to
    /// [-100, 100].
    Kappa,
}

impl ScorePolicy {
    /// Integer score for `raw`, clamped to the policy's range. Non-finite
    /// input maps to 0.
    pub fn normalize(&self, raw: f64) -> i64 {
        if !raw.is_finite() {
            debug!("Non-finite {:?} score {}; using 0", self, raw);
            return 0;
        }
        let (min, max) = self.range();
        let score = match self {
            ScorePolicy::Association => raw.trunc() as i64,
            ScorePolicy::Kappa => kappa_to_int(raw),
        };
        if score < min || score > max {
            debug!("{:?} score {} outside [{}, {}]; clamping", self, raw, min, max);
        }
        score.clamp(min, max)
    }

    /// Inclusive integer range of normalized scores.
    pub fn range(&self) -> (i64, i64) {
        match self {
            ScorePolicy::Association => (0, 1000),
            ScorePolicy::Kappa => (-100, 100),
        }
    }
}

impl std::str::FromStr for ScorePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "association" => Ok(ScorePolicy::Association),
            "kappa" => Ok(ScorePolicy::Kappa),
            other => Err(format!("unknown score policy '{}'", other)),
        }
    }
}

/// Decimal round-half-even to two places, then scale by 100 and truncate.
///
/// The tie check uses the exact product (via `mul_add`) so values such as
/// 0.015, whose binary form sits just below the tie, round down.
fn kappa_to_int(kappa: f64) -> i64 {
    let scaled = kappa * 100.0;
    let residual = kappa.mul_add(100.0, -scaled);
    let hundredths = if (scaled - scaled.trunc()).abs() == 0.5 && residual != 0.0 {
        if residual > 0.0 {
            scaled.ceil()
        } else {
            scaled.floor()
        }
    } else {
        scaled.round_ties_even()
    };
    let rounded = hundredths / 100.0;
    (rounded * 100.0).trunc() as i64
}

/// How nodes outside the principal component are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderingMode {
    /// Recolor only (association views).
    #[default]
    Dim,
    /// Recolor and mark hidden (term-overlap views).
    Hide,
}

impl std::str::FromStr for RenderingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dim" => Ok(RenderingMode::Dim),
            "hide" => Ok(RenderingMode::Hide),
            other => Err(format!("unknown rendering mode '{}'", other)),
        }
    }
}
