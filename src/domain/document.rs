//! Document types and their structural invariants
//!
//! Every document received by Harbor is tagged with a [`DocumentType`]. The
//! tag selects the receiving partition the payload lands in, the structural
//! invariant checked at insert, and the transform that processes it later.
//! The semantic fields of a payload stay opaque to the core.

use super::errors::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Top-level JSON shape a document type requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentShape {
    /// A JSON object (`{...}`)
    Object,
    /// A JSON array (`[...]`)
    Array,
    /// Any well-formed JSON value
    Any,
}

impl DocumentShape {
    /// Name used in validation messages
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentShape::Object => "object",
            DocumentShape::Array => "array",
            DocumentShape::Any => "value",
        }
    }
}

/// Kind of received document
///
/// # Examples
///
/// ```
/// use harbor::domain::document::{DocumentShape, DocumentType};
/// use std::str::FromStr;
///
/// let fhir = DocumentType::from_str("fhir").unwrap();
/// assert_eq!(fhir.partition(), "fhir");
/// assert_eq!(fhir.shape(), DocumentShape::Object);
///
/// let det = DocumentType::from_str("redcap-det").unwrap();
/// assert_eq!(det.partition(), "redcap_det");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentType {
    /// Participant enrollment forms
    Enrollment,
    /// Presence/absence lab results
    PresenceAbsence,
    /// FHIR bundles
    Fhir,
    /// Clinical spreadsheet rows
    Clinical,
    /// Sequence-read set manifests
    SequenceReadSet,
    /// Assembled consensus genomes and summary statistics
    ConsensusGenome,
    /// REDCap data entry trigger notifications
    RedcapDet,
    /// Sample manifest rows
    Manifest,
    /// Longitudinal study records
    Longitudinal,
    /// At-home test kit records
    Kit,
}

impl DocumentType {
    /// All document types, in partition order
    pub const ALL: [DocumentType; 10] = [
        DocumentType::Enrollment,
        DocumentType::PresenceAbsence,
        DocumentType::Fhir,
        DocumentType::Clinical,
        DocumentType::SequenceReadSet,
        DocumentType::ConsensusGenome,
        DocumentType::RedcapDet,
        DocumentType::Manifest,
        DocumentType::Longitudinal,
        DocumentType::Kit,
    ];

    /// Wire name (kebab-case) used on the command line and in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Enrollment => "enrollment",
            DocumentType::PresenceAbsence => "presence-absence",
            DocumentType::Fhir => "fhir",
            DocumentType::Clinical => "clinical",
            DocumentType::SequenceReadSet => "sequence-read-set",
            DocumentType::ConsensusGenome => "consensus-genome",
            DocumentType::RedcapDet => "redcap-det",
            DocumentType::Manifest => "manifest",
            DocumentType::Longitudinal => "longitudinal",
            DocumentType::Kit => "kit",
        }
    }

    /// Storage partition name (snake_case), used as the receiving table name
    pub fn partition(&self) -> &'static str {
        match self {
            DocumentType::Enrollment => "enrollment",
            DocumentType::PresenceAbsence => "presence_absence",
            DocumentType::Fhir => "fhir",
            DocumentType::Clinical => "clinical",
            DocumentType::SequenceReadSet => "sequence_read_set",
            DocumentType::ConsensusGenome => "consensus_genome",
            DocumentType::RedcapDet => "redcap_det",
            DocumentType::Manifest => "manifest",
            DocumentType::Longitudinal => "longitudinal",
            DocumentType::Kit => "kit",
        }
    }

    /// Structural invariant enforced when a payload is appended
    pub fn shape(&self) -> DocumentShape {
        // Every partition currently receives JSON objects; arrays of results
        // are split into one record per element by the producers.
        DocumentShape::Object
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownDocumentType(s.to_string()))
    }
}
