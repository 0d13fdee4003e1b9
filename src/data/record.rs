//! Typed patient records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Patient sex as recorded in the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Male" => Ok(Gender::Male),
            "Female" => Ok(Gender::Female),
            "Other" => Ok(Gender::Other),
            other => Err(format!("unknown gender '{}'", other)),
        }
    }
}

/// Employment category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WorkType {
    Private,
    SelfEmployed,
    GovtJob,
    Children,
    NeverWorked,
}

impl WorkType {
    /// Raw label used in the source file
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkType::Private => "Private",
            WorkType::SelfEmployed => "Self-employed",
            WorkType::GovtJob => "Govt_job",
            WorkType::Children => "children",
            WorkType::NeverWorked => "Never_worked",
        }
    }

    /// Label used when naming dummy columns
    pub fn feature_label(&self) -> &'static str {
        match self {
            WorkType::SelfEmployed => "Self_employed",
            other => other.as_str(),
        }
    }
}

impl FromStr for WorkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Private" => Ok(WorkType::Private),
            "Self-employed" => Ok(WorkType::SelfEmployed),
            "Govt_job" => Ok(WorkType::GovtJob),
            "children" => Ok(WorkType::Children),
            "Never_worked" => Ok(WorkType::NeverWorked),
            other => Err(format!("unknown work type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResidenceType {
    Urban,
    Rural,
}

impl ResidenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResidenceType::Urban => "Urban",
            ResidenceType::Rural => "Rural",
        }
    }
}

impl FromStr for ResidenceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Urban" => Ok(ResidenceType::Urban),
            "Rural" => Ok(ResidenceType::Rural),
            other => Err(format!("unknown residence type '{}'", other)),
        }
    }
}

/// Known smoking history. The raw label `Unknown` maps to `None` on the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SmokingStatus {
    FormerlySmoked,
    NeverSmoked,
    Smokes,
}

impl SmokingStatus {
    pub const ALL: [SmokingStatus; 3] = [
        SmokingStatus::FormerlySmoked,
        SmokingStatus::NeverSmoked,
        SmokingStatus::Smokes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SmokingStatus::FormerlySmoked => "formerly smoked",
            SmokingStatus::NeverSmoked => "never smoked",
            SmokingStatus::Smokes => "smokes",
        }
    }

    pub fn feature_label(&self) -> &'static str {
        match self {
            SmokingStatus::FormerlySmoked => "formerly_smoked",
            SmokingStatus::NeverSmoked => "never_smoked",
            SmokingStatus::Smokes => "smokes",
        }
    }

    /// Ordinal code used inside the imputation matrix
    pub fn code(&self) -> f64 {
        match self {
            SmokingStatus::FormerlySmoked => 0.0,
            SmokingStatus::NeverSmoked => 1.0,
            SmokingStatus::Smokes => 2.0,
        }
    }

    pub fn from_code(code: f64) -> Option<Self> {
        match code.round() as i64 {
            0 => Some(SmokingStatus::FormerlySmoked),
            1 => Some(SmokingStatus::NeverSmoked),
            2 => Some(SmokingStatus::Smokes),
            _ => None,
        }
    }

    /// Parse a raw label. `Ok(None)` means the value was recorded as unknown.
    pub fn parse_label(s: &str) -> Result<Option<Self>, String> {
        match s.trim() {
            "formerly smoked" => Ok(Some(SmokingStatus::FormerlySmoked)),
            "never smoked" => Ok(Some(SmokingStatus::NeverSmoked)),
            "smokes" => Ok(Some(SmokingStatus::Smokes)),
            "Unknown" => Ok(None),
            other => Err(format!("unknown smoking status '{}'", other)),
        }
    }
}

impl fmt::Display for SmokingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Annotations attached during loading and cleaning.
///
/// The missingness flags are set once at load time and survive imputation,
/// since they feed the model as features.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFlags {
    pub bmi_was_missing: bool,
    pub smoking_was_missing: bool,
    pub extreme_glucose: bool,
    pub extreme_bmi: bool,
}

/// A single patient row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: i64,
    pub gender: Gender,
    pub age: f64,
    pub hypertension: bool,
    pub heart_disease: bool,
    pub ever_married: bool,
    pub work_type: WorkType,
    pub residence: ResidenceType,
    pub avg_glucose_level: f64,
    pub bmi: Option<f64>,
    pub smoking_status: Option<SmokingStatus>,
    pub stroke: bool,
    pub flags: RecordFlags,
}

impl PatientRecord {
    /// Whether both nullable fields hold a value
    pub fn is_complete(&self) -> bool {
        self.bmi.is_some() && self.smoking_status.is_some()
    }
}
