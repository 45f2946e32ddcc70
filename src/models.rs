use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One FDA-reported drug shortage. Immutable after ingestion.
#[derive(Debug, Clone)]
pub struct ShortageRecord {
    pub id: Uuid,
    pub generic_name: String,
    pub proprietary_name: Option<String>,
    pub ndc: Option<String>,
    pub company_name: String,
    pub therapeutic_category: Option<String>,
    pub status: String,
    pub shortage_reason: Option<String>,
    pub initial_posting_date: NaiveDate,
    pub update_date: Option<NaiveDate>,
}

impl ShortageRecord {
    /// The one status rule for "active": a shortage still affecting supply.
    /// Every aggregation that counts active shortages goes through here.
    pub fn is_active(&self) -> bool {
        self.status == "Current" || self.status == "To Be Discontinued"
    }
}

/// One FDA recall/enforcement action. Immutable after ingestion.
#[derive(Debug, Clone)]
pub struct EnforcementRecord {
    pub id: Uuid,
    pub recalling_firm: String,
    pub product_description: String,
    pub classification: Classification,
    pub status: String,
    pub state: Option<String>,
    pub reason_for_recall: Option<String>,
    pub recall_initiation_date: NaiveDate,
}

impl EnforcementRecord {
    pub fn is_ongoing(&self) -> bool {
        self.status == "Ongoing"
    }
}

/// FDA recall severity ordinal. Class I is the most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "Class I")]
    ClassI,
    #[serde(rename = "Class II")]
    ClassII,
    #[serde(rename = "Class III")]
    ClassIII,
    #[serde(rename = "Class IV")]
    ClassIV,
}

impl Classification {
    /// Ordered most to least severe; severity charts emit all four.
    pub const ALL: [Classification; 4] = [
        Classification::ClassI,
        Classification::ClassII,
        Classification::ClassIII,
        Classification::ClassIV,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Classification::ClassI => "Class I",
            Classification::ClassII => "Class II",
            Classification::ClassIII => "Class III",
            Classification::ClassIV => "Class IV",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Classification {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Class I" => Ok(Classification::ClassI),
            "Class II" => Ok(Classification::ClassII),
            "Class III" => Ok(Classification::ClassIII),
            "Class IV" => Ok(Classification::ClassIV),
            other => Err(anyhow::anyhow!(
                "unrecognized recall classification {other:?}; expected Class I through Class IV"
            )),
        }
    }
}

/// Three-level risk band derived from the numeric risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::High => "High",
            RiskLevel::Medium => "Medium",
            RiskLevel::Low => "Low",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RiskLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "High" | "high" => Ok(RiskLevel::High),
            "Medium" | "medium" => Ok(RiskLevel::Medium),
            "Low" | "low" => Ok(RiskLevel::Low),
            other => Err(anyhow::anyhow!(
                "unrecognized risk level {other:?}; expected High, Medium, or Low"
            )),
        }
    }
}
