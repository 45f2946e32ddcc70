use chrono::NaiveDate;

use crate::models::RiskLevel;

/// Filter set shared by the aggregation and prediction layers. All clauses
/// compose conjunctively; an empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    /// Case-insensitive substring match on the company name.
    pub company: Option<String>,
    /// Exact match against the scored risk band of the entity.
    pub risk_level: Option<RiskLevel>,
    /// Inclusive date range on the record's primary date.
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl RecordFilter {
    pub fn matches_company(&self, name: &str) -> bool {
        match &self.company {
            Some(needle) => name.to_lowercase().contains(&needle.to_lowercase()),
            None => true,
        }
    }

    pub fn matches_date(&self, date: NaiveDate) -> bool {
        if let Some(from) = self.from {
            if date < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if date > to {
                return false;
            }
        }
        true
    }

    pub fn matches_risk_level(&self, level: RiskLevel) -> bool {
        match self.risk_level {
            Some(wanted) => wanted == level,
            None => true,
        }
    }
}
