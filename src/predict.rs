use std::collections::HashMap;

use serde::Serialize;

use crate::artifact::ModelArtifact;
use crate::filters::RecordFilter;
use crate::models::{EnforcementRecord, RiskLevel, ShortageRecord};
use crate::risk::{self, ScoreScale};

/// Single action threshold over shortage_probability. At or above it the
/// dashboard advises closer monitoring; below it, normal handling. Kept equal
/// to the High band threshold so the advice and the band never disagree.
pub const ACTION_THRESHOLD: f64 = risk::HIGH_THRESHOLD;

pub const MONITOR_CLOSELY: &str = "Monitor Closely";
pub const NORMAL: &str = "Normal";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionEntry {
    pub drug_name: String,
    pub company_name: String,
    pub shortage_probability: f64,
    pub risk_level: RiskLevel,
    pub recommended_action: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskLevelCount {
    pub risk_level: RiskLevel,
    pub count: u64,
}

pub fn recommended_action(probability: f64) -> &'static str {
    if probability >= ACTION_THRESHOLD {
        MONITOR_CLOSELY
    } else {
        NORMAL
    }
}

/// Materializes the prediction list: one entry per distinct drug, probability
/// taken from the trained-model artifact when it has a score for the drug,
/// otherwise derived from the drug's own shortage count and its company's
/// enforcement count via the risk scorer. Sorted descending by probability,
/// ties broken by drug name ascending; truncated to `limit` after the full
/// sort.
pub fn predict(
    shortages: &[ShortageRecord],
    enforcements: &[EnforcementRecord],
    artifact: Option<&ModelArtifact>,
    filter: &RecordFilter,
    limit: usize,
) -> Vec<PredictionEntry> {
    let mut entries = materialize(shortages, enforcements, artifact);

    entries.retain(|entry| {
        filter.matches_company(&entry.company_name) && filter.matches_risk_level(entry.risk_level)
    });

    sort_entries(&mut entries);
    entries.truncate(limit);
    entries
}

/// Case-insensitive drug lookup: an exact name match wins; failing that, the
/// best substring match. Among duplicates the entry ranked first in the
/// probability-descending order is returned.
pub fn search_drug(
    shortages: &[ShortageRecord],
    enforcements: &[EnforcementRecord],
    artifact: Option<&ModelArtifact>,
    drug_name: &str,
) -> Option<PredictionEntry> {
    let wanted = drug_name.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }

    let mut entries = materialize(shortages, enforcements, artifact);
    sort_entries(&mut entries);

    entries
        .iter()
        .find(|entry| entry.drug_name.to_lowercase() == wanted)
        .or_else(|| {
            entries
                .iter()
                .find(|entry| entry.drug_name.to_lowercase().contains(&wanted))
        })
        .cloned()
}

/// Counts materialized predictions per risk band. All three bands are always
/// present so the distribution chart keeps its shape.
pub fn risk_distribution(entries: &[PredictionEntry]) -> Vec<RiskLevelCount> {
    [RiskLevel::High, RiskLevel::Medium, RiskLevel::Low]
        .into_iter()
        .map(|risk_level| RiskLevelCount {
            risk_level,
            count: entries.iter().filter(|e| e.risk_level == risk_level).count() as u64,
        })
        .collect()
}

fn sort_entries(entries: &mut [PredictionEntry]) {
    entries.sort_by(|a, b| {
        b.shortage_probability
            .partial_cmp(&a.shortage_probability)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.drug_name.cmp(&b.drug_name))
    });
}

fn materialize(
    shortages: &[ShortageRecord],
    enforcements: &[EnforcementRecord],
    artifact: Option<&ModelArtifact>,
) -> Vec<PredictionEntry> {
    struct DrugAcc {
        company: String,
        shortage_count: u64,
    }

    // First observed company labels the drug, matching the dashboard table.
    let mut drugs: HashMap<String, DrugAcc> = HashMap::new();
    for record in shortages {
        drugs
            .entry(record.generic_name.clone())
            .and_modify(|acc| acc.shortage_count += 1)
            .or_insert(DrugAcc {
                company: record.company_name.clone(),
                shortage_count: 1,
            });
    }

    let mut company_enforcements: HashMap<String, u64> = HashMap::new();
    for record in enforcements {
        *company_enforcements
            .entry(record.recalling_firm.clone())
            .or_insert(0) += 1;
    }

    let scale = ScoreScale::from_counts(drugs.values().map(|acc| {
        (
            acc.shortage_count,
            company_enforcements.get(&acc.company).copied().unwrap_or(0),
        )
    }));

    drugs
        .into_iter()
        .map(|(drug_name, acc)| {
            let enforcement_count = company_enforcements
                .get(&acc.company)
                .copied()
                .unwrap_or(0);
            let probability = artifact
                .and_then(|a| a.probability_for(&drug_name))
                .unwrap_or_else(|| {
                    risk::score(acc.shortage_count, enforcement_count, &scale).score
                });
            PredictionEntry {
                drug_name,
                company_name: acc.company,
                shortage_probability: probability,
                risk_level: risk::band(probability),
                recommended_action: recommended_action(probability),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::{enforcement, shortage};
    use crate::artifact::DrugScore;
    use crate::models::Classification;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn artifact_with(scores: Vec<(&str, f64)>) -> ModelArtifact {
        ModelArtifact {
            drug_scores: scores
                .into_iter()
                .map(|(name, p)| DrugScore {
                    drug_name: name.to_string(),
                    shortage_probability: p,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn artifact_probability_takes_precedence() {
        let shortages = vec![shortage("Amoxicillin", "Acme", None, "Current", None, day(2026, 1, 1))];
        let artifact = artifact_with(vec![("Amoxicillin", 0.82)]);

        let entries = predict(&shortages, &[], Some(&artifact), &RecordFilter::default(), 10);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].shortage_probability, 0.82);
        assert_eq!(entries[0].risk_level, RiskLevel::High);
        assert_eq!(entries[0].recommended_action, MONITOR_CLOSELY);
    }

    #[test]
    fn missing_artifact_score_falls_back_to_count_derived() {
        let shortages = vec![
            shortage("Amoxicillin", "Acme", None, "Current", None, day(2026, 1, 1)),
            shortage("Amoxicillin", "Acme", None, "Current", None, day(2026, 1, 2)),
            shortage("Ibuprofen", "Apex", None, "Current", None, day(2026, 1, 3)),
        ];
        let artifact = artifact_with(vec![("Ibuprofen", 0.2)]);

        let entries = predict(&shortages, &[], Some(&artifact), &RecordFilter::default(), 10);
        let amox = entries.iter().find(|e| e.drug_name == "Amoxicillin").unwrap();
        // Amoxicillin holds the shortage maximum: 0.7 * 1.0 = 0.7.
        assert!((amox.shortage_probability - 0.7).abs() < 1e-9);
        assert_eq!(amox.risk_level, RiskLevel::High);
    }

    #[test]
    fn entries_sorted_by_probability_then_name() {
        let shortages = vec![
            shortage("Zeta", "Acme", None, "Current", None, day(2026, 1, 1)),
            shortage("Alpha", "Apex", None, "Current", None, day(2026, 1, 2)),
            shortage("Mu", "Mori", None, "Current", None, day(2026, 1, 3)),
        ];
        let artifact = artifact_with(vec![("Zeta", 0.5), ("Alpha", 0.5), ("Mu", 0.9)]);

        let entries = predict(&shortages, &[], Some(&artifact), &RecordFilter::default(), 10);
        let names: Vec<&str> = entries.iter().map(|e| e.drug_name.as_str()).collect();
        assert_eq!(names, vec!["Mu", "Alpha", "Zeta"]);
    }

    #[test]
    fn limit_truncates_after_full_sort() {
        let shortages = vec![
            shortage("Low", "Acme", None, "Current", None, day(2026, 1, 1)),
            shortage("High", "Apex", None, "Current", None, day(2026, 1, 2)),
        ];
        let artifact = artifact_with(vec![("Low", 0.1), ("High", 0.9)]);

        let entries = predict(&shortages, &[], Some(&artifact), &RecordFilter::default(), 1);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].drug_name, "High");
    }

    #[test]
    fn company_and_risk_filters_compose() {
        let shortages = vec![
            shortage("Alpha", "Acme Pharma", None, "Current", None, day(2026, 1, 1)),
            shortage("Beta", "Zenith", None, "Current", None, day(2026, 1, 2)),
        ];
        let artifact = artifact_with(vec![("Alpha", 0.9), ("Beta", 0.9)]);
        let filter = RecordFilter {
            company: Some("acme".to_string()),
            risk_level: Some(RiskLevel::High),
            ..Default::default()
        };

        let entries = predict(&shortages, &[], Some(&artifact), &filter, 10);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].drug_name, "Alpha");
    }

    #[test]
    fn search_matches_case_insensitively() {
        let shortages = vec![shortage("Amoxicillin", "Acme", None, "Current", None, day(2026, 1, 1))];
        let artifact = artifact_with(vec![("Amoxicillin", 0.82)]);

        let found = search_drug(&shortages, &[], Some(&artifact), "amoxicillin").unwrap();
        assert_eq!(found.drug_name, "Amoxicillin");
        assert_eq!(found.risk_level, RiskLevel::High);
        assert_eq!(found.shortage_probability, 0.82);
    }

    #[test]
    fn search_prefers_exact_over_substring_match() {
        let shortages = vec![
            shortage("Amoxicillin", "Acme", None, "Current", None, day(2026, 1, 1)),
            shortage("Amoxicillin Sodium", "Apex", None, "Current", None, day(2026, 1, 2)),
        ];
        let artifact = artifact_with(vec![("Amoxicillin", 0.3), ("Amoxicillin Sodium", 0.9)]);

        let found = search_drug(&shortages, &[], Some(&artifact), "Amoxicillin").unwrap();
        assert_eq!(found.drug_name, "Amoxicillin");

        let partial = search_drug(&shortages, &[], Some(&artifact), "sodium").unwrap();
        assert_eq!(partial.drug_name, "Amoxicillin Sodium");
    }

    #[test]
    fn search_returns_none_for_unknown_or_empty_name() {
        let shortages = vec![shortage("Amoxicillin", "Acme", None, "Current", None, day(2026, 1, 1))];
        assert!(search_drug(&shortages, &[], None, "warfarin").is_none());
        assert!(search_drug(&shortages, &[], None, "   ").is_none());
    }

    #[test]
    fn fallback_uses_company_enforcement_history() {
        let shortages = vec![shortage("Alpha", "Acme", None, "Current", None, day(2026, 1, 1))];
        let enforcements = vec![enforcement(
            "Acme",
            Classification::ClassI,
            "Ongoing",
            None,
            day(2026, 1, 5),
        )];

        let entries = predict(&shortages, &enforcements, None, &RecordFilter::default(), 10);
        // Sole drug holds both maxima: 0.7 + 0.3 = 1.0.
        assert!((entries[0].shortage_probability - 1.0).abs() < 1e-9);
        assert_eq!(entries[0].recommended_action, MONITOR_CLOSELY);
    }

    #[test]
    fn distribution_always_reports_three_bands() {
        let entries = vec![PredictionEntry {
            drug_name: "Alpha".to_string(),
            company_name: "Acme".to_string(),
            shortage_probability: 0.9,
            risk_level: RiskLevel::High,
            recommended_action: MONITOR_CLOSELY,
        }];
        let distribution = risk_distribution(&entries);
        assert_eq!(distribution.len(), 3);
        assert_eq!(distribution[0].risk_level, RiskLevel::High);
        assert_eq!(distribution[0].count, 1);
        assert_eq!(distribution[1].count, 0);
        assert_eq!(distribution[2].count, 0);
    }

    #[test]
    fn action_threshold_boundary_monitors_closely() {
        assert_eq!(recommended_action(ACTION_THRESHOLD), MONITOR_CLOSELY);
        assert_eq!(recommended_action(ACTION_THRESHOLD - 1e-9), NORMAL);
    }
}
