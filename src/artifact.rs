use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// The dashboard shows at most this many features, however many the
/// training run recorded.
pub const FEATURE_IMPORTANCE_LIMIT: usize = 15;

/// Output of the offline training pipeline, serialized as JSON. The server
/// loads it once at startup; everything in it is precomputed and read-only.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ModelArtifact {
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub drug_scores: Vec<DrugScore>,
    #[serde(default)]
    pub model_performance: BTreeMap<String, ModelPerformance>,
    #[serde(default)]
    pub feature_importance: Vec<FeatureImportance>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DrugScore {
    pub drug_name: String,
    pub shortage_probability: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelPerformance {
    pub auc_score: f64,
    /// 2x2 confusion matrix, rows = actual, columns = predicted.
    pub confusion_matrix: [[u64; 2]; 2],
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

impl ModelArtifact {
    pub fn load(path: &Path) -> anyhow::Result<ModelArtifact> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read model artifact {}", path.display()))?;
        let artifact: ModelArtifact = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse model artifact {}", path.display()))?;
        for score in &artifact.drug_scores {
            if !(0.0..=1.0).contains(&score.shortage_probability) {
                anyhow::bail!(
                    "model artifact probability for {:?} is {} (outside [0, 1])",
                    score.drug_name,
                    score.shortage_probability
                );
            }
        }
        Ok(artifact)
    }

    /// Case-insensitive lookup of a stored probability. First entry wins when
    /// the artifact holds duplicates.
    pub fn probability_for(&self, drug_name: &str) -> Option<f64> {
        let wanted = drug_name.to_lowercase();
        self.drug_scores
            .iter()
            .find(|score| score.drug_name.to_lowercase() == wanted)
            .map(|score| score.shortage_probability)
    }

    /// Feature importances in stored order, capped at
    /// [`FEATURE_IMPORTANCE_LIMIT`].
    pub fn top_features(&self) -> &[FeatureImportance] {
        let end = self.feature_importance.len().min(FEATURE_IMPORTANCE_LIMIT);
        &self.feature_importance[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_artifact() {
        let raw = r#"{
            "generated_at": "2026-03-01T00:00:00Z",
            "drug_scores": [
                {"drug_name": "Amoxicillin", "shortage_probability": 0.82}
            ],
            "model_performance": {
                "random_forest": {"auc_score": 0.91, "confusion_matrix": [[40, 3], [5, 22]]}
            },
            "feature_importance": [
                {"feature": "historical_shortage_count", "importance": 0.34}
            ]
        }"#;
        let artifact: ModelArtifact = serde_json::from_str(raw).unwrap();
        assert_eq!(artifact.drug_scores.len(), 1);
        assert_eq!(artifact.model_performance["random_forest"].auc_score, 0.91);
        assert_eq!(artifact.feature_importance[0].feature, "historical_shortage_count");
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let artifact: ModelArtifact = serde_json::from_str("{}").unwrap();
        assert!(artifact.drug_scores.is_empty());
        assert!(artifact.model_performance.is_empty());
        assert!(artifact.feature_importance.is_empty());
    }

    #[test]
    fn probability_lookup_is_case_insensitive() {
        let artifact = ModelArtifact {
            drug_scores: vec![DrugScore {
                drug_name: "Amoxicillin".to_string(),
                shortage_probability: 0.82,
            }],
            ..Default::default()
        };
        assert_eq!(artifact.probability_for("amoxicillin"), Some(0.82));
        assert_eq!(artifact.probability_for("AMOXICILLIN"), Some(0.82));
        assert_eq!(artifact.probability_for("ibuprofen"), None);
    }

    #[test]
    fn top_features_caps_at_limit_and_keeps_order() {
        let artifact = ModelArtifact {
            feature_importance: (0..20)
                .map(|i| FeatureImportance {
                    feature: format!("feature_{i}"),
                    importance: 1.0 - f64::from(i) / 20.0,
                })
                .collect(),
            ..Default::default()
        };
        let top = artifact.top_features();
        assert_eq!(top.len(), FEATURE_IMPORTANCE_LIMIT);
        assert_eq!(top[0].feature, "feature_0");
        assert_eq!(top[14].feature, "feature_14");

        let short = ModelArtifact {
            feature_importance: vec![FeatureImportance {
                feature: "historical_shortage_count".to_string(),
                importance: 0.34,
            }],
            ..Default::default()
        };
        assert_eq!(short.top_features().len(), 1);
    }
}
