use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::filters::RecordFilter;
use crate::models::{Classification, EnforcementRecord, RiskLevel, ShortageRecord};
use crate::risk::{self, ScoreScale};

pub const DEFAULT_GEOGRAPHY_LIMIT: usize = 15;
pub const DEFAULT_ACTIVITY_WINDOW_DAYS: i64 = 90;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyBucket {
    pub month: String,
    pub shortage_count: u64,
    pub enforcement_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyBucket {
    pub company_name: String,
    pub shortage_count: u64,
    pub enforcement_count: u64,
    pub class_i_recall_count: u64,
    pub total_issues: u64,
    pub issue_type: &'static str,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBucket {
    pub therapeutic_category: String,
    pub shortage_count: u64,
    pub companies_affected: u64,
    pub drugs_affected: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeographyBucket {
    pub state: String,
    pub enforcement_count: u64,
    pub companies_affected: u64,
    pub class_i_recall_count: u64,
    pub ongoing_recall_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasonBucket {
    pub shortage_reason: String,
    pub occurrence_count: u64,
    pub companies_affected: u64,
    pub categories_affected: u64,
    pub active_shortages: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityBucket {
    pub classification: Classification,
    pub recall_count: u64,
    pub companies_affected: u64,
    pub ongoing_recall_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrugBucket {
    pub generic_name: String,
    pub proprietary_name: Option<String>,
    pub therapeutic_category: Option<String>,
    pub shortage_count: u64,
    pub companies_affected: u64,
    pub current_status: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActivityKind {
    Shortage,
    Enforcement,
}

impl FromStr for ActivityKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "shortage" => Ok(ActivityKind::Shortage),
            "enforcement" => Ok(ActivityKind::Enforcement),
            other => Err(anyhow::anyhow!(
                "unrecognized activity type {other:?}; expected shortage or enforcement"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEntry {
    pub activity_type: ActivityKind,
    pub issue_date: NaiveDate,
    pub company: String,
    pub drug_name: String,
    pub therapeutic_category: Option<String>,
    pub status: String,
    pub reason: Option<String>,
    pub classification: Option<Classification>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMetrics {
    pub total_shortages: u64,
    pub total_enforcements: u64,
    pub total_issues: u64,
    pub total_companies_affected: u64,
    pub companies_with_shortages: u64,
    pub companies_with_enforcements: u64,
    pub affected_categories: u64,
    pub active_shortages: u64,
    pub class_i_recalls: u64,
    pub ongoing_recalls: u64,
    pub shortages_last_30_days: u64,
    pub enforcements_last_30_days: u64,
}

/// Buckets both fact types by calendar month (YYYY-MM), oldest first. Months
/// with no activity inside the observed range are emitted as zero-count
/// buckets so a time-series chart never shows a misleading gap.
pub fn group_by_month(
    shortages: &[ShortageRecord],
    enforcements: &[EnforcementRecord],
    filter: &RecordFilter,
) -> Vec<MonthlyBucket> {
    let bands = filter
        .risk_level
        .map(|_| company_risk_bands(shortages, enforcements, filter));
    let mut months: BTreeMap<(i32, u32), (u64, u64)> = BTreeMap::new();

    for record in shortages {
        if !filter.matches_company(&record.company_name)
            || !filter.matches_date(record.initial_posting_date)
            || !band_matches(bands.as_ref(), filter, &record.company_name)
        {
            continue;
        }
        let key = (
            record.initial_posting_date.year(),
            record.initial_posting_date.month(),
        );
        months.entry(key).or_insert((0, 0)).0 += 1;
    }
    for record in enforcements {
        if !filter.matches_company(&record.recalling_firm)
            || !filter.matches_date(record.recall_initiation_date)
            || !band_matches(bands.as_ref(), filter, &record.recalling_firm)
        {
            continue;
        }
        let key = (
            record.recall_initiation_date.year(),
            record.recall_initiation_date.month(),
        );
        months.entry(key).or_insert((0, 0)).1 += 1;
    }

    let (Some(&first), Some(&last)) = (months.keys().next(), months.keys().next_back()) else {
        return Vec::new();
    };

    let mut buckets = Vec::new();
    let mut cursor = first;
    loop {
        let (shortage_count, enforcement_count) = months.get(&cursor).copied().unwrap_or((0, 0));
        buckets.push(MonthlyBucket {
            month: format!("{:04}-{:02}", cursor.0, cursor.1),
            shortage_count,
            enforcement_count,
        });
        if cursor == last {
            break;
        }
        cursor = if cursor.1 == 12 {
            (cursor.0 + 1, 1)
        } else {
            (cursor.0, cursor.1 + 1)
        };
    }
    buckets
}

/// Per-company issue profile across both fact tables. Risk scores are
/// normalized against the maxima observed over all companies passing the date
/// filter, before the company and risk-level clauses narrow the result, so a
/// search never changes an individual company's score. Sorted descending by
/// total_issues, ties broken by company name; truncation happens after the
/// full sort.
pub fn group_by_company(
    shortages: &[ShortageRecord],
    enforcements: &[EnforcementRecord],
    filter: &RecordFilter,
    limit: usize,
) -> Vec<CompanyBucket> {
    #[derive(Default)]
    struct Acc {
        shortages: u64,
        enforcements: u64,
        class_i: u64,
    }

    let mut companies: HashMap<String, Acc> = HashMap::new();
    for record in shortages {
        if !filter.matches_date(record.initial_posting_date) {
            continue;
        }
        companies
            .entry(record.company_name.clone())
            .or_default()
            .shortages += 1;
    }
    for record in enforcements {
        if !filter.matches_date(record.recall_initiation_date) {
            continue;
        }
        let acc = companies.entry(record.recalling_firm.clone()).or_default();
        acc.enforcements += 1;
        if record.classification == Classification::ClassI {
            acc.class_i += 1;
        }
    }

    let scale = ScoreScale::from_counts(
        companies
            .values()
            .map(|acc| (acc.shortages, acc.enforcements)),
    );

    let mut buckets: Vec<CompanyBucket> = companies
        .into_iter()
        .map(|(company_name, acc)| {
            let scored = risk::score(acc.shortages, acc.enforcements, &scale);
            CompanyBucket {
                company_name,
                shortage_count: acc.shortages,
                enforcement_count: acc.enforcements,
                class_i_recall_count: acc.class_i,
                total_issues: acc.shortages + acc.enforcements,
                issue_type: issue_type(acc.shortages, acc.enforcements),
                risk_score: scored.score,
                risk_level: scored.level,
            }
        })
        .filter(|bucket| {
            filter.matches_company(&bucket.company_name)
                && filter.matches_risk_level(bucket.risk_level)
        })
        .collect();

    buckets.sort_by(|a, b| {
        b.total_issues
            .cmp(&a.total_issues)
            .then_with(|| a.company_name.cmp(&b.company_name))
    });
    buckets.truncate(limit);
    buckets
}

// Buckets only exist once at least one count is nonzero.
fn issue_type(shortages: u64, enforcements: u64) -> &'static str {
    if shortages > 0 && enforcements > 0 {
        "Both Issues"
    } else if shortages > 0 {
        "Shortage Only"
    } else {
        "Enforcement Only"
    }
}

/// Per-company risk bands over the date-filtered dataset. Every aggregation
/// that honors the risk-level filter derives company membership from this,
/// so the banding always agrees with what `group_by_company` reports.
fn company_risk_bands(
    shortages: &[ShortageRecord],
    enforcements: &[EnforcementRecord],
    filter: &RecordFilter,
) -> HashMap<String, RiskLevel> {
    let mut counts: HashMap<String, (u64, u64)> = HashMap::new();
    for record in shortages {
        if !filter.matches_date(record.initial_posting_date) {
            continue;
        }
        counts.entry(record.company_name.clone()).or_default().0 += 1;
    }
    for record in enforcements {
        if !filter.matches_date(record.recall_initiation_date) {
            continue;
        }
        counts.entry(record.recalling_firm.clone()).or_default().1 += 1;
    }

    let scale = ScoreScale::from_counts(counts.values().copied());
    counts
        .into_iter()
        .map(|(company, (shortage_count, enforcement_count))| {
            (
                company,
                risk::score(shortage_count, enforcement_count, &scale).level,
            )
        })
        .collect()
}

fn band_matches(
    bands: Option<&HashMap<String, RiskLevel>>,
    filter: &RecordFilter,
    company: &str,
) -> bool {
    match bands {
        Some(bands) => {
            let level = bands.get(company).copied().unwrap_or(RiskLevel::Low);
            filter.matches_risk_level(level)
        }
        None => true,
    }
}

/// Shortage load per therapeutic category, heaviest first. Records without a
/// category are omitted, mirroring the source data's NULL handling. The
/// enforcement slice only feeds the company risk banding when the risk-level
/// filter is set.
pub fn group_by_category(
    shortages: &[ShortageRecord],
    enforcements: &[EnforcementRecord],
    filter: &RecordFilter,
    limit: usize,
) -> Vec<CategoryBucket> {
    #[derive(Default)]
    struct Acc {
        count: u64,
        companies: HashSet<String>,
        drugs: HashSet<String>,
    }

    let bands = filter
        .risk_level
        .map(|_| company_risk_bands(shortages, enforcements, filter));
    let mut categories: HashMap<String, Acc> = HashMap::new();
    for record in shortages {
        if !filter.matches_company(&record.company_name)
            || !filter.matches_date(record.initial_posting_date)
            || !band_matches(bands.as_ref(), filter, &record.company_name)
        {
            continue;
        }
        let Some(category) = &record.therapeutic_category else {
            continue;
        };
        let acc = categories.entry(category.clone()).or_default();
        acc.count += 1;
        acc.companies.insert(record.company_name.clone());
        acc.drugs.insert(record.generic_name.clone());
    }

    let mut buckets: Vec<CategoryBucket> = categories
        .into_iter()
        .map(|(therapeutic_category, acc)| CategoryBucket {
            therapeutic_category,
            shortage_count: acc.count,
            companies_affected: acc.companies.len() as u64,
            drugs_affected: acc.drugs.len() as u64,
        })
        .collect();

    buckets.sort_by(|a, b| {
        b.shortage_count
            .cmp(&a.shortage_count)
            .then_with(|| a.therapeutic_category.cmp(&b.therapeutic_category))
    });
    buckets.truncate(limit);
    buckets
}

/// Enforcement actions by state. Records without a state are omitted. The
/// shortage slice only feeds the company risk banding when the risk-level
/// filter is set.
pub fn group_by_geography(
    shortages: &[ShortageRecord],
    enforcements: &[EnforcementRecord],
    filter: &RecordFilter,
    limit: usize,
) -> Vec<GeographyBucket> {
    #[derive(Default)]
    struct Acc {
        count: u64,
        companies: HashSet<String>,
        class_i: u64,
        ongoing: u64,
    }

    let bands = filter
        .risk_level
        .map(|_| company_risk_bands(shortages, enforcements, filter));
    let mut states: HashMap<String, Acc> = HashMap::new();
    for record in enforcements {
        if !filter.matches_company(&record.recalling_firm)
            || !filter.matches_date(record.recall_initiation_date)
            || !band_matches(bands.as_ref(), filter, &record.recalling_firm)
        {
            continue;
        }
        let Some(state) = &record.state else {
            continue;
        };
        let acc = states.entry(state.clone()).or_default();
        acc.count += 1;
        acc.companies.insert(record.recalling_firm.clone());
        if record.classification == Classification::ClassI {
            acc.class_i += 1;
        }
        if record.is_ongoing() {
            acc.ongoing += 1;
        }
    }

    let mut buckets: Vec<GeographyBucket> = states
        .into_iter()
        .map(|(state, acc)| GeographyBucket {
            state,
            enforcement_count: acc.count,
            companies_affected: acc.companies.len() as u64,
            class_i_recall_count: acc.class_i,
            ongoing_recall_count: acc.ongoing,
        })
        .collect();

    buckets.sort_by(|a, b| {
        b.enforcement_count
            .cmp(&a.enforcement_count)
            .then_with(|| a.state.cmp(&b.state))
    });
    buckets.truncate(limit);
    buckets
}

/// Shortage records bucketed by the stated reason. Records without a reason
/// are omitted.
pub fn group_by_reason(
    shortages: &[ShortageRecord],
    enforcements: &[EnforcementRecord],
    filter: &RecordFilter,
    limit: usize,
) -> Vec<ReasonBucket> {
    #[derive(Default)]
    struct Acc {
        count: u64,
        companies: HashSet<String>,
        categories: HashSet<String>,
        active: u64,
    }

    let bands = filter
        .risk_level
        .map(|_| company_risk_bands(shortages, enforcements, filter));
    let mut reasons: HashMap<String, Acc> = HashMap::new();
    for record in shortages {
        if !filter.matches_company(&record.company_name)
            || !filter.matches_date(record.initial_posting_date)
            || !band_matches(bands.as_ref(), filter, &record.company_name)
        {
            continue;
        }
        let Some(reason) = &record.shortage_reason else {
            continue;
        };
        let acc = reasons.entry(reason.clone()).or_default();
        acc.count += 1;
        acc.companies.insert(record.company_name.clone());
        if let Some(category) = &record.therapeutic_category {
            acc.categories.insert(category.clone());
        }
        if record.is_active() {
            acc.active += 1;
        }
    }

    let mut buckets: Vec<ReasonBucket> = reasons
        .into_iter()
        .map(|(shortage_reason, acc)| ReasonBucket {
            shortage_reason,
            occurrence_count: acc.count,
            companies_affected: acc.companies.len() as u64,
            categories_affected: acc.categories.len() as u64,
            active_shortages: acc.active,
        })
        .collect();

    buckets.sort_by(|a, b| {
        b.occurrence_count
            .cmp(&a.occurrence_count)
            .then_with(|| a.shortage_reason.cmp(&b.shortage_reason))
    });
    buckets.truncate(limit);
    buckets
}

/// Recall counts by severity class. Always emits all four classes, most
/// severe first, so the distribution chart keeps a stable shape across
/// filter states.
pub fn group_by_severity(
    shortages: &[ShortageRecord],
    enforcements: &[EnforcementRecord],
    filter: &RecordFilter,
) -> Vec<SeverityBucket> {
    #[derive(Default)]
    struct Acc {
        count: u64,
        companies: HashSet<String>,
        ongoing: u64,
    }

    let bands = filter
        .risk_level
        .map(|_| company_risk_bands(shortages, enforcements, filter));
    let mut classes: HashMap<Classification, Acc> = HashMap::new();
    for record in enforcements {
        if !filter.matches_company(&record.recalling_firm)
            || !filter.matches_date(record.recall_initiation_date)
            || !band_matches(bands.as_ref(), filter, &record.recalling_firm)
        {
            continue;
        }
        let acc = classes.entry(record.classification).or_default();
        acc.count += 1;
        acc.companies.insert(record.recalling_firm.clone());
        if record.is_ongoing() {
            acc.ongoing += 1;
        }
    }

    Classification::ALL
        .iter()
        .map(|&classification| {
            let acc = classes.remove(&classification).unwrap_or_default();
            SeverityBucket {
                classification,
                recall_count: acc.count,
                companies_affected: acc.companies.len() as u64,
                ongoing_recall_count: acc.ongoing,
            }
        })
        .collect()
}

/// Most frequently affected drugs, keyed by the (generic, proprietary) name
/// pair. The therapeutic category shown is the most commonly observed one for
/// the drug. Truncation to `limit` happens only after the full ranking.
pub fn top_drugs(
    shortages: &[ShortageRecord],
    enforcements: &[EnforcementRecord],
    filter: &RecordFilter,
    limit: usize,
) -> Vec<DrugBucket> {
    #[derive(Default)]
    struct Acc {
        count: u64,
        companies: HashSet<String>,
        categories: HashMap<String, u64>,
        active: u64,
    }

    let bands = filter
        .risk_level
        .map(|_| company_risk_bands(shortages, enforcements, filter));
    let mut drugs: HashMap<(String, Option<String>), Acc> = HashMap::new();
    for record in shortages {
        if !filter.matches_company(&record.company_name)
            || !filter.matches_date(record.initial_posting_date)
            || !band_matches(bands.as_ref(), filter, &record.company_name)
        {
            continue;
        }
        let key = (record.generic_name.clone(), record.proprietary_name.clone());
        let acc = drugs.entry(key).or_default();
        acc.count += 1;
        acc.companies.insert(record.company_name.clone());
        if let Some(category) = &record.therapeutic_category {
            *acc.categories.entry(category.clone()).or_insert(0) += 1;
        }
        if record.is_active() {
            acc.active += 1;
        }
    }

    let mut buckets: Vec<DrugBucket> = drugs
        .into_iter()
        .map(|((generic_name, proprietary_name), acc)| {
            let therapeutic_category = acc
                .categories
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
                .map(|(category, _)| category.clone());
            DrugBucket {
                generic_name,
                proprietary_name,
                therapeutic_category,
                shortage_count: acc.count,
                companies_affected: acc.companies.len() as u64,
                current_status: if acc.active > 0 {
                    "Currently in shortage"
                } else {
                    "No current shortage"
                },
            }
        })
        .collect();

    buckets.sort_by(|a, b| {
        b.shortage_count
            .cmp(&a.shortage_count)
            .then_with(|| a.generic_name.cmp(&b.generic_name))
    });
    buckets.truncate(limit);
    buckets
}

/// Merges both fact types into a reverse-chronological feed covering the
/// trailing window ending at `today`.
pub fn recent_activity(
    shortages: &[ShortageRecord],
    enforcements: &[EnforcementRecord],
    kind: Option<ActivityKind>,
    window_days: i64,
    today: NaiveDate,
    filter: &RecordFilter,
) -> Vec<ActivityEntry> {
    let cutoff = today - Duration::days(window_days.max(1));
    let bands = filter
        .risk_level
        .map(|_| company_risk_bands(shortages, enforcements, filter));
    let mut entries = Vec::new();

    if kind.is_none() || kind == Some(ActivityKind::Shortage) {
        for record in shortages {
            if record.initial_posting_date < cutoff
                || record.initial_posting_date > today
                || !filter.matches_company(&record.company_name)
                || !band_matches(bands.as_ref(), filter, &record.company_name)
            {
                continue;
            }
            entries.push(ActivityEntry {
                activity_type: ActivityKind::Shortage,
                issue_date: record.initial_posting_date,
                company: record.company_name.clone(),
                drug_name: record.generic_name.clone(),
                therapeutic_category: record.therapeutic_category.clone(),
                status: record.status.clone(),
                reason: record.shortage_reason.clone(),
                classification: None,
            });
        }
    }
    if kind.is_none() || kind == Some(ActivityKind::Enforcement) {
        for record in enforcements {
            if record.recall_initiation_date < cutoff
                || record.recall_initiation_date > today
                || !filter.matches_company(&record.recalling_firm)
                || !band_matches(bands.as_ref(), filter, &record.recalling_firm)
            {
                continue;
            }
            entries.push(ActivityEntry {
                activity_type: ActivityKind::Enforcement,
                issue_date: record.recall_initiation_date,
                company: record.recalling_firm.clone(),
                drug_name: record.product_description.clone(),
                therapeutic_category: None,
                status: record.status.clone(),
                reason: record.reason_for_recall.clone(),
                classification: Some(record.classification),
            });
        }
    }

    entries.sort_by(|a, b| {
        b.issue_date
            .cmp(&a.issue_date)
            .then_with(|| a.company.cmp(&b.company))
            .then_with(|| a.drug_name.cmp(&b.drug_name))
    });
    entries
}

/// Scalar dashboard totals. "Active" follows the single status rule on
/// `ShortageRecord::is_active`.
pub fn summary_metrics(
    shortages: &[ShortageRecord],
    enforcements: &[EnforcementRecord],
    today: NaiveDate,
) -> SummaryMetrics {
    let thirty_days_ago = today - Duration::days(30);

    let mut shortage_companies = HashSet::new();
    let mut categories = HashSet::new();
    let mut active_shortages = 0;
    let mut shortages_last_30_days = 0;
    for record in shortages {
        shortage_companies.insert(record.company_name.as_str());
        if let Some(category) = &record.therapeutic_category {
            categories.insert(category.as_str());
        }
        if record.is_active() {
            active_shortages += 1;
        }
        if record.initial_posting_date >= thirty_days_ago {
            shortages_last_30_days += 1;
        }
    }

    let mut enforcement_companies = HashSet::new();
    let mut class_i_recalls = 0;
    let mut ongoing_recalls = 0;
    let mut enforcements_last_30_days = 0;
    for record in enforcements {
        enforcement_companies.insert(record.recalling_firm.as_str());
        if record.classification == Classification::ClassI {
            class_i_recalls += 1;
        }
        if record.is_ongoing() {
            ongoing_recalls += 1;
        }
        if record.recall_initiation_date >= thirty_days_ago {
            enforcements_last_30_days += 1;
        }
    }

    let all_companies: HashSet<&str> = shortage_companies
        .union(&enforcement_companies)
        .copied()
        .collect();

    SummaryMetrics {
        total_shortages: shortages.len() as u64,
        total_enforcements: enforcements.len() as u64,
        total_issues: (shortages.len() + enforcements.len()) as u64,
        total_companies_affected: all_companies.len() as u64,
        companies_with_shortages: shortage_companies.len() as u64,
        companies_with_enforcements: enforcement_companies.len() as u64,
        affected_categories: categories.len() as u64,
        active_shortages,
        class_i_recalls,
        ongoing_recalls,
        shortages_last_30_days,
        enforcements_last_30_days,
    }
}
