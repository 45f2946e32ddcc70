use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{Classification, EnforcementRecord, ShortageRecord};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let shortages = vec![
        (
            "seed-shortage-001",
            "Amoxicillin",
            Some("Amoxil"),
            "Acme Pharmaceuticals",
            Some("Antibiotics"),
            "Current",
            Some("Demand increase for the drug"),
            NaiveDate::from_ymd_opt(2026, 1, 12).context("invalid date")?,
        ),
        (
            "seed-shortage-002",
            "Cisplatin",
            None,
            "Zenith Oncology",
            Some("Oncology"),
            "Current",
            Some("Manufacturing delay"),
            NaiveDate::from_ymd_opt(2026, 2, 3).context("invalid date")?,
        ),
        (
            "seed-shortage-003",
            "Lidocaine",
            Some("Xylocaine"),
            "Acme Pharmaceuticals",
            Some("Anesthesia"),
            "Resolved",
            Some("Shortage of an active ingredient"),
            NaiveDate::from_ymd_opt(2025, 11, 20).context("invalid date")?,
        ),
    ];

    for (source_key, generic, proprietary, company, category, status, reason, posted) in shortages {
        sqlx::query(
            r#"
            INSERT INTO shortwatch.shortage_records
            (id, generic_name, proprietary_name, company_name, therapeutic_category,
             status, shortage_reason, initial_posting_date, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(generic)
        .bind(proprietary)
        .bind(company)
        .bind(category)
        .bind(status)
        .bind(reason)
        .bind(posted)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    let enforcements = vec![
        (
            "seed-enforcement-001",
            "Acme Pharmaceuticals",
            "Amoxicillin 500mg capsules, 100-count bottle",
            Classification::ClassI,
            "Ongoing",
            Some("NJ"),
            Some("Failed dissolution specifications"),
            NaiveDate::from_ymd_opt(2026, 1, 25).context("invalid date")?,
        ),
        (
            "seed-enforcement-002",
            "Mori Labs",
            "Lidocaine 2% injection, 20mL vial",
            Classification::ClassII,
            "Terminated",
            Some("CA"),
            Some("Presence of particulate matter"),
            NaiveDate::from_ymd_opt(2025, 12, 8).context("invalid date")?,
        ),
    ];

    for (source_key, firm, product, classification, status, state, reason, initiated) in
        enforcements
    {
        sqlx::query(
            r#"
            INSERT INTO shortwatch.enforcement_records
            (id, recalling_firm, product_description, classification, status,
             state, reason_for_recall, recall_initiation_date, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(firm)
        .bind(product)
        .bind(classification.label())
        .bind(status)
        .bind(state)
        .bind(reason)
        .bind(initiated)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn fetch_shortages(pool: &PgPool) -> anyhow::Result<Vec<ShortageRecord>> {
    let rows = sqlx::query(
        "SELECT id, generic_name, proprietary_name, ndc, company_name, \
         therapeutic_category, status, shortage_reason, initial_posting_date, update_date \
         FROM shortwatch.shortage_records \
         ORDER BY initial_posting_date",
    )
    .fetch_all(pool)
    .await
    .context("failed to fetch shortage records")?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        records.push(ShortageRecord {
            id: row.get("id"),
            generic_name: row.get("generic_name"),
            proprietary_name: row.get("proprietary_name"),
            ndc: row.get("ndc"),
            company_name: row.get("company_name"),
            therapeutic_category: row.get("therapeutic_category"),
            status: row.get("status"),
            shortage_reason: row.get("shortage_reason"),
            initial_posting_date: row.get("initial_posting_date"),
            update_date: row.get("update_date"),
        });
    }
    Ok(records)
}

pub async fn fetch_enforcements(pool: &PgPool) -> anyhow::Result<Vec<EnforcementRecord>> {
    let rows = sqlx::query(
        "SELECT id, recalling_firm, product_description, classification, status, \
         state, reason_for_recall, recall_initiation_date \
         FROM shortwatch.enforcement_records \
         ORDER BY recall_initiation_date",
    )
    .fetch_all(pool)
    .await
    .context("failed to fetch enforcement records")?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let id: Uuid = row.get("id");
        let classification: String = row.get("classification");
        records.push(EnforcementRecord {
            id,
            recalling_firm: row.get("recalling_firm"),
            product_description: row.get("product_description"),
            classification: classification
                .parse()
                .with_context(|| format!("stored enforcement row {id} has bad classification"))?,
            status: row.get("status"),
            state: row.get("state"),
            reason_for_recall: row.get("reason_for_recall"),
            recall_initiation_date: row.get("recall_initiation_date"),
        });
    }
    Ok(records)
}

pub async fn import_shortages_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        generic_name: String,
        proprietary_name: Option<String>,
        ndc: Option<String>,
        company_name: String,
        therapeutic_category: Option<String>,
        status: String,
        shortage_reason: Option<String>,
        initial_posting_date: NaiveDate,
        update_date: Option<NaiveDate>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO shortwatch.shortage_records
            (id, generic_name, proprietary_name, ndc, company_name, therapeutic_category,
             status, shortage_reason, initial_posting_date, update_date, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.generic_name)
        .bind(&row.proprietary_name)
        .bind(&row.ndc)
        .bind(&row.company_name)
        .bind(&row.therapeutic_category)
        .bind(&row.status)
        .bind(&row.shortage_reason)
        .bind(row.initial_posting_date)
        .bind(row.update_date)
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub async fn import_enforcements_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        recalling_firm: String,
        product_description: String,
        classification: String,
        status: String,
        state: Option<String>,
        reason_for_recall: Option<String>,
        recall_initiation_date: NaiveDate,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        // Reject malformed classifications at the boundary so the stored data
        // is always parseable.
        let classification: Classification = row
            .classification
            .parse()
            .with_context(|| format!("row for {:?}", row.recalling_firm))?;
        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO shortwatch.enforcement_records
            (id, recalling_firm, product_description, classification, status,
             state, reason_for_recall, recall_initiation_date, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.recalling_firm)
        .bind(&row.product_description)
        .bind(classification.label())
        .bind(&row.status)
        .bind(&row.state)
        .bind(&row.reason_for_recall)
        .bind(row.recall_initiation_date)
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}
