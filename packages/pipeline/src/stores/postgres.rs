//! PostgreSQL storage implementation.
//!
//! Status transitions are conditional `UPDATE ... RETURNING` statements, so
//! the database is the serialization point for concurrent workers. The
//! advertisement write runs in a transaction that row-locks the ingestion
//! record, guaranteeing at most one advertisement per record even when two
//! extraction tasks race.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::FromRow;
use tracing::info;
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::traits::store::{DomainStore, RecordStore};
use crate::types::job::{
    ContractType, JobAdvertisement, LanguageRequirement, NewJobAdvertisement,
    NewLanguageRequirement, Organization, PositionLevel, ProficiencyLevel, RequirementLevel,
    WorkArrangement,
};
use crate::types::record::{
    CrawlCursor, IngestionRecord, PageDetails, RecordStatus, RecordStatusView,
};

/// PostgreSQL-backed pipeline store.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new store with the given connection URL.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(storage_err)?;
        Self::from_pool(pool).await
    }

    /// Create a store from an existing connection pool.
    pub async fn from_pool(pool: PgPool) -> Result<Self> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Get the underlying pool (to share with the task queue).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ingestion_records (
                id UUID PRIMARY KEY,
                post_number TEXT NOT NULL UNIQUE,
                source_url TEXT NOT NULL,
                post_name TEXT,
                organization_name TEXT,
                location_country TEXT,
                location_city TEXT,
                content TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                last_attempt_at TIMESTAMPTZ,
                job_advertisement_id UUID,
                discovered_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_ingestion_records_status ON ingestion_records(status)",
        )
        .execute(&self.pool)
        .await
        .ok();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS organizations (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                abbreviation TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_advertisements (
                id UUID PRIMARY KEY,
                organization_id UUID NOT NULL REFERENCES organizations(id),
                post_number TEXT NOT NULL UNIQUE,
                post_name TEXT NOT NULL,
                date_posted DATE NOT NULL,
                application_deadline DATE NOT NULL,
                contract_type TEXT NOT NULL,
                contract_duration TEXT,
                renewable BOOLEAN NOT NULL DEFAULT FALSE,
                location_region TEXT,
                location_country TEXT NOT NULL,
                location_city TEXT,
                work_arrangement TEXT,
                thematic_area TEXT,
                position_level TEXT,
                brief_description TEXT,
                main_skills_competencies TEXT,
                technical_skills TEXT,
                minimum_academic_qualifications TEXT,
                minimum_experience TEXT,
                tags JSONB NOT NULL DEFAULT '[]',
                source_url TEXT,
                ingestion_record_id UUID NOT NULL UNIQUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS language_requirements (
                id UUID PRIMARY KEY,
                job_advertisement_id UUID NOT NULL
                    REFERENCES job_advertisements(id) ON DELETE CASCADE,
                language TEXT NOT NULL,
                requirement_level TEXT NOT NULL DEFAULT 'preferred',
                proficiency_level TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS crawl_cursors (
                source TEXT PRIMARY KEY,
                last_post_number TEXT,
                last_crawl_at TIMESTAMPTZ,
                last_error TEXT,
                total_discovered BIGINT NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        info!("pipeline store migrations complete");
        Ok(())
    }
}

fn storage_err(e: sqlx::Error) -> PipelineError {
    PipelineError::Storage(e.to_string().into())
}

#[derive(FromRow)]
struct RecordRow {
    id: Uuid,
    post_number: String,
    source_url: String,
    post_name: Option<String>,
    organization_name: Option<String>,
    location_country: Option<String>,
    location_city: Option<String>,
    content: Option<String>,
    status: String,
    attempts: i32,
    last_error: Option<String>,
    last_attempt_at: Option<DateTime<Utc>>,
    job_advertisement_id: Option<Uuid>,
    discovered_at: DateTime<Utc>,
}

impl TryFrom<RecordRow> for IngestionRecord {
    type Error = PipelineError;

    fn try_from(row: RecordRow) -> Result<Self> {
        let status = RecordStatus::parse(&row.status).ok_or_else(|| {
            PipelineError::Storage(format!("unknown record status: {}", row.status).into())
        })?;
        Ok(IngestionRecord {
            id: row.id,
            post_number: row.post_number,
            source_url: row.source_url,
            post_name: row.post_name,
            organization_name: row.organization_name,
            location_country: row.location_country,
            location_city: row.location_city,
            content: row.content,
            status,
            attempts: row.attempts,
            last_error: row.last_error,
            last_attempt_at: row.last_attempt_at,
            job_advertisement_id: row.job_advertisement_id,
            discovered_at: row.discovered_at,
        })
    }
}

const RECORD_COLUMNS: &str = "id, post_number, source_url, post_name, organization_name, \
     location_country, location_city, content, status, attempts, last_error, \
     last_attempt_at, job_advertisement_id, discovered_at";

#[derive(FromRow)]
struct OrganizationRow {
    id: Uuid,
    name: String,
    abbreviation: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<OrganizationRow> for Organization {
    fn from(row: OrganizationRow) -> Self {
        Organization {
            id: row.id,
            name: row.name,
            abbreviation: row.abbreviation,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct AdvertisementRow {
    id: Uuid,
    organization_id: Uuid,
    post_number: String,
    post_name: String,
    date_posted: NaiveDate,
    application_deadline: NaiveDate,
    contract_type: String,
    contract_duration: Option<String>,
    renewable: bool,
    location_region: Option<String>,
    location_country: String,
    location_city: Option<String>,
    work_arrangement: Option<String>,
    thematic_area: Option<String>,
    position_level: Option<String>,
    brief_description: Option<String>,
    main_skills_competencies: Option<String>,
    technical_skills: Option<String>,
    minimum_academic_qualifications: Option<String>,
    minimum_experience: Option<String>,
    tags: Json<Vec<String>>,
    source_url: Option<String>,
    ingestion_record_id: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<AdvertisementRow> for JobAdvertisement {
    type Error = PipelineError;

    fn try_from(row: AdvertisementRow) -> Result<Self> {
        let contract_type = ContractType::parse(&row.contract_type).ok_or_else(|| {
            PipelineError::Storage(format!("unknown contract type: {}", row.contract_type).into())
        })?;
        Ok(JobAdvertisement {
            id: row.id,
            organization_id: row.organization_id,
            post_number: row.post_number,
            post_name: row.post_name,
            date_posted: row.date_posted,
            application_deadline: row.application_deadline,
            contract_type,
            contract_duration: row.contract_duration,
            renewable: row.renewable,
            location_region: row.location_region,
            location_country: row.location_country,
            location_city: row.location_city,
            work_arrangement: row.work_arrangement.as_deref().and_then(WorkArrangement::parse),
            thematic_area: row.thematic_area,
            position_level: row.position_level.as_deref().and_then(PositionLevel::parse),
            brief_description: row.brief_description,
            main_skills_competencies: row.main_skills_competencies,
            technical_skills: row.technical_skills,
            minimum_academic_qualifications: row.minimum_academic_qualifications,
            minimum_experience: row.minimum_experience,
            tags: row.tags.0,
            source_url: row.source_url,
            ingestion_record_id: row.ingestion_record_id,
            created_at: row.created_at,
        })
    }
}

const AD_COLUMNS: &str = "id, organization_id, post_number, post_name, date_posted, \
     application_deadline, contract_type, contract_duration, renewable, location_region, \
     location_country, location_city, work_arrangement, thematic_area, position_level, \
     brief_description, main_skills_competencies, technical_skills, \
     minimum_academic_qualifications, minimum_experience, tags, source_url, \
     ingestion_record_id, created_at";

#[derive(FromRow)]
struct LanguageRow {
    id: Uuid,
    job_advertisement_id: Uuid,
    language: String,
    requirement_level: String,
    proficiency_level: Option<String>,
}

impl From<LanguageRow> for LanguageRequirement {
    fn from(row: LanguageRow) -> Self {
        LanguageRequirement {
            id: row.id,
            job_advertisement_id: row.job_advertisement_id,
            language: row.language,
            requirement_level: RequirementLevel::parse(&row.requirement_level)
                .unwrap_or(RequirementLevel::Preferred),
            proficiency_level: row.proficiency_level.as_deref().and_then(ProficiencyLevel::parse),
        }
    }
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn create_record_if_absent(&self, record: &IngestionRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO ingestion_records
                (id, post_number, source_url, post_name, status, attempts, discovered_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (post_number) DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(&record.post_number)
        .bind(&record.source_url)
        .bind(&record.post_name)
        .bind(record.status.as_str())
        .bind(record.attempts)
        .bind(record.discovered_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_record(&self, id: Uuid) -> Result<Option<IngestionRecord>> {
        let row: Option<RecordRow> = sqlx::query_as(&format!(
            "SELECT {} FROM ingestion_records WHERE id = $1",
            RECORD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(IngestionRecord::try_from).transpose()
    }

    async fn find_record_by_post_number(
        &self,
        post_number: &str,
    ) -> Result<Option<IngestionRecord>> {
        let row: Option<RecordRow> = sqlx::query_as(&format!(
            "SELECT {} FROM ingestion_records WHERE post_number = $1",
            RECORD_COLUMNS
        ))
        .bind(post_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(IngestionRecord::try_from).transpose()
    }

    async fn begin_download(&self, id: Uuid) -> Result<Option<IngestionRecord>> {
        let row: Option<RecordRow> = sqlx::query_as(&format!(
            r#"
            UPDATE ingestion_records
            SET status = 'downloading',
                attempts = attempts + 1,
                last_attempt_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'downloading')
            RETURNING {}
            "#,
            RECORD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(IngestionRecord::try_from).transpose()
    }

    async fn complete_download(&self, id: Uuid, details: &PageDetails) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ingestion_records
            SET status = 'downloaded',
                content = $2,
                post_name = $3,
                organization_name = COALESCE($4, organization_name),
                location_country = COALESCE($5, location_country),
                location_city = COALESCE($6, location_city),
                attempts = 0,
                last_error = NULL
            WHERE id = $1 AND status = 'downloading'
            "#,
        )
        .bind(id)
        .bind(&details.content_markdown)
        .bind(&details.title)
        .bind(&details.organization_name)
        .bind(&details.location_country)
        .bind(&details.location_city)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn begin_extraction(&self, id: Uuid) -> Result<Option<IngestionRecord>> {
        let row: Option<RecordRow> = sqlx::query_as(&format!(
            r#"
            UPDATE ingestion_records
            SET status = 'processing',
                attempts = attempts + 1,
                last_attempt_at = NOW()
            WHERE id = $1
              AND status IN ('downloaded', 'processing')
              AND job_advertisement_id IS NULL
            RETURNING {}
            "#,
            RECORD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(IngestionRecord::try_from).transpose()
    }

    async fn record_stage_error(&self, id: Uuid, error: &str, terminal: bool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ingestion_records
            SET last_error = $2,
                status = CASE WHEN $3 THEN 'failed' ELSE status END
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(terminal)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn mark_skipped(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ingestion_records
            SET status = 'skipped'
            WHERE id = $1 AND status NOT IN ('processed', 'failed', 'skipped')
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn get_cursor(&self, source: &str) -> Result<Option<CrawlCursor>> {
        let row: Option<(String, Option<String>, Option<DateTime<Utc>>, Option<String>, i64)> =
            sqlx::query_as(
                r#"
                SELECT source, last_post_number, last_crawl_at, last_error, total_discovered
                FROM crawl_cursors
                WHERE source = $1
                "#,
            )
            .bind(source)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(row.map(
            |(source, last_post_number, last_crawl_at, last_error, total_discovered)| CrawlCursor {
                source,
                last_post_number,
                last_crawl_at,
                last_error,
                total_discovered,
            },
        ))
    }

    async fn advance_cursor(
        &self,
        source: &str,
        last_post_number: &str,
        newly_discovered: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO crawl_cursors (source, last_post_number, last_crawl_at, total_discovered)
            VALUES ($1, $2, NOW(), $3)
            ON CONFLICT (source) DO UPDATE
            SET last_post_number = EXCLUDED.last_post_number,
                last_crawl_at = NOW(),
                last_error = NULL,
                total_discovered = crawl_cursors.total_discovered + $3
            "#,
        )
        .bind(source)
        .bind(last_post_number)
        .bind(newly_discovered)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn record_crawl_error(&self, source: &str, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO crawl_cursors (source, last_error)
            VALUES ($1, $2)
            ON CONFLICT (source) DO UPDATE SET last_error = EXCLUDED.last_error
            "#,
        )
        .bind(source)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn list_statuses(&self) -> Result<Vec<RecordStatusView>> {
        let rows: Vec<(String, String, i32, Option<String>, Option<DateTime<Utc>>)> =
            sqlx::query_as(
                r#"
                SELECT post_number, status, attempts, last_error, last_attempt_at
                FROM ingestion_records
                ORDER BY post_number
                "#,
            )
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        rows.into_iter()
            .map(|(post_number, status, attempts, last_error, last_attempt_at)| {
                let status = RecordStatus::parse(&status).ok_or_else(|| {
                    PipelineError::Storage(format!("unknown record status: {}", status).into())
                })?;
                Ok(RecordStatusView {
                    post_number,
                    status,
                    attempts,
                    last_error,
                    last_attempt_at,
                })
            })
            .collect()
    }
}

#[async_trait]
impl DomainStore for PostgresStore {
    async fn get_or_create_organization(
        &self,
        name: &str,
        abbreviation: Option<&str>,
    ) -> Result<Organization> {
        let row: OrganizationRow = sqlx::query_as(
            r#"
            INSERT INTO organizations (id, name, abbreviation)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE
            SET abbreviation = COALESCE(organizations.abbreviation, EXCLUDED.abbreviation)
            RETURNING id, name, abbreviation, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(abbreviation)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.into())
    }

    async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>> {
        let row: Option<OrganizationRow> = sqlx::query_as(
            "SELECT id, name, abbreviation, created_at FROM organizations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.map(Organization::from))
    }

    async fn get_advertisement(&self, id: Uuid) -> Result<Option<JobAdvertisement>> {
        let row: Option<AdvertisementRow> = sqlx::query_as(&format!(
            "SELECT {} FROM job_advertisements WHERE id = $1",
            AD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(JobAdvertisement::try_from).transpose()
    }

    async fn find_advertisement_by_post_number(
        &self,
        post_number: &str,
    ) -> Result<Option<JobAdvertisement>> {
        let row: Option<AdvertisementRow> = sqlx::query_as(&format!(
            "SELECT {} FROM job_advertisements WHERE post_number = $1",
            AD_COLUMNS
        ))
        .bind(post_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(JobAdvertisement::try_from).transpose()
    }

    async fn list_advertisements(&self) -> Result<Vec<JobAdvertisement>> {
        let rows: Vec<AdvertisementRow> = sqlx::query_as(&format!(
            "SELECT {} FROM job_advertisements ORDER BY created_at",
            AD_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(JobAdvertisement::try_from).collect()
    }

    async fn create_advertisement(
        &self,
        record_id: Uuid,
        ad: NewJobAdvertisement,
        languages: Vec<NewLanguageRequirement>,
    ) -> Result<JobAdvertisement> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        // Row lock serializes racing extractors on the same record
        let linked: Option<(Option<Uuid>,)> = sqlx::query_as(
            "SELECT job_advertisement_id FROM ingestion_records WHERE id = $1 FOR UPDATE",
        )
        .bind(record_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_err)?;

        let Some((existing,)) = linked else {
            return Err(PipelineError::RecordNotFound { id: record_id });
        };

        if let Some(existing_id) = existing {
            tx.rollback().await.map_err(storage_err)?;
            return self
                .get_advertisement(existing_id)
                .await?
                .ok_or_else(|| PipelineError::Storage("dangling advertisement link".into()));
        }

        let ad_id = Uuid::new_v4();
        let row: AdvertisementRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO job_advertisements
                (id, organization_id, post_number, post_name, date_posted,
                 application_deadline, contract_type, contract_duration, renewable,
                 location_region, location_country, location_city, work_arrangement,
                 thematic_area, position_level, brief_description,
                 main_skills_competencies, technical_skills,
                 minimum_academic_qualifications, minimum_experience, tags,
                 source_url, ingestion_record_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23)
            RETURNING {}
            "#,
            AD_COLUMNS
        ))
        .bind(ad_id)
        .bind(ad.organization_id)
        .bind(&ad.post_number)
        .bind(&ad.post_name)
        .bind(ad.date_posted)
        .bind(ad.application_deadline)
        .bind(ad.contract_type.as_str())
        .bind(&ad.contract_duration)
        .bind(ad.renewable)
        .bind(&ad.location_region)
        .bind(&ad.location_country)
        .bind(&ad.location_city)
        .bind(ad.work_arrangement.map(|w| w.as_str()))
        .bind(&ad.thematic_area)
        .bind(ad.position_level.map(|p| p.as_str()))
        .bind(&ad.brief_description)
        .bind(&ad.main_skills_competencies)
        .bind(&ad.technical_skills)
        .bind(&ad.minimum_academic_qualifications)
        .bind(&ad.minimum_experience)
        .bind(Json(&ad.tags))
        .bind(&ad.source_url)
        .bind(record_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_err)?;

        for lang in &languages {
            sqlx::query(
                r#"
                INSERT INTO language_requirements
                    (id, job_advertisement_id, language, requirement_level, proficiency_level)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(ad_id)
            .bind(&lang.language)
            .bind(lang.requirement_level.as_str())
            .bind(lang.proficiency_level.map(|p| p.as_str()))
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        sqlx::query(
            r#"
            UPDATE ingestion_records
            SET status = 'processed',
                job_advertisement_id = $2,
                last_error = NULL
            WHERE id = $1
            "#,
        )
        .bind(record_id)
        .bind(ad_id)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;

        row.try_into()
    }

    async fn get_language_requirements(
        &self,
        advertisement_id: Uuid,
    ) -> Result<Vec<LanguageRequirement>> {
        let rows: Vec<LanguageRow> = sqlx::query_as(
            r#"
            SELECT id, job_advertisement_id, language, requirement_level, proficiency_level
            FROM language_requirements
            WHERE job_advertisement_id = $1
            "#,
        )
        .bind(advertisement_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows.into_iter().map(LanguageRequirement::from).collect())
    }
}
