//! End-to-end pipeline tests over the in-memory harness.

use unjobs_pipeline::config::PipelineConfig;
use unjobs_pipeline::pipeline::{DownloadOutcome, ExtractOutcome};
use unjobs_pipeline::queue::memory::TaskState;
use unjobs_pipeline::testing::TestHarness;
use unjobs_pipeline::traits::queue::Task;
use unjobs_pipeline::traits::store::{DomainStore, RecordStore};
use unjobs_pipeline::types::job::ContractType;
use unjobs_pipeline::types::record::{IngestionRecord, PageDetails, RecordStatus};

const LISTING_URL: &str = "https://unjobs.org";
const POSTING_URL: &str = "https://unjobs.org/vacancies/77001";

const LISTING_HTML: &str = r#"
    <html><body><article>
        <div class="job" id="j77001">
            <a class="jtitle" href="/vacancies/77001">Programme Analyst</a>
        </div>
    </article></body></html>
"#;

const POSTING_HTML: &str = r#"
    <html><body><div class="container">
        <table><tbody><tr><td><h2>Programme Analyst</h2></td></tr></tbody></table>
        <div class="fp-snippet">
            <h3>Duties</h3>
            <p>Analyze country programmes and report findings.</p>
        </div>
        <ul class="list-group">
            <li class="list-group-item">Organization: UNICEF</li>
            <li class="list-group-item">Country: Kenya</li>
            <li class="list-group-item">City: Nairobi</li>
        </ul>
    </div></body></html>
"#;

const EXTRACTION_JSON: &str = r#"{
    "organization_name": "UNICEF",
    "post_number": "77001",
    "date_posted": "2025-01-05",
    "application_deadline": "2099-06-30",
    "post_name": "Programme Analyst",
    "contract_type": "fixed_term",
    "contract_duration": "2 years",
    "renewable": true,
    "location_region": "East Africa",
    "location_country": "Kenya",
    "location_city": "Nairobi",
    "work_arrangement": "on-site",
    "thematic_area": "Child Health",
    "position_level": "p-3",
    "brief_description": "Analyze country programmes.",
    "main_skills_competencies": "Analysis, reporting",
    "technical_skills": "Statistics",
    "minimum_academic_qualifications": "Masters degree",
    "minimum_experience": "5 years",
    "language_requirements": [
        {"language": "English", "requirement_level": "required", "proficiency_level": "fluent"},
        {"language": "Swahili", "requirement_level": "preferred", "proficiency_level": null}
    ],
    "tags": ["health", "programme"]
}"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn seeded_harness() -> TestHarness {
    init_tracing();
    let harness = TestHarness::new();
    harness.fetcher.add_page(LISTING_URL, LISTING_HTML);
    harness.fetcher.add_page(POSTING_URL, POSTING_HTML);
    harness.extractor.push_response(EXTRACTION_JSON);
    harness
}

#[tokio::test]
async fn test_end_to_end_ingestion() {
    let harness = seeded_harness();

    let report = harness.pipeline.run_discovery().await.unwrap();
    assert_eq!(report.seen, 1);
    assert_eq!(report.created, 1);

    let processed = harness.drain().await.unwrap();
    assert_eq!(processed, 2); // one download, one extract

    // Record reached the terminal success status
    let record = harness
        .store
        .find_record_by_post_number("77001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, RecordStatus::Processed);
    assert!(record.job_advertisement_id.is_some());
    assert!(record.content.unwrap().contains("Duties"));

    // Domain rows landed
    let ad = harness
        .store
        .find_advertisement_by_post_number("77001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ad.post_name, "Programme Analyst");
    assert_eq!(ad.contract_type, ContractType::FixedTerm);
    assert_eq!(ad.location_country, "Kenya");
    assert_eq!(harness.store.organization_count(), 1);

    let languages = harness
        .store
        .get_language_requirements(ad.id)
        .await
        .unwrap();
    assert_eq!(languages.len(), 2);

    // Search document was projected with derived fields
    let doc = harness.index.get(ad.id).unwrap();
    assert!(doc.is_active);
    assert!(doc.days_until_deadline > 0);
    assert_eq!(doc.organization.name, "UNICEF");

    // Cursor moved to the newest post number
    let cursor = harness
        .store
        .get_cursor("unjobs.org")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cursor.last_post_number.as_deref(), Some("77001"));
    assert_eq!(cursor.total_discovered, 1);

    // Operational view reflects the terminal state
    let statuses = harness.store.list_statuses().await.unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].post_number, "77001");
    assert_eq!(statuses[0].status, RecordStatus::Processed);
    assert!(statuses[0].last_error.is_none());
}

#[tokio::test]
async fn test_redelivered_stages_are_noops() {
    let harness = seeded_harness();
    harness.pipeline.run_discovery().await.unwrap();
    harness.drain().await.unwrap();

    let record = harness
        .store
        .find_record_by_post_number("77001")
        .await
        .unwrap()
        .unwrap();

    // At-least-once delivery means a processed record can see both
    // stages again; the status preconditions absorb them.
    let download = harness.pipeline.run_download(record.id).await.unwrap();
    assert_eq!(download, DownloadOutcome::Ignored);
    let extract = harness.pipeline.run_extract(record.id).await.unwrap();
    assert_eq!(extract, ExtractOutcome::Ignored);

    assert_eq!(harness.store.advertisement_count(), 1);
    assert_eq!(harness.extractor.calls(), 1);
}

#[tokio::test]
async fn test_concurrent_extraction_creates_one_advertisement() {
    let harness = TestHarness::new();
    harness.extractor.push_response(EXTRACTION_JSON);
    harness.extractor.push_response(EXTRACTION_JSON);

    let record = IngestionRecord::new("77001", POSTING_URL);
    harness.store.create_record_if_absent(&record).await.unwrap();
    harness.store.begin_download(record.id).await.unwrap();
    harness
        .store
        .complete_download(
            record.id,
            &PageDetails {
                title: "Programme Analyst".to_string(),
                content_markdown: "## Duties\nAnalyze.".to_string(),
                organization_name: Some("UNICEF".to_string()),
                location_country: Some("Kenya".to_string()),
                location_city: None,
            },
        )
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        harness.pipeline.run_extract(record.id),
        harness.pipeline.run_extract(record.id),
    );
    first.unwrap();
    second.unwrap();

    // Both executions may have run the model, but only one advertisement
    // exists and the record is linked to it.
    assert_eq!(harness.store.advertisement_count(), 1);
    let stored = harness.store.get_record(record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RecordStatus::Processed);
}

#[tokio::test]
async fn test_second_discovery_is_idempotent() {
    let harness = seeded_harness();

    let first = harness.pipeline.run_discovery().await.unwrap();
    assert_eq!(first.created, 1);

    // Same listing again: cursor blocks re-ingestion
    let second = harness.pipeline.run_discovery().await.unwrap();
    assert_eq!(second.seen, 1);
    assert_eq!(second.created, 0);

    assert_eq!(harness.store.record_count(), 1);
    let cursor = harness
        .store
        .get_cursor("unjobs.org")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cursor.total_discovered, 1);

    // Only the one original download task was ever enqueued
    let downloads = harness
        .queue
        .snapshot()
        .iter()
        .filter(|t| matches!(t.task, Task::Download { .. }))
        .count();
    assert_eq!(downloads, 1);
}

#[tokio::test]
async fn test_discovery_requeues_pending_record_without_a_task() {
    let harness = seeded_harness();

    // A record left behind by a pass that died before enqueueing its
    // task: it exists, but no download task does and the cursor never
    // advanced past it.
    let stranded = IngestionRecord::new("77001", POSTING_URL);
    harness
        .store
        .create_record_if_absent(&stranded)
        .await
        .unwrap();
    assert_eq!(harness.queue.open_count(), 0);

    let report = harness.pipeline.run_discovery().await.unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(harness.queue.open_count(), 1);

    harness.drain().await.unwrap();
    let record = harness
        .store
        .find_record_by_post_number("77001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, RecordStatus::Processed);
}

#[tokio::test]
async fn test_discovery_failure_is_stamped_on_cursor() {
    let harness = TestHarness::new(); // no listing registered: fetch 404s

    assert!(harness.pipeline.run_discovery().await.is_err());

    let cursor = harness
        .store
        .get_cursor("unjobs.org")
        .await
        .unwrap()
        .unwrap();
    assert!(cursor.last_error.is_some());
    assert!(cursor.last_post_number.is_none());
    assert_eq!(harness.store.record_count(), 0);
}

#[tokio::test]
async fn test_download_retries_then_fails_terminally() {
    let config = PipelineConfig {
        download_max_attempts: 2,
        ..Default::default()
    };
    let harness = TestHarness::with_config(config);
    harness.fetcher.add_page(LISTING_URL, LISTING_HTML);
    harness.fetcher.fail_next(POSTING_URL, 10); // never recovers

    harness.pipeline.run_discovery().await.unwrap();
    harness.drain_with_retries().await.unwrap();

    let record = harness
        .store
        .find_record_by_post_number("77001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, RecordStatus::Failed);
    assert_eq!(record.attempts, 2);
    assert!(record.last_error.unwrap().contains("503"));

    // Exactly one task per attempt, none left open
    let snapshot = harness.queue.snapshot();
    let downloads: Vec<_> = snapshot
        .iter()
        .filter(|t| matches!(t.task, Task::Download { .. }))
        .collect();
    assert_eq!(downloads.len(), 2);
    assert!(downloads.iter().all(|t| t.state == TaskState::Succeeded));
    assert_eq!(harness.queue.open_count(), 0);
}

#[tokio::test]
async fn test_download_recovers_after_transient_failure() {
    let harness = seeded_harness();
    harness.fetcher.fail_next(POSTING_URL, 1);

    harness.pipeline.run_discovery().await.unwrap();

    // First pass fails the fetch and schedules a delayed retry
    harness.drain().await.unwrap();
    assert_eq!(harness.queue.open_count(), 1);
    let record = harness
        .store
        .find_record_by_post_number("77001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, RecordStatus::Downloading);

    // The retry is not due yet, so a plain drain does nothing
    assert_eq!(harness.drain().await.unwrap(), 0);

    harness.drain_with_retries().await.unwrap();
    let record = harness
        .store
        .find_record_by_post_number("77001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, RecordStatus::Processed);
}

#[tokio::test]
async fn test_extraction_retries_with_backoff_then_fails() {
    let config = PipelineConfig {
        extract_max_attempts: 2,
        ..Default::default()
    };
    let harness = TestHarness::with_config(config);
    harness.fetcher.add_page(LISTING_URL, LISTING_HTML);
    harness.fetcher.add_page(POSTING_URL, POSTING_HTML);
    harness.extractor.fail_next(10);

    harness.pipeline.run_discovery().await.unwrap();
    harness.drain_with_retries().await.unwrap();

    let record = harness
        .store
        .find_record_by_post_number("77001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, RecordStatus::Failed);
    assert_eq!(record.attempts, 2);
    assert_eq!(harness.extractor.calls(), 2);
    assert_eq!(harness.store.advertisement_count(), 0);
    assert!(harness.index.is_empty());
    assert_eq!(harness.queue.open_count(), 0);
}

#[tokio::test]
async fn test_duplicate_posting_is_skipped() {
    let harness = seeded_harness();

    // An advertisement already published under this post number
    let seed = IngestionRecord::new("77001-prior", POSTING_URL);
    harness.store.create_record_if_absent(&seed).await.unwrap();
    let org = harness
        .store
        .get_or_create_organization("UNICEF", None)
        .await
        .unwrap();
    let extracted = unjobs_pipeline::types::extraction::ExtractedJob {
        post_name: Some("Programme Analyst".to_string()),
        post_number: Some("77001".to_string()),
        ..Default::default()
    };
    let mut prior = seed.clone();
    prior.post_name = Some("Programme Analyst".to_string());
    let (mut new_ad, langs) = extracted.into_advertisement(&prior, org.id, 30).unwrap();
    new_ad.post_number = "77001".to_string();
    harness
        .store
        .create_advertisement(seed.id, new_ad, langs)
        .await
        .unwrap();

    harness.pipeline.run_discovery().await.unwrap();
    harness.drain().await.unwrap();

    let record = harness
        .store
        .find_record_by_post_number("77001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, RecordStatus::Skipped);
    // No second advertisement, no extraction call
    assert_eq!(harness.store.advertisement_count(), 1);
    assert_eq!(harness.extractor.calls(), 0);
}

#[tokio::test]
async fn test_index_failure_does_not_roll_back_domain_writes() {
    let harness = seeded_harness();
    harness.index.fail_writes(true);

    harness.pipeline.run_discovery().await.unwrap();
    harness.drain().await.unwrap();

    // Domain state committed despite the index being down
    let record = harness
        .store
        .find_record_by_post_number("77001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, RecordStatus::Processed);
    assert_eq!(harness.store.advertisement_count(), 1);
    assert!(harness.index.is_empty());

    // A later rebuild backfills the missing document
    harness.index.fail_writes(false);
    let synced = unjobs_pipeline::pipeline::sync::rebuild_index(
        harness.store.as_ref(),
        harness.index.as_ref(),
    )
    .await
    .unwrap();
    assert_eq!(synced, 1);
    assert_eq!(harness.index.len(), 1);
}

#[tokio::test]
async fn test_concurrent_organization_upsert() {
    let harness = TestHarness::new();
    let (a, b) = tokio::join!(
        harness.store.get_or_create_organization("UNDP", None),
        harness.store.get_or_create_organization("UNDP", None),
    );
    assert_eq!(a.unwrap().id, b.unwrap().id);
    assert_eq!(harness.store.organization_count(), 1);
}
