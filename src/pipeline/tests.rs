use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::*;
use crate::config::{MatchingConfig, WeightConfig};
use crate::embedding::{EmbeddingVector, MockEncoder};
use crate::model::{JobId, JobPosting, MatchRecord, Profile, UserId};
use crate::provider::Catalog;
use crate::storage::{
    MatchQuery, MatchRepository, MemoryMatchStore, StorageError, StorageResult,
};
use crate::vectordb::{
    IndexConfig, IndexEntry, SearchHit, SimilarityIndex, VectorIndex, VectorIndexError,
    VectorIndexResult,
};

const DIM: usize = 8;

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
    }
}

fn permissive_config() -> PipelineConfig {
    let mut matching = MatchingConfig::default();
    matching.thresholds.minimum_match_score = 0.0;
    PipelineConfig {
        matching,
        retry: fast_retry(3),
    }
}

fn job(id: u64, title: &str, skills: &[&str]) -> JobPosting {
    JobPosting {
        required_skills: skills.iter().map(|s| s.to_string()).collect(),
        ..JobPosting::new(id, title, format!("{title} role"))
    }
}

fn candidate() -> Profile {
    Profile {
        current_title: Some("Backend Engineer".to_string()),
        skills: vec!["python".to_string(), "rust".to_string()],
        experience_years: Some(4.0),
        ..Profile::new(1)
    }
}

fn catalog() -> Catalog {
    Catalog::from_parts(
        vec![candidate()],
        catalog_jobs(),
    )
}

fn catalog_jobs() -> Vec<JobPosting> {
    vec![
        job(10, "Rust Engineer", &["rust"]),
        job(11, "Python Developer", &["python", "sql"]),
        job(12, "Data Analyst", &["sql", "excel"]),
        job(13, "Platform Engineer", &["rust", "python", "k8s"]),
        job(14, "Designer", &["figma"]),
    ]
}

struct Harness {
    catalog: Catalog,
    encoder: Arc<MockEncoder>,
    store: Arc<MemoryMatchStore>,
    index: Arc<VectorIndex>,
}

impl Harness {
    fn new() -> Self {
        Self::with_encoder(MockEncoder::new(DIM))
    }

    fn with_encoder(encoder: MockEncoder) -> Self {
        Self {
            catalog: catalog(),
            encoder: Arc::new(encoder),
            store: Arc::new(MemoryMatchStore::new()),
            index: Arc::new(VectorIndex::in_memory(IndexConfig::with_dim(DIM), "mock-v1").unwrap()),
        }
    }

    fn pipeline(&self, with_index: bool, config: PipelineConfig) -> MatchPipeline {
        let index: Option<Arc<dyn SimilarityIndex>> = if with_index {
            Some(self.index.clone())
        } else {
            None
        };
        MatchPipeline::builder()
            .profiles(Arc::new(self.catalog.clone()))
            .jobs(Arc::new(self.catalog.clone()))
            .encoder(self.encoder.clone())
            .index(index)
            .repository(self.store.clone())
            .config(config)
            .build()
            .unwrap()
    }
}

/// Only the semantic sub-score counts, so ranking by overall score equals
/// ranking by similarity.
fn semantic_only(shortlist_size: usize, top_k: usize) -> PipelineConfig {
    let mut config = permissive_config();
    config.matching.weights = WeightConfig {
        semantic_score: 1.0,
        skill_match: 0.0,
        experience_match: 0.0,
        location_match: 0.0,
        salary_match: 0.0,
        company_match: 0.0,
    };
    config.matching.shortlist_size = shortlist_size;
    config.matching.top_k = top_k;
    config
}

/// Candidate and job 10 share a direction; jobs 11..=14 are progressively
/// further from it.
fn graded_encoder() -> MockEncoder {
    let mut axis = vec![0.0; DIM];
    axis[0] = 1.0;
    let jobs = catalog_jobs();
    let mut encoder = MockEncoder::new(DIM)
        .with_vector(candidate().corpus_text(), axis.clone())
        .with_vector(jobs[0].embedding_text(), axis);
    for (step, job) in jobs.iter().skip(1).enumerate() {
        let mut values = vec![0.0; DIM];
        values[0] = 1.0;
        values[1] = 0.5 * (step as f32 + 1.0);
        encoder = encoder.with_vector(job.embedding_text(), values);
    }
    encoder
}

/// Delegates to a [`VectorIndex`] but refuses to prune, leaving stale entries.
struct StickyIndex(Arc<VectorIndex>);

impl SimilarityIndex for StickyIndex {
    fn dimension(&self) -> usize {
        self.0.dimension()
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn insert(
        &self,
        id: JobId,
        vector: &EmbeddingVector,
        content_hash: u64,
    ) -> VectorIndexResult<()> {
        self.0.insert(id, vector, content_hash)
    }

    fn insert_batch(&self, entries: &[IndexEntry]) -> VectorIndexResult<()> {
        self.0.insert_batch(entries)
    }

    fn search(&self, query: &EmbeddingVector, k: usize) -> VectorIndexResult<Vec<SearchHit>> {
        self.0.search(query, k)
    }

    fn lookup(&self, id: JobId) -> Option<(u64, EmbeddingVector)> {
        self.0.lookup(id)
    }

    fn retain(&self, _keep: &HashSet<JobId>) -> VectorIndexResult<usize> {
        Err(VectorIndexError::Serialization("read-only".to_string()))
    }
}

fn job_ids(records: &[MatchRecord]) -> Vec<u64> {
    records.iter().map(|r| r.job_id).collect()
}

/// Fails the first `failures` writes, then delegates.
struct FlakyRepository {
    inner: MemoryMatchStore,
    failures: AtomicUsize,
    attempts: AtomicUsize,
}

impl FlakyRepository {
    fn new(failures: usize) -> Self {
        Self {
            inner: MemoryMatchStore::new(),
            failures: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MatchRepository for FlakyRepository {
    async fn replace_matches(&self, user_id: UserId, records: Vec<MatchRecord>) -> StorageResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::WriteFailed {
                reason: "disk full".to_string(),
            });
        }
        self.inner.replace_matches(user_id, records).await
    }

    async fn get_matches(&self, user_id: UserId, query: MatchQuery) -> StorageResult<Vec<MatchRecord>> {
        self.inner.get_matches(user_id, query).await
    }
}

mod retry_tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(50));
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(5), Duration::from_secs(1));
        assert_eq!(policy.backoff(u32::MAX), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, RetryExhausted<String>> = fast_retry(3)
            .run("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n < 2 { Err(format!("fail {n}")) } else { Ok(7) } }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_reports_attempts_and_last_error() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = fast_retry(3)
            .run("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err::<(), _>(format!("fail {n}")) }
            })
            .await;
        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 3);
        assert_eq!(exhausted.error, "fail 2");
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let calls = AtomicUsize::new(0);
        let _ = fast_retry(0)
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("nope") }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

mod builder_tests {
    use super::*;

    #[test]
    fn test_missing_component() {
        let err = MatchPipeline::builder()
            .encoder(Arc::new(MockEncoder::new(DIM)))
            .build()
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingComponent(_)));
    }

    #[test]
    fn test_index_dimension_must_match_encoder() {
        let harness = Harness::with_encoder(MockEncoder::new(16));
        let index: Arc<dyn SimilarityIndex> = harness.index.clone();
        let err = MatchPipeline::builder()
            .profiles(Arc::new(harness.catalog.clone()))
            .jobs(Arc::new(harness.catalog.clone()))
            .encoder(harness.encoder.clone())
            .index(Some(index))
            .repository(harness.store.clone())
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DimensionMismatch {
                encoder: 16,
                index: 8
            }
        ));
    }

    #[test]
    fn test_invalid_matching_config_rejected() {
        let harness = Harness::new();
        let mut config = permissive_config();
        config.matching.top_k = 0;
        let result = MatchPipeline::builder()
            .profiles(Arc::new(harness.catalog.clone()))
            .jobs(Arc::new(harness.catalog.clone()))
            .encoder(harness.encoder.clone())
            .repository(harness.store.clone())
            .config(config)
            .build();
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }
}

mod run_tests {
    use super::*;

    #[tokio::test]
    async fn test_run_persists_ranked_matches() {
        let harness = Harness::new();
        let pipeline = harness.pipeline(true, permissive_config());

        let outcome = pipeline.run_user(1).await.unwrap();
        assert_eq!(outcome.user_id, 1);
        assert_eq!(outcome.records.len(), 5);
        assert_eq!(outcome.stats.jobs_considered, 5);
        assert_eq!(outcome.stats.embeddings_computed, 5);
        assert!(!outcome.stats.used_fallback);

        for pair in outcome.records.windows(2) {
            assert!(pair[0].overall_score >= pair[1].overall_score);
        }
        for record in &outcome.records {
            assert!((0.0..=1.0).contains(&record.overall_score));
            assert_eq!(record.user_id, 1);
        }

        let stored = harness.store.get_matches(1, MatchQuery::new()).await.unwrap();
        assert_eq!(stored, outcome.records);
        assert_eq!(harness.index.len(), 5);
    }

    #[tokio::test]
    async fn test_threshold_and_top_k() {
        let harness = Harness::new();
        let mut config = permissive_config();
        config.matching.top_k = 2;
        config.matching.shortlist_size = 5;
        let all = harness.pipeline(true, permissive_config()).run_user(1).await.unwrap();

        let outcome = harness.pipeline(true, config).run_user(1).await.unwrap();
        assert_eq!(job_ids(&outcome.records), job_ids(&all.records[..2]));

        let mut strict = permissive_config();
        strict.matching.thresholds.minimum_match_score = 1.0;
        let outcome = harness.pipeline(true, strict).run_user(1).await.unwrap();
        assert!(outcome.records.is_empty());
        assert!(harness.store.get_matches(1, MatchQuery::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shortlist_limits_scoring() {
        let harness = Harness::new();
        let mut config = permissive_config();
        config.matching.shortlist_size = 3;
        config.matching.top_k = 3;
        let outcome = harness.pipeline(true, config).run_user(1).await.unwrap();
        assert_eq!(outcome.stats.shortlisted, 3);
        assert_eq!(outcome.stats.scored, 3);
        assert!(outcome.records.len() <= 3);
    }

    #[tokio::test]
    async fn test_fallback_without_index_matches_brute_force() {
        let harness = Harness::new();
        let indexed = harness.pipeline(true, permissive_config()).run_user(1).await.unwrap();
        let fallback = harness.pipeline(false, permissive_config()).run_user(1).await.unwrap();

        assert!(fallback.stats.used_fallback);
        assert_eq!(fallback.records, indexed.records);
    }

    #[tokio::test]
    async fn test_repeated_runs_are_identical_and_reuse_embeddings() {
        let harness = Harness::new();
        let pipeline = harness.pipeline(true, permissive_config());

        let first = pipeline.run_user(1).await.unwrap();
        let calls = harness.encoder.call_count();
        let second = pipeline.run_user(1).await.unwrap();

        assert_eq!(first.records, second.records);
        assert_ne!(first.run_id, second.run_id);
        assert_eq!(harness.encoder.call_count(), calls);
        assert_eq!(second.stats.embeddings_reused, 5);
        assert_eq!(second.stats.embeddings_computed, 0);
    }

    #[tokio::test]
    async fn test_index_vectors_survive_cold_cache() {
        let harness = Harness::new();
        harness.pipeline(true, permissive_config()).run_user(1).await.unwrap();
        let calls = harness.encoder.call_count();

        // A new pipeline starts with an empty embedding cache.
        let outcome = harness.pipeline(true, permissive_config()).run_user(1).await.unwrap();
        assert_eq!(outcome.stats.embeddings_reused, 5);
        // Only the profile is re-encoded.
        assert_eq!(harness.encoder.call_count(), calls + 1);
    }

    #[tokio::test]
    async fn test_changed_job_content_is_reencoded() {
        let harness = Harness::new();
        let pipeline = harness.pipeline(true, permissive_config());
        pipeline.run_user(1).await.unwrap();

        let mut edited = job(11, "Python Developer", &["python"]);
        edited.description = "Now with Django".to_string();
        harness.catalog.upsert_job(edited);

        let outcome = pipeline.run_user(1).await.unwrap();
        assert_eq!(outcome.stats.embeddings_computed, 1);
        assert_eq!(outcome.stats.embeddings_reused, 4);
    }

    #[tokio::test]
    async fn test_inactive_jobs_are_not_ranked() {
        let harness = Harness::new();
        let pipeline = harness.pipeline(true, permissive_config());
        pipeline.run_user(1).await.unwrap();

        harness.catalog.set_job_active(10, false);
        let outcome = pipeline.run_user(1).await.unwrap();
        assert!(!job_ids(&outcome.records).contains(&10));
        assert_eq!(outcome.records.len(), 4);
        assert_eq!(outcome.stats.index_pruned, 1);
        assert_eq!(harness.index.ids(), vec![11, 12, 13, 14]);
    }

    #[tokio::test]
    async fn test_deactivated_top_job_does_not_empty_small_shortlist() {
        let harness = Harness::with_encoder(graded_encoder());
        let pipeline = harness.pipeline(true, semantic_only(1, 1));
        assert_eq!(job_ids(&pipeline.run_user(1).await.unwrap().records), vec![10]);

        harness.catalog.set_job_active(10, false);
        let outcome = pipeline.run_user(1).await.unwrap();
        assert_eq!(job_ids(&outcome.records), vec![11]);
        assert_eq!(outcome.stats.shortlisted, 1);
        let stored = harness.store.get_matches(1, MatchQuery::new()).await.unwrap();
        assert_eq!(job_ids(&stored), vec![11]);

        let baseline = harness.pipeline(false, semantic_only(1, 1)).run_user(1).await.unwrap();
        assert_eq!(outcome.records, baseline.records);
    }

    #[tokio::test]
    async fn test_stale_index_entries_widen_the_search() {
        let harness = Harness::with_encoder(graded_encoder());
        let sticky: Arc<dyn SimilarityIndex> = Arc::new(StickyIndex(harness.index.clone()));
        let pipeline = MatchPipeline::builder()
            .profiles(Arc::new(harness.catalog.clone()))
            .jobs(Arc::new(harness.catalog.clone()))
            .encoder(harness.encoder.clone())
            .index(Some(sticky))
            .repository(harness.store.clone())
            .config(semantic_only(2, 2))
            .build()
            .unwrap();
        pipeline.run_user(1).await.unwrap();

        harness.catalog.set_job_active(10, false);
        harness.catalog.set_job_active(11, false);
        let outcome = pipeline.run_user(1).await.unwrap();

        assert_eq!(harness.index.len(), 5);
        assert_eq!(outcome.stats.index_pruned, 0);
        assert!(!outcome.stats.used_fallback);
        assert_eq!(job_ids(&outcome.records), vec![12, 13]);
    }

    #[tokio::test]
    async fn test_active_job_missing_from_index_is_still_shortlisted() {
        let harness = Harness::with_encoder(graded_encoder());
        let pipeline = harness.pipeline(true, semantic_only(1, 1));
        pipeline.run_user(1).await.unwrap();

        // Another run with an older job list pruned job 10; its vector is still cached.
        let keep: HashSet<JobId> = [11, 12, 13, 14].into_iter().collect();
        harness.index.retain(&keep).unwrap();

        let outcome = pipeline.run_user(1).await.unwrap();
        assert_eq!(outcome.stats.embeddings_computed, 0);
        assert_eq!(job_ids(&outcome.records), vec![10]);
    }

    #[tokio::test]
    async fn test_empty_job_set_clears_matches() {
        let harness = Harness::new();
        let pipeline = harness.pipeline(true, permissive_config());
        pipeline.run_user(1).await.unwrap();

        for id in 10..=14 {
            harness.catalog.set_job_active(id, false);
        }
        let outcome = pipeline.run_user(1).await.unwrap();
        assert!(outcome.records.is_empty());
        assert!(harness.store.get_matches(1, MatchQuery::new()).await.unwrap().is_empty());
        assert_eq!(harness.store.user_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let harness = Harness::new();
        let err = harness
            .pipeline(true, permissive_config())
            .run_user(404)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ProfileNotFound { user_id: 404 }));
        assert_eq!(harness.store.user_count(), 0);
    }

    #[tokio::test]
    async fn test_profile_encoding_failure_keeps_previous_matches() {
        let harness = Harness::new();
        let pipeline = harness.pipeline(true, permissive_config());
        let first = pipeline.run_user(1).await.unwrap();

        let mut profile = Profile::new(1);
        profile.skills = vec!["go".to_string()];
        harness.catalog.upsert_profile(profile);
        harness.encoder.set_unavailable(true);

        let err = pipeline.run_user(1).await.unwrap_err();
        assert!(matches!(err, PipelineError::ProfileEncoding { user_id: 1, .. }));
        let stored = harness.store.get_matches(1, MatchQuery::new()).await.unwrap();
        assert_eq!(stored, first.records);
    }

    #[tokio::test]
    async fn test_job_encoding_failure_excludes_only_that_job() {
        let encoder = MockEncoder::new(DIM).failing_on("Data Analyst\nData Analyst role");
        let harness = Harness::with_encoder(encoder);
        let outcome = harness.pipeline(true, permissive_config()).run_user(1).await.unwrap();

        assert_eq!(outcome.stats.encoding_failures, 1);
        assert_eq!(outcome.records.len(), 4);
        assert!(!job_ids(&outcome.records).contains(&12));
        assert!(harness.index.lookup(12).is_none());
    }

    #[tokio::test]
    async fn test_blank_profile_falls_back_to_full_scoring() {
        let harness = Harness::new();
        harness.catalog.upsert_profile(Profile::new(2));
        let outcome = harness.pipeline(true, permissive_config()).run_user(2).await.unwrap();

        assert!(outcome.stats.used_fallback);
        assert_eq!(outcome.records.len(), 5);
        assert!(outcome.records.iter().all(|r| r.semantic_score == 0.0));
    }

    #[tokio::test]
    async fn test_persistence_retries_transient_failures() {
        let harness = Harness::new();
        let repo = Arc::new(FlakyRepository::new(2));
        let pipeline = MatchPipeline::builder()
            .profiles(Arc::new(harness.catalog.clone()))
            .jobs(Arc::new(harness.catalog.clone()))
            .encoder(harness.encoder.clone())
            .repository(repo.clone())
            .config(permissive_config())
            .build()
            .unwrap();

        let outcome = pipeline.run_user(1).await.unwrap();
        assert_eq!(repo.attempts.load(Ordering::SeqCst), 3);
        let stored = repo.get_matches(1, MatchQuery::new()).await.unwrap();
        assert_eq!(stored, outcome.records);
    }

    #[tokio::test]
    async fn test_persistence_gives_up_after_max_attempts() {
        let harness = Harness::new();
        let repo = Arc::new(FlakyRepository::new(10));
        let pipeline = MatchPipeline::builder()
            .profiles(Arc::new(harness.catalog.clone()))
            .jobs(Arc::new(harness.catalog.clone()))
            .encoder(harness.encoder.clone())
            .repository(repo.clone())
            .config(permissive_config())
            .build()
            .unwrap();

        let err = pipeline.run_user(1).await.unwrap_err();
        assert!(matches!(err, PipelineError::Persistence { attempts: 3, .. }));
        assert!(repo.get_matches(1, MatchQuery::new()).await.unwrap().is_empty());
    }
}

mod batch_tests {
    use super::*;

    fn harness_with_users() -> Harness {
        let harness = Harness::new();
        for id in 2..=6 {
            let mut profile = Profile::new(id);
            profile.skills = vec!["rust".to_string()];
            profile.current_title = Some(format!("Engineer {id}"));
            harness.catalog.upsert_profile(profile);
        }
        harness
    }

    #[tokio::test]
    async fn test_run_all_users() {
        let harness = harness_with_users();
        let runner = BatchRunner::new(Arc::new(harness.pipeline(true, permissive_config())), 3);

        let report = runner.run_all().await.unwrap();
        assert_eq!(report.completed(), 6);
        assert_eq!(report.failed(), 0);
        let users: Vec<_> = report.outcomes.iter().map(|(id, _)| *id).collect();
        assert_eq!(users, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(harness.store.user_count(), 6);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_batch() {
        let harness = harness_with_users();
        let runner = BatchRunner::new(Arc::new(harness.pipeline(true, permissive_config())), 2);

        let report = runner.run(vec![1, 999, 2]).await;
        assert_eq!(report.completed(), 2);
        assert_eq!(report.failed(), 1);
        assert!(matches!(
            report.outcomes[2],
            (999, UserOutcome::Failed(PipelineError::ProfileNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_batch_skips_pending_users() {
        let harness = harness_with_users();
        let cancel = CancellationFlag::new();
        let runner = BatchRunner::new(Arc::new(harness.pipeline(true, permissive_config())), 1)
            .with_cancellation(cancel.clone());

        cancel.cancel();
        assert!(runner.cancellation().is_cancelled());
        let report = runner.run_all().await.unwrap();
        assert_eq!(report.skipped(), 6);
        assert_eq!(harness.store.user_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_runs_for_same_user_are_consistent() {
        let harness = Harness::new();
        let pipeline = Arc::new(harness.pipeline(true, permissive_config()));

        let handles = (0..8).map(|_| {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move { pipeline.run_user(1).await })
        });
        let outcomes: Vec<PipelineOutcome> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        let stored = harness.store.get_matches(1, MatchQuery::new()).await.unwrap();
        for outcome in &outcomes {
            assert_eq!(outcome.records, stored);
        }
    }
}
