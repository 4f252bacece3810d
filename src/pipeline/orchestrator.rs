use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::error::{PipelineError, PipelineResult};
use super::retry::RetryPolicy;
use crate::cache::{EmbeddingCache, EmbeddingKey};
use crate::config::MatchingConfig;
use crate::embedding::{EmbeddingError, EmbeddingVector, TextEncoder};
use crate::model::{JobId, JobPosting, MatchRecord, Profile, UserId, rank_order};
use crate::provider::{JobProvider, ProfileProvider};
use crate::scoring::Scorer;
use crate::storage::{MatchRepository, UserLocks};
use crate::vectordb::{IndexEntry, SimilarityIndex};

/// Tunables for one pipeline instance.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub matching: MatchingConfig,
    pub retry: RetryPolicy,
}

/// Counters for one run, logged on completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub jobs_considered: usize,
    /// Job vectors served by the cache or the index.
    pub embeddings_reused: usize,
    pub embeddings_computed: usize,
    pub encoding_failures: usize,
    pub shortlisted: usize,
    /// Index entries dropped because their job is no longer active.
    pub index_pruned: usize,
    pub scored: usize,
    pub persisted: usize,
    /// Scored every active job because the index was absent or unusable.
    pub used_fallback: bool,
}

/// Result of a successful run. `records` is exactly what was persisted.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    pub user_id: UserId,
    pub records: Vec<MatchRecord>,
    pub stats: RunStats,
}

/// Fetch → embed → shortlist → score → persist, for one user at a time.
///
/// Runs for the same user are serialized; runs for different users proceed
/// concurrently. A fatal error leaves previously persisted matches untouched.
pub struct MatchPipeline {
    profiles: Arc<dyn ProfileProvider>,
    jobs: Arc<dyn JobProvider>,
    encoder: Arc<dyn TextEncoder>,
    index: Option<Arc<dyn SimilarityIndex>>,
    repository: Arc<dyn MatchRepository>,
    cache: EmbeddingCache,
    scorer: Scorer,
    config: PipelineConfig,
    locks: UserLocks,
}

impl std::fmt::Debug for MatchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchPipeline")
            .field("model_version", &self.encoder.model_version())
            .field("has_index", &self.index.is_some())
            .field("config", &self.config)
            .finish()
    }
}

#[derive(Default)]
pub struct MatchPipelineBuilder {
    profiles: Option<Arc<dyn ProfileProvider>>,
    jobs: Option<Arc<dyn JobProvider>>,
    encoder: Option<Arc<dyn TextEncoder>>,
    index: Option<Arc<dyn SimilarityIndex>>,
    repository: Option<Arc<dyn MatchRepository>>,
    cache: Option<EmbeddingCache>,
    config: PipelineConfig,
}

impl MatchPipelineBuilder {
    pub fn profiles(mut self, profiles: Arc<dyn ProfileProvider>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    pub fn jobs(mut self, jobs: Arc<dyn JobProvider>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn encoder(mut self, encoder: Arc<dyn TextEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// Without an index every run scores all active jobs.
    pub fn index(mut self, index: Option<Arc<dyn SimilarityIndex>>) -> Self {
        self.index = index;
        self
    }

    pub fn repository(mut self, repository: Arc<dyn MatchRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn cache(mut self, cache: EmbeddingCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> PipelineResult<MatchPipeline> {
        let profiles = self
            .profiles
            .ok_or(PipelineError::MissingComponent("profile provider"))?;
        let jobs = self
            .jobs
            .ok_or(PipelineError::MissingComponent("job provider"))?;
        let encoder = self
            .encoder
            .ok_or(PipelineError::MissingComponent("encoder"))?;
        let repository = self
            .repository
            .ok_or(PipelineError::MissingComponent("match repository"))?;

        self.config.matching.validate()?;

        if let Some(index) = &self.index
            && index.dimension() != encoder.dimension()
        {
            return Err(PipelineError::DimensionMismatch {
                encoder: encoder.dimension(),
                index: index.dimension(),
            });
        }

        Ok(MatchPipeline {
            profiles,
            jobs,
            encoder,
            index: self.index,
            repository,
            cache: self.cache.unwrap_or_default(),
            scorer: Scorer::from_config(&self.config.matching),
            config: self.config,
            locks: UserLocks::new(),
        })
    }
}

/// Active job with the vector it will be scored with.
struct EmbeddedJob {
    job: JobPosting,
    vector: EmbeddingVector,
}

impl MatchPipeline {
    pub fn builder() -> MatchPipelineBuilder {
        MatchPipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn profiles(&self) -> &Arc<dyn ProfileProvider> {
        &self.profiles
    }

    /// Recomputes and atomically replaces the user's ranked matches.
    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run_user(&self, user_id: UserId) -> PipelineResult<PipelineOutcome> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));

        let _guard = self.locks.lock(user_id).await;
        let mut stats = RunStats::default();

        let (profile, jobs) =
            tokio::try_join!(self.profiles.profile(user_id), self.jobs.active_jobs())?;
        let profile = profile.ok_or(PipelineError::ProfileNotFound { user_id })?;
        let jobs: Vec<JobPosting> = jobs.into_iter().filter(|j| j.is_active).collect();
        stats.jobs_considered = jobs.len();
        debug!(jobs = jobs.len(), "Fetched profile and active jobs");
        let active: HashSet<JobId> = jobs.iter().map(|j| j.id).collect();

        let profile_vec = self.embed_profile(&profile).await?;
        let embedded = self.embed_jobs(jobs, &mut stats).await?;
        self.prune_index(active, &mut stats).await?;

        let candidates = self.shortlist(&profile_vec, &embedded, &mut stats);
        stats.shortlisted = candidates.len();

        let records = self.score(&profile, &profile_vec, &candidates, &mut stats);
        stats.persisted = records.len();

        let repository = &self.repository;
        self.config
            .retry
            .run("replace_matches", || {
                repository.replace_matches(user_id, records.clone())
            })
            .await
            .map_err(|e| PipelineError::Persistence {
                attempts: e.attempts,
                source: e.error,
            })?;

        info!(
            jobs = stats.jobs_considered,
            reused = stats.embeddings_reused,
            computed = stats.embeddings_computed,
            encoding_failures = stats.encoding_failures,
            shortlisted = stats.shortlisted,
            pruned = stats.index_pruned,
            scored = stats.scored,
            persisted = stats.persisted,
            fallback = stats.used_fallback,
            "Match run completed"
        );

        Ok(PipelineOutcome {
            run_id,
            user_id,
            records,
            stats,
        })
    }

    async fn embed_profile(&self, profile: &Profile) -> PipelineResult<EmbeddingVector> {
        let key = EmbeddingKey::Profile(profile.id);
        let hash = profile.corpus_hash();
        if let Some(vector) = self.cache.get(key, hash) {
            return Ok(vector);
        }

        let encoder = Arc::clone(&self.encoder);
        let text = profile.corpus_text();
        let vector = tokio::task::spawn_blocking(move || encoder.encode(&text))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))?
            .map_err(|source| PipelineError::ProfileEncoding {
                user_id: profile.id,
                source,
            })?;

        self.cache.insert(key, hash, vector.clone());
        Ok(vector)
    }

    /// Resolves a vector for every job: cache, then the index's stored vector
    /// when its content tag still matches, then the encoder. Jobs that fail to
    /// encode are dropped from this run.
    async fn embed_jobs(
        &self,
        jobs: Vec<JobPosting>,
        stats: &mut RunStats,
    ) -> PipelineResult<Vec<EmbeddedJob>> {
        let mut resolved: Vec<Option<EmbeddingVector>> = Vec::with_capacity(jobs.len());
        let mut pending: Vec<usize> = Vec::new();

        for (pos, job) in jobs.iter().enumerate() {
            let key = EmbeddingKey::Job(job.id);
            let hash = job.content_hash();
            let vector = self.cache.get(key, hash).or_else(|| {
                let (tag, vector) = self.index.as_ref()?.lookup(job.id)?;
                (tag == hash).then(|| {
                    self.cache.insert(key, hash, vector.clone());
                    vector
                })
            });
            if vector.is_none() {
                pending.push(pos);
            }
            resolved.push(vector);
        }
        stats.embeddings_reused = jobs.len() - pending.len();

        if !pending.is_empty() {
            let texts: Vec<String> = pending
                .iter()
                .map(|&pos| jobs[pos].embedding_text())
                .collect();
            let encoded = self.encode_jobs(texts).await?;

            let mut fresh = Vec::with_capacity(pending.len());
            for (&pos, result) in pending.iter().zip(encoded) {
                let job = &jobs[pos];
                match result {
                    Ok(vector) => {
                        let hash = job.content_hash();
                        self.cache
                            .insert(EmbeddingKey::Job(job.id), hash, vector.clone());
                        fresh.push(IndexEntry::new(job.id, hash, vector.clone()));
                        resolved[pos] = Some(vector);
                    }
                    Err(error) => {
                        warn!(
                            job_id = job.id,
                            error = %error,
                            "Job encoding failed, excluding from run"
                        );
                        stats.encoding_failures += 1;
                    }
                }
            }
            stats.embeddings_computed = fresh.len();
            self.upsert_index(fresh, stats).await?;
        }

        Ok(jobs
            .into_iter()
            .zip(resolved)
            .filter_map(|(job, vector)| vector.map(|vector| EmbeddedJob { job, vector }))
            .collect())
    }

    /// One batch call; if it fails, each text is retried on its own so a single
    /// bad item cannot sink the rest.
    async fn encode_jobs(
        &self,
        texts: Vec<String>,
    ) -> PipelineResult<Vec<Result<EmbeddingVector, EmbeddingError>>> {
        let encoder = Arc::clone(&self.encoder);
        tokio::task::spawn_blocking(move || {
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            match encoder.encode_batch(&refs) {
                Ok(vectors) => vectors.into_iter().map(Ok).collect(),
                Err(error) => {
                    debug!(error = %error, "Batch encoding failed, encoding one by one");
                    refs.iter().map(|text| encoder.encode(text)).collect()
                }
            }
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))
    }

    async fn upsert_index(
        &self,
        entries: Vec<IndexEntry>,
        stats: &mut RunStats,
    ) -> PipelineResult<()> {
        let Some(index) = self.index.as_ref().map(Arc::clone) else {
            return Ok(());
        };
        if entries.is_empty() {
            return Ok(());
        }

        let result = tokio::task::spawn_blocking(move || index.insert_batch(&entries))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))?;
        if let Err(error) = result {
            warn!(error = %error, "Index update failed, scoring all active jobs");
            stats.used_fallback = true;
        }
        Ok(())
    }

    /// Removes index entries for jobs outside this run's active set. A failure
    /// only leaves stale entries behind; the shortlist skips them.
    async fn prune_index(
        &self,
        active: HashSet<JobId>,
        stats: &mut RunStats,
    ) -> PipelineResult<()> {
        let Some(index) = self.index.as_ref().map(Arc::clone) else {
            return Ok(());
        };

        let result = tokio::task::spawn_blocking(move || index.retain(&active))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))?;
        match result {
            Ok(removed) => stats.index_pruned = removed,
            Err(error) => warn!(error = %error, "Index pruning failed, keeping stale entries"),
        }
        Ok(())
    }

    /// Top-N embedded jobs by similarity, or every embedded job when the index
    /// cannot be used.
    ///
    /// Index hits for ids outside the run are skipped and the search widens
    /// until N usable hits are found or the index is exhausted. Embedded jobs the
    /// index does not hold (never inserted, or pruned by a concurrent run) are
    /// scored exactly and merged in.
    fn shortlist<'a>(
        &self,
        profile_vec: &EmbeddingVector,
        embedded: &'a [EmbeddedJob],
        stats: &mut RunStats,
    ) -> Vec<&'a EmbeddedJob> {
        let everything = || embedded.iter().collect::<Vec<_>>();

        let index = match &self.index {
            Some(index) if !stats.used_fallback => index,
            _ => {
                stats.used_fallback = true;
                return everything();
            }
        };
        if profile_vec.is_sentinel() {
            debug!("Profile corpus is blank, skipping shortlist");
            stats.used_fallback = true;
            return everything();
        }

        let wanted = self.config.matching.shortlist_size.min(embedded.len());
        let (indexed, missing): (Vec<&EmbeddedJob>, Vec<&EmbeddedJob>) =
            embedded.iter().partition(|e| index.contains(e.job.id));
        if !missing.is_empty() {
            debug!(
                missing = missing.len(),
                "Active jobs absent from the index, scoring exactly"
            );
        }
        let mut picked: Vec<(&EmbeddedJob, f32)> = missing
            .into_iter()
            .map(|e| (e, e.vector.dot(profile_vec)))
            .collect();

        let by_id: HashMap<JobId, &EmbeddedJob> =
            indexed.into_iter().map(|e| (e.job.id, e)).collect();
        let mut k = self.config.matching.shortlist_size;
        loop {
            let hits = match index.search(profile_vec, k) {
                Ok(hits) => hits,
                Err(error) => {
                    warn!(error = %error, "Index search failed, scoring all active jobs");
                    stats.used_fallback = true;
                    return everything();
                }
            };
            let exhausted = hits.len() < k || k >= index.len();
            let usable: Vec<(&EmbeddedJob, f32)> = hits
                .iter()
                .filter_map(|hit| by_id.get(&hit.id).map(|e| (*e, hit.score)))
                .take(wanted)
                .collect();

            if usable.len() >= wanted.min(by_id.len()) || exhausted {
                picked.extend(usable);
                break;
            }
            debug!(
                k,
                usable = usable.len(),
                "Shortlist short of active jobs, widening search"
            );
            k = k.saturating_mul(2).min(index.len());
        }

        picked.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| a.0.job.id.cmp(&b.0.job.id))
        });
        picked.truncate(wanted);
        picked.into_iter().map(|(e, _)| e).collect()
    }

    fn score(
        &self,
        profile: &Profile,
        profile_vec: &EmbeddingVector,
        candidates: &[&EmbeddedJob],
        stats: &mut RunStats,
    ) -> Vec<MatchRecord> {
        let threshold = self.config.matching.thresholds.minimum_match_score;
        stats.scored = candidates.len();

        let mut records: Vec<MatchRecord> = candidates
            .iter()
            .map(|c| {
                self.scorer
                    .score(profile, &c.job, profile_vec, &c.vector)
                    .into_record(profile.id, c.job.id)
            })
            .filter(|record| record.overall_score >= threshold)
            .collect();

        records.sort_by(rank_order);
        records.truncate(self.config.matching.top_k);
        records
    }
}
