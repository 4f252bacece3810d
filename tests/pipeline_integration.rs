//! End-to-end ranking runs against file-backed storage.

mod common;

use std::sync::Arc;

use common::fixtures::{
    JobBuilder, Workspace, candidate, job_board, open_index, permissive_config, strings,
};
use jobrank::embedding::TextEncoder;
use jobrank::model::{MatchRecord, Profile, rank_order};
use jobrank::pipeline::PipelineConfig;
use jobrank::scoring::Scorer;
use jobrank::storage::{MatchQuery, MatchRepository};
use jobrank::vectordb::SimilarityIndex;

fn record_for(records: &[MatchRecord], job_id: u64) -> &MatchRecord {
    records
        .iter()
        .find(|r| r.job_id == job_id)
        .expect("job should be ranked")
}

/// Scores every active job directly, without the pipeline or the index.
fn brute_force(ws: &Workspace, profile: &Profile, config: &PipelineConfig) -> Vec<MatchRecord> {
    let scorer = Scorer::from_config(&config.matching);
    let profile_vec = ws.encoder.encode(&profile.corpus_text()).unwrap();
    let mut records: Vec<MatchRecord> = job_board()
        .iter()
        .map(|job| {
            let job_vec = ws.encoder.encode(&job.embedding_text()).unwrap();
            scorer
                .score(profile, job, &profile_vec, &job_vec)
                .into_record(profile.id, job.id)
        })
        .filter(|r| r.overall_score >= config.matching.thresholds.minimum_match_score)
        .collect();
    records.sort_by(rank_order);
    records.truncate(config.matching.top_k);
    records
}

#[tokio::test]
async fn test_skill_overlap_evidence() {
    let ws = Workspace::new();
    let outcome = ws
        .pipeline(ws.open_index(), permissive_config())
        .run_user(1)
        .await
        .unwrap();

    let record = record_for(&outcome.records, 100);
    assert_eq!(record.skill_match_score, 0.5);
    assert_eq!(record.matched_skills, strings(&["python"]));
    assert_eq!(record.missing_skills, strings(&["sql"]));
}

#[tokio::test]
async fn test_salary_overlap_ratio() {
    let ws = Workspace::new();
    let outcome = ws
        .pipeline(ws.open_index(), permissive_config())
        .run_user(1)
        .await
        .unwrap();

    let record = record_for(&outcome.records, 100);
    assert!((record.salary_match_score - 1.0 / 3.0).abs() < 1e-3);
    // No salary posted.
    assert_eq!(record_for(&outcome.records, 102).salary_match_score, 0.7);
}

#[tokio::test]
async fn test_scores_are_bounded_and_ranked() {
    let ws = Workspace::new();
    let outcome = ws
        .pipeline(ws.open_index(), permissive_config())
        .run_user(1)
        .await
        .unwrap();

    assert_eq!(outcome.records.len(), job_board().len());
    for record in &outcome.records {
        for score in [
            record.semantic_score,
            record.skill_match_score,
            record.experience_match_score,
            record.location_match_score,
            record.salary_match_score,
            record.company_match_score,
            record.overall_score,
        ] {
            assert!((0.0..=1.0).contains(&score), "score out of range: {score}");
        }
    }
    for pair in outcome.records.windows(2) {
        assert_ne!(rank_order(&pair[0], &pair[1]), std::cmp::Ordering::Greater);
    }
}

#[tokio::test]
async fn test_default_threshold_filters_weak_matches() {
    let ws = Workspace::new();
    let outcome = ws
        .pipeline(ws.open_index(), PipelineConfig::default())
        .run_user(1)
        .await
        .unwrap();

    assert!(outcome.records.iter().all(|r| r.overall_score >= 0.6));
    assert!(!outcome.records.iter().any(|r| r.job_id == 103));
}

#[tokio::test]
async fn test_read_path_filters_and_paginates() {
    let ws = Workspace::new();
    ws.pipeline(ws.open_index(), permissive_config())
        .run_user(1)
        .await
        .unwrap();

    let store = ws.store();
    let all = store.get_matches(1, MatchQuery::new()).await.unwrap();
    let page = store
        .get_matches(1, MatchQuery::new().offset(1).limit(2))
        .await
        .unwrap();
    assert_eq!(page, all[1..3].to_vec());

    let floor = all[2].overall_score;
    let above = store
        .get_matches(1, MatchQuery::new().min_score(floor))
        .await
        .unwrap();
    assert!(above.len() >= 3);
    assert!(above.iter().all(|r| r.overall_score >= floor));
}

#[tokio::test]
async fn test_repeated_runs_write_identical_files() {
    let ws = Workspace::new();
    let pipeline = ws.pipeline(ws.open_index(), permissive_config());

    pipeline.run_user(1).await.unwrap();
    let first = std::fs::read(ws.match_file(1)).unwrap();
    pipeline.run_user(1).await.unwrap();
    let second = std::fs::read(ws.match_file(1)).unwrap();
    assert_eq!(first, second);

    // A fresh process over the same data directory produces the same bytes.
    ws.pipeline(ws.open_index(), permissive_config())
        .run_user(1)
        .await
        .unwrap();
    assert_eq!(std::fs::read(ws.match_file(1)).unwrap(), first);
}

#[tokio::test]
async fn test_corrupted_index_falls_back_to_full_scoring() {
    let ws = Workspace::new();
    let healthy = ws
        .pipeline(ws.open_index(), permissive_config())
        .run_user(1)
        .await
        .unwrap();
    assert!(ws.index_path().exists());

    let mut bytes = std::fs::read(ws.index_path()).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xFF;
    std::fs::write(ws.index_path(), &bytes).unwrap();

    let index = open_index(&ws.index_path());
    assert!(index.is_none());

    let outcome = ws
        .pipeline(index, permissive_config())
        .run_user(1)
        .await
        .unwrap();
    assert!(outcome.stats.used_fallback);
    assert_eq!(outcome.records, healthy.records);
    assert_eq!(
        outcome.records,
        brute_force(&ws, &candidate(1), &permissive_config())
    );
}

#[tokio::test]
async fn test_shortlisted_run_matches_brute_force_when_shortlist_covers_board() {
    let ws = Workspace::new();
    let config = PipelineConfig::default();
    let outcome = ws
        .pipeline(ws.open_index(), config.clone())
        .run_user(1)
        .await
        .unwrap();
    assert!(!outcome.stats.used_fallback);
    assert_eq!(outcome.records, brute_force(&ws, &candidate(1), &config));
}

#[tokio::test]
async fn test_index_survives_restart_and_skips_reencoding() {
    let ws = Workspace::new();
    ws.pipeline(ws.open_index(), permissive_config())
        .run_user(1)
        .await
        .unwrap();
    let calls = ws.encoder.call_count();

    let outcome = ws
        .pipeline(ws.open_index(), permissive_config())
        .run_user(1)
        .await
        .unwrap();
    assert_eq!(outcome.stats.embeddings_computed, 0);
    assert_eq!(outcome.stats.embeddings_reused, job_board().len());
    assert_eq!(ws.encoder.call_count(), calls + 1);
}

#[tokio::test]
async fn test_new_posting_is_indexed_incrementally() {
    let ws = Workspace::new();
    let index = ws.open_index().unwrap();
    let pipeline = ws.pipeline(Some(Arc::clone(&index)), permissive_config());
    pipeline.run_user(1).await.unwrap();
    assert_eq!(index.len(), job_board().len());

    ws.catalog.upsert_job(
        JobBuilder::new(200, "React Native Engineer")
            .required(&["react"])
            .build(),
    );
    let outcome = pipeline.run_user(1).await.unwrap();
    assert_eq!(outcome.stats.embeddings_computed, 1);
    assert_eq!(index.len(), job_board().len() + 1);
    assert_eq!(record_for(&outcome.records, 200).skill_match_score, 1.0);
}

#[tokio::test]
async fn test_profile_update_changes_ranking_inputs() {
    let ws = Workspace::new();
    let pipeline = ws.pipeline(ws.open_index(), permissive_config());
    let before = pipeline.run_user(1).await.unwrap();

    let mut profile = candidate(1);
    profile.skills = strings(&["python", "sql"]);
    ws.catalog.upsert_profile(profile);

    let after = pipeline.run_user(1).await.unwrap();
    assert_eq!(record_for(&before.records, 100).skill_match_score, 0.5);
    assert_eq!(record_for(&after.records, 100).skill_match_score, 1.0);
}
