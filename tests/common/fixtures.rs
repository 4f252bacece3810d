//! Shared builders for integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use jobrank::embedding::MockEncoder;
use jobrank::model::{
    CompanySize, EmployerSummary, JobPosting, Profile, RemotePolicy, RemotePreference,
    SalaryRange,
};
use jobrank::pipeline::{MatchPipeline, PipelineConfig, RetryPolicy};
use jobrank::provider::Catalog;
use jobrank::storage::FileMatchStore;
use jobrank::vectordb::{IndexConfig, SimilarityIndex, VectorIndex};
use jobrank::MatchingConfig;
use tempfile::TempDir;

pub const DIM: usize = 16;
pub const MODEL_VERSION: &str = "mock-v1";

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub struct JobBuilder {
    job: JobPosting,
}

impl JobBuilder {
    pub fn new(id: u64, title: &str) -> Self {
        Self {
            job: JobPosting::new(id, title, format!("{title} at a growing team")),
        }
    }

    pub fn required(mut self, skills: &[&str]) -> Self {
        self.job.required_skills = strings(skills);
        self
    }

    pub fn level(mut self, level: &str) -> Self {
        self.job.experience_level = Some(level.to_string());
        self
    }

    pub fn location(mut self, location: &str) -> Self {
        self.job.location = Some(location.to_string());
        self
    }

    pub fn remote(mut self, policy: RemotePolicy) -> Self {
        self.job.remote_policy = Some(policy);
        self
    }

    pub fn salary(mut self, min: u64, max: u64) -> Self {
        self.job.salary = SalaryRange::new(min, max);
        self
    }

    pub fn employer(mut self, name: &str, size: CompanySize, rating: f32) -> Self {
        self.job.employer = Some(EmployerSummary {
            name: name.to_string(),
            size: Some(size),
            rating: Some(rating),
            industry: None,
        });
        self
    }

    pub fn build(self) -> JobPosting {
        self.job
    }
}

pub fn candidate(id: u64) -> Profile {
    Profile {
        current_title: Some("Software Engineer".to_string()),
        resume_text: Some("Built data pipelines and web frontends".to_string()),
        skills: strings(&["python", "react"]),
        experience_years: Some(6.0),
        preferred_locations: strings(&["Austin"]),
        remote_preference: Some(RemotePreference::Flexible),
        desired_salary: SalaryRange::new(100_000, 130_000),
        preferred_company_sizes: vec![CompanySize::Medium],
        ..Profile::new(id)
    }
}

pub fn job_board() -> Vec<JobPosting> {
    vec![
        JobBuilder::new(100, "Python Engineer")
            .required(&["python", "sql"])
            .level("senior")
            .location("Austin, TX")
            .salary(120_000, 150_000)
            .employer("Acme", CompanySize::Medium, 4.2)
            .build(),
        JobBuilder::new(101, "Frontend Developer")
            .required(&["react", "typescript"])
            .level("mid")
            .location("Remote")
            .remote(RemotePolicy::Remote)
            .salary(110_000, 140_000)
            .build(),
        JobBuilder::new(102, "Data Engineer")
            .required(&["python", "spark"])
            .level("senior")
            .location("Denver, CO")
            .remote(RemotePolicy::Hybrid)
            .build(),
        JobBuilder::new(103, "Store Manager")
            .required(&["retail"])
            .level("lead")
            .location("Miami, FL")
            .salary(50_000, 60_000)
            .build(),
        JobBuilder::new(104, "Full Stack Engineer")
            .required(&["python", "react"])
            .level("senior")
            .location("Austin")
            .salary(125_000, 160_000)
            .employer("Initech", CompanySize::Medium, 3.5)
            .build(),
        JobBuilder::new(105, "Junior QA")
            .level("junior")
            .build(),
    ]
}

pub fn permissive_config() -> PipelineConfig {
    let mut matching = MatchingConfig::default();
    matching.thresholds.minimum_match_score = 0.0;
    PipelineConfig {
        matching,
        retry: RetryPolicy::none(),
    }
}

/// Temp data directory with the same layout the binary uses.
pub struct Workspace {
    pub dir: TempDir,
    pub catalog: Catalog,
    pub encoder: Arc<MockEncoder>,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("tempdir"),
            catalog: Catalog::from_parts(vec![candidate(1)], job_board()),
            encoder: Arc::new(MockEncoder::new(DIM)),
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.path().join("job_index.rkyv")
    }

    pub fn matches_dir(&self) -> PathBuf {
        self.dir.path().join("matches")
    }

    pub fn match_file(&self, user_id: u64) -> PathBuf {
        self.matches_dir().join(format!("{user_id}.rkyv"))
    }

    pub fn store(&self) -> Arc<FileMatchStore> {
        Arc::new(FileMatchStore::new(self.matches_dir()))
    }

    pub fn open_index(&self) -> Option<Arc<dyn SimilarityIndex>> {
        open_index(&self.index_path())
    }

    pub fn pipeline(
        &self,
        index: Option<Arc<dyn SimilarityIndex>>,
        config: PipelineConfig,
    ) -> MatchPipeline {
        MatchPipeline::builder()
            .profiles(Arc::new(self.catalog.clone()))
            .jobs(Arc::new(self.catalog.clone()))
            .encoder(self.encoder.clone())
            .index(index)
            .repository(self.store())
            .config(config)
            .build()
            .expect("pipeline")
    }
}

/// `None` when the snapshot fails validation, mirroring the binary's startup.
pub fn open_index(path: &Path) -> Option<Arc<dyn SimilarityIndex>> {
    VectorIndex::open(path, IndexConfig::with_dim(DIM), MODEL_VERSION)
        .ok()
        .map(|index| Arc::new(index) as Arc<dyn SimilarityIndex>)
}
