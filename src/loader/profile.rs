use serde::de::DeserializeOwned;

use crate::entities::{self, Experience, Project, Skill, SkillGroup};
use crate::source::{decode_items, ContentSource, SourceError};

use super::batch::{load_batch, BatchOutcome, BatchRequest};

const PROJECTS: &str = "projects";
const EXPERIENCE: &str = "experience";
const SKILLS: &str = "skills";

/// Per-collection item bounds for the profile load. Defaults match
/// what the landing page shows before "view all" links take over.
#[derive(Clone, Copy, Debug)]
pub struct ProfileLimits {
    pub projects: usize,
    pub experience: usize,
    pub skills: usize,
}

impl Default for ProfileLimits {
    fn default() -> Self {
        Self {
            projects: 6,
            experience: 10,
            skills: 20,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CollectionFailure {
    pub collection: String,
    pub message: String,
}

/// Everything the landing page renders: featured projects, work
/// history (most recent first), and skills grouped by category.
/// Collections that failed to load are listed in `failures` and come
/// back empty; the rest are unaffected.
#[derive(Clone, Debug, Default)]
pub struct Profile {
    pub projects: Vec<Project>,
    pub experience: Vec<Experience>,
    pub skills: Vec<SkillGroup>,
    pub failures: Vec<CollectionFailure>,
}

impl Profile {
    pub fn failed(&self, collection: &str) -> bool {
        self.failures.iter().any(|f| f.collection == collection)
    }
}

/// Loads the three profile collections in one parallel batch and
/// applies their derived steps. One collection failing never aborts
/// the others.
pub async fn load_profile(source: &dyn ContentSource, limits: ProfileLimits) -> Profile {
    let requests = [
        BatchRequest::new(PROJECTS, limits.projects),
        BatchRequest::new(EXPERIENCE, limits.experience),
        BatchRequest::new(SKILLS, limits.skills),
    ];
    let mut outcomes = load_batch(source, &requests).await.into_iter();

    let mut failures = Vec::new();

    let projects = take::<Project>(outcomes.next(), &mut failures);

    let mut experience = take::<Experience>(outcomes.next(), &mut failures);
    entities::sort_by_recency(&mut experience);

    let skills = take::<Skill>(outcomes.next(), &mut failures);

    Profile {
        projects,
        experience,
        skills: entities::group_by_category(skills),
        failures,
    }
}

fn take<T: DeserializeOwned>(
    outcome: Option<BatchOutcome>,
    failures: &mut Vec<CollectionFailure>,
) -> Vec<T> {
    let Some(outcome) = outcome else {
        return Vec::new();
    };
    let decoded = outcome
        .result
        .and_then(|items| decode_items(&outcome.collection, items));
    match decoded {
        Ok(records) => records,
        Err(e) => {
            record_failure(failures, &outcome.collection, &e);
            Vec::new()
        }
    }
}

fn record_failure(failures: &mut Vec<CollectionFailure>, collection: &str, error: &SourceError) {
    failures.push(CollectionFailure {
        collection: collection.to_string(),
        message: error.to_string(),
    });
}
