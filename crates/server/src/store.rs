//! In-memory call guide and interview stores
//!
//! Both stores keep records in a `RwLock<HashMap>` and hand out clones.
//! Interview status changes go through [`InterviewStore::update`], which
//! runs the mutation under the write lock so two requests cannot both
//! move the same interview.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;

use interview_agent_core::{CallGuide, Interview, InterviewStatus};

use crate::ServerError;

/// Call guides keyed by guide id
#[derive(Default)]
pub struct CallGuideStore {
    guides: RwLock<HashMap<String, CallGuide>>,
}

impl CallGuideStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, guide: CallGuide) -> Result<CallGuide, ServerError> {
        let mut guides = self.guides.write();
        if guides.contains_key(&guide.guide_id) {
            return Err(ServerError::Conflict(format!(
                "Call guide {} already exists",
                guide.guide_id
            )));
        }
        guides.insert(guide.guide_id.clone(), guide.clone());
        Ok(guide)
    }

    pub fn get(&self, guide_id: &str) -> Result<CallGuide, ServerError> {
        self.guides
            .read()
            .get(guide_id)
            .cloned()
            .ok_or_else(|| ServerError::NotFound(format!("Call guide {} not found", guide_id)))
    }

    pub fn contains(&self, guide_id: &str) -> bool {
        self.guides.read().contains_key(guide_id)
    }

    /// Oldest first
    pub fn list(&self) -> Vec<CallGuide> {
        let mut guides: Vec<CallGuide> = self.guides.read().values().cloned().collect();
        guides.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        guides
    }

    /// Replaces a guide's content, keeping its id and creation time and
    /// bumping the minor version
    pub fn update(&self, guide_id: &str, mut guide: CallGuide) -> Result<CallGuide, ServerError> {
        let mut guides = self.guides.write();
        let existing = guides
            .get(guide_id)
            .ok_or_else(|| ServerError::NotFound(format!("Call guide {} not found", guide_id)))?;

        guide.guide_id = guide_id.to_string();
        guide.created_at = existing.created_at;
        guide.version = next_version(&existing.version);
        guide.updated_at = Utc::now();

        guides.insert(guide_id.to_string(), guide.clone());
        Ok(guide)
    }

    pub fn remove(&self, guide_id: &str) -> Result<(), ServerError> {
        self.guides
            .write()
            .remove(guide_id)
            .map(|_| ())
            .ok_or_else(|| ServerError::NotFound(format!("Call guide {} not found", guide_id)))
    }

    pub fn len(&self) -> usize {
        self.guides.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn next_version(version: &str) -> String {
    match version.split_once('.') {
        Some((major, minor)) => match minor.parse::<u32>() {
            Ok(minor) => format!("{}.{}", major, minor + 1),
            Err(_) => format!("{}.1", version),
        },
        None => format!("{}.1", version),
    }
}

/// Interviews keyed by interview id
#[derive(Default)]
pub struct InterviewStore {
    interviews: RwLock<HashMap<String, Interview>>,
}

impl InterviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, interview: Interview) -> Interview {
        self.interviews
            .write()
            .insert(interview.interview_id.clone(), interview.clone());
        interview
    }

    pub fn get(&self, interview_id: &str) -> Result<Interview, ServerError> {
        self.interviews
            .read()
            .get(interview_id)
            .cloned()
            .ok_or_else(|| not_found(interview_id))
    }

    /// Newest first, optionally filtered by status
    pub fn list(&self, status: Option<InterviewStatus>, limit: usize) -> Vec<Interview> {
        let mut interviews: Vec<Interview> = self
            .interviews
            .read()
            .values()
            .filter(|i| status.map_or(true, |s| i.status == s))
            .cloned()
            .collect();
        interviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        interviews.truncate(limit);
        interviews
    }

    /// Applies `f` to the stored interview under the write lock
    pub fn update<F, R>(&self, interview_id: &str, f: F) -> Result<R, ServerError>
    where
        F: FnOnce(&mut Interview) -> Result<R, ServerError>,
    {
        let mut interviews = self.interviews.write();
        let interview = interviews
            .get_mut(interview_id)
            .ok_or_else(|| not_found(interview_id))?;
        f(interview)
    }

    /// Stores the final record of a conducted interview
    pub fn replace(&self, interview: Interview) {
        self.interviews
            .write()
            .insert(interview.interview_id.clone(), interview);
    }

    pub fn count_by_status(&self, status: InterviewStatus) -> usize {
        self.interviews
            .read()
            .values()
            .filter(|i| i.status == status)
            .count()
    }
}

fn not_found(interview_id: &str) -> ServerError {
    ServerError::NotFound(format!("Interview {} not found", interview_id))
}
