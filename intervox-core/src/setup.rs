use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SetupValidationError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("at least one skill is required for a skills-based interview")]
    NoSkills,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterviewCategory {
    #[serde(rename = "HR")]
    Hr,
    DomainSpecific,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SetupInputType {
    JobDescription,
    SkillsBased,
}

/// Parameters collected before a session starts; sent verbatim to the remote
/// start endpoint once validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewSetup {
    pub company_name: Option<String>,
    pub job_role: Option<String>,
    pub category: InterviewCategory,
    pub interview_type: Option<String>,
    pub domain: Option<String>,
    pub input_type: SetupInputType,
    #[serde(default)]
    pub skills: Vec<String>,
    pub job_description: Option<String>,
    pub max_questions: u32,
}

impl InterviewSetup {
    /// Checks the required fields for the chosen category before any network
    /// call is made. User-correctable; blocks session start.
    pub fn validate(&self) -> Result<(), SetupValidationError> {
        match self.category {
            InterviewCategory::Hr => {
                if none_or_blank(&self.interview_type) {
                    return Err(SetupValidationError::Missing("interview type"));
                }
            }
            InterviewCategory::DomainSpecific => {
                if none_or_blank(&self.company_name) {
                    return Err(SetupValidationError::Missing("company name"));
                }
                if none_or_blank(&self.job_role) {
                    return Err(SetupValidationError::Missing("job role"));
                }
                if none_or_blank(&self.domain) {
                    return Err(SetupValidationError::Missing("domain"));
                }
                match self.input_type {
                    SetupInputType::JobDescription => {
                        if none_or_blank(&self.job_description) {
                            return Err(SetupValidationError::Missing("job description"));
                        }
                    }
                    SetupInputType::SkillsBased => {
                        if self.skills.iter().all(|s| s.trim().is_empty()) {
                            return Err(SetupValidationError::NoSkills);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn none_or_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or("").is_empty()
}
