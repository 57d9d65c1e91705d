use serde::{Deserialize, Serialize};

/// Aggregate scored report produced once, at session completion.
///
/// Field names follow the wire format of the remote assessment endpoint;
/// the export collaborator relies on this shape being stable and complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverallFeedback {
    pub overall_score: u32,
    pub level: String,
    pub summary: String,
    pub coaching_scores: CoachingScores,
    #[serde(default)]
    pub questions_analysis: Vec<QuestionAnalysis>,
    pub closure_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoachingScores {
    pub clarity_of_motivation: u8,
    pub career_goal_alignment: u8,
    pub specificity_of_learning: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnalysis {
    pub question: String,
    pub response: String,
    pub feedback: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    pub score: u32,
    pub response_depth: String,
}
