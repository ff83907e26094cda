//! Request bodies for the AI backend. Responses stay untyped `serde_json::Value`s.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type ProfileRequest = super::AcademicProfile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViabilityRequest {
    pub title: String,
    pub objective: String,
    pub variables: Vec<String>,
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureRequest {
    pub title: String,
    pub objective: String,
    pub regulation_structure: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterReviewRequest {
    pub title: String,
    pub problem_description: String,
    pub objectives: String,
    pub justification: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionsRequest {
    pub context_info: String,
    pub style_request: String,
}

/// Guided answers collected by the chapter one wizard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterData {
    #[serde(rename = "empresa")]
    pub organization: String,
    #[serde(rename = "problemas")]
    pub problems: String,
    #[serde(rename = "consecuencias")]
    pub consequences: String,
    #[serde(rename = "datos_cuantitativos")]
    pub quantitative_data: String,
    #[serde(rename = "solucion_propuesta")]
    pub proposed_solution: String,
    #[serde(rename = "tecnologias")]
    pub technologies: String,
    #[serde(rename = "resultados_esperados")]
    pub expected_results: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullChapterRequest {
    pub data: ChapterData,
    pub profile: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureRequest {
    pub model_type: String,
    pub framework: String,
    pub task_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub params_millions: f64,
    pub batch_size: u32,
}

impl ResourceRequest {
    pub const DEFAULT_BATCH_SIZE: u32 = 32;

    pub fn new(params_millions: f64) -> Self {
        Self {
            params_millions,
            batch_size: Self::DEFAULT_BATCH_SIZE,
        }
    }
}
