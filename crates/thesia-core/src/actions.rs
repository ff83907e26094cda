//! Dashboard actions: AI backend calls fed from, and written back into, the
//! project store.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::errors::ApiError;
use crate::models::{
    ArchitectureRequest, ChapterData, ChapterReviewRequest, FullChapterRequest, ResourceRequest,
    StructureRequest, ViabilityRequest,
};
use crate::project_store::ProjectStore;
use crate::providers::AiBackend;

pub const UNTITLED_THESIS: &str = "Tesis sin título";
pub const DEFAULT_ARCHITECTURE_TASK: &str = "Clasificación de imágenes";
pub const DEFAULT_MODEL_TYPE: &str = "CNN";
pub const DEFAULT_FRAMEWORK: &str = "TensorFlow / Keras";
pub const DEFAULT_STYLE_REQUEST: &str = "Ingeniería de Sistemas - Tesis";

pub struct Dashboard {
    backend: Arc<dyn AiBackend>,
    project: Arc<ProjectStore>,
}

impl Dashboard {
    pub fn new(backend: Arc<dyn AiBackend>, project: Arc<ProjectStore>) -> Self {
        Self { backend, project }
    }

    pub fn project(&self) -> &Arc<ProjectStore> {
        &self.project
    }

    pub fn backend(&self) -> &Arc<dyn AiBackend> {
        &self.backend
    }

    /// Validates the academic profile and stores the verdict.
    ///
    /// Runs only once grade, area and level are all set. Failures are logged and
    /// leave the previous verdict in place.
    pub async fn validate_profile(&self) -> Option<Value> {
        let Some(profile) = self.project.document().profile() else {
            log::debug!("Profile incomplete, skipping validation");
            return None;
        };

        match self.backend.validate_profile(&profile).await {
            Ok(verdict) => {
                self.project.set_profile_validation(Some(verdict.clone()));
                Some(verdict)
            }
            Err(e) => {
                log::error!("Error validating profile: {}", e);
                None
            }
        }
    }

    pub async fn evaluate_viability(&self) -> Result<Value, ApiError> {
        let document = self.project.document();
        require_title(&document.title)?;

        let request = ViabilityRequest {
            variables: document.variable_list(),
            title: document.title,
            objective: document.objective,
            scope: document.scope,
        };
        self.backend.evaluate_viability(&request).await
    }

    /// Uploads a regulations PDF. The analysis lands in `analysisResult` and its
    /// `estructura` member in `regulationStructure`.
    pub async fn analyze_regulations(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Value, ApiError> {
        require_pdf(file_name)?;

        let analysis = self.backend.analyze_regulations(file_name, bytes).await?;
        self.project.set_analysis_result(Some(analysis.clone()));
        if let Some(structure) = analysis.get("estructura").filter(|v| !v.is_null()) {
            self.project.set_regulation_structure(Some(structure.clone()));
        }

        Ok(analysis)
    }

    pub async fn extract_text(&self, file_name: &str, bytes: Vec<u8>) -> Result<Value, ApiError> {
        require_pdf(file_name)?;
        self.backend.extract_text(file_name, bytes).await
    }

    pub async fn generate_structure(&self) -> Result<Value, ApiError> {
        let document = self.project.document();
        require_title(&document.title)?;

        let request = StructureRequest {
            regulation_structure: document.analysis_structure(),
            title: document.title,
            objective: document.objective,
        };
        self.backend.generate_structure(&request).await
    }

    pub async fn review_chapter_one(
        &self,
        problem_description: &str,
        objectives: &str,
        justification: &str,
    ) -> Result<Value, ApiError> {
        let title = self.project.document().title;
        let request = ChapterReviewRequest {
            title: if title.is_empty() {
                UNTITLED_THESIS.to_string()
            } else {
                title
            },
            problem_description: problem_description.to_string(),
            objectives: objectives.to_string(),
            justification: justification.to_string(),
        };
        self.backend.review_chapter_one(&request).await
    }

    pub async fn expand_text(&self, draft: &str) -> Result<Value, ApiError> {
        self.backend.expand_text(draft).await
    }

    pub async fn analyze_writing(&self, draft: &str) -> Result<Value, ApiError> {
        self.backend.analyze_writing(draft).await
    }

    pub async fn generate_versions(&self, draft: &str) -> Result<Value, ApiError> {
        self.backend
            .generate_versions(draft, DEFAULT_STYLE_REQUEST)
            .await
    }

    /// Drafts chapter one from the wizard answers and the current profile fields.
    pub async fn generate_full_chapter(&self, data: ChapterData) -> Result<Value, ApiError> {
        let document = self.project.document();
        let request = FullChapterRequest {
            data,
            profile: json!({
                "grado": document.grade,
                "area": document.area,
                "nivel": document.level,
            }),
        };
        self.backend.generate_full_chapter(&request).await
    }

    /// The thesis title doubles as the task description.
    pub async fn generate_architecture(
        &self,
        model_type: Option<&str>,
        framework: Option<&str>,
    ) -> Result<Value, ApiError> {
        let title = self.project.document().title;
        let request = ArchitectureRequest {
            model_type: model_type.unwrap_or(DEFAULT_MODEL_TYPE).to_string(),
            framework: framework.unwrap_or(DEFAULT_FRAMEWORK).to_string(),
            task_description: if title.is_empty() {
                DEFAULT_ARCHITECTURE_TASK.to_string()
            } else {
                title
            },
        };
        self.backend.generate_architecture(&request).await
    }

    pub async fn estimate_resources(&self, params_millions: f64) -> Result<Value, ApiError> {
        if !params_millions.is_finite() || params_millions <= 0.0 {
            return Err(ApiError::InvalidRequest(format!(
                "parameter count must be positive, got {}",
                params_millions
            )));
        }
        self.backend
            .estimate_resources(&ResourceRequest::new(params_millions))
            .await
    }
}

fn require_title(title: &str) -> Result<(), ApiError> {
    if title.trim().is_empty() {
        return Err(ApiError::InvalidRequest(
            "set a thesis title first".to_string(),
        ));
    }
    Ok(())
}

fn require_pdf(file_name: &str) -> Result<(), ApiError> {
    let is_pdf = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    if !is_pdf {
        return Err(ApiError::InvalidRequest(format!(
            "only PDF files are accepted, got '{}'",
            file_name
        )));
    }
    Ok(())
}
