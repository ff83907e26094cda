use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The full field set persisted for a user, one document per user.
///
/// Keys match the stored JSON written by earlier clients. Missing keys load as
/// empty values, so a stored document always overwrites every local field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectDocument {
    pub title: String,
    pub objective: String,
    /// Comma-separated, as typed by the user.
    pub variables: String,
    pub scope: String,
    #[serde(rename = "grado")]
    pub grade: String,
    pub area: String,
    pub sub_area: String,
    #[serde(rename = "nivel")]
    pub level: String,
    pub profile_validation: Option<Value>,
    pub regulation_structure: Option<Value>,
    pub analysis_result: Option<Value>,
}

impl ProjectDocument {
    pub fn is_empty(&self) -> bool {
        *self == ProjectDocument::default()
    }

    pub fn variable_list(&self) -> Vec<String> {
        self.variables
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// The academic profile, once grade, area and level are all chosen.
    pub fn profile(&self) -> Option<AcademicProfile> {
        if self.grade.is_empty() || self.area.is_empty() || self.level.is_empty() {
            return None;
        }

        Some(AcademicProfile {
            grade: self.grade.clone(),
            area: self.area.clone(),
            sub_area: (!self.sub_area.is_empty()).then(|| self.sub_area.clone()),
            level: self.level.clone(),
        })
    }

    /// The `estructura` member of the regulation analysis, if one was produced.
    pub fn analysis_structure(&self) -> Option<Value> {
        self.analysis_result
            .as_ref()
            .and_then(|result| result.get("estructura"))
            .filter(|v| !v.is_null())
            .cloned()
    }

    pub fn field(&self, field: ProjectField) -> &str {
        match field {
            ProjectField::Title => &self.title,
            ProjectField::Objective => &self.objective,
            ProjectField::Variables => &self.variables,
            ProjectField::Scope => &self.scope,
            ProjectField::Grade => &self.grade,
            ProjectField::Area => &self.area,
            ProjectField::SubArea => &self.sub_area,
            ProjectField::Level => &self.level,
        }
    }
}

/// The user-editable text fields of a [`ProjectDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum ProjectField {
    Title,
    Objective,
    Variables,
    Scope,
    Grade,
    Area,
    SubArea,
    Level,
}

/// Degree, subject area and research type chosen by the student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicProfile {
    #[serde(rename = "grado")]
    pub grade: String,
    pub area: String,
    #[serde(default)]
    pub sub_area: Option<String>,
    #[serde(rename = "nivel")]
    pub level: String,
}
