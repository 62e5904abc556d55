//! Structured domain types: organizations, advertisements, and the
//! controlled vocabularies extraction must validate against.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hiring organization, deduplicated by exact name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub abbreviation: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: impl Into<String>, abbreviation: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            abbreviation,
            created_at: Utc::now(),
        }
    }
}

/// Contract type vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractType {
    Consultant,
    Temporary,
    FixedTerm,
    Internship,
    Volunteering,
    Other,
}

impl ContractType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractType::Consultant => "consultant",
            ContractType::Temporary => "temporary",
            ContractType::FixedTerm => "fixed_term",
            ContractType::Internship => "internship",
            ContractType::Volunteering => "volunteering",
            ContractType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "consultant" => Some(ContractType::Consultant),
            "temporary" => Some(ContractType::Temporary),
            "fixed_term" => Some(ContractType::FixedTerm),
            "internship" => Some(ContractType::Internship),
            "volunteering" => Some(ContractType::Volunteering),
            "other" => Some(ContractType::Other),
            _ => None,
        }
    }
}

/// Work arrangement vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkArrangement {
    #[serde(rename = "on-site")]
    OnSite,
    #[serde(rename = "remote")]
    Remote,
    #[serde(rename = "hybrid")]
    Hybrid,
}

impl WorkArrangement {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkArrangement::OnSite => "on-site",
            WorkArrangement::Remote => "remote",
            WorkArrangement::Hybrid => "hybrid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "on-site" | "onsite" => Some(WorkArrangement::OnSite),
            "remote" => Some(WorkArrangement::Remote),
            "hybrid" => Some(WorkArrangement::Hybrid),
            _ => None,
        }
    }
}

/// UN-style position level vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionLevel {
    #[serde(rename = "consultancy")]
    Consultancy,
    #[serde(rename = "g-2")]
    G2,
    #[serde(rename = "g-3")]
    G3,
    #[serde(rename = "g-4")]
    G4,
    #[serde(rename = "g-5")]
    G5,
    #[serde(rename = "g-6")]
    G6,
    #[serde(rename = "g-7")]
    G7,
    #[serde(rename = "internship")]
    Internship,
    #[serde(rename = "no-1")]
    No1,
    #[serde(rename = "no-2")]
    No2,
    #[serde(rename = "no-3")]
    No3,
    #[serde(rename = "no-4")]
    No4,
    #[serde(rename = "p-1")]
    P1,
    #[serde(rename = "p-2")]
    P2,
    #[serde(rename = "p-3")]
    P3,
    #[serde(rename = "p-4")]
    P4,
    #[serde(rename = "p-5")]
    P5,
    #[serde(rename = "d-1")]
    D1,
    #[serde(rename = "d-2")]
    D2,
    #[serde(rename = "other")]
    Other,
}

impl PositionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionLevel::Consultancy => "consultancy",
            PositionLevel::G2 => "g-2",
            PositionLevel::G3 => "g-3",
            PositionLevel::G4 => "g-4",
            PositionLevel::G5 => "g-5",
            PositionLevel::G6 => "g-6",
            PositionLevel::G7 => "g-7",
            PositionLevel::Internship => "internship",
            PositionLevel::No1 => "no-1",
            PositionLevel::No2 => "no-2",
            PositionLevel::No3 => "no-3",
            PositionLevel::No4 => "no-4",
            PositionLevel::P1 => "p-1",
            PositionLevel::P2 => "p-2",
            PositionLevel::P3 => "p-3",
            PositionLevel::P4 => "p-4",
            PositionLevel::P5 => "p-5",
            PositionLevel::D1 => "d-1",
            PositionLevel::D2 => "d-2",
            PositionLevel::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "consultancy" => Some(PositionLevel::Consultancy),
            "g-2" => Some(PositionLevel::G2),
            "g-3" => Some(PositionLevel::G3),
            "g-4" => Some(PositionLevel::G4),
            "g-5" => Some(PositionLevel::G5),
            "g-6" => Some(PositionLevel::G6),
            "g-7" => Some(PositionLevel::G7),
            "internship" => Some(PositionLevel::Internship),
            "no-1" => Some(PositionLevel::No1),
            "no-2" => Some(PositionLevel::No2),
            "no-3" => Some(PositionLevel::No3),
            "no-4" => Some(PositionLevel::No4),
            "p-1" => Some(PositionLevel::P1),
            "p-2" => Some(PositionLevel::P2),
            "p-3" => Some(PositionLevel::P3),
            "p-4" => Some(PositionLevel::P4),
            "p-5" => Some(PositionLevel::P5),
            "d-1" => Some(PositionLevel::D1),
            "d-2" => Some(PositionLevel::D2),
            "other" => Some(PositionLevel::Other),
            _ => None,
        }
    }
}

/// How strongly a language is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementLevel {
    Required,
    Preferred,
}

impl RequirementLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementLevel::Required => "required",
            RequirementLevel::Preferred => "preferred",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "required" => Some(RequirementLevel::Required),
            "preferred" => Some(RequirementLevel::Preferred),
            _ => None,
        }
    }
}

/// Proficiency expected in a required language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProficiencyLevel {
    Basic,
    Intermediate,
    Advanced,
    Fluent,
    Native,
}

impl ProficiencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProficiencyLevel::Basic => "basic",
            ProficiencyLevel::Intermediate => "intermediate",
            ProficiencyLevel::Advanced => "advanced",
            ProficiencyLevel::Fluent => "fluent",
            ProficiencyLevel::Native => "native",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Some(ProficiencyLevel::Basic),
            "intermediate" => Some(ProficiencyLevel::Intermediate),
            "advanced" => Some(ProficiencyLevel::Advanced),
            "fluent" => Some(ProficiencyLevel::Fluent),
            "native" => Some(ProficiencyLevel::Native),
            _ => None,
        }
    }
}

/// Structured mirror of one posting, created exactly once per record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAdvertisement {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub post_number: String,
    pub post_name: String,
    pub date_posted: NaiveDate,
    pub application_deadline: NaiveDate,
    pub contract_type: ContractType,
    pub contract_duration: Option<String>,
    pub renewable: bool,
    pub location_region: Option<String>,
    pub location_country: String,
    pub location_city: Option<String>,
    pub work_arrangement: Option<WorkArrangement>,
    pub thematic_area: Option<String>,
    pub position_level: Option<PositionLevel>,
    pub brief_description: Option<String>,
    pub main_skills_competencies: Option<String>,
    pub technical_skills: Option<String>,
    pub minimum_academic_qualifications: Option<String>,
    pub minimum_experience: Option<String>,
    pub tags: Vec<String>,
    pub source_url: Option<String>,
    pub ingestion_record_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Advertisement fields as assembled by the extraction stage,
/// before the store assigns identity and links the record.
#[derive(Debug, Clone)]
pub struct NewJobAdvertisement {
    pub organization_id: Uuid,
    pub post_number: String,
    pub post_name: String,
    pub date_posted: NaiveDate,
    pub application_deadline: NaiveDate,
    pub contract_type: ContractType,
    pub contract_duration: Option<String>,
    pub renewable: bool,
    pub location_region: Option<String>,
    pub location_country: String,
    pub location_city: Option<String>,
    pub work_arrangement: Option<WorkArrangement>,
    pub thematic_area: Option<String>,
    pub position_level: Option<PositionLevel>,
    pub brief_description: Option<String>,
    pub main_skills_competencies: Option<String>,
    pub technical_skills: Option<String>,
    pub minimum_academic_qualifications: Option<String>,
    pub minimum_experience: Option<String>,
    pub tags: Vec<String>,
    pub source_url: Option<String>,
}

/// A language expectation attached to an advertisement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageRequirement {
    pub id: Uuid,
    pub job_advertisement_id: Uuid,
    pub language: String,
    pub requirement_level: RequirementLevel,
    pub proficiency_level: Option<ProficiencyLevel>,
}

/// Language requirement before identity assignment.
#[derive(Debug, Clone)]
pub struct NewLanguageRequirement {
    pub language: String,
    pub requirement_level: RequirementLevel,
    pub proficiency_level: Option<ProficiencyLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_type_parse() {
        assert_eq!(ContractType::parse("Fixed_Term"), Some(ContractType::FixedTerm));
        assert_eq!(ContractType::parse(" consultant "), Some(ContractType::Consultant));
        assert_eq!(ContractType::parse("permanent"), None);
    }

    #[test]
    fn test_work_arrangement_parse() {
        assert_eq!(WorkArrangement::parse("On-Site"), Some(WorkArrangement::OnSite));
        assert_eq!(WorkArrangement::parse("onsite"), Some(WorkArrangement::OnSite));
        assert_eq!(WorkArrangement::parse("REMOTE"), Some(WorkArrangement::Remote));
        assert_eq!(WorkArrangement::parse("office"), None);
    }

    #[test]
    fn test_position_level_parse() {
        assert_eq!(PositionLevel::parse("P-3"), Some(PositionLevel::P3));
        assert_eq!(PositionLevel::parse("no-2"), Some(PositionLevel::No2));
        assert_eq!(PositionLevel::parse("senior"), None);
    }

    #[test]
    fn test_serde_renames() {
        let json = serde_json::to_string(&WorkArrangement::OnSite).unwrap();
        assert_eq!(json, "\"on-site\"");
        let json = serde_json::to_string(&PositionLevel::P3).unwrap();
        assert_eq!(json, "\"p-3\"");
        let json = serde_json::to_string(&ContractType::FixedTerm).unwrap();
        assert_eq!(json, "\"fixed_term\"");
    }
}
