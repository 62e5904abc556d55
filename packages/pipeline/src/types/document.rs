//! Denormalized search document projected from the domain model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::job::{JobAdvertisement, LanguageRequirement, Organization};

/// Embedded organization fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationDoc {
    pub id: Uuid,
    pub name: String,
    pub abbreviation: Option<String>,
}

/// Embedded language requirement fields (nested in the index).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageRequirementDoc {
    pub language: String,
    pub requirement_level: String,
    pub proficiency_level: Option<String>,
}

/// One document per advertisement, keyed by the advertisement id.
/// `is_active` and `days_until_deadline` are derived at projection time,
/// so the index is a pure function of the domain state plus "today".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: Uuid,
    pub post_number: String,
    pub post_name: String,
    pub organization: OrganizationDoc,
    pub date_posted: NaiveDate,
    pub application_deadline: NaiveDate,
    pub contract_type: String,
    pub contract_duration: Option<String>,
    pub renewable: bool,
    pub location_region: Option<String>,
    pub location_country: String,
    pub location_city: Option<String>,
    pub work_arrangement: Option<String>,
    pub thematic_area: Option<String>,
    pub position_level: Option<String>,
    pub brief_description: Option<String>,
    pub main_skills_competencies: Option<String>,
    pub technical_skills: Option<String>,
    pub minimum_academic_qualifications: Option<String>,
    pub minimum_experience: Option<String>,
    pub language_requirements: Vec<LanguageRequirementDoc>,
    pub tags: Vec<String>,
    pub source_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub days_until_deadline: i64,
}

impl SearchDocument {
    /// Project an advertisement with its organization and language
    /// requirements against a reference date.
    pub fn project(
        ad: &JobAdvertisement,
        organization: &Organization,
        languages: &[LanguageRequirement],
        today: NaiveDate,
    ) -> Self {
        Self {
            id: ad.id,
            post_number: ad.post_number.clone(),
            post_name: ad.post_name.clone(),
            organization: OrganizationDoc {
                id: organization.id,
                name: organization.name.clone(),
                abbreviation: organization.abbreviation.clone(),
            },
            date_posted: ad.date_posted,
            application_deadline: ad.application_deadline,
            contract_type: ad.contract_type.as_str().to_string(),
            contract_duration: ad.contract_duration.clone(),
            renewable: ad.renewable,
            location_region: ad.location_region.clone(),
            location_country: ad.location_country.clone(),
            location_city: ad.location_city.clone(),
            work_arrangement: ad.work_arrangement.map(|w| w.as_str().to_string()),
            thematic_area: ad.thematic_area.clone(),
            position_level: ad.position_level.map(|p| p.as_str().to_string()),
            brief_description: ad.brief_description.clone(),
            main_skills_competencies: ad.main_skills_competencies.clone(),
            technical_skills: ad.technical_skills.clone(),
            minimum_academic_qualifications: ad.minimum_academic_qualifications.clone(),
            minimum_experience: ad.minimum_experience.clone(),
            language_requirements: languages
                .iter()
                .map(|l| LanguageRequirementDoc {
                    language: l.language.clone(),
                    requirement_level: l.requirement_level.as_str().to_string(),
                    proficiency_level: l.proficiency_level.map(|p| p.as_str().to_string()),
                })
                .collect(),
            tags: ad.tags.clone(),
            source_url: ad.source_url.clone(),
            created_at: ad.created_at,
            is_active: ad.application_deadline >= today,
            days_until_deadline: (ad.application_deadline - today).num_days(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::job::ContractType;

    fn sample_ad(deadline: &str) -> (JobAdvertisement, Organization) {
        let org = Organization::new("UNICEF", Some("UNICEF".to_string()));
        let ad = JobAdvertisement {
            id: Uuid::new_v4(),
            organization_id: org.id,
            post_number: "77001".to_string(),
            post_name: "Programme Analyst".to_string(),
            date_posted: "2025-01-01".parse().unwrap(),
            application_deadline: deadline.parse().unwrap(),
            contract_type: ContractType::FixedTerm,
            contract_duration: None,
            renewable: false,
            location_region: None,
            location_country: "Kenya".to_string(),
            location_city: Some("Nairobi".to_string()),
            work_arrangement: None,
            thematic_area: None,
            position_level: None,
            brief_description: None,
            main_skills_competencies: None,
            technical_skills: None,
            minimum_academic_qualifications: None,
            minimum_experience: None,
            tags: vec!["health".to_string()],
            source_url: None,
            ingestion_record_id: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        (ad, org)
    }

    #[test]
    fn test_active_document() {
        let (ad, org) = sample_ad("2025-02-10");
        let today: NaiveDate = "2025-01-20".parse().unwrap();
        let doc = SearchDocument::project(&ad, &org, &[], today);
        assert!(doc.is_active);
        assert_eq!(doc.days_until_deadline, 21);
        assert_eq!(doc.contract_type, "fixed_term");
        assert_eq!(doc.organization.name, "UNICEF");
    }

    #[test]
    fn test_expired_document() {
        let (ad, org) = sample_ad("2025-01-10");
        let today: NaiveDate = "2025-01-20".parse().unwrap();
        let doc = SearchDocument::project(&ad, &org, &[], today);
        assert!(!doc.is_active);
        assert_eq!(doc.days_until_deadline, -10);
    }

    #[test]
    fn test_deadline_today_is_active() {
        let (ad, org) = sample_ad("2025-01-20");
        let today: NaiveDate = "2025-01-20".parse().unwrap();
        let doc = SearchDocument::project(&ad, &org, &[], today);
        assert!(doc.is_active);
        assert_eq!(doc.days_until_deadline, 0);
    }
}
