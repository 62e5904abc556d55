//! LLM extraction response shape, parsing, and normalization into
//! domain types.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use crate::error::{PipelineError, Result};
use crate::types::job::{
    ContractType, NewJobAdvertisement, NewLanguageRequirement, PositionLevel, ProficiencyLevel,
    RequirementLevel, WorkArrangement,
};
use crate::types::record::IngestionRecord;

/// Raw extraction output as the model returns it. Every field is optional;
/// normalization decides fallbacks and rejects what it must.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractedJob {
    pub organization_name: Option<String>,
    pub post_number: Option<String>,
    pub date_posted: Option<String>,
    pub application_deadline: Option<String>,
    pub post_name: Option<String>,
    pub contract_type: Option<String>,
    pub contract_duration: Option<String>,
    pub renewable: Option<bool>,
    pub location_region: Option<String>,
    pub location_country: Option<String>,
    pub location_city: Option<String>,
    pub work_arrangement: Option<String>,
    pub thematic_area: Option<String>,
    pub position_level: Option<String>,
    pub brief_description: Option<String>,
    pub main_skills_competencies: Option<String>,
    pub technical_skills: Option<String>,
    pub minimum_academic_qualifications: Option<String>,
    pub minimum_experience: Option<String>,
    // The prompt invites explicit nulls, so absent and null both mean empty
    #[serde(default, deserialize_with = "null_as_empty")]
    pub language_requirements: Vec<ExtractedLanguage>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One language entry in the extraction output.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedLanguage {
    pub language: Option<String>,
    pub requirement_level: Option<String>,
    pub proficiency_level: Option<String>,
}

/// Parse a model response into an [`ExtractedJob`], tolerating a markdown
/// code fence around the JSON body.
pub fn parse_extraction_response(response: &str) -> Result<ExtractedJob> {
    serde_json::from_str(response)
        .or_else(|_| {
            let json_str = response
                .trim()
                .trim_start_matches("```json")
                .trim_start_matches("```")
                .trim_end_matches("```")
                .trim();
            serde_json::from_str(json_str)
        })
        .map_err(|e| PipelineError::Ai(format!("failed to parse extraction: {}", e).into()))
}

impl ExtractedJob {
    /// Organization name after fallbacks: model output, then the name
    /// parsed from the posting page, then "Unknown".
    pub fn organization_name_or_default(&self, record: &IngestionRecord) -> String {
        non_empty(self.organization_name.as_deref())
            .or_else(|| non_empty(record.organization_name.as_deref()))
            .unwrap_or("Unknown")
            .to_string()
    }

    /// Normalize into persistable advertisement fields.
    ///
    /// Invalid enumeration values degrade to defaults rather than failing
    /// the whole extraction. Dates fall back deterministically: a missing
    /// posting date becomes the discovery date, and a missing deadline
    /// becomes the discovery date plus `default_deadline_days`.
    pub fn into_advertisement(
        self,
        record: &IngestionRecord,
        organization_id: uuid::Uuid,
        default_deadline_days: i64,
    ) -> Result<(NewJobAdvertisement, Vec<NewLanguageRequirement>)> {
        let post_name = non_empty(self.post_name.as_deref())
            .or_else(|| non_empty(record.post_name.as_deref()))
            .ok_or_else(|| PipelineError::Validation {
                reason: format!("no post name for record {}", record.post_number),
            })?
            .to_string();

        let discovered = record.discovered_at.date_naive();
        let date_posted = self
            .date_posted
            .as_deref()
            .and_then(parse_date)
            .unwrap_or(discovered);
        let application_deadline = self
            .application_deadline
            .as_deref()
            .and_then(parse_date)
            .unwrap_or(discovered + chrono::Duration::days(default_deadline_days));

        let contract_type = self
            .contract_type
            .as_deref()
            .and_then(ContractType::parse)
            .unwrap_or(ContractType::Other);
        let work_arrangement = Some(
            self.work_arrangement
                .as_deref()
                .and_then(WorkArrangement::parse)
                .unwrap_or(WorkArrangement::OnSite),
        );
        let position_level = self.position_level.as_deref().and_then(PositionLevel::parse);

        let location_country = non_empty(self.location_country.as_deref())
            .or_else(|| non_empty(record.location_country.as_deref()))
            .unwrap_or("Unknown")
            .to_string();
        let location_city = non_empty(self.location_city.as_deref())
            .or_else(|| non_empty(record.location_city.as_deref()))
            .map(str::to_string);

        let languages = self
            .language_requirements
            .into_iter()
            .filter_map(|lang| {
                let language = non_empty(lang.language.as_deref())?.to_string();
                Some(NewLanguageRequirement {
                    language,
                    requirement_level: lang
                        .requirement_level
                        .as_deref()
                        .and_then(RequirementLevel::parse)
                        .unwrap_or(RequirementLevel::Preferred),
                    proficiency_level: lang
                        .proficiency_level
                        .as_deref()
                        .and_then(ProficiencyLevel::parse),
                })
            })
            .collect();

        let tags = self
            .tags
            .into_iter()
            .filter_map(|t| {
                let t = t.trim().to_string();
                (!t.is_empty()).then_some(t)
            })
            .collect();

        let ad = NewJobAdvertisement {
            organization_id,
            // The listing href is authoritative for the post number
            post_number: record.post_number.clone(),
            post_name,
            date_posted,
            application_deadline,
            contract_type,
            contract_duration: self.contract_duration.filter(|s| !s.trim().is_empty()),
            renewable: self.renewable.unwrap_or(false),
            location_region: self.location_region.filter(|s| !s.trim().is_empty()),
            location_country,
            location_city,
            work_arrangement,
            thematic_area: self.thematic_area.filter(|s| !s.trim().is_empty()),
            position_level,
            brief_description: self.brief_description,
            main_skills_competencies: self.main_skills_competencies,
            technical_skills: self.technical_skills,
            minimum_academic_qualifications: self.minimum_academic_qualifications,
            minimum_experience: self.minimum_experience,
            tags,
            source_url: Some(record.source_url.clone()),
        };

        Ok((ad, languages))
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
