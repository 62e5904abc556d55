//! Prompt construction for the extraction stage.

use crate::types::record::IngestionRecord;

/// System prompt: one JSON object, exact field list, explicit nulls.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are a structured-data extraction service for United Nations job postings. You receive one posting in markdown and return exactly one JSON object, nothing else. No prose, no markdown fences.

The object must contain every one of these keys. Use null for anything the posting does not state; never guess.

{
  "organization_name": string or null,
  "post_number": string or null,
  "date_posted": "YYYY-MM-DD" or null,
  "application_deadline": "YYYY-MM-DD" or null,
  "post_name": string or null,
  "contract_type": one of "consultant", "temporary", "fixed_term", "internship", "volunteering", "other", or null,
  "contract_duration": string or null,
  "renewable": boolean or null,
  "location_region": string or null,
  "location_country": string or null,
  "location_city": string or null,
  "work_arrangement": one of "on-site", "remote", "hybrid", or null,
  "thematic_area": string or null,
  "position_level": one of "consultancy", "g-2", "g-3", "g-4", "g-5", "g-6", "g-7", "internship", "no-1", "no-2", "no-3", "no-4", "p-1", "p-2", "p-3", "p-4", "p-5", "d-1", "d-2", "other", or null,
  "brief_description": string or null (two to three sentences summarizing the role),
  "main_skills_competencies": string or null,
  "technical_skills": string or null,
  "minimum_academic_qualifications": string or null,
  "minimum_experience": string or null,
  "language_requirements": array of {"language": string, "requirement_level": "required" or "preferred", "proficiency_level": one of "basic", "intermediate", "advanced", "fluent", "native", or null},
  "tags": array of short lowercase topic strings
}

Dates must be ISO format. Keep descriptions faithful to the posting text."#;

/// Build the user prompt from the record's parsed fields and its
/// (already truncated) markdown content.
pub fn extraction_user_prompt(record: &IngestionRecord, content: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("Post number: {}\n", record.post_number));
    prompt.push_str(&format!("Source URL: {}\n", record.source_url));
    if let Some(post_name) = &record.post_name {
        prompt.push_str(&format!("Page title: {}\n", post_name));
    }
    if let Some(organization) = &record.organization_name {
        prompt.push_str(&format!("Listed organization: {}\n", organization));
    }
    if let Some(country) = &record.location_country {
        prompt.push_str(&format!("Listed country: {}\n", country));
    }
    if let Some(city) = &record.location_city {
        prompt.push_str(&format!("Listed city: {}\n", city));
    }
    prompt.push_str("\nPosting content:\n\n");
    prompt.push_str(content);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_prompt_includes_record_fields() {
        let mut record =
            IngestionRecord::new("77001", "https://unjobs.org/vacancies/77001");
        record.post_name = Some("Programme Analyst".to_string());
        record.organization_name = Some("UNICEF".to_string());

        let prompt = extraction_user_prompt(&record, "## Duties\nAnalyze.");
        assert!(prompt.contains("Post number: 77001"));
        assert!(prompt.contains("Page title: Programme Analyst"));
        assert!(prompt.contains("Listed organization: UNICEF"));
        assert!(prompt.contains("## Duties"));
        assert!(!prompt.contains("Listed city"));
    }

    #[test]
    fn test_system_prompt_names_the_contract() {
        assert!(EXTRACTION_SYSTEM_PROMPT.contains("language_requirements"));
        assert!(EXTRACTION_SYSTEM_PROMPT.contains("application_deadline"));
        assert!(EXTRACTION_SYSTEM_PROMPT.contains("exactly one JSON object"));
    }
}
