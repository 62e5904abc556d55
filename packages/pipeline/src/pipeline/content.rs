//! HTML parsing for the listing and posting pages.
//!
//! Parsing is synchronous and self-contained: callers fetch the HTML,
//! hand it over, and get owned data back. `scraper`'s DOM types never
//! cross an await point.

use scraper::{Html, Selector};
use url::Url;

use crate::error::{PipelineError, Result};
use crate::types::record::{PageDetails, PostingSummary};

/// Parse the listing page into posting summaries, newest first (the
/// order the source renders them in).
///
/// Entries without a link or a recognizable post number are skipped
/// rather than failing the whole page.
pub fn parse_listing(html: &str, base_url: &str) -> Result<Vec<PostingSummary>> {
    let document = Html::parse_document(html);
    let job_selector = listing_selector("article div.job[id]")?;
    let title_selector = listing_selector("a.jtitle")?;

    let base = Url::parse(base_url).map_err(|e| PipelineError::ListingParse {
        reason: format!("invalid base url {}: {}", base_url, e),
    })?;

    let mut postings = Vec::new();
    for job in document.select(&job_selector) {
        let Some(link) = job.select(&title_selector).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Ok(url) = base.join(href) else {
            continue;
        };
        // The last path segment of the posting URL is the post number
        let Some(post_number) = last_path_segment(&url) else {
            continue;
        };

        let title = link.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            continue;
        }

        postings.push(PostingSummary {
            post_number,
            url: url.to_string(),
            title,
        });
    }

    if postings.is_empty() {
        return Err(PipelineError::ListingParse {
            reason: "no postings found on listing page".to_string(),
        });
    }

    Ok(postings)
}

/// Parse a posting page into the fields the record keeps: the title, the
/// posting body converted to markdown, and the category sidebar entries.
pub fn parse_posting(html: &str, url: &str) -> Result<PageDetails> {
    let document = Html::parse_document(html);

    let title = [
        ".container > table > tbody > tr > td > h2",
        ".container > table > tr > td > h2",
    ]
    .iter()
    .find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        let element = document.select(&selector).next()?;
        let text = element.text().collect::<String>().trim().to_string();
        (!text.is_empty()).then_some(text)
    })
    .ok_or_else(|| posting_err(url, "no title heading found"))?;

    let snippet_selector =
        Selector::parse("div.fp-snippet").map_err(|e| posting_err(url, format!("{}", e)))?;
    let snippet = document
        .select(&snippet_selector)
        .next()
        .ok_or_else(|| posting_err(url, "no div.fp-snippet content block"))?;

    let content_markdown = htmd::convert(&snippet.html())
        .map_err(|e| posting_err(url, format!("markdown conversion failed: {}", e)))?;

    // Category sidebar: "Organization: UNICEF", "Country: Kenya", ...
    let category_selector = Selector::parse(".list-group li.list-group-item")
        .map_err(|e| posting_err(url, format!("{}", e)))?;

    let mut organization_name = None;
    let mut location_country = None;
    let mut location_city = None;
    for item in document.select(&category_selector) {
        let text = item.text().collect::<String>();
        let Some((label, value)) = text.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match label.trim() {
            "Organization" => organization_name = Some(value.to_string()),
            "Country" => location_country = Some(value.to_string()),
            "City" => location_city = Some(value.to_string()),
            _ => {}
        }
    }

    Ok(PageDetails {
        title,
        content_markdown,
        organization_name,
        location_country,
        location_city,
    })
}

fn listing_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| PipelineError::ListingParse {
        reason: format!("bad selector {}: {}", css, e),
    })
}

fn posting_err(url: &str, reason: impl Into<String>) -> PipelineError {
    PipelineError::PostingParse {
        url: url.to_string(),
        reason: reason.into(),
    }
}

fn last_path_segment(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body><article>
            <div class="job" id="j77002">
                <a class="jtitle" href="/vacancies/77002">Senior Health Officer</a>
            </div>
            <div class="job" id="j77001">
                <a class="jtitle" href="https://unjobs.org/vacancies/77001">Programme Analyst</a>
            </div>
            <div class="job" id="j77000"><span>no link here</span></div>
        </article></body></html>
    "#;

    const POSTING: &str = r#"
        <html><body><div class="container">
            <table><tbody><tr><td><h2>Programme Analyst</h2></td></tr></tbody></table>
            <div class="fp-snippet">
                <h3>Duties</h3>
                <p>Analyze programmes and <strong>report</strong> findings.</p>
            </div>
            <ul class="list-group">
                <li class="list-group-item">Organization: UNICEF</li>
                <li class="list-group-item">Country: Kenya</li>
                <li class="list-group-item">City: Nairobi</li>
                <li class="list-group-item">no separator here</li>
            </ul>
        </div></body></html>
    "#;

    #[test]
    fn test_parse_listing_newest_first() {
        let postings = parse_listing(LISTING, "https://unjobs.org").unwrap();
        assert_eq!(postings.len(), 2);
        assert_eq!(postings[0].post_number, "77002");
        assert_eq!(postings[0].url, "https://unjobs.org/vacancies/77002");
        assert_eq!(postings[0].title, "Senior Health Officer");
        assert_eq!(postings[1].post_number, "77001");
    }

    #[test]
    fn test_parse_listing_empty_page_fails() {
        let result = parse_listing("<html><body></body></html>", "https://unjobs.org");
        assert!(matches!(result, Err(PipelineError::ListingParse { .. })));
    }

    #[test]
    fn test_parse_posting() {
        let details = parse_posting(POSTING, "https://unjobs.org/vacancies/77001").unwrap();
        assert_eq!(details.title, "Programme Analyst");
        assert!(details.content_markdown.contains("Duties"));
        assert!(details.content_markdown.contains("**report**"));
        assert_eq!(details.organization_name.as_deref(), Some("UNICEF"));
        assert_eq!(details.location_country.as_deref(), Some("Kenya"));
        assert_eq!(details.location_city.as_deref(), Some("Nairobi"));
    }

    #[test]
    fn test_parse_posting_without_snippet_fails() {
        let html = "<html><body><div class='container'>\
            <table><tbody><tr><td><h2>Title</h2></td></tr></tbody></table>\
            </div></body></html>";
        let result = parse_posting(html, "https://unjobs.org/vacancies/77001");
        assert!(matches!(result, Err(PipelineError::PostingParse { .. })));
    }

    #[test]
    fn test_parse_posting_categories_optional() {
        let html = "<html><body><div class='container'>\
            <table><tbody><tr><td><h2>Title</h2></td></tr></tbody></table>\
            <div class='fp-snippet'><p>Body</p></div>\
            </div></body></html>";
        let details = parse_posting(html, "https://unjobs.org/vacancies/77001").unwrap();
        assert!(details.organization_name.is_none());
        assert!(details.location_country.is_none());
    }
}
