//! HTML extraction for the course listing site.
//!
//! Both functions are pure: they take a document body and never touch the
//! network.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

static COURSE_CARD: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.course-card").expect("course card selector is valid"));

static CARD_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h3").expect("card title selector is valid"));

// third top-level section of the page, then the section inside its article
static COURSE_CONTENT: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("body main section:nth-of-type(3) article section")
        .expect("course content selector is valid")
});

/// A course discovered on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseLink {
    pub title: String,
    pub link: String,
}

/// Collects course cards from a listing page in document order.
///
/// Card hrefs are resolved against `root`. Cards without a title or href are
/// skipped.
pub fn parse_course_cards(html: &str, root: &Url) -> Vec<CourseLink> {
    let document = Html::parse_document(html);

    document
        .select(&COURSE_CARD)
        .filter_map(|card| {
            let title = card
                .select(&CARD_TITLE)
                .next()
                .map(|h3| h3.text().collect::<String>().trim().to_string())
                .filter(|title| !title.is_empty())?;

            let href = card.attr("href").map(str::trim).filter(|h| !h.is_empty())?;

            match root.join(href) {
                Ok(link) => Some(CourseLink {
                    title,
                    link: link.to_string(),
                }),
                Err(err) => {
                    log::debug!("skipping card {title:?}: bad href {href:?}: {err}");
                    None
                }
            }
        })
        .collect()
}

/// Text of the course description region, or `None` when the page does not
/// have one.
pub fn extract_course_content(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document.select(&COURSE_CONTENT).next().map(element_text)
}

/// Text nodes trimmed and joined by single spaces, empty nodes dropped.
fn element_text(element: ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
