use crate::error::ExtractError;
use crate::models::Record;
use crate::sources::traits::Extract;
use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

/// How a rule pulls its value out of the matched element.
#[derive(Debug, Clone)]
enum Take {
    Text,
    Attr(String),
}

/// One named field-selector rule.
///
/// A selector that matches nothing is the expected "field absent" outcome. A
/// matched element that is missing the requested attribute is unexpected and
/// logged distinctly so selector drift shows up in the logs.
#[derive(Debug, Clone)]
pub struct FieldRule {
    name: String,
    selector: Selector,
    take: Take,
}

impl FieldRule {
    fn parse(name: &str, selector: &str, take: Take) -> Result<Self> {
        let selector = Selector::parse(selector)
            .map_err(|e| anyhow!("invalid selector `{selector}` for field `{name}`: {e}"))?;
        Ok(Self {
            name: name.to_string(),
            selector,
            take,
        })
    }

    pub fn text(name: &str, selector: &str) -> Result<Self> {
        Self::parse(name, selector, Take::Text)
    }

    pub fn attr(name: &str, selector: &str, attr: &str) -> Result<Self> {
        Self::parse(name, selector, Take::Attr(attr.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, root: ElementRef) -> Option<String> {
        let element = root.select(&self.selector).next()?;
        let raw = match &self.take {
            Take::Text => {
                let text = element.text().collect::<String>();
                if text.trim().is_empty() {
                    return None;
                }
                text
            }
            Take::Attr(attr) => match element.value().attr(attr) {
                Some(value) => value.to_string(),
                None => {
                    warn!(
                        field = %self.name,
                        attr = %attr,
                        "matched element has no such attribute"
                    );
                    return None;
                }
            },
        };
        Some(normalize(&raw))
    }
}

/// Collapse non-breaking spaces and trim; card markup is full of both.
fn normalize(value: &str) -> String {
    value.replace('\u{a0}', " ").trim().to_string()
}

/// Applies a set of field rules to one card's HTML fragment.
pub struct SelectorExtractor {
    rules: Vec<FieldRule>,
}

impl SelectorExtractor {
    pub fn new(rules: Vec<FieldRule>) -> Self {
        Self { rules }
    }
}

impl Extract<String> for SelectorExtractor {
    fn extract(&self, element: &String) -> Result<Record, ExtractError> {
        if element.trim().is_empty() {
            return Err(ExtractError::Stale);
        }
        let fragment = Html::parse_fragment(element);
        let root = fragment.root_element();
        let mut record = Record::new();
        for rule in &self.rules {
            match rule.apply(root) {
                Some(value) => record.set(rule.name(), value),
                None => debug!(field = %rule.name(), "field absent"),
            }
        }
        Ok(record)
    }
}

/// Rule set for Google-Maps-style result cards, plus the fixups that split
/// the star aria-label into rating and review count.
pub struct MapsExtractor {
    inner: SelectorExtractor,
}

impl MapsExtractor {
    pub fn new() -> Result<Self> {
        let rules = vec![
            FieldRule::text("name", "div.qBF1Pd.fontHeadlineSmall")?,
            FieldRule::attr(
                "rating_label",
                r#"span[role="img"][aria-label*="stars"]"#,
                "aria-label",
            )?,
            FieldRule::text("address", "div.W4Efsd span:nth-of-type(3)")?,
            FieldRule::text("category", ".W4Efsd .W4Efsd")?,
            FieldRule::attr("url", "a.hfpxzc", "href")?,
        ];
        Ok(Self {
            inner: SelectorExtractor::new(rules),
        })
    }
}

impl Extract<String> for MapsExtractor {
    fn extract(&self, element: &String) -> Result<Record, ExtractError> {
        let mut record = self.inner.extract(element)?;
        split_rating_label(&mut record);
        trim_category(&mut record);
        Ok(record)
    }
}

/// Turn `"4.8 stars 1,459 Reviews"` into `rating = 4.8` and
/// `reviews_count = 1459`, dropping the raw label.
fn split_rating_label(record: &mut Record) {
    let Some(label) = record.remove("rating_label") else {
        return;
    };
    if let Some(rating) = label.split_whitespace().next() {
        record.set("rating", rating);
    }
    if let Some(stars_end) = label.find("stars") {
        let tail = &label[stars_end + "stars".len()..];
        let count: String = tail.chars().filter(char::is_ascii_digit).collect();
        if !count.is_empty() {
            record.set("reviews_count", count);
        }
    }
}

/// The category container reads `"Coffee shop · $$"`; keep the leading part.
fn trim_category(record: &mut Record) {
    let trimmed = record
        .get("category")
        .and_then(|c| c.split('·').next())
        .map(|c| c.trim().to_string());
    if let Some(trimmed) = trimmed {
        record.set("category", trimmed);
    }
}
