//! Card detail page parser for my.taggrading.com.
//!
//! The card page is rebuilt by the vendor every few months, so every value is
//! read through an ordered list of independent strategies, each tagged with
//! the page revision it was written against. A new revision gets a new table
//! entry; existing entries are never edited to chase the latest markup.

use regex::Regex;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::scraper::{card_url, slab_image_url};

const PLAYER_NAME_LABEL: &str = "Player name:";
const SET_NAME_LABEL: &str = "Set name:";
const SUBSET_LABEL: &str = "Subset:";
const VARIATION_LABEL: &str = "Variation:";

/// Extracted card attributes plus caller-managed tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CardRecord {
    pub cert_number: String,
    pub player_name: String,
    pub set_name: String,
    pub subset: String,
    pub variation: String,
    /// Composite grade, e.g. "10 Pristine" or "10 Pristine (98)".
    pub grade_label: String,
    pub image_url: String,
    pub source_link: String,
    /// Collection labels. Owned by the collection layer, never scraped.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl CardRecord {
    /// Record with only the fields derivable from the cert number.
    ///
    /// This is also the shape stored when a fetch fails outright: the image
    /// and source links hold regardless of what the page contained.
    pub fn stub(cert_number: &str) -> Self {
        let cert_number = cert_number.trim();
        Self {
            cert_number: cert_number.to_string(),
            image_url: slab_image_url(cert_number),
            source_link: card_url(cert_number),
            ..Self::default()
        }
    }

    /// Leading grade number as a sort key. Ungraded records return `None`
    /// and sort behind everything else.
    pub fn grade_numeric(&self) -> Option<f64> {
        self.grade_label.split_whitespace().next()?.parse().ok()
    }
}

/// Parser for card detail pages.
pub struct CardParser;

impl CardParser {
    /// Extract a [`CardRecord`] from page markup.
    ///
    /// Never fails on missing structure: each field falls back to an empty
    /// string on its own, and the html5ever-based parser accepts arbitrary
    /// malformed input. Fetch errors are the transport's to report.
    pub fn parse(html: &str, cert_number: &str) -> CardRecord {
        let document = Html::parse_document(html);
        let mut record = CardRecord::stub(cert_number);

        record.player_name = Self::labeled_value(&document, PLAYER_NAME_LABEL);
        record.set_name = Self::labeled_value(&document, SET_NAME_LABEL);
        record.subset = Self::labeled_value(&document, SUBSET_LABEL);
        record.variation = Self::labeled_value(&document, VARIATION_LABEL);
        record.grade_label = Self::grade_label(&document);

        record
    }

    /// Read the value adjacent to a label marker, first strategy that
    /// produces text wins.
    fn labeled_value(document: &Html, label: &str) -> String {
        let Some(marker) = find_marker(document, label) else {
            tracing::debug!(label, "label marker not found");
            return String::new();
        };

        for strategy in VALUE_STRATEGIES {
            if let Some(raw) = (strategy.read)(marker, label) {
                tracing::debug!(label, revision = strategy.revision, "value extracted");
                return normalize(&raw);
            }
        }

        tracing::debug!(label, "marker present but no value strategy matched");
        String::new()
    }

    /// Read the grade section. The first layout whose marker exists claims
    /// the page; a later layout is never consulted as a fallback for a
    /// broken earlier one.
    fn grade_label(document: &Html) -> String {
        for strategy in GRADE_STRATEGIES {
            let Some(marker) = find_marker(document, strategy.marker) else {
                continue;
            };
            return match (strategy.read)(marker) {
                Some(label) => label,
                None => {
                    tracing::debug!(
                        marker = strategy.marker,
                        revision = strategy.revision,
                        "grade marker present but surrounding shape is unsupported"
                    );
                    String::new()
                }
            };
        }

        tracing::debug!("no grade marker found");
        String::new()
    }
}

/// One way of reading the value that belongs to a label marker.
struct ValueStrategy {
    /// Page revision this tactic was written against.
    revision: &'static str,
    read: fn(ElementRef<'_>, &str) -> Option<String>,
}

const VALUE_STRATEGIES: &[ValueStrategy] = &[
    ValueStrategy {
        revision: "2024-03 paired spans",
        read: value_from_sibling_element,
    },
    ValueStrategy {
        revision: "2023-11 bare text node",
        read: value_from_sibling_text,
    },
    ValueStrategy {
        revision: "2023-07 label inside wrapper",
        read: value_from_parent_remainder,
    },
];

/// One known shape of the grade section, keyed on its anchor text.
struct GradeStrategy {
    marker: &'static str,
    revision: &'static str,
    read: fn(ElementRef<'_>) -> Option<String>,
}

const GRADE_STRATEGIES: &[GradeStrategy] = &[
    GradeStrategy {
        marker: "View Score",
        revision: "2024-03 score button",
        read: grade_beside_view_score,
    },
    GradeStrategy {
        marker: "TAG Score",
        revision: "2023-11 score panel",
        read: grade_beside_tag_score,
    },
];

/// Value is the text of the element right after the marker.
fn value_from_sibling_element(marker: ElementRef<'_>, _label: &str) -> Option<String> {
    let text = element_text(next_sibling_element(marker)?);
    (!text.is_empty()).then_some(text)
}

/// Value is a raw text node after the marker, no wrapping element.
fn value_from_sibling_text(marker: ElementRef<'_>, _label: &str) -> Option<String> {
    marker.next_siblings().find_map(|node| {
        let text = node.value().as_text()?.trim().to_string();
        (!text.is_empty()).then_some(text)
    })
}

/// Value is whatever the marker's parent holds beyond the label itself.
fn value_from_parent_remainder(marker: ElementRef<'_>, label: &str) -> Option<String> {
    let parent = parent_element(marker)?;
    let text = parent.text().collect::<String>();
    let (_, rest) = text.split_once(label)?;
    let rest = rest.trim();
    (!rest.is_empty()).then(|| rest.to_string())
}

/// "View Score" layout: the marker's parent is followed by a container
/// holding the grade number and, as its sibling, the grade name.
fn grade_beside_view_score(marker: ElementRef<'_>) -> Option<String> {
    // The anchor sits one wrapper shallower on some revisions, putting the
    // grade container right next to the marker itself.
    let container = parent_element(marker)
        .and_then(next_sibling_element)
        .or_else(|| next_sibling_element(marker))?;
    let number_el = first_inner_element(container)?;
    let name_el = next_sibling_element(number_el)?;

    let number = element_text(number_el);
    let name = element_text(name_el);
    (!number.is_empty() && !name.is_empty()).then(|| format!("{} {}", number, name))
}

/// "TAG Score" layout: the marker's preceding sibling carries a numeric
/// sub-score, and the number/name pair are the first two children of the
/// container after the marker's parent.
fn grade_beside_tag_score(marker: ElementRef<'_>) -> Option<String> {
    let sub_score = prev_sibling_element(marker)
        .map(element_text)
        .filter(|text| is_numeric(text))
        .unwrap_or_default();

    let container = next_sibling_element(parent_element(marker)?)?;
    let mut children = child_elements(container);
    let number = element_text(children.next()?);
    let name = element_text(children.next()?);
    if number.is_empty() || name.is_empty() {
        return None;
    }

    if sub_score.is_empty() {
        Some(format!("{} {}", number, name))
    } else {
        Some(format!("{} {} ({})", number, name, sub_score))
    }
}

/// Find the innermost element whose entire text equals `label`.
fn find_marker<'a>(document: &'a Html, label: &str) -> Option<ElementRef<'a>> {
    let mut marker = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| element_text(*el) == label)?;

    // Wrappers holding nothing but the label match too; descend so the
    // adjacency chains start at the element that actually carries the text.
    while let Some(inner) = child_elements(marker).find(|el| element_text(*el) == label) {
        marker = inner;
    }

    Some(marker)
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn next_sibling_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.next_siblings().find_map(ElementRef::wrap)
}

fn prev_sibling_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.prev_siblings().find_map(ElementRef::wrap)
}

fn parent_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.parent().and_then(ElementRef::wrap)
}

fn child_elements(el: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    el.children().filter_map(ElementRef::wrap)
}

fn first_inner_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.descendants().skip(1).find_map(ElementRef::wrap)
}

/// Trim and collapse the site's `-` placeholder to empty.
fn normalize(value: &str) -> String {
    let value = value.trim();
    if value == "-" {
        String::new()
    } else {
        value.to_string()
    }
}

fn is_numeric(text: &str) -> bool {
    Regex::new(r"^\d+(\.\d+)?$").unwrap().is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Trimmed-down copy of the current card page: label/value span pairs
    // plus the "View Score" grade section.
    const SAMPLE_HTML: &str = r#"<!DOCTYPE html>
<html>
<body>
<div class="card-details">
  <div><span>Player name:</span><span>Jane Doe</span></div>
  <div><span>Set name:</span><span>2021 Donruss Optic</span></div>
  <div><span>Subset:</span><span>-</span></div>
  <div><span>Variation:</span><span>Holo</span></div>
</div>
<div class="grade-panel">
  <div><div>View Score</div></div>
  <div><div>10</div><div>Pristine</div></div>
</div>
</body>
</html>"#;

    const TAG_SCORE_HTML: &str = r#"<html><body>
<div class="grade-panel">
  <div><div>98</div><div>TAG Score</div></div>
  <div><div>10</div><div>Pristine</div></div>
</div>
</body></html>"#;

    #[test]
    fn test_parse_full_page() {
        let record = CardParser::parse(SAMPLE_HTML, "G1234567");

        assert_eq!(record.cert_number, "G1234567");
        assert_eq!(record.player_name, "Jane Doe");
        assert_eq!(record.set_name, "2021 Donruss Optic");
        assert_eq!(record.subset, "");
        assert_eq!(record.variation, "Holo");
        assert_eq!(record.grade_label, "10 Pristine");
        assert!(record.tags.is_empty());
    }

    #[test]
    fn test_links_derive_from_cert_only() {
        for html in ["", "<html></html>", SAMPLE_HTML] {
            let record = CardParser::parse(html, " G1234567 ");
            assert_eq!(
                record.image_url,
                "https://devblock-tag.s3.us-west-2.amazonaws.com/slab-images/G1234567_Slabbed_FRONT.jpg"
            );
            assert_eq!(record.source_link, "https://my.taggrading.com/card/G1234567");
        }
    }

    #[test]
    fn test_dash_placeholder_normalizes_to_empty() {
        let html = "<div><span>Variation:</span><span> - </span></div>";
        let record = CardParser::parse(html, "X1");
        assert_eq!(record.variation, "");
    }

    #[test]
    fn test_value_from_bare_text_node() {
        let html = "<div><span>Player name:</span> Jane Doe </div>";
        let record = CardParser::parse(html, "X1");
        assert_eq!(record.player_name, "Jane Doe");
    }

    #[test]
    fn test_value_from_parent_when_siblings_are_empty() {
        // First element sibling is an empty icon, no text nodes between:
        // only the parent's remainder carries the value.
        let html = "<div><span>Subset:</span><i></i><span>Rookie</span></div>";
        let record = CardParser::parse(html, "X1");
        assert_eq!(record.subset, "Rookie");
    }

    #[test]
    fn test_grade_anchor_without_wrapper() {
        let html = r#"<html><body>
<div>View Score</div>
<div><div>10</div><div>Pristine</div></div>
</body></html>"#;
        let record = CardParser::parse(html, "X1");
        assert_eq!(record.grade_label, "10 Pristine");
    }

    #[test]
    fn test_missing_labels_leave_fields_empty() {
        let record = CardParser::parse("<html><body><p>nothing here</p></body></html>", "X1");
        assert_eq!(record.player_name, "");
        assert_eq!(record.set_name, "");
        assert_eq!(record.subset, "");
        assert_eq!(record.variation, "");
        assert_eq!(record.grade_label, "");
    }

    #[test]
    fn test_grade_tag_score_layout() {
        let record = CardParser::parse(TAG_SCORE_HTML, "X1");
        assert_eq!(record.grade_label, "10 Pristine (98)");
    }

    #[test]
    fn test_grade_tag_score_without_numeric_sub_score() {
        let html = r#"<html><body>
<div><div>Certified</div><div>TAG Score</div></div>
<div><div>8.5</div><div>Mint</div></div>
</body></html>"#;
        let record = CardParser::parse(html, "X1");
        assert_eq!(record.grade_label, "8.5 Mint");
    }

    #[test]
    fn test_view_score_wins_over_tag_score() {
        let html = r#"<html><body>
<div class="a">
  <div><div>View Score</div></div>
  <div><div>9</div><div>Mint</div></div>
</div>
<div class="b">
  <div><div>98</div><div>TAG Score</div></div>
  <div><div>10</div><div>Pristine</div></div>
</div>
</body></html>"#;
        let record = CardParser::parse(html, "X1");
        assert_eq!(record.grade_label, "9 Mint");
    }

    #[test]
    fn test_broken_view_score_does_not_fall_back() {
        // Marker present but no grade container after its parent: the page
        // claimed the "View Score" shape, so "TAG Score" must not be
        // guessed at.
        let html = r#"<html><body>
<div><div><div>View Score</div></div></div>
<div><div><div>98</div><div>TAG Score</div></div><div><div>10</div><div>Pristine</div></div></div>
</body></html>"#;
        let record = CardParser::parse(html, "X1");
        assert_eq!(record.grade_label, "");
    }

    #[test]
    fn test_one_broken_field_does_not_abort_the_rest() {
        let html = r#"<div><span>Player name:</span></div>
<div><span>Set name:</span><span>2020 Prizm</span></div>"#;
        let record = CardParser::parse(html, "X1");
        assert_eq!(record.player_name, "");
        assert_eq!(record.set_name, "2020 Prizm");
    }

    #[test]
    fn test_parse_is_idempotent() {
        let first = CardParser::parse(SAMPLE_HTML, "G1234567");
        let second = CardParser::parse(SAMPLE_HTML, "G1234567");
        assert_eq!(first, second);
    }

    #[test]
    fn test_grade_numeric() {
        let mut record = CardRecord::stub("X1");
        assert_eq!(record.grade_numeric(), None);

        record.grade_label = "10 Pristine".to_string();
        assert_eq!(record.grade_numeric(), Some(10.0));

        record.grade_label = "8.5 Mint (92)".to_string();
        assert_eq!(record.grade_numeric(), Some(8.5));

        record.grade_label = "Authentic".to_string();
        assert_eq!(record.grade_numeric(), None);
    }
}
