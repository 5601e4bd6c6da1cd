//! Metadata autofill from extracted slide text.
//!
//! Each rule class is independent and best-effort: a signal that is absent
//! simply leaves its field out of the patch. Autofill never fails on
//! missing or malformed input.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::models::SlideMetadata;

/// Keyword vocabulary mapping text signals to a single-valued field.
/// First match wins, scanning in table order.
type Vocabulary = &'static [(&'static str, &'static str)];

static DOMAIN_VOCAB: Vocabulary = &[
    ("bank", "finance"),
    ("fintech", "finance"),
    ("insurance", "insurance"),
    ("healthcare", "healthcare"),
    ("hospital", "healthcare"),
    ("pharma", "healthcare"),
    ("retail", "retail"),
    ("e-commerce", "retail"),
    ("ecommerce", "retail"),
    ("telecom", "telecom"),
    ("energy", "energy"),
    ("oil and gas", "energy"),
    ("manufactur", "manufacturing"),
    ("logistics", "logistics"),
    ("government", "public_sector"),
    ("public sector", "public_sector"),
];

static REGION_VOCAB: Vocabulary = &[
    ("emea", "emea"),
    ("europe", "emea"),
    ("apac", "apac"),
    ("asia pacific", "apac"),
    ("north america", "amer"),
    ("americas", "amer"),
    ("latam", "latam"),
    ("latin america", "latam"),
];

static STATUS_VOCAB: Vocabulary = &[
    ("confidential", "internal"),
    ("internal use only", "internal"),
    ("draft", "draft"),
    ("approved", "approved"),
    ("final", "final"),
];

static FORMAT_VOCAB: Vocabulary = &[
    ("webinar", "webinar"),
    ("workshop", "workshop"),
    ("one pager", "one_pager"),
    ("one-pager", "one_pager"),
    ("pitch", "pitch"),
    ("roadmap", "roadmap"),
    ("report", "report"),
];

static LANGUAGE_VOCAB: Vocabulary = &[
    ("auf deutsch", "de"),
    ("en español", "es"),
    ("en français", "fr"),
];

/// Phrases that flag a slide as describing a customer case study.
static CASE_STUDY_SIGNALS: &[&str] = &[
    "case study",
    "client:",
    "customer:",
    "results achieved",
    "success story",
];

/// Solution-area keyword to code mapping. Many-to-many: all matches apply.
static SOLUTION_AREA_VOCAB: Vocabulary = &[
    ("crm", "crm"),
    ("customer relationship", "crm"),
    ("data platform", "data"),
    ("data warehouse", "data"),
    ("analytics", "analytics"),
    ("machine learning", "ml"),
    ("artificial intelligence", "ml"),
    ("cloud migration", "cloud"),
    ("devops", "devops"),
    ("security", "security"),
    ("integration", "integration"),
];

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(20\d{2})\b").expect("year regex"));

/// Fields the autofiller is confident about for one slide. `None` means
/// "no signal, keep whatever the caller already has".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataPatch {
    pub status: Option<String>,
    pub format: Option<String>,
    pub language: Option<String>,
    pub region: Option<String>,
    pub domain: Option<String>,
    pub is_case_study: Option<bool>,
    pub year_start: Option<i32>,
    pub year_finish: Option<i32>,
    pub solution_areas: Vec<String>,
}

impl MetadataPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.format.is_none()
            && self.language.is_none()
            && self.region.is_none()
            && self.domain.is_none()
            && self.is_case_study.is_none()
            && self.year_start.is_none()
            && self.year_finish.is_none()
            && self.solution_areas.is_empty()
    }

    /// Apply this patch over existing metadata. Fields without a confident
    /// value keep the caller's current value; nothing is ever cleared.
    pub fn apply_to(&self, metadata: &mut SlideMetadata) {
        if let Some(v) = &self.status {
            metadata.status = Some(v.clone());
        }
        if let Some(v) = &self.format {
            metadata.format = Some(v.clone());
        }
        if let Some(v) = &self.language {
            metadata.language = Some(v.clone());
        }
        if let Some(v) = &self.region {
            metadata.region = Some(v.clone());
        }
        if let Some(v) = &self.domain {
            metadata.domain = Some(v.clone());
        }
        if let Some(v) = self.is_case_study {
            metadata.is_case_study = Some(v);
        }
        if let Some(v) = self.year_start {
            metadata.year_start = Some(v);
        }
        if let Some(v) = self.year_finish {
            metadata.year_finish = Some(v);
        }
        for code in &self.solution_areas {
            if !metadata.solution_areas.contains(code) {
                metadata.solution_areas.push(code.clone());
            }
        }
        metadata.normalize();
    }
}

/// Scan lowercased text for the first vocabulary hit.
fn first_match(haystack: &str, vocab: Vocabulary) -> Option<String> {
    vocab
        .iter()
        .find(|(keyword, _)| haystack.contains(keyword))
        .map(|(_, value)| (*value).to_string())
}

/// Infers structured metadata from extracted text and frame heuristics.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataAutoFiller;

impl MetadataAutoFiller {
    pub fn new() -> Self {
        Self
    }

    /// Build a patch from extracted text and the frame's layer name.
    ///
    /// The caller's current metadata is consulted only for logging; the
    /// patch itself carries just the fields a rule matched.
    pub fn infer(&self, text: &str, frame_name: &str, current: &SlideMetadata) -> MetadataPatch {
        let haystack = text.to_lowercase();
        let name_lower = frame_name.to_lowercase();

        let mut patch = MetadataPatch {
            status: first_match(&haystack, STATUS_VOCAB),
            format: first_match(&haystack, FORMAT_VOCAB),
            language: first_match(&haystack, LANGUAGE_VOCAB),
            region: first_match(&haystack, REGION_VOCAB),
            domain: first_match(&haystack, DOMAIN_VOCAB),
            ..Default::default()
        };

        // Case study: text phrases or the frame name itself.
        if CASE_STUDY_SIGNALS
            .iter()
            .any(|s| haystack.contains(s) || name_lower.contains(s))
        {
            patch.is_case_study = Some(true);
        }

        self.infer_years(&haystack, &mut patch);

        for (keyword, code) in SOLUTION_AREA_VOCAB {
            if haystack.contains(keyword) && !patch.solution_areas.contains(&(*code).to_string())
            {
                patch.solution_areas.push((*code).to_string());
            }
        }

        if patch.is_empty() {
            debug!(frame = %frame_name, "autofill found no confident fields");
        } else if current.region.is_some() && patch.region.is_some() {
            debug!(frame = %frame_name, "autofill overrides previously set region");
        }

        patch
    }

    /// Extract plausible 4-digit years. Two or more distinct years set the
    /// start/finish range; a single year only sets the start.
    fn infer_years(&self, haystack: &str, patch: &mut MetadataPatch) {
        let mut years: Vec<i32> = YEAR_RE
            .captures_iter(haystack)
            .filter_map(|c| c[1].parse().ok())
            .filter(|y| (2000..=2099).contains(y))
            .collect();
        years.sort_unstable();
        years.dedup();

        match years.as_slice() {
            [] => {}
            [only] => patch.year_start = Some(*only),
            [first, .., last] => {
                patch.year_start = Some(*first);
                patch.year_finish = Some(*last);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer(text: &str, name: &str) -> MetadataPatch {
        MetadataAutoFiller::new().infer(text, name, &SlideMetadata::default())
    }

    #[test]
    fn test_domain_first_match_wins() {
        let patch = infer("Retail analytics for a leading bank", "Frame 1");
        // "bank" appears before "retail" in table order.
        assert_eq!(patch.domain.as_deref(), Some("finance"));
    }

    #[test]
    fn test_region_detection() {
        let patch = infer("Rollout across EMEA markets", "Frame 1");
        assert_eq!(patch.region.as_deref(), Some("emea"));
    }

    #[test]
    fn test_case_study_from_frame_name() {
        let patch = infer("Some generic content", "Acme case study v2");
        assert_eq!(patch.is_case_study, Some(true));
    }

    #[test]
    fn test_case_study_from_text() {
        let patch = infer("Client: Acme Corp\nResults achieved in Q2", "Frame 3");
        assert_eq!(patch.is_case_study, Some(true));
    }

    #[test]
    fn test_year_range() {
        let patch = infer("Project ran from 2019 to 2023", "Frame 1");
        assert_eq!(patch.year_start, Some(2019));
        assert_eq!(patch.year_finish, Some(2023));
    }

    #[test]
    fn test_single_year_sets_start_only() {
        let patch = infer("Delivered in 2022", "Frame 1");
        assert_eq!(patch.year_start, Some(2022));
        assert_eq!(patch.year_finish, None);
    }

    #[test]
    fn test_years_outside_range_ignored() {
        let patch = infer("Founded 1987, ISO 9001 certified", "Frame 1");
        assert_eq!(patch.year_start, None);
        assert_eq!(patch.year_finish, None);
    }

    #[test]
    fn test_solution_areas_are_many_valued() {
        let patch = infer("CRM integration with the data platform", "Frame 1");
        assert!(patch.solution_areas.contains(&"crm".to_string()));
        assert!(patch.solution_areas.contains(&"integration".to_string()));
        assert!(patch.solution_areas.contains(&"data".to_string()));
    }

    #[test]
    fn test_no_signal_leaves_existing_value_untouched() {
        let mut metadata = SlideMetadata {
            region: Some("emea".into()),
            ..Default::default()
        };
        let patch = infer("Nothing regional in here", "Frame 1");
        assert_eq!(patch.region, None);
        patch.apply_to(&mut metadata);
        assert_eq!(metadata.region.as_deref(), Some("emea"));
    }

    #[test]
    fn test_empty_input_yields_empty_patch() {
        let patch = infer("", "");
        assert!(patch.is_empty());
    }

    #[test]
    fn test_apply_deduplicates_solution_areas() {
        let mut metadata = SlideMetadata {
            solution_areas: vec!["crm".into()],
            ..Default::default()
        };
        let patch = infer("crm rollout", "Frame 1");
        patch.apply_to(&mut metadata);
        assert_eq!(metadata.solution_areas, vec!["crm".to_string()]);
    }
}
