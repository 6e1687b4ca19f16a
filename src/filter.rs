//! Contact filter engine: a conjunction of field predicates evaluated over the
//! in-memory contact set.

use crate::model::Contact;
use crate::search;

/// Business sector choices offered by the filter bar and the contact editor.
pub const SECTOR_OPTIONS: &[&str] = &[
    "Retail",
    "Industrial",
    "Investor",
    "Technology",
    "Healthcare",
    "Finance",
    "Education",
    "Real Estate",
    "Manufacturing",
    "Consulting",
    "Other",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkedinFilter {
    #[default]
    Any,
    /// Non-blank value present.
    Known,
    /// Missing or blank.
    Blank,
}

impl LinkedinFilter {
    /// Parse from string (case-insensitive). Empty means `Any`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "any" => Some(LinkedinFilter::Any),
            "known" => Some(LinkedinFilter::Known),
            "blank" => Some(LinkedinFilter::Blank),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LinkedinFilter::Any => "Any",
            LinkedinFilter::Known => "Known",
            LinkedinFilter::Blank => "Blank",
        }
    }

    pub fn next(self) -> Self {
        match self {
            LinkedinFilter::Any => LinkedinFilter::Known,
            LinkedinFilter::Known => LinkedinFilter::Blank,
            LinkedinFilter::Blank => LinkedinFilter::Any,
        }
    }

    fn matches(self, value: Option<&str>) -> bool {
        let known = value.map(|v| !v.trim().is_empty()).unwrap_or(false);
        match self {
            LinkedinFilter::Any => true,
            LinkedinFilter::Known => known,
            LinkedinFilter::Blank => !known,
        }
    }
}

/// Current filter bar values. Blank text means the field is unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub business_sector: String,
    pub company: String,
    pub notes: String,
    pub linkedin: LinkedinFilter,
}

impl FilterState {
    /// True when at least one field constrains the result.
    pub fn is_active(&self) -> bool {
        !self.business_sector.trim().is_empty()
            || !self.company.trim().is_empty()
            || !self.notes.trim().is_empty()
            || self.linkedin != LinkedinFilter::Any
    }

    /// Reset every field in one step.
    pub fn clear(&mut self) {
        *self = FilterState::default();
    }

    /// Step the sector predicate through "unset" and each option in turn.
    pub fn cycle_sector(&mut self, forward: bool) {
        let current = SECTOR_OPTIONS
            .iter()
            .position(|option| option.eq_ignore_ascii_case(self.business_sector.trim()));
        let len = SECTOR_OPTIONS.len();
        let next = match (current, forward) {
            (None, true) => Some(0),
            (None, false) => Some(len - 1),
            (Some(i), true) if i + 1 < len => Some(i + 1),
            (Some(_), true) => None,
            (Some(0), false) => None,
            (Some(i), false) => Some(i - 1),
        };
        self.business_sector = next.map(|i| SECTOR_OPTIONS[i].to_string()).unwrap_or_default();
    }

    pub fn matches(&self, contact: &Contact) -> bool {
        Predicates::compile(self).test(contact)
    }
}

/// Filter state compiled once per evaluation: needles are trimmed and
/// case-folded up front.
#[derive(Debug, Clone, Default)]
pub struct Predicates {
    sector: Option<String>,
    company: Option<String>,
    notes: Option<String>,
    linkedin: LinkedinFilter,
}

impl Predicates {
    pub fn compile(filter: &FilterState) -> Self {
        Self {
            sector: search::normalize_query(&filter.business_sector),
            company: search::normalize_query(&filter.company),
            notes: search::normalize_query(&filter.notes),
            linkedin: filter.linkedin,
        }
    }

    pub fn test(&self, contact: &Contact) -> bool {
        substring(&self.sector, contact.business_sector.as_deref())
            && substring(&self.company, contact.company.as_deref())
            && substring(&self.notes, contact.notes.as_deref())
            && self.linkedin.matches(contact.linkedin.as_deref())
    }
}

fn substring(needle: &Option<String>, value: Option<&str>) -> bool {
    match needle {
        None => true,
        Some(needle) => value
            .map(|value| search::contains_normalized(value, needle))
            .unwrap_or(false),
    }
}

/// Apply every configured predicate (logical AND), keeping the input order.
pub fn apply_filters<'a>(contacts: &'a [Contact], filter: &FilterState) -> Vec<&'a Contact> {
    let predicates = Predicates::compile(filter);
    contacts.iter().filter(|contact| predicates.test(contact)).collect()
}

/// Same as [`apply_filters`] but yields positions into `contacts`, which is
/// what the contacts screen keeps as its visible rows.
pub fn matching_indices(contacts: &[Contact], filter: &FilterState) -> Vec<usize> {
    let predicates = Predicates::compile(filter);
    contacts
        .iter()
        .enumerate()
        .filter(|(_, contact)| predicates.test(contact))
        .map(|(index, _)| index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(id: &str, company: Option<&str>) -> Contact {
        let mut c = Contact {
            id: id.to_string(),
            company: company.map(str::to_string),
            ..Contact::default()
        };
        c.refresh_display_name();
        c
    }

    fn ids(contacts: &[&Contact]) -> Vec<String> {
        contacts.iter().map(|c| c.id.clone()).collect()
    }

    #[test]
    fn test_empty_filter_keeps_everything_in_order() {
        let contacts = vec![contact("a", Some("Acme")), contact("b", None), contact("c", Some("Beta"))];
        let result = apply_filters(&contacts, &FilterState::default());
        assert_eq!(ids(&result), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_company_is_case_insensitive_substring() {
        let contacts = vec![
            contact("1", Some("Acme")),
            contact("2", Some("Beta")),
            contact("3", Some("acme corp")),
        ];
        let filter = FilterState {
            company: "acme".to_string(),
            ..FilterState::default()
        };
        assert_eq!(ids(&apply_filters(&contacts, &filter)), vec!["1", "3"]);
    }

    #[test]
    fn test_missing_field_is_excluded_once_constrained() {
        let contacts = vec![contact("1", None), contact("2", Some("Acme"))];
        let filter = FilterState {
            company: "a".to_string(),
            ..FilterState::default()
        };
        assert_eq!(ids(&apply_filters(&contacts, &filter)), vec!["2"]);
    }

    #[test]
    fn test_linkedin_known_and_blank() {
        let mut with_profile = contact("with", None);
        with_profile.linkedin = Some("linkedin.com/in/jane".to_string());
        let mut empty = contact("empty", None);
        empty.linkedin = Some("   ".to_string());
        let missing = contact("missing", None);
        let contacts = vec![with_profile, empty, missing];

        let known = FilterState {
            linkedin: LinkedinFilter::Known,
            ..FilterState::default()
        };
        assert_eq!(ids(&apply_filters(&contacts, &known)), vec!["with"]);

        let blank = FilterState {
            linkedin: LinkedinFilter::Blank,
            ..FilterState::default()
        };
        assert_eq!(ids(&apply_filters(&contacts, &blank)), vec!["empty", "missing"]);
    }

    #[test]
    fn test_predicates_are_conjunctive() {
        let mut a = contact("a", Some("Acme"));
        a.business_sector = Some("Retail".to_string());
        a.notes = Some("Met at expo".to_string());
        let mut b = contact("b", Some("Acme"));
        b.business_sector = Some("Industrial".to_string());
        let contacts = vec![a, b];

        let filter = FilterState {
            business_sector: "retail".to_string(),
            company: "acme".to_string(),
            notes: "EXPO".to_string(),
            linkedin: LinkedinFilter::Blank,
        };
        assert_eq!(ids(&apply_filters(&contacts, &filter)), vec!["a"]);
    }

    #[test]
    fn test_apply_filters_is_idempotent() {
        let contacts = vec![
            contact("1", Some("Acme")),
            contact("2", Some("Beta")),
            contact("3", Some("acme corp")),
        ];
        let filter = FilterState {
            company: "acme".to_string(),
            ..FilterState::default()
        };
        let once: Vec<Contact> = apply_filters(&contacts, &filter).into_iter().cloned().collect();
        let twice: Vec<Contact> = apply_filters(&once, &filter).into_iter().cloned().collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_clear_and_is_active() {
        let mut filter = FilterState::default();
        assert!(!filter.is_active());
        filter.notes = "  ".to_string();
        assert!(!filter.is_active());
        filter.linkedin = LinkedinFilter::Known;
        filter.company = "x".to_string();
        assert!(filter.is_active());
        filter.clear();
        assert_eq!(filter, FilterState::default());
    }

    #[test]
    fn test_cycle_sector() {
        let mut filter = FilterState::default();
        filter.cycle_sector(true);
        assert_eq!(filter.business_sector, "Retail");
        filter.cycle_sector(false);
        assert_eq!(filter.business_sector, "");
        filter.cycle_sector(false);
        assert_eq!(filter.business_sector, "Other");
        filter.cycle_sector(true);
        assert_eq!(filter.business_sector, "");
    }

    #[test]
    fn test_matching_indices() {
        let contacts = vec![contact("1", Some("Acme")), contact("2", Some("Beta"))];
        let filter = FilterState {
            company: "beta".to_string(),
            ..FilterState::default()
        };
        assert_eq!(matching_indices(&contacts, &filter), vec![1]);
    }
}
