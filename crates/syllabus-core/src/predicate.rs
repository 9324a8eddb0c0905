//! Metadata predicates evaluated by [`ResourceIndex`](crate::store::ResourceIndex) backends.
//!
//! A [`Predicate`] is a small boolean tree over "set field contains token"
//! tests. The in-memory index evaluates it directly with
//! [`Predicate::matches`]; the SQLite index compiles it to `EXISTS` clauses.

use crate::models::{normalize_token, AttributeField, ResourceAttributes, SearchFilters};

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every record.
    Always,
    /// The field's token set contains `token` (already normalized).
    Contains { field: AttributeField, token: String },
    /// At least one child matches. An empty list matches nothing.
    AnyOf(Vec<Predicate>),
    /// Every child matches. An empty list matches everything.
    AllOf(Vec<Predicate>),
}

impl Predicate {
    pub fn contains(field: AttributeField, raw: &str) -> Option<Self> {
        normalize_token(raw).map(|token| Predicate::Contains { field, token })
    }

    /// Build the predicate for a set of filters: OR within a field, AND across fields.
    ///
    /// Fields whose values are all blank are ignored.
    pub fn from_filters(filters: &SearchFilters) -> Self {
        let mut clauses = Vec::new();
        for (field, values) in filters.fields() {
            let alternatives: Vec<Predicate> = values
                .iter()
                .filter_map(|v| Predicate::contains(field, v))
                .collect();
            match alternatives.len() {
                0 => {}
                1 => clauses.extend(alternatives),
                _ => clauses.push(Predicate::AnyOf(alternatives)),
            }
        }
        match clauses.len() {
            0 => Predicate::Always,
            1 => clauses.remove(0),
            _ => Predicate::AllOf(clauses),
        }
    }

    pub fn matches(&self, attributes: &ResourceAttributes) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::Contains { field, token } => attributes.set(*field).contains(token),
            Predicate::AnyOf(children) => children.iter().any(|p| p.matches(attributes)),
            Predicate::AllOf(children) => children.iter().all(|p| p.matches(attributes)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(tags: &[&str], audience: &[&str]) -> ResourceAttributes {
        let mut a = ResourceAttributes::default();
        for t in tags {
            a.insert(AttributeField::Tags, t);
        }
        for t in audience {
            a.insert(AttributeField::TargetAudience, t);
        }
        a
    }

    #[test]
    fn test_empty_filters_match_everything() {
        let p = Predicate::from_filters(&SearchFilters::default());
        assert_eq!(p, Predicate::Always);
        assert!(p.matches(&ResourceAttributes::default()));
    }

    #[test]
    fn test_or_within_field() {
        let filters = SearchFilters {
            tags: vec!["ml".to_string(), "ethics".to_string()],
            ..Default::default()
        };
        let p = Predicate::from_filters(&filters);
        assert!(p.matches(&attrs(&["ml"], &[])));
        assert!(p.matches(&attrs(&["ethics"], &[])));
        assert!(!p.matches(&attrs(&["robotics"], &[])));
    }

    #[test]
    fn test_and_across_fields() {
        let filters = SearchFilters {
            tags: vec!["ethics".to_string()],
            target_audience: vec!["Teachers".to_string()],
            ..Default::default()
        };
        let p = Predicate::from_filters(&filters);
        assert!(p.matches(&attrs(&["ethics"], &["teachers"])));
        assert!(!p.matches(&attrs(&["ethics"], &["students"])));
        assert!(!p.matches(&attrs(&["ml"], &["teachers"])));
    }

    #[test]
    fn test_case_insensitive_exact_token() {
        let filters = SearchFilters {
            tags: vec!["  ETHICS ".to_string()],
            ..Default::default()
        };
        let p = Predicate::from_filters(&filters);
        assert!(p.matches(&attrs(&["Ethics"], &[])));
        assert!(!p.matches(&attrs(&["ai ethics"], &[])));
    }

    #[test]
    fn test_blank_values_ignored() {
        let filters = SearchFilters {
            institution: vec!["".to_string(), "   ".to_string()],
            ..Default::default()
        };
        assert_eq!(Predicate::from_filters(&filters), Predicate::Always);
    }

    #[test]
    fn test_empty_combinators() {
        let a = ResourceAttributes::default();
        assert!(!Predicate::AnyOf(vec![]).matches(&a));
        assert!(Predicate::AllOf(vec![]).matches(&a));
    }
}
