use std::collections::HashSet;

use crate::models::Citation;

/// Collapses repeated citations into a unique, order-preserving set keyed by
/// (section, page). `None` in means `None` out, distinguishing "no citation
/// data" from "all citations removed".
pub fn dedupe(citations: Option<Vec<Citation>>) -> Option<Vec<Citation>> {
    let citations = citations?;

    let mut seen: HashSet<(String, u32)> = HashSet::new();
    let mut unique = Vec::with_capacity(citations.len());
    for citation in citations {
        if seen.insert((citation.section.clone(), citation.page)) {
            unique.push(citation);
        }
    }

    Some(unique)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation(section: &str, page: u32, excerpt: Option<&str>) -> Citation {
        Citation {
            section: section.to_string(),
            page,
            excerpt: excerpt.map(str::to_string),
        }
    }

    #[test]
    fn absent_stays_absent() {
        assert_eq!(dedupe(None), None);
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(dedupe(Some(vec![])), Some(vec![]));
    }

    #[test]
    fn keeps_first_occurrence_per_section_page_pair() {
        let input = vec![
            citation("Race Day Schedule", 4, Some("swim start 07:00")),
            citation("Transition", 6, None),
            citation("Race Day Schedule", 4, Some("a different excerpt")),
            citation("Race Day Schedule", 5, None),
            citation("Transition", 6, Some("bike racking")),
        ];

        let output = dedupe(Some(input)).expect("list in, list out");
        assert_eq!(output.len(), 3);
        assert_eq!(output[0].section, "Race Day Schedule");
        assert_eq!(output[0].page, 4);
        assert_eq!(output[0].excerpt.as_deref(), Some("swim start 07:00"));
        assert_eq!(output[1].section, "Transition");
        assert_eq!(output[2].page, 5);
    }

    #[test]
    fn excerpt_is_not_part_of_identity() {
        let input = vec![
            citation("Course", 9, None),
            citation("Course", 9, Some("with excerpt")),
        ];
        let output = dedupe(Some(input)).expect("list in, list out");
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].excerpt, None);
    }
}
