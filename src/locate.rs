//! Keyword search across extracted pages. No model call.

use crate::document::Page;
use crate::error::StudyBotError;

/// Page numbers whose text contains `keyword`, ignoring case.
///
/// Matching uses Unicode lowercase on both sides, so "Newton", "NEWTON" and
/// "newton" all hit. The keyword is searched as given, surrounding spaces
/// included, so `" law "` does not match "lawful". Results are in ascending
/// page order without duplicates.
pub fn find_pages(keyword: &str, pages: &[Page]) -> Result<Vec<usize>, StudyBotError> {
    if keyword.trim().is_empty() {
        return Err(StudyBotError::InvalidInput(
            "search keyword must not be empty".into(),
        ));
    }
    let needle = keyword.to_lowercase();

    Ok(pages
        .iter()
        .filter(|p| p.text.to_lowercase().contains(&needle))
        .map(|p| p.number)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(texts: &[&str]) -> Vec<Page> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Page {
                number: i + 1,
                text: t.to_string(),
            })
            .collect()
    }

    #[test]
    fn case_insensitive_hits() {
        let p = pages(&[
            "Newton's first law",
            "Energy and work",
            "NEWTON meters",
            "",
            "units: newton",
        ]);
        assert_eq!(find_pages("newton", &p).unwrap(), vec![1, 3, 5]);
        assert_eq!(find_pages("NeWtOn", &p).unwrap(), vec![1, 3, 5]);
    }

    #[test]
    fn surrounding_spaces_are_part_of_the_keyword() {
        let p = pages(&["lawful conduct", "Newton's law of motion", "the law"]);
        assert_eq!(find_pages(" law ", &p).unwrap(), vec![2]);
        assert_eq!(find_pages("law", &p).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn no_hits_is_empty_not_error() {
        let p = pages(&["a", "b"]);
        assert!(find_pages("entropy", &p).unwrap().is_empty());
    }

    #[test]
    fn empty_keyword_rejected() {
        let p = pages(&["a"]);
        assert!(matches!(
            find_pages("   ", &p),
            Err(StudyBotError::InvalidInput(_))
        ));
    }

    #[test]
    fn unicode_case_folding() {
        let p = pages(&["Équation de Schrödinger"]);
        assert_eq!(find_pages("SCHRÖDINGER", &p).unwrap(), vec![1]);
    }
}
