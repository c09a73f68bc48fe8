// Document Classifier
// Keyword heuristic over the full document text

use crate::models::DocumentType;

/// Checked in order; the first keyword found decides the type.
const KEYWORD_PRIORITY: &[(&str, DocumentType)] = &[
    ("договор", DocumentType::Contract),
    ("приказ", DocumentType::Order),
    ("постановление", DocumentType::Resolution),
    ("закон", DocumentType::Law),
    ("решение", DocumentType::Decision),
];

/// Case-insensitive substring match against [`KEYWORD_PRIORITY`].
/// Never fails: no match yields [`DocumentType::Unknown`].
pub fn classify_document(text: &str) -> DocumentType {
    let lower = text.to_lowercase();
    KEYWORD_PRIORITY
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, doc_type)| *doc_type)
        .unwrap_or(DocumentType::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_wins_over_law() {
        let text = "В соответствии с Законом РК стороны заключили настоящий договор.";
        assert_eq!(classify_document(text), DocumentType::Contract);
    }

    #[test]
    fn test_priority_ignores_position_and_frequency() {
        let text = "решение решение решение, принятое на основании приказа";
        assert_eq!(classify_document(text), DocumentType::Order);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify_document("ПОСТАНОВЛЕНИЕ ПРАВИТЕЛЬСТВА"), DocumentType::Resolution);
        assert_eq!(classify_document("Закон о труде"), DocumentType::Law);
        assert_eq!(classify_document("Решение суда"), DocumentType::Decision);
    }

    #[test]
    fn test_inflected_forms_match_as_substrings() {
        assert_eq!(classify_document("по договору аренды"), DocumentType::Contract);
        assert_eq!(classify_document("согласно законодательству"), DocumentType::Law);
    }

    #[test]
    fn test_default_is_unknown() {
        assert_eq!(classify_document("Lorem ipsum dolor sit amet"), DocumentType::Unknown);
        assert_eq!(classify_document(""), DocumentType::Unknown);
    }
}
