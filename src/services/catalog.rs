use crate::models::product_region;

/// Règle de visibilité régionale d'un produit:
/// - aucune restriction => visible partout,
/// - au moins une restriction => visible seulement si le pays du client
///   figure dans la liste,
/// - pays inconnu + produit restreint => invisible (fail-closed).
pub fn is_visible_in_region(
    regions: &[product_region::Model],
    country_code: Option<&str>,
) -> bool {
    if regions.is_empty() {
        return true;
    }

    match country_code {
        Some(cc) => regions.iter().any(|region| region.country_code == cc),
        None => false,
    }
}

/// Normalise un code pays ISO 3166-1 alpha-2 ("br" -> "BR").
/// Retourne None si le format est invalide.
pub fn normalize_country_code(code: &str) -> Option<String> {
    let code = code.trim();

    if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code.to_ascii_uppercase())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(country_code: &str) -> product_region::Model {
        product_region::Model {
            id: "r1".to_string(),
            product_id: "p1".to_string(),
            country_code: country_code.to_string(),
        }
    }

    #[test]
    fn test_no_regions_is_globally_visible() {
        assert!(is_visible_in_region(&[], Some("BR")));
        assert!(is_visible_in_region(&[], None));
    }

    #[test]
    fn test_matching_region_is_visible() {
        assert!(is_visible_in_region(&[region("US")], Some("US")));
    }

    #[test]
    fn test_non_matching_region_is_hidden() {
        assert!(!is_visible_in_region(&[region("US")], Some("BR")));
    }

    #[test]
    fn test_unknown_country_fails_closed() {
        assert!(!is_visible_in_region(&[region("US")], None));
    }

    #[test]
    fn test_any_region_match_suffices() {
        let regions = [region("US"), region("BR")];
        assert!(is_visible_in_region(&regions, Some("BR")));
    }

    #[test]
    fn test_country_code_normalization() {
        assert_eq!(normalize_country_code("BR"), Some("BR".to_string()));
        assert_eq!(normalize_country_code("us"), Some("US".to_string()));
        assert_eq!(normalize_country_code("BRA"), None);
        assert_eq!(normalize_country_code("1A"), None);
        assert_eq!(normalize_country_code(""), None);
    }
}
