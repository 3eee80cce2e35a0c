use icu::casemap::CaseMapper;

/// Culture-aware case folding used by case-insensitive comparison.
///
/// Turkish and Azeri fold dotted/dotless i differently from every other
/// culture; all remaining cultures share the default Unicode folding.
pub fn fold_case(s: &str, culture: Option<&str>) -> String {
    let mapper = CaseMapper::new();
    if is_turkic(culture) {
        mapper.fold_turkic_string(s)
    } else {
        mapper.fold_string(s)
    }
}

fn is_turkic(culture: Option<&str>) -> bool {
    let Some(culture) = culture else {
        return false;
    };
    let language = culture
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    language == "tr" || language == "az"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_ascii() {
        assert_eq!(fold_case("Hello World", None), "hello world");
    }

    #[test]
    fn folds_sharp_s() {
        assert_eq!(fold_case("Straße", None), fold_case("STRASSE", None));
    }

    #[test]
    fn turkic_culture_folds_dotted_capital_i() {
        assert_eq!(fold_case("İ", Some("tr-TR")), "i");
        assert_eq!(fold_case("I", Some("tr-TR")), "ı");
        assert_eq!(fold_case("I", Some("en-US")), "i");
    }
}
