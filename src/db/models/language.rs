use serde::{Deserialize, Serialize};

/// UI / generation language. Tags like `en-US` are accepted and reduced to
/// their primary subtag; anything unknown becomes English.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
    De,
    Es,
    Fr,
    Ja,
}

impl Language {
    pub fn from_tag(tag: &str) -> Self {
        match crate::i18n::normalize_language(tag).as_str() {
            "zh" => Language::Zh,
            "de" => Language::De,
            "es" => Language::Es,
            "fr" => Language::Fr,
            "ja" => Language::Ja,
            _ => Language::En,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Zh => "zh",
            Language::De => "de",
            Language::Es => "es",
            Language::Fr => "fr",
            Language::Ja => "ja",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduces_region_tags() {
        assert_eq!(Language::from_tag("zh-CN"), Language::Zh);
        assert_eq!(Language::from_tag("DE"), Language::De);
    }

    #[test]
    fn unknown_tags_fall_back_to_english() {
        assert_eq!(Language::from_tag("pt-BR"), Language::En);
        assert_eq!(Language::from_tag(""), Language::En);
    }
}
