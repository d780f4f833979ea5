//! Prompt construction for title and caption generation.
//!
//! Templates exist for English, Chinese and German. Every other language is
//! served with the English set.

use crate::db::models::{Language, Platform};
use crate::error::{AppError, AppResult};

/// Everything a user supplies for one generation.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub raw_subject_text: String,
    pub keywords: Vec<String>,
    pub language: Language,
    pub target_platform: Option<Platform>,
    pub purpose: Option<String>,
    /// Opaque image references. Forwarded to nobody yet; kept so the session
    /// snapshot round-trips what the client sent.
    pub attached_images: Vec<String>,
    pub sensitive_filter: bool,
}

impl GenerationRequest {
    pub fn new(raw_subject_text: impl Into<String>) -> Self {
        Self {
            raw_subject_text: raw_subject_text.into(),
            ..Default::default()
        }
    }

    /// A request is only issued with a non-empty subject.
    pub fn validate(&self) -> AppResult<()> {
        if self.raw_subject_text.trim().is_empty() {
            return Err(AppError::Validation(
                "Please enter product information".to_string(),
            ));
        }
        Ok(())
    }

    /// Keywords with blanks removed, in the order given.
    pub fn clean_keywords(&self) -> Vec<&str> {
        self.keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect()
    }
}

/// System and user instruction sent together to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

struct Templates {
    title_intro: &'static str,
    requirements_label: &'static str,
    title_requirements: &'static [&'static str],
    keywords_requirement: &'static str,
    purpose_requirement: &'static str,
    sensitive_requirement: &'static str,
    output_format: &'static str,
    ordinal_placeholders: [&'static str; 5],
    keyword_separator: &'static str,
    /// `{platform}` is replaced with the display name.
    caption_intro: &'static str,
    caption_requirements: &'static [&'static str],
    /// `{min}` and `{max}` are replaced with the platform window.
    caption_length: &'static str,
    title_label: &'static str,
    product_label: &'static str,
}

const EN: Templates = Templates {
    title_intro: "As a social media marketing expert, please generate 5 attention-grabbing titles for the following product.",
    requirements_label: "Requirements:",
    title_requirements: &[
        "Titles should be concise and impactful, suitable for social media platforms",
        "Each title must include the product's core value",
        "Titles should be engaging and shareable",
    ],
    keywords_requirement: "Incorporate these keywords appropriately: ",
    purpose_requirement: "The purpose of the post is: ",
    sensitive_requirement: "Avoid sensitive, offensive or misleading wording",
    output_format: "Output format must be:",
    ordinal_placeholders: [
        "[First title]",
        "[Second title]",
        "[Third title]",
        "[Fourth title]",
        "[Fifth title]",
    ],
    keyword_separator: ", ",
    caption_intro: "Create promotional content in English for the {platform} platform based on the following title.",
    caption_requirements: &[
        "Show the original title verbatim in the first line",
        "Promotional content starts from the second line",
        "Use appropriate emoji to enhance appeal",
        "Content should be concise and engaging",
        "Ensure title and content are separated by line breaks",
    ],
    caption_length: "Content length should be between {min}-{max} characters",
    title_label: "Title: ",
    product_label: "Product information: ",
};

const ZH: Templates = Templates {
    title_intro: "作为一个社交媒体营销专家，请为以下产品生成5个引人注目的标题。",
    requirements_label: "要求：",
    title_requirements: &[
        "标题简短有力，适合社交媒体平台",
        "每个标题都必须包含产品的核心价值",
        "标题要引人注目且易于分享",
    ],
    keywords_requirement: "合理使用以下关键词：",
    purpose_requirement: "发布目的：",
    sensitive_requirement: "避免敏感、冒犯或误导性的措辞",
    output_format: "输出格式必须为：",
    ordinal_placeholders: [
        "[第一个标题]",
        "[第二个标题]",
        "[第三个标题]",
        "[第四个标题]",
        "[第五个标题]",
    ],
    keyword_separator: "、",
    caption_intro: "请用中文根据以下标题为{platform}平台创建一个推广文案。",
    caption_requirements: &[
        "第一行原样展示原标题",
        "从第二行开始是推广文案",
        "使用适当的emoji表情符号增加吸引力",
        "文案要简洁有力，富有吸引力",
        "确保用换行符分隔标题和内容",
    ],
    caption_length: "文案长度限制在{min}-{max}字之间",
    title_label: "标题：",
    product_label: "产品信息：",
};

const DE: Templates = Templates {
    title_intro: "Als Social-Media-Marketing-Experte generieren Sie bitte 5 aufmerksamkeitsstarke Titel für das folgende Produkt.",
    requirements_label: "Anforderungen:",
    title_requirements: &[
        "Titel sollten prägnant und wirkungsvoll sein, geeignet für Social-Media-Plattformen",
        "Jeder Titel muss den Kernwert des Produkts enthalten",
        "Titel sollten ansprechend und teilbar sein",
    ],
    keywords_requirement: "Verwenden Sie diese Schlüsselwörter angemessen: ",
    purpose_requirement: "Der Zweck des Beitrags ist: ",
    sensitive_requirement: "Vermeiden Sie sensible, beleidigende oder irreführende Formulierungen",
    output_format: "Ausgabeformat muss sein:",
    ordinal_placeholders: [
        "[Erster Titel]",
        "[Zweiter Titel]",
        "[Dritter Titel]",
        "[Vierter Titel]",
        "[Fünfter Titel]",
    ],
    keyword_separator: ", ",
    caption_intro: "Erstellen Sie Werbeinhalt auf Deutsch für die {platform}-Plattform basierend auf folgendem Titel.",
    caption_requirements: &[
        "Originaltitel unverändert in der ersten Zeile anzeigen",
        "Werbeinhalt beginnt ab der zweiten Zeile",
        "Verwenden Sie passende Emojis zur Verbesserung der Attraktivität",
        "Inhalt sollte prägnant und ansprechend sein",
        "Stellen Sie sicher, dass Titel und Inhalt durch Zeilenumbrüche getrennt sind",
    ],
    caption_length: "Inhaltslänge sollte zwischen {min}-{max} Zeichen liegen",
    title_label: "Titel: ",
    product_label: "Produktinformationen: ",
};

fn templates(language: Language) -> &'static Templates {
    match language {
        Language::Zh => &ZH,
        Language::De => &DE,
        _ => &EN,
    }
}

/// Numbered requirement list; numbering is continuous whatever is optional.
fn numbered(lines: &[String]) -> String {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{}. {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Requirements shared by both prompt kinds, appended after the fixed ones.
fn optional_requirements(t: &Templates, request: &GenerationRequest) -> Vec<String> {
    let mut extra = Vec::new();
    let keywords = request.clean_keywords();
    if !keywords.is_empty() {
        extra.push(format!(
            "{}{}",
            t.keywords_requirement,
            keywords.join(t.keyword_separator)
        ));
    }
    if let Some(purpose) = request.purpose.as_deref().map(str::trim) {
        if !purpose.is_empty() {
            extra.push(format!("{}{}", t.purpose_requirement, purpose));
        }
    }
    if request.sensitive_filter {
        extra.push(t.sensitive_requirement.to_string());
    }
    extra
}

pub struct PromptBuilder;

impl PromptBuilder {
    /// Prompt asking for exactly five `N. text` titles.
    pub fn titles(request: &GenerationRequest) -> PromptPair {
        let t = templates(request.language);

        let mut requirements: Vec<String> =
            t.title_requirements.iter().map(|r| r.to_string()).collect();
        requirements.extend(optional_requirements(t, request));

        let format_sample = t
            .ordinal_placeholders
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{}. {}", i + 1, p))
            .collect::<Vec<_>>()
            .join("\n");
        requirements.push(format!("{}\n{}", t.output_format, format_sample));

        let system = format!(
            "{}\n{}\n{}",
            t.title_intro,
            t.requirements_label,
            numbered(&requirements)
        );
        let user = format!("{}{}", t.product_label, request.raw_subject_text.trim());

        PromptPair { system, user }
    }

    /// Prompt asking for the verbatim title on the first line followed by a
    /// promotional body sized for `platform`.
    pub fn platform_caption(
        request: &GenerationRequest,
        platform: Platform,
        title: &str,
    ) -> PromptPair {
        let t = templates(request.language);
        let (min, max) = platform.profile().caption_chars;

        let mut requirements: Vec<String> = t
            .caption_requirements
            .iter()
            .map(|r| r.to_string())
            .collect();
        requirements.insert(
            2,
            t.caption_length
                .replace("{min}", &min.to_string())
                .replace("{max}", &max.to_string()),
        );
        requirements.extend(optional_requirements(t, request));

        let system = format!(
            "{}\n{}\n{}",
            t.caption_intro
                .replace("{platform}", platform.display_name()),
            t.requirements_label,
            numbered(&requirements)
        );
        let user = format!(
            "{}{}\n{}{}",
            t.title_label,
            title,
            t.product_label,
            request.raw_subject_text.trim()
        );

        PromptPair { system, user }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(lang: Language, keywords: &[&str]) -> GenerationRequest {
        GenerationRequest {
            raw_subject_text: "wireless earbuds, noise cancelling".to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            language: lang,
            ..Default::default()
        }
    }

    #[test]
    fn title_prompt_demands_five_numbered_lines() {
        let pair = PromptBuilder::titles(&request(Language::En, &[]));
        for i in 1..=5 {
            assert!(pair.system.contains(&format!("\n{}. [", i)));
        }
        assert_eq!(
            pair.user,
            "Product information: wireless earbuds, noise cancelling"
        );
        assert!(!pair.system.contains("keywords"));
    }

    #[test]
    fn keywords_become_an_extra_requirement() {
        let pair = PromptBuilder::titles(&request(Language::En, &["Summer Sale", " ", "Bass"]));
        assert!(pair
            .system
            .contains("4. Incorporate these keywords appropriately: Summer Sale, Bass"));
        assert!(pair.system.contains("5. Output format must be:"));
    }

    #[test]
    fn chinese_keywords_use_enumeration_comma() {
        let pair = PromptBuilder::titles(&request(Language::Zh, &["夏季", "促销"]));
        assert!(pair.system.contains("夏季、促销"));
        assert!(pair.user.starts_with("产品信息："));
    }

    #[test]
    fn unsupported_language_uses_english_templates() {
        let fr = PromptBuilder::titles(&request(Language::Fr, &["Soldes"]));
        let en = PromptBuilder::titles(&request(Language::En, &["Soldes"]));
        assert_eq!(fr, en);
    }

    #[test]
    fn caption_prompt_uses_platform_window_and_verbatim_title() {
        let title = "3. Turn Up Summer With Noise-Free Sound";
        let req = request(Language::En, &[]);

        let ig = PromptBuilder::platform_caption(&req, Platform::Instagram, title);
        assert!(ig.system.contains("Instagram platform"));
        assert!(ig.system.contains("between 50-150 characters"));
        assert!(ig.system.contains("emoji"));
        assert!(ig.user.starts_with(&format!("Title: {}\n", title)));

        let x = PromptBuilder::platform_caption(&req, Platform::X, title);
        assert!(x.system.contains("between 50-100 characters"));

        let fb = PromptBuilder::platform_caption(&req, Platform::Facebook, title);
        assert!(fb.system.contains("between 50-200 characters"));
    }

    #[test]
    fn purpose_and_filter_are_appended() {
        let mut req = request(Language::De, &[]);
        req.purpose = Some("Produktlaunch".to_string());
        req.sensitive_filter = true;
        let pair = PromptBuilder::titles(&req);
        assert!(pair.system.contains("4. Der Zweck des Beitrags ist: Produktlaunch"));
        assert!(pair.system.contains("5. Vermeiden Sie"));
    }

    #[test]
    fn empty_subject_is_rejected() {
        assert!(matches!(
            GenerationRequest::new("   ").validate(),
            Err(AppError::Validation(_))
        ));
        assert!(GenerationRequest::new("earbuds").validate().is_ok());
    }
}
