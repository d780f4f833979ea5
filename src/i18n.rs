/*
Message catalog for user-facing strings produced by the backend.

`I18n` is built once at startup and shared through `AppState`; handlers call
`state.i18n.tr(lang, key, params)`.

Notes:
- Placeholders in translation strings use single-brace format: `{name}`.
- Default language is `en`. If a key is missing for the requested language,
  the English value is used, and failing that the key itself.
*/

use std::collections::HashMap;

pub const DEFAULT_LANG: &str = "en";

const EN_JSON: &str = r#"
{
  "auth.callback.success_title": "Authorization Successful",
  "auth.callback.success_body": "You have successfully connected your {platform} account.",
  "auth.callback.closing": "This window will close automatically...",
  "auth.callback.failed": "Authorization failed or was cancelled",
  "auth.callback.login_required": "Please log in first",
  "auth.callback.error": "An error occurred during authorization",
  "publish.not_authenticated": "Not authenticated. Please log in first.",
  "publish.not_authorized": "Not authorized. Please connect your account first.",
  "publish.expired": "Authorization expired. Please reconnect your account.",
  "publish.demo_success": "Content published successfully (Demo Mode)",
  "publish.success": "Posted to {platform} successfully",
  "validation.platform_required": "Platform is required",
  "validation.invalid_platform": "Invalid platform: {platform}",
  "validation.content_required": "Platform and content are required",
  "validation.product_info_required": "Please enter product information",
  "validation.invalid_plan": "Invalid plan",
  "generate.failed": "Failed to generate content",
  "generate.timeout": "Generation timed out. Please try again."
}
"#;

const ZH_JSON: &str = r#"
{
  "auth.callback.success_title": "授权成功",
  "auth.callback.success_body": "您已成功连接 {platform} 账号。",
  "auth.callback.closing": "此窗口将自动关闭……",
  "auth.callback.failed": "授权失败或已取消",
  "auth.callback.login_required": "请先登录",
  "auth.callback.error": "授权过程中发生错误",
  "publish.not_authenticated": "未登录，请先登录。",
  "publish.not_authorized": "未授权，请先连接您的账号。",
  "publish.expired": "授权已过期，请重新连接您的账号。",
  "publish.demo_success": "内容发布成功（演示模式）",
  "publish.success": "已成功发布到 {platform}",
  "validation.platform_required": "缺少平台参数",
  "validation.invalid_platform": "无效的平台：{platform}",
  "validation.content_required": "平台和内容为必填项",
  "validation.product_info_required": "请输入产品信息",
  "validation.invalid_plan": "无效的套餐",
  "generate.failed": "内容生成失败",
  "generate.timeout": "生成超时，请重试。"
}
"#;

const DE_JSON: &str = r#"
{
  "auth.callback.success_title": "Autorisierung erfolgreich",
  "auth.callback.success_body": "Ihr {platform}-Konto wurde erfolgreich verbunden.",
  "auth.callback.closing": "Dieses Fenster wird automatisch geschlossen...",
  "auth.callback.failed": "Autorisierung fehlgeschlagen oder abgebrochen",
  "auth.callback.login_required": "Bitte melden Sie sich zuerst an",
  "auth.callback.error": "Bei der Autorisierung ist ein Fehler aufgetreten",
  "publish.not_authenticated": "Nicht angemeldet. Bitte melden Sie sich zuerst an.",
  "publish.not_authorized": "Nicht autorisiert. Bitte verbinden Sie zuerst Ihr Konto.",
  "publish.expired": "Autorisierung abgelaufen. Bitte verbinden Sie Ihr Konto erneut.",
  "publish.demo_success": "Inhalt erfolgreich veröffentlicht (Demo-Modus)",
  "publish.success": "Erfolgreich auf {platform} veröffentlicht",
  "validation.platform_required": "Plattform ist erforderlich",
  "validation.invalid_platform": "Ungültige Plattform: {platform}",
  "validation.content_required": "Plattform und Inhalt sind erforderlich",
  "validation.product_info_required": "Bitte geben Sie Produktinformationen ein",
  "validation.invalid_plan": "Ungültiger Tarif",
  "generate.failed": "Inhalt konnte nicht generiert werden",
  "generate.timeout": "Zeitüberschreitung bei der Generierung. Bitte erneut versuchen."
}
"#;

/// Translations map (lang -> (key -> message)).
#[derive(Debug, Clone)]
pub struct I18n {
    translations: HashMap<String, HashMap<String, String>>,
}

impl I18n {
    /// Parse the embedded catalogs. Called once during startup.
    pub fn new() -> anyhow::Result<Self> {
        let mut translations = HashMap::new();
        for (lang, raw) in [("en", EN_JSON), ("zh", ZH_JSON), ("de", DE_JSON)] {
            let map: HashMap<String, String> = serde_json::from_str(raw)
                .map_err(|e| anyhow::anyhow!("failed to parse {} catalog: {}", lang, e))?;
            translations.insert(lang.to_string(), map);
        }
        Ok(Self { translations })
    }

    /// Returns true if the given language code has its own catalog.
    pub fn is_supported_language(&self, lang: &str) -> bool {
        self.translations.contains_key(lang)
    }

    /// Translate `key` for `lang` (or DEFAULT_LANG) and substitute `{name}` placeholders.
    pub fn tr(&self, lang: Option<&str>, key: &str, params: Option<&[(&str, &str)]>) -> String {
        let desired = lang.map(normalize_language);
        let desired = desired.as_deref().unwrap_or(DEFAULT_LANG);

        let val = self
            .translations
            .get(desired)
            .and_then(|m| m.get(key))
            .or_else(|| self.translations.get(DEFAULT_LANG).and_then(|m| m.get(key)))
            .cloned()
            .unwrap_or_else(|| key.to_string());

        match params {
            Some(params) => params.iter().fold(val, |s, (k, v)| {
                s.replace(&format!("{{{}}}", k), v)
            }),
            None => val,
        }
    }

    /// Convenience wrapper: translate using DEFAULT_LANG.
    pub fn t(&self, key: &str) -> String {
        self.tr(None, key, None)
    }
}

/// Normalize a language tag into a short, lowercase code (e.g. "en-US" -> "en").
pub fn normalize_language(lang: &str) -> String {
    let lang = lang.trim();
    lang.split(['-', '_'])
        .next()
        .unwrap_or(lang)
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn i18n() -> I18n {
        I18n::new().expect("catalogs parse")
    }

    #[test]
    fn catalogs_have_the_same_keys() {
        let i18n = i18n();
        let en = &i18n.translations["en"];
        for lang in ["zh", "de"] {
            let other = &i18n.translations[lang];
            for key in en.keys() {
                assert!(other.contains_key(key), "{} missing {}", lang, key);
            }
        }
    }

    #[test]
    fn translates_with_params() {
        let s = i18n().tr(
            Some("de-DE"),
            "auth.callback.success_body",
            Some(&[("platform", "Instagram")]),
        );
        assert_eq!(s, "Ihr Instagram-Konto wurde erfolgreich verbunden.");
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        let s = i18n().tr(Some("fr"), "publish.expired", None);
        assert_eq!(s, "Authorization expired. Please reconnect your account.");
    }

    #[test]
    fn missing_key_returns_key() {
        assert_eq!(i18n().t("non.existent.key"), "non.existent.key");
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language("en-US"), "en");
        assert_eq!(normalize_language("zh_CN"), "zh");
        assert_eq!(normalize_language("EN-us"), "en");
    }
}
