/*!
 * Prompt construction for chat-style backends.
 */

use crate::language_utils;
use crate::providers::BackendRequest;

/// System prompt template with `{source_language}` / `{target_language}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// The default system prompt for game text localization.
    pub const GAME_LOCALIZER: &'static str = r#"You are a professional video game localizer translating {source_language} into {target_language}.

Rules:
- Translate naturally and keep the tone of the original line.
- The text contains invisible marker characters (control or private use) standing for game placeholders. Copy every one of them into your translation exactly once; you may move them where the grammar of {target_language} needs them.
- Use the glossary translations for the listed terms.
- Reply with the translation only: no quotes, notes or explanations."#;

    /// Create a new prompt template.
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Render the template for a language pair, using language names where known.
    pub fn render(&self, source_language: &str, target_language: &str) -> String {
        self.template
            .replace("{source_language}", &display_name(source_language))
            .replace("{target_language}", &display_name(target_language))
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(Self::GAME_LOCALIZER)
    }
}

fn display_name(code: &str) -> String {
    language_utils::get_language_name(code).unwrap_or_else(|_| code.to_string())
}

/// Build the user message for a request
pub fn user_prompt(request: &BackendRequest) -> String {
    let mut prompt = String::new();

    if !request.glossary.is_empty() {
        prompt.push_str("Glossary:\n");
        for entry in &request.glossary {
            prompt.push_str(&format!("- {} => {}\n", entry.source, entry.target));
        }
        prompt.push('\n');
    }

    if request.entries > 0 {
        prompt.push_str(&format!(
            "Translate each of the {} entries below. Keep every <<ENTRY_n>> line and the final <<END>> line unchanged, and put each translation under its own marker.\n\n",
            request.entries
        ));
    } else {
        prompt.push_str("Translate the following text:\n\n");
    }
    prompt.push_str(&request.text);
    prompt
}
