use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical decode schema. Earlier provider prompts produced a richer
/// shape (`title`/`style`/`keyTokens`/`*Prompt` singulars); those keys
/// are folded in here during coercion so historical responses and
/// current ones normalize identically.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecodeResult {
    pub style_codes: Vec<String>,
    pub tags: Vec<String>,
    pub subjects: Vec<String>,
    pub prompts: PromptBundle,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptBundle {
    pub story: String,
    pub mix: String,
    pub expand: String,
    pub sound: String,
}

impl DecodeResult {
    pub fn is_empty(&self) -> bool {
        self.style_codes.is_empty()
            && self.tags.is_empty()
            && self.subjects.is_empty()
            && self.prompts.story.is_empty()
            && self.prompts.mix.is_empty()
            && self.prompts.expand.is_empty()
            && self.prompts.sound.is_empty()
    }
}

/// Coerces an arbitrary JSON object into the canonical shape: expected
/// arrays default to empty on absence or type mismatch, strings default
/// to empty, unknown fields are dropped.
pub fn coerce(value: Value) -> DecodeResult {
    let Value::Object(map) = value else {
        return DecodeResult::default();
    };

    let style_codes = string_array(map.get("styleCodes").or_else(|| map.get("srefCodes")));
    let tags = string_array(map.get("tags").or_else(|| map.get("keyTokens")));
    let subjects = string_array(map.get("subjects"));

    let mut prompts = map
        .get("prompts")
        .map(prompt_bundle)
        .unwrap_or_default();

    // legacy flat prompt keys
    if prompts.story.is_empty() {
        prompts.story = string_field(map.get("storyPrompt"));
    }
    if prompts.mix.is_empty() {
        prompts.mix = string_field(map.get("mixPrompt"));
    }
    if prompts.expand.is_empty() {
        prompts.expand = string_field(map.get("expandPrompt"));
    }
    if prompts.sound.is_empty() {
        prompts.sound = string_field(map.get("soundPrompt"));
    }

    DecodeResult {
        style_codes,
        tags,
        subjects,
        prompts,
    }
}

fn prompt_bundle(value: &Value) -> PromptBundle {
    let Value::Object(map) = value else {
        return PromptBundle::default();
    };
    PromptBundle {
        story: string_field(map.get("story")),
        mix: string_field(map.get("mix")),
        expand: string_field(map.get("expand")),
        sound: string_field(map.get("sound")),
    }
}

fn string_array(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(|s| s.to_string())
            .collect(),
        _ => Vec::new(),
    }
}

fn string_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_json;
    use serde_json::json;

    #[test]
    fn coerces_canonical_shape() {
        let result = coerce(json!({
            "styleCodes": ["--sref 123"],
            "tags": ["minimal"],
            "subjects": ["shape"],
            "prompts": {"story": "a", "mix": "b", "expand": "c", "sound": "d"}
        }));
        assert_eq!(result.style_codes, vec!["--sref 123"]);
        assert_eq!(result.tags, vec!["minimal"]);
        assert_eq!(result.subjects, vec!["shape"]);
        assert_eq!(result.prompts.story, "a");
        assert_eq!(result.prompts.sound, "d");
    }

    #[test]
    fn missing_or_mistyped_fields_default() {
        let result = coerce(json!({
            "styleCodes": "not-an-array",
            "tags": [1, 2, "real"],
            "prompts": "not-an-object",
            "surplus": true
        }));
        assert!(result.style_codes.is_empty());
        assert_eq!(result.tags, vec!["real"]);
        assert!(result.subjects.is_empty());
        assert_eq!(result.prompts, PromptBundle::default());
    }

    #[test]
    fn folds_legacy_rich_shape() {
        let result = coerce(json!({
            "title": "Neon alley",
            "style": "cyberpunk",
            "keyTokens": ["neon", "rain"],
            "srefCodes": ["--sref 42"],
            "storyPrompt": "s",
            "mixPrompt": "m",
            "expandPrompt": "e",
            "soundPrompt": "n"
        }));
        assert_eq!(result.tags, vec!["neon", "rain"]);
        assert_eq!(result.style_codes, vec!["--sref 42"]);
        assert_eq!(result.prompts.story, "s");
        assert_eq!(result.prompts.mix, "m");
        assert_eq!(result.prompts.expand, "e");
        assert_eq!(result.prompts.sound, "n");
    }

    #[test]
    fn canonical_keys_win_over_legacy_keys() {
        let result = coerce(json!({
            "tags": ["canonical"],
            "keyTokens": ["legacy"],
            "prompts": {"story": "new"},
            "storyPrompt": "old"
        }));
        assert_eq!(result.tags, vec!["canonical"]);
        assert_eq!(result.prompts.story, "new");
    }

    #[test]
    fn normalization_is_idempotent_over_its_own_output() {
        let original = coerce(json!({
            "styleCodes": ["--sref 9"],
            "tags": ["soft"],
            "subjects": ["portrait"],
            "prompts": {"story": "a", "mix": "b", "expand": "c", "sound": "d"}
        }));
        let reencoded = serde_json::to_string(&original).unwrap();
        let reparsed = coerce(extract_json(&reencoded).unwrap());
        assert_eq!(original, reparsed);
    }

    #[test]
    fn round_trips_through_fences_and_prose() {
        let canonical = json!({
            "styleCodes": ["--sref 7"],
            "tags": ["grainy"],
            "subjects": ["street"],
            "prompts": {"story": "a", "mix": "b", "expand": "c", "sound": "d"}
        });
        let plain = coerce(canonical.clone());

        let fenced = format!("```json\n{canonical}\n```");
        let prosed = format!("Here is the result: {canonical} — enjoy!");
        let trailing = canonical.to_string().replace("]}", "],}");

        for variant in [fenced, prosed, trailing] {
            let reparsed = coerce(extract_json(&variant).unwrap());
            assert_eq!(plain, reparsed, "variant failed: {variant}");
        }
    }
}
