//! Session configuration.
//!
//! Persona, voice, and game-progression text are data, not code: the
//! same pipeline serves any tutor variant by swapping this bundle.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::wire::{
    Content, GenerationConfig, Part, PrebuiltVoiceConfig, Setup, SpeechConfig, Tool, VoiceConfig,
};

pub const DEFAULT_MODEL: &str = "models/gemini-2.5-flash-native-audio-preview-09-2025";

/// Who the tutor is and how it talks. Loaded or selected by the app.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Display name of the tutor persona.
    pub name: String,
    /// Prebuilt voice to synthesize with.
    pub voice: String,
    /// Full system instruction, including game directives.
    pub instruction: String,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub model: String,
    pub persona: PersonaConfig,
}

impl SessionConfig {
    pub fn new(persona: PersonaConfig) -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            persona,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// The setup bundle sent as the first frame of the session.
    pub fn to_setup(&self) -> Setup {
        Setup {
            model: self.model.clone(),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: self.persona.voice.clone(),
                        },
                    },
                },
            },
            system_instruction: Content {
                parts: vec![Part {
                    text: Some(self.persona.instruction.clone()),
                    inline_data: None,
                }],
            },
            tools: vec![Tool {
                function_declarations: vec![update_game_ui_declaration()],
            }],
        }
    }
}

/// Name of the single tool the tutor may call.
pub const UPDATE_GAME_UI: &str = "updateGameUI";

/// Declaration of the `updateGameUI` tool: the only channel through
/// which the remote tutor drives the mini-game display.
pub fn update_game_ui_declaration() -> Value {
    json!({
        "name": UPDATE_GAME_UI,
        "parameters": {
            "type": "OBJECT",
            "description": "Updates the reading-mission interface.",
            "properties": {
                "gameType": {
                    "type": "STRING",
                    "enum": ["WORD_SEARCH", "SCRAMBLE", "RIDDLE", "READ_ALOUD", "IDLE"]
                },
                "currentWord": {
                    "type": "STRING",
                    "description": "The main word, sentence, or question."
                },
                "grid": {
                    "type": "ARRAY",
                    "items": { "type": "ARRAY", "items": { "type": "STRING" } },
                    "description": "5x5 letter grid for word search."
                },
                "message": {
                    "type": "STRING",
                    "description": "Short instruction from the mentor."
                },
                "options": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "description": "Answer options or hints."
                },
                "level": { "type": "NUMBER" },
                "points": { "type": "NUMBER" },
                "progressNextLevel": {
                    "type": "NUMBER",
                    "description": "Progress toward the next level, 0-100."
                }
            },
            "required": ["gameType", "currentWord", "message"]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persona() -> PersonaConfig {
        PersonaConfig {
            name: "Mentor".into(),
            voice: "Puck".into(),
            instruction: "Be brief.".into(),
        }
    }

    #[test]
    fn setup_carries_voice_instruction_and_tool() {
        let cfg = SessionConfig::new(persona());
        let setup = serde_json::to_value(cfg.to_setup()).unwrap();

        assert_eq!(setup["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            setup["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Puck"
        );
        assert_eq!(setup["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert_eq!(
            setup["tools"][0]["functionDeclarations"][0]["name"],
            "updateGameUI"
        );
    }

    #[test]
    fn tool_schema_requires_the_core_fields() {
        let decl = update_game_ui_declaration();
        let required = decl["parameters"]["required"].as_array().unwrap();
        assert_eq!(required.len(), 3);
        for field in ["gameType", "currentWord", "message"] {
            assert!(required.iter().any(|v| v == field));
        }
    }
}
