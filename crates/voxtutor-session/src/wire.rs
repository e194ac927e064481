//! JSON wire types for the realtime bidi session.
//!
//! Field names follow the remote API's camelCase convention. An
//! inbound message may carry any subset of {setupComplete, toolCall,
//! serverContent}; outbound messages carry exactly one of {setup,
//! realtimeInput, toolResponse}.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use voxtutor_audio::EncodedBlock;

// ─── Outbound ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClientMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup: Option<Setup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realtime_input: Option<RealtimeInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_response: Option<ToolResponse>,
}

impl ClientMessage {
    pub fn setup(setup: Setup) -> Self {
        Self {
            setup: Some(setup),
            ..Self::default()
        }
    }

    /// One outbound microphone block as a realtime media chunk.
    pub fn realtime_audio(block: EncodedBlock) -> Self {
        Self {
            realtime_input: Some(RealtimeInput {
                media_chunks: vec![MediaChunk {
                    mime_type: block.mime_type.to_string(),
                    data: block.data,
                }],
            }),
            ..Self::default()
        }
    }

    /// Fixed-shape acknowledgment for one tool call, echoing its id
    /// and name so the remote side can continue the turn.
    pub fn tool_ack(call: &FunctionCall) -> Self {
        Self {
            tool_response: Some(ToolResponse {
                function_responses: vec![FunctionResponse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    response: serde_json::json!({ "status": "synchronized" }),
                }],
            }),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<MediaChunk>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaChunk {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    pub id: String,
    pub name: String,
    pub response: Value,
}

// ─── Shared ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

// ─── Inbound ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerMessage {
    pub setup_complete: Option<Value>,
    pub server_content: Option<ServerContent>,
    pub tool_call: Option<ToolCall>,
}

impl ServerMessage {
    /// Inline audio payloads of this message, in order.
    pub fn audio_blobs(&self) -> impl Iterator<Item = &Blob> {
        self.server_content
            .iter()
            .filter_map(|c| c.model_turn.as_ref())
            .flat_map(|turn| turn.parts.iter())
            .filter_map(|part| part.inline_data.as_ref())
            .filter(|blob| blob.mime_type.starts_with("audio/pcm"))
    }

    pub fn is_interrupted(&self) -> bool {
        self.server_content
            .as_ref()
            .map(|c| c.interrupted)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerContent {
    pub model_turn: Option<Content>,
    pub interrupted: bool,
    pub turn_complete: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolCall {
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct FunctionCall {
    pub id: String,
    pub name: String,
    pub args: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxtutor_audio::pcm;

    #[test]
    fn realtime_audio_serializes_with_camel_case_media_chunks() {
        let block = pcm::encode_block(&[0.0f32; 4]);
        let msg = ClientMessage::realtime_audio(block);
        let json = serde_json::to_value(&msg).unwrap();

        let chunk = &json["realtimeInput"]["mediaChunks"][0];
        assert_eq!(chunk["mimeType"], "audio/pcm;rate=16000");
        assert!(chunk["data"].is_string());
        assert!(json.get("setup").is_none());
        assert!(json.get("toolResponse").is_none());
    }

    #[test]
    fn tool_ack_echoes_id_and_name() {
        let call = FunctionCall {
            id: "call-7".into(),
            name: "updateGameUI".into(),
            args: Value::Null,
        };
        let json = serde_json::to_value(ClientMessage::tool_ack(&call)).unwrap();
        let resp = &json["toolResponse"]["functionResponses"][0];
        assert_eq!(resp["id"], "call-7");
        assert_eq!(resp["name"], "updateGameUI");
        assert_eq!(resp["response"]["status"], "synchronized");
    }

    #[test]
    fn server_message_parses_mixed_payload() {
        let raw = serde_json::json!({
            "serverContent": {
                "modelTurn": {
                    "parts": [
                        { "text": "ok" },
                        { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AAAA" } }
                    ]
                },
                "interrupted": true
            },
            "toolCall": {
                "functionCalls": [
                    { "id": "1", "name": "updateGameUI", "args": { "gameType": "IDLE" } }
                ]
            }
        });
        let msg: ServerMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.audio_blobs().count(), 1);
        assert!(msg.is_interrupted());
        assert_eq!(msg.tool_call.unwrap().function_calls.len(), 1);
    }

    #[test]
    fn unknown_fields_and_absent_sections_are_tolerated() {
        let msg: ServerMessage =
            serde_json::from_value(serde_json::json!({ "setupComplete": {} })).unwrap();
        assert!(msg.setup_complete.is_some());
        assert_eq!(msg.audio_blobs().count(), 0);
        assert!(!msg.is_interrupted());
    }
}
