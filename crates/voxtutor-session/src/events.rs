//! Events handed to the UI collaborator.
//!
//! The pipeline never interprets game rules; it forwards whatever
//! state the remote tutor pushes through the `updateGameUI` tool,
//! parsed into a flat struct.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameType {
    WordSearch,
    Scramble,
    Riddle,
    ReadAloud,
    Idle,
}

/// Flat game-state update, decoded verbatim from tool-call arguments.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameUpdate {
    pub game_type: GameType,
    pub current_word: String,
    pub message: String,
    #[serde(default)]
    pub grid: Option<Vec<Vec<String>>>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub points: Option<u32>,
    #[serde(default, rename = "progressNextLevel")]
    pub progress_next_level: Option<u32>,
}

#[derive(Debug, Clone)]
pub enum UiEvent {
    Game(GameUpdate),
    /// Mirrors the playback scheduler's speaking flag for consumers
    /// that want a single event stream.
    Speaking(bool),
    /// Terminal failure (broken audio stream, transport error); the
    /// session tears down right after this event.
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_tool_args() {
        let update: GameUpdate = serde_json::from_value(serde_json::json!({
            "gameType": "WORD_SEARCH",
            "currentWord": "GATO",
            "message": "Encontre a palavra"
        }))
        .unwrap();
        assert_eq!(update.game_type, GameType::WordSearch);
        assert_eq!(update.current_word, "GATO");
        assert!(update.grid.is_none());
        assert!(update.options.is_none());
    }

    #[test]
    fn parses_full_tool_args() {
        let update: GameUpdate = serde_json::from_value(serde_json::json!({
            "gameType": "SCRAMBLE",
            "currentWord": "casa azul",
            "message": "Leia na ordem certa",
            "grid": [["A", "B"], ["C", "D"]],
            "options": ["azul casa", "casa azul"],
            "level": 3,
            "points": 75,
            "progressNextLevel": 40
        }))
        .unwrap();
        assert_eq!(update.game_type, GameType::Scramble);
        assert_eq!(update.grid.unwrap().len(), 2);
        assert_eq!(update.options.unwrap().len(), 2);
        assert_eq!(update.level, Some(3));
        assert_eq!(update.points, Some(75));
        assert_eq!(update.progress_next_level, Some(40));
    }

    #[test]
    fn unknown_game_type_is_an_error() {
        let result: Result<GameUpdate, _> = serde_json::from_value(serde_json::json!({
            "gameType": "CHESS",
            "currentWord": "",
            "message": ""
        }));
        assert!(result.is_err());
    }
}
