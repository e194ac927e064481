//! Terminal rendering of the game state pushed by the tutor.

use voxtutor_session::{GameType, GameUpdate};

pub fn render_game(update: &GameUpdate) {
    println!();
    println!("══ {} ══", mission_label(update.game_type));
    if let Some(grid) = &update.grid {
        for row in grid {
            println!("  {}", row.join(" "));
        }
    }
    if !update.current_word.is_empty() {
        println!("  >> {}", update.current_word);
    }
    if let Some(options) = &update.options {
        for (i, option) in options.iter().enumerate() {
            println!("  [{}] {}", i + 1, option);
        }
    }
    println!("  {}", update.message);
    if let (Some(level), Some(points)) = (update.level, update.points) {
        let progress = update.progress_next_level.unwrap_or(0);
        println!("  Nível {}  |  {} pts  |  {}% para o próximo", level, points, progress);
    }
    println!();
}

pub fn render_speaking(speaking: bool) {
    if speaking {
        println!("  … mentor falando …");
    }
}

fn mission_label(game_type: GameType) -> &'static str {
    match game_type {
        GameType::WordSearch => "Missão: Caça-palavras",
        GameType::Scramble => "Missão: Frase embaralhada",
        GameType::Riddle => "Missão: Charada",
        GameType::ReadAloud => "Missão: Leitura em voz alta",
        GameType::Idle => "Aguardando missão",
    }
}
