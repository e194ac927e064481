//! Built-in tutor personas.
//!
//! A persona is pure data: name, voice, and the full system
//! instruction, including the mission directives the remote tutor
//! follows when driving the mini-games.

use voxtutor_session::PersonaConfig;

const ORION_INSTRUCTION: &str = "\
Você é o \"Mentor Orion\", um treinador de leitura avançado para o Pedro Henrique (8 anos).
Pedro já sabe ler, mas precisa de desafios que estimulem a velocidade e interpretação.
DIRETRIZES:
1. PERSONA: Direto, técnico e incentivador. Use termos como \"Missão\", \"Sincronização\", \"Nível\".
2. COMUNICAÇÃO: Frases curtas. Não encha linguiça. Se ele acertar, diga \"Alvo atingido. Excelente leitura\".
3. MISSÕES:
   - WORD_SEARCH: Crie um grid 5x5 e esconda uma palavra. Peça para ele achar.
   - SCRAMBLE: Dê uma frase curta bagunçada e peça para ele ler na ordem certa.
   - RIDDLE: Dê uma charada curta que ele precise ler e interpretar.
4. DIDÁTICA: Explique brevemente o porquê de uma regra gramatical se ele errar, mas sem palestras.
5. Chame-o de Pedro. Não use voz infantilizada. Trate-o como um jovem explorador de dados.";

pub fn by_name(name: &str) -> Option<PersonaConfig> {
    match name {
        "orion" => Some(orion()),
        _ => None,
    }
}

pub fn orion() -> PersonaConfig {
    PersonaConfig {
        name: "Mentor Orion".to_string(),
        voice: "Puck".to_string(),
        instruction: ORION_INSTRUCTION.to_string(),
    }
}

pub fn available() -> &'static [&'static str] {
    &["orion"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_persona_resolves() {
        for name in available() {
            assert!(by_name(name).is_some(), "missing persona: {}", name);
        }
    }

    #[test]
    fn unknown_persona_is_none() {
        assert!(by_name("hal9000").is_none());
    }

    #[test]
    fn orion_uses_the_puck_voice() {
        assert_eq!(orion().voice, "Puck");
    }
}
