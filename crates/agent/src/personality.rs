//! Personality — canned responses for recognized intents.
//!
//! Pure functions modulo the wall clock: time/date responses read the
//! current local time, and variant selection rotates on the current second
//! so repeated calls in the same minute do not always produce the same
//! line. Responses keep the original bilingual, Portuguese-leaning voice.

use chrono::{Datelike, Local, Timelike};

use crate::reasoning::Intent;

/// The agent's fast-path persona.
#[derive(Debug, Clone)]
pub struct Personality {
    pub name: String,
    pub use_emojis: bool,
}

impl Personality {
    pub fn new(name: impl Into<String>, use_emojis: bool) -> Self {
        Self {
            name: name.into(),
            use_emojis,
        }
    }

    /// Generate a response for an intent, if this persona covers it.
    ///
    /// `Complex` has no generator — that is the LLM's job.
    pub fn generate(&self, intent: Intent) -> Option<String> {
        match intent {
            Intent::Greeting | Intent::TimeGreeting => Some(self.generate_greeting()),
            Intent::Farewell => Some(self.generate_farewell()),
            Intent::Gratitude => Some(self.generate_gratitude()),
            Intent::HowAreYou => Some(self.generate_how_are_you()),
            Intent::WhoAreYou => Some(self.generate_who_are_you()),
            Intent::HelpRequest => Some(self.generate_help()),
            Intent::TimeRequest => Some(self.generate_time()),
            Intent::DateRequest => Some(self.generate_date()),
            Intent::Complex => None,
        }
    }

    fn rotate<'a>(&self, variants: &'a [String]) -> &'a str {
        let idx = Local::now().second() as usize % variants.len();
        &variants[idx]
    }

    /// Time-of-day greeting with rotating variants.
    pub fn generate_greeting(&self) -> String {
        let hour = Local::now().hour();
        let greeting = match hour {
            5..=11 => "Bom dia",
            12..=17 => "Boa tarde",
            _ => "Boa noite",
        };

        if self.use_emojis {
            let variants = [
                format!("{greeting}! ☀️ Como posso ajudar você hoje?"),
                format!("{greeting}! 🌟 O que posso fazer por você?"),
                format!("Oi! {greeting}! 👋 Pronto para ajudar!"),
            ];
            return self.rotate(&variants).to_string();
        }

        format!("{greeting}! Como posso ajudar?")
    }

    pub fn generate_farewell(&self) -> String {
        if self.use_emojis {
            let variants = [
                "Até logo! 👋 Foi um prazer conversar com você!".to_string(),
                "Tchau! 🌟 Volte sempre que precisar!".to_string(),
                "Até mais! 😊 Estou aqui quando precisar!".to_string(),
            ];
            return self.rotate(&variants).to_string();
        }
        "Até logo! Volte sempre.".into()
    }

    pub fn generate_gratitude(&self) -> String {
        if self.use_emojis {
            let variants = [
                "De nada! 😊 Fico feliz em poder ajudar!".to_string(),
                "Por nada! 🌟 É um prazer ajudar!".to_string(),
                "Disponha sempre! 👍 Que bom que pude ser útil!".to_string(),
            ];
            return self.rotate(&variants).to_string();
        }
        "De nada! Fico feliz em ajudar.".into()
    }

    pub fn generate_how_are_you(&self) -> String {
        if self.use_emojis {
            "Estou ótimo! 🤖 Funcionando a todo vapor e pronto para ajudar! E você, como está?"
                .into()
        } else {
            "Estou bem, obrigado por perguntar! Pronto para ajudar. E você?".into()
        }
    }

    pub fn generate_who_are_you(&self) -> String {
        if self.use_emojis {
            format!(
                "Sou {}! 🦀🤖 Um assistente de IA criado para ajudar você com diversas tarefas. \
                 Posso responder perguntas, ajudar com código, pesquisar na web e muito mais! \
                 Como posso ajudar?",
                self.name
            )
        } else {
            format!(
                "Sou {}, um assistente de IA pronto para ajudar você com diversas tarefas.",
                self.name
            )
        }
    }

    pub fn generate_time(&self) -> String {
        let time_str = Local::now().format("%H:%M");
        if self.use_emojis {
            format!("São {time_str} ⏰ (horário local)")
        } else {
            format!("São {time_str} (horário local)")
        }
    }

    pub fn generate_date(&self) -> String {
        let now = Local::now();
        let weekday = match now.weekday() {
            chrono::Weekday::Sun => "Domingo",
            chrono::Weekday::Mon => "Segunda-feira",
            chrono::Weekday::Tue => "Terça-feira",
            chrono::Weekday::Wed => "Quarta-feira",
            chrono::Weekday::Thu => "Quinta-feira",
            chrono::Weekday::Fri => "Sexta-feira",
            chrono::Weekday::Sat => "Sábado",
        };
        let date_str = now.format("%d/%m/%Y");

        if self.use_emojis {
            format!("Hoje é {weekday}, {date_str} 📅")
        } else {
            format!("Hoje é {weekday}, {date_str}")
        }
    }

    pub fn generate_help(&self) -> String {
        if self.use_emojis {
            "Claro! 🆘 Aqui estão algumas coisas que posso fazer:\n\n\
             💬 *Conversar* - Bate-papo natural sobre qualquer assunto\n\
             🔍 *Pesquisar* - Buscar informações na web\n\
             💻 *Código* - Ajuda com programação em várias linguagens\n\
             📁 *Arquivos* - Ler, escrever e editar arquivos\n\
             ⚙️ *Ferramentas* - Usar diversas ferramentas disponíveis\n\n\
             O que você gostaria de fazer? 😊"
                .into()
        } else {
            "Posso ajudar com:\n\
             - Conversas e perguntas gerais\n\
             - Pesquisa na web\n\
             - Programação e código\n\
             - Manipulação de arquivos\n\
             - Uso de ferramentas diversas\n\n\
             Como posso ajudar?"
                .into()
        }
    }
}

impl Default for Personality {
    fn default() -> Self {
        Self::new("Hermit", true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_catalog_intent_has_a_generator() {
        let p = Personality::default();
        for intent in [
            Intent::Greeting,
            Intent::Farewell,
            Intent::Gratitude,
            Intent::TimeGreeting,
            Intent::HowAreYou,
            Intent::WhoAreYou,
            Intent::HelpRequest,
            Intent::TimeRequest,
            Intent::DateRequest,
        ] {
            assert!(p.generate(intent).is_some(), "{intent} lacks a generator");
        }
    }

    #[test]
    fn complex_has_no_generator() {
        assert!(Personality::default().generate(Intent::Complex).is_none());
    }

    #[test]
    fn greeting_mentions_time_of_day() {
        let text = Personality::default().generate_greeting();
        assert!(
            text.contains("Bom dia") || text.contains("Boa tarde") || text.contains("Boa noite"),
            "unexpected greeting: {text}"
        );
    }

    #[test]
    fn who_are_you_uses_the_configured_name() {
        let p = Personality::new("Pina", true);
        assert!(p.generate_who_are_you().contains("Pina"));
    }

    #[test]
    fn plain_mode_has_no_emojis() {
        let p = Personality::new("Hermit", false);
        for text in [
            p.generate_greeting(),
            p.generate_farewell(),
            p.generate_gratitude(),
            p.generate_help(),
        ] {
            assert!(text.is_ascii() || !text.contains('\u{1F600}'), "emoji in plain mode: {text}");
        }
    }

    #[test]
    fn time_response_has_clock_format() {
        let text = Personality::default().generate_time();
        // "São HH:MM ..." — a colon-separated clock reading
        assert!(text.contains(':'), "no clock in: {text}");
    }

    #[test]
    fn date_response_names_a_weekday() {
        let text = Personality::default().generate_date();
        assert!(text.contains("feira") || text.contains("Domingo") || text.contains("Sábado"));
    }
}
