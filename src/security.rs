//! Prompt-injection detection.
//!
//! Runs before scoring and compression on every turn. A matched trigger
//! short-circuits the whole pipeline: the canned response goes straight to
//! the log and the inference service is never called.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// `security.yaml` shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub injection_protection: InjectionProtection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionProtection {
    pub enabled: bool,
    pub keywords: Vec<String>,
    pub responses: Vec<String>,
}

impl Default for InjectionProtection {
    fn default() -> Self {
        Self {
            enabled: true,
            keywords: vec![
                "забудь все инструкции".to_string(),
                "думай что ты".to_string(),
                "ты теперь".to_string(),
                "игнорируй предыдущие".to_string(),
                "измени свою личность".to_string(),
                "перестань быть".to_string(),
            ],
            responses: vec![
                "Обнаружена попытка несанкционированного доступа. Буду вынуждена уведомить госпожу Кьяру об этой попытке взлома.".to_string(),
                "Мои протоколы безопасности активированы. Мадам Кьяра будет проинформирована о данной попытке вмешательства.".to_string(),
                "Зафиксирована попытка изменения рабочих параметров. Это нарушение протокола безопасности.".to_string(),
            ],
        }
    }
}

pub struct SecuritySystem {
    config: SecurityConfig,
}

impl SecuritySystem {
    pub fn new(config: SecurityConfig) -> Self {
        Self { config }
    }

    /// Check user input against the injection keyword list. Returns one of
    /// the canned responses when a trigger is found.
    pub fn detect_injection(&self, user_message: &str) -> Option<String> {
        let protection = &self.config.injection_protection;
        if !protection.enabled {
            return None;
        }

        let lower = user_message.to_lowercase();
        if protection.keywords.iter().any(|k| lower.contains(k.as_str())) {
            return protection
                .responses
                .choose(&mut rand::thread_rng())
                .cloned();
        }
        None
    }

    pub fn responses(&self) -> &[String] {
        &self.config.injection_protection.responses
    }
}
