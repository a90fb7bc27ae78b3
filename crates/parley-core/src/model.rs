#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Model {
    #[default]
    Chat,
    Reasoner,
}

impl Model {
    pub fn as_str(&self) -> &'static str {
        match self {
            Model::Chat => "deepseek-chat",
            Model::Reasoner => "deepseek-reasoner",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "deepseek-chat" | "chat" => Some(Model::Chat),
            "deepseek-reasoner" | "reasoner" => Some(Model::Reasoner),
            _ => None,
        }
    }

    pub fn all() -> Vec<Model> {
        vec![Model::Chat, Model::Reasoner]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Model::Chat => "DeepSeek Chat",
            Model::Reasoner => "DeepSeek Reasoner",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_accepts_ids_and_short_names() {
        assert_eq!(Model::from_str("deepseek-chat"), Some(Model::Chat));
        assert_eq!(Model::from_str(" Reasoner "), Some(Model::Reasoner));
        assert_eq!(Model::from_str("gpt-4o"), None);
    }

    #[test]
    fn test_default_is_chat() {
        assert_eq!(Model::default().as_str(), "deepseek-chat");
    }
}
