//! Label Server

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Registry mapping label names to stable integer codes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelServer {
    names: Vec<String>,
    codes: HashMap<String, usize>,
}

impl LabelServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` and return its code; known names keep their code
    pub fn add_label(&mut self, name: &str) -> usize {
        if let Some(&code) = self.codes.get(name) {
            return code;
        }
        let code = self.names.len();
        self.names.push(name.to_string());
        self.codes.insert(name.to_string(), code);
        debug!("Registered label '{}' as {}", name, code);
        code
    }

    pub fn code_of(&self, name: &str) -> Option<usize> {
        self.codes.get(name).copied()
    }

    pub fn name_of(&self, code: usize) -> Option<&str> {
        self.names.get(code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
        self.codes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        let mut server = LabelServer::new();
        assert_eq!(server.add_label("spk01"), 0);
        assert_eq!(server.add_label("spk02"), 1);
        assert_eq!(server.add_label("spk01"), 0);
        assert_eq!(server.len(), 2);
        assert_eq!(server.name_of(1), Some("spk02"));
        assert_eq!(server.code_of("spk03"), None);
    }

    #[test]
    fn test_clear() {
        let mut server = LabelServer::new();
        server.add_label("a");
        server.clear();
        assert!(server.is_empty());
        assert_eq!(server.add_label("b"), 0);
    }
}
