use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Reply payload for one processed frame.
///
/// Absent fields are left out of the JSON, so the "nothing new" reply is
/// exactly `{"status":"success"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    /// Asset names that were referenced but could not be resolved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_assets: Vec<String>,
}

impl Instruction {
    pub fn unchanged() -> Self {
        Self::with_status(Status::Success)
    }

    pub fn error() -> Self {
        Self::with_status(Status::Error)
    }

    fn with_status(status: Status) -> Self {
        Self {
            status,
            speech: None,
            image: None,
            video: None,
            missing_assets: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("serialize instruction")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_serializes_to_bare_status() -> Result<()> {
        assert_eq!(Instruction::unchanged().to_json()?, r#"{"status":"success"}"#);
        assert_eq!(Instruction::error().to_json()?, r#"{"status":"error"}"#);
        Ok(())
    }

    #[test]
    fn full_instruction_round_trips() -> Result<()> {
        let instruction = Instruction {
            status: Status::Success,
            speech: Some("Put the tray on the table.".to_string()),
            image: Some("images/tray.jpg".to_string()),
            video: None,
            missing_assets: vec!["tray.mp4".to_string()],
        };
        let json = instruction.to_json()?;
        assert!(json.contains(r#""speech":"Put the tray on the table.""#));
        assert!(!json.contains("video"));
        let back: Instruction = serde_json::from_str(&json)?;
        assert_eq!(back, instruction);
        Ok(())
    }
}
