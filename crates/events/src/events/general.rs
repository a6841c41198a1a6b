use serde::{Deserialize, Serialize};

/// Events outside the download and install lifecycles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeneralEvent {
    /// Something went wrong that does not change the attempt's outcome
    Warning { message: String, context: String },
}

impl GeneralEvent {
    #[must_use]
    pub fn warning(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Warning {
            message: message.into(),
            context: context.into(),
        }
    }
}
