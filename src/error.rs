use thiserror::Error;

/// Rejections raised while building records or loading configuration.
/// Nothing that fails here ever reaches the detection pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("cup profile name must be 1-50 characters, got {0}")]
    ProfileName(usize),

    #[error("cup size must be within 1-2000 ml, got {0}")]
    CupSize(u32),

    #[error("sips per cup must be within 1-100, got {0}")]
    SipsPerCup(u32),

    #[error("invalid color '{0}', expected #RRGGBB")]
    Color(String),

    #[error("sip volume must be within 0-1000 ml, got {0}")]
    SipVolume(f64),

    #[error("daily target must be greater than zero")]
    DailyTarget,

    #[error("invalid {field}: {message}")]
    Config { field: String, message: String },
}

impl ValidationError {
    pub fn config<S: Into<String>>(field: S, message: S) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }
}
