use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing announcement")]
    MissingAnnouncement,
    #[error("Missing prompt")]
    MissingPrompt,
}

/// The founder's brief. Only the announcement body is required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnouncementContext {
    pub announcement: String,
    pub stage: Option<String>,
    pub market: Option<String>,
    pub geo: Option<String>,
    pub funding: Option<String>,
    pub backers: Option<String>,
    pub partners: Option<String>,
}

impl AnnouncementContext {
    pub fn new(announcement: impl Into<String>) -> Result<Self, ValidationError> {
        let announcement = announcement.into();
        if announcement.trim().is_empty() {
            return Err(ValidationError::MissingAnnouncement);
        }
        Ok(Self {
            announcement,
            ..Self::default()
        })
    }

    /// Build from an untyped request body. Optional fields that are absent,
    /// blank or not strings are left unset.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let announcement = body
            .get("announcement")
            .and_then(Value::as_str)
            .ok_or(ValidationError::MissingAnnouncement)?;

        let field = |name: &str| optional_text(body.get(name).and_then(Value::as_str));

        Ok(Self {
            stage: field("stage"),
            market: field("market"),
            geo: field("geo"),
            funding: field("funding"),
            backers: field("backers"),
            partners: field("partners"),
            ..Self::new(announcement)?
        })
    }
}

pub(crate) fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Pull the generation brief out of an untyped request body.
pub fn brief_from_json(body: &Value) -> Result<String, ValidationError> {
    body.get("prompt")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .ok_or(ValidationError::MissingPrompt)
}
