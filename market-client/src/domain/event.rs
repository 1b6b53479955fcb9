/// Raw event message as delivered by the upstream webhook.
///
/// The message wraps an ENTSO-E market document behind a `<msg:Payload>`
/// marker. It is consumed once per flow run and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMessage(String);

impl EventMessage {
    pub fn new(body: impl Into<String>) -> Self {
        Self(body.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<String> for EventMessage {
    fn from(body: String) -> Self {
        Self(body)
    }
}
