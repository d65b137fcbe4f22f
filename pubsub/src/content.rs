/// A published item: a short text tagged with the keywords subscribers can
/// subscribe to. Each keyword maps to one file in the namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub text: String,
    pub keywords: Vec<String>,
}

impl Content {
    pub fn new(text: impl Into<String>, keywords: Vec<String>) -> Self {
        Self {
            text: text.into(),
            keywords,
        }
    }
}
