use serde::{Deserialize, Serialize};

/// Where on the source page a link was found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentence: Option<String>,
}

impl LinkContext {
    pub fn is_empty(&self) -> bool {
        self.section.is_none() && self.sentence.is_none()
    }
}

/// One outbound link as reported by a link source. The title is raw and has
/// not been normalized yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<LinkContext>,
}

impl PageLink {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            context: None,
        }
    }

    pub fn with_context(title: impl Into<String>, context: LinkContext) -> Self {
        Self {
            title: title.into(),
            context: if context.is_empty() {
                None
            } else {
                Some(context)
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: String,
    pub page_id: Option<u64>,
    pub is_disambiguation: bool,
    pub url: Option<String>,
    /// The page does not exist on the remote side.
    pub missing: bool,
}

impl PageMetadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            page_id: None,
            is_disambiguation: false,
            url: None,
            missing: false,
        }
    }

    pub fn disambiguation(title: impl Into<String>) -> Self {
        Self {
            is_disambiguation: true,
            ..Self::new(title)
        }
    }
}
