use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Formatter;
use std::sync::Arc;
use tabled::Tabled;

pub type DockId = Arc<str>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Tabled)]
pub struct Dock {
    #[tabled(rename = "Dock")]
    pub id: DockId,
    #[tabled(rename = "Label")]
    pub label: Arc<str>,
    #[tabled(rename = "Info")]
    pub info: Arc<str>,
}

impl Dock {
    pub fn new(id: &str, label: &str, info: &str) -> Dock {
        Dock {
            id: Arc::from(id),
            label: Arc::from(label),
            info: Arc::from(info),
        }
    }

    /// Docks are addressed by id or label, case-insensitively.
    pub fn matches(&self, key: &str) -> bool {
        self.id.eq_ignore_ascii_case(key) || self.label.eq_ignore_ascii_case(key)
    }
}

impl fmt::Display for Dock {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.info)
    }
}
