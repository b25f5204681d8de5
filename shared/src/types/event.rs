// Change events pushed to live viewers after a committed mutation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::character::CharacterView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeAction {
    Create,
    Edit,
    Delete,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Create => "create",
            ChangeAction::Edit => "edit",
            ChangeAction::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One committed create / edit / delete.
///
/// Serialized as a flat JSON object tagged by `action`:
///
/// ```text
/// {"action":"create","name":"Iris","faceclaim":...,"year":"2nd Year"}
/// {"action":"edit","name":"Iris","new_name":"Iris Vale"}
/// {"action":"delete","name":"Iris"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// Full public snapshot of the new record.
    Create(CharacterView),
    /// `new_name` is the record's name after the edit (equal to `name`
    /// when the edit did not rename).
    Edit { name: String, new_name: String },
    Delete { name: String },
}

impl ChangeEvent {
    pub fn action(&self) -> ChangeAction {
        match self {
            ChangeEvent::Create(_) => ChangeAction::Create,
            ChangeEvent::Edit { .. } => ChangeAction::Edit,
            ChangeEvent::Delete { .. } => ChangeAction::Delete,
        }
    }

    /// Identifying name of the affected record at the time of the event.
    pub fn subject_name(&self) -> &str {
        match self {
            ChangeEvent::Create(character) => &character.name,
            ChangeEvent::Edit { name, .. } | ChangeEvent::Delete { name } => name,
        }
    }

    /// Wire form sent to every viewer as a single text frame.
    pub fn to_wire(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
