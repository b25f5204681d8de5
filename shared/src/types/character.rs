use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Choice enumerations
// ---------------------------------------------------------------------------

/// A label that does not belong to the enumeration it was parsed as.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{value}' is not a valid {kind}")]
pub struct UnknownChoice {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a closed set of profile choices.
///
/// Each variant is stored, serialized and parsed by its display label
/// (e.g. `"2nd Year"`), which is also what autocomplete offers. Request
/// bodies deserialize through `FromStr`, so they accept the same loose
/// spelling as every other parse path.
macro_rules! choice_enum {
    ($(#[$meta:meta])* $name:ident as $kind:literal { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            /// Labels starting with `prefix`, compared case-insensitively.
            pub fn choices(prefix: &str) -> Vec<&'static str> {
                let prefix = prefix.to_lowercase();
                Self::ALL
                    .iter()
                    .map(|choice| choice.as_str())
                    .filter(|label| label.to_lowercase().starts_with(&prefix))
                    .collect()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownChoice;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|choice| choice.as_str().eq_ignore_ascii_case(s))
                    .ok_or_else(|| UnknownChoice {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let label = String::deserialize(deserializer)?;
                label.parse().map_err(de::Error::custom)
            }
        }
    };
}

choice_enum! {
    House as "house" {
        Aphrodite => "Aphrodite",
        Apollo => "Apollo",
        Athena => "Athena",
        Dionysus => "Dionysus",
        Hades => "Hades",
        Hephaestus => "Hephaestus",
        Hecate => "Hecate",
        Nyx => "Nyx",
        Poseidon => "Poseidon",
        Zeus => "Zeus",
    }
}

choice_enum! {
    Year as "year" {
        First => "1st Year",
        Second => "2nd Year",
        Third => "3rd Year",
        Fourth => "4th Year",
        Fifth => "5th Year",
        Sixth => "6th Year",
    }
}

choice_enum! {
    Gender as "gender" {
        Male => "Male",
        Female => "Female",
        NonBinary => "Non-binary",
        Other => "Other",
    }
}

choice_enum! {
    Sexuality as "sexuality" {
        Heterosexual => "Heterosexual",
        Homosexual => "Homosexual",
        Bisexual => "Bisexual",
        Pansexual => "Pansexual",
        Asexual => "Asexual",
        Other => "Other",
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Public view of a character record. Never carries the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterView {
    pub name: String,
    pub faceclaim: String,
    pub image: String,
    pub bio: String,
    pub gender: Option<Gender>,
    pub sexuality: Option<Sexuality>,
    pub house: Option<House>,
    pub year: Option<Year>,
}

/// Body of a create request. All profile choices are required on create
/// even though storage allows them to be empty.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCharacter {
    pub name: String,
    pub faceclaim: String,
    pub image: String,
    pub bio: String,
    pub password: String,
    pub gender: Gender,
    pub sexuality: Sexuality,
    pub house: House,
    pub year: Year,
}

impl NewCharacter {
    pub fn view(&self) -> CharacterView {
        CharacterView {
            name: self.name.clone(),
            faceclaim: self.faceclaim.clone(),
            image: self.image.clone(),
            bio: self.bio.clone(),
            gender: Some(self.gender),
            sexuality: Some(self.sexuality),
            house: Some(self.house),
            year: Some(self.year),
        }
    }
}

/// Partial update. `None` and empty strings leave the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CharacterEdit {
    #[serde(default)]
    pub new_name: Option<String>,
    #[serde(default)]
    pub faceclaim: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub gender: Option<Gender>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub sexuality: Option<Sexuality>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub house: Option<House>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub year: Option<Year>,
}

/// A null or blank choice label means "leave unchanged".
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(label) if !label.trim().is_empty() => {
            label.parse().map(Some).map_err(de::Error::custom)
        }
        _ => Ok(None),
    }
}

impl CharacterEdit {
    /// Supplied, non-empty replacement for a text field.
    pub fn text(field: &Option<String>) -> Option<&str> {
        field.as_deref().filter(|s| !s.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        Self::text(&self.new_name).is_none()
            && Self::text(&self.faceclaim).is_none()
            && Self::text(&self.image).is_none()
            && Self::text(&self.bio).is_none()
            && self.gender.is_none()
            && self.sexuality.is_none()
            && self.house.is_none()
            && self.year.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditCharacterRequest {
    pub password: String,
    #[serde(flatten)]
    pub changes: CharacterEdit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteCharacterRequest {
    pub password: String,
}

/// Rendered profile card for a single character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSheet {
    pub title: String,
    pub image: String,
    pub footer: String,
    pub color: String,
}

impl CharacterSheet {
    pub const ACCENT_COLOR: &'static str = "#fffdd0";

    /// Titles link-style bios as full character sheets.
    pub fn for_character(character: &CharacterView) -> Self {
        let name = character.name.to_uppercase();
        let title = if character.bio.starts_with("http") {
            format!("{} [Character Sheet]", name)
        } else {
            name
        };

        Self {
            title,
            image: character.image.clone(),
            footer: character.faceclaim.clone(),
            color: Self::ACCENT_COLOR.to_string(),
        }
    }
}
