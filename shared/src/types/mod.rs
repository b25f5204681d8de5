pub mod character;
pub mod event;
pub mod server_config;

pub use self::character::{
    CharacterEdit, CharacterSheet, CharacterView, DeleteCharacterRequest, EditCharacterRequest,
    Gender, House, NewCharacter, Sexuality, UnknownChoice, Year,
};
pub use self::event::{ChangeAction, ChangeEvent};
pub use self::server_config::{AppConfig, ConfigError};
