pub use super::user_settings::Entity as UserSettings;
