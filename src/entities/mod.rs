//! `SeaORM` entities

pub mod prelude;

pub mod user_settings;
