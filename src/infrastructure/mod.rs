pub mod ads;
pub mod events;
pub mod sqlite;
