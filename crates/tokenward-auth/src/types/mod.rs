//! Domain types for the token authority.

mod blacklist;
mod client;
mod token;

pub use blacklist::BlacklistEntry;
pub use client::{Client, ClientType};
pub use token::{AccessTokenRecord, RefreshTokenRecord, TokenType, blacklist_key};
