pub mod ledger;
pub mod models;
pub mod parser;
pub mod reminder;
pub mod stats;
