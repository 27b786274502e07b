//! Route handlers, one module per Google service.

pub mod calendar;
pub mod contacts;
pub mod mail;
pub mod root;
