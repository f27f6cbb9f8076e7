//! Command handlers for the hourglass binary

pub mod helpers;
pub mod inspect;
pub mod run;
