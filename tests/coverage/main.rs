#[path = "../common/mod.rs"]
mod common;

mod backends;
mod end_to_end;
mod merging;
