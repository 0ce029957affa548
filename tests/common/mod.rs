//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Once;

use bucket::{CoverNode, Covergroup, Coverpoint, MemoryReadout};

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output through the test harness (shown with `--nocapture`).
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// `size x color` coverpoint with a single goal of target 1.
pub fn colors() -> Coverpoint {
    Coverpoint::new("colors", "Sizes crossed with colors")
        .with_axis("size", "Object size", ["small", "large"])
        .with_axis("color", "Object color", ["red", "green", "blue"])
        .with_default_target(1)
}

/// A two-level tree: `top` holding `colors` and a nested `flags` group.
pub fn tree() -> CoverNode {
    let parity = Coverpoint::new("parity", "Value parity")
        .with_axis("parity", "", ["odd", "even"])
        .with_default_target(2);
    let width = Coverpoint::new("width", "Operand width, with \"wide\" values, quoted")
        .with_axis("bits", "", ["8", "16", "32,64"])
        .with_goal("RARE", "Seldom seen", 1)
        .with_goal("NEVER", "Must not happen", -1)
        .assign_goals(|labels| match labels {
            ["32,64"] => Some("RARE".to_string()),
            ["16"] => Some("NEVER".to_string()),
            _ => None,
        });
    Covergroup::new("top", "Everything")
        .with_child(colors())
        .with_child(Covergroup::new("flags", "Flag checks").with_child(parity).with_child(width))
        .into()
}

/// Readout of [`tree`] after a fixed pattern of hits scaled by `scale`.
pub fn tree_readout(source: &str, scale: u64) -> MemoryReadout {
    let mut root = tree();
    root.find_point_mut(&["colors"])
        .expect("colors")
        .hit_n(&["small", "blue"], scale)
        .expect("hit colors");
    root.find_point_mut(&["flags", "parity"])
        .expect("parity")
        .hit_n(&["odd"], 2 * scale)
        .expect("hit parity");
    root.find_point_mut(&["flags", "width"])
        .expect("width")
        .hit_n(&["32,64"], scale)
        .expect("hit width");
    root.readout(source, "seed=1").expect("readout")
}

pub fn uri(dir: &Path, file: &str) -> String {
    dir.join(file).display().to_string()
}
