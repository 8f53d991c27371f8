//! Terminal ASCII video player: probe a clip, explode it into stills, and
//! play it back as centered text art with scrubbing.

pub mod ascii;
pub mod cache;
pub mod error;
pub mod extract;
pub mod loader;
pub mod player;
pub mod session;
pub mod ui;
