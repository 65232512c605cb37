pub mod config;
pub mod datetext;
pub mod extract;
pub mod fetch;
pub mod harness;
pub mod ics;
pub mod model;
pub mod normalize;
pub mod pipeline;
