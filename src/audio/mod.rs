pub mod decoder;
pub mod engine;
pub mod mixer;
pub mod player;
pub mod stretcher;
pub mod transport;
pub mod types;
