pub mod opts;
pub mod record;
pub mod renderer;
pub(crate) mod setup;
