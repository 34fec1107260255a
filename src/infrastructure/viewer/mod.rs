pub mod viewer;

pub use viewer::{Session, Viewer, ViewerContext};
