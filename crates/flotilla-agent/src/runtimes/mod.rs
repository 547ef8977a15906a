//! Container runtime implementations

pub mod docker;

pub use docker::DockerRuntime;
