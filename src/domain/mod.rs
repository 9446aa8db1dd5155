// Domain layer: core models and ports (interfaces). Only std/serde/chrono here.

pub mod model;
pub mod ports;
