/// Default number of values an edge buffers before its producer blocks
pub const DEFAULT_EDGE_CAPACITY: usize = 10;
/// Maximum configurable default edge capacity - bounds pipeline memory
pub const MAX_EDGE_CAPACITY: usize = 4096;
/// Default `EnvFilter` directive when none is configured
pub const DEFAULT_LOG_FILTER: &str = "info";
