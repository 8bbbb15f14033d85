pub mod sync;

pub use sync::{lock, panic_message, read, write};
