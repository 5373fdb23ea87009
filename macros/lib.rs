pub use options::*;
