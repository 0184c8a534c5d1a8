pub mod atomic;

pub use atomic::replace_file;
