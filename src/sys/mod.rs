pub mod mutex;

pub use mutex::MutexSys;
