pub mod bits;
pub mod decoder;
pub mod hardware;
pub mod os_support;
pub mod probe;
pub mod runtime;
pub mod table;
