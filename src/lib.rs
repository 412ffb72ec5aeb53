pub mod launch;
pub mod operator;
pub mod server;
pub mod shared;
