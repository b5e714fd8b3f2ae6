pub mod okx;

pub use okx::{Okx, OkxCredentials};
