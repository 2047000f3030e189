// Mon Feb 2 2026 - Alex

pub mod address;
pub mod error;
pub mod image;
pub mod scanner;
pub mod store;

pub use address::Address;
pub use error::MemoryError;
pub use image::ImageStore;
pub use scanner::{CancelToken, StoreScanner};
pub use store::{HostStore, Relocation, StoreEdit};
