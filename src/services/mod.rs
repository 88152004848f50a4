pub mod account_service;
pub mod asset_service;
pub mod cloudinary_service;
pub mod credential_service;

pub use account_service::*;
pub use asset_service::*;
pub use cloudinary_service::*;
pub use credential_service::*;
