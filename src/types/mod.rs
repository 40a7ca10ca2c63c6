mod filetype;
mod models;
mod permission;

pub use filetype::FileType;
pub use models::*;
pub use permission::PermissionLevel;
