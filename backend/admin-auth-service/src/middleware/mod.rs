mod request_directory;

pub use request_directory::{RequestDirectory, RequestDirectoryMiddleware};
