//! The notebook store: CRUD over a JSON collection file, plus uploaded source
//! files kept under `uploads/{notebookId}/`.

mod error;
pub use error::StoreError;
mod models;
pub use models::{Notebook, SourceRef};
mod server;
pub use server::{router, serve, AppState};
mod store;
pub use store::NotebookStore;
pub mod uploads;
pub use uploads::{StagedUpload, UploadDir};
