mod error;
pub use error::ApiError;

mod api;
pub use api::ExecutionApi;

mod http;
pub use http::HttpExecutionApi;
