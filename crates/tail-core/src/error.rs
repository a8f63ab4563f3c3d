use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("api error: {0}")]
    Api(#[from] tail_api::ApiError),

    #[error("bus error: {0}")]
    Bus(#[from] tail_bus::BusError),

    #[error("model error: {0}")]
    Model(#[from] tail_model::ModelError),
}
