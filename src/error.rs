use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Optimizer population size must be positive, got {0}")]
    InvalidPopulationSize(usize),

    #[error("Optimizer iteration count must be positive, got {0}")]
    InvalidIterationCount(usize),

    #[error("Optimizer requires a non-empty VM catalog")]
    EmptyVmCatalog,
}

pub type Result<T> = std::result::Result<T, Error>;
