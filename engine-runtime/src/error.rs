use thiserror::Error;
use wire::ObjectId;

/// Failures raised while executing a single command. Caught by the engine loop and
/// turned into a `0x02` reply; never fatal to the session by itself.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum EngineError {
    /// `Apply`'s `function_id` does not name any live entry in the store.
    #[error("no object {0}")]
    NoSuchObject(ObjectId),

    /// `Apply`'s `function_id` names a live entry that is not function-valued.
    #[error("object {0} is not a function, it is a {1}")]
    NotAFunction(ObjectId, &'static str),

    /// Evaluation of engine code failed; `message` is the engine's own description,
    /// passed through unchanged to the driver.
    #[error("{0}")]
    Eval(String),

    /// A command's argument `Data` did not have the shape the invoked function
    /// expected (e.g. `Remove` given a `List` containing a non-`Int`).
    #[error("{0}")]
    Shape(String),
}

/// Abbreviation of `Result<T, EngineError>`.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
