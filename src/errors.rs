use thiserror::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Error)]
pub enum SGError
{
    #[error("point lies outside of the grid's bounding box")]
    OutOfDomain,
    #[error("length of the coefficient vector does not match the number of grid points")]
    NumberOfPointsAndValuesMismatch,
    #[error("dimension of the input does not match the dimension of the grid")]
    DimensionMismatch,
    #[error("functor requires a training dataset, errors or classes that were not set")]
    MissingTrainingData,
    #[error("operation is not supported for this basis type")]
    UnsupportedOperation,
    #[error("sequence number is out of range")]
    InvalidIndex,
    #[error("grid point already exists in storage")]
    PointExists,
    #[error("grid generators require an empty storage")]
    StorageNotEmpty,
    #[error("LZ4 decompression failed")]
    LZ4DecompressionFailed,
    #[error("serialization failed")]
    SerializationFailed,
    #[error("deserialization failed")]
    DeserializationFailed,
    #[error("file I/O failed")]
    FileIOError,
}
